use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use atrium_mvp::{
    LifecycleAudit, LifecycleAuditEvent, LifecycleStage, MountHost, MountRegistry,
    RootCoordinator, StaticTemplates, TreeConfig, ViewSpec, ViewTree,
};

const SCREEN: &str = "screen";
const MAIN: &str = "#main";
const PANEL: &str = "panel";

/// Walks the classic login flow: bring the application stack up leaf-first,
/// flip back to the login screen, then return to the dashboard. Every audit
/// stage and the resulting mount contents are printed along the way.
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let registry = Rc::new(RefCell::new(MountRegistry::new()));
    {
        let mut shared = registry.borrow_mut();
        shared.register(SCREEN);
        shared.register(MAIN);
        shared.register(PANEL);
    }

    let templates = StaticTemplates::new()
        .with("loggedOut", "<form id=\"login\"/>")
        .with("loggedIn", "<nav/><div id=\"main\"/>")
        .with("dashboard", "<section id=\"dashboard\"/>")
        .with("setup", "<section id=\"setup\"/>")
        .with("campaigns", "<ul id=\"campaigns\"/>");

    let mut config = TreeConfig::default();
    config.enable_metrics();

    let mut tree = ViewTree::with_config(
        Box::new(SharedRegistry(Rc::clone(&registry))),
        Box::new(templates),
        config,
    );
    tree.set_audit(Arc::new(PrintAudit));

    let logged_out = tree.spawn(
        ViewSpec::layout("loggedOut")
            .container(SCREEN)
            .render_on_activate(),
    );
    let logged_in = tree.spawn(
        ViewSpec::layout("loggedIn")
            .container(SCREEN)
            .render_on_activate(),
    );
    let dashboard = tree.spawn_in(
        logged_in,
        ViewSpec::layout("dashboard")
            .container(MAIN)
            .render_on_activate(),
    )?;
    let setup = tree.spawn_in(
        logged_in,
        ViewSpec::layout("setup")
            .container(MAIN)
            .render_on_activate(),
    )?;
    let campaigns = tree.spawn_in(setup, ViewSpec::layout("campaigns").container(PANEL))?;

    let mut coordinator = RootCoordinator::new(&mut tree);
    coordinator.track_root(&mut tree, logged_out)?;
    coordinator.track_root(&mut tree, logged_in)?;

    banner("activate campaigns (cold tree, whole chain comes up)");
    tree.activate(campaigns)?;
    show_mounts(&registry);

    banner("activate dashboard (evicts setup from the main slot)");
    tree.activate(dashboard)?;
    show_mounts(&registry);

    banner("activate loggedOut (coordinator winds the app stack down)");
    tree.activate(logged_out)?;
    show_mounts(&registry);

    banner("activate setup (back into the app)");
    tree.activate(setup)?;
    show_mounts(&registry);

    if let Some(snapshot) = tree.metrics_snapshot() {
        banner("metrics");
        println!(
            "  activations={} renders={} teardowns={} evictions={} signals={}",
            snapshot.activations,
            snapshot.renders,
            snapshot.teardowns,
            snapshot.evictions,
            snapshot.signals
        );
    }

    Ok(())
}

fn banner(title: &str) {
    println!("\n== {title} ==");
}

fn show_mounts(registry: &Rc<RefCell<MountRegistry>>) {
    let shared = registry.borrow();
    for container in [SCREEN, MAIN, PANEL] {
        let content = shared.content_of(container).unwrap_or_default();
        let shown = if content.is_empty() { "(empty)" } else { content };
        println!("  {container:>8} | {shown}");
    }
}

#[derive(Clone)]
struct SharedRegistry(Rc<RefCell<MountRegistry>>);

impl MountHost for SharedRegistry {
    fn resolve(&self, container: &str) -> bool {
        self.0.borrow().resolve(container)
    }

    fn inject(&mut self, container: &str, markup: &str) {
        self.0.borrow_mut().inject(container, markup);
    }

    fn clear(&mut self, container: &str) {
        self.0.borrow_mut().clear(container);
    }
}

struct PrintAudit;

impl LifecycleAudit for PrintAudit {
    fn record(&self, event: LifecycleAuditEvent) {
        let label = match event.stage {
            LifecycleStage::ViewSpawned => "spawned",
            LifecycleStage::ActivationRequested => "activating",
            LifecycleStage::ActivationCoalesced => "coalesced",
            LifecycleStage::ActivationCompleted => "activated",
            LifecycleStage::RivalEvicted => "evicted",
            LifecycleStage::ViewRendered => "rendered",
            LifecycleStage::ViewTornDown => "torn_down",
            LifecycleStage::RootTracked => "tracked",
            LifecycleStage::RootUntracked => "untracked",
            LifecycleStage::RootEvicted => "root_evicted",
        };
        let summary = event
            .details
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {label:>12}: {summary}");
    }
}
