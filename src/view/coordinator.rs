//! Mutual exclusion between top-level view stacks.
//!
//! A [`RootCoordinator`] watches the roots it is told about; whenever one of
//! them starts activating or rendering, every other tracked root that is
//! still active gets torn down first. The coordinator's listeners carry
//! their own scope, distinct from any view scope, so they survive the
//! teardown cycles of the roots they guard.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Result, ViewError};
use crate::logging::{LogLevel, json_str};
use crate::node::NodeId;
use crate::signal::{Scope, Signal};

use super::audit::LifecycleStage;
use super::core::ViewTree;

pub struct RootCoordinator {
    ledger: Rc<RefCell<Vec<NodeId>>>,
    scope: Scope,
}

impl RootCoordinator {
    pub fn new(tree: &mut ViewTree) -> Self {
        Self {
            ledger: Rc::new(RefCell::new(Vec::new())),
            scope: tree.next_coordinator_scope(),
        }
    }

    /// Register a root for mutual exclusion. Tracking an already tracked
    /// root is a no-op; a parented view is rejected.
    pub fn track_root(&mut self, tree: &mut ViewTree, root: NodeId) -> Result<()> {
        tree.ensure_node(root)?;
        if tree.parent_of(root).is_some() {
            return Err(ViewError::NotARoot(root));
        }
        if self.ledger.borrow().contains(&root) {
            return Ok(());
        }
        self.ledger.borrow_mut().push(root);

        // either edge of the transition evicts the other tracked roots
        for signal in [Signal::Activating, Signal::Rendering] {
            let ledger = Rc::clone(&self.ledger);
            tree.on_scoped(
                root,
                signal,
                self.scope,
                Box::new(move |tree, fired| {
                    let others: Vec<NodeId> = ledger
                        .borrow()
                        .iter()
                        .copied()
                        .filter(|&other| other != fired && tree.is_active(other))
                        .collect();
                    for other in others {
                        tree.audit_stage(
                            other,
                            LifecycleStage::RootEvicted,
                            [json_str("replacement", tree.label(fired))],
                        );
                        tree.log_lifecycle_event(
                            LogLevel::Info,
                            "root_evicted",
                            [
                                json_str("view", tree.label(other)),
                                json_str("replacement", tree.label(fired)),
                            ],
                        );
                        tree.teardown(other)?;
                    }
                    Ok(())
                }),
            )?;
        }

        // a root that gains a parent stops being a root
        let ledger = Rc::clone(&self.ledger);
        let scope = self.scope;
        tree.on_scoped(
            root,
            Signal::ParentChanged,
            self.scope,
            Box::new(move |tree, fired| {
                if tree.parent_of(fired).is_some() {
                    ledger.borrow_mut().retain(|&tracked| tracked != fired);
                    tree.purge_listener_scope(fired, scope)?;
                    tree.audit_stage(fired, LifecycleStage::RootUntracked, std::iter::empty());
                }
                Ok(())
            }),
        )?;

        tree.audit_stage(root, LifecycleStage::RootTracked, std::iter::empty());
        tree.log_lifecycle_event(
            LogLevel::Debug,
            "root_tracked",
            [json_str("view", tree.label(root))],
        );
        Ok(())
    }

    /// Remove a root from the ledger and drop this coordinator's listeners
    /// on it. The root's own state is untouched.
    pub fn untrack_root(&mut self, tree: &mut ViewTree, root: NodeId) -> Result<()> {
        tree.ensure_node(root)?;
        let was_tracked = {
            let mut ledger = self.ledger.borrow_mut();
            let before = ledger.len();
            ledger.retain(|&tracked| tracked != root);
            ledger.len() != before
        };
        tree.purge_listener_scope(root, self.scope)?;
        if was_tracked {
            tree.audit_stage(root, LifecycleStage::RootUntracked, std::iter::empty());
            tree.log_lifecycle_event(
                LogLevel::Debug,
                "root_untracked",
                [json_str("view", tree.label(root))],
            );
        }
        Ok(())
    }

    pub fn tracked(&self) -> Vec<NodeId> {
        self.ledger.borrow().clone()
    }

    pub fn is_tracked(&self, root: NodeId) -> bool {
        self.ledger.borrow().contains(&root)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use super::RootCoordinator;
    use crate::error::ViewError;
    use crate::mount::{MountHost, MountRegistry};
    use crate::node::NodeId;
    use crate::signal::Signal;
    use crate::template::StaticTemplates;
    use crate::view::audit::{LifecycleAudit, LifecycleAuditEvent, LifecycleStage};
    use crate::view::core::{TeardownScope, ViewBehavior, ViewSpec, ViewTree};

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

    struct HookRecorder {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ViewBehavior for HookRecorder {
        fn on_teardown(&mut self, _scope: &mut TeardownScope<'_>) {
            self.log.borrow_mut().push(self.name);
        }
    }

    #[derive(Default)]
    struct StageLog {
        events: Mutex<Vec<(LifecycleStage, String)>>,
    }

    impl StageLog {
        fn position(&self, stage: LifecycleStage, view: &str) -> usize {
            self.events
                .lock()
                .expect("audit mutex")
                .iter()
                .position(|(s, v)| *s == stage && v == view)
                .unwrap_or_else(|| panic!("no {stage:?} event for {view}"))
        }
    }

    impl LifecycleAudit for StageLog {
        fn record(&self, event: LifecycleAuditEvent) {
            let view = event
                .details
                .iter()
                .find(|(key, _)| key == "view")
                .and_then(|(_, value)| value.as_str().map(str::to_string))
                .unwrap_or_default();
            self.events
                .lock()
                .expect("audit mutex")
                .push((event.stage, view));
        }
    }

    struct Fixture {
        tree: ViewTree,
        registry: Rc<RefCell<MountRegistry>>,
        hook_log: Rc<RefCell<Vec<&'static str>>>,
        logged_out: NodeId,
        logged_in: NodeId,
        setup: NodeId,
        campaigns: NodeId,
    }

    impl Fixture {
        fn content(&self, container: &str) -> String {
            self.registry
                .borrow()
                .content_of(container)
                .unwrap_or_default()
                .to_string()
        }
    }

    fn login_fixture() -> Fixture {
        let registry = Rc::new(RefCell::new(MountRegistry::new()));
        {
            let mut shared = registry.borrow_mut();
            shared.register("screen");
            shared.register("#main");
        }
        let templates = StaticTemplates::new()
            .with("loggedOut", "<form id=\"login\"/>")
            .with("loggedIn", "<nav/><div id=\"main\"/>")
            .with("setup", "<section id=\"setup\"/>");
        let mut tree = ViewTree::new(
            Box::new(SharedRegistry(Rc::clone(&registry))),
            Box::new(templates),
        );

        let hook_log = Rc::new(RefCell::new(Vec::new()));
        let spec_for = |name: &'static str, container: &'static str, renders: bool| {
            let mut spec = ViewSpec::layout(name)
                .container(container)
                .behavior(Box::new(HookRecorder {
                    name,
                    log: Rc::clone(&hook_log),
                }));
            if renders {
                spec = spec.render_on_activate();
            }
            spec
        };

        let logged_out = tree.spawn(spec_for("loggedOut", "screen", true));
        let logged_in = tree.spawn(spec_for("loggedIn", "screen", true));
        let setup = tree
            .spawn_in(logged_in, spec_for("setup", "#main", true))
            .expect("spawn setup");
        let campaigns = tree
            .spawn_in(setup, spec_for("campaigns", "#main", false))
            .expect("spawn campaigns");

        Fixture {
            tree,
            registry,
            hook_log,
            logged_out,
            logged_in,
            setup,
            campaigns,
        }
    }

    #[test]
    fn tracking_rejects_parented_views() {
        let mut fx = login_fixture();
        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        let err = coordinator
            .track_root(&mut fx.tree, fx.setup)
            .expect_err("not a root");
        assert!(matches!(err, ViewError::NotARoot(node) if node == fx.setup));
        assert!(coordinator.tracked().is_empty());
    }

    #[test]
    fn tracking_twice_installs_one_listener_set() {
        let mut fx = login_fixture();
        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track");
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track again");
        assert_eq!(fx.tree.listener_count(fx.logged_in, Signal::Activating), 1);
        assert_eq!(coordinator.tracked(), vec![fx.logged_in]);
    }

    #[test]
    fn switching_roots_tears_down_the_departing_stack_first() {
        let mut fx = login_fixture();
        let audit = Arc::new(StageLog::default());
        fx.tree.set_audit(audit.clone());

        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        coordinator
            .track_root(&mut fx.tree, fx.logged_out)
            .expect("track loggedOut");
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track loggedIn");

        fx.tree.activate(fx.campaigns).expect("stack up");
        assert!(fx.tree.is_active(fx.logged_in));
        fx.hook_log.borrow_mut().clear();

        fx.tree.activate(fx.logged_out).expect("switch");

        // the whole departing stack unwinds leaf-first before the login
        // screen takes the mount point
        assert_eq!(
            fx.hook_log.borrow().clone(),
            vec!["campaigns", "setup", "loggedIn"]
        );
        assert!(fx.tree.is_active(fx.logged_out));
        assert!(!fx.tree.is_active(fx.logged_in));
        assert!(!fx.tree.is_active(fx.setup));
        assert!(!fx.tree.is_active(fx.campaigns));
        assert_eq!(fx.content("screen"), "<form id=\"login\"/>");

        let evicted = audit.position(LifecycleStage::RootEvicted, "loggedIn");
        let rendered = audit.position(LifecycleStage::ViewRendered, "loggedOut");
        assert!(evicted < rendered);
    }

    #[test]
    fn coordination_survives_repeated_switches() {
        let mut fx = login_fixture();
        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        coordinator
            .track_root(&mut fx.tree, fx.logged_out)
            .expect("track");
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track");

        for _ in 0..3 {
            fx.tree.activate(fx.logged_in).expect("to app");
            assert!(fx.tree.is_active(fx.logged_in));
            assert!(!fx.tree.is_active(fx.logged_out));
            assert_eq!(fx.content("screen"), "<nav/><div id=\"main\"/>");

            fx.tree.activate(fx.logged_out).expect("to login");
            assert!(fx.tree.is_active(fx.logged_out));
            assert!(!fx.tree.is_active(fx.logged_in));
            assert_eq!(fx.content("screen"), "<form id=\"login\"/>");
        }
    }

    #[test]
    fn reparenting_a_tracked_root_untracks_it() {
        let mut fx = login_fixture();
        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        coordinator
            .track_root(&mut fx.tree, fx.logged_out)
            .expect("track");
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track");

        fx.tree
            .attach(fx.logged_in, fx.logged_out)
            .expect("reparent");

        assert_eq!(coordinator.tracked(), vec![fx.logged_in]);
        assert!(!coordinator.is_tracked(fx.logged_out));
        assert_eq!(fx.tree.listener_count(fx.logged_out, Signal::Activating), 0);
        assert_eq!(
            fx.tree.listener_count(fx.logged_out, Signal::ParentChanged),
            0
        );

        // the demoted root no longer evicts anyone
        fx.tree.activate(fx.logged_in).expect("root up");
        fx.tree.activate(fx.logged_out).expect("child up");
        assert!(fx.tree.is_active(fx.logged_in));
        assert!(fx.tree.is_active(fx.logged_out));
    }

    #[test]
    fn untracked_roots_stop_participating() {
        let mut fx = login_fixture();
        let mut coordinator = RootCoordinator::new(&mut fx.tree);
        coordinator
            .track_root(&mut fx.tree, fx.logged_out)
            .expect("track");
        coordinator
            .track_root(&mut fx.tree, fx.logged_in)
            .expect("track");

        coordinator
            .untrack_root(&mut fx.tree, fx.logged_out)
            .expect("untrack");
        assert_eq!(coordinator.tracked(), vec![fx.logged_in]);
        assert_eq!(fx.tree.listener_count(fx.logged_out, Signal::Activating), 0);

        fx.tree.activate(fx.logged_in).expect("app up");
        fx.tree.activate(fx.logged_out).expect("login up");
        // no exclusion in either direction anymore
        assert!(fx.tree.is_active(fx.logged_in));
        assert!(fx.tree.is_active(fx.logged_out));
    }
}
