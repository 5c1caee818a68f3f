use std::collections::{HashMap, HashSet};

use blake3::Hash;

pub type ContainerId = String;

/// Boundary to whatever owns the real mount points.
///
/// A container either resolves to exactly one mount point or to none; the
/// tree checks [`resolve`](MountHost::resolve) before injecting, so hosts
/// may treat `inject`/`clear` on unknown containers as no-ops.
pub trait MountHost {
    fn resolve(&self, container: &str) -> bool;
    /// Replaces the container's content wholesale.
    fn inject(&mut self, container: &str, markup: &str);
    /// Empties the container.
    fn clear(&mut self, container: &str);
}

/// Last known content of a registered mount point.
#[derive(Debug, Clone)]
pub struct MountState {
    pub content: String,
    hash: Option<Hash>,
    pub is_dirty: bool,
}

impl MountState {
    fn new() -> Self {
        Self {
            content: String::new(),
            hash: None,
            is_dirty: true,
        }
    }

    fn update_content(&mut self, content: String) {
        let new_hash = blake3::hash(content.as_bytes());
        if self.hash.map(|h| h != new_hash).unwrap_or(true) {
            self.content = content;
            self.hash = Some(new_hash);
            self.is_dirty = true;
        }
    }
}

/// In-memory mount host mapping container ids to their last known states.
///
/// Containers must be registered before they resolve; content changes are
/// hash-detected so repeated identical injections stay clean.
#[derive(Debug, Default)]
pub struct MountRegistry {
    entries: HashMap<ContainerId, MountState>,
    dirty: HashSet<ContainerId>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a mount point. Fresh containers start dirty; re-registering
    /// an existing one keeps its content.
    pub fn register(&mut self, container: impl Into<ContainerId>) {
        use std::collections::hash_map::Entry;

        let id = container.into();
        if let Entry::Vacant(vacant) = self.entries.entry(id.clone()) {
            vacant.insert(MountState::new());
            self.dirty.insert(id);
        }
    }

    /// Revokes a mount point; subsequent resolution fails until it is
    /// registered again.
    pub fn unregister(&mut self, container: &str) {
        self.entries.remove(container);
        self.dirty.remove(container);
    }

    pub fn content_of(&self, container: &str) -> Option<&str> {
        self.entries.get(container).map(|state| state.content.as_str())
    }

    pub fn take_dirty(&mut self) -> Vec<(ContainerId, MountState)> {
        let ids: Vec<_> = self.dirty.drain().collect();
        ids.into_iter()
            .filter_map(|id| {
                self.entries.get_mut(&id).map(|state| {
                    state.is_dirty = false;
                    (id.clone(), state.clone())
                })
            })
            .collect()
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }
}

impl MountHost for MountRegistry {
    fn resolve(&self, container: &str) -> bool {
        self.entries.contains_key(container)
    }

    fn inject(&mut self, container: &str, markup: &str) {
        let Some(state) = self.entries.get_mut(container) else {
            return;
        };
        state.update_content(markup.to_string());
        if state.is_dirty {
            self.dirty.insert(container.to_string());
        }
    }

    fn clear(&mut self, container: &str) {
        self.inject(container, "");
    }
}
