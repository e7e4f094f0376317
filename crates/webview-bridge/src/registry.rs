//! Live instance bookkeeping
//!
//! An [`InstanceRegistry`] tracks the webviews that completed `create` and
//! notifies its `window-all-closed` listeners when the last one goes away.
//! It is an ordinary owned value: the application creates one and hands a
//! clone to every [`WebView`](crate::WebView) it builds.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one webview instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(INSTANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "webview#{}", self.0)
    }
}

#[derive(Default)]
struct RegistryState {
    live: RefCell<BTreeSet<InstanceId>>,
    all_closed: RefCell<Vec<Rc<dyn Fn()>>>,
}

/// Shared set of live webview instances
#[derive(Clone, Default)]
pub struct InstanceRegistry {
    state: Rc<RegistryState>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `window-all-closed` listener
    pub fn on_all_closed<F>(&self, listener: F)
    where
        F: Fn() + 'static,
    {
        self.state.all_closed.borrow_mut().push(Rc::new(listener));
    }

    /// Track a created instance; `false` if it was already tracked
    pub fn insert(&self, id: InstanceId) -> bool {
        self.state.live.borrow_mut().insert(id)
    }

    /// Stop tracking an instance
    ///
    /// Emits `window-all-closed` when this removal empties the set. Removing
    /// an untracked id changes nothing and emits nothing.
    pub fn remove(&self, id: InstanceId) -> bool {
        let (removed, now_empty) = {
            let mut live = self.state.live.borrow_mut();
            let removed = live.remove(&id);
            (removed, live.is_empty())
        };

        if removed && now_empty {
            tracing::debug!("all webview windows closed");
            let listeners: Vec<Rc<dyn Fn()>> = self.state.all_closed.borrow().clone();
            for listener in listeners {
                listener();
            }
        }
        removed
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.state.live.borrow().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.state.live.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.live.borrow().is_empty()
    }

    /// Ids of live instances in creation order
    pub fn ids(&self) -> Vec<InstanceId> {
        self.state.live.borrow().iter().copied().collect()
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("live", &self.ids())
            .field("listeners", &self.state.all_closed.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_all_closed_fires_once_when_last_instance_leaves() {
        let registry = InstanceRegistry::new();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        registry.on_all_closed(move || counter.set(counter.get() + 1));

        let a = InstanceId::next();
        let b = InstanceId::next();
        assert!(registry.insert(a));
        assert!(registry.insert(b));
        assert!(!registry.insert(a));
        assert_eq!(registry.ids(), vec![a, b]);

        assert!(registry.remove(a));
        assert_eq!(fired.get(), 0);
        assert!(registry.remove(b));
        assert_eq!(fired.get(), 1);

        // Removing again from an empty registry is silent.
        assert!(!registry.remove(b));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_removing_untracked_id_does_not_emit() {
        let registry = InstanceRegistry::new();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        registry.on_all_closed(move || flag.set(true));

        assert!(!registry.remove(InstanceId::next()));
        assert!(!fired.get());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InstanceRegistry::new();
        let other = registry.clone();
        let id = InstanceId::next();
        registry.insert(id);
        assert!(other.contains(id));
        assert_eq!(other.len(), 1);
    }
}
