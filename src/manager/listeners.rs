use std::sync::{Arc, Mutex};

use crate::model::RepositoryDescriptor;

/// Observer of index lifecycle events. Called synchronously on the thread
/// that performed the change, after it is on disk.
pub trait IndexListener: Send + Sync {
    fn index_added(&self, _repository: &RepositoryDescriptor) {}
    fn index_removed(&self, _repository: &RepositoryDescriptor) {}
    fn index_updating(&self, _repository: &RepositoryDescriptor) {}
    fn index_changed(&self, _repository: &RepositoryDescriptor) {}
}

/// Listeners in registration order, each registered at most once
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn IndexListener>>>,
}

fn same(a: &Arc<dyn IndexListener>, b: &Arc<dyn IndexListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl ListenerSet {
    pub fn add(&self, listener: Arc<dyn IndexListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        if listeners.iter().any(|l| same(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    pub fn remove(&self, listener: &Arc<dyn IndexListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        let before = listeners.len();
        listeners.retain(|l| !same(l, listener));
        listeners.len() != before
    }

    /// Notify outside the registry lock so a listener may (un)register.
    pub fn notify(&self, event: impl Fn(&dyn IndexListener)) {
        let snapshot: Vec<Arc<dyn IndexListener>> =
            self.listeners.lock().unwrap_or_else(|p| p.into_inner()).clone();
        for listener in &snapshot {
            event(listener.as_ref());
        }
    }
}
