use std::fmt;

use crate::error::StoreError;

/// Callback invoked by a store for every live snapshot, or for a listen error.
pub type SnapshotListener<T> = Box<dyn FnMut(Result<T, StoreError>) + Send + 'static>;

/// Handle for a live listener registered with a store.
///
/// Calling [`remove`](Self::remove) or dropping the handle stops delivery.
/// A snapshot already being delivered may still reach the listener.
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerRegistration {
    /// Wrap the store-specific teardown for one listener.
    pub fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A registration with nothing to tear down.
    pub fn noop() -> Self {
        Self { remove: None }
    }

    /// Stop the listener.
    pub fn remove(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_remove_runs_teardown_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = ListenerRegistration::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registration.remove();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_runs_teardown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _registration = ListenerRegistration::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
