use docrepo_store_core::ListenerRegistration;

use crate::change::Changeset;
use crate::error::RepositoryError;

/// One-shot completion callback. Invoked exactly once per operation.
pub type AsyncRepositoryCallback<T> = Box<dyn FnOnce(Result<T, RepositoryError>) + Send + 'static>;

/// Repeating callback for live subscriptions.
pub type RepositoryListener<D, C> =
    Box<dyn FnMut(Result<LiveUpdate<D, C>, RepositoryError>) + Send + 'static>;

/// Payload of one live notification.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveUpdate<D, C> {
    /// Current data; `None` when a listened document does not exist.
    pub data: Option<D>,
    /// Deltas since the previous notification. Only collection listeners
    /// carry a changeset.
    pub changes: Option<Changeset<C>>,
}

/// Handle for a live subscription.
///
/// Delivery stops on [`unsubscribe`](Self::unsubscribe) or when the handle
/// is dropped.
#[derive(Debug)]
pub struct Subscription {
    target: String,
    registration: ListenerRegistration,
}

impl Subscription {
    pub(crate) fn new(target: String, registration: ListenerRegistration) -> Self {
        Self {
            target,
            registration,
        }
    }

    /// Path being listened to: a collection or a single document.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn unsubscribe(self) {
        self.registration.remove();
    }
}
