//! Callback-style repository over a docrepo document store.
//!
//! A [`Repository`] wraps one collection of a [`DocumentStore`] and exposes:
//! - one-shot reads and writes (`exists`, `get`, `get_all`, `create`,
//!   `create_all`, `update`, `update_all`, `delete`), each completing a
//!   callback exactly once
//! - live reads (`listen`, `listen_all`) that return a [`Subscription`]
//!
//! Errors from the store are passed through untouched inside
//! [`RepositoryError::Store`].
//!
//! [`DocumentStore`]: docrepo_store_core::DocumentStore

mod callback;
mod change;
mod config;
mod entity;
mod error;
mod log;
mod repository;
mod target;

pub use callback::{AsyncRepositoryCallback, LiveUpdate, RepositoryListener, Subscription};
pub use change::{Change, ChangeType, Changeset};
pub use config::{EmptyBatchPolicy, RepositoryConfig};
pub use entity::Entity;
pub use error::RepositoryError;
pub use log::{DebugLog, NoopLog, OperationLog, TracingLog};
pub use repository::Repository;
pub use target::DeleteTarget;

pub use docrepo_store_core::{DocumentReference, StoreError};
