//! Core traits and types for docrepo document store backends.
//!
//! This crate defines the abstractions a repository needs from a document
//! database client:
//! - `DocumentStore`: reads, batched writes and live listeners
//! - `DocumentReference` / `CollectionReference`: document locations
//! - `DocumentSnapshot` / `QuerySnapshot` / `DocumentChange`: read results
//! - `ListenerRegistration`: cancellation handle for live listeners

mod batch;
mod error;
mod listener;
mod reference;
mod snapshot;
mod store;

pub use batch::{WriteBatch, WriteOperation};
pub use error::StoreError;
pub use listener::{ListenerRegistration, SnapshotListener};
pub use reference::{CollectionReference, DocumentReference};
pub use snapshot::{
    to_document_data, DocumentChange, DocumentChangeType, DocumentData, DocumentSnapshot,
    QuerySnapshot,
};
pub use store::DocumentStore;
