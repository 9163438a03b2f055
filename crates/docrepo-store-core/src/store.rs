use async_trait::async_trait;

use crate::batch::WriteBatch;
use crate::error::StoreError;
use crate::listener::{ListenerRegistration, SnapshotListener};
use crate::reference::{CollectionReference, DocumentReference};
use crate::snapshot::{DocumentData, DocumentSnapshot, QuerySnapshot};

/// Document store abstraction consumed by the repository layer.
///
/// Implementations own transport, persistence, consistency and retries.
/// Callers get back whatever error the backend produced.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the backend identifier (e.g., "memory").
    fn backend_name(&self) -> &'static str;

    /// Allocate a fresh document id for a create without an explicit id.
    fn new_document_id(&self) -> String;

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch one document. A missing document is a snapshot with no data,
    /// not an error.
    async fn get_document(
        &self,
        reference: &DocumentReference,
    ) -> Result<DocumentSnapshot, StoreError>;

    /// Fetch every document of a collection, ordered by id.
    async fn get_documents(
        &self,
        collection: &CollectionReference,
    ) -> Result<QuerySnapshot, StoreError>;

    /// Check if a document exists.
    async fn document_exists(&self, reference: &DocumentReference) -> Result<bool, StoreError> {
        Ok(self.get_document(reference).await?.exists())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply all operations of `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Create or overwrite one document.
    async fn set_document(
        &self,
        reference: &DocumentReference,
        data: DocumentData,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(reference.clone(), data);
        self.commit(batch).await
    }

    /// Replace the body of an existing document.
    async fn update_document(
        &self,
        reference: &DocumentReference,
        data: DocumentData,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.update(reference.clone(), data);
        self.commit(batch).await
    }

    /// Delete one document.
    async fn delete_document(&self, reference: &DocumentReference) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(reference.clone());
        self.commit(batch).await
    }

    // =========================================================================
    // Live listeners
    // =========================================================================

    /// Listen to one document. The listener receives the current state and
    /// then one snapshot per change to that document.
    fn listen_document(
        &self,
        reference: &DocumentReference,
        listener: SnapshotListener<DocumentSnapshot>,
    ) -> ListenerRegistration;

    /// Listen to a whole collection. Each snapshot carries the document
    /// changes since the previous one.
    fn listen_collection(
        &self,
        collection: &CollectionReference,
        listener: SnapshotListener<QuerySnapshot>,
    ) -> ListenerRegistration;
}
