use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use docrepo_store_core::{
    to_document_data, CollectionReference, DocumentReference, DocumentSnapshot, DocumentStore,
    QuerySnapshot, StoreError, WriteBatch,
};

use crate::callback::{AsyncRepositoryCallback, LiveUpdate, Subscription};
use crate::change::{Change, Changeset};
use crate::config::{EmptyBatchPolicy, RepositoryConfig};
use crate::entity::{self, Entity};
use crate::error::RepositoryError;
use crate::log::{DebugLog, NoopLog, OperationLog, TracingLog};
use crate::target::DeleteTarget;

/// CRUD and live-subscription access to one collection of `E`.
///
/// Every one-shot operation returns immediately and reports its outcome to
/// the callback exactly once, from a tokio task. Store errors reach the
/// callback unchanged as `RepositoryError::Store`; nothing is retried.
///
/// Live operations return a [`Subscription`] and invoke the listener once
/// per store notification until it is unsubscribed or dropped.
///
/// Must be used from within a tokio runtime.
pub struct Repository<E> {
    store: Arc<dyn DocumentStore>,
    collection: CollectionReference,
    config: RepositoryConfig,
    log: Arc<dyn DebugLog>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// Create a repository over `collection_path` with default settings.
    pub fn new(store: Arc<dyn DocumentStore>, collection_path: impl Into<String>) -> Self {
        Self::with_config(store, collection_path, RepositoryConfig::default())
    }

    /// Create a repository with explicit settings. `config.debug` installs
    /// [`TracingLog`]; otherwise operations are not logged.
    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        collection_path: impl Into<String>,
        config: RepositoryConfig,
    ) -> Self {
        let log: Arc<dyn DebugLog> = if config.debug {
            Arc::new(TracingLog)
        } else {
            Arc::new(NoopLog)
        };

        Self {
            store,
            collection: CollectionReference::new(collection_path),
            config,
            log,
            _entity: PhantomData,
        }
    }

    /// Replace the diagnostic log.
    pub fn with_debug_log(mut self, log: Arc<dyn DebugLog>) -> Self {
        self.log = log;
        self
    }

    pub fn collection(&self) -> &CollectionReference {
        &self.collection
    }

    pub fn collection_path(&self) -> &str {
        self.collection.path()
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Whether a document with `id` exists.
    pub fn exists(
        &self,
        id: impl Into<String>,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        let id = id.into();
        self.trace("exists", || vec![("id", format!("{:?}", id))]);

        let store = Arc::clone(&self.store);
        let reference = self.collection.document(id);
        dispatch(
            async move {
                store
                    .document_exists(&reference)
                    .await
                    .map_err(RepositoryError::from)
            },
            Box::new(callback),
        );
    }

    /// Fetch one entity; `None` if the document does not exist.
    pub fn get(
        &self,
        id: impl Into<String>,
        callback: impl FnOnce(Result<Option<E>, RepositoryError>) + Send + 'static,
    ) {
        let id = id.into();
        self.trace("get", || vec![("id", format!("{:?}", id))]);

        let store = Arc::clone(&self.store);
        let reference = self.collection.document(id);
        dispatch(
            async move { fetch_document::<E>(store.as_ref(), &reference).await },
            Box::new(callback),
        );
    }

    /// Fetch the whole collection, ordered as the store orders it.
    pub fn get_all(
        &self,
        callback: impl FnOnce(Result<Vec<E>, RepositoryError>) + Send + 'static,
    ) {
        self.trace("get_all", Vec::new);

        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        dispatch(
            async move { fetch_documents::<E>(store.as_ref(), &collection).await },
            Box::new(callback),
        );
    }

    // =========================================================================
    // Live reads
    // =========================================================================

    /// Listen to one document. The listener receives the current state, then
    /// one update per change to that document. `changes` is always `None`.
    pub fn listen(
        &self,
        id: impl Into<String>,
        mut listener: impl FnMut(Result<LiveUpdate<E, E>, RepositoryError>) + Send + 'static,
    ) -> Subscription {
        let id = id.into();
        self.trace("listen", || vec![("id", format!("{:?}", id))]);

        let reference = self.collection.document(id);
        let registration = self.store.listen_document(
            &reference,
            Box::new(move |result: Result<DocumentSnapshot, StoreError>| {
                listener(document_update::<E>(result))
            }),
        );
        Subscription::new(reference.path(), registration)
    }

    /// Listen to the whole collection. Each update carries every entity plus
    /// the changeset since the previous update.
    pub fn listen_all(
        &self,
        mut listener: impl FnMut(Result<LiveUpdate<Vec<E>, E>, RepositoryError>) + Send + 'static,
    ) -> Subscription {
        self.trace("listen_all", Vec::new);

        let registration = self.store.listen_collection(
            &self.collection,
            Box::new(move |result: Result<QuerySnapshot, StoreError>| {
                listener(collection_update::<E>(result))
            }),
        );
        Subscription::new(self.collection.path().to_string(), registration)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `entity` under `id`, or under a store-assigned id when `None`.
    /// An existing document with the same id is overwritten.
    pub fn create(
        &self,
        entity: E,
        id: Option<String>,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        self.trace("create", || {
            vec![
                ("entity", format!("{:?}", entity)),
                ("id", format!("{:?}", id)),
            ]
        });

        let batch =
            self.create_batch(std::slice::from_ref(&entity), std::slice::from_ref(&id));
        self.commit(batch, Box::new(callback));
    }

    /// Store several entities in one atomic batch.
    ///
    /// `ids` is aligned with `entities` by position. Entities past the end of
    /// `ids`, or paired with `None`, get store-assigned ids; extra ids are
    /// ignored.
    pub fn create_all(
        &self,
        entities: Vec<E>,
        ids: Option<Vec<Option<String>>>,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        self.trace("create_all", || {
            vec![
                ("entities", format!("{:?}", entities)),
                ("ids", format!("{:?}", ids)),
            ]
        });

        if entities.is_empty() {
            return self.finish_empty("create_all", Box::new(callback));
        }

        let ids = ids.unwrap_or_default();
        let batch = self.create_batch(&entities, &ids);
        self.commit(batch, Box::new(callback));
    }

    /// Overwrite the stored body of `entity` at its own reference.
    pub fn update(
        &self,
        entity: E,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        self.trace("update", || vec![("entity", format!("{:?}", entity))]);

        let batch = self.update_batch("update", std::slice::from_ref(&entity));
        self.commit(batch, Box::new(callback));
    }

    /// Update several entities in one atomic batch.
    pub fn update_all(
        &self,
        entities: Vec<E>,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        self.trace("update_all", || vec![("entities", format!("{:?}", entities))]);

        if entities.is_empty() {
            return self.finish_empty("update_all", Box::new(callback));
        }

        let batch = self.update_batch("update_all", &entities);
        self.commit(batch, Box::new(callback));
    }

    /// Delete entities or ids in one atomic batch. Deleting a document that
    /// does not exist is left to the store's semantics.
    pub fn delete(
        &self,
        target: DeleteTarget<E>,
        callback: impl FnOnce(Result<bool, RepositoryError>) + Send + 'static,
    ) {
        self.trace("delete", || vec![("target", format!("{:?}", target))]);

        if target.is_empty() {
            return self.finish_empty("delete", Box::new(callback));
        }

        let batch = self.delete_batch(target);
        self.commit(batch, Box::new(callback));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn trace(
        &self,
        operation: &'static str,
        arguments: impl FnOnce() -> Vec<(&'static str, String)>,
    ) {
        if !self.log.enabled() {
            return;
        }
        self.log.operation(&OperationLog {
            operation,
            collection_path: self.collection.path(),
            arguments: arguments(),
        });
    }

    fn create_batch(
        &self,
        entities: &[E],
        ids: &[Option<String>],
    ) -> Result<WriteBatch, RepositoryError> {
        let mut batch = WriteBatch::new();
        for (index, entity) in entities.iter().enumerate() {
            let id = match ids.get(index) {
                Some(Some(id)) => id.clone(),
                _ => self.store.new_document_id(),
            };
            batch.set(self.collection.document(id), to_document_data(entity)?);
        }
        Ok(batch)
    }

    fn update_batch(
        &self,
        operation: &'static str,
        entities: &[E],
    ) -> Result<WriteBatch, RepositoryError> {
        let mut batch = WriteBatch::new();
        for entity in entities {
            let reference = entity
                .reference()
                .cloned()
                .ok_or(RepositoryError::MissingReference { operation })?;
            batch.update(reference, to_document_data(entity)?);
        }
        Ok(batch)
    }

    fn delete_batch(&self, target: DeleteTarget<E>) -> Result<WriteBatch, RepositoryError> {
        let mut batch = WriteBatch::new();
        match target {
            DeleteTarget::ById(ids) => {
                for id in ids {
                    batch.delete(self.collection.document(id));
                }
            }
            DeleteTarget::ByEntity(entities) => {
                for entity in &entities {
                    let reference = entity
                        .reference()
                        .cloned()
                        .ok_or(RepositoryError::MissingReference { operation: "delete" })?;
                    batch.delete(reference);
                }
            }
        }
        Ok(batch)
    }

    fn commit(
        &self,
        batch: Result<WriteBatch, RepositoryError>,
        callback: AsyncRepositoryCallback<bool>,
    ) {
        let store = Arc::clone(&self.store);
        dispatch(commit_batch(store, batch), callback);
    }

    fn finish_empty(&self, operation: &'static str, callback: AsyncRepositoryCallback<bool>) {
        let result = match self.config.empty_batch {
            EmptyBatchPolicy::Accept => Ok(true),
            EmptyBatchPolicy::Reject => Err(RepositoryError::EmptyBatch { operation }),
        };
        dispatch(std::future::ready(result), callback);
    }
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            config: self.config.clone(),
            log: Arc::clone(&self.log),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("backend", &self.store.backend_name())
            .field("collection", &self.collection.path())
            .field("config", &self.config)
            .finish()
    }
}

/// Run `operation` on the runtime and hand its outcome to `callback`.
fn dispatch<T, F>(operation: F, callback: AsyncRepositoryCallback<T>)
where
    T: Send + 'static,
    F: Future<Output = Result<T, RepositoryError>> + Send + 'static,
{
    tokio::spawn(async move {
        callback(operation.await);
    });
}

async fn fetch_document<E: Entity>(
    store: &dyn DocumentStore,
    reference: &DocumentReference,
) -> Result<Option<E>, RepositoryError> {
    let snapshot = store.get_document(reference).await?;
    Ok(entity::from_snapshot(&snapshot)?)
}

async fn fetch_documents<E: Entity>(
    store: &dyn DocumentStore,
    collection: &CollectionReference,
) -> Result<Vec<E>, RepositoryError> {
    let snapshot = store.get_documents(collection).await?;
    Ok(entity::from_snapshots(&snapshot.documents)?)
}

async fn commit_batch(
    store: Arc<dyn DocumentStore>,
    batch: Result<WriteBatch, RepositoryError>,
) -> Result<bool, RepositoryError> {
    store.commit(batch?).await?;
    Ok(true)
}

fn document_update<E: Entity>(
    result: Result<DocumentSnapshot, StoreError>,
) -> Result<LiveUpdate<E, E>, RepositoryError> {
    let snapshot = result?;
    Ok(LiveUpdate {
        data: entity::from_snapshot(&snapshot)?,
        changes: None,
    })
}

fn collection_update<E: Entity>(
    result: Result<QuerySnapshot, StoreError>,
) -> Result<LiveUpdate<Vec<E>, E>, RepositoryError> {
    let snapshot = result?;
    let documents = entity::from_snapshots(&snapshot.documents)?;
    let changes = snapshot
        .changes
        .iter()
        .map(Change::<E>::from_document_change)
        .collect::<Result<Changeset<E>, StoreError>>()?;

    Ok(LiveUpdate {
        data: Some(documents),
        changes: Some(changes),
    })
}
