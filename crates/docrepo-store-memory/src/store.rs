use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docrepo_store_core::{
    CollectionReference, DocumentData, DocumentReference, DocumentSnapshot, DocumentStore,
    ListenerRegistration, QuerySnapshot, SnapshotListener, StoreError, WriteBatch, WriteOperation,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::diff::diff_snapshots;

/// Write events buffered per listener before it is reported as lagging.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Length of store-assigned document ids.
const GENERATED_ID_LEN: usize = 20;

/// Initial contents: collection path -> document id -> body.
pub type Seed = BTreeMap<String, BTreeMap<String, DocumentData>>;

type Collections = BTreeMap<String, BTreeMap<String, StoredDocument>>;

#[derive(Debug, Clone)]
struct StoredDocument {
    data: DocumentData,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl StoredDocument {
    fn snapshot(&self, reference: DocumentReference) -> DocumentSnapshot {
        DocumentSnapshot {
            reference,
            data: Some(self.data.clone()),
            create_time: Some(self.create_time),
            update_time: Some(self.update_time),
        }
    }
}

struct State {
    collections: Collections,
    /// Number of commits that changed something.
    version: u64,
}

impl State {
    fn document(&self, reference: &DocumentReference) -> DocumentSnapshot {
        self.collections
            .get(reference.collection_path())
            .and_then(|docs| docs.get(reference.id()))
            .map(|stored| stored.snapshot(reference.clone()))
            .unwrap_or_else(|| DocumentSnapshot::missing(reference.clone()))
    }

    fn documents(&self, collection: &CollectionReference) -> Vec<DocumentSnapshot> {
        self.collections
            .get(collection.path())
            .map(|docs| {
                docs.iter()
                    .map(|(id, stored)| stored.snapshot(collection.document(id.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Documents of one collection that changed in a single commit, with the
/// collection as that commit left it.
#[derive(Debug, Clone)]
struct WriteEvent {
    version: u64,
    collection: String,
    ids: BTreeSet<String>,
    /// Ordered by id.
    documents: Arc<Vec<DocumentSnapshot>>,
}

impl WriteEvent {
    fn touches(&self, reference: &DocumentReference) -> bool {
        self.collection == reference.collection_path() && self.ids.contains(reference.id())
    }

    fn document(&self, reference: &DocumentReference) -> DocumentSnapshot {
        self.documents
            .binary_search_by(|doc| doc.reference.id().cmp(reference.id()))
            .map(|index| self.documents[index].clone())
            .unwrap_or_else(|_| DocumentSnapshot::missing(reference.clone()))
    }
}

struct Inner {
    state: RwLock<State>,
    events: broadcast::Sender<WriteEvent>,
}

impl Inner {
    async fn document(&self, reference: &DocumentReference) -> (u64, DocumentSnapshot) {
        let state = self.state.read().await;
        (state.version, state.document(reference))
    }

    async fn documents(&self, collection: &CollectionReference) -> (u64, Vec<DocumentSnapshot>) {
        let state = self.state.read().await;
        (state.version, state.documents(collection))
    }
}

/// In-memory document store.
///
/// Organizes documents by collection path, each collection ordered by id:
/// ```text
/// {collection_path}/
///   {document_id} -> { body, create_time, update_time }
/// ```
///
/// Batches are applied under a single write lock, so readers never observe
/// half of a commit. Live listeners run as tokio tasks and are fed by a
/// broadcast channel of write events, each carrying the state its commit
/// produced. They hold only a weak reference to the store and end when it
/// is dropped.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_seed(Seed::new())
    }

    /// Create a store pre-populated with `seed`.
    pub fn from_seed(seed: Seed) -> Self {
        let now = Utc::now();
        let collections = seed
            .into_iter()
            .map(|(path, docs)| {
                let docs = docs
                    .into_iter()
                    .map(|(id, data)| {
                        (
                            id,
                            StoredDocument {
                                data,
                                create_time: now,
                                update_time: now,
                            },
                        )
                    })
                    .collect();
                (path, docs)
            })
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    collections,
                    version: 0,
                }),
                events,
            }),
        }
    }

    /// Load a seed file of the form `{ "<collection>": { "<id>": { ... } } }`.
    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to read seed {}: {}", path.display(), e))
        })?;
        let seed: Seed = serde_json::from_slice(&raw).map_err(|e| {
            StoreError::Serialization(format!("Invalid seed {}: {}", path.display(), e))
        })?;

        debug!(
            "Loaded seed {} ({} collection(s))",
            path.display(),
            seed.len()
        );
        Ok(Self::from_seed(seed))
    }

    /// Number of documents currently stored in `collection`.
    pub async fn document_count(&self, collection: &CollectionReference) -> usize {
        self.inner
            .state
            .read()
            .await
            .collections
            .get(collection.path())
            .map_or(0, |docs| docs.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_collection(path: &str) -> Result<(), StoreError> {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(StoreError::InvalidArgument(format!(
            "invalid collection path {:?}",
            path
        )));
    }
    Ok(())
}

fn validate_reference(reference: &DocumentReference) -> Result<(), StoreError> {
    validate_collection(reference.collection_path())?;
    let id = reference.id();
    if id.is_empty() || id.contains('/') {
        return Err(StoreError::InvalidArgument(format!(
            "invalid document id {:?}",
            id
        )));
    }
    Ok(())
}

fn contains(collections: &Collections, reference: &DocumentReference) -> bool {
    collections
        .get(reference.collection_path())
        .is_some_and(|docs| docs.contains_key(reference.id()))
}

fn mark(touched: &mut BTreeMap<String, BTreeSet<String>>, reference: &DocumentReference) {
    touched
        .entry(reference.collection_path().to_string())
        .or_default()
        .insert(reference.id().to_string());
}

async fn read_document(
    inner: &Weak<Inner>,
    reference: &DocumentReference,
) -> Option<(u64, DocumentSnapshot)> {
    let inner = inner.upgrade()?;
    let read = inner.document(reference).await;
    Some(read)
}

async fn read_documents(
    inner: &Weak<Inner>,
    collection: &CollectionReference,
) -> Option<(u64, Vec<DocumentSnapshot>)> {
    let inner = inner.upgrade()?;
    let read = inner.documents(collection).await;
    Some(read)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn new_document_id(&self) -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(GENERATED_ID_LEN);
        id
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    async fn get_document(
        &self,
        reference: &DocumentReference,
    ) -> Result<DocumentSnapshot, StoreError> {
        validate_reference(reference)?;
        let (_, snapshot) = self.inner.document(reference).await;
        Ok(snapshot)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_documents(
        &self,
        collection: &CollectionReference,
    ) -> Result<QuerySnapshot, StoreError> {
        validate_collection(collection.path())?;
        let (_, documents) = self.inner.documents(collection).await;
        debug!("Read {} document(s) from {}", documents.len(), collection);
        Ok(QuerySnapshot {
            documents,
            changes: Vec::new(),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    #[instrument(skip(self, batch), level = "debug", fields(operations = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        for op in batch.operations() {
            validate_reference(op.reference())?;
        }

        let now = Utc::now();
        let mut touched: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut events = Vec::new();
        {
            let mut state = self.inner.state.write().await;
            let collections = &mut state.collections;

            // Track existence through the batch so an update after a set or
            // delete in the same batch sees that earlier write.
            {
                let mut exists_after: HashMap<&DocumentReference, bool> = HashMap::new();
                for op in batch.operations() {
                    let reference = op.reference();
                    match op {
                        WriteOperation::Set { .. } => {
                            exists_after.insert(reference, true);
                        }
                        WriteOperation::Delete { .. } => {
                            exists_after.insert(reference, false);
                        }
                        WriteOperation::Update { .. } => {
                            let exists = match exists_after.get(reference) {
                                Some(&exists) => exists,
                                None => contains(collections, reference),
                            };
                            if !exists {
                                return Err(StoreError::NotFound(format!(
                                    "No document to update: {}",
                                    reference
                                )));
                            }
                        }
                    }
                }
            }

            for op in batch.into_operations() {
                match op {
                    WriteOperation::Set { reference, data } => {
                        let docs = collections
                            .entry(reference.collection_path().to_string())
                            .or_default();
                        let create_time = docs
                            .get(reference.id())
                            .map_or(now, |existing| existing.create_time);
                        docs.insert(
                            reference.id().to_string(),
                            StoredDocument {
                                data,
                                create_time,
                                update_time: now,
                            },
                        );
                        mark(&mut touched, &reference);
                    }
                    WriteOperation::Update { reference, data } => {
                        if let Some(existing) = collections
                            .get_mut(reference.collection_path())
                            .and_then(|docs| docs.get_mut(reference.id()))
                        {
                            existing.data = data;
                            existing.update_time = now;
                            mark(&mut touched, &reference);
                        }
                    }
                    WriteOperation::Delete { reference } => {
                        let removed = collections
                            .get_mut(reference.collection_path())
                            .and_then(|docs| docs.remove(reference.id()));
                        if removed.is_some() {
                            mark(&mut touched, &reference);
                        }
                    }
                }
            }

            if !touched.is_empty() {
                state.version += 1;
            }

            // A listener subscribing after this check reads its initial state
            // once the write lock is released, so it cannot miss this commit.
            let listening = self.inner.events.receiver_count() > 0;
            for (collection, ids) in touched {
                debug!("Committed {} change(s) to {}", ids.len(), collection);
                if !listening {
                    continue;
                }
                let documents = state.documents(&CollectionReference::new(collection.clone()));
                events.push(WriteEvent {
                    version: state.version,
                    collection,
                    ids,
                    documents: Arc::new(documents),
                });
            }
        }

        for event in events {
            // An error here only means every listener has gone away.
            let _ = self.inner.events.send(event);
        }

        Ok(())
    }

    // =========================================================================
    // Live listeners
    // =========================================================================

    fn listen_document(
        &self,
        reference: &DocumentReference,
        mut listener: SnapshotListener<DocumentSnapshot>,
    ) -> ListenerRegistration {
        if let Err(e) = validate_reference(reference) {
            listener(Err(e));
            return ListenerRegistration::noop();
        }

        // Subscribe before reading the initial state so no write is missed.
        let mut events = self.inner.events.subscribe();
        let inner = Arc::downgrade(&self.inner);
        let reference = reference.clone();
        debug!("Listening to document {}", reference);

        let task = tokio::spawn(async move {
            let Some((mut version, initial)) = read_document(&inner, &reference).await else {
                return;
            };
            listener(Ok(initial));

            loop {
                let snapshot = match events.recv().await {
                    // Commits at or before `version` are already delivered.
                    Ok(event) if event.touches(&reference) && event.version > version => {
                        version = event.version;
                        event.document(&reference)
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Listener for {} lagged by {} event(s), resending current state",
                            reference, skipped
                        );
                        let Some((current, snapshot)) = read_document(&inner, &reference).await
                        else {
                            break;
                        };
                        version = current;
                        snapshot
                    }
                    Err(RecvError::Closed) => break,
                };
                listener(Ok(snapshot));
            }

            debug!("Document listener for {} finished", reference);
        });

        let abort = task.abort_handle();
        ListenerRegistration::new(move || abort.abort())
    }

    fn listen_collection(
        &self,
        collection: &CollectionReference,
        mut listener: SnapshotListener<QuerySnapshot>,
    ) -> ListenerRegistration {
        if let Err(e) = validate_collection(collection.path()) {
            listener(Err(e));
            return ListenerRegistration::noop();
        }

        let mut events = self.inner.events.subscribe();
        let inner = Arc::downgrade(&self.inner);
        let collection = collection.clone();
        debug!("Listening to collection {}", collection);

        let task = tokio::spawn(async move {
            let Some((mut version, mut previous)) = read_documents(&inner, &collection).await
            else {
                return;
            };
            listener(Ok(QuerySnapshot {
                changes: diff_snapshots(&[], &previous),
                documents: previous.clone(),
            }));

            loop {
                let current = match events.recv().await {
                    // Commits at or before `version` are already delivered.
                    Ok(event)
                        if event.collection == collection.path() && event.version > version =>
                    {
                        version = event.version;
                        event.documents.as_ref().clone()
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Listener for {} lagged by {} event(s), diffing against current state",
                            collection, skipped
                        );
                        let Some((current, documents)) = read_documents(&inner, &collection).await
                        else {
                            break;
                        };
                        version = current;
                        documents
                    }
                    Err(RecvError::Closed) => break,
                };
                let changes = diff_snapshots(&previous, &current);
                if changes.is_empty() {
                    continue;
                }
                previous = current;
                listener(Ok(QuerySnapshot {
                    documents: previous.clone(),
                    changes,
                }));
            }

            debug!("Collection listener for {} finished", collection);
        });

        let abort = task.abort_handle();
        ListenerRegistration::new(move || abort.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_store_core::to_document_data;
    use serde_json::json;

    fn body(value: serde_json::Value) -> DocumentData {
        to_document_data(&value).unwrap()
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.new_document_id();
        let b = store.new_document_id();

        assert_eq!(a.len(), GENERATED_ID_LEN);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_set_keeps_create_time() {
        let store = MemoryStore::new();
        let reference = CollectionReference::new("notes").document("n1");

        store
            .set_document(&reference, body(json!({"v": 1})))
            .await
            .unwrap();
        let first = store.get_document(&reference).await.unwrap();

        store
            .set_document(&reference, body(json!({"v": 2})))
            .await
            .unwrap();
        let second = store.get_document(&reference).await.unwrap();

        assert_eq!(first.create_time, second.create_time);
        assert!(second.update_time >= first.update_time);
        assert_eq!(second.data.unwrap()["v"], 2);
    }

    #[tokio::test]
    async fn test_update_after_set_in_same_batch() {
        let store = MemoryStore::new();
        let reference = CollectionReference::new("notes").document("fresh");

        let mut batch = WriteBatch::new();
        batch
            .set(reference.clone(), body(json!({"v": 1})))
            .update(reference.clone(), body(json!({"v": 2})));
        store.commit(batch).await.unwrap();

        let snapshot = store.get_document(&reference).await.unwrap();
        assert_eq!(snapshot.data.unwrap()["v"], 2);
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let store = MemoryStore::new();
        let notes = CollectionReference::new("notes");

        let err = store.get_document(&notes.document("")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = store
            .set_document(&notes.document("a/b"), DocumentData::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = store
            .get_documents(&CollectionReference::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
