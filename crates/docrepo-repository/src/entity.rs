use std::fmt;

use docrepo_store_core::{DocumentReference, DocumentSnapshot, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record type stored as one document in a collection.
///
/// The document body is the serde representation of the type. The
/// reference is not part of the body; keep it in a `#[serde(skip)]` field:
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct User {
///     name: String,
///     #[serde(skip)]
///     reference: Option<DocumentReference>,
/// }
///
/// impl Entity for User {
///     fn reference(&self) -> Option<&DocumentReference> {
///         self.reference.as_ref()
///     }
///
///     fn set_reference(&mut self, reference: DocumentReference) {
///         self.reference = Some(reference);
///     }
/// }
/// ```
pub trait Entity:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Where this entity is stored. Always `Some` for entities read back
    /// through a repository.
    fn reference(&self) -> Option<&DocumentReference>;

    /// Attach the storage location after a read.
    fn set_reference(&mut self, reference: DocumentReference);

    /// The document id, if the entity has been stored.
    fn id(&self) -> Option<&str> {
        self.reference().map(|reference| reference.id())
    }
}

/// Decode a snapshot into an entity carrying the snapshot's reference.
pub(crate) fn from_snapshot<E: Entity>(
    snapshot: &DocumentSnapshot,
) -> Result<Option<E>, StoreError> {
    Ok(snapshot.to_object::<E>()?.map(|mut entity| {
        entity.set_reference(snapshot.reference.clone());
        entity
    }))
}

/// Decode every existing document of a query result.
pub(crate) fn from_snapshots<E: Entity>(
    snapshots: &[DocumentSnapshot],
) -> Result<Vec<E>, StoreError> {
    snapshots
        .iter()
        .filter_map(|snapshot| from_snapshot(snapshot).transpose())
        .collect()
}
