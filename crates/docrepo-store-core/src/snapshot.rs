use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::reference::DocumentReference;

/// Body of a stored document: a JSON object.
pub type DocumentData = serde_json::Map<String, serde_json::Value>;

/// Serialize a value into a document body.
///
/// Fails with `InvalidArgument` if the value does not serialize to an object.
pub fn to_document_data<T: Serialize + ?Sized>(value: &T) -> Result<DocumentData, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidArgument(format!(
            "document body must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Point-in-time view of a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub reference: DocumentReference,
    /// `None` when the document does not exist.
    pub data: Option<DocumentData>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentSnapshot {
    /// Snapshot of a document that does not exist.
    pub fn missing(reference: DocumentReference) -> Self {
        Self {
            reference,
            data: None,
            create_time: None,
            update_time: None,
        }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Deserialize the document body, or `None` if the document is missing.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        match &self.data {
            Some(data) => {
                let value = serde_json::Value::Object(data.clone());
                serde_json::from_value(value).map(Some).map_err(|e| {
                    StoreError::Serialization(format!(
                        "Failed to decode {}: {}",
                        self.reference, e
                    ))
                })
            }
            None => Ok(None),
        }
    }
}

/// Kind of delta reported for one document in a live query.
///
/// The ordinals are part of the contract: consumers map these by position,
/// so new variants go at the end of `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DocumentChangeType {
    Added = 0,
    Modified = 1,
    Removed = 2,
}

impl DocumentChangeType {
    /// Every variant, in ordinal order.
    pub const ALL: [DocumentChangeType; 3] = [
        DocumentChangeType::Added,
        DocumentChangeType::Modified,
        DocumentChangeType::Removed,
    ];

    /// Number of variants.
    pub const COUNT: usize = Self::ALL.len();

    pub const fn ordinal(self) -> usize {
        match self {
            DocumentChangeType::Added => 0,
            DocumentChangeType::Modified => 1,
            DocumentChangeType::Removed => 2,
        }
    }
}

// `ALL` lists each variant once, at its own ordinal. Together with the
// exhaustive match above, a new variant cannot be left out of `COUNT`.
const _: () = {
    let mut index = 0;
    while index < DocumentChangeType::COUNT {
        assert!(DocumentChangeType::ALL[index].ordinal() == index);
        index += 1;
    }
};

/// One document's delta between two consecutive query snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: DocumentChangeType,
    /// Position in the previous snapshot; `None` for `Added`.
    pub old_index: Option<usize>,
    /// Position in the new snapshot; `None` for `Removed`.
    pub new_index: Option<usize>,
    /// The document after the change (before it, for `Removed`).
    pub document: DocumentSnapshot,
}

/// Result of a collection read, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub documents: Vec<DocumentSnapshot>,
    /// Deltas since the previous snapshot. Empty for one-shot reads.
    #[serde(default)]
    pub changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CollectionReference;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Note {
        title: String,
    }

    #[test]
    fn test_to_document_data_rejects_non_objects() {
        let err = to_document_data(&42).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(err.to_string().contains("number"));

        let data = to_document_data(&json!({"title": "hello"})).unwrap();
        assert_eq!(data["title"], "hello");
    }

    #[test]
    fn test_to_object() {
        let reference = CollectionReference::new("notes").document("n1");
        let snapshot = DocumentSnapshot {
            reference: reference.clone(),
            data: Some(to_document_data(&json!({"title": "hello"})).unwrap()),
            create_time: Some(Utc::now()),
            update_time: Some(Utc::now()),
        };

        let note: Option<Note> = snapshot.to_object().unwrap();
        assert_eq!(
            note,
            Some(Note {
                title: "hello".to_string()
            })
        );

        let missing = DocumentSnapshot::missing(reference);
        assert!(!missing.exists());
        assert_eq!(missing.to_object::<Note>().unwrap(), None);
    }

    #[test]
    fn test_to_object_reports_reference_on_failure() {
        let snapshot = DocumentSnapshot {
            reference: CollectionReference::new("notes").document("broken"),
            data: Some(to_document_data(&json!({"title": 7})).unwrap()),
            create_time: None,
            update_time: None,
        };

        let err = snapshot.to_object::<Note>().unwrap_err();
        assert!(err.to_string().contains("notes/broken"));
    }

    #[test]
    fn test_change_type_ordinals() {
        assert_eq!(DocumentChangeType::Added.ordinal(), 0);
        assert_eq!(DocumentChangeType::Modified.ordinal(), 1);
        assert_eq!(DocumentChangeType::Removed.ordinal(), 2);
    }

    #[test]
    fn test_change_type_count_covers_every_variant() {
        assert_eq!(DocumentChangeType::COUNT, DocumentChangeType::ALL.len());
        for (index, kind) in DocumentChangeType::ALL.into_iter().enumerate() {
            assert_eq!(kind.ordinal(), index);
            // Every variant must round-trip through its ordinal.
            assert_eq!(DocumentChangeType::ALL[kind.ordinal()], kind);
        }
    }
}
