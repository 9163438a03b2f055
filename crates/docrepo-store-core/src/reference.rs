use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a named collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionReference {
    path: String,
}

impl CollectionReference {
    /// Create a reference to the collection at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The collection path, e.g. `"users"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reference to the document `id` inside this collection.
    pub fn document(&self, id: impl Into<String>) -> DocumentReference {
        DocumentReference {
            collection_path: self.path.clone(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Opaque location of a single document: its collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentReference {
    collection_path: String,
    id: String,
}

impl DocumentReference {
    /// The document id within its collection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of the owning collection.
    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// Full document path, `"{collection}/{id}"`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection_path, self.id)
    }

    /// The collection this document lives in.
    pub fn parent(&self) -> CollectionReference {
        CollectionReference::new(self.collection_path.clone())
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection_path, self.id)
    }
}
