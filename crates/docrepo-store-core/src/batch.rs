use serde::{Deserialize, Serialize};

use crate::reference::DocumentReference;
use crate::snapshot::DocumentData;

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOperation {
    /// Create or overwrite the document.
    Set {
        reference: DocumentReference,
        data: DocumentData,
    },
    /// Replace the body of an existing document. Fails if it is missing.
    Update {
        reference: DocumentReference,
        data: DocumentData,
    },
    /// Remove the document. Missing documents are not an error.
    Delete { reference: DocumentReference },
}

impl WriteOperation {
    pub fn reference(&self) -> &DocumentReference {
        match self {
            WriteOperation::Set { reference, .. } => reference,
            WriteOperation::Update { reference, .. } => reference,
            WriteOperation::Delete { reference } => reference,
        }
    }
}

/// Ordered writes that a store commits atomically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    operations: Vec<WriteOperation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, reference: DocumentReference, data: DocumentData) -> &mut Self {
        self.operations
            .push(WriteOperation::Set { reference, data });
        self
    }

    pub fn update(&mut self, reference: DocumentReference, data: DocumentData) -> &mut Self {
        self.operations
            .push(WriteOperation::Update { reference, data });
        self
    }

    pub fn delete(&mut self, reference: DocumentReference) -> &mut Self {
        self.operations.push(WriteOperation::Delete { reference });
        self
    }

    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<WriteOperation> {
        self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CollectionReference;

    #[test]
    fn test_batch_keeps_order() {
        let users = CollectionReference::new("users");
        let mut batch = WriteBatch::new();
        batch
            .set(users.document("a"), DocumentData::new())
            .update(users.document("b"), DocumentData::new())
            .delete(users.document("c"));

        let ids: Vec<&str> = batch
            .operations()
            .iter()
            .map(|op| op.reference().id())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(batch.len(), 3);
        assert!(matches!(
            batch.operations()[2],
            WriteOperation::Delete { .. }
        ));
    }
}
