use std::collections::HashMap;

use docrepo_store_core::{DocumentChange, DocumentChangeType, DocumentSnapshot};

/// Compute the changes that turn `previous` into `current`.
///
/// Both slices must be ordered by document id. Removals come first with
/// their old index, followed by additions and modifications in the order of
/// `current`.
pub(crate) fn diff_snapshots(
    previous: &[DocumentSnapshot],
    current: &[DocumentSnapshot],
) -> Vec<DocumentChange> {
    let old_positions: HashMap<&str, usize> = previous
        .iter()
        .enumerate()
        .map(|(i, doc)| (doc.id(), i))
        .collect();
    let new_positions: HashMap<&str, usize> = current
        .iter()
        .enumerate()
        .map(|(i, doc)| (doc.id(), i))
        .collect();

    let mut changes = Vec::new();

    for (old_index, doc) in previous.iter().enumerate() {
        if !new_positions.contains_key(doc.id()) {
            changes.push(DocumentChange {
                kind: DocumentChangeType::Removed,
                old_index: Some(old_index),
                new_index: None,
                document: doc.clone(),
            });
        }
    }

    for (new_index, doc) in current.iter().enumerate() {
        match old_positions.get(doc.id()) {
            None => changes.push(DocumentChange {
                kind: DocumentChangeType::Added,
                old_index: None,
                new_index: Some(new_index),
                document: doc.clone(),
            }),
            Some(&old_index) if previous[old_index] != *doc => changes.push(DocumentChange {
                kind: DocumentChangeType::Modified,
                old_index: Some(old_index),
                new_index: Some(new_index),
                document: doc.clone(),
            }),
            Some(_) => {}
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_store_core::{to_document_data, CollectionReference};
    use serde_json::json;

    fn doc(id: &str, value: i64) -> DocumentSnapshot {
        DocumentSnapshot {
            reference: CollectionReference::new("items").document(id),
            data: Some(to_document_data(&json!({ "value": value })).unwrap()),
            create_time: None,
            update_time: None,
        }
    }

    #[test]
    fn test_initial_snapshot_is_all_added() {
        let current = vec![doc("a", 1), doc("b", 2)];
        let changes = diff_snapshots(&[], &current);

        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .all(|c| c.kind == DocumentChangeType::Added && c.old_index.is_none()));
        assert_eq!(changes[1].new_index, Some(1));
    }

    #[test]
    fn test_mixed_changes() {
        let previous = vec![doc("a", 1), doc("b", 2), doc("c", 3)];
        let current = vec![doc("b", 20), doc("c", 3), doc("d", 4)];
        let changes = diff_snapshots(&previous, &current);

        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].kind, DocumentChangeType::Removed);
        assert_eq!(changes[0].document.id(), "a");
        assert_eq!(changes[0].old_index, Some(0));
        assert_eq!(changes[0].new_index, None);

        assert_eq!(changes[1].kind, DocumentChangeType::Modified);
        assert_eq!(changes[1].document.id(), "b");
        assert_eq!(changes[1].old_index, Some(1));
        assert_eq!(changes[1].new_index, Some(0));

        assert_eq!(changes[2].kind, DocumentChangeType::Added);
        assert_eq!(changes[2].document.id(), "d");
        assert_eq!(changes[2].new_index, Some(2));
    }

    #[test]
    fn test_unchanged_is_empty() {
        let docs = vec![doc("a", 1)];
        assert!(diff_snapshots(&docs, &docs).is_empty());
    }
}
