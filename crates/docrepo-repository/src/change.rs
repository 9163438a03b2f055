//! Per-item deltas delivered with live collection updates.

use std::collections::HashSet;

use docrepo_store_core::{DocumentChange, DocumentChangeType, StoreError};

use crate::entity::{self, Entity};

/// Kind of change to one item of a live result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    /// Variants in ordinal order. Store change types map onto this by position.
    pub const ALL: [ChangeType; 3] = [ChangeType::Added, ChangeType::Modified, ChangeType::Removed];

    pub const fn ordinal(self) -> usize {
        match self {
            ChangeType::Added => 0,
            ChangeType::Modified => 1,
            ChangeType::Removed => 2,
        }
    }
}

// A store change type without a counterpart here must fail the build
// instead of mapping onto the wrong variant.
const _: () = {
    assert!(ChangeType::ALL.len() == DocumentChangeType::COUNT);
    let mut index = 0;
    while index < ChangeType::ALL.len() {
        assert!(ChangeType::ALL[index].ordinal() == index);
        index += 1;
    }
};

impl From<DocumentChangeType> for ChangeType {
    fn from(kind: DocumentChangeType) -> Self {
        ChangeType::ALL[kind.ordinal()]
    }
}

/// One item's delta within a live result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub change_type: ChangeType,
    /// Position before the change; `None` for `Added`.
    pub old_index: Option<usize>,
    /// Position after the change; `None` for `Removed`.
    pub new_index: Option<usize>,
    pub data: Option<T>,
}

impl<E: Entity> Change<E> {
    pub(crate) fn from_document_change(change: &DocumentChange) -> Result<Self, StoreError> {
        Ok(Change {
            change_type: change.kind.into(),
            old_index: change.old_index,
            new_index: change.new_index,
            data: entity::from_snapshot(&change.document)?,
        })
    }
}

/// Position of a change within one update. Equal changes share a key.
type ChangeKey = (ChangeType, Option<usize>, Option<usize>);

fn key<T>(change: &Change<T>) -> ChangeKey {
    (change.change_type, change.old_index, change.new_index)
}

/// Changes delivered together on one live update.
///
/// Behaves as a set: inserting a change equal to one already present is a
/// no-op. Iteration follows insertion order. Changes are indexed by kind
/// and position, so only changes sharing both are compared by data.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset<T> {
    changes: Vec<Change<T>>,
    keys: HashSet<ChangeKey>,
}

impl<T> Changeset<T> {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change<T>> {
        self.changes.iter()
    }

    /// Changes of one kind.
    pub fn of_type(&self, change_type: ChangeType) -> impl Iterator<Item = &Change<T>> {
        self.changes
            .iter()
            .filter(move |change| change.change_type == change_type)
    }
}

impl<T: PartialEq> Changeset<T> {
    /// Add `change` unless an equal change is already present.
    /// Returns whether it was added.
    pub fn insert(&mut self, change: Change<T>) -> bool {
        if !self.keys.insert(key(&change)) && self.changes.contains(&change) {
            return false;
        }
        self.changes.push(change);
        true
    }

    pub fn contains(&self, change: &Change<T>) -> bool {
        self.keys.contains(&key(change)) && self.changes.contains(change)
    }
}

impl<T> Default for Changeset<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> FromIterator<Change<T>> for Changeset<T> {
    fn from_iter<I: IntoIterator<Item = Change<T>>>(iter: I) -> Self {
        let mut changeset = Changeset::new();
        for change in iter {
            changeset.insert(change);
        }
        changeset
    }
}

impl<T> IntoIterator for Changeset<T> {
    type Item = Change<T>;
    type IntoIter = std::vec::IntoIter<Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Changeset<T> {
    type Item = &'a Change<T>;
    type IntoIter = std::slice::Iter<'a, Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_follows_store_ordinals() {
        let mapped: Vec<ChangeType> = DocumentChangeType::ALL
            .into_iter()
            .map(ChangeType::from)
            .collect();

        assert_eq!(mapped, ChangeType::ALL.to_vec());
        for kind in DocumentChangeType::ALL {
            assert_eq!(ChangeType::from(kind).ordinal(), kind.ordinal());
        }
    }

    #[test]
    fn test_change_type_mapping_is_stable() {
        for _ in 0..3 {
            assert_eq!(
                ChangeType::from(DocumentChangeType::Added),
                ChangeType::Added
            );
            assert_eq!(
                ChangeType::from(DocumentChangeType::Modified),
                ChangeType::Modified
            );
            assert_eq!(
                ChangeType::from(DocumentChangeType::Removed),
                ChangeType::Removed
            );
        }
        for kind in ChangeType::ALL {
            assert_eq!(ChangeType::ALL[kind.ordinal()], kind);
        }
    }

    #[test]
    fn test_changeset_collapses_duplicates() {
        let added = Change {
            change_type: ChangeType::Added,
            old_index: None,
            new_index: Some(0),
            data: Some("a"),
        };
        let removed = Change {
            change_type: ChangeType::Removed,
            old_index: Some(3),
            new_index: None,
            data: Some("b"),
        };

        let changeset: Changeset<&str> =
            vec![added.clone(), removed.clone(), added.clone()].into_iter().collect();

        assert_eq!(changeset.len(), 2);
        assert!(changeset.contains(&added));
        assert!(changeset.contains(&removed));
        assert_eq!(changeset.of_type(ChangeType::Removed).count(), 1);
        assert_eq!(changeset.of_type(ChangeType::Modified).count(), 0);
    }

    #[test]
    fn test_changeset_same_position_different_data() {
        let first = Change {
            change_type: ChangeType::Modified,
            old_index: Some(1),
            new_index: Some(1),
            data: Some("before"),
        };
        let second = Change {
            data: Some("after"),
            ..first.clone()
        };

        let mut changeset = Changeset::new();
        assert!(changeset.insert(first.clone()));
        assert!(changeset.insert(second.clone()));
        assert!(!changeset.insert(second.clone()));

        assert_eq!(changeset.len(), 2);
        assert!(changeset.contains(&first));
        assert!(changeset.contains(&second));
    }

    #[test]
    fn test_changeset_large_initial_update() {
        let count = 50_000;
        let changeset: Changeset<usize> = (0..count)
            .map(|index| Change {
                change_type: ChangeType::Added,
                old_index: None,
                new_index: Some(index),
                data: Some(index),
            })
            .collect();

        assert_eq!(changeset.len(), count);
        assert!(changeset.iter().enumerate().all(|(i, c)| c.new_index == Some(i)));
    }
}
