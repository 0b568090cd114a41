//! Diff engine for comparing resource property maps.
//!
//! This module computes structural, property-level differences between an
//! old and a new [`PropertyMap`]. Objects and arrays are diffed recursively;
//! every other pairing (including unknowns and mismatched kinds) is recorded
//! as a plain old/new pair.
//!
//! Arrays are compared positionally. Inserting an element at the front of a
//! list shows up as an update of every following index rather than a single
//! insertion.

use std::collections::{BTreeMap, BTreeSet};

use crate::resource::{PropertyKey, PropertyMap, PropertyValue};

/// Engine for computing property diffs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// Difference between two values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDiff {
    /// Old value.
    pub old: PropertyValue,
    /// New value.
    pub new: PropertyValue,
    /// Element-wise diff, when both sides are arrays.
    pub array: Option<ArrayDiff>,
    /// Key-wise diff, when both sides are objects.
    pub object: Option<ObjectDiff>,
}

/// Key-wise difference between two property maps.
///
/// Every key of either map lands in exactly one of the four sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDiff {
    /// Keys only in the new map, with non-null values.
    pub adds: BTreeMap<PropertyKey, PropertyValue>,
    /// Keys only in the old map, with non-null values.
    pub deletes: BTreeMap<PropertyKey, PropertyValue>,
    /// Keys in both maps whose values differ.
    pub updates: BTreeMap<PropertyKey, ValueDiff>,
    /// Keys whose values are equal (null and absent count as equal).
    pub sames: BTreeMap<PropertyKey, PropertyValue>,
}

/// Index-wise difference between two arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayDiff {
    /// Indices only in the new array.
    pub adds: BTreeMap<usize, PropertyValue>,
    /// Indices only in the old array.
    pub deletes: BTreeMap<usize, PropertyValue>,
    /// Indices present in both with differing elements.
    pub updates: BTreeMap<usize, ValueDiff>,
    /// Indices present in both with equal elements.
    pub sames: BTreeMap<usize, PropertyValue>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Diffs two property maps, returning `None` if they are equivalent.
    #[must_use]
    pub fn diff(&self, old: &PropertyMap, new: &PropertyMap) -> Option<ObjectDiff> {
        let mut diff = ObjectDiff::default();

        for (key, old_value) in old {
            match new.get(key) {
                Some(new_value) => match self.diff_values(old_value, new_value) {
                    Some(update) => {
                        diff.updates.insert(key.clone(), update);
                    }
                    None => {
                        diff.sames.insert(key.clone(), old_value.clone());
                    }
                },
                None if old_value.has_value() => {
                    diff.deletes.insert(key.clone(), old_value.clone());
                }
                None => {
                    diff.sames.insert(key.clone(), PropertyValue::Null);
                }
            }
        }

        for (key, new_value) in new {
            if old.contains_key(key) {
                continue;
            }
            if new_value.has_value() {
                diff.adds.insert(key.clone(), new_value.clone());
            } else {
                diff.sames.insert(key.clone(), PropertyValue::Null);
            }
        }

        if diff.any_changes() { Some(diff) } else { None }
    }

    /// Diffs two values, returning `None` if they are equal.
    ///
    /// Only array/array and object/object pairs produce a nested diff.
    #[must_use]
    pub fn diff_values(&self, old: &PropertyValue, new: &PropertyValue) -> Option<ValueDiff> {
        match (old, new) {
            (PropertyValue::Array(a), PropertyValue::Array(b)) => {
                self.diff_arrays(a, b).map(|array| ValueDiff {
                    old: old.clone(),
                    new: new.clone(),
                    array: Some(array),
                    object: None,
                })
            }
            (PropertyValue::Object(a), PropertyValue::Object(b)) => {
                self.diff(a, b).map(|object| ValueDiff {
                    old: old.clone(),
                    new: new.clone(),
                    array: None,
                    object: Some(object),
                })
            }
            // NaN only arises from values built in code; it still equals itself.
            (PropertyValue::Number(a), PropertyValue::Number(b)) if a.is_nan() && b.is_nan() => None,
            _ if old == new => None,
            _ => Some(ValueDiff {
                old: old.clone(),
                new: new.clone(),
                array: None,
                object: None,
            }),
        }
    }

    /// Diffs two arrays position by position, returning `None` if equal.
    #[must_use]
    pub fn diff_arrays(&self, old: &[PropertyValue], new: &[PropertyValue]) -> Option<ArrayDiff> {
        let mut diff = ArrayDiff::default();

        for (i, old_elem) in old.iter().enumerate() {
            match new.get(i) {
                Some(new_elem) => match self.diff_values(old_elem, new_elem) {
                    Some(update) => {
                        diff.updates.insert(i, update);
                    }
                    None => {
                        diff.sames.insert(i, old_elem.clone());
                    }
                },
                None => {
                    diff.deletes.insert(i, old_elem.clone());
                }
            }
        }

        for (i, new_elem) in new.iter().enumerate().skip(old.len()) {
            diff.adds.insert(i, new_elem.clone());
        }

        if diff.adds.is_empty() && diff.deletes.is_empty() && diff.updates.is_empty() {
            None
        } else {
            Some(diff)
        }
    }
}

impl ObjectDiff {
    /// Returns true if anything was added, deleted or updated.
    #[must_use]
    pub fn any_changes(&self) -> bool {
        !self.adds.is_empty() || !self.deletes.is_empty() || !self.updates.is_empty()
    }

    /// All keys covered by the diff, in stable order.
    #[must_use]
    pub fn keys(&self) -> Vec<&PropertyKey> {
        let keys: BTreeSet<&PropertyKey> = self
            .adds
            .keys()
            .chain(self.deletes.keys())
            .chain(self.updates.keys())
            .chain(self.sames.keys())
            .collect();
        keys.into_iter().collect()
    }

    /// Returns true if the key was added, deleted or updated.
    #[must_use]
    pub fn changed(&self, key: &str) -> bool {
        self.adds.contains_key(key) || self.deletes.contains_key(key) || self.updates.contains_key(key)
    }

    /// Returns true if the key kept its value.
    #[must_use]
    pub fn same(&self, key: &str) -> bool {
        self.sames.contains_key(key)
    }

    /// Keys that were added, deleted or updated, in stable order.
    #[must_use]
    pub fn changed_keys(&self) -> Vec<&PropertyKey> {
        self.keys().into_iter().filter(|k| self.changed(k)).collect()
    }
}

impl ArrayDiff {
    /// Length of the longer of the two arrays.
    #[must_use]
    pub fn len(&self) -> usize {
        [
            self.adds.keys().next_back(),
            self.deletes.keys().next_back(),
            self.updates.keys().next_back(),
            self.sames.keys().next_back(),
        ]
        .into_iter()
        .flatten()
        .max()
        .map_or(0, |last| last + 1)
    }

    /// Returns true if neither array had elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PropertyMap {
    /// Diffs this map against a newer one. See [`DiffEngine::diff`].
    #[must_use]
    pub fn diff(&self, new: &Self) -> Option<ObjectDiff> {
        DiffEngine::new().diff(self, new)
    }
}
