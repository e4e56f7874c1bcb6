//! Unordered set of unique values.

use crate::Value;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A set of unique values.
///
/// Iteration follows first-insertion order. Because every replica replays
/// the same operations in the same order, that order is the same everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Set {
    values: IndexSet<Value>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    /// Values in canonical order. The iterator is `Clone`, so it can be restarted.
    pub fn iter(&self) -> impl Iterator<Item = &Value> + Clone + '_ {
        self.values.iter()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.values.iter().cloned().collect()
    }

    /// Whether the two sets share at least one value.
    pub fn intersects(&self, other: &Set) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().any(|v| large.contains(v))
    }

    /// Whether every value of `self` is in `other`.
    pub fn is_subset(&self, other: &Set) -> bool {
        self.iter().all(|v| other.contains(v))
    }

    /// Insert values; returns how many were new.
    pub(crate) fn insert<I: IntoIterator<Item = Value>>(&mut self, values: I) -> usize {
        values
            .into_iter()
            .filter(|v| self.values.insert(v.clone()))
            .count()
    }

    /// Remove values; returns how many were present.
    pub(crate) fn remove<'a, I: IntoIterator<Item = &'a Value>>(&mut self, values: I) -> usize {
        values
            .into_iter()
            .filter(|v| self.values.shift_remove(*v))
            .count()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    /// Keep only values also in `other`, preserving this set's order.
    pub(crate) fn intersect_with(&mut self, other: &Set) {
        self.values.retain(|v| other.contains(v));
    }

    /// Insert every value of `other`.
    pub(crate) fn union_with(&mut self, other: &Set) {
        self.insert(other.iter().cloned());
    }

    /// Remove every value present in `other`.
    pub(crate) fn subtract(&mut self, other: &Set) {
        self.values.retain(|v| !other.contains(v));
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Set::new();
        set.insert(iter);
        set
    }
}
