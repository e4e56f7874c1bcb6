//! Ordered list with stable element identity.

use crate::{error::Result, ElementId, Error, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: ElementId,
    value: Value,
}

/// Stored form of a [`List`]; positions are derived on load.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListData {
    entries: Vec<Entry>,
    tombstones: BTreeSet<ElementId>,
}

/// An ordered list of values.
///
/// Each element keeps the [`ElementId`] it was appended with. Ids of removed
/// elements are kept as tombstones so a reference to a removed element can be
/// told apart from a reference to one that never existed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ListData", into = "ListData")]
pub struct List {
    entries: Vec<Entry>,
    tombstones: BTreeSet<ElementId>,
    /// Index of every live element in `entries`.
    positions: HashMap<ElementId, usize>,
}

impl From<ListData> for List {
    fn from(data: ListData) -> Self {
        let mut list = Self {
            entries: data.entries,
            tombstones: data.tombstones,
            positions: HashMap::new(),
        };
        list.reindex();
        list
    }
}

impl From<List> for ListData {
    fn from(list: List) -> Self {
        Self {
            entries: list.entries,
            tombstones: list.tombstones,
        }
    }
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|e| &e.value)
    }

    /// Values in list order. The iterator is `Clone`, so it can be restarted.
    pub fn iter(&self) -> impl Iterator<Item = &Value> + Clone + '_ {
        self.entries.iter().map(|e| &e.value)
    }

    /// Copy of the values in list order.
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    /// Element id at `index`.
    pub fn id_at(&self, index: usize) -> Result<&ElementId> {
        self.entries
            .get(index)
            .map(|e| &e.id)
            .ok_or(Error::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Element ids covering `range`, in list order.
    pub fn ids_in(&self, range: RangeInclusive<usize>) -> Result<Vec<ElementId>> {
        let (lower, upper) = (*range.start(), *range.end());
        if upper >= self.len() {
            return Err(Error::OutOfRange {
                index: upper,
                len: self.len(),
            });
        }
        if lower > upper {
            return Err(Error::OutOfRange {
                index: lower,
                len: upper + 1,
            });
        }
        Ok(self.entries[lower..=upper]
            .iter()
            .map(|e| e.id.clone())
            .collect())
    }

    /// Current index of an element.
    pub fn position(&self, id: &ElementId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Whether `id` was ever part of this list.
    pub fn knows(&self, id: &ElementId) -> bool {
        self.tombstones.contains(id) || self.positions.contains_key(id)
    }

    /// Whether `id` was part of this list and has been removed.
    pub fn is_removed(&self, id: &ElementId) -> bool {
        self.tombstones.contains(id)
    }

    pub(crate) fn push(&mut self, id: ElementId, value: Value) {
        self.positions.insert(id.clone(), self.entries.len());
        self.entries.push(Entry { id, value });
    }

    /// Replace the value of a live element. Returns false if it is not live.
    pub(crate) fn replace(&mut self, id: &ElementId, value: Value) -> bool {
        match self.positions.get(id) {
            Some(&index) => {
                self.entries[index].value = value;
                true
            }
            None => false,
        }
    }

    /// Remove the live elements among `ids`, returning how many were removed.
    pub(crate) fn remove(&mut self, ids: &[ElementId]) -> usize {
        let removing: HashSet<&ElementId> = ids.iter().collect();
        let before = self.entries.len();
        self.entries.retain(|e| !removing.contains(&e.id));
        self.tombstones.extend(ids.iter().cloned());
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    /// Remove every element.
    pub(crate) fn clear(&mut self) {
        self.positions.clear();
        self.tombstones
            .extend(self.entries.drain(..).map(|e| e.id));
    }

    fn reindex(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, e)| (e.id.clone(), index))
            .collect();
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Value;
    type IntoIter = Box<dyn Iterator<Item = &'a Value> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
