//! Directory entries as attribute-value maps.
//!
//! An [`Entry`] maps attribute names to one or more string values, the
//! shape every directory record takes on the wire. The map is ordered so
//! iteration and serialization are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A directory entry: attribute name to values.
///
/// Multi-valued attributes keep their insertion order; canonical
/// comparison ([`Entry::canonically_equal`]) treats value order as
/// insignificant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry {
    attrs: BTreeMap<String, Vec<String>>,
}

impl Entry {
    /// Create a new empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute to a single value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), vec![value.into()]);
    }

    /// Set an attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Replace all values of an attribute.
    ///
    /// An empty value list removes the attribute: directory stores do not
    /// keep attributes without values.
    pub fn set_values(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        if values.is_empty() {
            self.attrs.remove(&name);
        } else {
            self.attrs.insert(name, values);
        }
    }

    /// Add a value to an attribute unless it is already present.
    ///
    /// Repeated application is idempotent; used for object-class lists.
    pub fn ensure_value(&mut self, name: impl Into<String>, value: &str) {
        let values = self.attrs.entry(name.into()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    /// Get all values of an attribute.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attrs.get(name).map(Vec::as_slice)
    }

    /// Get the first value of an attribute.
    pub fn get_single(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Check if an attribute is present.
    pub fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.attrs.remove(name)
    }

    /// Iterate over all attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.attrs.iter()
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Check if the entry has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Return a copy with every attribute's value list sorted.
    pub fn canonical(&self) -> Entry {
        let mut attrs = self.attrs.clone();
        for values in attrs.values_mut() {
            values.sort_unstable();
        }
        Entry { attrs }
    }

    /// Compare two entries ignoring the order of multi-valued attributes.
    ///
    /// This is the equality the diff logic uses: entries that differ only
    /// in value order are not rewritten.
    pub fn canonically_equal(&self, other: &Entry) -> bool {
        self.canonical() == other.canonical()
    }
}

impl FromIterator<(String, Vec<String>)> for Entry {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Entry {
            attrs: iter.into_iter().collect(),
        }
    }
}
