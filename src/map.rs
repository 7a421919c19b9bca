//! Ordered property map for TDN records.
//!
//! [`RecordMap`] wraps an [`IndexMap`] keyed by property text. Iteration
//! follows first-write order; writing an existing key replaces its name and
//! value in place, so the last write wins without moving the property.
//!
//! Property names are symbols and may carry their own attributes, so each
//! entry stores a [`PropertyName`] alongside the value.
//!
//! ## Examples
//!
//! ```rust
//! use serde_tdn::{RecordMap, Value};
//!
//! let mut map = RecordMap::new();
//! map.insert("name", Value::from("Alice"));
//! map.insert("age", Value::from(30));
//! map.insert("name", Value::from("Bob"));
//!
//! let keys: Vec<_> = map.keys().collect();
//! assert_eq!(keys, vec!["name", "age"]);
//! assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Bob"));
//! ```

use crate::attribute::AttributeSet;
use crate::Value;
use indexmap::IndexMap;

/// The symbol naming a record property, with its own attributes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyName {
    pub text: String,
    pub attributes: AttributeSet,
}

impl PropertyName {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        PropertyName {
            text: text.into(),
            attributes: AttributeSet::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes.push(key, value);
        self
    }
}

impl From<&str> for PropertyName {
    fn from(text: &str) -> Self {
        PropertyName::new(text)
    }
}

impl From<String> for PropertyName {
    fn from(text: String) -> Self {
        PropertyName::new(text)
    }
}

/// One record entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Property {
    pub name: PropertyName,
    pub value: Value,
}

/// An ordered map of property names to TDN values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordMap(IndexMap<String, Property>);

impl RecordMap {
    #[must_use]
    pub fn new() -> Self {
        RecordMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        RecordMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a property, returning the value it replaced.
    ///
    /// A replaced property keeps its position but takes the new name's
    /// attributes.
    pub fn insert(&mut self, name: impl Into<PropertyName>, value: Value) -> Option<Value> {
        let name = name.into();
        self.0
            .insert(name.text.clone(), Property { name, value })
            .map(|old| old.value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).map(|p| &p.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key).map(|p| &mut p.value)
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the property texts, in first-write order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns an iterator over the values, in first-write order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values().map(|p| &p.value)
    }

    /// Returns an iterator over the full properties, in first-write order.
    pub fn iter(&self) -> indexmap::map::Values<'_, String, Property> {
        self.0.values()
    }
}

impl IntoIterator for RecordMap {
    type Item = Property;
    type IntoIter = indexmap::map::IntoValues<String, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

impl<K: Into<PropertyName>> FromIterator<(K, Value)> for RecordMap {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut map = RecordMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_in_first_position() {
        let mut map = RecordMap::new();
        map.insert("a", Value::from(1));
        map.insert("b", Value::from(2));
        let old = map.insert(PropertyName::new("a").with_attribute("k", None), Value::from(3));

        assert_eq!(old, Some(Value::from(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let a = map.property("a").unwrap();
        assert_eq!(a.value, Value::from(3));
        assert!(a.name.attributes.contains("k"));
    }

    #[test]
    fn test_from_iterator() {
        let map: RecordMap = vec![("x", Value::from(1)), ("y", Value::from(2))]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("y").and_then(Value::as_i64), Some(2));
    }
}
