//! Attribute metadata attached to every TDN value.
//!
//! An [`AttributeSet`] is an ordered list of `@key;` / `@key:value;`
//! annotations. Insertion order is preserved, duplicate keys are allowed, and
//! two sets are equal only if they hold the same attributes in the same order.
//!
//! ```rust
//! use serde_tdn::AttributeSet;
//!
//! let mut attrs = AttributeSet::new();
//! attrs.push("unit", Some("cm"));
//! attrs.push("draft", None);
//!
//! assert_eq!(attrs.get("unit"), Some(Some("cm")));
//! assert_eq!(attrs.len(), 2);
//! ```

use crate::context::Address;

/// Key of the reserved attribute that marks a value as an unresolved
/// reference placeholder. Keys starting with `$` cannot be written in text.
pub const REF_MARKER: &str = "$ref";

/// A single `@key` or `@key:value` annotation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Attribute {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    /// Returns `true` for keys reserved by the format itself.
    #[inline]
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.key.starts_with('$')
    }
}

/// Ordered, duplicate-permitting attribute list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AttributeSet(Vec<Attribute>);

impl AttributeSet {
    #[must_use]
    pub fn new() -> Self {
        AttributeSet(Vec::new())
    }

    /// Appends an attribute, keeping any earlier attribute with the same key.
    pub fn push(&mut self, key: impl Into<String>, value: Option<&str>) {
        self.0.push(Attribute::new(key, value));
    }

    pub fn push_attribute(&mut self, attribute: Attribute) {
        self.0.push(attribute);
    }

    /// Returns the payload of the first attribute named `key`.
    ///
    /// The outer `Option` is `None` when the key is absent; the inner one is
    /// `None` for a bare `@key;` flag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|a| a.key == key)
    }

    /// Removes every attribute named `key`, returning how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|a| a.key != key);
        before - self.0.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    /// Address carried by the reserved ref marker, if this set has one.
    #[must_use]
    pub fn ref_marker(&self) -> Option<Address> {
        self.get(REF_MARKER)
            .flatten()
            .and_then(|payload| payload.parse().ok())
            .map(Address)
    }

    pub(crate) fn set_ref_marker(&mut self, address: Address) {
        self.remove(REF_MARKER);
        self.push(REF_MARKER, Some(&address.0.to_string()));
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Attribute> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        AttributeSet(iter.into_iter().collect())
    }
}
