//! Dynamic value representation for TDN data.
//!
//! ## Core Types
//!
//! - [`TypeTag`]: the ten variant names of the format
//! - [`Data`]: the payload of a value, including a typed null per variant
//! - [`Value`]: a payload plus its [`AttributeSet`]
//!
//! Container values ([`Data::Sequence`] and [`Data::Record`]) hold a
//! [`ContainerId`] into their owning [`Document`](crate::Document). Cloning
//! such a value clones the handle, not the container: both copies point at
//! the same container, which is how TDN represents sharing and cycles.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use serde_tdn::{TypeTag, Value};
//!
//! let number = Value::from(42);
//! let text = Value::from("hello");
//! let missing = Value::null(TypeTag::Timestamp);
//!
//! assert_eq!(number.as_i64(), Some(42));
//! assert_eq!(text.as_str(), Some("hello"));
//! assert!(missing.is_null());
//! assert_eq!(missing.type_tag(), TypeTag::Timestamp);
//! ```
//!
//! `Value`'s own `PartialEq` and `Hash` are shallow: two container handles
//! are equal only if they name the same container. Structural, cycle-aware
//! comparison lives on [`Node`](crate::Node).

use crate::attribute::AttributeSet;
use crate::context::Address;
use crate::document::ContainerId;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset};
use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;

/// The variant names of the format, used in typed nulls and reference tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Boolean,
    Integer,
    Decimal,
    Duration,
    Timestamp,
    String,
    Symbol,
    Blob,
    Sequence,
    Record,
}

impl TypeTag {
    pub const ALL: [TypeTag; 10] = [
        TypeTag::Boolean,
        TypeTag::Integer,
        TypeTag::Decimal,
        TypeTag::Duration,
        TypeTag::Timestamp,
        TypeTag::String,
        TypeTag::Symbol,
        TypeTag::Blob,
        TypeTag::Sequence,
        TypeTag::Record,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Boolean => "Boolean",
            TypeTag::Integer => "Integer",
            TypeTag::Decimal => "Decimal",
            TypeTag::Duration => "Duration",
            TypeTag::Timestamp => "Timestamp",
            TypeTag::String => "String",
            TypeTag::Symbol => "Symbol",
            TypeTag::Blob => "Blob",
            TypeTag::Sequence => "Sequence",
            TypeTag::Record => "Record",
        }
    }

    /// Returns `true` for the two variants that may carry an address.
    #[inline]
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, TypeTag::Sequence | TypeTag::Record)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| crate::Error::custom(format!("unknown type tag '{}'", s)))
    }
}

/// The payload of a TDN value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Data {
    /// A null of the given variant.
    Null(TypeTag),
    Boolean(bool),
    Integer(BigInt),
    Decimal(BigDecimal),
    Duration(Duration),
    Timestamp(DateTime<FixedOffset>),
    String(String),
    Symbol(String),
    Blob(Vec<u8>),
    Sequence(ContainerId),
    Record(ContainerId),
}

impl Data {
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Data::Null(tag) => *tag,
            Data::Boolean(_) => TypeTag::Boolean,
            Data::Integer(_) => TypeTag::Integer,
            Data::Decimal(_) => TypeTag::Decimal,
            Data::Duration(_) => TypeTag::Duration,
            Data::Timestamp(_) => TypeTag::Timestamp,
            Data::String(_) => TypeTag::String,
            Data::Symbol(_) => TypeTag::Symbol,
            Data::Blob(_) => TypeTag::Blob,
            Data::Sequence(_) => TypeTag::Sequence,
            Data::Record(_) => TypeTag::Record,
        }
    }
}

/// A TDN value: a [`Data`] payload with its attributes.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::{Address, TypeTag, Value};
///
/// let flagged = Value::from("draft text").with_attribute("lang", Some("en"));
/// assert_eq!(flagged.attributes().get("lang"), Some(Some("en")));
///
/// let placeholder = Value::reference(TypeTag::Record, Address(2));
/// assert!(placeholder.is_null());
/// assert_eq!(placeholder.ref_marker(), Some(Address(2)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    data: Data,
    attributes: AttributeSet,
}

impl Value {
    #[must_use]
    pub fn new(data: Data) -> Self {
        Value {
            data,
            attributes: AttributeSet::new(),
        }
    }

    /// A null of the given variant.
    #[must_use]
    pub fn null(tag: TypeTag) -> Self {
        Value::new(Data::Null(tag))
    }

    /// A placeholder standing in for the value at `address`.
    ///
    /// Placeholders are null values of the expected variant carrying the
    /// reserved ref marker; resolution replaces them in their slot.
    #[must_use]
    pub fn reference(tag: TypeTag, address: Address) -> Self {
        let mut value = Value::null(tag);
        value.attributes.set_ref_marker(address);
        value
    }

    pub(crate) fn sequence(id: ContainerId) -> Self {
        Value::new(Data::Sequence(id))
    }

    pub(crate) fn record(id: ContainerId) -> Self {
        Value::new(Data::Record(id))
    }

    #[must_use]
    pub fn symbol(text: impl Into<String>) -> Self {
        Value::new(Data::Symbol(text.into()))
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes.push(key, value);
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: AttributeSet) -> Self {
        self.attributes = attributes;
        self
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &Data {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_data(self) -> Data {
        self.data
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    #[inline]
    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    #[inline]
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.data.type_tag()
    }

    /// Returns `true` if the value is a null of any variant.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.data, Data::Null(_))
    }

    /// Returns `true` for non-null sequences and records.
    #[inline]
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self.data, Data::Sequence(_) | Data::Record(_))
    }

    /// Address named by the reserved ref marker, if this is a placeholder.
    #[must_use]
    pub fn ref_marker(&self) -> Option<Address> {
        self.attributes.ref_marker()
    }

    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.is_null() && self.attributes.contains(crate::attribute::REF_MARKER)
    }

    /// If the value is a non-null container, returns its handle.
    #[inline]
    #[must_use]
    pub fn container_id(&self) -> Option<ContainerId> {
        match self.data {
            Data::Sequence(id) | Data::Record(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.data {
            Data::Boolean(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_integer(&self) -> Option<&BigInt> {
        match &self.data {
            Data::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// If the value is an integer that fits in `i64`, returns it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_tdn::Value;
    ///
    /// assert_eq!(Value::from(-7).as_i64(), Some(-7));
    /// assert_eq!(Value::from("7").as_i64(), None);
    /// ```
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_integer().and_then(|i| i64::try_from(i).ok())
    }

    #[inline]
    #[must_use]
    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match &self.data {
            Data::Decimal(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_duration(&self) -> Option<&Duration> {
        match &self.data {
            Data::Duration(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match &self.data {
            Data::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// If the value is a string, returns it. Symbols are not strings.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            Data::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.data {
            Data::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match &self.data {
            Data::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null(TypeTag::Symbol)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        match (&self.data, self.ref_marker()) {
            (Data::Null(tag), Some(address)) => {
                crate::ser::write_reference(&mut out, *tag, address);
            }
            (Data::Sequence(id), _) | (Data::Record(id), _) => {
                out.push_str(&format!("<{} {}>", self.type_tag(), id));
            }
            (data, _) => crate::ser::write_scalar(&mut out, data),
        }
        f.write_str(&out)
    }
}

impl TryFrom<Value> for i64 {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value.as_i64().ok_or_else(|| {
            crate::Error::custom(format!("expected 64-bit integer, found {}", value))
        })
    }
}

impl TryFrom<Value> for bool {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| crate::Error::custom(format!("expected bool, found {}", value)))
    }
}

impl TryFrom<Value> for String {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value.data {
            Data::String(s) | Data::Symbol(s) => Ok(s),
            _ => Err(crate::Error::custom(format!(
                "expected string, found {}",
                value
            ))),
        }
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::new(Data::Integer(BigInt::from(value)))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::new(Data::Boolean(value))
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::new(Data::Integer(value))
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::new(Data::Decimal(value))
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::new(Data::Duration(value))
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::new(Data::Timestamp(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(Data::String(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(Data::String(value.to_string()))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::new(Data::Blob(value))
    }
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Value::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn test_type_tag_round_trip() {
        for tag in TypeTag::ALL {
            assert_eq!(tag.as_str().parse::<TypeTag>().unwrap(), tag);
        }
        assert!("Array".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_typed_nulls_are_distinct() {
        let a = Value::null(TypeTag::Integer);
        let b = Value::null(TypeTag::String);
        assert!(a.is_null() && b.is_null());
        assert_ne!(a, b);
        assert_eq!(a.type_tag(), TypeTag::Integer);
    }

    #[test]
    fn test_placeholder() {
        let placeholder = Value::reference(TypeTag::Sequence, Address(9));
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.type_tag(), TypeTag::Sequence);
        assert_eq!(placeholder.ref_marker(), Some(Address(9)));
        assert!(!placeholder.is_container());

        let plain = Value::null(TypeTag::Sequence);
        assert!(!plain.is_placeholder());
    }

    #[test]
    fn test_tryfrom() {
        assert_eq!(i64::try_from(Value::from(42)).unwrap(), 42);
        assert!(i64::try_from(Value::from(u128::MAX)).is_err());
        assert!(bool::try_from(Value::from(true)).unwrap());
        assert_eq!(String::try_from(Value::symbol("abc")).unwrap(), "abc");
        assert!(String::try_from(Value::from(1)).is_err());
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::null(TypeTag::Blob).to_string(), "null.Blob");
        assert_eq!(
            Value::reference(TypeTag::Record, Address(10)).to_string(),
            "Ref:Record 0xa"
        );
    }
}
