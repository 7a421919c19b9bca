//! # serde_tdn
//!
//! A Serde-compatible library for TDN (Typed Data Notation), a typed
//! interchange format whose graphs may share and cycle.
//!
//! ## What is TDN?
//!
//! TDN is a textual format in which every value has a variant (Boolean,
//! Integer, Decimal, Duration, Timestamp, String, Symbol, Blob, Sequence,
//! Record), every null is typed (`null.Timestamp`), and every value may carry
//! attributes (`@unit:cm; 5`). A sequence or record can be declared at an
//! address (`#2;[...]`) and referenced anywhere else in the same document
//! (`Ref:Sequence 0x2`), including from inside itself.
//!
//! ## Key Features
//!
//! - **Shared and cyclic graphs**: containers live in a [`Document`] arena;
//!   references resolve to the very same container, not a copy
//! - **Forward references**: a reference may appear before its declaration;
//!   all references are resolved in one pass after the document is read
//! - **Cycle-safe equality and hashing**: [`Node`] compares and hashes whole
//!   graphs structurally and terminates on cycles
//! - **Reference detection on write**: shared and cyclic containers are
//!   declared once and referenced afterwards
//! - **Serde Compatible**: bind documents to and from ordinary Rust types
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_tdn::{parse, serialize_document};
//!
//! let doc = parse("#2;{abcd: 1, xyz: Ref:Record 0x2, more: []}").unwrap();
//! let root = doc.root_node();
//!
//! assert_eq!(root.len(), 3);
//! assert_eq!(root.get("abcd").unwrap().value().as_i64(), Some(1));
//! assert!(root.get("xyz").unwrap().same_instance(&root));
//!
//! // The writer rediscovers the cycle and picks its own address.
//! assert_eq!(
//!     serialize_document(&doc).unwrap(),
//!     "#1;{abcd: 1, xyz: Ref:Record 0x1, more: []}"
//! );
//! ```
//!
//! ### Binding to Rust types
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use serde_tdn::{from_str, to_string};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct User {
//!     id: u32,
//!     name: String,
//!     active: bool,
//! }
//!
//! let user = User { id: 123, name: "Alice".to_string(), active: true };
//! let text = to_string(&user).unwrap();
//! assert_eq!(text, "{id: 123, name: \"Alice\", active: true}");
//!
//! let user_back: User = from_str(&text).unwrap();
//! assert_eq!(user, user_back);
//! ```
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Reading and writing never recurse without bound on cyclic input
//! - Reading and writing both refuse nesting deeper than
//!   [`Options::max_depth`] (128 by default), so anything the writer emits
//!   reads back with the same options
//! - Equality, hashing, and export through `impl Serialize for Node` recurse
//!   once per nesting level and take no limit; a graph built in code with a
//!   very deep acyclic chain can exhaust the stack there
//! - No panics in public API (except for logic errors that indicate bugs)
//!
//! ## Examples
//!
//! See the `demos/` directory:
//!
//! - **`cyclic_records.rs`** - Reading, comparing, and writing cyclic graphs
//! - **`binding.rs`** - Moving between Rust types and TDN
//!
//! Run any example with: `cargo run --example <name>`

pub mod attribute;
pub mod context;
pub mod de;
pub mod document;
pub mod eq;
pub mod error;
pub mod macros;
pub mod map;
pub mod options;
pub mod parse;
pub mod refs;
pub mod ser;
pub mod value;

pub use attribute::{Attribute, AttributeSet, REF_MARKER};
pub use context::{Address, Context, PendingPatch, Sink};
pub use de::{from_document, Deserializer};
pub use document::{Container, ContainerId, Document, Node};
pub use error::{Error, Result};
pub use map::{Property, PropertyName, RecordMap};
pub use options::Options;
pub use ser::{
    serialize_document, serialize_document_with_options, to_document, DocumentSerializer,
    Serializer,
};
pub use value::{Data, TypeTag, Value};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;

/// Read a TDN document, resolving every reference in it.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::parse;
///
/// let doc = parse("[#2;[Ref:Sequence 0x5], #5;[1]]").unwrap();
/// let root = doc.root_node();
/// let inner = root.at(0).unwrap().at(0).unwrap();
/// assert!(inner.same_instance(&root.at(1).unwrap()));
/// ```
///
/// # Errors
///
/// Returns a lexical error for malformed text, [`Error::DuplicateAddress`]
/// when an address is declared twice, and [`Error::Resolution`] listing every
/// reference that could not be resolved.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn parse(input: &str) -> Result<Document> {
    Deserializer::from_str(input).deserialize_document()
}

/// Read a TDN document with custom limits.
///
/// # Errors
///
/// As [`parse`], plus limit violations.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn parse_with_options(input: &str, options: &Options) -> Result<Document> {
    Deserializer::with_options(input, options).deserialize_document()
}

/// Serialize any `T: Serialize` to a TDN string.
///
/// Owned Rust values form trees, so the output declares no addresses.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::to_string;
///
/// let text = to_string(&vec![Some(1), None]).unwrap();
/// assert_eq!(text, "[1, null.Symbol]");
/// ```
///
/// # Errors
///
/// Returns an error if the value cannot be serialized (e.g., non-finite floats).
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    serialize_document(&to_document(value)?)
}

/// Serialize any `T: Serialize` to a writer in TDN format.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::to_writer;
///
/// let mut buffer = Vec::new();
/// to_writer(&mut buffer, &("a", 1)).unwrap();
/// assert_eq!(buffer, b"[\"a\", 1]");
/// ```
///
/// # Errors
///
/// Returns an error if serialization fails or writing to the writer fails.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn to_writer<W, T>(mut writer: W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    let text = to_string(value)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| Error::io(&e.to_string()))?;
    Ok(())
}

/// Deserialize an instance of type `T` from a string of TDN text.
///
/// Shared containers are bound once per use; cyclic documents cannot be
/// bound to owned types and return an error.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::from_str;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, PartialEq, Debug)]
/// struct Pair { left: Vec<i32>, right: Vec<i32> }
///
/// let pair: Pair = from_str("{left: #1;[1, 2], right: Ref:Sequence 0x1}").unwrap();
/// assert_eq!(pair, Pair { left: vec![1, 2], right: vec![1, 2] });
/// ```
///
/// # Errors
///
/// Returns an error if the input is not valid TDN or cannot be bound to `T`.
/// Lexical errors include line and column information.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_str<T>(s: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let doc = parse(s)?;
    from_document(&doc)
}

/// Deserialize an instance of type `T` from an I/O stream of TDN.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::from_reader;
/// use std::io::Cursor;
///
/// let values: Vec<bool> = from_reader(Cursor::new(b"[true, false]")).unwrap();
/// assert_eq!(values, vec![true, false]);
/// ```
///
/// # Errors
///
/// Returns an error if reading fails, the input is not valid TDN, or the
/// data cannot be bound to `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_reader<R, T>(mut reader: R) -> Result<T>
where
    R: io::Read,
    T: DeserializeOwned,
{
    let mut string = String::new();
    reader
        .read_to_string(&mut string)
        .map_err(|e| Error::io(&e.to_string()))?;
    from_str(&string)
}

/// Deserialize an instance of type `T` from bytes of TDN text.
///
/// # Errors
///
/// Returns an error if the bytes are not valid UTF-8, not valid TDN, or
/// cannot be bound to `T`.
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn from_slice<T>(v: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let s = std::str::from_utf8(v).map_err(|e| Error::custom(e.to_string()))?;
    from_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct User {
        id: u32,
        name: String,
        active: bool,
        tags: Vec<String>,
        score: f64,
    }

    #[test]
    fn test_serialize_deserialize_point() {
        let point = Point { x: 1, y: 2 };
        let text = to_string(&point).unwrap();
        assert_eq!(text, "{x: 1, y: 2}");
        let point_back: Point = from_str(&text).unwrap();
        assert_eq!(point, point_back);
    }

    #[test]
    fn test_serialize_deserialize_user() {
        let user = User {
            id: 123,
            name: "Alice".to_string(),
            active: true,
            tags: vec!["admin".to_string(), "user".to_string()],
            score: -0.25,
        };

        let text = to_string(&user).unwrap();
        let user_back: User = from_str(&text).unwrap();
        assert_eq!(user, user_back);
    }

    #[test]
    fn test_arrays() {
        let numbers = vec![1, 2, 3, 4, 5];
        let text = to_string(&numbers).unwrap();
        assert_eq!(text, "[1, 2, 3, 4, 5]");
        let numbers_back: Vec<i32> = from_str(&text).unwrap();
        assert_eq!(numbers, numbers_back);
    }

    #[test]
    fn test_maps_and_unit() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), ());
        map.insert("a".to_string(), ());
        let text = to_string(&map).unwrap();
        assert_eq!(text, "{a: null.Symbol, b: null.Symbol}");
        let back: BTreeMap<String, ()> = from_str(&text).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_from_slice_rejects_bad_utf8() {
        assert!(from_slice::<Vec<i32>>(&[0xff, 0xfe]).is_err());
        assert_eq!(from_slice::<Vec<i32>>(b"[7]").unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_and_rewrite_preserves_sharing() {
        let doc = parse("{a: #7;[1], b: Ref:Sequence 0x7, c: [1]}").unwrap();
        let text = serialize_document(&doc).unwrap();
        assert_eq!(text, "{a: #1;[1], b: Ref:Sequence 0x1, c: [1]}");

        let again = parse(&text).unwrap();
        assert_eq!(again.root_node(), doc.root_node());
    }

    #[test]
    fn test_cyclic_document_cannot_bind() {
        let result: Result<Vec<Vec<i32>>> = from_str("#1;[Ref:Sequence 0x1]");
        assert!(result.is_err());
    }

    #[test]
    fn test_writer_honors_depth_limit() {
        let mut doc = Document::new();
        let mut value = Value::from(0);
        for _ in 0..200 {
            value = doc.sequence_from(vec![value]);
        }
        doc.set_root(value);

        assert_eq!(
            serialize_document(&doc).unwrap_err(),
            Error::DepthLimit { limit: 128 }
        );
        let options = Options::new().with_max_depth(256);
        let text = serialize_document_with_options(&doc, &options).unwrap();
        assert!(parse(&text).is_err());
        let back = parse_with_options(&text, &options).unwrap();
        assert_eq!(back.root_node(), doc.root_node());
    }

    #[test]
    fn test_resolution_error_lists_addresses() {
        let err = parse("[Ref:Sequence 0x3, Ref:Record 0x4]").unwrap_err();
        assert_eq!(err.unresolved_addresses(), vec![Address(3), Address(4)]);
    }
}
