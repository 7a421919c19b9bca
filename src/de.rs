//! TDN deserialization.
//!
//! Reading happens in two layers:
//!
//! - [`Deserializer`] reads text into a [`Document`]. Each container is
//!   allocated as an empty shell and bound to its declared address before
//!   any child is read; every reference token becomes a placeholder plus one
//!   deferred patch. After the whole document is built, all patches run once.
//! - [`from_document`] binds a resolved document to any `Deserialize` type.
//!
//! ## Usage
//!
//! ```rust
//! use serde_tdn::de::Deserializer;
//!
//! let doc = Deserializer::from_str("#2;[1, Ref:Sequence 0x2]")
//!     .deserialize_document()
//!     .unwrap();
//! let root = doc.root_node();
//! assert_eq!(root.len(), 2);
//! assert!(root.at(1).unwrap().same_instance(&root));
//! ```
//!
//! Binding to host types:
//!
//! ```rust
//! use serde::Deserialize;
//! use serde_tdn::from_str;
//!
//! #[derive(Deserialize, Debug, PartialEq)]
//! struct Point { x: i32, y: i32 }
//!
//! let p: Point = from_str("{x: 1, y: 2}").unwrap();
//! assert_eq!(p, Point { x: 1, y: 2 });
//! ```

use crate::context::{Context, Sink};
use crate::document::{ContainerId, Document};
use crate::map::Property;
use crate::options::Options;
use crate::parse::{NodeKind, ParseNode, Reader};
use crate::ser::format_duration;
use crate::value::{Data, Value};
use crate::{Error, Result};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{IntoDeserializer, Visitor};
use serde::{de, forward_to_deserialize_any};
use std::cell::RefCell;
use tracing::{debug, trace};

/// The TDN document reader.
///
/// Created via [`Deserializer::from_str`] or [`Deserializer::with_options`].
pub struct Deserializer<'de> {
    input: &'de str,
    options: Options,
}

impl<'de> Deserializer<'de> {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'de str) -> Self {
        Deserializer {
            input,
            options: Options::default(),
        }
    }

    pub fn with_options(input: &'de str, options: &Options) -> Self {
        Deserializer {
            input,
            options: options.clone(),
        }
    }

    /// Reads the whole input and resolves every reference in it.
    pub fn deserialize_document(self) -> Result<Document> {
        if let Some(limit) = self.options.max_input_len {
            if self.input.len() > limit {
                return Err(Error::invalid_format(
                    1,
                    1,
                    &format!("input of {} bytes exceeds limit of {}", self.input.len(), limit),
                ));
            }
        }
        let node = Reader::with_options(self.input, &self.options).read_document()?;
        build_document(node, &self.options)
    }
}

/// Builds and resolves a document from an already-read parse tree.
pub fn build_document(node: ParseNode, options: &Options) -> Result<Document> {
    let mut document = Document::new();
    let mut ctx = Context::new(&mut document, options);
    let root = build(&mut ctx, node, Sink::Root)?;
    ctx.document_mut().set_root(root);
    debug!(
        containers = ctx.document().container_count(),
        addresses = ctx.document().address_count(),
        pending = ctx.pending().len(),
        "document built"
    );
    ctx.resolve_all()?;
    Ok(document)
}

/// Turns one parse node into a value. `sink` names the slot the caller will
/// store the result in, which is where a placeholder's patch must write.
fn build(ctx: &mut Context<'_>, node: ParseNode, sink: Sink) -> Result<Value> {
    let ParseNode {
        attributes,
        address,
        kind,
        position,
    } = node;

    if address.is_some() && !matches!(kind, NodeKind::Sequence(_) | NodeKind::Record(_)) {
        return Err(Error::invalid_format(
            position.line,
            position.column,
            "address declaration must precede a sequence or record",
        ));
    }

    match kind {
        NodeKind::Scalar(data) => Ok(Value::new(data).with_attributes(attributes)),
        NodeKind::Reference { tag, address } => {
            // The slot takes the target's attributes once resolved.
            if !attributes.is_empty() {
                return Err(Error::invalid_format(
                    position.line,
                    position.column,
                    "a reference cannot carry attributes",
                ));
            }
            trace!(%address, %tag, line = position.line, "deferring reference");
            Ok(ctx.placeholder(tag, address, sink))
        }
        NodeKind::Sequence(children) => {
            let shell = ctx.document_mut().new_sequence().with_attributes(attributes);
            if let Some(address) = address {
                ctx.track(address, shell.clone())?;
            }
            let container = container_id(&shell)?;
            for (index, child) in children.into_iter().enumerate() {
                let item = build(ctx, child, Sink::SequenceSlot { container, index })?;
                ctx.document_mut().push(&shell, item)?;
            }
            Ok(shell)
        }
        NodeKind::Record(properties) => {
            let shell = ctx.document_mut().new_record().with_attributes(attributes);
            if let Some(address) = address {
                ctx.track(address, shell.clone())?;
            }
            let container = container_id(&shell)?;
            for (name, child) in properties {
                let sink = Sink::RecordSlot {
                    container,
                    key: name.text.clone(),
                };
                let item = build(ctx, child, sink)?;
                ctx.document_mut().insert(&shell, name, item)?;
            }
            Ok(shell)
        }
    }
}

fn container_id(shell: &Value) -> Result<ContainerId> {
    shell
        .container_id()
        .ok_or_else(|| Error::custom("freshly allocated shell has no container"))
}

/// Binds a resolved document to `T`.
///
/// Shared containers are bound once per use. A cycle has no owned
/// representation and fails, as does any placeholder left in the graph.
pub fn from_document<'a, T>(doc: &'a Document) -> Result<T>
where
    T: de::Deserialize<'a>,
{
    let active = RefCell::new(Vec::new());
    T::deserialize(NodeDeserializer {
        doc,
        value: doc.root(),
        active: &active,
    })
}

/// A serde `Deserializer` over one value of a document.
struct NodeDeserializer<'a, 's> {
    doc: &'a Document,
    value: &'a Value,
    active: &'s RefCell<Vec<ContainerId>>,
}

impl<'a, 's> NodeDeserializer<'a, 's> {
    fn child(&self, value: &'a Value) -> Self {
        NodeDeserializer {
            doc: self.doc,
            value,
            active: self.active,
        }
    }

    fn enter(&self, id: ContainerId) -> Result<()> {
        let mut active = self.active.borrow_mut();
        if active.contains(&id) {
            return Err(Error::custom(format!(
                "cannot bind cyclic container {} to an owned value",
                id
            )));
        }
        active.push(id);
        Ok(())
    }

    fn leave(&self) {
        self.active.borrow_mut().pop();
    }

    fn check_resolved(&self) -> Result<()> {
        match self.value.ref_marker() {
            Some(address) if self.value.is_placeholder() => {
                Err(Error::UnresolvedReference { address })
            }
            _ => Ok(()),
        }
    }
}

impl<'a, 's> de::Deserializer<'a> for NodeDeserializer<'a, 's> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        self.check_resolved()?;
        match self.value.data() {
            Data::Null(_) => visitor.visit_unit(),
            Data::Boolean(b) => visitor.visit_bool(*b),
            Data::Integer(i) => {
                if let Ok(v) = i64::try_from(i) {
                    visitor.visit_i64(v)
                } else if let Ok(v) = u64::try_from(i) {
                    visitor.visit_u64(v)
                } else if let Ok(v) = i128::try_from(i) {
                    visitor.visit_i128(v)
                } else if let Ok(v) = u128::try_from(i) {
                    visitor.visit_u128(v)
                } else {
                    Err(Error::custom(format!("integer {} out of range", i)))
                }
            }
            Data::Decimal(d) => {
                let f = d
                    .to_string()
                    .parse::<f64>()
                    .map_err(|_| Error::custom(format!("decimal {} out of range", d)))?;
                visitor.visit_f64(f)
            }
            Data::Duration(d) => visitor.visit_string(format_duration(d)),
            Data::Timestamp(ts) => visitor.visit_string(ts.to_rfc3339()),
            Data::String(s) | Data::Symbol(s) => visitor.visit_borrowed_str(s),
            Data::Blob(bytes) => visitor.visit_borrowed_bytes(bytes),
            Data::Sequence(id) => {
                let items = self
                    .doc
                    .sequence(self.value)
                    .ok_or(Error::UnknownContainer { index: id.index() })?;
                self.enter(*id)?;
                let result = visitor.visit_seq(SeqDeserializer {
                    parent: &self,
                    iter: items.iter(),
                });
                self.leave();
                result
            }
            Data::Record(id) => {
                let map = self
                    .doc
                    .record(self.value)
                    .ok_or(Error::UnknownContainer { index: id.index() })?;
                self.enter(*id)?;
                let result = visitor.visit_map(MapDeserializer {
                    parent: &self,
                    iter: map.iter(),
                    value: None,
                });
                self.leave();
                result
            }
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        self.check_resolved()?;
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        self.check_resolved()?;
        match self.value.data() {
            Data::String(s) | Data::Symbol(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            Data::Record(id) => {
                let map = self
                    .doc
                    .record(self.value)
                    .ok_or(Error::UnknownContainer { index: id.index() })?;
                let property = match map.iter().next() {
                    Some(property) if map.len() == 1 => property,
                    _ => return Err(Error::custom("Expected enum variant")),
                };
                self.enter(*id)?;
                let result = visitor.visit_enum(EnumDeserializer {
                    parent: &self,
                    property,
                });
                self.leave();
                result
            }
            _ => Err(Error::custom("Expected enum")),
        }
    }

    forward_to_deserialize_any! {
        <W: Visitor<'a>>
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

struct SeqDeserializer<'p, 'a, 's> {
    parent: &'p NodeDeserializer<'a, 's>,
    iter: std::slice::Iter<'a, Value>,
}

impl<'p, 'a, 's> de::SeqAccess<'a> for SeqDeserializer<'p, 'a, 's> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'a>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(self.parent.child(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer<'p, 'a, 's> {
    parent: &'p NodeDeserializer<'a, 's>,
    iter: indexmap::map::Values<'a, String, Property>,
    value: Option<&'a Value>,
}

impl<'p, 'a, 's> de::MapAccess<'a> for MapDeserializer<'p, 'a, 's> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'a>,
    {
        match self.iter.next() {
            Some(property) => {
                self.value = Some(&property.value);
                seed.deserialize(BorrowedStrDeserializer::new(&property.name.text))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'a>,
    {
        match self.value.take() {
            Some(value) => seed.deserialize(self.parent.child(value)),
            None => Err(Error::custom("value is missing")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer<'p, 'a, 's> {
    parent: &'p NodeDeserializer<'a, 's>,
    property: &'a Property,
}

impl<'p, 'a, 's> de::EnumAccess<'a> for EnumDeserializer<'p, 'a, 's> {
    type Error = Error;
    type Variant = NodeDeserializer<'a, 's>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: de::DeserializeSeed<'a>,
    {
        let variant = seed.deserialize(BorrowedStrDeserializer::<Error>::new(
            &self.property.name.text,
        ))?;
        Ok((variant, self.parent.child(&self.property.value)))
    }
}

impl<'a, 's> de::VariantAccess<'a> for NodeDeserializer<'a, 's> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        if self.value.is_null() {
            Ok(())
        } else {
            Err(Error::custom("Expected unit variant"))
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'a>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        if self.doc.sequence(self.value).is_none() {
            return Err(Error::custom("Expected tuple variant"));
        }
        de::Deserializer::deserialize_any(self, visitor)
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'a>,
    {
        if self.doc.record(self.value).is_none() {
            return Err(Error::custom("Expected struct variant"));
        }
        de::Deserializer::deserialize_any(self, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Address;
    use crate::value::TypeTag;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn read(input: &str) -> Result<Document> {
        Deserializer::from_str(input).deserialize_document()
    }

    #[test]
    fn test_self_reference_record() {
        let doc = read("#2;{abcd: 1, xyz: Ref:Record 0x2, more: []}").unwrap();
        let root = doc.root_node();
        assert_eq!(root.len(), 3);
        assert_eq!(root.get("abcd").unwrap().value().as_i64(), Some(1));
        assert!(root.get("xyz").unwrap().same_instance(&root));
        assert_eq!(doc.lookup(Address(2)), Some(doc.root()));
    }

    #[test]
    fn test_forward_reference() {
        let doc = read("[#2;[Ref:Sequence 0x5], #5;[1]]").unwrap();
        let root = doc.root_node();
        let first = root.at(0).unwrap();
        let second = root.at(1).unwrap();
        assert!(first.at(0).unwrap().same_instance(&second));
    }

    #[test]
    fn test_unresolved_and_mismatched_are_collected() {
        let err = read("#1;[Ref:Record 0x1, Ref:Sequence 0x9, Ref:Sequence 0x1]").unwrap_err();
        assert_eq!(
            err,
            Error::Resolution(vec![
                Error::TypeMismatch {
                    expected: TypeTag::Record,
                    found: TypeTag::Sequence,
                    address: Address(1)
                },
                Error::UnresolvedReference {
                    address: Address(9)
                },
            ])
        );
    }

    #[test]
    fn test_duplicate_address_is_fatal() {
        let err = read("[#1;[], #1;{}]").unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateAddress {
                address: Address(1)
            }
        );
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let doc = read("#1;{k: Ref:Record 0x1, k: 5}").unwrap();
        assert_eq!(doc.root_node().get("k").unwrap().value().as_i64(), Some(5));

        let doc = read("#1;{k: 5, k: Ref:Record 0x1}").unwrap();
        let root = doc.root_node();
        assert!(root.get("k").unwrap().same_instance(&root));
    }

    #[test]
    fn test_input_limit() {
        let options = Options::new().with_max_input_len(4);
        assert!(Deserializer::with_options("[1]", &options)
            .deserialize_document()
            .is_ok());
        assert!(Deserializer::with_options("[1, 2]", &options)
            .deserialize_document()
            .is_err());
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Person {
        name: String,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    #[test]
    fn test_bind_struct_with_shared_child() {
        let doc = read("{name: \"Ada\", tags: #1;[a, b], nickname: null.String}").unwrap();
        let person: Person = from_document(&doc).unwrap();
        assert_eq!(
            person,
            Person {
                name: "Ada".to_string(),
                tags: vec!["a".to_string(), "b".to_string()],
                nickname: None,
            }
        );

        let doc = read("[#1;[1, 2], Ref:Sequence 0x1]").unwrap();
        let both: Vec<Vec<u8>> = from_document(&doc).unwrap();
        assert_eq!(both, vec![vec![1, 2], vec![1, 2]]);
    }

    #[test]
    fn test_bind_borrows_strings() {
        let doc = read("{a: \"x\", b: y}").unwrap();
        let map: HashMap<&str, &str> = from_document(&doc).unwrap();
        assert_eq!(map["a"], "x");
        assert_eq!(map["b"], "y");
    }

    #[test]
    fn test_bind_rejects_cycles() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Loop {
            next: Option<Box<Loop>>,
        }
        let doc = read("#1;{next: Ref:Record 0x1}").unwrap();
        assert!(from_document::<Loop>(&doc).is_err());
    }

    #[derive(Deserialize, Debug, PartialEq)]
    enum Shape {
        Point,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Pair(i8, i8),
    }

    #[test]
    fn test_bind_enums() {
        let doc = read("[Point, {Circle: 1.5}, {Rect: {w: 2, h: 3}}, {Pair: [-1, 1]}]").unwrap();
        let shapes: Vec<Shape> = from_document(&doc).unwrap();
        assert_eq!(
            shapes,
            vec![
                Shape::Point,
                Shape::Circle(1.5),
                Shape::Rect { w: 2, h: 3 },
                Shape::Pair(-1, 1),
            ]
        );
    }

    #[test]
    fn test_bind_placeholder_fails() {
        let mut doc = Document::new();
        let root = doc.sequence_from(vec![Value::reference(TypeTag::Record, Address(3))]);
        doc.set_root(root);
        assert_eq!(
            from_document::<Vec<Option<i32>>>(&doc).unwrap_err(),
            Error::UnresolvedReference {
                address: Address(3)
            }
        );
    }
}
