//! TDN serialization.
//!
//! This module holds three writers:
//!
//! - [`Serializer`]: renders a [`Document`] graph as TDN text. Shared and
//!   cyclic containers are declared once with `#n;` and written as
//!   `Ref:<Type> 0x<n>` on every later encounter.
//! - [`DocumentSerializer`]: a serde `Serializer` that builds a [`Document`]
//!   from any `Serialize` type.
//! - `impl Serialize for Node`: exports an acyclic graph to any other serde
//!   format.
//!
//! ## Usage
//!
//! ```rust
//! use serde_tdn::{parse, serialize_document};
//!
//! let doc = parse("#2;{abcd: 1, xyz: Ref:Record 0x2, more: []}").unwrap();
//! let text = serialize_document(&doc).unwrap();
//! assert_eq!(text, "#1;{abcd: 1, xyz: Ref:Record 0x1, more: []}");
//! ```
//!
//! Writing fails fast: the first dangling reference or malformed handle
//! aborts the whole write and no partial text is returned.

use crate::attribute::AttributeSet;
use crate::context::Address;
use crate::document::{Container, ContainerId, Document, Node};
use crate::options::Options;
use crate::parse::{is_ident_continue, is_ident_start};
use crate::refs::{self, ReferencePlan};
use crate::value::{Data, TypeTag, Value};
use crate::{Error, Result};
use bigdecimal::BigDecimal;
use chrono::Duration;
use num_bigint::BigInt;
use serde::ser::{SerializeMap as _, SerializeSeq as _};
use serde::{ser, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// The TDN text writer.
///
/// Created for one root value; [`Serializer::new`] runs reference detection
/// up front, so a writer that was created successfully has already rejected
/// dangling references.
pub struct Serializer<'d> {
    doc: &'d Document,
    output: String,
    plan: ReferencePlan,
    emitted: HashSet<ContainerId>,
}

impl<'d> Serializer<'d> {
    pub fn new(doc: &'d Document, root: &Value, options: &Options) -> Result<Self> {
        let plan = refs::plan(doc, root, options)?;
        debug!(addresses = plan.len(), "planned references");
        Ok(Serializer {
            doc,
            // Pre-allocate with reasonable capacity to reduce reallocations
            output: String::with_capacity(256),
            plan,
            emitted: HashSet::new(),
        })
    }

    pub fn into_inner(self) -> String {
        self.output
    }

    pub fn serialize_value(&mut self, value: &Value) -> Result<()> {
        if value.is_placeholder() {
            return self.write_marker(value);
        }
        let Some(id) = value.container_id() else {
            write_attributes(&mut self.output, value.attributes())?;
            write_scalar(&mut self.output, value.data());
            return Ok(());
        };

        let address = self.plan.address_of(id);
        if let Some(address) = address {
            if !self.emitted.insert(id) {
                write_reference(&mut self.output, value.type_tag(), address);
                return Ok(());
            }
        }

        write_attributes(&mut self.output, value.attributes())?;
        if let Some(address) = address {
            self.output.push('#');
            self.output.push_str(&address.0.to_string());
            self.output.push(';');
        }

        let doc = self.doc;
        match doc
            .container_of(value)?
            .ok_or(Error::UnknownContainer { index: id.index() })?
        {
            Container::Sequence(items) => {
                self.output.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.serialize_value(item)?;
                }
                self.output.push(']');
            }
            Container::Record(map) => {
                self.output.push('{');
                for (i, property) in map.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    write_attributes(&mut self.output, &property.name.attributes)?;
                    write_key(&mut self.output, &property.name.text);
                    self.output.push_str(": ");
                    self.serialize_value(&property.value)?;
                }
                self.output.push('}');
            }
        }
        Ok(())
    }

    /// A surviving placeholder is written as a reference to the container its
    /// address is bound to, or inline when it is bound to a leaf.
    fn write_marker(&mut self, value: &Value) -> Result<()> {
        let address = value
            .ref_marker()
            .ok_or_else(|| Error::custom("malformed reference marker"))?;
        let doc = self.doc;
        let target = doc
            .lookup(address)
            .ok_or(Error::DanglingReference { address })?;
        match target.container_id() {
            Some(id) => {
                let assigned = self
                    .plan
                    .address_of(id)
                    .ok_or(Error::DanglingReference { address })?;
                write_reference(&mut self.output, target.type_tag(), assigned);
                Ok(())
            }
            None if target.is_placeholder() => Err(Error::DanglingReference { address }),
            None => self.serialize_value(target),
        }
    }
}

/// Writes the document's root as TDN text.
pub fn serialize_document(doc: &Document) -> Result<String> {
    serialize_document_with_options(doc, &Options::default())
}

pub fn serialize_document_with_options(doc: &Document, options: &Options) -> Result<String> {
    let mut serializer = Serializer::new(doc, doc.root(), options)?;
    serializer.serialize_value(doc.root())?;
    Ok(serializer.into_inner())
}

/// Text of any node, with addresses assigned from the node itself.
pub(crate) fn node_to_string(node: Node<'_>) -> Result<String> {
    let mut serializer = Serializer::new(node.document(), node.value(), &Options::default())?;
    serializer.serialize_value(node.value())?;
    Ok(serializer.into_inner())
}

pub(crate) fn write_reference(output: &mut String, tag: TypeTag, address: Address) {
    output.push_str("Ref:");
    output.push_str(tag.as_str());
    output.push(' ');
    output.push_str(&address.to_string());
}

/// Writes a non-container payload.
pub(crate) fn write_scalar(output: &mut String, data: &Data) {
    match data {
        Data::Null(tag) => {
            output.push_str("null.");
            output.push_str(tag.as_str());
        }
        Data::Boolean(b) => output.push_str(if *b { "true" } else { "false" }),
        Data::Integer(i) => output.push_str(&i.to_string()),
        Data::Decimal(d) => output.push_str(&format_decimal(d)),
        Data::Duration(d) => {
            output.push_str("Duration:\"");
            output.push_str(&format_duration(d));
            output.push('"');
        }
        Data::Timestamp(ts) => {
            output.push_str("Timestamp:\"");
            output.push_str(&ts.to_rfc3339());
            output.push('"');
        }
        Data::String(s) => write_quoted(output, s, '"'),
        Data::Symbol(s) => {
            if is_bare_symbol(s) {
                output.push_str(s);
            } else {
                write_quoted(output, s, '\'');
            }
        }
        Data::Blob(bytes) => {
            output.push_str("Blob:\"");
            output.push_str(&hex::encode(bytes));
            output.push('"');
        }
        Data::Sequence(id) | Data::Record(id) => {
            output.push_str(&format!("<{} {}>", data.type_tag(), id));
        }
    }
}

fn format_decimal(d: &BigDecimal) -> String {
    let text = d.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        text + ".0"
    }
}

pub(crate) fn format_duration(d: &Duration) -> String {
    let negative = *d < Duration::zero();
    let seconds = d.num_seconds();
    let nanos = Duration::try_seconds(seconds)
        .and_then(|whole| (*d - whole).num_nanoseconds())
        .unwrap_or(0);

    let mut text = String::new();
    if negative {
        text.push('-');
    }
    text.push_str(&seconds.unsigned_abs().to_string());
    if nanos != 0 {
        let fraction = format!("{:09}", nanos.unsigned_abs());
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text.push('s');
    text
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(ch) if is_ident_start(ch)) && chars.all(is_ident_continue)
}

/// Bare symbols must not read back as a keyword or typed null.
fn is_bare_symbol(s: &str) -> bool {
    is_identifier(s) && !matches!(s, "true" | "false" | "null") && !s.starts_with("null.")
}

fn write_key(output: &mut String, key: &str) {
    if is_identifier(key) {
        output.push_str(key);
    } else {
        write_quoted(output, key, '\'');
    }
}

#[inline]
fn write_quoted(output: &mut String, s: &str, quote: char) {
    output.push(quote);
    for ch in s.chars() {
        match ch {
            c if c == quote => {
                output.push('\\');
                output.push(c);
            }
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            '\u{0008}' => output.push_str("\\b"), // backspace
            '\u{000C}' => output.push_str("\\f"), // form feed
            '\0' => output.push_str("\\0"),
            _ => output.push(ch),
        }
    }
    output.push(quote);
}

#[inline]
fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.contains(';')
        || s.contains('"')
        || s.contains('\\')
        || s.contains('\n')
        || s.contains('\r')
        || s.trim() != s
}

/// Writes `@key;` or `@key:value;` for each attribute, skipping reserved
/// keys.
fn write_attributes(output: &mut String, attributes: &AttributeSet) -> Result<()> {
    for attribute in attributes {
        if attribute.is_reserved() {
            continue;
        }
        if !is_identifier(&attribute.key) {
            return Err(Error::unsupported_type(&format!(
                "attribute key '{}' is not an identifier",
                attribute.key
            )));
        }
        output.push('@');
        output.push_str(&attribute.key);
        if let Some(value) = &attribute.value {
            output.push(':');
            if needs_quotes(value) {
                write_quoted(output, value, '"');
            } else {
                output.push_str(value);
            }
        }
        output.push_str("; ");
    }
    Ok(())
}

/// A serde `Serializer` that builds values inside a [`Document`].
///
/// Every sequence, tuple, map, and struct becomes a fresh container, so the
/// resulting graph is a tree. Enum variants follow the externally tagged
/// convention: unit variants become symbols, the others a single-property
/// record keyed by the variant name.
pub struct DocumentSerializer<'d> {
    doc: &'d mut Document,
}

impl<'d> DocumentSerializer<'d> {
    pub fn new(doc: &'d mut Document) -> Self {
        DocumentSerializer { doc }
    }
}

/// Serializes `value` into a new document whose root is the result.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document> {
    let mut doc = Document::new();
    let root = value.serialize(DocumentSerializer::new(&mut doc))?;
    doc.set_root(root);
    Ok(doc)
}

fn decimal_from_display(text: String) -> Result<Value> {
    BigDecimal::from_str(&text)
        .map(Value::from)
        .map_err(|e| Error::custom(format!("invalid decimal {}: {}", text, e)))
}

pub struct SerializeVec<'d> {
    doc: &'d mut Document,
    items: Vec<Value>,
}

pub struct SerializeTupleVariant<'d> {
    doc: &'d mut Document,
    variant: &'static str,
    items: Vec<Value>,
}

pub struct SerializeMap<'d> {
    doc: &'d mut Document,
    entries: Vec<(String, Value)>,
    current_key: Option<String>,
}

pub struct SerializeStructVariant<'d> {
    doc: &'d mut Document,
    variant: &'static str,
    entries: Vec<(String, Value)>,
}

impl<'d> ser::Serializer for DocumentSerializer<'d> {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeVec<'d>;
    type SerializeTuple = SerializeVec<'d>;
    type SerializeTupleStruct = SerializeVec<'d>;
    type SerializeTupleVariant = SerializeTupleVariant<'d>;
    type SerializeMap = SerializeMap<'d>;
    type SerializeStruct = SerializeMap<'d>;
    type SerializeStructVariant = SerializeStructVariant<'d>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        if !v.is_finite() {
            return Err(Error::unsupported_type("non-finite float"));
        }
        decimal_from_display(v.to_string())
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        if !v.is_finite() {
            return Err(Error::unsupported_type("non-finite float"));
        }
        decimal_from_display(v.to_string())
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::from(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::from(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::null(TypeTag::Symbol))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::null(TypeTag::Symbol))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::null(TypeTag::Symbol))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::symbol(variant))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        let inner = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        Ok(self.doc.record_from(vec![(variant, inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec<'d>> {
        Ok(SerializeVec {
            doc: self.doc,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec<'d>> {
        ser::Serializer::serialize_seq(self, Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec<'d>> {
        ser::Serializer::serialize_seq(self, Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant<'d>> {
        Ok(SerializeTupleVariant {
            doc: self.doc,
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap<'d>> {
        Ok(SerializeMap {
            doc: self.doc,
            entries: Vec::new(),
            current_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<SerializeMap<'d>> {
        ser::Serializer::serialize_map(self, None)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant<'d>> {
        Ok(SerializeStructVariant {
            doc: self.doc,
            variant,
            entries: Vec::new(),
        })
    }
}

impl<'d> ser::SerializeSeq for SerializeVec<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let item = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.items.push(item);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.doc.sequence_from(self.items))
    }
}

impl<'d> ser::SerializeTuple for SerializeVec<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl<'d> ser::SerializeTupleStruct for SerializeVec<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl<'d> ser::SerializeTupleVariant for SerializeTupleVariant<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let item = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.items.push(item);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let items = self.doc.sequence_from(self.items);
        Ok(self.doc.record_from(vec![(self.variant, items)]))
    }
}

fn key_text(key: Value) -> Result<String> {
    match key.into_data() {
        Data::String(s) | Data::Symbol(s) => Ok(s),
        Data::Integer(i) => Ok(i.to_string()),
        Data::Boolean(b) => Ok(b.to_string()),
        _ => Err(Error::custom("Record keys must be strings")),
    }
}

impl<'d> ser::SerializeMap for SerializeMap<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = key.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.current_key = Some(key_text(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called without serialize_key"))?;
        let value = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.entries.push((key, value));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.doc.record_from(self.entries))
    }
}

impl<'d> ser::SerializeStruct for SerializeMap<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let value = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.entries.push((key.to_string(), value));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(self.doc.record_from(self.entries))
    }
}

impl<'d> ser::SerializeStructVariant for SerializeStructVariant<'d> {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let value = value.serialize(DocumentSerializer::new(&mut *self.doc))?;
        self.entries.push((key.to_string(), value));
        Ok(())
    }

    fn end(self) -> Result<Value> {
        let fields = self.doc.record_from(self.entries);
        Ok(self.doc.record_from(vec![(self.variant, fields)]))
    }
}

/// Exports a graph through serde.
///
/// Shared containers are written in full at each use. A cycle cannot be
/// expressed in a tree-shaped format and fails with a custom error, as does a
/// placeholder that was never resolved.
impl Serialize for Node<'_> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let active = RefCell::new(Vec::new());
        Exported {
            node: *self,
            active: &active,
        }
        .serialize(serializer)
    }
}

struct Exported<'a, 's> {
    node: Node<'a>,
    active: &'s RefCell<Vec<ContainerId>>,
}

impl Exported<'_, '_> {
    fn enter<E: ser::Error>(&self, id: ContainerId) -> std::result::Result<(), E> {
        let mut active = self.active.borrow_mut();
        if active.contains(&id) {
            return Err(E::custom(format!(
                "cannot serialize cyclic container {}",
                id
            )));
        }
        active.push(id);
        Ok(())
    }

    fn leave(&self) {
        self.active.borrow_mut().pop();
    }
}

fn integer<S: ser::Serializer>(i: &BigInt, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if let Ok(v) = i64::try_from(i) {
        serializer.serialize_i64(v)
    } else if let Ok(v) = u64::try_from(i) {
        serializer.serialize_u64(v)
    } else if let Ok(v) = i128::try_from(i) {
        serializer.serialize_i128(v)
    } else {
        serializer.serialize_str(&i.to_string())
    }
}

impl Serialize for Exported<'_, '_> {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let value = self.node.value();
        if let Some(address) = value.ref_marker().filter(|_| value.is_placeholder()) {
            return Err(ser::Error::custom(format!(
                "unresolved reference to {}",
                address
            )));
        }

        match value.data() {
            Data::Null(_) => serializer.serialize_unit(),
            Data::Boolean(b) => serializer.serialize_bool(*b),
            Data::Integer(i) => integer(i, serializer),
            Data::Decimal(d) => match d.to_string().parse::<f64>() {
                Ok(f) => serializer.serialize_f64(f),
                Err(_) => serializer.serialize_str(&d.to_string()),
            },
            Data::Duration(d) => serializer.serialize_str(&format_duration(d)),
            Data::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            Data::String(s) | Data::Symbol(s) => serializer.serialize_str(s),
            Data::Blob(bytes) => serializer.serialize_bytes(bytes),
            Data::Sequence(id) => {
                self.enter::<S::Error>(*id)?;
                let mut seq = serializer.serialize_seq(Some(self.node.len()))?;
                for child in self.node.iter() {
                    seq.serialize_element(&Exported {
                        node: child,
                        active: self.active,
                    })?;
                }
                self.leave();
                seq.end()
            }
            Data::Record(id) => {
                self.enter::<S::Error>(*id)?;
                let mut map = serializer.serialize_map(Some(self.node.len()))?;
                for (name, child) in self.node.entries() {
                    map.serialize_entry(
                        &name.text,
                        &Exported {
                            node: child,
                            active: self.active,
                        },
                    )?;
                }
                self.leave();
                map.end()
            }
        }
    }
}
