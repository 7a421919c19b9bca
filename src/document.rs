//! Document arena: container storage, the address table, and [`Node`] views.
//!
//! Every sequence and record lives in a [`Document`]-owned arena and is named
//! by a [`ContainerId`]. A container [`Value`] is only a handle, so several
//! slots may hold the same container and a container may hold itself. A
//! container is created as an empty *shell*, may be bound to an address, and
//! is then filled in place; its identity does not change while it is filled.
//!
//! ```rust
//! use serde_tdn::{Document, Value};
//!
//! let mut doc = Document::new();
//! let record = doc.new_record();
//! doc.insert(&record, "name", Value::from("loop")).unwrap();
//! doc.insert(&record, "self", record.clone()).unwrap();
//! doc.set_root(record);
//!
//! let root = doc.root_node();
//! assert_eq!(root.len(), 2);
//! assert!(root.get("self").unwrap().same_instance(&root));
//! assert_eq!(root.get("self").unwrap(), root);
//! ```

use crate::context::{Address, Sink};
use crate::map::{PropertyName, RecordMap};
use crate::value::{Data, TypeTag, Value};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::fmt;

/// Handle of a container inside its owning [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub(crate) usize);

impl ContainerId {
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutable, ordered child storage of a sequence or record.
#[derive(Clone, Debug, PartialEq)]
pub enum Container {
    Sequence(Vec<Value>),
    Record(RecordMap),
}

impl Container {
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Container::Sequence(_) => TypeTag::Sequence,
            Container::Record(_) => TypeTag::Record,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Container::Sequence(items) => items.len(),
            Container::Record(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A TDN document: a root value, the containers it reaches, and the
/// addresses declared for them.
#[derive(Clone, Debug, Default)]
pub struct Document {
    containers: Vec<Container>,
    root: Value,
    addresses: IndexMap<Address, Value>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, value: Value) {
        self.root = value;
    }

    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root)
    }

    /// Views any value through this document.
    #[must_use]
    pub fn node<'a>(&'a self, value: &'a Value) -> Node<'a> {
        Node::new(self, value)
    }

    /// Allocates an empty sequence shell.
    pub fn new_sequence(&mut self) -> Value {
        self.containers.push(Container::Sequence(Vec::new()));
        Value::sequence(ContainerId(self.containers.len() - 1))
    }

    /// Allocates an empty record shell.
    pub fn new_record(&mut self) -> Value {
        self.containers.push(Container::Record(RecordMap::new()));
        Value::record(ContainerId(self.containers.len() - 1))
    }

    pub fn sequence_from(&mut self, items: Vec<Value>) -> Value {
        self.containers.push(Container::Sequence(items));
        Value::sequence(ContainerId(self.containers.len() - 1))
    }

    pub fn record_from<K, I>(&mut self, properties: I) -> Value
    where
        K: Into<PropertyName>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.containers
            .push(Container::Record(properties.into_iter().collect()));
        Value::record(ContainerId(self.containers.len() - 1))
    }

    /// Number of containers allocated in the arena.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.0)
    }

    /// Returns the container behind a container value, checking that the
    /// handle's variant matches the stored container.
    pub(crate) fn container_of(&self, value: &Value) -> Result<Option<&Container>> {
        let Some(id) = value.container_id() else {
            return Ok(None);
        };
        let container = self
            .containers
            .get(id.0)
            .ok_or(Error::UnknownContainer { index: id.0 })?;
        if container.type_tag() != value.type_tag() {
            return Err(Error::WrongType {
                expected: value.type_tag(),
                found: container.type_tag(),
            });
        }
        Ok(Some(container))
    }

    fn sequence_mut(&mut self, value: &Value) -> Result<&mut Vec<Value>> {
        match value.data() {
            Data::Sequence(id) => match self.containers.get_mut(id.0) {
                Some(Container::Sequence(items)) => Ok(items),
                Some(Container::Record(_)) => Err(Error::WrongType {
                    expected: TypeTag::Sequence,
                    found: TypeTag::Record,
                }),
                None => Err(Error::UnknownContainer { index: id.0 }),
            },
            _ => Err(Error::WrongType {
                expected: TypeTag::Sequence,
                found: value.type_tag(),
            }),
        }
    }

    fn record_mut(&mut self, value: &Value) -> Result<&mut RecordMap> {
        match value.data() {
            Data::Record(id) => match self.containers.get_mut(id.0) {
                Some(Container::Record(map)) => Ok(map),
                Some(Container::Sequence(_)) => Err(Error::WrongType {
                    expected: TypeTag::Record,
                    found: TypeTag::Sequence,
                }),
                None => Err(Error::UnknownContainer { index: id.0 }),
            },
            _ => Err(Error::WrongType {
                expected: TypeTag::Record,
                found: value.type_tag(),
            }),
        }
    }

    /// Children of a sequence value.
    #[must_use]
    pub fn sequence(&self, value: &Value) -> Option<&[Value]> {
        match self.container_of(value) {
            Ok(Some(Container::Sequence(items))) => Some(items),
            _ => None,
        }
    }

    /// Properties of a record value.
    #[must_use]
    pub fn record(&self, value: &Value) -> Option<&RecordMap> {
        match self.container_of(value) {
            Ok(Some(Container::Record(map))) => Some(map),
            _ => None,
        }
    }

    /// Appends an element to a sequence.
    pub fn push(&mut self, sequence: &Value, item: Value) -> Result<()> {
        self.sequence_mut(sequence)?.push(item);
        Ok(())
    }

    /// Overwrites a sequence element, returning the previous one.
    pub fn set_index(&mut self, sequence: &Value, index: usize, item: Value) -> Result<Value> {
        let items = self.sequence_mut(sequence)?;
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or_else(|| Error::custom(format!("index {} out of bounds (len={})", index, len)))?;
        Ok(std::mem::replace(slot, item))
    }

    /// Writes a record property; the last write for a key wins.
    pub fn insert(
        &mut self,
        record: &Value,
        name: impl Into<PropertyName>,
        item: Value,
    ) -> Result<Option<Value>> {
        Ok(self.record_mut(record)?.insert(name, item))
    }

    #[must_use]
    pub fn get(&self, record: &Value, key: &str) -> Option<&Value> {
        self.record(record).and_then(|map| map.get(key))
    }

    #[must_use]
    pub fn at(&self, sequence: &Value, index: usize) -> Option<&Value> {
        self.sequence(sequence).and_then(|items| items.get(index))
    }

    /// Child count of a container value; `None` for anything else.
    #[must_use]
    pub fn len(&self, value: &Value) -> Option<usize> {
        match self.container_of(value) {
            Ok(Some(container)) => Some(container.len()),
            _ => None,
        }
    }

    /// Binds `address` to `value`.
    ///
    /// The text form only declares addresses on sequences and records, but
    /// leaves may be bound too: code that rebuilds a graph binds whatever it
    /// allocated, and a leaf-tagged reference then resolves to a copy of the
    /// leaf. A placeholder cannot be bound.
    ///
    /// Binding an address again to the same container is a no-op; binding it
    /// to anything else fails with [`Error::DuplicateAddress`].
    pub fn track(&mut self, address: Address, value: Value) -> Result<()> {
        if value.is_placeholder() {
            return Err(Error::custom(format!(
                "cannot bind {} to an unresolved reference",
                address
            )));
        }
        if let Some(existing) = self.addresses.get(&address) {
            let same_container = existing.container_id().is_some()
                && existing.container_id() == value.container_id();
            if same_container {
                return Ok(());
            }
            return Err(Error::DuplicateAddress { address });
        }
        self.addresses.insert(address, value);
        Ok(())
    }

    /// Returns the value currently bound to `address`.
    #[must_use]
    pub fn lookup(&self, address: Address) -> Option<&Value> {
        self.addresses.get(&address)
    }

    /// Iterates bound addresses in declaration order.
    pub fn addresses(&self) -> impl Iterator<Item = (Address, &Value)> {
        self.addresses.iter().map(|(address, value)| (*address, value))
    }

    #[must_use]
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    /// Value currently held by a slot.
    pub(crate) fn slot(&self, sink: &Sink) -> Option<&Value> {
        match sink {
            Sink::Root => Some(&self.root),
            Sink::SequenceSlot { container, index } => match self.containers.get(container.0) {
                Some(Container::Sequence(items)) => items.get(*index),
                _ => None,
            },
            Sink::RecordSlot { container, key } => match self.containers.get(container.0) {
                Some(Container::Record(map)) => map.get(key),
                _ => None,
            },
        }
    }

    /// Overwrites a slot, returning the value it held.
    pub(crate) fn replace_slot(&mut self, sink: &Sink, value: Value) -> Result<Value> {
        let slot = match sink {
            Sink::Root => Some(&mut self.root),
            Sink::SequenceSlot { container, index } => match self.containers.get_mut(container.0) {
                Some(Container::Sequence(items)) => items.get_mut(*index),
                _ => None,
            },
            Sink::RecordSlot { container, key } => match self.containers.get_mut(container.0) {
                Some(Container::Record(map)) => map.get_mut(key),
                _ => None,
            },
        };
        let slot = slot.ok_or_else(|| Error::custom(format!("no such slot: {}", sink)))?;
        Ok(std::mem::replace(slot, value))
    }
}

/// A value viewed through the document that owns its containers.
///
/// `Node` is the structural face of a value: its `PartialEq` and `Hash`
/// recurse into containers and stop at cycles, while
/// [`Node::same_instance`] compares identity only.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    value: &'a Value,
}

impl<'a> Node<'a> {
    #[must_use]
    pub fn new(doc: &'a Document, value: &'a Value) -> Self {
        Node { doc, value }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &'a Value {
        self.value
    }

    #[inline]
    #[must_use]
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    #[inline]
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.value.type_tag()
    }

    /// Record property by text.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Node<'a>> {
        self.doc.get(self.value, key).map(|v| Node::new(self.doc, v))
    }

    /// Sequence element by position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Node<'a>> {
        self.doc.at(self.value, index).map(|v| Node::new(self.doc, v))
    }

    /// Child count; zero for anything that is not a container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.len(self.value).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence elements or record values, in order.
    pub fn iter(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let doc = self.doc;
        let children: Box<dyn Iterator<Item = &'a Value> + 'a> =
            match doc.container_of(self.value) {
                Ok(Some(Container::Sequence(items))) => Box::new(items.iter()),
                Ok(Some(Container::Record(map))) => Box::new(map.values()),
                _ => Box::new(std::iter::empty()),
            };
        children.map(move |v| Node::new(doc, v))
    }

    /// Record properties with their names, in first-write order.
    pub fn entries(&self) -> impl Iterator<Item = (&'a PropertyName, Node<'a>)> + 'a {
        let doc = self.doc;
        doc.record(self.value)
            .into_iter()
            .flat_map(|map| map.iter())
            .map(move |p| (&p.name, Node::new(doc, &p.value)))
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::ser::node_to_string(*self) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}", self.value),
        }
    }
}
