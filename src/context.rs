//! Address table and deferred reference resolution for one parse session.
//!
//! Reading a document is a two-phase protocol. While the tree is built, every
//! reference token becomes a *placeholder* (a null of the expected variant
//! carrying the reserved ref marker) and one [`PendingPatch`] is recorded
//! naming the address it needs and the slot it sits in. Container shells are
//! bound to their address *before* their children are read, so a child may
//! name its own ancestor. Once the whole document exists,
//! [`Context::resolve_all`] runs every patch in registration order and
//! overwrites each placeholder's slot with the bound value.
//!
//! ```rust
//! use serde_tdn::{Address, Context, Document, Options, Sink, TypeTag, Value};
//!
//! let mut doc = Document::new();
//! let mut ctx = Context::new(&mut doc, &Options::default());
//!
//! let record = ctx.document_mut().new_record();
//! ctx.track(Address(1), record.clone()).unwrap();
//! let id = record.container_id().unwrap();
//! let placeholder = ctx.placeholder(
//!     TypeTag::Record,
//!     Address(1),
//!     Sink::RecordSlot { container: id, key: "me".into() },
//! );
//! ctx.document_mut().insert(&record, "me", placeholder).unwrap();
//! ctx.document_mut().set_root(record);
//! ctx.resolve_all().unwrap();
//!
//! let root = doc.root_node();
//! assert!(root.get("me").unwrap().same_instance(&root));
//! ```

use crate::document::{ContainerId, Document};
use crate::options::Options;
use crate::value::{TypeTag, Value};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace, warn};

/// A document-scoped address naming one container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A slot that can hold a value and be overwritten during resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sink {
    /// The document root.
    Root,
    SequenceSlot {
        container: ContainerId,
        index: usize,
    },
    RecordSlot {
        container: ContainerId,
        key: String,
    },
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Root => f.write_str("root"),
            Sink::SequenceSlot { container, index } => write!(f, "{}[{}]", container, index),
            Sink::RecordSlot { container, key } => write!(f, "{}.{}", container, key),
        }
    }
}

/// A recorded action: once `address` is bound, check its variant against
/// `expected` and write it into `sink`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPatch {
    pub address: Address,
    pub expected: TypeTag,
    pub sink: Sink,
}

/// The deserialization context of one document.
///
/// The context borrows its [`Document`] for the whole session and is consumed
/// by [`resolve_all`](Context::resolve_all), so resolution runs exactly once.
pub struct Context<'d> {
    document: &'d mut Document,
    pending: Vec<PendingPatch>,
    max_addresses: Option<usize>,
}

impl<'d> Context<'d> {
    pub fn new(document: &'d mut Document, options: &Options) -> Self {
        Context {
            document,
            pending: Vec::new(),
            max_addresses: options.max_addresses,
        }
    }

    #[inline]
    pub fn document(&self) -> &Document {
        self.document
    }

    #[inline]
    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    /// Binds `address` to `value` (normally a freshly allocated shell).
    pub fn track(&mut self, address: Address, value: Value) -> Result<()> {
        if let Some(limit) = self.max_addresses {
            if self.document.lookup(address).is_none() && self.document.address_count() >= limit {
                return Err(Error::AddressLimit { limit });
            }
        }
        trace!(%address, tag = %value.type_tag(), "tracking address");
        self.document.track(address, value)
    }

    #[must_use]
    pub fn lookup(&self, address: Address) -> Option<&Value> {
        self.document.lookup(address)
    }

    /// Records a patch to run during [`resolve_all`](Context::resolve_all).
    pub fn defer(&mut self, patch: PendingPatch) {
        self.pending.push(patch);
    }

    /// Creates the placeholder for a reference token and defers exactly one
    /// patch that will overwrite `sink` with the resolved value. The caller
    /// stores the returned placeholder in `sink`.
    pub fn placeholder(&mut self, expected: TypeTag, address: Address, sink: Sink) -> Value {
        self.defer(PendingPatch {
            address,
            expected,
            sink,
        });
        Value::reference(expected, address)
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingPatch] {
        &self.pending
    }

    /// Runs every deferred patch in registration order.
    ///
    /// Failures do not stop the pass: each unresolved address and each type
    /// mismatch is collected and returned together as
    /// [`Error::Resolution`]. Slots whose patch failed keep their placeholder.
    /// Patches naming the same slot and address run once.
    pub fn resolve_all(mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let total = pending.len();
        let mut errors = Vec::new();
        let mut visited = HashSet::new();

        for patch in pending {
            // A repeated key leaves one placeholder behind for several
            // identical patches; only the first one runs.
            if !visited.insert((patch.sink.clone(), patch.address)) {
                continue;
            }
            if let Err(err) = apply(self.document, &patch) {
                debug!(address = %patch.address, sink = %patch.sink, error = %err, "reference failed to resolve");
                errors.push(err);
            }
        }

        debug!(total, failed = errors.len(), "resolved deferred references");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Resolution(errors))
        }
    }
}

fn apply(document: &mut Document, patch: &PendingPatch) -> Result<()> {
    // A later write to the same record key supersedes the placeholder.
    match document.slot(&patch.sink) {
        Some(current) if current.ref_marker() == Some(patch.address) => {}
        _ => {
            trace!(sink = %patch.sink, "placeholder superseded, skipping patch");
            return Ok(());
        }
    }

    let target = document
        .lookup(patch.address)
        .cloned()
        .ok_or(Error::UnresolvedReference {
            address: patch.address,
        })?;
    if target.type_tag() != patch.expected {
        return Err(Error::TypeMismatch {
            expected: patch.expected,
            found: target.type_tag(),
            address: patch.address,
        });
    }

    trace!(address = %patch.address, sink = %patch.sink, "patching slot");
    document.replace_slot(&patch.sink, target)?;
    Ok(())
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "context dropped before resolve_all; placeholders remain"
            );
        }
    }
}
