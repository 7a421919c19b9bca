//! Cycle-aware structural equality and hashing for [`Node`].
//!
//! Two nodes are equal when their variants, attributes, and contents are
//! equal, recursively. Container identity and declared addresses play no
//! part, so separately built but identical graphs compare equal.
//!
//! Recursion is driven jointly over both operands. Each side keeps the
//! containers currently on its traversal stack together with the depth at
//! which they were entered. Re-entering a container on both sides at the same
//! depth closes a matching cycle and counts as equal; re-entering on one side
//! only, or at different depths, is a structural difference. Hashing follows
//! the same walk and contributes a sentinel plus the entry depth instead of
//! recursing, so equal nodes always hash equally and cyclic graphs hash in
//! bounded time.

use crate::document::{Container, ContainerId, Document, Node};
use crate::value::{Data, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ptr;

const CYCLE_SENTINEL: u64 = 0xc1c1_e000_5e47_1e11;
const UNKNOWN_SENTINEL: u64 = 0xdead_c047_a1e2_0000;

#[derive(Default)]
struct JointWalk {
    left: HashMap<ContainerId, usize>,
    right: HashMap<ContainerId, usize>,
}

impl JointWalk {
    fn values(&mut self, ldoc: &Document, l: &Value, rdoc: &Document, r: &Value) -> bool {
        if l.attributes() != r.attributes() {
            return false;
        }
        match (l.data(), r.data()) {
            (Data::Sequence(a), Data::Sequence(b)) | (Data::Record(a), Data::Record(b)) => {
                self.containers(ldoc, *a, rdoc, *b)
            }
            (a, b) => a == b,
        }
    }

    fn containers(&mut self, ldoc: &Document, a: ContainerId, rdoc: &Document, b: ContainerId) -> bool {
        match (self.left.get(&a), self.right.get(&b)) {
            (Some(da), Some(db)) => return da == db,
            (None, None) => {}
            _ => return false,
        }

        let (ca, cb) = match (ldoc.container(a), rdoc.container(b)) {
            (Some(ca), Some(cb)) => (ca, cb),
            (None, None) => return ptr::eq(ldoc, rdoc) && a == b,
            _ => return false,
        };

        let depth = self.left.len();
        self.left.insert(a, depth);
        self.right.insert(b, depth);

        let equal = match (ca, cb) {
            (Container::Sequence(xs), Container::Sequence(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|(x, y)| self.values(ldoc, x, rdoc, y))
            }
            (Container::Record(xs), Container::Record(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|(x, y)| {
                        x.name == y.name && self.values(ldoc, &x.value, rdoc, &y.value)
                    })
            }
            _ => false,
        };

        self.left.remove(&a);
        self.right.remove(&b);
        equal
    }
}

fn hash_value<H: Hasher>(
    doc: &Document,
    value: &Value,
    state: &mut H,
    active: &mut HashMap<ContainerId, usize>,
) {
    value.attributes().hash(state);
    let id = match value.data() {
        Data::Sequence(id) | Data::Record(id) => *id,
        data => return data.hash(state),
    };
    value.type_tag().hash(state);

    if let Some(depth) = active.get(&id) {
        CYCLE_SENTINEL.hash(state);
        depth.hash(state);
        return;
    }
    let Some(container) = doc.container(id) else {
        UNKNOWN_SENTINEL.hash(state);
        id.hash(state);
        return;
    };

    active.insert(id, active.len());
    container.len().hash(state);
    match container {
        Container::Sequence(items) => {
            for item in items {
                hash_value(doc, item, state, active);
            }
        }
        Container::Record(map) => {
            for property in map.iter() {
                property.name.hash(state);
                hash_value(doc, &property.value, state, active);
            }
        }
    }
    active.remove(&id);
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        JointWalk::default().values(self.document(), self.value(), other.document(), other.value())
    }
}

impl Eq for Node<'_> {}

impl Hash for Node<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(self.document(), self.value(), state, &mut HashMap::new());
    }
}

impl<'a> Node<'a> {
    /// Identity equality: `true` only if both nodes are the very same
    /// container of the same document (or, for leaves, the same slot).
    /// Never looks at children.
    #[must_use]
    pub fn same_instance(&self, other: &Node<'_>) -> bool {
        match (self.value().container_id(), other.value().container_id()) {
            (Some(a), Some(b)) => {
                ptr::eq(self.document(), other.document())
                    && a == b
                    && self.type_tag() == other.type_tag()
            }
            (None, None) => ptr::eq(self.value(), other.value()),
            _ => false,
        }
    }

    /// Cycle-aware structural hash using the standard library's default
    /// hasher.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
