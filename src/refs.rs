//! Reference detection for the writer.
//!
//! Before any text is produced the writer walks the graph once from the value
//! being written and decides which containers need an address: every
//! container reached more than once (shared or cyclic) and every container
//! named by a surviving placeholder. Addresses are handed out in the order
//! those containers are first reached, starting at
//! [`Options::first_address`](crate::Options::first_address).
//!
//! ```rust
//! use serde_tdn::refs::plan;
//! use serde_tdn::{Address, Document, Options, Value};
//!
//! let mut doc = Document::new();
//! let shared = doc.sequence_from(vec![Value::from(1)]);
//! let root = doc.sequence_from(vec![shared.clone(), shared.clone()]);
//!
//! let plan = plan(&doc, &root, &Options::default()).unwrap();
//! assert_eq!(plan.len(), 1);
//! assert_eq!(plan.address_of(shared.container_id().unwrap()), Some(Address(1)));
//! ```

use crate::attribute::AttributeSet;
use crate::context::Address;
use crate::document::{Container, ContainerId, Document};
use crate::options::Options;
use crate::value::Value;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Addresses chosen for the containers that must be declared once and
/// referenced afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferencePlan {
    addresses: HashMap<ContainerId, Address>,
}

impl ReferencePlan {
    #[must_use]
    pub fn address_of(&self, id: ContainerId) -> Option<Address> {
        self.addresses.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

struct Detector<'d> {
    doc: &'d Document,
    /// Attributes of the first handle through which each container was reached.
    seen: HashMap<ContainerId, &'d AttributeSet>,
    order: Vec<ContainerId>,
    targets: HashSet<ContainerId>,
    marker_edges: Vec<(Address, ContainerId)>,
    depth: usize,
    max_depth: usize,
}

impl<'d> Detector<'d> {
    fn visit(&mut self, value: &'d Value) -> Result<()> {
        if value.is_placeholder() {
            return self.visit_marker(value);
        }
        let Some(id) = value.container_id() else {
            return Ok(());
        };
        if let Some(first) = self.seen.get(&id) {
            // Every reference reads back with the declaration's attributes.
            if *first != value.attributes() {
                return Err(Error::ConflictingAttributes { index: id.index() });
            }
            self.targets.insert(id);
            return Ok(());
        }
        self.seen.insert(id, value.attributes());
        self.order.push(id);

        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::DepthLimit {
                limit: self.max_depth,
            });
        }
        let doc = self.doc;
        match doc.container_of(value)? {
            Some(Container::Sequence(items)) => {
                for item in items {
                    self.visit(item)?;
                }
            }
            Some(Container::Record(map)) => {
                for item in map.values() {
                    self.visit(item)?;
                }
            }
            None => {}
        }
        self.depth -= 1;
        Ok(())
    }

    /// A placeholder left in the graph is an explicit edge to whatever its
    /// address is bound to.
    fn visit_marker(&mut self, value: &Value) -> Result<()> {
        let address = value
            .ref_marker()
            .ok_or_else(|| Error::custom("malformed reference marker"))?;
        let target = self
            .doc
            .lookup(address)
            .ok_or(Error::DanglingReference { address })?;
        if target.type_tag() != value.type_tag() {
            return Err(Error::TypeMismatch {
                expected: value.type_tag(),
                found: target.type_tag(),
                address,
            });
        }
        match target.container_id() {
            Some(id) => {
                self.targets.insert(id);
                self.marker_edges.push((address, id));
            }
            // Leaf targets are written inline; a marker pointing at a marker
            // has nothing to write.
            None if target.is_placeholder() => {
                return Err(Error::DanglingReference { address });
            }
            None => {}
        }
        Ok(())
    }
}

/// Walks the graph reachable from `root` and assigns addresses, counting up
/// from `options.first_address`.
///
/// Fails with [`Error::DanglingReference`] when a placeholder names an
/// address with no binding, or a container that is never reached from
/// `root` and so would never be declared. Fails with
/// [`Error::ConflictingAttributes`] when one container is reached through
/// handles with different attributes, with [`Error::DepthLimit`] past
/// `options.max_depth`, and when the addresses would run past `u64::MAX`.
pub fn plan(doc: &Document, root: &Value, options: &Options) -> Result<ReferencePlan> {
    let mut detector = Detector {
        doc,
        seen: HashMap::new(),
        order: Vec::new(),
        targets: HashSet::new(),
        marker_edges: Vec::new(),
        depth: 0,
        max_depth: options.max_depth,
    };
    detector.visit(root)?;

    for (address, id) in &detector.marker_edges {
        if !detector.seen.contains_key(id) {
            return Err(Error::DanglingReference { address: *address });
        }
    }

    let mut addresses = HashMap::new();
    let mut next = Some(options.first_address);
    for id in detector.order {
        if detector.targets.contains(&id) {
            let address = next.ok_or_else(|| Error::custom("address space exhausted"))?;
            trace!(container = %id, address = %Address(address), "assigning address");
            addresses.insert(id, Address(address));
            next = address.checked_add(1);
        }
    }
    Ok(ReferencePlan { addresses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeTag;

    #[test]
    fn test_acyclic_tree_needs_no_addresses() {
        let mut doc = Document::new();
        let a = doc.sequence_from(vec![Value::from(1)]);
        let b = doc.sequence_from(vec![Value::from(1)]);
        let root = doc.record_from(vec![("a", a), ("b", b)]);
        assert!(plan(&doc, &root, &Options::default()).unwrap().is_empty());
    }

    #[test]
    fn test_addresses_follow_first_encounter_order() {
        let mut doc = Document::new();
        let late = doc.sequence_from(vec![]);
        let early = doc.record_from(Vec::<(&str, Value)>::new());
        let root = doc.sequence_from(vec![
            early.clone(),
            late.clone(),
            late.clone(),
            early.clone(),
        ]);
        let plan = plan(&doc, &root, &Options::new().with_first_address(5)).unwrap();
        assert_eq!(plan.address_of(early.container_id().unwrap()), Some(Address(5)));
        assert_eq!(plan.address_of(late.container_id().unwrap()), Some(Address(6)));
    }

    #[test]
    fn test_self_cycle_is_addressed() {
        let mut doc = Document::new();
        let record = doc.new_record();
        doc.insert(&record, "me", record.clone()).unwrap();
        let plan = plan(&doc, &record, &Options::default()).unwrap();
        assert_eq!(plan.address_of(record.container_id().unwrap()), Some(Address(1)));
    }

    #[test]
    fn test_marker_without_binding_is_dangling() {
        let mut doc = Document::new();
        let root = doc.sequence_from(vec![Value::reference(TypeTag::Record, Address(4))]);
        assert_eq!(
            plan(&doc, &root, &Options::default()).unwrap_err(),
            Error::DanglingReference {
                address: Address(4)
            }
        );
    }

    #[test]
    fn test_marker_to_unreached_container_is_dangling() {
        let mut doc = Document::new();
        let elsewhere = doc.new_record();
        doc.track(Address(3), elsewhere).unwrap();
        let root = doc.sequence_from(vec![Value::reference(TypeTag::Record, Address(3))]);
        assert_eq!(
            plan(&doc, &root, &Options::default()).unwrap_err(),
            Error::DanglingReference {
                address: Address(3)
            }
        );
    }

    #[test]
    fn test_marker_to_reached_container_makes_it_a_target() {
        let mut doc = Document::new();
        let target = doc.new_record();
        doc.track(Address(9), target.clone()).unwrap();
        let root = doc.sequence_from(vec![
            target.clone(),
            Value::reference(TypeTag::Record, Address(9)),
        ]);
        let plan = plan(&doc, &root, &Options::default()).unwrap();
        assert_eq!(plan.address_of(target.container_id().unwrap()), Some(Address(1)));
    }

    #[test]
    fn test_shared_container_with_conflicting_attributes() {
        let mut doc = Document::new();
        let shared = doc.sequence_from(vec![Value::from(1)]);
        let tagged = shared.clone().with_attribute("a", None);
        let root = doc.sequence_from(vec![tagged.clone(), shared.clone()]);
        let index = shared.container_id().unwrap().index();
        assert_eq!(
            plan(&doc, &root, &Options::default()).unwrap_err(),
            Error::ConflictingAttributes { index }
        );

        let root = doc.sequence_from(vec![tagged.clone(), tagged]);
        assert_eq!(plan(&doc, &root, &Options::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_addresses_stop_at_u64_max() {
        let mut doc = Document::new();
        let a = doc.new_sequence();
        let b = doc.new_sequence();
        let options = Options::new().with_first_address(u64::MAX);

        let one = doc.sequence_from(vec![a.clone(), a.clone()]);
        let plan_one = plan(&doc, &one, &options).unwrap();
        assert_eq!(
            plan_one.address_of(a.container_id().unwrap()),
            Some(Address(u64::MAX))
        );

        let two = doc.sequence_from(vec![a.clone(), a, b.clone(), b]);
        assert!(matches!(plan(&doc, &two, &options), Err(Error::Custom(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = Document::new();
        let mut value = doc.new_sequence();
        for _ in 0..4 {
            value = doc.sequence_from(vec![value]);
        }
        assert!(plan(&doc, &value, &Options::new().with_max_depth(5)).is_ok());
        assert_eq!(
            plan(&doc, &value, &Options::new().with_max_depth(4)).unwrap_err(),
            Error::DepthLimit { limit: 4 }
        );
    }

    #[test]
    fn test_foreign_handle_is_reported() {
        let mut other = Document::new();
        other.new_sequence();
        let foreign = other.new_sequence();
        let doc = Document::new();
        assert_eq!(
            plan(&doc, &foreign, &Options::default()).unwrap_err(),
            Error::UnknownContainer { index: 1 }
        );
    }
}
