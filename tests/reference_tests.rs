//! Address declarations, references, and cycle-aware comparison across the
//! public API.

use serde_tdn::{
    parse, serialize_document, Address, Context, Document, Error, Options, Sink, TypeTag, Value,
};
use std::collections::HashSet;

#[test]
fn test_record_referencing_itself() {
    let doc = parse("#2;{abcd: 1, xyz: Ref:Record 0x2, more: []}").unwrap();
    let root = doc.root_node();

    assert_eq!(root.len(), 3);
    assert_eq!(root.get("abcd").unwrap().value().as_i64(), Some(1));
    let xyz = root.get("xyz").unwrap();
    assert!(xyz.same_instance(&root));
    assert_eq!(xyz, root);
    assert_eq!(root.get("more").unwrap().type_tag(), TypeTag::Sequence);
}

#[test]
fn test_sequence_containing_itself() {
    let doc = parse("#2;[1, Ref:Sequence 0x2]").unwrap();
    let root = doc.root_node();
    assert_eq!(root.at(0).unwrap().value().as_i64(), Some(1));
    assert!(root.at(1).unwrap().same_instance(&root));
    assert_eq!(serialize_document(&doc).unwrap(), "#1;[1, Ref:Sequence 0x1]");
}

#[test]
fn test_self_reference_through_context_terminates() {
    let mut doc = Document::new();
    let mut ctx = Context::new(&mut doc, &Options::default());
    let record = ctx.document_mut().new_record();
    ctx.track(Address(1), record.clone()).unwrap();
    ctx.document_mut()
        .insert(&record, "name", Value::from("r"))
        .unwrap();
    let sink = Sink::RecordSlot {
        container: record.container_id().unwrap(),
        key: "me".to_string(),
    };
    let placeholder = ctx.placeholder(TypeTag::Record, Address(1), sink);
    ctx.document_mut().insert(&record, "me", placeholder).unwrap();
    ctx.document_mut().set_root(record);
    ctx.resolve_all().unwrap();

    let root = doc.root_node();
    let me = root.get("me").unwrap();
    assert_eq!(me, root);
    assert!(me.same_instance(&root));
}

#[test]
fn test_forward_reference_resolves_to_later_declaration() {
    let doc = parse("[#2;[Ref:Sequence 0x5, 0], #5;[1, 2]]").unwrap();
    let root = doc.root_node();
    let first = root.at(0).unwrap();
    let later = root.at(1).unwrap();
    assert!(first.at(0).unwrap().same_instance(&later));
    assert_eq!(doc.lookup(Address(5)), Some(later.value()));
}

#[test]
fn test_dangling_reference_reports_exactly_that_address() {
    let err = parse("#1;{a: Ref:Record 0x1, b: Ref:Sequence 0x40, c: Ref:Record 0x1}")
        .unwrap_err();
    assert_eq!(
        err,
        Error::Resolution(vec![Error::UnresolvedReference {
            address: Address(0x40)
        }])
    );
    assert_eq!(err.unresolved_addresses(), vec![Address(0x40)]);
}

#[test]
fn test_other_patches_still_run_after_a_failure() {
    let mut doc = Document::new();
    let mut ctx = Context::new(&mut doc, &Options::default());
    let seq = ctx.document_mut().new_sequence();
    ctx.track(Address(1), seq.clone()).unwrap();
    let id = seq.container_id().unwrap();

    for (index, address) in [9, 1].into_iter().enumerate() {
        let placeholder = ctx.placeholder(
            TypeTag::Sequence,
            Address(address),
            Sink::SequenceSlot {
                container: id,
                index,
            },
        );
        ctx.document_mut().push(&seq, placeholder).unwrap();
    }
    ctx.document_mut().set_root(seq.clone());
    assert!(ctx.resolve_all().is_err());

    assert!(doc.at(&seq, 0).unwrap().is_placeholder());
    assert_eq!(doc.at(&seq, 1), Some(&seq));
}

#[test]
fn test_addresses_do_not_affect_equality() {
    let a = parse("#1;{v: 1, me: Ref:Record 0x1}").unwrap();
    let b = parse("#77;{v: 1, me: Ref:Record 0x4d}").unwrap();
    assert_eq!(a.root_node(), b.root_node());
    assert!(!a.root_node().same_instance(&b.root_node()));

    let c = parse("#1;{v: 2, me: Ref:Record 0x1}").unwrap();
    assert_ne!(a.root_node(), c.root_node());
}

#[test]
fn test_hash_is_stable_under_cycles() {
    let a = parse("#1;{v: 1, me: Ref:Record 0x1}").unwrap();
    let b = parse("#2;{v: 1, me: Ref:Record 0x2}").unwrap();
    let root = a.root_node();
    assert_eq!(root.structural_hash(), root.structural_hash());
    assert_eq!(root.structural_hash(), b.root_node().structural_hash());

    let mut set = HashSet::new();
    set.insert(a.root_node());
    assert!(set.contains(&b.root_node()));
}

#[test]
fn test_type_mismatch_is_reported() {
    let err = parse("#1;[Ref:Record 0x1]").unwrap_err();
    assert_eq!(
        err,
        Error::Resolution(vec![Error::TypeMismatch {
            expected: TypeTag::Record,
            found: TypeTag::Sequence,
            address: Address(1),
        }])
    );
}

#[test]
fn test_duplicate_declaration_is_rejected() {
    assert_eq!(
        parse("{a: #3;[], b: #3;[]}").unwrap_err(),
        Error::DuplicateAddress {
            address: Address(3)
        }
    );
}

#[test]
fn test_address_limit() {
    let options = Options::new().with_max_addresses(2);
    assert!(serde_tdn::parse_with_options("[#1;[], #2;[]]", &options).is_ok());
    assert_eq!(
        serde_tdn::parse_with_options("[#1;[], #2;[], #3;[]]", &options).unwrap_err(),
        Error::AddressLimit { limit: 2 }
    );
}

#[test]
fn test_mutual_cycle_round_trip() {
    let doc = parse("#1;{name: a, peer: #2;{name: b, peer: Ref:Record 0x1}}").unwrap();
    let text = serialize_document(&doc).unwrap();
    // Only the record that is re-entered needs an address.
    assert_eq!(text, "#1;{name: a, peer: {name: b, peer: Ref:Record 0x1}}");

    let again = parse(&text).unwrap();
    assert_eq!(again.root_node(), doc.root_node());
    let peer = again.root_node().get("peer").unwrap();
    assert!(peer.get("peer").unwrap().same_instance(&again.root_node()));
}

#[test]
fn test_shared_container_written_once() {
    let mut doc = Document::new();
    let shared = doc.record_from(vec![("k", Value::from(1))]);
    let root = doc.sequence_from(vec![shared.clone(), Value::from(2), shared]);
    doc.set_root(root);

    let text = serialize_document(&doc).unwrap();
    assert_eq!(text, "[#1;{k: 1}, 2, Ref:Record 0x1]");
    let again = parse(&text).unwrap();
    let root = again.root_node();
    assert!(root.at(0).unwrap().same_instance(&root.at(2).unwrap()));
}

#[test]
fn test_writer_rejects_dangling_marker() {
    let mut doc = Document::new();
    let root = doc.sequence_from(vec![Value::reference(TypeTag::Sequence, Address(12))]);
    doc.set_root(root);
    assert_eq!(
        serialize_document(&doc).unwrap_err(),
        Error::DanglingReference {
            address: Address(12)
        }
    );
}

#[test]
fn test_writer_rejects_foreign_container() {
    let mut other = Document::new();
    for _ in 0..3 {
        other.new_record();
    }
    let foreign = other.new_record();

    let mut doc = Document::new();
    let root = doc.sequence_from(vec![foreign]);
    doc.set_root(root);
    assert_eq!(
        serialize_document(&doc).unwrap_err(),
        Error::UnknownContainer { index: 3 }
    );
}

#[test]
fn test_attributes_travel_with_shared_container() {
    let doc = parse("[@tag:x; #1;[1], Ref:Sequence 0x1]").unwrap();
    let root = doc.root_node();
    let second = root.at(1).unwrap();
    assert_eq!(second.value().attributes().get("tag"), Some(Some("x")));
    assert_eq!(
        serialize_document(&doc).unwrap(),
        "[@tag:x; #1;[1], Ref:Sequence 0x1]"
    );
}

#[test]
fn test_shared_container_with_differing_attributes_is_not_written() {
    let mut doc = Document::new();
    let shared = doc.sequence_from(vec![Value::from(1)]);
    let root = doc.sequence_from(vec![shared.clone().with_attribute("a", None), shared.clone()]);
    doc.set_root(root);

    assert_eq!(
        serialize_document(&doc).unwrap_err(),
        Error::ConflictingAttributes {
            index: shared.container_id().unwrap().index()
        }
    );
}

#[test]
fn test_attributes_on_reference_token_are_rejected() {
    let err = parse("#1;[@keep; Ref:Sequence 0x1]").unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidFormat {
            line: 1,
            col: 5,
            ..
        }
    ));
}

#[test]
fn test_repeated_key_reports_its_reference_once() {
    let err = parse("{a: Ref:Record 0x9, a: Ref:Record 0x9}").unwrap_err();
    assert_eq!(
        err,
        Error::Resolution(vec![Error::UnresolvedReference {
            address: Address(9)
        }])
    );

    // Distinct slots naming the same address are still reported separately.
    let err = parse("[Ref:Record 0x9, Ref:Record 0x9]").unwrap_err();
    assert_eq!(err.unresolved_addresses(), vec![Address(9), Address(9)]);
}

#[test]
fn test_leaf_tagged_reference_to_container_is_a_mismatch() {
    let err = parse("[#1;[], Ref:Integer 0x1]").unwrap_err();
    assert_eq!(
        err,
        Error::Resolution(vec![Error::TypeMismatch {
            expected: TypeTag::Integer,
            found: TypeTag::Sequence,
            address: Address(1)
        }])
    );
}

#[test]
fn test_leaf_tagged_reference_resolves_by_slot_overwrite() {
    let mut doc = Document::new();
    let mut ctx = Context::new(&mut doc, &Options::default());
    ctx.track(Address(7), Value::from(5)).unwrap();
    let record = ctx.document_mut().new_record();
    let sink = Sink::RecordSlot {
        container: record.container_id().unwrap(),
        key: "n".to_string(),
    };
    let placeholder = ctx.placeholder(TypeTag::Integer, Address(7), sink);
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.type_tag(), TypeTag::Integer);
    ctx.document_mut().insert(&record, "n", placeholder).unwrap();
    ctx.document_mut().set_root(record);
    ctx.resolve_all().unwrap();

    let root = doc.root_node();
    let n = root.get("n").unwrap();
    assert!(!n.value().is_placeholder());
    assert_eq!(n.value(), &Value::from(5));
    assert_eq!(serialize_document(&doc).unwrap(), "{n: 5}");
}
