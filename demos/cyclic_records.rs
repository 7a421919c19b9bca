//! Reading, comparing, and writing graphs with shared and cyclic containers.
//!
//! Run with: cargo run --example cyclic_records

use serde_tdn::{parse, serialize_document, Document, Error, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A record that contains itself, declared at address 2.
    let doc = parse("#2;{abcd: 1, xyz: Ref:Record 0x2, more: []}")?;
    let root = doc.root_node();
    let xyz = root.get("xyz").ok_or("missing xyz")?;
    println!("xyz is the root itself: {}", xyz.same_instance(&root));

    // References may come before the container they name.
    let forward = parse("[#2;[Ref:Sequence 0x5], #5;[1]]")?;
    let list = forward.root_node();
    let inner = list.at(0).and_then(|n| n.at(0)).ok_or("missing element")?;
    let target = list.at(1).ok_or("missing element")?;
    println!("forward reference resolved: {}", inner.same_instance(&target));

    // Equality is structural and terminates on cycles.
    let twin = parse("#9;{abcd: 1, xyz: Ref:Record 0x9, more: []}")?;
    println!("equal to a separately read twin: {}", root == twin.root_node());
    println!(
        "same hash: {}",
        root.structural_hash() == twin.root_node().structural_hash()
    );

    // Building a shared container by hand; the writer declares it once.
    let mut built = Document::new();
    let shared = built.sequence_from(vec![Value::from(1), Value::from(2)]);
    let record = built.new_record();
    built.insert(&record, "left", shared.clone())?;
    built.insert(&record, "right", shared)?;
    built.insert(&record, "me", record.clone())?;
    built.set_root(record);
    println!("written: {}", serialize_document(&built)?);

    // Every unresolved reference is reported at once.
    match parse("[Ref:Record 0x3, #4;[], Ref:Record 0x4]") {
        Err(Error::Resolution(errors)) => {
            for error in errors {
                println!("resolution error: {}", error);
            }
        }
        other => println!("unexpected: {:?}", other.map(|d| d.address_count())),
    }

    Ok(())
}
