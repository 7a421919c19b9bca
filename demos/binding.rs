//! Moving between Rust types and TDN text.
//!
//! Run with: cargo run --example binding

use serde::{Deserialize, Serialize};
use serde_tdn::{from_str, to_document, to_string};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
enum Shape {
    Point,
    Circle(f64),
    Rect { w: u32, h: u32 },
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Drawing {
    title: String,
    shapes: Vec<Shape>,
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pair {
    left: Vec<i32>,
    right: Vec<i32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let drawing = Drawing {
        title: "sketch".to_string(),
        shapes: vec![Shape::Point, Shape::Circle(1.5), Shape::Rect { w: 2, h: 3 }],
        owner: None,
    };

    let text = to_string(&drawing)?;
    println!("TDN: {}", text);

    let back: Drawing = from_str(&text)?;
    println!("round trip equal: {}", back == drawing);

    // The intermediate document can be exported to any serde format.
    let doc = to_document(&drawing)?;
    println!("JSON: {}", serde_json::to_string(&doc.root_node())?);

    // A shared container binds once per use.
    let pair: Pair = from_str("{left: #1;[1, 2], right: Ref:Sequence 0x1}")?;
    println!("left = {:?}, right = {:?}", pair.left, pair.right);

    // A cycle cannot be bound to owned values.
    let cyclic: Result<Vec<Vec<i32>>, _> = from_str("#1;[Ref:Sequence 0x1]");
    if let Err(e) = cyclic {
        println!("cyclic input rejected: {}", e);
    }

    Ok(())
}
