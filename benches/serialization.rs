use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use serde_tdn::{
    from_str, parse, parse_with_options, serialize_document_with_options, to_string, Document,
    Options, Value,
};

#[derive(Serialize, Deserialize, Clone)]
struct User {
    id: u32,
    name: String,
    email: String,
    active: bool,
}

#[derive(Serialize, Deserialize, Clone)]
struct Product {
    sku: String,
    name: String,
    price: f64,
    quantity: u32,
}

fn products(size: u32) -> Vec<Product> {
    (0..size)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            name: format!("Product {}", i),
            price: 9.99 + f64::from(i),
            quantity: i,
        })
        .collect()
}

/// A ring of `size` records, each pointing at the next and at a shared tag
/// list. Written out, the ring nests `size` levels deep.
fn ring(size: usize) -> Document {
    let mut doc = Document::new();
    let tags = doc.sequence_from(vec![Value::from("a"), Value::from("b")]);
    let nodes: Vec<Value> = (0..size).map(|_| doc.new_record()).collect();
    for (i, node) in nodes.iter().enumerate() {
        doc.insert(node, "id", Value::from(i as u64)).unwrap();
        doc.insert(node, "tags", tags.clone()).unwrap();
        doc.insert(node, "next", nodes[(i + 1) % size].clone()).unwrap();
    }
    doc.set_root(nodes[0].clone());
    doc
}

fn benchmark_serialize_simple(c: &mut Criterion) {
    let user = User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
    };

    c.bench_function("serialize_simple_struct", |b| {
        b.iter(|| to_string(black_box(&user)))
    });
}

fn benchmark_deserialize_simple(c: &mut Criterion) {
    let text = "{id: 123, name: \"Alice\", email: \"alice@example.com\", active: true}";

    c.bench_function("deserialize_simple_struct", |b| {
        b.iter(|| from_str::<User>(black_box(text)))
    });
}

fn benchmark_serialize_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_array");

    for size in [10, 100, 500].iter() {
        let items = products(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| to_string(black_box(&items)))
        });
    }
    group.finish();
}

fn benchmark_deserialize_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize_array");

    for size in [10, 100, 500].iter() {
        let text = to_string(&products(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| from_str::<Vec<Product>>(black_box(text)))
        });
    }
    group.finish();
}

fn benchmark_cyclic_graphs(c: &mut Criterion) {
    let mut group = c.benchmark_group("cyclic_ring");
    let options = Options::new().with_max_depth(4096);

    for size in [10, 100, 1000].iter() {
        let doc = ring(*size);
        let text = serialize_document_with_options(&doc, &options).unwrap();

        group.bench_with_input(BenchmarkId::new("write", size), &doc, |b, doc| {
            b.iter(|| serialize_document_with_options(black_box(doc), &options))
        });
        group.bench_with_input(BenchmarkId::new("read", size), &text, |b, text| {
            b.iter(|| parse_with_options(black_box(text), &options))
        });
    }
    group.finish();
}

fn benchmark_forward_references(c: &mut Criterion) {
    // Every reference precedes its declaration.
    let size = 200;
    let mut text = String::from("[");
    for i in 1..=size {
        text.push_str(&format!("Ref:Sequence 0x{:x}, ", i));
    }
    for i in 1..=size {
        if i > 1 {
            text.push_str(", ");
        }
        text.push_str(&format!("#{};[{}]", i, i));
    }
    text.push(']');

    c.bench_function("parse_forward_references", |b| {
        b.iter(|| parse(black_box(&text)))
    });
}

fn benchmark_equality_and_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_eq");

    let left = ring(500);
    let options = Options::new().with_max_depth(4096);
    let text = serialize_document_with_options(&left, &options).unwrap();
    let right = parse_with_options(&text, &options).unwrap();

    group.bench_function("eq_cyclic", |b| {
        b.iter(|| black_box(left.root_node()) == black_box(right.root_node()))
    });
    group.bench_function("hash_cyclic", |b| {
        b.iter(|| black_box(left.root_node()).structural_hash())
    });

    group.finish();
}

fn benchmark_comparison_with_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("tdn_vs_json");
    let items = products(100);

    group.bench_function("tdn_serialize", |b| {
        b.iter(|| to_string(black_box(&items)))
    });
    group.bench_function("json_serialize", |b| {
        b.iter(|| serde_json::to_string(black_box(&items)))
    });

    let tdn_text = to_string(&items).unwrap();
    let json_text = serde_json::to_string(&items).unwrap();

    group.bench_function("tdn_deserialize", |b| {
        b.iter(|| from_str::<Vec<Product>>(black_box(&tdn_text)))
    });
    group.bench_function("json_deserialize", |b| {
        b.iter(|| serde_json::from_str::<Vec<Product>>(black_box(&json_text)))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_serialize_simple,
    benchmark_deserialize_simple,
    benchmark_serialize_array,
    benchmark_deserialize_array,
    benchmark_cyclic_graphs,
    benchmark_forward_references,
    benchmark_equality_and_hash,
    benchmark_comparison_with_json
);
criterion_main!(benches);
