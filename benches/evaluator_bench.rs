//! Criterion benchmarks for the evaluator.
//!
//! Expressions are compiled once outside the measurement loop; each
//! iteration measures evaluation only.
//!
//! Run:
//!   cargo bench
//!   cargo bench -- path      # one group

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use jsonata_eval::{Expression, Value};

// ── Data builders ────────────────────────────────────────────────────────────

fn tiny_obj(key: &str, val: Value) -> Value {
    let mut m = IndexMap::new();
    m.insert(key.to_string(), val);
    Value::object(m)
}

/// Order list of n entries: {product, price, qty}.
fn orders(n: usize) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| {
            let mut m = IndexMap::new();
            m.insert("product".to_string(), Value::string(format!("Item {i}")));
            m.insert("price".to_string(), Value::Int(10 + (i as i64 % 90) * 3));
            m.insert("qty".to_string(), Value::Int(1 + i as i64 % 4));
            Value::object(m)
        })
        .collect();
    tiny_obj("orders", Value::array(items))
}

// ── Benchmarks ───────────────────────────────────────────────────────────────

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for expr in ["name", "orders[price > 100].product", "$floor($sum(orders.price) / 7)"] {
        group.bench_with_input(BenchmarkId::from_parameter(expr), expr, |b, expr| {
            b.iter(|| Expression::compile(black_box(expr)).unwrap());
        });
    }
    group.finish();
}

fn bench_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("path");

    let data = tiny_obj("name", Value::string("Alice"));
    let expr = Expression::compile("name").unwrap();
    group.bench_function("simple_field", |b| {
        b.iter(|| expr.evaluate(black_box(&data)).unwrap());
    });

    for n in [10_usize, 100, 1000] {
        let data = orders(n);
        let expr = Expression::compile("orders[price > 100].product").unwrap();
        group.bench_with_input(BenchmarkId::new("filter_project", n), &data, |b, data| {
            b.iter(|| expr.evaluate(black_box(data)).unwrap());
        });
    }
    group.finish();
}

fn bench_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("functions");

    let data = orders(100);
    let expr = Expression::compile("$sum(orders.price)").unwrap();
    group.bench_function("sum_100", |b| {
        b.iter(|| expr.evaluate(black_box(&data)).unwrap());
    });

    let data = tiny_obj("s", Value::string("The Quick Brown Fox"));
    let expr = Expression::compile("$lowercase(s, $ & \"!\")").unwrap();
    group.bench_function("rebinding_lowercase", |b| {
        b.iter(|| expr.evaluate(black_box(&data)).unwrap());
    });

    let data = tiny_obj("u", Value::string("a b&c d/e?f=g h"));
    let expr = Expression::compile("$urlEncodeComponent(u)").unwrap();
    group.bench_function("url_encode_component", |b| {
        b.iter(|| expr.evaluate(black_box(&data)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_compile, bench_path, bench_functions);
criterion_main!(benches);
