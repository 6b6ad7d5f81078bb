#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use weft::traversal::{Scope, Traversal, TraversalBuilder, Value};

const INPUT_COUNT: usize = 4_096;
const NESTING: usize = 8;

fn inputs() -> Vec<Value> {
    (0..INPUT_COUNT)
        .map(|n| Value::map([("n", Value::Int(n as i64)), ("pad", Value::from("x"))]))
        .collect()
}

fn local_select() -> Traversal {
    TraversalBuilder::start()
        .select_one(Scope::Local, "n")
        .build()
        .expect("local traversal")
}

fn global_select() -> Traversal {
    TraversalBuilder::start()
        .identity()
        .as_("x")
        .select_one(Scope::Global, "x")
        .build()
        .expect("global traversal")
}

fn wrap(value: &Value) -> weft::Result<Value> {
    Ok(Value::map([("n", value.clone())]))
}

fn nested_select(depth: usize) -> Traversal {
    let mut child = TraversalBuilder::anonymous().identity();
    for _ in 0..depth {
        child = TraversalBuilder::anonymous()
            .map("wrap", wrap)
            .select_one(Scope::Local, "n")
            .by(child);
    }
    TraversalBuilder::start()
        .map("wrap", wrap)
        .select_one(Scope::Local, "n")
        .by(child)
        .build()
        .expect("nested traversal")
}

fn select_one(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_one");
    group.sample_size(40);
    group.throughput(Throughput::Elements(INPUT_COUNT as u64));
    let values = inputs();

    let mut local = local_select();
    group.bench_function("local", |b| {
        b.iter(|| {
            let out = local
                .execute_with(values.iter().cloned())
                .expect("execute")
                .collect_values()
                .expect("values");
            black_box(out)
        });
    });

    let mut global = global_select();
    group.bench_function("global_path", |b| {
        b.iter(|| {
            let out = global
                .execute_with(values.iter().cloned())
                .expect("execute")
                .collect_values()
                .expect("values");
            black_box(out)
        });
    });

    let mut nested = nested_select(NESTING);
    let ints: Vec<Value> = (0..INPUT_COUNT as i64).map(Value::Int).collect();
    group.bench_function("nested_children", |b| {
        b.iter(|| {
            let out = nested
                .execute_with(ints.iter().cloned())
                .expect("execute")
                .collect_values()
                .expect("values");
            black_box(out)
        });
    });

    group.finish();
}

fn clone_traversal(c: &mut Criterion) {
    let traversal = nested_select(NESTING);
    c.bench_function("traversal/clone_nested", |b| {
        b.iter(|| black_box(traversal.clone()));
    });
}

criterion_group!(benches, select_one, clone_traversal);
criterion_main!(benches);
