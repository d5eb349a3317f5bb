//! 调用协议性能基准测试
//!
//! 测试调用批次编码、结果文档解析和模块表查找的性能

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use script_bridge::bindings::{CallBatch, CallRecord, ResultDocument};
use script_bridge::modules::{MethodId, MethodSpec, ModuleId, ModuleRegistry};
use serde_json::{json, Value};

fn sample_batch(count: usize) -> CallBatch {
    (0..count)
        .map(|i| {
            CallRecord::new(
                ModuleId((i % 8) as u32),
                MethodId((i % 3) as u32),
                vec![json!(i), json!(1000), json!(true)],
            )
        })
        .collect()
}

fn bench_encode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");

    for count in [10, 100, 1000].iter() {
        let batch = sample_batch(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &batch, |b, batch| {
            b.iter(|| black_box(batch.to_wire().to_string()));
        });
    }

    group.finish();
}

fn bench_decode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_batch");

    for count in [10, 100, 1000].iter() {
        let wire = sample_batch(*count).to_wire();
        group.bench_with_input(BenchmarkId::from_parameter(count), &wire, |b, wire| {
            b.iter(|| CallBatch::from_wire(black_box(wire)).unwrap());
        });
    }

    group.finish();
}

fn bench_parse_result_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_result_document");

    for count in [10, 100, 1000].iter() {
        let text = sample_batch(*count).to_wire().to_string();
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| ResultDocument::from_json(black_box(text)).unwrap());
        });
    }

    // 一半条目无效
    let mut wire = sample_batch(1000).to_wire();
    if let Some(Value::Array(module_ids)) = wire.get_mut(0) {
        for id in module_ids.iter_mut().step_by(2) {
            *id = json!("bad");
        }
    }
    group.bench_function("half_invalid_1000", |b| {
        b.iter(|| ResultDocument::from_value(black_box(&wire)).unwrap());
    });

    group.finish();
}

fn bench_registry_lookup(c: &mut Criterion) {
    let mut registry = ModuleRegistry::new();
    for i in 0..64 {
        registry
            .register_declared(
                format!("Module{i}"),
                (0..16).map(|m| MethodSpec::sync(format!("method{m}"))).collect(),
            )
            .unwrap();
    }

    c.bench_function("registry_lookup", |b| {
        b.iter(|| registry.lookup(black_box("Module42"), black_box("method15")).unwrap());
    });

    c.bench_function("remote_module_config", |b| {
        b.iter(|| black_box(registry.remote_module_config()));
    });
}

criterion_group!(
    benches,
    bench_encode_batch,
    bench_decode_batch,
    bench_parse_result_document,
    bench_registry_lookup
);
criterion_main!(benches);
