//! # Complex Routing Benchmarks
//!
//! Hot paths of every job the landlord admits:
//!
//! | Path | Runs |
//! |------|------|
//! | `routing_key` | once per admitted request |
//! | `WorkRequest::from_slice` | once per delivery on a renter |
//! | `queue_offset` + `partition_range` | once per renter start |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cx_01_sharding::{partition_range, queue_name, queue_offset, routing_key, SpanParams};
use serde_json::{json, Value};
use shared_types::WorkRequest;
use std::time::Duration;

fn farmer_params() -> Vec<Value> {
    vec![
        json!({"address": "10.1.0.1", "port": 4000, "nodeID": "5a".repeat(20)}),
        json!({"data_hash": "ab".repeat(20)}),
    ]
}

fn bench_routing_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing-key");
    let mut rng = rand::thread_rng();
    let farmer = farmer_params();
    let offer = vec![json!({"data_hash": "cd".repeat(20)}), json!([])];

    group.bench_function("target_node", |b| {
        b.iter(|| black_box(routing_key("getRetrievalPointer", &farmer, &mut rng)))
    });
    group.bench_function("data_hash", |b| {
        b.iter(|| black_box(routing_key("getStorageOffer", &offer, &mut rng)))
    });
    group.bench_function("random", |b| {
        b.iter(|| black_box(routing_key("ping", &farmer, &mut rng)))
    });
    group.bench_function("queue_name", |b| {
        b.iter(|| black_box(queue_name(black_box(0xa7))))
    });

    group.finish();
}

fn bench_partition_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition-range");

    for pool_size in [1u32, 32, 64, 256] {
        let params = SpanParams {
            pool_size,
            ..SpanParams::default()
        };
        group.bench_with_input(
            BenchmarkId::new("offset_and_range", pool_size),
            &params,
            |b, params| {
                b.iter(|| {
                    let offset = queue_offset(params).unwrap_or(0);
                    black_box(partition_range(black_box(0x42), offset))
                })
            },
        );
    }

    group.finish();
}

fn bench_work_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("work-decode");
    group.measurement_time(Duration::from_secs(5));

    for batch in [1usize, 100, 1000] {
        let messages: Vec<Vec<u8>> = (0..batch)
            .map(|i| {
                WorkRequest::new(format!("job-{i}"), "getConsignmentPointer", farmer_params())
                    .to_bytes()
            })
            .collect();

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("from_slice", batch), &messages, |b, msgs| {
            b.iter(|| {
                let decoded = msgs
                    .iter()
                    .filter(|m| WorkRequest::from_slice(m).is_ok())
                    .count();
                black_box(decoded)
            })
        });
    }

    group.finish();
}

criterion_group!(
    name = routing_benches;
    config = Criterion::default().sample_size(50);
    targets = bench_routing_key, bench_partition_range, bench_work_decode,
);

criterion_main!(routing_benches);
