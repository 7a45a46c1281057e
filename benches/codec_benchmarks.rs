use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

use tron_alert_relay::address_codec;
use tron_alert_relay::blockchain::extract_addresses;
use tron_alert_relay::models::Block;
use tron_alert_relay::{AlertHub, ConnectionHandle, ConnectionRegistry, Database, ProgressStore};

fn account_hex(id: u64) -> String {
    format!("41{:040x}", id)
}

fn synthetic_block(height: u64, transactions: u64) -> Block {
    let transactions: Vec<_> = (0..transactions)
        .map(|i| {
            json!({
                "raw_data": {
                    "contract": [{
                        "type": "TransferContract",
                        "parameter": { "value": {
                            "owner_address": account_hex(i),
                            "to_address": account_hex(i + 1_000_000)
                        }}
                    }]
                }
            })
        })
        .collect();

    serde_json::from_value(json!({
        "block_header": { "raw_data": { "number": height } },
        "transactions": transactions
    }))
    .expect("synthetic block")
}

fn bench_codec(c: &mut Criterion) {
    let raw = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    let public = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    let mut group = c.benchmark_group("address_codec");
    group.bench_function("encode", |b| b.iter(|| address_codec::encode(black_box(raw))));
    group.bench_function("decode", |b| b.iter(|| address_codec::decode(black_box(public))));
    group.bench_function("decode_checked", |b| b.iter(|| address_codec::decode_checked(black_box(public))));
    group.finish();
}

fn bench_extract_addresses(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_addresses");

    for size in [10u64, 100, 1000].iter() {
        let block = synthetic_block(1, *size);
        group.bench_with_input(BenchmarkId::new("transactions", size), &block, |b, block| {
            b.iter(|| extract_addresses(1, black_box(block)));
        });
    }

    group.finish();
}

fn bench_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_addresses");

    for subscribers in [10usize, 100, 1000].iter() {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = AlertHub::new(Arc::clone(&registry));
        let mut receivers = Vec::new();
        let mut touched = BTreeSet::new();

        for i in 0..*subscribers {
            let (handle, receiver) = ConnectionHandle::channel();
            let id = registry.insert(handle);
            let address = address_codec::encode(&account_hex(i as u64)).expect("encodable");
            hub.subscribe(&address, &format!("user-{}", i), id).expect("subscribe");
            touched.insert(address);
            receivers.push(receiver);
        }

        group.bench_with_input(BenchmarkId::new("subscribers", subscribers), &touched, |b, touched| {
            b.iter(|| {
                hub.notify_addresses(black_box(touched));
                for receiver in receivers.iter_mut() {
                    while receiver.try_recv().is_ok() {}
                }
            });
        });
    }

    group.finish();
}

fn bench_progress_save(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("bench.db");
    let database = Database::new(db_path.to_str().expect("utf-8 path")).expect("Failed to create database");
    let mut height = 0u64;

    c.bench_function("progress_save", |b| {
        b.iter(|| {
            height += 1;
            database.save(black_box(height)).expect("save");
        });
    });
}

criterion_group!(benches, bench_codec, bench_extract_addresses, bench_notify, bench_progress_save);
criterion_main!(benches);
