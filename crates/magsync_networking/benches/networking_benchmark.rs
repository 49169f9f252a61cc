//! Benchmark for the store and codec hot paths.
//!
//! Run with: cargo bench --package magsync_networking --bench networking_benchmark

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use magsync_networking::{CounterPacket, EventPacket, OutstandingStore, WirePacket};

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(1));

    let event = EventPacket::fire("weapon_type", 7, 29);
    let encoded = event.encode();
    group.bench_function("event_encode", |b| b.iter(|| black_box(&event).encode()));
    group.bench_function("event_decode", |b| {
        b.iter(|| EventPacket::decode(black_box(&encoded)))
    });

    let counter = CounterPacket::new(29).encode();
    group.bench_function("wire_decode_counter", |b| {
        b.iter(|| WirePacket::decode(black_box(&counter)))
    });
    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let packet = WirePacket::Counter(CounterPacket::new(0));

    group.throughput(Throughput::Elements(256));
    group.bench_function("insert_and_ack_256", |b| {
        let mut store = OutstandingStore::new(256);
        b.iter(|| {
            for sequence in 0..256u16 {
                store.insert(sequence, packet, 0.0);
            }
            for sequence in 0..256u16 {
                black_box(store.mark_acked(sequence));
            }
        });
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("collect_timed_out_full", |b| {
        let mut store = OutstandingStore::new(256);
        for sequence in 0..256u16 {
            store.insert(sequence, packet, 0.0);
        }
        let mut now = 0.0;
        b.iter(|| {
            now += 1.0;
            black_box(store.collect_timed_out(now, 0.5))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_codec, bench_store);
criterion_main!(benches);
