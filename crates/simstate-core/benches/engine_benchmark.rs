//! Engine benchmarks: cache, memory indices, occupancy queries.
//!
//! Run with: cargo bench --bench engine_benchmark

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use simstate_core::cache::TtlLruCache;
use simstate_core::memory::{EpisodicMemory, NewEvent, RetentionPolicy, Salience};
use simstate_core::spatial::{DistanceMetric, OccupancyMap, OccupantKind, Tile};

const WORDS: [&str; 8] = ["lamp", "door", "table", "key", "window", "chair", "book", "cup"];

// ========== Cache ==========

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("TtlLruCache");

    for size in [1_000, 10_000] {
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("put", size), &size, |b, &size| {
            let cache: TtlLruCache<u64, u64> = TtlLruCache::new(size);
            let mut i = 0u64;
            b.iter(|| {
                cache.put(i, i, Some(Duration::from_secs(60)));
                i = (i + 1) % (size as u64 * 2);
            });
        });

        group.bench_with_input(BenchmarkId::new("get_hit", size), &size, |b, &size| {
            let cache: TtlLruCache<u64, u64> = TtlLruCache::new(size);
            for i in 0..size as u64 {
                cache.put(i, i, None);
            }
            let mut i = 0u64;
            b.iter(|| {
                black_box(cache.get(&i));
                i = (i + 1) % size as u64;
            });
        });
    }

    group.finish();
}

// ========== Memory ==========

fn filled_memory(events: usize) -> EpisodicMemory {
    let mut memory = EpisodicMemory::new(events, RetentionPolicy::LowestSalience);
    for i in 0..events {
        let word = WORDS[i % WORDS.len()];
        memory
            .add_event(NewEvent::new(
                i as i64,
                "hall",
                format!("saw a {word} near the hall"),
                (i % 10) as i64 + 1,
            ))
            .unwrap_or_default();
    }
    memory
}

fn bench_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("EpisodicMemory");

    group.bench_function("add_event_at_capacity", |b| {
        let mut memory = filled_memory(1_000);
        let mut t = 1_000i64;
        b.iter(|| {
            t += 1;
            black_box(
                memory
                    .add_event(NewEvent::new(t, "hall", "saw a lamp", (t % 10) + 1))
                    .unwrap_or_default(),
            );
        });
    });

    for events in [1_000, 10_000] {
        let memory = filled_memory(events);
        group.bench_with_input(BenchmarkId::new("get_relevant", events), &memory, |b, memory| {
            b.iter(|| black_box(memory.get_relevant("lamp", 10, Salience::MIN)));
        });
    }

    group.finish();
}

// ========== Occupancy ==========

fn bench_occupancy(c: &mut Criterion) {
    let mut group = c.benchmark_group("OccupancyMap");
    let map = OccupancyMap::new(8);
    for i in 0..2_500 {
        map.place(&format!("agent-{i}"), Tile::new(i % 50 * 4, i / 50 * 4), OccupantKind::Agent);
    }

    for radius in [4u32, 16] {
        group.bench_with_input(BenchmarkId::new("within", radius), &radius, |b, &radius| {
            b.iter(|| {
                black_box(map.within(Tile::new(100, 100), radius, DistanceMetric::Chebyshev, None))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache, bench_memory, bench_occupancy);
criterion_main!(benches);
