use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use roost_core::core_filter::ContentFilter;
use roost_core::core_loadable::{Loadable, LoadableStore, StoreOptions};
use roost_core::core_model::{DirectedPost, Uid};
use roost_core::core_views::{conversation_partners, search_posts};
use roost_core::test_utils::{post_between, user_key, SampleItem, ScriptedCollection};
use std::sync::Arc;
use std::time::Duration;

/// `count` posts between "me" and 50 rotating partners
fn inbox(count: usize) -> Vec<DirectedPost> {
    let me = user_key("me", "Me");
    (0..count)
        .map(|i| {
            let other = user_key(&format!("u{}", i % 50), &format!("User {}", i % 50));
            if i % 2 == 0 {
                post_between(&i.to_string(), i as u64, &me, &other, "see you at lunch tomorrow")
            } else {
                post_between(&i.to_string(), i as u64, &other, &me, "running late, start without me")
            }
        })
        .collect()
}

fn bench_filter_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_contains");
    let filter = ContentFilter::default();
    filter.enable_with_bundled();

    for len in [16usize, 256, 2000] {
        let text: String = "the quick brown fox jumps over the lazy dog "
            .chars()
            .cycle()
            .take(len)
            .collect();
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &text, |b, text| {
            b.iter(|| black_box(filter.contains(black_box(text))));
        });
    }
    group.finish();
}

fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived_views");
    let me = Uid::new("me");

    for count in [100usize, 1_000, 10_000] {
        let posts = Loadable::Loaded(inbox(count));
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("partners", count), &posts, |b, posts| {
            b.iter(|| black_box(conversation_partners(posts, &me)));
        });
        group.bench_with_input(BenchmarkId::new("search", count), &posts, |b, posts| {
            b.iter(|| black_box(search_posts(posts, "LATE")));
        });
    }
    group.finish();
}

fn bench_store_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_insert");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("insert_into_1000", |b| {
        let remote = Arc::new(ScriptedCollection::<SampleItem>::new());
        let store = LoadableStore::new(remote, StoreOptions::new());
        for i in 0..1000 {
            store.insert(SampleItem::new(i, "seed"));
        }
        let mut next = 1000u32;

        b.iter(|| {
            next = next.wrapping_add(1);
            store.insert(black_box(SampleItem::new(next % 2000, "bench")));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_filter_contains, bench_views, bench_store_insert);
criterion_main!(benches);
