//! Benchmarks for the hot paths a design-time host hits on every request:
//! cache lookups and service resolution.

use buildhost::{BuildCache, Fingerprint, ServiceContainer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

struct CompilerService {
    #[allow(dead_code)]
    version: u32,
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = BuildCache::new();
    let key = Fingerprint::of_content("fn main() {}", "--release");
    cache.get(key.clone(), |_| Ok(vec![0u8; 1024])).unwrap();

    c.bench_function("cache_hit", |b| {
        b.iter(|| {
            let value = cache
                .get(black_box(key.clone()), |_| Ok(vec![0u8; 1024]))
                .unwrap();
            black_box(value);
        })
    });
}

fn bench_cache_miss(c: &mut Criterion) {
    c.bench_function("cache_miss", |b| {
        let cache = BuildCache::new();
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let key = Fingerprint::of_content(&n.to_string(), "");
            black_box(cache.get(key, |_| Ok(n)).unwrap());
        })
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let source = "fn main() {}\n".repeat(200);
    c.bench_function("fingerprint_of_content", |b| {
        b.iter(|| black_box(Fingerprint::of_content(black_box(&source), "--release")))
    });
}

fn bench_container_resolution(c: &mut Criterion) {
    let parent = ServiceContainer::new();
    parent.register(Arc::new(CompilerService { version: 1 }), true);
    let child = ServiceContainer::with_fallback(parent);

    c.bench_function("resolve_local", |b| {
        child.register(Arc::new(CompilerService { version: 2 }), true);
        b.iter(|| black_box(child.resolve::<CompilerService>().unwrap()))
    });

    c.bench_function("resolve_via_fallback", |b| {
        let leaf = ServiceContainer::with_fallback(child.clone());
        b.iter(|| black_box(leaf.resolve::<CompilerService>().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_cache_miss,
    bench_fingerprint,
    bench_container_resolution
);
criterion_main!(benches);
