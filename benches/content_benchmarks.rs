use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use newsproxy::content::{ContentExtractor, HtmlSanitizer};
use newsproxy::storage::TtlCache;
use std::time::Duration;
use url::Url;

use test_data::*;

fn bench_extract(c: &mut Criterion) {
    let extractor = ContentExtractor::new().unwrap();
    let base = Url::parse("https://magazine.example.com/long-read").unwrap();

    let pages = vec![
        ("short", SHORT_ARTICLE.to_string()),
        ("long_20", long_article(20)),
        ("long_200", long_article(200)),
    ];

    let mut group = c.benchmark_group("extraction");

    for (name, html) in &pages {
        group.bench_with_input(BenchmarkId::new("extract", name), html, |b, html| {
            b.iter(|| black_box(extractor.extract(html, Some(&base))))
        });
    }

    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let sanitizer = HtmlSanitizer::new();
    let mut group = c.benchmark_group("sanitization");

    for blocks in [10, 100, 1000] {
        let fragment = dirty_fragment(blocks);
        group.bench_with_input(BenchmarkId::new("sanitize", blocks), &fragment, |b, html| {
            b.iter(|| black_box(sanitizer.sanitize(html)))
        });
    }

    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let cache: TtlCache<String> = TtlCache::new(1000);
    for i in 0..1000 {
        cache.set(format!("key-{}", i), format!("value-{}", i), Duration::from_secs(60));
    }

    c.bench_function("cache_get_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % 1000;
            black_box(cache.get(&format!("key-{}", i)))
        })
    });

    c.bench_function("cache_set_evict", |b| {
        let mut i = 0;
        b.iter(|| {
            i += 1;
            cache.set(format!("new-{}", i), String::new(), Duration::from_secs(60));
        })
    });
}

criterion_group!(benches, bench_extract, bench_sanitize, bench_cache);
criterion_main!(benches);
