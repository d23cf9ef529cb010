//! Benchmarks for shieldrule lookup and parse performance.
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - Decision throughput with and without the decision cache
//! - Wildcard resolution on deep subdomain chains
//! - Scalability with different rule set sizes
//! - Parse and publish cost of large lists

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shieldrule::{
    FormatHint, HandleConfig, ParserOptions, ParserRegistry, RuleEntry, RuleSet, RuleSetHandle,
    RuleSetMetadata,
};

/// Generate a rule set with exact and wildcard rules, a third of them allow.
fn generate_rules(exact_count: usize, wildcard_count: usize) -> RuleSet {
    let mut entries = Vec::with_capacity(exact_count + wildcard_count);

    for i in 0..exact_count {
        let domain = format!("domain{}.example.com", i);
        entries.push(match i % 3 {
            0 => RuleEntry::allow(domain),
            _ => RuleEntry::block(domain),
        });
    }

    for i in 0..wildcard_count {
        let domain = format!("*.suffix{}.com", i);
        entries.push(match i % 3 {
            0 => RuleEntry::allow(domain).with_priority(100),
            _ => RuleEntry::block(domain),
        });
    }

    RuleSet::new(entries, RuleSetMetadata::named("bench", "1"))
}

/// Generate test queries - mix of hits and misses.
fn generate_queries(count: usize, hit_ratio: f64) -> Vec<String> {
    let mut queries = Vec::with_capacity(count);
    let hits = (count as f64 * hit_ratio) as usize;

    for i in 0..hits {
        if i % 2 == 0 {
            queries.push(format!("domain{}.example.com", i % 1000));
        } else {
            queries.push(format!("sub.suffix{}.com", i % 1000));
        }
    }

    for i in hits..count {
        queries.push(format!("unknown{}.nonexistent.org", i));
    }

    queries
}

/// Generate a plain list document.
fn generate_plain_list(count: usize) -> Vec<u8> {
    let mut text = String::with_capacity(count * 24);
    for i in 0..count {
        text.push_str(&format!("ads{}.tracker.net\n", i));
    }
    text.into_bytes()
}

fn bench_decide_no_cache(c: &mut Criterion) {
    let handle = RuleSetHandle::with_config(generate_rules(10_000, 5_000), HandleConfig::no_cache());
    let queries = generate_queries(1000, 0.8);

    let mut group = c.benchmark_group("decide_no_cache");
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("mixed_queries", |b| {
        b.iter(|| {
            for query in &queries {
                black_box(handle.decide(query));
            }
        })
    });

    group.finish();
}

fn bench_decide_with_cache(c: &mut Criterion) {
    let handle = RuleSetHandle::with_config(
        generate_rules(10_000, 5_000),
        HandleConfig::with_capacity(10_000),
    );
    let queries = generate_queries(1000, 0.8);

    // Warm up cache
    for query in &queries {
        let _ = handle.decide(query);
    }

    let mut group = c.benchmark_group("decide_with_cache");
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("cache_hit", |b| {
        b.iter(|| {
            for query in &queries {
                black_box(handle.decide(query));
            }
        })
    });

    group.finish();
}

fn bench_wildcard_resolution(c: &mut Criterion) {
    let rules = RuleSet::new(
        vec![
            RuleEntry::block("*.com"),
            RuleEntry::allow("*.google.com"),
            RuleEntry::block("*.ads.google.com"),
            RuleEntry::block("*.facebook.com"),
        ],
        RuleSetMetadata::default(),
    );
    rules.build_index();

    let mut group = c.benchmark_group("wildcard_resolution");

    group.bench_function("deep_subdomain", |b| {
        b.iter(|| black_box(rules.decide("a.b.c.d.e.f.ads.google.com")))
    });

    group.bench_function("single_level", |b| {
        b.iter(|| black_box(rules.decide("www.google.com")))
    });

    // No match (checks every parent suffix)
    group.bench_function("no_match", |b| {
        b.iter(|| black_box(rules.decide("a.b.c.example.org")))
    });

    group.finish();
}

fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");

    for size in [100, 1_000, 10_000, 100_000].iter() {
        let rules = generate_rules(*size, size / 2);
        rules.build_index();

        group.throughput(Throughput::Elements(100));
        group.bench_with_input(BenchmarkId::new("rules", size), size, |b, _| {
            let queries: Vec<_> = (0..100)
                .map(|i| format!("domain{}.example.com", i % size))
                .collect();
            b.iter(|| {
                for query in &queries {
                    black_box(rules.decide(query));
                }
            })
        });
    }

    group.finish();
}

fn bench_parse_and_publish(c: &mut Criterion) {
    let registry = ParserRegistry::with_builtin();
    let options = ParserOptions::performance();
    let handle = RuleSetHandle::default();

    let mut group = c.benchmark_group("parse_and_publish");
    group.sample_size(20);

    for size in [1_000, 10_000].iter() {
        let data = generate_plain_list(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("plain_list", size), size, |b, _| {
            b.iter(|| {
                let outcome = registry
                    .parse(&data, FormatHint::Format("plain"), &options)
                    .unwrap();
                black_box(handle.publish(outcome.into_rule_set()))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decide_no_cache,
    bench_decide_with_cache,
    bench_wildcard_resolution,
    bench_scalability,
    bench_parse_and_publish,
);

criterion_main!(benches);
