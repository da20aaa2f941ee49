//! Benchmarks for encoding and appending whitelist categories.
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - Line normalization throughput
//! - Category encoding for address and domain records
//! - Append merging against originals of different sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geodat::normalize::{normalize_domains, normalize_ips};
use geodat::proto::{merge, AppendMerger, CategoryEntry, DatabaseKind, TopLevelFraming};
use geodat::{AddressRange, DomainPattern};
use std::net::Ipv4Addr;

/// Generate IP/CIDR lines, every tenth one malformed.
fn generate_ip_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let [_, a, b, c] = (i as u32).to_be_bytes();
            if i % 10 == 9 {
                format!("{}.{}.{}.300", a, b, c)
            } else {
                format!("{}.{}.{}.0/24", a.wrapping_add(1), b, c)
            }
        })
        .collect()
}

/// Generate v2fly-style domain lines.
fn generate_domain_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("domain:host{}.example{}.ru", i, i % 100))
        .collect()
}

fn generate_ranges(count: usize) -> Vec<AddressRange> {
    (0..count)
        .map(|i| {
            let [_, a, b, _] = (i as u32).to_be_bytes();
            AddressRange::new(Ipv4Addr::new(10, a, b, 0), 24).unwrap()
        })
        .collect()
}

fn generate_domains(count: usize) -> Vec<DomainPattern> {
    (0..count)
        .map(|i| DomainPattern::root_domain(format!("host{}.example.ru", i)))
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let ip_lines = generate_ip_lines(10_000);
    let domain_lines = generate_domain_lines(10_000);

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("ips", |b| {
        b.iter(|| black_box(normalize_ips(black_box(&ip_lines))))
    });

    group.bench_function("domains", |b| {
        b.iter(|| black_box(normalize_domains(black_box(&domain_lines))))
    });

    group.finish();
}

fn bench_encode_category(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_category");

    for size in [100, 1_000, 10_000].iter() {
        let ips = CategoryEntry::with_records("WHITELIST", generate_ranges(*size));
        let domains = CategoryEntry::with_records("WHITELIST-RU", generate_domains(*size));

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("cidr", size), &ips, |b, entry| {
            b.iter(|| black_box(entry.encode().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("domain", size), &domains, |b, entry| {
            b.iter(|| black_box(entry.encode().unwrap()))
        });
    }

    group.finish();
}

fn bench_append_merge(c: &mut Criterion) {
    let entries = [
        CategoryEntry::with_records("WHITELIST-RU", generate_domains(5_000)),
        CategoryEntry::with_records("WHITELIST-ADS", generate_domains(500)),
    ];

    let mut group = c.benchmark_group("append_merge");

    // Original size dominates the copy cost
    for mb in [1usize, 8, 32].iter() {
        let original = vec![0u8; mb * 1024 * 1024];
        group.throughput(Throughput::Bytes(original.len() as u64));

        group.bench_with_input(BenchmarkId::new("bare", mb), &original, |b, original| {
            b.iter(|| black_box(merge(DatabaseKind::GeoSite, original, &entries).unwrap()))
        });

        let wrapped = AppendMerger::new(DatabaseKind::GeoSite).with_framing(TopLevelFraming::Wrapped);
        group.bench_with_input(BenchmarkId::new("wrapped", mb), &original, |b, original| {
            b.iter(|| black_box(wrapped.merge(original, &entries).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_encode_category, bench_append_merge);
criterion_main!(benches);
