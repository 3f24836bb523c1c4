use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use wire_formatter::{Formattable, Resolver, WireSerializer};

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Order {
    id: u64,
    customer: String,
    lines: Vec<Line>,
    attributes: BTreeMap<String, String>,
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Line {
    sku: String,
    quantity: u32,
    unit_price: f64,
}

fn order(lines: usize) -> Order {
    Order {
        id: 42,
        customer: String::from("customer-0042"),
        lines: (0..lines)
            .map(|i| Line {
                sku: format!("sku-{i:05}"),
                quantity: i as u32,
                unit_price: i as f64 * 1.25,
            })
            .collect(),
        attributes: BTreeMap::from([
            (String::from("region"), String::from("eu-west")),
            (String::from("channel"), String::from("web")),
        ]),
        note: Some(String::from("leave at the door")),
    }
}

#[allow(clippy::unwrap_used)]
fn bench_struct_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("struct_round_trip");
    let serializer = WireSerializer::new();

    for &lines in &[1usize, 16, 256, 4096] {
        let value = order(lines);
        let bytes = serializer.serialize_to_vec(&value).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_function(format!("serialize_{lines}_lines"), |b| {
            b.iter(|| serializer.serialize_to_vec(black_box(&value)).unwrap())
        });
        group.bench_function(format!("deserialize_{lines}_lines"), |b| {
            b.iter(|| {
                let decoded: Order = serializer.deserialize(black_box(&bytes)).unwrap();
                decoded
            })
        });
        group.bench_function(format!("get_length_{lines}_lines"), |b| {
            b.iter(|| serializer.get_length(black_box(&value)).unwrap())
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalars");
    let serializer = WireSerializer::new();
    let ints: Vec<i64> = (0..1024).map(|i| i * 7919 - 4_000_000).collect();
    let text: Vec<String> = (0..1024).map(|i| format!("value-{i}")).collect();
    let blob = vec![0xA5u8; 64 * 1024];

    group.throughput(Throughput::Elements(ints.len() as u64));
    group.bench_function("i64_list", |b| {
        b.iter(|| serializer.serialize_to_vec(black_box(&ints)).unwrap())
    });
    group.bench_function("string_list", |b| {
        b.iter(|| serializer.serialize_to_vec(black_box(&text)).unwrap())
    });
    group.throughput(Throughput::Bytes(blob.len() as u64));
    group.bench_function("binary_64k", |b| {
        b.iter(|| serializer.serialize_to_vec(black_box(&blob)).unwrap())
    });

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    group.bench_function("cached_lookup", |b| {
        let resolver = Resolver::new();
        resolver.get_formatter::<Order>().unwrap();
        b.iter(|| resolver.get_formatter::<Order>().unwrap())
    });
    group.bench_function("first_compile", |b| {
        b.iter_batched(
            Resolver::new,
            |resolver| resolver.get_formatter::<Order>().unwrap(),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_struct_round_trip, bench_scalars, bench_resolution);
criterion_main!(benches);
