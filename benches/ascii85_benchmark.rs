use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use ascii85_rs::ascii85;

fn generate_bytes(len: usize) -> Vec<u8> {
    // 251 is prime, so the pattern never lines up with the 4-byte groups
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn encoded(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 * 5 + 8);
    ascii85::encode_to_writer(data, true, &mut out).unwrap();
    out
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ascii85_encode");
    for size_mb in [1, 10] {
        let data = generate_bytes(size_mb * 1024 * 1024);
        group.bench_with_input(
            BenchmarkId::new("mixed", format!("{}MB", size_mb)),
            &data,
            |b, data| b.iter(|| encoded(black_box(data))),
        );
    }

    // All-zero input exercises the z-shorthand fast path
    let zeros = vec![0u8; 10 * 1024 * 1024];
    group.bench_with_input(BenchmarkId::new("zeros", "10MB"), &zeros, |b, data| {
        b.iter(|| encoded(black_box(data)))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ascii85_decode");
    for size_mb in [1, 10] {
        let text = encoded(&generate_bytes(size_mb * 1024 * 1024));
        group.bench_with_input(
            BenchmarkId::new("mixed", format!("{}MB", size_mb)),
            &text,
            |b, text| {
                b.iter(|| {
                    let mut out = Vec::with_capacity(text.len() / 5 * 4 + 4);
                    ascii85::decode_to_writer(black_box(text), true, &mut out).unwrap();
                    out
                })
            },
        );
    }

    let zeros_text = encoded(&vec![0u8; 10 * 1024 * 1024]);
    group.bench_with_input(
        BenchmarkId::new("zeros", "10MB"),
        &zeros_text,
        |b, text| {
            b.iter(|| {
                let mut out = Vec::with_capacity(10 * 1024 * 1024);
                ascii85::decode_to_writer(black_box(text), true, &mut out).unwrap();
                out
            })
        },
    );
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
