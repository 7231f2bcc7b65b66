use criterion::{black_box, criterion_group, criterion_main, Criterion};
use petmatch_vecstore::{Hnsw, HnswConfig, VecIndex};

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in &mut v {
            *x *= s;
        }
    }
    v
}

fn bench_search(c: &mut Criterion) {
    let dim = 512;
    let n = 5000;

    let mut h = Hnsw::new(HnswConfig::new(dim));
    for i in 0..n {
        h.insert(i as i64, &random_unit_vec(dim, i as u64 + 1)).unwrap();
    }

    let query = random_unit_vec(dim, 999_999);

    c.bench_function("hnsw_search_512d_5k_top20", |b| {
        b.iter(|| {
            let _ = black_box(h.search(black_box(&query), 20).unwrap());
        });
    });
}

fn bench_insert(c: &mut Criterion) {
    let dim = 512;

    c.bench_function("hnsw_insert_512d_into_1k", |b| {
        b.iter_with_setup(
            || {
                let mut h = Hnsw::new(HnswConfig::new(dim));
                for i in 0..1000 {
                    h.insert(i as i64, &random_unit_vec(dim, i as u64 + 1)).unwrap();
                }
                h
            },
            |mut h| {
                h.insert(1_000_001, black_box(&random_unit_vec(dim, 77))).unwrap();
            },
        );
    });
}

criterion_group!(benches, bench_search, bench_insert);
criterion_main!(benches);
