// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build, insert, neighbor search, and removal throughput for `understory_kd_tree`.
//!
//! Run:
//! - `cargo bench -p understory_benches`

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use understory_kd_tree::{KdTree, Point3};

fn scattered_points(n: usize, seed: u64) -> Vec<Point3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-1000.0..1000.0),
                rng.gen_range(-1000.0..1000.0),
                rng.gen_range(-1000.0..1000.0),
            )
        })
        .collect()
}

fn build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for n in [1_000, 10_000, 100_000] {
        let points = scattered_points(n, 1);
        group.bench_with_input(BenchmarkId::new("bulk", n), &points, |b, points| {
            b.iter(|| KdTree::from_points(black_box(points.iter().copied())));
        });
        group.bench_with_input(BenchmarkId::new("incremental", n), &points, |b, points| {
            b.iter(|| {
                let mut tree = KdTree::new();
                for &p in points {
                    tree.add(black_box(p));
                }
                tree
            });
        });
    }
    group.finish();
}

fn nearest_neighbors(c: &mut Criterion) {
    let tree = KdTree::from_points(scattered_points(100_000, 2));
    let queries = scattered_points(256, 3);

    let mut group = c.benchmark_group("nearest_neighbors");
    for k in [1, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| {
                for &q in &queries {
                    black_box(tree.nearest_neighbors(k, q).ok());
                }
            });
        });
    }
    group.finish();
}

fn remove(c: &mut Criterion) {
    let points = scattered_points(10_000, 4);
    let tree = KdTree::from_points(points.iter().copied());
    let victims: Vec<Point3> = points.iter().step_by(10).copied().collect();

    c.bench_function("remove every tenth of 10k", |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                for &p in &victims {
                    tree.remove(black_box(p));
                }
                tree
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, build, nearest_neighbors, remove);
criterion_main!(benches);
