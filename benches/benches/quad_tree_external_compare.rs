// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rstar::RTree;

#[derive(Clone, Debug)]
struct Marker {
    id: u32,
    at: Point,
}

impl HasPosition for Marker {
    fn position(&self) -> Point {
        self.at
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Marker {}

impl core::hash::Hash for Marker {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn gen_grid(n: usize, cell: f32) -> Vec<Marker> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Marker {
                id: (y * n + x) as u32,
                at: Point::new(x as f32 * cell, y as f32 * cell),
            });
        }
    }
    out
}

fn bench_external_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("external_compare");
    for &n in &[64usize, 128] {
        let markers = gen_grid(n, 10.0);
        let query = Rect::new(100.0, 100.0, 400.0, 400.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("canopy_bulk_query_n{}", n), |b| {
            b.iter_batched(
                || markers.clone(),
                |batch| {
                    let mut tree =
                        PointQuadTree::<Marker>::new(Rect::new(0.0, 0.0, 2048.0, 2048.0));
                    tree.bulk_load(batch, 0).unwrap();
                    let hits = tree.query_count(&query);
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_bulk_query_n{}", n), |b| {
            b.iter_batched(
                || {
                    markers
                        .iter()
                        .map(|m| [m.at.x, m.at.y])
                        .collect::<Vec<[f32; 2]>>()
                },
                |points| {
                    let tree = RTree::bulk_load(points);
                    let envelope = rstar::AABB::from_corners(
                        [query.x, query.y],
                        [query.right(), query.bottom()],
                    );
                    let hits: usize = tree.locate_in_envelope(&envelope).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_external_compare);
criterion_main!(benches);
