// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone, Debug)]
struct Marker {
    id: u32,
    at: Point,
}

impl Marker {
    fn new(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            at: Point::new(x, y),
        }
    }
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

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f32(&mut self) -> f32 {
        let v = self.next_u64() >> 40;
        (v as f32) / ((1u64 << 24) as f32)
    }
}

fn gen_grid_markers(n: usize, cell: f32) -> Vec<Marker> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Marker::new(
                (y * n + x) as u32,
                x as f32 * cell,
                y as f32 * cell,
            ));
        }
    }
    out
}

fn gen_random_markers(count: usize, max_w: f32, max_h: f32) -> Vec<Marker> {
    let mut out = Vec::with_capacity(count);
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    for i in 0..count {
        out.push(Marker::new(
            i as u32,
            rng.next_f32() * max_w,
            rng.next_f32() * max_h,
        ));
    }
    out
}

fn world() -> Rect {
    Rect::new(0.0, 0.0, 2048.0, 2048.0)
}

fn bench_insert_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &n in &[32usize, 64, 128] {
        let markers = gen_grid_markers(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_query_n{}", n), |b| {
            b.iter_batched(
                || PointQuadTree::<Marker>::new(world()),
                |mut tree| {
                    for m in markers.iter().cloned() {
                        tree.insert(m).unwrap();
                    }
                    let hits = tree.query_count(&Rect::new(100.0, 100.0, 400.0, 400.0));
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");
    for &count in &[4096usize, 16384] {
        let markers = gen_random_markers(count, 2000.0, 2000.0);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("sequential_{}", count), |b| {
            b.iter_batched(
                || (PointQuadTree::<Marker>::new(world()), markers.clone()),
                |(mut tree, batch)| {
                    tree.bulk_load(batch, 0).unwrap();
                    black_box(tree.len());
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("threaded_{}", count), |b| {
            b.iter_batched(
                || (PointQuadTree::<Marker>::new(world()), markers.clone()),
                |(mut tree, batch)| {
                    tree.bulk_load(batch, 2).unwrap();
                    black_box(tree.len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_update_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_heavy");
    let markers = gen_random_markers(4096, 2000.0, 2000.0);
    group.bench_function("move_every_item", |b| {
        b.iter_batched(
            || {
                let mut tree = PointQuadTree::<Marker>::new(world());
                tree.bulk_load(markers.clone(), 0).unwrap();
                tree
            },
            |mut tree| {
                for m in &markers {
                    let moved = Marker::new(m.id, m.at.x + 3.0, m.at.y + 3.0);
                    tree.update(&moved);
                }
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_query_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_heavy");
    let markers = gen_grid_markers(128, 8.0);
    group.bench_function("build_then_many_queries", |b| {
        b.iter_batched(
            || {
                let mut tree = PointQuadTree::<Marker>::new(world());
                tree.bulk_load(markers.clone(), 0).unwrap();
                tree
            },
            |tree| {
                let mut total = 0usize;
                for q in 0..256 {
                    let x = (q % 64) as f32 * 8.0;
                    let y = (q / 64) as f32 * 8.0;
                    total += tree.query_count(&Rect::new(x, y, 64.0, 64.0));
                }
                black_box(total);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_remove_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_where");
    let markers = gen_random_markers(8192, 2000.0, 2000.0);
    group.bench_function("drop_half", |b| {
        b.iter_batched(
            || {
                let mut tree = PointQuadTree::<Marker>::new(world());
                tree.bulk_load(markers.clone(), 0).unwrap();
                tree
            },
            |mut tree| {
                tree.remove_where(|m| m.id % 2 == 0);
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_query,
    bench_bulk_load,
    bench_update_heavy,
    bench_query_heavy,
    bench_remove_where,
);
criterion_main!(benches);
