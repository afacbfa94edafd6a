// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bulk loading.
//!
//! Build a tree from a large random batch in one pass, with the top two
//! build levels fanned out onto worker threads, then compare a window
//! query against a linear scan.
//!
//! Run:
//! - `cargo run -p canopy_examples --example bulk_points`

use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

#[derive(Clone, Debug)]
struct Star {
    id: u32,
    at: Point,
}

impl HasPosition for Star {
    fn position(&self) -> Point {
        self.at
    }
}

impl PartialEq for Star {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Star {}

impl core::hash::Hash for Star {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn main() {
    let mut rng = StdRng::seed_from_u64(7);
    let batch: Vec<Star> = (0..100_000u32)
        .map(|id| Star {
            id,
            at: Point::new(rng.random_range(0.0..4096.0), rng.random_range(0.0..4096.0)),
        })
        .collect();

    let mut tree = PointQuadTree::new(Rect::new(0.0, 0.0, 4096.0, 4096.0));
    let start = Instant::now();
    tree.bulk_load(batch.clone(), 2).unwrap();
    println!(
        "loaded {} stars in {:?}; {:?}",
        tree.len(),
        start.elapsed(),
        tree.stats()
    );

    let window = Rect::new(1000.0, 1000.0, 256.0, 256.0);
    let start = Instant::now();
    let indexed = tree.query_count(&window);
    let indexed_time = start.elapsed();

    let start = Instant::now();
    let scanned = batch
        .iter()
        .filter(|s| window.contains_point(s.at))
        .count();
    let scanned_time = start.elapsed();

    assert_eq!(indexed, scanned);
    println!(
        "window holds {} stars: tree {:?}, linear scan {:?}",
        indexed, indexed_time, scanned_time
    );
}
