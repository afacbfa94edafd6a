// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quad tree basics.
//!
//! Insert a few tagged points, run the query variants, move an item, and
//! remove by predicate.
//!
//! Run:
//! - `cargo run -p canopy_examples --example quad_tree_basics`

use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};

#[derive(Clone, Debug)]
struct Ship {
    id: u32,
    at: Point,
}

impl HasPosition for Ship {
    fn position(&self) -> Point {
        self.at
    }
}

// Identity is the id; position is payload that may change.
impl PartialEq for Ship {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Ship {}

impl core::hash::Hash for Ship {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn ship(id: u32, x: f32, y: f32) -> Ship {
    Ship {
        id,
        at: Point::new(x, y),
    }
}

fn main() {
    let mut tree = PointQuadTree::new(Rect::new(0.0, 0.0, 1000.0, 1000.0));
    for (id, x, y) in [
        (1, 120.0, 80.0),
        (2, 140.0, 95.0),
        (3, 900.0, 850.0),
        (4, 132.0, 88.0),
        (5, 500.0, 500.0),
    ] {
        tree.insert(ship(id, x, y)).unwrap();
    }

    let harbor = Rect::new(100.0, 50.0, 60.0, 60.0);
    println!("ships in harbor: {}", tree.query_count(&harbor));

    let mut ids: Vec<u32> = tree.query(harbor).map(|s| s.id).collect();
    ids.sort_unstable();
    println!("their ids: {:?}", ids);

    // Zero-allocation accumulation through a capturing closure.
    let mut westmost = f32::MAX;
    tree.query_each(&harbor, |s| westmost = westmost.min(s.at.x));
    println!("westmost x in harbor: {}", westmost);

    // Ship 3 sails into the harbor; refresh its cell.
    tree.update(&ship(3, 110.0, 70.0));
    println!("after the move: {}", tree.query_count(&harbor));

    tree.remove_where(|s| s.id % 2 == 0);
    println!("after retiring even ids: {} ships, {:?}", tree.len(), tree.stats());
}
