// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_quad_tree --heading-base-level=0

//! Canopy Quad Tree: a dynamic region quadtree for 2D range queries.
//!
//! Canopy Quad Tree indexes items with a point or axis-aligned-box
//! footprint and answers rectangular and point range queries.
//!
//! - Incremental [`insert`](QuadTree::insert), [`remove`](QuadTree::remove),
//!   and [`update`](QuadTree::update) (re-index after an item's coordinates
//!   change), with automatic subdivision and condensation so the tree stays
//!   tight under churn.
//! - [`bulk_load`](QuadTree::bulk_load): a one-pass Z-order builder for
//!   large batches, with optional worker-thread fan-out.
//! - Query results as a count, a `Vec` append, a visitor callback, a lazy
//!   iterator, or a fill of a pre-sized buffer — all with identical
//!   membership.
//!
//! Item geometry is pluggable through the [`Shape`] policy: implement
//! [`HasPosition`] for point-footprint items or [`HasBounds`] for
//! box-footprint items and pick the matching [`PointQuadTree`] or
//! [`RectQuadTree`] alias. Items also need stable equality and hashing
//! (identity must survive coordinate changes) because the tree keeps an
//! item→entry map for O(1) membership, removal, and updates.
//!
//! Every cell holds at most [`NODE_CAPACITY`] items before subdividing at
//! its center; an item that straddles a split point stays in the parent
//! cell. The root rectangle is fixed at construction, and items that fall
//! outside it are still accepted, at the root level. Cells too small to
//! split keep growing their bucket instead, so degenerate geometry never
//! creates degenerate cells.
//!
//! # Example
//!
//! ```rust
//! use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};
//!
//! #[derive(Clone, Debug, PartialEq, Eq, Hash)]
//! struct Beacon {
//!     id: u32,
//!     // Packed coordinates so the item can live in a hash map; identity
//!     // is the id alone in a real application.
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl HasPosition for Beacon {
//!     fn position(&self) -> Point {
//!         Point::new(self.x as f32, self.y as f32)
//!     }
//! }
//!
//! let mut tree = PointQuadTree::new(Rect::new(0.0, 0.0, 1000.0, 1000.0));
//! tree.insert(Beacon { id: 1, x: 100, y: 100 }).unwrap();
//! tree.insert(Beacon { id: 2, x: 400, y: 250 }).unwrap();
//! tree.insert(Beacon { id: 3, x: 900, y: 900 }).unwrap();
//!
//! let near_origin = tree.query_count(&Rect::new(0.0, 0.0, 500.0, 500.0));
//! assert_eq!(near_origin, 2);
//!
//! let ids: Vec<u32> = tree
//!     .query(Rect::new(0.0, 0.0, 500.0, 500.0))
//!     .map(|b| b.id)
//!     .collect();
//! assert_eq!(ids.len(), 2);
//!
//! assert!(tree.remove(&Beacon { id: 3, x: 900, y: 900 }));
//! assert_eq!(tree.len(), 2);
//! ```
//!
//! ## Bulk loading
//!
//! ```rust
//! use canopy_quad_tree::{HasPosition, Point, PointQuadTree, Rect};
//!
//! #[derive(Clone, PartialEq, Eq, Hash)]
//! struct Cell(u16, u16);
//!
//! impl HasPosition for Cell {
//!     fn position(&self) -> Point {
//!         Point::new(self.0 as f32 * 3.0, self.1 as f32 * 7.0)
//!     }
//! }
//!
//! let mut tree: PointQuadTree<Cell> = PointQuadTree::new(Rect::LARGEST);
//! let batch: Vec<Cell> = (0..1000u16).map(|i| Cell(i % 40, i / 40)).collect();
//! // One level of fan-out: the four top quarters build on workers.
//! tree.bulk_load(batch, 1).unwrap();
//! assert_eq!(tree.len(), 1000);
//! ```
//!
//! Mutating operations assume exclusive access (`&mut self`); queries are
//! plain `&self` reads and may run concurrently against a tree that is
//! not being mutated. Bulk loading may use worker threads internally but
//! joins them before returning.

pub mod shape;
pub mod types;

mod bulk;
mod node;
mod query;
mod tree;

pub use node::NODE_CAPACITY;
pub use query::{Items, QueryIter};
pub use shape::{HasBounds, HasPosition, PointShape, Region, RectShape, Shape};
pub use tree::{PointQuadTree, QuadTree, RectQuadTree, TreeStats};
pub use types::{Point, Rect};

/// Errors reported by fallible [`QuadTree`] operations.
///
/// Absence is never an error: [`QuadTree::remove`] and
/// [`QuadTree::update`] report it through their `bool` return instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The item is already indexed; the tree is unchanged.
    #[error("item is already indexed")]
    DuplicateItem,
    /// Bulk loading needs a root cell that has not subdivided yet.
    #[error("bulk load target already has children")]
    BulkTargetHasChildren,
}
