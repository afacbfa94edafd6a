// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape policies binding an item type to the tree, and query regions.
//!
//! The tree never inspects items directly; every geometric decision goes
//! through a [`Shape`] policy (how does an item relate to a cell?) or a
//! [`Region`] (how does a query relate to cells and items?). Two policies
//! are provided: [`PointShape`] for items that occupy a single position
//! and [`RectShape`] for items that occupy an axis-aligned box. Both
//! accept [`Rect`] and [`Point`] queries.

use core::marker::PhantomData;

use crate::types::{Point, Rect};

/// Items that occupy a single position.
pub trait HasPosition {
    /// The item's position.
    fn position(&self) -> Point;
}

impl HasPosition for Point {
    fn position(&self) -> Point {
        *self
    }
}

/// Items that occupy an axis-aligned rectangle.
pub trait HasBounds {
    /// The item's bounding rectangle.
    fn bounds(&self) -> Rect;
}

impl HasBounds for Rect {
    fn bounds(&self) -> Rect {
        *self
    }
}

/// Geometry predicates adapting an item type to the tree.
///
/// A policy is a zero-sized strategy type; it owns no data and is never
/// instantiated. Cell containment uses closed rectangle containment, so a
/// footprint sitting exactly on a subdivision midpoint is inside more
/// than one child cell and therefore has no unique destination child.
pub trait Shape {
    /// The stored item type.
    type Item;

    /// Representative point, used only to order items along the Z-curve
    /// during bulk loads. Must be deterministic for a given item.
    fn anchor(item: &Self::Item) -> Point;

    /// Whether `cell` fully contains the item's footprint.
    fn cell_contains(cell: &Rect, item: &Self::Item) -> bool;
}

/// Shape policy for point-footprint items.
pub struct PointShape<T>(PhantomData<T>);

impl<T: HasPosition> Shape for PointShape<T> {
    type Item = T;

    fn anchor(item: &T) -> Point {
        item.position()
    }

    fn cell_contains(cell: &Rect, item: &T) -> bool {
        let p = item.position();
        cell.contains_rect(&Rect::new(p.x, p.y, 0.0, 0.0))
    }
}

/// Shape policy for rectangle-footprint items.
pub struct RectShape<T>(PhantomData<T>);

impl<T: HasBounds> Shape for RectShape<T> {
    type Item = T;

    fn anchor(item: &T) -> Point {
        let b = item.bounds();
        Point::new(b.x, b.y)
    }

    fn cell_contains(cell: &Rect, item: &T) -> bool {
        cell.contains_rect(&item.bounds())
    }
}

/// A query region: the geometric side of every range query.
///
/// The tree prunes with `intersects_cell`, short-circuits whole subtrees
/// with `contains_cell` (their items are emitted without per-item
/// filtering), and filters individual items with `intersects_item` only
/// in partially overlapped cells.
pub trait Region<S: Shape> {
    /// Whether the region fully contains a node cell.
    fn contains_cell(&self, cell: &Rect) -> bool;

    /// Whether the region overlaps a node cell.
    fn intersects_cell(&self, cell: &Rect) -> bool;

    /// Whether the region overlaps an item's footprint.
    fn intersects_item(&self, item: &S::Item) -> bool;
}

impl<T: HasPosition> Region<PointShape<T>> for Rect {
    fn contains_cell(&self, cell: &Rect) -> bool {
        self.contains_rect(cell)
    }

    fn intersects_cell(&self, cell: &Rect) -> bool {
        self.intersects(cell)
    }

    fn intersects_item(&self, item: &T) -> bool {
        self.contains_point(item.position())
    }
}

impl<T: HasBounds> Region<RectShape<T>> for Rect {
    fn contains_cell(&self, cell: &Rect) -> bool {
        self.contains_rect(cell)
    }

    fn intersects_cell(&self, cell: &Rect) -> bool {
        self.intersects(cell)
    }

    fn intersects_item(&self, item: &T) -> bool {
        self.intersects(&item.bounds())
    }
}

// A point region can never contain a cell, which has positive area.
impl<T: HasPosition> Region<PointShape<T>> for Point {
    fn contains_cell(&self, _cell: &Rect) -> bool {
        false
    }

    fn intersects_cell(&self, cell: &Rect) -> bool {
        cell.contains_point(*self)
    }

    fn intersects_item(&self, item: &T) -> bool {
        item.position() == *self
    }
}

impl<T: HasBounds> Region<RectShape<T>> for Point {
    fn contains_cell(&self, _cell: &Rect) -> bool {
        false
    }

    fn intersects_cell(&self, cell: &Rect) -> bool {
        cell.contains_point(*self)
    }

    fn intersects_item(&self, item: &T) -> bool {
        item.bounds().contains_point(*self)
    }
}
