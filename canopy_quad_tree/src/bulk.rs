// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bulk loading: Z-order sort followed by recursive quartering.
//!
//! Instead of inserting one item at a time, the loader sorts the batch
//! along a Morton (Z-order) curve and then quarters the sorted slice
//! recursively, subdividing each cell at the curve median, so the tree
//! comes out balanced by construction. Workers build private subtree
//! fragments against a shared read-only entry table; items that land
//! outside their fragment's cell are returned as spills and reinserted
//! through the normal path once the fragments are grafted in. With a
//! `thread_depth` of `d` the top `d` levels fan out four ways, for `4^d`
//! leaf tasks.

use core::hash::Hash;
use std::collections::HashSet;

use rayon::prelude::*;

use crate::node::{quadrants, Entry, EntryIdx, NodeIdx, MIN_SPLIT_AREA, NODE_CAPACITY};
use crate::shape::Shape;
use crate::tree::QuadTree;
use crate::types::{Point, Rect};
use crate::Error;

/// Sorted runs at most this long become leaves instead of quartering.
pub(crate) const BULK_LEAF_LEN: usize = 8;

impl<S: Shape> QuadTree<S>
where
    S::Item: Clone + Eq + Hash,
{
    /// Load a batch in one pass, building a balanced subtree under the
    /// root. `thread_depth` levels of the build fan out onto worker
    /// threads; zero builds sequentially.
    ///
    /// Fails if the root already has children, or if the batch contains
    /// an item that is already indexed (or twice); a failed call leaves
    /// the tree unchanged.
    pub fn bulk_load(&mut self, items: Vec<S::Item>, thread_depth: usize) -> Result<(), Error>
    where
        S::Item: Send + Sync,
    {
        if self.node(self.root).children.is_some() {
            return Err(Error::BulkTargetHasChildren);
        }
        {
            let mut batch = HashSet::with_capacity(items.len());
            for item in &items {
                if self.by_item.contains_key(item) || !batch.insert(item) {
                    return Err(Error::DuplicateItem);
                }
            }
        }
        log::debug!(
            "bulk loading {} items (thread depth {})",
            items.len(),
            thread_depth
        );
        let small = self.by_item.len() + items.len() <= NODE_CAPACITY;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let entry = self.alloc_entry_for(item);
            ids.push(entry);
        }
        if small {
            for e in ids {
                self.insert_at(self.root, e, true);
            }
        } else if thread_depth == 0 {
            self.bulk_add_entries(self.root, ids);
        } else {
            self.bulk_add_with(self.root, ids, true, |entries, sorted, cell| {
                build_par::<S>(entries, sorted, cell, thread_depth)
            });
        }
        Ok(())
    }

    /// Sequential bulk add of already-allocated entries onto a childless
    /// cell. Condensation rebuilds route through here as well.
    pub(crate) fn bulk_add_entries(&mut self, target: NodeIdx, ids: Vec<EntryIdx>) {
        if ids.len() + self.node(target).items.len() <= NODE_CAPACITY {
            for e in ids {
                self.insert_at(target, e, true);
            }
            return;
        }
        self.bulk_add_with(target, ids, false, build_seq::<S>);
    }

    fn bulk_add_with<B>(&mut self, target: NodeIdx, ids: Vec<EntryIdx>, par_extent: bool, build: B)
    where
        B: FnOnce(&[Option<Entry<S::Item>>], &[(EntryIdx, Point)], Rect) -> (BuiltCell, Vec<EntryIdx>),
    {
        debug_assert!(self.node(target).children.is_none());
        // Anything already sitting on the target is set aside and comes
        // back through the normal path at the end.
        let pre: Vec<EntryIdx> = self.node_mut(target).items.drain(..).collect();
        let mut sorted: Vec<(EntryIdx, Point)> = ids
            .into_iter()
            .map(|e| (e, S::anchor(&self.entry(e).item)))
            .collect();
        let extent = if par_extent {
            extent_par(&sorted)
        } else {
            extent_seq(&sorted)
        };
        // Stable, so items with equal keys keep their batch order.
        sorted.sort_by_cached_key(|&(_, p)| morton_key(p, &extent));
        let cell = self.node(target).cell;
        let (built, spill) = build(&self.entries, &sorted, cell);
        self.graft(target, built);
        for e in spill.into_iter().chain(pre) {
            self.insert_at(target, e, false);
        }
    }

    fn alloc_entry_for(&mut self, item: S::Item) -> EntryIdx {
        // Mirrors insert()'s bookkeeping without the duplicate check,
        // which bulk_load has already done for the whole batch.
        let entry = self.alloc_entry(item.clone());
        self.by_item.insert(item, entry);
        entry
    }

    /// Turn a built fragment into arena cells under `target`, fixing up
    /// parent and owner links.
    fn graft(&mut self, target: NodeIdx, built: BuiltCell) {
        debug_assert!(self.node(target).children.is_none());
        let BuiltCell { items, children, .. } = built;
        for &e in &items {
            self.entry_mut(e).owner = target;
        }
        self.node_mut(target).items = items.into_iter().collect();
        if let Some(children) = children {
            let mut ids = [target; 4];
            for (slot, kid) in ids.iter_mut().zip(*children) {
                let idx = self.alloc_node(kid.cell, Some(target));
                *slot = idx;
                self.graft(idx, kid);
            }
            self.node_mut(target).children = Some(ids);
        }
    }
}

/// One cell of a privately built fragment, before grafting.
struct BuiltCell {
    cell: Rect,
    items: Vec<EntryIdx>,
    children: Option<Box<[BuiltCell; 4]>>,
}

struct SplitPlan<'a> {
    cells: [Rect; 4],
    ranges: [&'a [(EntryIdx, Point)]; 4],
}

/// Quarter a sorted run by count and pick the cell's split point, or
/// decline for short runs and degenerate cells.
fn split_plan<'a>(range: &'a [(EntryIdx, Point)], cell: &Rect) -> Option<SplitPlan<'a>> {
    let len = range.len();
    if len <= BULK_LEAF_LEN || !(cell.area() >= MIN_SPLIT_AREA) || !cell.is_finite() {
        return None;
    }
    let q1 = len.div_ceil(4);
    let q2 = q1 + len / 4;
    let q3 = q2 + len / 4;
    // Split at the curve median when it falls strictly inside the cell;
    // a median on the boundary would create an empty sliver.
    let sample = range[q2].1;
    let mid = if strictly_inside(cell, sample) {
        sample
    } else {
        cell.center()
    };
    Some(SplitPlan {
        cells: quadrants(cell, mid),
        ranges: [
            &range[..q1],
            &range[q1..q2],
            &range[q2..q3],
            &range[q3..],
        ],
    })
}

fn strictly_inside(cell: &Rect, p: Point) -> bool {
    cell.x < p.x && p.x < cell.right() && cell.y < p.y && p.y < cell.bottom()
}

fn build_leaf<S: Shape>(
    entries: &[Option<Entry<S::Item>>],
    range: &[(EntryIdx, Point)],
    cell: Rect,
    spill: &mut Vec<EntryIdx>,
) -> BuiltCell {
    let mut items = Vec::with_capacity(range.len());
    for &(e, _) in range {
        let item = &entries[e.get()].as_ref().expect("dangling entry index").item;
        if S::cell_contains(&cell, item) {
            items.push(e);
        } else {
            spill.push(e);
        }
    }
    BuiltCell {
        cell,
        items,
        children: None,
    }
}

fn build_seq<S: Shape>(
    entries: &[Option<Entry<S::Item>>],
    range: &[(EntryIdx, Point)],
    cell: Rect,
) -> (BuiltCell, Vec<EntryIdx>) {
    let mut spill = Vec::new();
    let built = match split_plan(range, &cell) {
        None => build_leaf::<S>(entries, range, cell, &mut spill),
        Some(plan) => {
            let children = core::array::from_fn(|i| {
                let (kid, mut s) = build_seq::<S>(entries, plan.ranges[i], plan.cells[i]);
                spill.append(&mut s);
                kid
            });
            BuiltCell {
                cell,
                items: Vec::new(),
                children: Some(Box::new(children)),
            }
        }
    };
    (built, spill)
}

fn build_par<S: Shape>(
    entries: &[Option<Entry<S::Item>>],
    range: &[(EntryIdx, Point)],
    cell: Rect,
    depth: usize,
) -> (BuiltCell, Vec<EntryIdx>)
where
    S::Item: Send + Sync,
{
    if depth == 0 {
        return build_seq::<S>(entries, range, cell);
    }
    match split_plan(range, &cell) {
        None => {
            let mut spill = Vec::new();
            let built = build_leaf::<S>(entries, range, cell, &mut spill);
            (built, spill)
        }
        Some(plan) => {
            let [r0, r1, r2, r3] = plan.ranges;
            let [c0, c1, c2, c3] = plan.cells;
            let ((a, b), (c, d)) = rayon::join(
                || {
                    rayon::join(
                        || build_par::<S>(entries, r0, c0, depth - 1),
                        || build_par::<S>(entries, r1, c1, depth - 1),
                    )
                },
                || {
                    rayon::join(
                        || build_par::<S>(entries, r2, c2, depth - 1),
                        || build_par::<S>(entries, r3, c3, depth - 1),
                    )
                },
            );
            let mut spill = Vec::new();
            let children = [a, b, c, d].map(|(kid, mut s)| {
                spill.append(&mut s);
                kid
            });
            (
                BuiltCell {
                    cell,
                    items: Vec::new(),
                    children: Some(Box::new(children)),
                },
                spill,
            )
        }
    }
}

// --- Z-order keys ---

#[derive(Copy, Clone, Debug)]
struct Extent {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Extent {
    const EMPTY: Self = Self {
        min_x: f32::INFINITY,
        min_y: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    // The four reductions are tracked independently per axis.
    fn observe(mut self, p: Point) -> Self {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
        self
    }

    fn merge(a: Self, b: Self) -> Self {
        Self {
            min_x: a.min_x.min(b.min_x),
            min_y: a.min_y.min(b.min_y),
            max_x: a.max_x.max(b.max_x),
            max_y: a.max_y.max(b.max_y),
        }
    }
}

fn extent_seq(pts: &[(EntryIdx, Point)]) -> Extent {
    pts.iter().fold(Extent::EMPTY, |acc, &(_, p)| acc.observe(p))
}

fn extent_par(pts: &[(EntryIdx, Point)]) -> Extent {
    pts.par_iter()
        .fold(|| Extent::EMPTY, |acc, &(_, p)| acc.observe(p))
        .reduce(|| Extent::EMPTY, Extent::merge)
}

/// 32-bit Morton key: each axis normalized into 16 bits, then bit
/// interleaved with y in the high lanes, so the curve visits quadrants in
/// top-left, top-right, bottom-left, bottom-right order.
fn morton_key(p: Point, extent: &Extent) -> u32 {
    let sx = axis_cell(p.x, extent.min_x, extent.max_x - extent.min_x);
    let sy = axis_cell(p.y, extent.min_y, extent.max_y - extent.min_y);
    (spread(sy) << 1) | spread(sx)
}

fn axis_cell(v: f32, min: f32, extent: f32) -> u32 {
    if extent > 0.0 {
        // A NaN coordinate saturates to cell zero.
        ((v - min) / extent * 65535.0).clamp(0.0, 65535.0) as u32
    } else {
        0
    }
}

/// Spread the low 16 bits of `x` into the even bit positions.
fn spread(mut x: u32) -> u32 {
    x &= 0xFFFF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}
