// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cell arena and structural operations: insertion, subdivision,
//! condensation, and relocation.
//!
//! Cells and item entries live in slot arenas with free lists; all links
//! between them (`parent`, `children`, `owner`) are plain indices, fixed
//! up by hand on every structural change. Children are always created and
//! destroyed four at a time, so `children: Option<[NodeIdx; 4]>` makes the
//! all-or-nothing shape impossible to violate.

use core::hash::Hash;

use smallvec::SmallVec;

use crate::shape::Shape;
use crate::tree::QuadTree;
use crate::types::{Point, Rect};

/// Nominal per-cell item capacity; the next insert into a full leaf
/// subdivides it.
pub const NODE_CAPACITY: usize = 10;

/// Condensation flattens a subtree back into its root when empty children
/// appear and the subtree holds fewer items than this.
pub(crate) const REBUILD_LIMIT: usize = 22;

/// Cells with less area than this refuse to subdivide, so degenerate
/// splits are never created; the bucket grows past its nominal capacity
/// instead.
pub(crate) const MIN_SPLIT_AREA: f32 = 0.01;

// Inline bucket capacity: the nominal capacity plus the transient
// overflow condensation produces before a rebuild settles.
const BUCKET_INLINE: usize = 16;

pub(crate) type Bucket = SmallVec<[EntryIdx; BUCKET_INLINE]>;

/// Index of a cell in the node arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeIdx(usize);

impl NodeIdx {
    pub(crate) const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

/// Index of an item entry in the entry arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct EntryIdx(usize);

impl EntryIdx {
    pub(crate) const fn new(i: usize) -> Self {
        Self(i)
    }

    pub(crate) const fn get(self) -> usize {
        self.0
    }
}

/// One quadtree cell.
#[derive(Debug)]
pub(crate) struct Node {
    /// The region this cell covers; fixed for the cell's lifetime.
    pub(crate) cell: Rect,
    pub(crate) parent: Option<NodeIdx>,
    /// Child cells in `[top-left, top-right, bottom-left, bottom-right]`
    /// order, present together or absent together.
    pub(crate) children: Option<[NodeIdx; 4]>,
    pub(crate) items: Bucket,
}

impl Node {
    pub(crate) fn new(cell: Rect, parent: Option<NodeIdx>) -> Self {
        Self {
            cell,
            parent,
            children: None,
            items: Bucket::new(),
        }
    }
}

/// The stable record backing one stored item: the item value and the cell
/// that currently holds it.
#[derive(Debug)]
pub(crate) struct Entry<T> {
    pub(crate) item: T,
    pub(crate) owner: NodeIdx,
}

/// The four sub-rectangles of `cell` split at `mid`, in child order.
pub(crate) fn quadrants(cell: &Rect, mid: Point) -> [Rect; 4] {
    [
        Rect::new(cell.x, cell.y, mid.x - cell.x, mid.y - cell.y),
        Rect::new(mid.x, cell.y, cell.right() - mid.x, mid.y - cell.y),
        Rect::new(cell.x, mid.y, mid.x - cell.x, cell.bottom() - mid.y),
        Rect::new(mid.x, mid.y, cell.right() - mid.x, cell.bottom() - mid.y),
    ]
}

impl<S: Shape> QuadTree<S>
where
    S::Item: Clone + Eq + Hash,
{
    pub(crate) fn node(&self, idx: NodeIdx) -> &Node {
        self.nodes[idx.get()].as_ref().expect("dangling node index")
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
        self.nodes[idx.get()].as_mut().expect("dangling node index")
    }

    pub(crate) fn entry(&self, idx: EntryIdx) -> &Entry<S::Item> {
        self.entries[idx.get()].as_ref().expect("dangling entry index")
    }

    pub(crate) fn entry_mut(&mut self, idx: EntryIdx) -> &mut Entry<S::Item> {
        self.entries[idx.get()].as_mut().expect("dangling entry index")
    }

    pub(crate) fn alloc_node(&mut self, cell: Rect, parent: Option<NodeIdx>) -> NodeIdx {
        let node = Node::new(cell, parent);
        match self.free_nodes.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                NodeIdx::new(i)
            }
            None => {
                self.nodes.push(Some(node));
                NodeIdx::new(self.nodes.len() - 1)
            }
        }
    }

    fn free_node(&mut self, idx: NodeIdx) {
        debug_assert!(
            self.nodes[idx.get()]
                .as_ref()
                .is_some_and(|n| n.items.is_empty() && n.children.is_none()),
            "freeing a cell that still holds content"
        );
        self.nodes[idx.get()] = None;
        self.free_nodes.push(idx.get());
    }

    // --- insertion ---

    /// Store `entry` in the subtree at `node`, keeping it in the tightest
    /// cell that contains its footprint. `can_split` gates subdivision of
    /// full leaves; when it is off, buckets simply grow.
    pub(crate) fn insert_at(&mut self, node: NodeIdx, entry: EntryIdx, can_split: bool) {
        if !S::cell_contains(&self.node(node).cell, &self.entry(entry).item) {
            // Out-of-cell items climb; only the root takes them in.
            if let Some(parent) = self.node(node).parent {
                return self.insert_at(parent, entry, can_split);
            }
            return self.store_in(node, entry);
        }
        if self.node(node).children.is_none() {
            if self.node(node).items.len() < NODE_CAPACITY || !can_split || !self.try_split(node) {
                return self.store_in(node, entry);
            }
        }
        match self.dest_child(node, entry) {
            Some(child) => self.insert_at(child, entry, can_split),
            // Footprint touches the split point: no unique child, so it
            // stays at this level.
            None => self.store_in(node, entry),
        }
    }

    fn store_in(&mut self, node: NodeIdx, entry: EntryIdx) {
        self.node_mut(node).items.push(entry);
        self.entry_mut(entry).owner = node;
    }

    /// The single child whose cell contains the entry's footprint, if
    /// exactly one does.
    fn dest_child(&self, node: NodeIdx, entry: EntryIdx) -> Option<NodeIdx> {
        let children = self.node(node).children?;
        let item = &self.entry(entry).item;
        let mut found = None;
        for c in children {
            if S::cell_contains(&self.node(c).cell, item) {
                if found.is_some() {
                    return None;
                }
                found = Some(c);
            }
        }
        found
    }

    /// Subdivide at the cell's center, unless the cell is too small or
    /// non-finite. Existing items are redistributed into the new children.
    fn try_split(&mut self, node: NodeIdx) -> bool {
        let cell = self.node(node).cell;
        if !(cell.area() >= MIN_SPLIT_AREA) || !cell.is_finite() {
            return false;
        }
        self.split_at(node, cell.center());
        self.redistribute(node);
        true
    }

    /// Subdivide at an explicit split point without redistributing items.
    /// The bulk loader drives this with Z-curve medians.
    pub(crate) fn split_at(&mut self, node: NodeIdx, mid: Point) {
        debug_assert!(self.node(node).children.is_none());
        let cell = self.node(node).cell;
        let children = quadrants(&cell, mid).map(|q| self.alloc_node(q, Some(node)));
        self.node_mut(node).children = Some(children);
    }

    fn redistribute(&mut self, node: NodeIdx) {
        let staying = std::mem::take(&mut self.node_mut(node).items);
        for entry in staying {
            match self.dest_child(node, entry) {
                Some(child) => self.insert_at(child, entry, true),
                // Owner is already this cell.
                None => self.node_mut(node).items.push(entry),
            }
        }
    }

    // --- removal and condensation ---

    /// Detach `entry` from a cell's bucket by swapping with the last
    /// element. Returns whether it was present.
    pub(crate) fn take_item(&mut self, node: NodeIdx, entry: EntryIdx) -> bool {
        let items = &mut self.node_mut(node).items;
        match items.iter().position(|&e| e == entry) {
            Some(i) => {
                items.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Number of items stored in the subtree at `node`.
    pub(crate) fn subtree_len(&self, node: NodeIdx) -> usize {
        let n = self.node(node);
        let mut count = 0;
        for &e in &n.items {
            // A stale owner means the bucket changed under us; stop here.
            if self.entry(e).owner != node {
                break;
            }
            count += 1;
        }
        if let Some(children) = n.children {
            for c in children {
                count += self.subtree_len(c);
            }
        }
        count
    }

    /// Merge underfull structure at `node`. Returns whether the upward
    /// walk should continue to the parent; only an internal cell that
    /// keeps its shape stops the walk.
    pub(crate) fn condense_at(&mut self, node: NodeIdx) -> bool {
        let Some(children) = self.node(node).children else {
            // Leaves have nothing to merge; let the walk continue.
            return true;
        };
        let total = self.subtree_len(node);
        if total <= NODE_CAPACITY {
            self.rebuild_flat(node);
            return true;
        }
        let empty = children.iter().filter(|&&c| self.is_empty_leaf(c)).count();
        if empty == 4 {
            self.node_mut(node).children = None;
            for c in children {
                self.free_node(c);
            }
            return true;
        }
        if empty == 3 {
            let survivor = children
                .into_iter()
                .find(|&c| !self.is_empty_leaf(c))
                .expect("one loaded child");
            self.promote(node, survivor, children);
            return true;
        }
        if empty > 0 && total < REBUILD_LIMIT {
            self.rebuild_flat(node);
            return true;
        }
        false
    }

    /// Run condensation from `from` toward the root until a cell declines.
    pub(crate) fn condense_upward(&mut self, from: NodeIdx) {
        let mut node = from;
        while self.condense_at(node) {
            match self.node(node).parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }

    fn is_empty_leaf(&self, node: NodeIdx) -> bool {
        let n = self.node(node);
        n.children.is_none() && n.items.is_empty()
    }

    /// Harvest every descendant entry, drop the children, and re-add the
    /// harvest through the bulk path; small subtrees settle into a single
    /// flat leaf.
    fn rebuild_flat(&mut self, node: NodeIdx) {
        let mut gathered = Vec::new();
        if let Some(children) = self.node_mut(node).children.take() {
            for c in children {
                self.harvest(c, &mut gathered);
            }
        }
        log::trace!("rebuilding a {}-item subtree into a flat cell", gathered.len());
        self.bulk_add_entries(node, gathered);
    }

    fn harvest(&mut self, node: NodeIdx, out: &mut Vec<EntryIdx>) {
        let children = self.node_mut(node).children.take();
        out.extend(self.node_mut(node).items.drain(..));
        if let Some(children) = children {
            for c in children {
                self.harvest(c, out);
            }
        }
        self.free_node(node);
    }

    /// Replace `node`'s four children with the one non-empty `survivor`:
    /// its grandchildren move up a level and its items are absorbed.
    fn promote(&mut self, node: NodeIdx, survivor: NodeIdx, children: [NodeIdx; 4]) {
        let grandchildren = self.node_mut(survivor).children.take();
        let moved = std::mem::take(&mut self.node_mut(survivor).items);
        for c in children {
            self.free_node(c);
        }
        self.node_mut(node).children = grandchildren;
        if let Some(grandchildren) = grandchildren {
            for g in grandchildren {
                self.node_mut(g).parent = Some(node);
            }
        }
        if self.node(node).items.is_empty() {
            for &e in &moved {
                self.entry_mut(e).owner = node;
            }
            self.node_mut(node).items = moved;
        } else {
            for e in moved {
                self.insert_at(node, e, true);
            }
        }
    }

    // --- relocation ---

    /// Re-home `entry` after its item's coordinates changed. The entry
    /// keeps its identity; only its owning cell moves.
    pub(crate) fn relocate(&mut self, entry: EntryIdx) {
        let owner = self.entry(entry).owner;
        // Climb to the nearest cell that still holds the new footprint;
        // the root takes anything.
        let mut target = owner;
        loop {
            if S::cell_contains(&self.node(target).cell, &self.entry(entry).item) {
                break;
            }
            match self.node(target).parent {
                Some(p) => target = p,
                None => break,
            }
        }
        if target == owner {
            if self.node(owner).children.is_none() {
                return;
            }
            match self.dest_child(owner, entry) {
                // Straddles the split point; stays put.
                None => {}
                Some(child) => {
                    self.take_item(owner, entry);
                    self.insert_at(child, entry, true);
                    self.condense_upward(owner);
                }
            }
        } else {
            self.take_item(owner, entry);
            self.insert_at(target, entry, true);
            self.condense_upward(owner);
        }
    }
}
