// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public [`QuadTree`] container.
//!
//! The container pairs the cell arena with an item→entry map, so
//! membership tests, removal, and re-homing after a coordinate change are
//! all map lookups rather than tree searches. Items need stable equality
//! and hashing: an item whose coordinates change must still compare equal
//! to its stored snapshot, otherwise [`QuadTree::update`] cannot find it.

use core::hash::Hash;
use std::collections::HashMap;

use crate::node::{Entry, EntryIdx, Node, NodeIdx};
use crate::shape::{PointShape, RectShape, Shape};
use crate::types::Rect;
use crate::Error;

/// A dynamic region quadtree indexing items in 2D space.
///
/// The root cell is fixed at construction; items whose footprint falls
/// outside it are still accepted, at the root level.
pub struct QuadTree<S: Shape>
where
    S::Item: Clone + Eq + Hash,
{
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) free_nodes: Vec<usize>,
    pub(crate) entries: Vec<Option<Entry<S::Item>>>,
    pub(crate) free_entries: Vec<usize>,
    pub(crate) by_item: HashMap<S::Item, EntryIdx>,
    pub(crate) root: NodeIdx,
}

/// Quadtree over point-footprint items.
pub type PointQuadTree<T> = QuadTree<PointShape<T>>;

/// Quadtree over rectangle-footprint items.
pub type RectQuadTree<T> = QuadTree<RectShape<T>>;

/// Structural counters returned by [`QuadTree::stats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Live cells in the tree, the root included.
    pub cells: usize,
    /// Stored items; always equals [`QuadTree::len`].
    pub items: usize,
}

impl<S: Shape> QuadTree<S>
where
    S::Item: Clone + Eq + Hash,
{
    /// Create an empty tree covering `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            nodes: vec![Some(Node::new(bounds, None))],
            free_nodes: Vec::new(),
            entries: Vec::new(),
            free_entries: Vec::new(),
            by_item: HashMap::new(),
            root: NodeIdx::new(0),
        }
    }

    /// The root cell chosen at construction.
    pub fn bounds(&self) -> Rect {
        self.node(self.root).cell
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.by_item.len()
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }

    /// Whether `item` is stored.
    pub fn contains(&self, item: &S::Item) -> bool {
        self.by_item.contains_key(item)
    }

    /// Add one item. Fails on a duplicate and leaves the tree unchanged.
    pub fn insert(&mut self, item: S::Item) -> Result<(), Error> {
        if self.by_item.contains_key(&item) {
            return Err(Error::DuplicateItem);
        }
        let entry = self.alloc_entry(item.clone());
        self.by_item.insert(item, entry);
        self.insert_at(self.root, entry, true);
        Ok(())
    }

    /// Add items one at a time, stopping at the first duplicate.
    pub fn insert_many<I>(&mut self, items: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S::Item>,
    {
        for item in items {
            self.insert(item)?;
        }
        Ok(())
    }

    /// Remove `item`. Returns whether it was present.
    pub fn remove(&mut self, item: &S::Item) -> bool {
        let Some(entry) = self.by_item.remove(item) else {
            return false;
        };
        let owner = self.entry(entry).owner;
        self.take_item(owner, entry);
        self.free_entry(entry);
        self.condense_upward(owner);
        true
    }

    /// Re-index `item` after its coordinates changed: the stored snapshot
    /// is refreshed and the entry is re-homed to the tightest cell.
    /// Returns whether the item was present.
    pub fn update(&mut self, item: &S::Item) -> bool {
        let Some(&entry) = self.by_item.get(item) else {
            return false;
        };
        self.entry_mut(entry).item = item.clone();
        self.relocate(entry);
        true
    }

    /// Remove every item for which `pred` returns true. Returns whether
    /// anything was removed.
    ///
    /// Removal is two-phase: matching entries are detached from their
    /// cells first, then the affected cells are condensed level by level
    /// while the item map is erased on a sibling worker.
    pub fn remove_where<F>(&mut self, mut pred: F) -> bool
    where
        F: FnMut(&S::Item) -> bool,
        S::Item: Send + Sync,
    {
        let doomed: Vec<EntryIdx> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref()
                    .is_some_and(|e| pred(&e.item))
                    .then_some(EntryIdx::new(i))
            })
            .collect();
        if doomed.is_empty() {
            return false;
        }
        let mut affected = Vec::with_capacity(doomed.len());
        let mut removed = Vec::with_capacity(doomed.len());
        for &entry in &doomed {
            let owner = self.entry(entry).owner;
            self.take_item(owner, entry);
            removed.push(self.free_entry(entry).item);
            affected.push(owner);
        }
        // The map borrow is carved out so the tree sweep and the erase
        // can run side by side.
        let mut map = std::mem::take(&mut self.by_item);
        rayon::join(
            || self.condense_sweep(affected),
            || {
                for item in &removed {
                    map.remove(item);
                }
            },
        );
        self.by_item = map;
        log::debug!("removed {} items by predicate", removed.len());
        true
    }

    /// Drop every item; the root cell is kept.
    pub fn clear(&mut self) {
        let bounds = self.bounds();
        self.nodes.clear();
        self.free_nodes.clear();
        self.entries.clear();
        self.free_entries.clear();
        self.by_item.clear();
        self.nodes.push(Some(Node::new(bounds, None)));
        self.root = NodeIdx::new(0);
    }

    /// Structural counters: live cells and stored items.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            cells: self.nodes.iter().filter(|n| n.is_some()).count(),
            items: self.by_item.len(),
        }
    }

    // --- internals ---

    pub(crate) fn alloc_entry(&mut self, item: S::Item) -> EntryIdx {
        let entry = Entry {
            item,
            owner: self.root,
        };
        match self.free_entries.pop() {
            Some(i) => {
                self.entries[i] = Some(entry);
                EntryIdx::new(i)
            }
            None => {
                self.entries.push(Some(entry));
                EntryIdx::new(self.entries.len() - 1)
            }
        }
    }

    fn free_entry(&mut self, idx: EntryIdx) -> Entry<S::Item> {
        let entry = self.entries[idx.get()].take().expect("dangling entry index");
        self.free_entries.push(idx.get());
        entry
    }

    /// Condense a frontier of cells level by level until nothing changes.
    /// Cells freed by an earlier step in the sweep are skipped.
    fn condense_sweep(&mut self, mut frontier: Vec<NodeIdx>) {
        while !frontier.is_empty() {
            frontier.sort_unstable();
            frontier.dedup();
            let mut next = Vec::new();
            for node in frontier {
                if self.nodes[node.get()].is_none() {
                    continue;
                }
                if self.condense_at(node) {
                    if let Some(p) = self.node(node).parent {
                        next.push(p);
                    }
                }
            }
            frontier = next;
        }
    }

    /// Assert every structural invariant; test builds only.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        let mut stack = vec![self.root];
        let mut total = 0;
        while let Some(n) = stack.pop() {
            let node = self.node(n);
            for &e in &node.items {
                assert!(seen.insert(e), "entry stored twice");
                let entry = self.entry(e);
                assert_eq!(entry.owner, n, "owner link out of date");
                if n != self.root {
                    assert!(
                        S::cell_contains(&node.cell, &entry.item),
                        "item escaped its cell"
                    );
                }
                total += 1;
            }
            if let Some(children) = node.children {
                for c in children {
                    assert_eq!(self.node(c).parent, Some(n), "parent link out of date");
                    stack.push(c);
                }
            }
        }
        assert_eq!(total, self.by_item.len(), "map and tree disagree");
        for &e in self.by_item.values() {
            assert!(seen.contains(&e), "mapped entry unreachable from the root");
        }
    }
}

impl<S: Shape> core::fmt::Debug for QuadTree<S>
where
    S::Item: Clone + Eq + Hash,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let stats = self.stats();
        f.debug_struct("QuadTree")
            .field("bounds", &self.bounds())
            .field("cells", &stats.cells)
            .field("items", &stats.items)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Tag;
    use crate::types::Point;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tree() -> PointQuadTree<Tag> {
        PointQuadTree::new(Rect::new(0.0, 0.0, 100.0, 100.0))
    }

    #[test]
    fn membership_follows_inserts_and_removes() {
        let mut t = tree();
        t.insert(Tag::new(1, 10.0, 10.0)).unwrap();
        t.insert(Tag::new(2, 20.0, 20.0)).unwrap();
        assert_eq!(t.len(), 2);
        assert!(t.contains(&Tag::new(1, 10.0, 10.0)));
        assert!(!t.contains(&Tag::new(3, 10.0, 10.0)));
        assert!(t.remove(&Tag::new(1, 0.0, 0.0)));
        assert!(!t.remove(&Tag::new(1, 0.0, 0.0)));
        assert_eq!(t.len(), 1);
        t.validate();
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut t = tree();
        t.insert(Tag::new(7, 1.0, 1.0)).unwrap();
        assert_eq!(t.insert(Tag::new(7, 2.0, 2.0)), Err(Error::DuplicateItem));
        assert_eq!(t.len(), 1);
        t.validate();
    }

    #[test]
    fn insert_many_stops_at_first_duplicate() {
        let mut t = tree();
        let items = vec![
            Tag::new(1, 1.0, 1.0),
            Tag::new(2, 2.0, 2.0),
            Tag::new(1, 3.0, 3.0),
            Tag::new(4, 4.0, 4.0),
        ];
        assert_eq!(t.insert_many(items), Err(Error::DuplicateItem));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn update_rehomes_a_moved_item() {
        let mut t = tree();
        t.insert(Tag::new(1, 5.0, 5.0)).unwrap();
        assert!(t.update(&Tag::new(1, 11.0, 11.0)));
        assert!(!t.update(&Tag::new(2, 11.0, 11.0)));
        let hits: Vec<_> = t.query(Rect::new(10.0, 10.0, 20.0, 20.0)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        t.validate();
    }

    #[test]
    fn clear_then_readd_restores_query_results() {
        let mut t = tree();
        for i in 0..40u32 {
            t.insert(Tag::new(i, (i % 8) as f32 * 12.0, (i / 8) as f32 * 18.0))
                .unwrap();
        }
        let before = t.query_count(&Rect::new(0.0, 0.0, 50.0, 50.0));
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.stats().cells, 1);
        for i in 0..40u32 {
            t.insert(Tag::new(i, (i % 8) as f32 * 12.0, (i / 8) as f32 * 18.0))
                .unwrap();
        }
        assert_eq!(t.query_count(&Rect::new(0.0, 0.0, 50.0, 50.0)), before);
        t.validate();
    }

    #[test]
    fn add_remove_roundtrip_restores_state() {
        let mut t = tree();
        for i in 0..15u32 {
            t.insert(Tag::new(i, i as f32 * 6.0, 40.0)).unwrap();
        }
        let count = t.len();
        t.insert(Tag::new(500, 33.0, 33.0)).unwrap();
        assert!(t.remove(&Tag::new(500, 0.0, 0.0)));
        assert_eq!(t.len(), count);
        assert!(!t.contains(&Tag::new(500, 0.0, 0.0)));
        t.validate();
    }

    #[test]
    fn remove_where_keeps_exactly_the_rest() {
        let mut t = tree();
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for i in 1..=100u32 {
            t.insert(Tag::new(
                i,
                rng.random_range(0.0..100.0),
                rng.random_range(0.0..100.0),
            ))
            .unwrap();
        }
        assert!(t.remove_where(|tag| tag.id % 2 == 1));
        assert_eq!(t.len(), 50);
        for i in 1..=100u32 {
            assert_eq!(t.contains(&Tag::new(i, 0.0, 0.0)), i % 2 == 0);
        }
        assert!(!t.remove_where(|tag| tag.id % 2 == 1), "nothing left to match");
        t.validate();
    }

    #[test]
    fn random_churn_preserves_invariants() {
        let mut t = tree();
        let mut rng = StdRng::seed_from_u64(42);
        let mut live: Vec<u32> = Vec::new();
        let mut next_id = 0u32;
        for _ in 0..600 {
            match rng.random_range(0..4u32) {
                0 | 1 => {
                    t.insert(Tag::new(
                        next_id,
                        rng.random_range(-20.0..120.0),
                        rng.random_range(-20.0..120.0),
                    ))
                    .unwrap();
                    live.push(next_id);
                    next_id += 1;
                }
                2 if !live.is_empty() => {
                    let at = rng.random_range(0..live.len());
                    let id = live.swap_remove(at);
                    assert!(t.remove(&Tag::new(id, 0.0, 0.0)));
                }
                _ if !live.is_empty() => {
                    let id = live[rng.random_range(0..live.len())];
                    assert!(t.update(&Tag::new(
                        id,
                        rng.random_range(-20.0..120.0),
                        rng.random_range(-20.0..120.0),
                    )));
                }
                _ => {}
            }
        }
        t.validate();
        assert_eq!(t.len(), live.len());
        for &id in &live {
            assert!(t.contains(&Tag::new(id, 0.0, 0.0)));
        }
    }

    #[test]
    fn stats_track_cells_and_items() {
        let mut t = tree();
        assert_eq!(t.stats(), TreeStats { cells: 1, items: 0 });
        for i in 0..25u32 {
            t.insert(Tag::new(i, (i % 5) as f32 * 19.0, (i / 5) as f32 * 19.0))
                .unwrap();
        }
        let stats = t.stats();
        assert_eq!(stats.items, 25);
        assert!(stats.cells > 1);
        assert_eq!(stats.items, t.len());
    }
}
