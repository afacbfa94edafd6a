// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Range queries over the tree.
//!
//! Every traversal dispatches three ways per visited cell: a cell fully
//! inside the region dumps its whole subtree with no per-item checks, a
//! partially overlapped cell filters its local items and recurses, and a
//! disjoint cell prunes. Results come in several shapes — a count, an
//! append into a caller's `Vec`, a visitor callback, a lazy iterator, or
//! a fill of a pre-sized buffer — all with identical membership.

use core::hash::Hash;

use crate::node::NodeIdx;
use crate::shape::{Region, Shape};
use crate::tree::QuadTree;

impl<S: Shape> QuadTree<S>
where
    S::Item: Clone + Eq + Hash,
{
    /// Lazily iterate items matching `region`.
    ///
    /// The iterator keeps two work stacks so that once a fully-contained
    /// subtree is entered, all of its items are produced before any
    /// partially overlapped cell resumes; the order therefore matches the
    /// eager variants.
    pub fn query<Q: Region<S>>(&self, region: Q) -> QueryIter<'_, S, Q> {
        QueryIter {
            tree: self,
            region,
            mixed: vec![self.root],
            full: Vec::new(),
            cursor: None,
        }
    }

    /// Count items matching `region`.
    pub fn query_count<Q: Region<S>>(&self, region: &Q) -> usize {
        self.count_from(self.root, region)
    }

    /// Append references to all items matching `region` onto `out`.
    pub fn query_into<'t, Q: Region<S>>(&'t self, region: &Q, out: &mut Vec<&'t S::Item>) {
        self.each_from(self.root, region, &mut |item| out.push(item));
    }

    /// Call `visit` for every item matching `region`.
    ///
    /// The closure can capture whatever accumulator state the caller
    /// needs; nothing is allocated per item.
    pub fn query_each<Q, F>(&self, region: &Q, mut visit: F)
    where
        Q: Region<S>,
        F: FnMut(&S::Item),
    {
        self.each_from(self.root, region, &mut visit);
    }

    /// Clone items matching `region` into `buf`, front to back, stopping
    /// when the buffer is full. Returns the number written; size the
    /// buffer with [`QuadTree::query_count`] to capture everything.
    pub fn query_fill<Q: Region<S>>(&self, region: &Q, buf: &mut [S::Item]) -> usize {
        let mut written = 0;
        self.fill_from(self.root, region, buf, &mut written);
        written
    }

    /// Iterate all stored items, in tree order.
    pub fn iter(&self) -> Items<'_, S> {
        Items {
            tree: self,
            stack: vec![self.root],
            cursor: None,
        }
    }

    // --- traversals ---

    fn count_from<Q: Region<S>>(&self, node: NodeIdx, region: &Q) -> usize {
        let n = self.node(node);
        if region.contains_cell(&n.cell) {
            return self.subtree_len(node);
        }
        if !region.intersects_cell(&n.cell) {
            return 0;
        }
        let mut count = n
            .items
            .iter()
            .filter(|&&e| region.intersects_item(&self.entry(e).item))
            .count();
        if let Some(children) = n.children {
            for c in children {
                count += self.count_from(c, region);
            }
        }
        count
    }

    fn each_from<'t, Q, F>(&'t self, node: NodeIdx, region: &Q, visit: &mut F)
    where
        Q: Region<S>,
        F: FnMut(&'t S::Item),
    {
        let n = self.node(node);
        if region.contains_cell(&n.cell) {
            return self.emit_all(node, visit);
        }
        if !region.intersects_cell(&n.cell) {
            return;
        }
        for &e in &n.items {
            let item = &self.entry(e).item;
            if region.intersects_item(item) {
                visit(item);
            }
        }
        if let Some(children) = n.children {
            for c in children {
                self.each_from(c, region, visit);
            }
        }
    }

    /// Emit a whole subtree without per-item filtering.
    fn emit_all<'t, F>(&'t self, node: NodeIdx, visit: &mut F)
    where
        F: FnMut(&'t S::Item),
    {
        let n = self.node(node);
        for &e in &n.items {
            let entry = self.entry(e);
            // A stale owner means the bucket changed under us; stop here.
            if entry.owner != node {
                break;
            }
            visit(&entry.item);
        }
        if let Some(children) = n.children {
            for c in children {
                self.emit_all(c, visit);
            }
        }
    }

    /// Returns false once the buffer is full, pruning the rest of the walk.
    fn fill_from<Q: Region<S>>(
        &self,
        node: NodeIdx,
        region: &Q,
        buf: &mut [S::Item],
        written: &mut usize,
    ) -> bool {
        let n = self.node(node);
        if region.contains_cell(&n.cell) {
            return self.fill_all(node, buf, written);
        }
        if !region.intersects_cell(&n.cell) {
            return true;
        }
        for &e in &n.items {
            let item = &self.entry(e).item;
            if region.intersects_item(item) {
                if *written == buf.len() {
                    return false;
                }
                buf[*written] = item.clone();
                *written += 1;
            }
        }
        if let Some(children) = n.children {
            for c in children {
                if !self.fill_from(c, region, buf, written) {
                    return false;
                }
            }
        }
        true
    }

    fn fill_all(&self, node: NodeIdx, buf: &mut [S::Item], written: &mut usize) -> bool {
        let n = self.node(node);
        for &e in &n.items {
            let entry = self.entry(e);
            if entry.owner != node {
                break;
            }
            if *written == buf.len() {
                return false;
            }
            buf[*written] = entry.item.clone();
            *written += 1;
        }
        if let Some(children) = n.children {
            for c in children {
                if !self.fill_all(c, buf, written) {
                    return false;
                }
            }
        }
        true
    }
}

struct Cursor {
    node: NodeIdx,
    at: usize,
    /// Whether items still need the per-item region check. Cells reached
    /// through a fully-contained ancestor skip it.
    filtered: bool,
}

/// Lazy query iterator returned by [`QuadTree::query`].
pub struct QueryIter<'t, S: Shape, Q: Region<S>>
where
    S::Item: Clone + Eq + Hash,
{
    tree: &'t QuadTree<S>,
    region: Q,
    /// Cells pending the three-way dispatch.
    mixed: Vec<NodeIdx>,
    /// Cells inside a fully-contained subtree; drained before `mixed`.
    full: Vec<NodeIdx>,
    cursor: Option<Cursor>,
}

impl<'t, S: Shape, Q: Region<S>> Iterator for QueryIter<'t, S, Q>
where
    S::Item: Clone + Eq + Hash,
{
    type Item = &'t S::Item;

    fn next(&mut self) -> Option<&'t S::Item> {
        let tree = self.tree;
        loop {
            if let Some(cur) = &mut self.cursor {
                let n = tree.node(cur.node);
                while cur.at < n.items.len() {
                    let entry = tree.entry(n.items[cur.at]);
                    cur.at += 1;
                    if cur.filtered {
                        if self.region.intersects_item(&entry.item) {
                            return Some(&entry.item);
                        }
                    } else {
                        if entry.owner != cur.node {
                            break;
                        }
                        return Some(&entry.item);
                    }
                }
                if let Some(children) = n.children {
                    // LIFO stacks, so push reversed to visit children in
                    // the same order as the recursive traversals.
                    if cur.filtered {
                        self.mixed.extend(children.iter().rev());
                    } else {
                        self.full.extend(children.iter().rev());
                    }
                }
                self.cursor = None;
            }
            if let Some(node) = self.full.pop() {
                self.cursor = Some(Cursor {
                    node,
                    at: 0,
                    filtered: false,
                });
                continue;
            }
            let node = self.mixed.pop()?;
            let cell = &tree.node(node).cell;
            if self.region.contains_cell(cell) {
                self.cursor = Some(Cursor {
                    node,
                    at: 0,
                    filtered: false,
                });
            } else if self.region.intersects_cell(cell) {
                self.cursor = Some(Cursor {
                    node,
                    at: 0,
                    filtered: true,
                });
            }
        }
    }
}

/// Iterator over every stored item, returned by [`QuadTree::iter`].
pub struct Items<'t, S: Shape>
where
    S::Item: Clone + Eq + Hash,
{
    tree: &'t QuadTree<S>,
    stack: Vec<NodeIdx>,
    cursor: Option<(NodeIdx, usize)>,
}

impl<'t, S: Shape> Iterator for Items<'t, S>
where
    S::Item: Clone + Eq + Hash,
{
    type Item = &'t S::Item;

    fn next(&mut self) -> Option<&'t S::Item> {
        let tree = self.tree;
        loop {
            if let Some((node, at)) = &mut self.cursor {
                let n = tree.node(*node);
                while *at < n.items.len() {
                    let entry = tree.entry(n.items[*at]);
                    *at += 1;
                    if entry.owner != *node {
                        break;
                    }
                    return Some(&entry.item);
                }
                if let Some(children) = n.children {
                    self.stack.extend(children.iter().rev());
                }
                self.cursor = None;
            }
            let node = self.stack.pop()?;
            self.cursor = Some((node, 0));
        }
    }
}
