//! Cell storage for the two-resolution grid.
//!
//! Tight cells are a fixed fine index from world space to loose cells. Loose
//! cells own entities and stretch their bounds to cover them; when the bounds
//! change only the tight cells in the changed bands are touched.

use glam::Vec2;

use std::collections::HashMap;

use crate::types::{Aabb, EntityId};

/// Fixed fine-grained cell: the loose cells whose bounds currently cover it.
#[derive(Clone, Debug, Default)]
pub struct TightCell {
    loose: Vec<u32>,
}

impl TightCell {
    pub fn insert(&mut self, loose_index: u32) {
        debug_assert!(
            !self.loose.contains(&loose_index),
            "loose cell {loose_index} registered twice in one tight cell"
        );
        self.loose.push(loose_index);
    }

    /// Swap-remove the first occurrence. Order is not preserved.
    pub fn remove(&mut self, loose_index: u32) -> bool {
        match self.loose.iter().position(|&i| i == loose_index) {
            Some(pos) => {
                self.loose.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn loose_cells(&self) -> &[u32] {
        &self.loose
    }

    pub fn len(&self) -> usize {
        self.loose.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loose.is_empty()
    }
}

/// Inclusive range of tight-cell columns and rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub col0: usize,
    pub row0: usize,
    pub col1: usize,
    pub row1: usize,
}

impl CellRange {
    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.col0 && col <= self.col1 && row >= self.row0 && row <= self.row1
    }

    /// Visit every cell of `self` that is not in `other`, each exactly once.
    ///
    /// Columns outside `other` are walked full height; columns shared with
    /// `other` only walk the row bands below and above it.
    pub fn for_each_outside(&self, other: &CellRange, mut f: impl FnMut(usize, usize)) {
        for col in self.col0..=self.col1 {
            if col < other.col0 || col > other.col1 {
                for row in self.row0..=self.row1 {
                    f(col, row);
                }
                continue;
            }
            for row in self.row0..other.row0.min(self.row1 + 1) {
                f(col, row);
            }
            for row in (other.row1 + 1).max(self.row0)..=self.row1 {
                f(col, row);
            }
        }
    }
}

/// Mapping between world coordinates and tight-cell indices.
#[derive(Copy, Clone, Debug)]
pub struct TightLayout {
    pub origin: Vec2,
    pub cell_size: f32,
    pub columns: usize,
    pub rows: usize,
}

impl TightLayout {
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.columns + col
    }

    /// Column of `x`, clamped to the grid.
    pub fn column_of(&self, x: f32) -> usize {
        clamp_axis((x - self.origin.x) / self.cell_size, self.columns)
    }

    /// Row of `y`, clamped to the grid.
    pub fn row_of(&self, y: f32) -> usize {
        clamp_axis((y - self.origin.y) / self.cell_size, self.rows)
    }

    pub fn range_of(&self, aabb: &Aabb) -> CellRange {
        CellRange {
            col0: self.column_of(aabb.left),
            row0: self.row_of(aabb.bottom),
            col1: self.column_of(aabb.right),
            row1: self.row_of(aabb.top),
        }
    }

    /// World rect covered by the tight cells.
    pub fn bounds(&self) -> Aabb {
        let extent = Vec2::new(self.columns as f32, self.rows as f32) * self.cell_size;
        Aabb::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + extent.x,
            self.origin.y + extent.y,
        )
    }
}

fn clamp_axis(v: f32, n: usize) -> usize {
    // NaN and negatives land in cell 0; float-to-int casts saturate on the high side.
    if !(v >= 0.0) {
        return 0;
    }
    (v.floor() as usize).min(n - 1)
}

/// Elastic cell anchored at a home point. Its bounds are the union of its
/// members' AABBs, or the home point when empty.
#[derive(Clone, Debug)]
pub struct LooseCell {
    home: Vec2,
    bounds: Aabb,
    dirty: bool,
    members: HashMap<EntityId, Aabb>,
}

impl LooseCell {
    pub fn new(home: Vec2) -> Self {
        Self {
            home,
            bounds: Aabb::point(home),
            dirty: false,
            members: HashMap::new(),
        }
    }

    pub fn home(&self) -> Vec2 {
        self.home
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = (EntityId, &Aabb)> + '_ {
        self.members.iter().map(|(id, aabb)| (*id, aabb))
    }

    pub fn insert(&mut self, id: EntityId, aabb: Aabb) {
        self.members.insert(id, aabb);
        self.dirty = true;
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let removed = self.members.remove(&id).is_some();
        self.dirty = true;
        removed
    }

    pub fn update_member(&mut self, id: EntityId, aabb: Aabb) {
        debug_assert!(self.members.contains_key(&id), "update of non-member {id}");
        self.members.insert(id, aabb);
        self.dirty = true;
    }

    /// Strict overlap against the current bounds; shared edges do not count.
    pub fn intersects(&self, region: &Aabb) -> bool {
        self.bounds.overlaps(region)
    }

    fn compute_bounds(&self) -> Aabb {
        self.members
            .values()
            .copied()
            .reduce(Aabb::union)
            .unwrap_or_else(|| Aabb::point(self.home))
    }

    /// Recompute bounds if dirty and move this cell's registration between
    /// tight cells for the bands that changed. Returns whether the tight
    /// registration changed.
    pub fn refresh_extents(&mut self, index: u32, layout: &TightLayout, tight: &mut [TightCell]) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        let old = layout.range_of(&self.bounds);
        self.bounds = self.compute_bounds();
        let new = layout.range_of(&self.bounds);
        if old == new {
            return false;
        }

        let mut removed = 0usize;
        let mut added = 0usize;
        old.for_each_outside(&new, |col, row| {
            tight[layout.index(col, row)].remove(index);
            removed += 1;
        });
        new.for_each_outside(&old, |col, row| {
            tight[layout.index(col, row)].insert(index);
            added += 1;
        });
        log::trace!(
            "loose cell {index} reindexed: -{removed} +{added} tight cells ({old:?} -> {new:?})"
        );
        true
    }
}
