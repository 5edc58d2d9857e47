use glam::Vec2;

use std::collections::{HashMap, HashSet};

use crate::api::SpatialGridApi;
use crate::cell::{LooseCell, TightCell, TightLayout};
use crate::error::GridError;
use crate::types::*;

/// Two-resolution spatial grid: elastic loose cells indexed by fixed tight cells.
pub struct Grid {
    cfg: GridConfig,
    layout: TightLayout,

    loose_columns: usize,
    loose_rows: usize,
    loose_spacing: f32,

    pub(crate) loose: Vec<LooseCell>,
    pub(crate) tight: Vec<TightCell>,
    pub(crate) entities: HashMap<EntityId, Entity>,

    // Loose cells touched since the last refresh pass
    dirty: Vec<usize>,
    next_id: u64,
}

pub(crate) struct Entity {
    pub(crate) shape: Shape,
    pub(crate) aabb: Aabb,
    home: usize,
}

impl SpatialGridApi for Grid {
    fn new(cfg: GridConfig) -> Result<Self, GridError> {
        cfg.validate()?;
        let layout = TightLayout {
            origin: cfg.position,
            cell_size: cfg.cell_size,
            columns: cfg.size.x as usize,
            rows: cfg.size.y as usize,
        };
        let factor = cfg.loose_cell_factor as usize;
        let loose_columns = layout.columns.div_ceil(factor);
        let loose_rows = layout.rows.div_ceil(factor);
        let loose_spacing = cfg.cell_size * factor as f32;

        let mut tight = vec![TightCell::default(); layout.len()];
        let mut loose = Vec::with_capacity(loose_columns * loose_rows);
        for row in 0..loose_rows {
            for col in 0..loose_columns {
                let home = cfg.position
                    + Vec2::new(col as f32 + 0.5, row as f32 + 0.5) * loose_spacing;
                let cell = LooseCell::new(home);
                let at = layout.range_of(&cell.bounds());
                tight[layout.index(at.col0, at.row0)].insert(loose.len() as u32);
                loose.push(cell);
            }
        }
        log::debug!(
            "grid built: {}x{} tight cells of {}, {}x{} loose cells spaced {}",
            layout.columns,
            layout.rows,
            cfg.cell_size,
            loose_columns,
            loose_rows,
            loose_spacing
        );

        Ok(Self {
            cfg,
            layout,
            loose_columns,
            loose_rows,
            loose_spacing,
            loose,
            tight,
            entities: HashMap::new(),
            dirty: Vec::new(),
            next_id: 1,
        })
    }

    fn insert_rect(&mut self, position: Vec2, size: Vec2) -> EntityId {
        let id = self.insert_deferred(Shape::rect(position, size));
        self.refresh_dirty();
        id
    }

    fn insert_circle(&mut self, position: Vec2, radius: f32) -> EntityId {
        let id = self.insert_deferred(Shape::circle(position, radius));
        self.refresh_dirty();
        id
    }

    fn insert_point(&mut self, position: Vec2) -> EntityId {
        let id = self.insert_deferred(Shape::point(position));
        self.refresh_dirty();
        id
    }

    fn update_rect(&mut self, id: EntityId, position: Vec2, size: Vec2) -> Result<(), GridError> {
        self.update_deferred(id, Shape::rect(position, size))?;
        self.refresh_dirty();
        Ok(())
    }

    fn update_circle(&mut self, id: EntityId, position: Vec2, radius: f32) -> Result<(), GridError> {
        self.update_deferred(id, Shape::circle(position, radius))?;
        self.refresh_dirty();
        Ok(())
    }

    fn update_point(&mut self, id: EntityId, position: Vec2) -> Result<(), GridError> {
        self.update_deferred(id, Shape::point(position))?;
        self.refresh_dirty();
        Ok(())
    }

    fn remove(&mut self, id: EntityId) -> bool {
        let removed = self.remove_deferred(id);
        self.refresh_dirty();
        removed
    }

    fn has(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn get_entity_position(&self, id: EntityId) -> Result<Vec2, GridError> {
        Ok(self.entity(id)?.shape.center())
    }

    fn get_entity_size(&self, id: EntityId) -> Result<Vec2, GridError> {
        Ok(self.entity(id)?.shape.size())
    }

    fn get_entity_position_and_size(&self, id: EntityId) -> Result<(Vec2, Vec2), GridError> {
        let shape = self.entity(id)?.shape;
        Ok((shape.center(), shape.size()))
    }

    fn query_region(&self, region: Aabb) -> HashSet<EntityId> {
        self.region_query(&region)
    }

    fn query_rect(&self, center: Vec2, size: Vec2, filter: &QueryFilter) -> Vec<EntityId> {
        self.rect_query(center, size, filter)
    }

    fn query_circle(&self, center: Vec2, radius: f32, filter: &QueryFilter) -> Vec<EntityId> {
        self.circle_query(center, radius, filter)
    }

    fn query_point(&self, point: Vec2, filter: &QueryFilter) -> Vec<EntityId> {
        self.point_query(point, filter)
    }

    fn query_closest_to_point(&self, point: Vec2, filter: &QueryFilter) -> Option<EntityId> {
        self.closest_query(point, filter)
    }

    fn raycast(&self, origin: Vec2, direction: Vec2, filter: &QueryFilter) -> Option<RaycastHit> {
        self.ray_query(origin, direction, filter)
    }
}

impl Grid {
    pub fn config(&self) -> &GridConfig {
        &self.cfg
    }

    pub fn columns(&self) -> usize {
        self.layout.columns
    }

    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    /// Width and height of one tight cell.
    pub fn cell_size(&self) -> Vec2 {
        Vec2::splat(self.layout.cell_size)
    }

    pub fn loose_cell_count(&self) -> usize {
        self.loose.len()
    }

    /// World rect covered by the tight grid.
    pub fn world_bounds(&self) -> Aabb {
        self.layout.bounds()
    }

    pub(crate) fn layout(&self) -> &TightLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get_entity_shape(&self, id: EntityId) -> Result<Shape, GridError> {
        Ok(self.entity(id)?.shape)
    }

    /// Every live entity with its shape kind. Restartable: each call walks the
    /// registry afresh.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, ShapeKind)> + '_ {
        self.entities.iter().map(|(id, e)| (*id, e.shape.kind()))
    }

    /// Run several mutations with extent refresh deferred until `f` returns,
    /// so each touched loose cell is recomputed once.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Batch<'_>) -> R) -> R {
        let out = f(&mut Batch { grid: self });
        self.refresh_dirty();
        out
    }

    /// Return occupancy stats for the current index.
    pub fn debug_stats(&self) -> GridStats {
        GridStats {
            entities: self.entities.len(),
            loose_cells: self.loose.len(),
            occupied_loose_cells: self.loose.iter().filter(|c| !c.is_empty()).count(),
            tight_cells: self.tight.len(),
            tight_references: self.tight.iter().map(TightCell::len).sum(),
            max_tight_occupancy: self.tight.iter().map(TightCell::len).max().unwrap_or(0),
        }
    }

    fn entity(&self, id: EntityId) -> Result<&Entity, GridError> {
        self.entities.get(&id).ok_or(GridError::EntityNotFound(id))
    }

    /// Loose cell whose home spacing contains `position`, clamped to the grid.
    fn home_cell(&self, position: Vec2) -> usize {
        let local = (position - self.cfg.position) / self.loose_spacing;
        let clamp = |v: f32, n: usize| -> usize {
            if !(v >= 0.0) { 0 } else { (v.floor() as usize).min(n - 1) }
        };
        let col = clamp(local.x, self.loose_columns);
        let row = clamp(local.y, self.loose_rows);
        row * self.loose_columns + col
    }

    fn mark_dirty(&mut self, index: usize) {
        if !self.loose[index].is_dirty() {
            self.dirty.push(index);
        }
    }

    fn refresh_dirty(&mut self) {
        let mut dirty = std::mem::take(&mut self.dirty);
        for &index in &dirty {
            self.loose[index].refresh_extents(index as u32, &self.layout, &mut self.tight);
        }
        dirty.clear();
        self.dirty = dirty;
    }

    fn insert_deferred(&mut self, shape: Shape) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        let center = shape.center();
        if !self.layout.bounds().contains_point(center) {
            log::debug!("entity {id} inserted outside grid bounds at {center}; homing to border cell");
        }
        let home = self.home_cell(center);
        let aabb = shape.aabb();
        self.mark_dirty(home);
        self.loose[home].insert(id, aabb);
        self.entities.insert(id, Entity { shape, aabb, home });
        id
    }

    fn update_deferred(&mut self, id: EntityId, shape: Shape) -> Result<(), GridError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GridError::EntityNotFound(id))?;
        entity.shape = shape;
        entity.aabb = shape.aabb();
        let (home, aabb) = (entity.home, entity.aabb);
        self.mark_dirty(home);
        self.loose[home].update_member(id, aabb);
        Ok(())
    }

    fn remove_deferred(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.remove(&id) else {
            log::trace!("remove of unknown entity {id} ignored");
            return false;
        };
        self.mark_dirty(entity.home);
        self.loose[entity.home].remove(id);
        true
    }
}

/// Mutation handle passed to [`Grid::batch`]. Queries are unavailable while a
/// batch is open because tight membership is stale until it closes.
pub struct Batch<'g> {
    grid: &'g mut Grid,
}

impl Batch<'_> {
    pub fn insert_rect(&mut self, position: Vec2, size: Vec2) -> EntityId {
        self.grid.insert_deferred(Shape::rect(position, size))
    }

    pub fn insert_circle(&mut self, position: Vec2, radius: f32) -> EntityId {
        self.grid.insert_deferred(Shape::circle(position, radius))
    }

    pub fn insert_point(&mut self, position: Vec2) -> EntityId {
        self.grid.insert_deferred(Shape::point(position))
    }

    pub fn update_rect(&mut self, id: EntityId, position: Vec2, size: Vec2) -> Result<(), GridError> {
        self.grid.update_deferred(id, Shape::rect(position, size))
    }

    pub fn update_circle(&mut self, id: EntityId, position: Vec2, radius: f32) -> Result<(), GridError> {
        self.grid.update_deferred(id, Shape::circle(position, radius))
    }

    pub fn update_point(&mut self, id: EntityId, position: Vec2) -> Result<(), GridError> {
        self.grid.update_deferred(id, Shape::point(position))
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        self.grid.remove_deferred(id)
    }

    pub fn has(&self, id: EntityId) -> bool {
        self.grid.entities.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec2;

    fn grid() -> Grid {
        Grid::new(GridConfig::new(Vec2::ZERO, UVec2::new(10, 10), 2.0)).unwrap()
    }

    /// Every tight cell references exactly the loose cells whose bounds map onto it.
    fn assert_index_consistent(g: &Grid) {
        let layout = *g.layout();
        for (li, cell) in g.loose.iter().enumerate() {
            let range = layout.range_of(&cell.bounds());
            for row in 0..layout.rows {
                for col in 0..layout.columns {
                    let refs = g.tight[layout.index(col, row)]
                        .loose_cells()
                        .iter()
                        .filter(|&&i| i as usize == li)
                        .count();
                    let expected = usize::from(range.contains(col, row));
                    assert_eq!(refs, expected, "loose {li} at tight ({col},{row})");
                }
            }
        }
    }

    #[test]
    fn test_construction_dimensions() {
        let g = grid();
        assert_eq!(g.columns(), 10);
        assert_eq!(g.rows(), 10);
        assert_eq!(g.cell_size(), Vec2::new(2.0, 2.0));
        assert_eq!(g.loose_cell_count(), 25);
        assert_eq!(g.world_bounds(), Aabb::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(g.config().size, UVec2::new(10, 10));
        assert_eq!(g.config().loose_cell_factor, DEFAULT_LOOSE_CELL_FACTOR);
        // Loose homes sit at the centers of 2x2 tight blocks
        assert_eq!(g.loose[0].home(), Vec2::new(2.0, 2.0));
        assert_eq!(g.loose[24].home(), Vec2::new(18.0, 18.0));
        assert_eq!(g.loose[0].bounds(), Aabb::point(Vec2::new(2.0, 2.0)));
        assert_index_consistent(&g);
    }

    #[test]
    fn test_rejects_bad_config() {
        let bad = GridConfig::new(Vec2::ZERO, UVec2::new(10, 10), -1.0);
        assert!(matches!(Grid::new(bad), Err(GridError::InvalidConfig(_))));
    }

    #[test]
    fn test_home_cell_fixed_across_updates() {
        let mut g = grid();
        let id = g.insert_rect(Vec2::new(1.0, 1.0), Vec2::splat(1.0));
        let home = g.entities[&id].home;
        assert_eq!(home, 0);
        g.update_rect(id, Vec2::new(18.0, 18.0), Vec2::splat(1.0)).unwrap();
        assert_eq!(g.entities[&id].home, home);
        // Home cell stretched to follow the entity
        assert_eq!(g.loose[home].bounds(), Aabb::new(17.5, 17.5, 18.5, 18.5));
        assert_index_consistent(&g);
    }

    #[test]
    fn test_index_consistent_under_churn() {
        let mut g = grid();
        let mut ids = Vec::new();
        for i in 0..12 {
            let p = Vec2::new(i as f32 * 1.7, 19.0 - i as f32 * 1.3);
            ids.push(match i % 3 {
                0 => g.insert_rect(p, Vec2::new(1.5, 0.5)),
                1 => g.insert_circle(p, 0.8),
                _ => g.insert_point(p),
            });
        }
        assert_index_consistent(&g);
        for (step, id) in ids.iter().enumerate() {
            let p = Vec2::new((step * 7 % 20) as f32, (step * 3 % 20) as f32);
            g.update_circle(*id, p, 1.25).unwrap();
            assert_index_consistent(&g);
        }
        for id in ids.iter().step_by(2) {
            assert!(g.remove(*id));
        }
        assert_index_consistent(&g);
        assert_eq!(g.len(), 6);
    }

    #[test]
    fn test_unknown_ids() {
        let mut g = grid();
        let ghost = EntityId(999);
        assert_eq!(g.update_point(ghost, Vec2::ONE), Err(GridError::EntityNotFound(ghost)));
        assert_eq!(g.get_entity_position(ghost), Err(GridError::EntityNotFound(ghost)));
        assert!(g.get_entity_size(ghost).is_err());
        assert!(g.get_entity_position_and_size(ghost).is_err());
        assert!(!g.remove(ghost));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut g = grid();
        let id = g.insert_point(Vec2::new(3.0, 3.0));
        assert!(g.has(id));
        assert!(g.remove(id));
        assert!(!g.has(id));
        assert!(!g.remove(id));
        let next = g.insert_point(Vec2::new(3.0, 3.0));
        assert_ne!(next, id);
    }

    #[test]
    fn test_batch_defers_refresh() {
        let mut g = grid();
        let ids = g.batch(|b| {
            let a = b.insert_rect(Vec2::new(1.0, 1.0), Vec2::ONE);
            let c = b.insert_circle(Vec2::new(1.5, 1.5), 0.5);
            b.update_rect(a, Vec2::new(6.0, 1.0), Vec2::ONE).unwrap();
            assert!(g_dirty_pending(b));
            (a, c)
        });
        assert!(g.dirty.is_empty());
        assert!(g.loose.iter().all(|c| !c.is_dirty()));
        assert_eq!(g.loose[0].bounds(), Aabb::new(1.0, 0.5, 6.5, 2.0));
        assert!(g.has(ids.0) && g.has(ids.1));
        assert_index_consistent(&g);
    }

    fn g_dirty_pending(b: &Batch<'_>) -> bool {
        !b.grid.dirty.is_empty()
    }

    #[test]
    fn test_iter_is_restartable() {
        let mut g = grid();
        let r = g.insert_rect(Vec2::ONE, Vec2::ONE);
        let c = g.insert_circle(Vec2::ONE, 1.0);
        let p = g.insert_point(Vec2::ONE);
        let mut first: Vec<_> = g.iter().collect();
        first.sort_by_key(|(id, _)| *id);
        assert_eq!(first, vec![(r, ShapeKind::Rect), (c, ShapeKind::Circle), (p, ShapeKind::Point)]);
        assert_eq!(g.iter().count(), 3);
    }

    #[test]
    fn test_debug_stats() {
        let mut g = grid();
        g.insert_rect(Vec2::new(2.0, 2.0), Vec2::splat(3.0));
        let s = g.debug_stats();
        assert_eq!(s.entities, 1);
        assert_eq!(s.loose_cells, 25);
        assert_eq!(s.occupied_loose_cells, 1);
        assert_eq!(s.tight_cells, 100);
        // 24 empty loose cells at their home + one 2x2 footprint
        assert_eq!(s.tight_references, 24 + 4);
    }
}
