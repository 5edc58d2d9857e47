use glam::Vec2;

use std::collections::HashSet;

use crate::error::GridError;
use crate::types::*;

/// Public API contract for the loose/tight spatial grid.
pub trait SpatialGridApi {
    /// Construct an empty grid; fails fast on malformed configuration.
    fn new(cfg: GridConfig) -> Result<Self, GridError>
    where
        Self: Sized;

    // --- Mutation ----------------------------------------------------------

    /// Insert a rect (center + full width/height) and return its handle.
    fn insert_rect(&mut self, position: Vec2, size: Vec2) -> EntityId;

    /// Insert a circle and return its handle.
    fn insert_circle(&mut self, position: Vec2, radius: f32) -> EntityId;

    /// Insert a point and return its handle.
    fn insert_point(&mut self, position: Vec2) -> EntityId;

    /// Move/resize an entity as a rect. Its home cell never changes.
    fn update_rect(&mut self, id: EntityId, position: Vec2, size: Vec2) -> Result<(), GridError>;

    /// Move/resize an entity as a circle.
    fn update_circle(&mut self, id: EntityId, position: Vec2, radius: f32) -> Result<(), GridError>;

    /// Move an entity as a point.
    fn update_point(&mut self, id: EntityId, position: Vec2) -> Result<(), GridError>;

    /// Remove an entity. Returns `false` (not an error) for unknown ids.
    fn remove(&mut self, id: EntityId) -> bool;

    // --- Lookup ------------------------------------------------------------

    fn has(&self, id: EntityId) -> bool;

    fn get_entity_position(&self, id: EntityId) -> Result<Vec2, GridError>;

    fn get_entity_size(&self, id: EntityId) -> Result<Vec2, GridError>;

    fn get_entity_position_and_size(&self, id: EntityId) -> Result<(Vec2, Vec2), GridError>;

    // --- Queries -----------------------------------------------------------

    /// All entities whose AABB overlaps `region` (no filtering, no narrowphase).
    fn query_region(&self, region: Aabb) -> HashSet<EntityId>;

    /// Entities overlapping the rect `center` ± `size / 2`.
    fn query_rect(&self, center: Vec2, size: Vec2, filter: &QueryFilter) -> Vec<EntityId>;

    /// Entities overlapping the given circle.
    fn query_circle(&self, center: Vec2, radius: f32, filter: &QueryFilter) -> Vec<EntityId>;

    /// Entities containing `point` (exact equality for point entities).
    fn query_point(&self, point: Vec2, filter: &QueryFilter) -> Vec<EntityId>;

    /// Nearest entity by surface distance, then center distance, then id.
    fn query_closest_to_point(&self, point: Vec2, filter: &QueryFilter) -> Option<EntityId>;

    /// Closest hit along `origin .. origin + direction`.
    fn raycast(&self, origin: Vec2, direction: Vec2, filter: &QueryFilter) -> Option<RaycastHit>;
}

/// Narrowphase primitive tests used by the query engine.
pub trait NarrowphaseApi {
    // Rays ------------------------------------------------------------------

    fn ray_aabb(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<RayHit>;
    fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, r: f32) -> Option<RayHit>;
    fn ray_point(origin: Vec2, dir: Vec2, p: Vec2, tolerance: f32) -> Option<RayHit>;

    // Overlaps --------------------------------------------------------------

    fn overlap_point_aabb(p: Vec2, aabb: &Aabb) -> bool;
    fn overlap_point_circle(p: Vec2, c: Vec2, r: f32) -> bool;
    fn overlap_circle_aabb(c: Vec2, r: f32, aabb: &Aabb) -> bool;
    fn overlap_circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> bool;

    // Distances -------------------------------------------------------------

    /// Distance from `p` to the box, zero inside or on the boundary.
    fn distance_point_aabb(p: Vec2, aabb: &Aabb) -> f32;
    /// Distance from `p` to the circle, zero inside or on the boundary.
    fn distance_point_circle(p: Vec2, c: Vec2, r: f32) -> f32;
}
