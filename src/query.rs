//! Query engine: tight-cell broadphase, shape narrowphase, nearest and ray.

use glam::Vec2;
use ordered_float::OrderedFloat;

use std::collections::HashSet;

use crate::api::NarrowphaseApi;
use crate::grid::Grid;
use crate::narrowphase::Narrowphase;
use crate::types::*;

impl Grid {
    /// Unique loose cells referenced by the tight cells under `region`.
    fn candidate_loose_cells(&self, region: &Aabb) -> Vec<usize> {
        let layout = self.layout();
        let range = layout.range_of(region);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in range.row0..=range.row1 {
            for col in range.col0..=range.col1 {
                for &li in self.tight[layout.index(col, row)].loose_cells() {
                    if seen.insert(li) {
                        out.push(li as usize);
                    }
                }
            }
        }
        out
    }

    pub(crate) fn region_query(&self, region: &Aabb) -> HashSet<EntityId> {
        let mut out = HashSet::new();
        for li in self.candidate_loose_cells(region) {
            let cell = &self.loose[li];
            if !cell.intersects(region) {
                continue;
            }
            out.extend(
                cell.members()
                    .filter(|(_, aabb)| aabb.overlaps(region))
                    .map(|(id, _)| id),
            );
        }
        out
    }

    /// Narrow and filter region candidates, returning ids in ascending order.
    fn narrow(
        &self,
        region: &Aabb,
        filter: &QueryFilter,
        test: impl Fn(&Shape) -> bool,
    ) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .region_query(region)
            .into_iter()
            .filter(|id| self.entities.get(id).is_some_and(|e| test(&e.shape)))
            .filter(|id| filter.allows(*id))
            .collect();
        out.sort_unstable();
        out
    }

    pub(crate) fn rect_query(&self, center: Vec2, size: Vec2, filter: &QueryFilter) -> Vec<EntityId> {
        let region = Aabb::from_center_half(center, size * 0.5);
        // Region candidates are final; circles match on their bounding box
        self.narrow(&region, filter, |_| true)
    }

    pub(crate) fn circle_query(&self, center: Vec2, radius: f32, filter: &QueryFilter) -> Vec<EntityId> {
        let region = Aabb::from_center_half(center, Vec2::splat(radius));
        self.narrow(&region, filter, |shape| match *shape {
            Shape::Rect { .. } => Narrowphase::overlap_circle_aabb(center, radius, &shape.aabb()),
            Shape::Circle { center: c, radius: r } => {
                Narrowphase::overlap_circle_circle(center, radius, c, r)
            }
            Shape::Point { position } => Narrowphase::overlap_point_circle(position, center, radius),
        })
    }

    pub(crate) fn point_query(&self, point: Vec2, filter: &QueryFilter) -> Vec<EntityId> {
        let region = Aabb::point(point);
        self.narrow(&region, filter, |shape| match *shape {
            Shape::Rect { .. } => Narrowphase::overlap_point_aabb(point, &shape.aabb()),
            Shape::Circle { center, radius } => Narrowphase::overlap_point_circle(point, center, radius),
            Shape::Point { position } => position == point,
        })
    }

    /// Visit loose cells nearest-first by distance to their bounds and stop
    /// once that lower bound exceeds the best surface distance found.
    pub(crate) fn closest_query(&self, point: Vec2, filter: &QueryFilter) -> Option<EntityId> {
        let mut order: Vec<(OrderedFloat<f32>, usize)> = self
            .loose
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(i, cell)| {
                let bound = Narrowphase::distance_point_aabb(point, &cell.bounds());
                (OrderedFloat(bound), i)
            })
            .collect();
        order.sort_unstable();

        // (surface distance, center distance, id): smaller wins at each level
        let mut best: Option<(OrderedFloat<f32>, OrderedFloat<f32>, EntityId)> = None;
        for (bound, li) in order {
            // Strict: an equal bound may still win on center distance
            if best.is_some_and(|(surface, _, _)| bound > surface) {
                break;
            }
            for (id, _) in self.loose[li].members() {
                if !filter.allows(id) {
                    continue;
                }
                let Some(entity) = self.entities.get(&id) else { continue };
                let key = (
                    OrderedFloat(Narrowphase::surface_distance(point, &entity.shape)),
                    OrderedFloat(point.distance(entity.shape.center())),
                    id,
                );
                if best.is_none_or(|b| key < b) {
                    best = Some(key);
                }
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// DDA over the tight cells under `origin .. origin + direction`.
    ///
    /// Cells outside the grid resolve to the clamped border cell, which is
    /// where out-of-world bounds are registered. Traversal stops as soon as
    /// the best hit lies before the entry of the next cell.
    pub(crate) fn ray_query(&self, origin: Vec2, direction: Vec2, filter: &QueryFilter) -> Option<RaycastHit> {
        let length = direction.length();
        if !(length > 0.0 && length.is_finite() && origin.is_finite()) {
            return None;
        }
        let layout = self.layout();

        // Only walk the part of the ray inside the indexed extent
        let extent = self
            .loose
            .iter()
            .map(|c| c.bounds())
            .fold(layout.bounds(), Aabb::union)
            .expand(POINT_RAY_TOLERANCE);
        let (t_enter, t_exit) = Narrowphase::clip_segment(origin, direction, &extent)?;

        let cs = layout.cell_size;
        let start = (origin + direction * t_enter - layout.origin) / cs;
        let d = direction / cs;
        let (columns, rows) = (layout.columns as i64, layout.rows as i64);

        // Walk clamped cells; an off-grid stretch is a single border cell
        let mut col = (start.x.floor() as i64).clamp(0, columns - 1);
        let mut row = (start.y.floor() as i64).clamp(0, rows - 1);
        let step_x: i64 = if d.x > 0.0 { 1 } else if d.x < 0.0 { -1 } else { 0 };
        let step_y: i64 = if d.y > 0.0 { 1 } else if d.y < 0.0 { -1 } else { 0 };
        let next_crossing = |c: i64, step: i64, n: i64, s: f32, d: f32| -> f32 {
            let boundary = match step {
                1 if c < n - 1 => c + 1,
                -1 if c > 0 => c,
                _ => return f32::INFINITY,
            };
            t_enter + (boundary as f32 - s) / d
        };
        let mut t_max_x = next_crossing(col, step_x, columns, start.x, d.x);
        let mut t_max_y = next_crossing(row, step_y, rows, start.y, d.y);

        let mut best: Option<(RayHit, EntityId)> = None;
        let mut tested: HashSet<u32> = HashSet::new();
        let mut t_curr = t_enter;

        // Every step moves one clamped coordinate toward its far border
        for _ in 0..columns + rows {
            if t_curr > t_exit || best.is_some_and(|(h, _)| h.toi <= t_curr) {
                break;
            }
            for &li in self.tight[layout.index(col as usize, row as usize)].loose_cells() {
                if tested.insert(li) {
                    self.ray_test_cell(li as usize, origin, direction, filter, &mut best);
                }
            }

            if t_max_x.is_infinite() && t_max_y.is_infinite() {
                break;
            }
            if t_max_x < t_max_y {
                col += step_x;
                t_curr = t_max_x;
                t_max_x = next_crossing(col, step_x, columns, start.x, d.x);
            } else {
                row += step_y;
                t_curr = t_max_y;
                t_max_y = next_crossing(row, step_y, rows, start.y, d.y);
            }
        }

        best.map(|(hit, entity_id)| RaycastHit {
            entity_id,
            toi: hit.toi,
            distance: hit.toi * length,
            position: hit.contact,
            normal: hit.normal,
        })
    }

    fn ray_test_cell(
        &self,
        li: usize,
        origin: Vec2,
        direction: Vec2,
        filter: &QueryFilter,
        best: &mut Option<(RayHit, EntityId)>,
    ) {
        let cell = &self.loose[li];
        if cell.is_empty() {
            return;
        }
        let coarse = cell.bounds().expand(POINT_RAY_TOLERANCE);
        if !Narrowphase::ray_aabb(origin, direction, &coarse).is_some_and(|h| h.toi <= 1.0) {
            return;
        }
        for (id, _) in cell.members() {
            if !filter.allows(id) {
                continue;
            }
            let Some(entity) = self.entities.get(&id) else { continue };
            let hit = match entity.shape {
                Shape::Rect { .. } => Narrowphase::ray_aabb(origin, direction, &entity.aabb),
                Shape::Circle { center, radius } => Narrowphase::ray_circle(origin, direction, center, radius),
                Shape::Point { position } => {
                    Narrowphase::ray_point(origin, direction, position, POINT_RAY_TOLERANCE)
                }
            };
            let Some(hit) = hit else { continue };
            if hit.toi < 0.0 || hit.toi > 1.0 {
                continue;
            }
            match *best {
                Some((bh, bid)) if (hit.toi, id) >= (bh.toi, bid) => {}
                _ => *best = Some((hit, id)),
            }
        }
    }
}
