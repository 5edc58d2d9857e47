use glam::{UVec2, Vec2};

use std::collections::HashSet;
use std::fmt;

use crate::error::GridError;

/// Loose cells span this many tight cells per axis unless configured otherwise.
pub const DEFAULT_LOOSE_CELL_FACTOR: u32 = 2;

/// Perpendicular distance within which a ray counts as passing through a point entity.
pub const POINT_RAY_TOLERANCE: f32 = 1e-4;

/// Handle for an entity stored in the grid. Assigned monotonically, never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned bounding box stored as (left, bottom, right, top).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Aabb {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self { left, bottom, right, top }
    }

    pub fn from_center_half(center: Vec2, half_extents: Vec2) -> Self {
        let min = center - half_extents;
        let max = center + half_extents;
        Self::new(min.x, min.y, max.x, max.y)
    }

    /// Degenerate box at `p`.
    pub fn point(p: Vec2) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.left, self.bottom)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.right, self.top)
    }

    pub fn center(&self) -> Vec2 {
        (self.min() + self.max()) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max() - self.min()
    }

    pub fn union(self, other: Aabb) -> Self {
        Self::new(
            self.left.min(other.left),
            self.bottom.min(other.bottom),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(self, margin: f32) -> Self {
        Self::new(
            self.left - margin,
            self.bottom - margin,
            self.right + margin,
            self.top + margin,
        )
    }

    /// Open-interval overlap: boxes that only share an edge do not overlap.
    ///
    /// On an axis where either box has zero extent the test is closed instead,
    /// otherwise points could never match anything.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        axis_overlaps(self.left, self.right, other.left, other.right)
            && axis_overlaps(self.bottom, self.top, other.bottom, other.top)
    }

    /// Closed containment test (edges count as inside).
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }
}

fn axis_overlaps(a0: f32, a1: f32, b0: f32, b1: f32) -> bool {
    if a0 == a1 || b0 == b1 {
        a0 <= b1 && b0 <= a1
    } else {
        a0 < b1 && b0 < a1
    }
}

/// Geometry of one entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    /// Centered axis-aligned box (half extents along X/Y).
    Rect { center: Vec2, half_extents: Vec2 },
    /// Centered circle.
    Circle { center: Vec2, radius: f32 },
    /// Mathematical point.
    Point { position: Vec2 },
}

impl Shape {
    /// Rect from a center and a full width/height.
    pub fn rect(center: Vec2, size: Vec2) -> Self {
        Shape::Rect { center, half_extents: size * 0.5 }
    }

    pub fn circle(center: Vec2, radius: f32) -> Self {
        Shape::Circle { center, radius }
    }

    pub fn point(position: Vec2) -> Self {
        Shape::Point { position }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Rect { .. } => ShapeKind::Rect,
            Shape::Circle { .. } => ShapeKind::Circle,
            Shape::Point { .. } => ShapeKind::Point,
        }
    }

    /// Defining center: rect center, circle center, or the point itself.
    pub fn center(&self) -> Vec2 {
        match *self {
            Shape::Rect { center, .. } => center,
            Shape::Circle { center, .. } => center,
            Shape::Point { position } => position,
        }
    }

    /// Full extent of the shape's AABB (diameter for circles, zero for points).
    pub fn size(&self) -> Vec2 {
        match *self {
            Shape::Rect { half_extents, .. } => half_extents * 2.0,
            Shape::Circle { radius, .. } => Vec2::splat(radius * 2.0),
            Shape::Point { .. } => Vec2::ZERO,
        }
    }

    pub fn aabb(&self) -> Aabb {
        match *self {
            Shape::Rect { center, half_extents } => Aabb::from_center_half(center, half_extents),
            Shape::Circle { center, radius } => Aabb::from_center_half(center, Vec2::splat(radius)),
            Shape::Point { position } => Aabb::point(position),
        }
    }
}

/// Shape discriminator yielded by [`Grid::iter`](crate::Grid::iter).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rect,
    Circle,
    Point,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Point => "point",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `QueryFilter::filter_list` is applied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterType {
    /// Only listed ids pass.
    #[default]
    Include,
    /// Listed ids are rejected.
    Exclude,
}

/// Post-narrowphase filtering shared by every query.
///
/// Both the list and the custom predicate must accept an id for it to be
/// reported. The default filter accepts everything.
#[derive(Default)]
pub struct QueryFilter<'a> {
    pub filter_list: Option<HashSet<EntityId>>,
    pub filter_type: FilterType,
    pub custom_filter: Option<Box<dyn Fn(EntityId) -> bool + 'a>>,
}

impl<'a> QueryFilter<'a> {
    /// Accept every entity.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn include(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            filter_list: Some(ids.into_iter().collect()),
            filter_type: FilterType::Include,
            custom_filter: None,
        }
    }

    pub fn exclude(ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            filter_list: Some(ids.into_iter().collect()),
            filter_type: FilterType::Exclude,
            custom_filter: None,
        }
    }

    pub fn with_custom(mut self, f: impl Fn(EntityId) -> bool + 'a) -> Self {
        self.custom_filter = Some(Box::new(f));
        self
    }

    pub fn allows(&self, id: EntityId) -> bool {
        if let Some(list) = &self.filter_list {
            let listed = list.contains(&id);
            let pass = match self.filter_type {
                FilterType::Include => listed,
                FilterType::Exclude => !listed,
            };
            if !pass {
                return false;
            }
        }
        self.custom_filter.as_ref().is_none_or(|f| f(id))
    }
}

/// Primitive ray test result; `toi` is the fraction of `dir` travelled.
#[derive(Copy, Clone, Debug)]
pub struct RayHit {
    pub toi: f32,
    /// Surface normal at the hit (zero when the ray starts inside).
    pub normal: Vec2,
    pub contact: Vec2,
}

/// Closest entity hit reported by [`Grid::raycast`](crate::SpatialGridApi::raycast).
#[derive(Copy, Clone, Debug)]
pub struct RaycastHit {
    pub entity_id: EntityId,
    /// Fraction in [0,1] of the ray direction at which the hit occurs.
    pub toi: f32,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub position: Vec2,
    pub normal: Vec2,
}

/// Construction parameters for a [`Grid`](crate::Grid).
#[derive(Clone, Debug)]
pub struct GridConfig {
    /// World-space position of the grid's bottom-left corner.
    pub position: Vec2,
    /// Tight cells along X (columns) and Y (rows).
    pub size: UVec2,
    /// Width and height of one tight cell in world units.
    pub cell_size: f32,
    /// Tight cells per loose cell along each axis (≥ 1).
    pub loose_cell_factor: u32,
}

impl GridConfig {
    pub fn new(position: Vec2, size: UVec2, cell_size: f32) -> Self {
        Self {
            position,
            size,
            cell_size,
            loose_cell_factor: DEFAULT_LOOSE_CELL_FACTOR,
        }
    }

    pub fn with_loose_cell_factor(mut self, factor: u32) -> Self {
        self.loose_cell_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(GridError::InvalidConfig(format!(
                "cell_size must be finite and positive, got {}",
                self.cell_size
            )));
        }
        if self.size.x == 0 || self.size.y == 0 {
            return Err(GridError::InvalidConfig(format!(
                "size must have at least one column and row, got {}x{}",
                self.size.x, self.size.y
            )));
        }
        if !self.position.is_finite() {
            return Err(GridError::InvalidConfig(format!(
                "position must be finite, got {}",
                self.position
            )));
        }
        if self.loose_cell_factor == 0 {
            return Err(GridError::InvalidConfig(
                "loose_cell_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Occupancy snapshot for tuning cell sizes.
#[derive(Copy, Clone, Debug, Default)]
pub struct GridStats {
    pub entities: usize,
    pub loose_cells: usize,
    /// Loose cells with at least one member.
    pub occupied_loose_cells: usize,
    pub tight_cells: usize,
    /// Sum of loose-cell references over all tight cells.
    pub tight_references: usize,
    pub max_tight_occupancy: usize,
}
