//! loosegrid: two-resolution spatial grid (loose cells over a tight index) for 2D queries

pub mod types;
pub mod error;
pub mod api;
pub mod cell;
pub mod grid;
pub mod narrowphase;
mod query;

pub use crate::types::*;
pub use crate::error::GridError;
pub use crate::api::*;
pub use crate::grid::{Batch, Grid};
