use thiserror::Error;

use crate::types::EntityId;

/// Errors returned by [`Grid`](crate::Grid) operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    /// The id was never inserted or has already been removed.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// Construction-time configuration was rejected.
    #[error("invalid grid config: {0}")]
    InvalidConfig(String),
}
