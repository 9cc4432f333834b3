//! Error handling module
//!
//! Defines custom error types for the Simworld server.
//!
//! Simulation failures are always entity-scoped: the tick loop logs a
//! [`SimError`] and moves on to the next entity. Only configuration and
//! persistence failures ever surface as a [`ServerError`] to the caller.

use std::io;

use thiserror::Error;

use crate::game::entity::EntityId;

/// Main error type for the Simworld server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Simulation errors (entity-scoped)
    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-entity simulation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid target {target} for entity {entity}")]
    InvalidTarget { entity: EntityId, target: EntityId },

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("No path from ({from_x:.1}, {from_y:.1}) to ({to_x:.1}, {to_y:.1})")]
    PathNotFound {
        from_x: f32,
        from_y: f32,
        to_x: f32,
        to_y: f32,
    },

    #[error("Invalid position ({x}, {y}) requested for entity {entity}")]
    InvalidPosition { entity: EntityId, x: f32, y: f32 },

    #[error("Entity {entity} stuck in obstacle at ({x:.1}, {y:.1})")]
    StuckInObstacle { entity: EntityId, x: f32, y: f32 },

    #[error("AI script failed for entity {entity}: {reason}")]
    ScriptFailure { entity: EntityId, reason: String },

    #[error("AI script for entity {entity} exceeded {budget_ms}ms budget")]
    ScriptTimeout { entity: EntityId, budget_ms: u64 },
}

impl SimError {
    /// Whether this error is an expected part of normal play (no warning needed)
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            SimError::InvalidTarget { .. }
                | SimError::EntityNotFound(_)
                | SimError::PathNotFound { .. }
        )
    }
}

/// Result type alias for Simworld operations
pub type Result<T> = std::result::Result<T, ServerError>;
