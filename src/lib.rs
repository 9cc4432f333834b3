//! Simworld Game Server Library
//!
//! This library provides the authoritative simulation of a persistent world in
//! which players and monsters move, fight and progress on a fixed tick.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - World registry, navigation, per-tick systems and the game loop
//! - `state` - Handles shared with collaborators outside the tick

pub mod config;
pub mod error;
pub mod game;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, ServerError, SimError};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
