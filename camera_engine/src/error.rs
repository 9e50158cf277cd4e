// Typed errors with thiserror. Surface meaningful messages to JS.
// Lookup failures are always handled inside the controller; only interruptions reach callers.

use thiserror::Error;

use crate::types::CameraCommand;

/// Engine error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown row '{0}'")]
    UnknownRow(String),

    #[error("Unknown tile '{tile}' in row '{row}'")]
    UnknownTile { row: String, tile: String },

    #[error("Tile index {index} out of range for row '{row}' ({len} items)")]
    TileIndexOutOfRange { row: String, index: usize, len: usize },

    #[error("Camera transition interrupted: {command:?}")]
    TransitionInterrupted { command: CameraCommand },
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
