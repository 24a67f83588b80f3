//! Error types for the dialogue engine.

use thiserror::Error;

/// Workspace-level error type.
///
/// Classification and topic transitions never fail; this type only covers
/// loading settings.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
