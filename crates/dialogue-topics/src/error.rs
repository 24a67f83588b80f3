//! Topic error types.

use thiserror::Error;

/// Errors raised while building topic components from configuration.
///
/// Classification and lifecycle transitions are total and never return these.
#[derive(Debug, Error)]
pub enum TopicsError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
