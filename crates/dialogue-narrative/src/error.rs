//! Narrative error types.

use thiserror::Error;

/// Errors from building narrative components or fetching profiles.
///
/// Classification, identity normalization and directive composition are
/// total and never return these.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The profile collaborator could not supply a protocol mode
    #[error("Profile unavailable: {0}")]
    ProfileUnavailable(String),
}
