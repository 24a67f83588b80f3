//! Engine error types.

use thiserror::Error;

use dialogue_narrative::NarrativeError;
use dialogue_topics::TopicsError;

use crate::store::StoreError;

/// Errors raised while building the engine or persisting turns.
///
/// Processing a turn is itself total; only loading pattern tables and the
/// persistence round trip can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Pattern file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pattern file is not valid TOML or has the wrong shape
    #[error("Pattern parse error: {0}")]
    PatternParse(#[from] toml::de::Error),

    /// Pattern tables parsed but failed validation
    #[error("Invalid patterns: {0}")]
    InvalidPatterns(String),

    /// Topic configuration rejected
    #[error("Topic configuration error: {0}")]
    Topics(#[from] TopicsError),

    /// Narrative configuration rejected
    #[error("Narrative configuration error: {0}")]
    Narrative(#[from] NarrativeError),

    /// Session store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Every conditional write lost a race
    #[error("Session {session_id}: gave up after {attempts} conflicting writes")]
    RetriesExhausted { session_id: String, attempts: u32 },
}
