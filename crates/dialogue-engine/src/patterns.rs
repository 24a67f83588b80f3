//! Versioned pattern tables.
//!
//! Every keyword and phrase list the classifiers use can be overridden from a
//! TOML file, so tuning does not need a rebuild. The file must carry a
//! `version` key; sections that are left out keep the compiled-in defaults.
//!
//! ```toml
//! version = 2
//!
//! [narrative]
//! causality_phrases = ["because", "but", "had to"]
//!
//! [[topics.classifier.categories]]
//! category = "sleep"
//! keywords = ["sleep", "insomnia", "nap"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dialogue_narrative::ClassifierConfig as NarrativeConfig;
use dialogue_topics::TopicsConfig;

use crate::error::EngineError;

/// Version of the compiled-in tables.
pub const DEFAULT_PATTERNS_VERSION: u32 = 1;

/// Complete set of tunable tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternTables {
    /// Table revision, required in files
    pub version: u32,

    /// Topic keyword, shift phrase and lifecycle tables
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Narrative phrase tables
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

impl Default for PatternTables {
    fn default() -> Self {
        Self {
            version: DEFAULT_PATTERNS_VERSION,
            topics: TopicsConfig::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl PatternTables {
    /// Parse and validate tables from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let tables: PatternTables = toml::from_str(text)?;
        tables.validate()?;
        debug!(version = tables.version, "Parsed pattern tables");
        Ok(tables)
    }

    /// Load and validate tables from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let tables = Self::from_toml_str(&text)?;
        info!(path = %path.display(), version = tables.version, "Loaded pattern tables");
        Ok(tables)
    }

    /// Serialize to TOML, e.g. to seed an override file.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::InvalidPatterns(e.to_string()))
    }

    /// Validate every table.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version == 0 {
            return Err(EngineError::InvalidPatterns(
                "version must be >= 1".to_string(),
            ));
        }
        self.topics.validate()?;
        self.narrative.validate()?;
        Ok(())
    }
}
