//! Core narrative types.
//!
//! This module defines the types shared by the narrative classifier, the
//! identity resolver and the directive composer:
//! - `ExcuseType`: Subtype of a detected excuse
//! - `NarrativeAnalysis`: Outcome of classifying one utterance
//! - `NarrativeVerdict`: The single label an analysis resolves to
//! - `ProtocolMode`: A user's declared intervention tier
//! - `IdentityContext`: The fixed record describing a tier

use serde::{Deserialize, Serialize};

/// Subtype of a detected excuse.
///
/// Subtypes are scanned in declaration order; `Rationalization` is the
/// catch-all for a causal justification of a concrete miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExcuseType {
    /// "no time", "busy", "deadline"
    #[serde(rename = "excuse_time")]
    Time,
    /// "tired", "exhausted", "no energy"
    #[serde(rename = "excuse_energy")]
    Energy,
    /// "stressed", "comfort", "bad mood"
    #[serde(rename = "excuse_emotional")]
    Emotional,
    /// "my boss", "kids", "gym was closed"
    #[serde(rename = "excuse_external")]
    External,
    /// Causal justification with no recognised subtype
    #[serde(rename = "rationalization")]
    Rationalization,
}

impl ExcuseType {
    /// Wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcuseType::Time => "excuse_time",
            ExcuseType::Energy => "excuse_energy",
            ExcuseType::Emotional => "excuse_emotional",
            ExcuseType::External => "excuse_external",
            ExcuseType::Rationalization => "rationalization",
        }
    }

    /// Short description of the narrative, used in directive steps.
    pub fn narrative(&self) -> &'static str {
        match self {
            ExcuseType::Time => "time-pressure",
            ExcuseType::Energy => "low-energy",
            ExcuseType::Emotional => "emotional-comfort",
            ExcuseType::External => "external-blame",
            ExcuseType::Rationalization => "rationalization",
        }
    }

    /// The behaviour an identity standard is held against.
    pub fn behavior(&self) -> &'static str {
        match self {
            ExcuseType::Time => "letting a busy schedule decide whether you train",
            ExcuseType::Energy => "letting low energy make the call",
            ExcuseType::Emotional => "using the plan as a casualty of a bad mood",
            ExcuseType::External => "handing control of your plan to other people",
            ExcuseType::Rationalization => "explaining away a missed target",
        }
    }
}

impl std::fmt::Display for ExcuseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single label a [`NarrativeAnalysis`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeVerdict {
    Excuse,
    Venting,
    HonestAdmission,
    None,
}

/// Outcome of classifying one utterance.
///
/// At most one of `detected`, `is_venting` and `is_honest_admission` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeAnalysis {
    /// True only for an excuse
    pub detected: bool,

    pub is_venting: bool,

    pub is_honest_admission: bool,

    /// Set only when `detected`
    pub excuse_type: Option<ExcuseType>,

    /// Extracted text the verdict rests on
    pub original_claim: String,

    /// Advisory confidence (0.0-1.0)
    pub confidence: f32,

    /// A causal connective was present
    #[serde(default)]
    pub has_causality: bool,

    /// A concrete-miss phrase was present
    #[serde(default)]
    pub has_failure_indicator: bool,
}

impl NarrativeAnalysis {
    /// An analysis with no verdict.
    pub fn none() -> Self {
        Self {
            detected: false,
            is_venting: false,
            is_honest_admission: false,
            excuse_type: None,
            original_claim: String::new(),
            confidence: 0.0,
            has_causality: false,
            has_failure_indicator: false,
        }
    }

    pub fn verdict(&self) -> NarrativeVerdict {
        if self.detected {
            NarrativeVerdict::Excuse
        } else if self.is_honest_admission {
            NarrativeVerdict::HonestAdmission
        } else if self.is_venting {
            NarrativeVerdict::Venting
        } else {
            NarrativeVerdict::None
        }
    }

    pub fn is_excuse(&self) -> bool {
        self.detected
    }
}

impl Default for NarrativeAnalysis {
    fn default() -> Self {
        Self::none()
    }
}

/// A user's self-declared intervention tier.
///
/// Calibrates how strict a correction directive is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    /// No assisted protocol; the safe default
    #[default]
    Baseline,
    /// Self-directed assisted protocol
    Assisted,
    /// Medically supervised protocol
    Supervised,
    /// Assisted protocol under supervision
    Combined,
}

impl ProtocolMode {
    pub fn all() -> &'static [ProtocolMode] {
        &[
            ProtocolMode::Baseline,
            ProtocolMode::Assisted,
            ProtocolMode::Supervised,
            ProtocolMode::Combined,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolMode::Baseline => "baseline",
            ProtocolMode::Assisted => "assisted",
            ProtocolMode::Supervised => "supervised",
            ProtocolMode::Combined => "combined",
        }
    }
}

impl std::fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed, hand-authored description of a protocol tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub protocol_mode: ProtocolMode,

    /// Name used when referencing the user's standard
    pub label: String,

    pub description: String,

    /// Correction strictness (1-10)
    pub challenge_baseline: u8,

    /// Tier-specific instruction appended to the identity step
    pub directive_fragment: String,
}
