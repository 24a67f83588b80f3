//! Correction directives for detected excuses.
//!
//! This module implements:
//! - `DirectiveComposer`: Builds a `Directive` from a narrative analysis and
//!   a resolved identity
//! - `Directive`: The ordered instruction template handed to the text generator
//! - Validation of the directive's structural contract
//!
//! A directive is a template of instructions, never user-facing prose.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ExcuseType, IdentityContext, NarrativeAnalysis, ProtocolMode};

/// Highest challenge level a directive can carry.
pub const MAX_CHALLENGE_LEVEL: u8 = 10;

/// Kind of instruction step, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Name the concrete, measurable deviation
    NameDeviation,
    /// Challenge the causal narrative with facts
    ChallengeNarrative,
    /// Hold the behaviour against the user's tier
    ReferenceIdentity,
    /// Ask for the process-level fix
    AskProcessFix,
    /// Close with an encouraging remark
    WarmClose,
}

impl StepKind {
    /// The canonical step sequence.
    pub fn canonical_order() -> &'static [StepKind] {
        &[
            StepKind::NameDeviation,
            StepKind::ChallengeNarrative,
            StepKind::ReferenceIdentity,
            StepKind::AskProcessFix,
            StepKind::WarmClose,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::NameDeviation => "name_deviation",
            StepKind::ChallengeNarrative => "challenge_narrative",
            StepKind::ReferenceIdentity => "reference_identity",
            StepKind::AskProcessFix => "ask_process_fix",
            StepKind::WarmClose => "warm_close",
        }
    }
}

/// One instruction for the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveStep {
    pub kind: StepKind,
    pub instruction: String,
}

/// The mandatory rule that warm tone resumes right after the correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceBackRule {
    pub required: bool,
    pub instruction: String,
}

impl Default for BounceBackRule {
    fn default() -> Self {
        Self {
            required: true,
            instruction: "Return to a warm, supportive tone immediately after the correction. \
                          Do not stay stern for the rest of the conversation."
                .to_string(),
        }
    }
}

/// Structured correction template for a detected excuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub excuse_type: ExcuseType,

    /// The claim the excuse rests on
    pub original_claim: String,

    pub protocol_mode: ProtocolMode,

    /// Tier label referenced in the identity step
    pub identity_label: String,

    /// Correction strictness (1-10)
    pub challenge_level: u8,

    /// Ordered instruction steps
    pub steps: Vec<DirectiveStep>,

    /// Empathic deflections the generator must not use
    pub forbidden_phrases: Vec<String>,

    pub bounce_back: BounceBackRule,
}

/// Severity of a contract issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Must be fixed
    Error,
    /// Should be fixed
    Warning,
}

/// A single contract issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveIssue {
    /// Requirement that was checked
    pub requirement: String,

    pub severity: IssueSeverity,

    pub message: String,
}

/// Result of directive validation.
#[derive(Debug, Clone)]
pub struct DirectiveValidation {
    /// Whether the directive meets every error-level requirement
    pub is_valid: bool,

    pub issues: Vec<DirectiveIssue>,
}

impl DirectiveValidation {
    /// Get errors only.
    pub fn errors(&self) -> Vec<&DirectiveIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .collect()
    }

    /// Get warnings only.
    pub fn warnings(&self) -> Vec<&DirectiveIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect()
    }
}

impl Directive {
    /// Validate the structural contract.
    pub fn validate(&self) -> DirectiveValidation {
        let mut issues = Vec::new();

        let kinds: Vec<StepKind> = self.steps.iter().map(|s| s.kind).collect();
        if kinds != StepKind::canonical_order() {
            issues.push(DirectiveIssue {
                requirement: "Step Order".to_string(),
                severity: IssueSeverity::Error,
                message: "Directive must carry the five steps in canonical order".to_string(),
            });
        }

        if self.steps.last().map(|s| s.kind) != Some(StepKind::WarmClose) {
            issues.push(DirectiveIssue {
                requirement: "Warm Close".to_string(),
                severity: IssueSeverity::Error,
                message: "The last step must close warmly".to_string(),
            });
        }

        if self.forbidden_phrases.is_empty() {
            issues.push(DirectiveIssue {
                requirement: "Forbidden Phrases".to_string(),
                severity: IssueSeverity::Error,
                message: "Directive must list the deflections the generator must avoid"
                    .to_string(),
            });
        }

        if !self.bounce_back.required || self.bounce_back.instruction.trim().is_empty() {
            issues.push(DirectiveIssue {
                requirement: "Bounce-Back Rule".to_string(),
                severity: IssueSeverity::Error,
                message: "Warm tone must resume right after the correction".to_string(),
            });
        }

        if !(1..=MAX_CHALLENGE_LEVEL).contains(&self.challenge_level) {
            issues.push(DirectiveIssue {
                requirement: "Challenge Level".to_string(),
                severity: IssueSeverity::Error,
                message: format!(
                    "Challenge level must be 1-{}, got {}",
                    MAX_CHALLENGE_LEVEL, self.challenge_level
                ),
            });
        }

        if self.steps.iter().any(|s| s.instruction.trim().is_empty()) {
            issues.push(DirectiveIssue {
                requirement: "Step Instructions".to_string(),
                severity: IssueSeverity::Warning,
                message: "Every step should carry an instruction".to_string(),
            });
        }

        if self.identity_label.trim().is_empty() {
            issues.push(DirectiveIssue {
                requirement: "Identity Reference".to_string(),
                severity: IssueSeverity::Warning,
                message: "Identity step should name the user's tier".to_string(),
            });
        }

        let is_valid = !issues.iter().any(|i| i.severity == IssueSeverity::Error);
        DirectiveValidation { is_valid, issues }
    }

    /// Render as a markdown section for the generator's prompt.
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();

        lines.push("## Correction Directive".to_string());
        lines.push(String::new());
        lines.push(format!("- **Excuse type:** {}", self.excuse_type.as_str()));
        lines.push(format!("- **Claim:** \"{}\"", self.original_claim));
        lines.push(format!(
            "- **Identity:** {} ({})",
            self.identity_label,
            self.protocol_mode.as_str()
        ));
        lines.push(format!(
            "- **Challenge level:** {}/{}",
            self.challenge_level, MAX_CHALLENGE_LEVEL
        ));

        lines.push(String::new());
        lines.push("### Steps".to_string());
        for (i, step) in self.steps.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, step.instruction));
        }

        lines.push(String::new());
        lines.push("### Never Say".to_string());
        for phrase in &self.forbidden_phrases {
            lines.push(format!("- \"{}\"", phrase));
        }

        lines.push(String::new());
        lines.push("### Bounce-Back".to_string());
        lines.push(self.bounce_back.instruction.clone());

        lines.join("\n")
    }
}

/// Builds correction directives for detected excuses.
#[derive(Debug, Clone)]
pub struct DirectiveComposer {
    forbidden_phrases: Vec<String>,
    bounce_back: BounceBackRule,
}

impl DirectiveComposer {
    /// Create a composer with the default forbidden-phrase list.
    pub fn new() -> Self {
        Self {
            forbidden_phrases: default_forbidden_phrases(),
            bounce_back: BounceBackRule::default(),
        }
    }

    /// Replace the forbidden-phrase list.
    pub fn with_forbidden_phrases(mut self, phrases: Vec<String>) -> Self {
        self.forbidden_phrases = phrases;
        self
    }

    pub fn forbidden_phrases(&self) -> &[String] {
        &self.forbidden_phrases
    }

    /// Compose a directive, or `None` when the analysis is not an excuse.
    pub fn compose(
        &self,
        analysis: &NarrativeAnalysis,
        identity: &IdentityContext,
    ) -> Option<Directive> {
        if !analysis.detected {
            return None;
        }
        let excuse_type = analysis.excuse_type.unwrap_or(ExcuseType::Rationalization);

        let challenge_level = if analysis.has_failure_indicator {
            identity.challenge_baseline.saturating_add(1)
        } else {
            identity.challenge_baseline
        }
        .clamp(1, MAX_CHALLENGE_LEVEL);

        let steps = vec![
            DirectiveStep {
                kind: StepKind::NameDeviation,
                instruction: format!(
                    "Name the concrete, measurable deviation behind \"{}\" without softening it.",
                    analysis.original_claim
                ),
            },
            DirectiveStep {
                kind: StepKind::ChallengeNarrative,
                instruction: format!(
                    "Challenge the {} narrative with facts. Do not validate the reason yet.",
                    excuse_type.narrative()
                ),
            },
            DirectiveStep {
                kind: StepKind::ReferenceIdentity,
                instruction: format!(
                    "Reference their identity explicitly: \"your {} standard is incompatible with {}\". {}",
                    identity.label,
                    excuse_type.behavior(),
                    identity.directive_fragment
                ),
            },
            DirectiveStep {
                kind: StepKind::AskProcessFix,
                instruction: "Ask what process change will prevent this next time.".to_string(),
            },
            DirectiveStep {
                kind: StepKind::WarmClose,
                instruction: "Close warmly with one encouraging remark.".to_string(),
            },
        ];

        debug!(
            excuse_type = excuse_type.as_str(),
            protocol_mode = identity.protocol_mode.as_str(),
            challenge_level = challenge_level,
            "Composed correction directive"
        );

        Some(Directive {
            excuse_type,
            original_claim: analysis.original_claim.clone(),
            protocol_mode: identity.protocol_mode,
            identity_label: identity.label.clone(),
            challenge_level,
            steps,
            forbidden_phrases: self.forbidden_phrases.clone(),
            bounce_back: self.bounce_back.clone(),
        })
    }
}

impl Default for DirectiveComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn default_forbidden_phrases() -> Vec<String> {
    [
        "that's totally understandable",
        "don't be so hard on yourself",
        "it happens to everyone",
        "life gets in the way",
        "no worries",
        "it's okay",
        "you deserve a break",
        "listen to your body",
        "one bad day doesn't matter",
        "be kind to yourself",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
