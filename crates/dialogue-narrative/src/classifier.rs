//! Narrative classification for utterances.
//!
//! This module implements the `NarrativeClassifier` which decides whether a
//! user is making an excuse, venting, or honestly admitting a missed target.
//!
//! The decision procedure is ordered and the first applicable rule wins:
//! 1. Too short to judge: no verdict
//! 2. Admission without a causal connective: honest admission
//! 3. Frustration with no concrete miss and no causal connective: venting
//! 4. No causal connective: no verdict
//! 5. Causal connective plus a subtype keyword: excuse of that subtype
//! 6. Causal connective plus a concrete miss: rationalization
//! 7. Otherwise: no verdict
//!
//! An admission is taken at face value unless it is hedged with a causal
//! justification, and an excuse always requires a causal connective.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NarrativeError;
use crate::types::{ExcuseType, NarrativeAnalysis};

/// Keyword list for one excuse subtype.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExcuseKeywords {
    pub excuse_type: ExcuseType,
    pub keywords: Vec<String>,
}

impl ExcuseKeywords {
    fn new(excuse_type: ExcuseType, keywords: &[&str]) -> Self {
        Self {
            excuse_type,
            keywords: strings(keywords),
        }
    }
}

/// Configuration for narrative classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Contrition and ownership phrases
    #[serde(default = "default_admission_phrases")]
    pub admission_phrases: Vec<String>,

    /// Causal connectives that turn a statement into a justification
    #[serde(default = "default_causality_phrases")]
    pub causality_phrases: Vec<String>,

    /// Frustration openers
    #[serde(default = "default_venting_phrases")]
    pub venting_phrases: Vec<String>,

    /// Concrete-miss phrases
    #[serde(default = "default_failure_indicators")]
    pub failure_indicators: Vec<String>,

    /// Subtype keyword tables, scanned in order
    #[serde(default = "default_excuse_subtypes")]
    pub excuse_subtypes: Vec<ExcuseKeywords>,

    /// Utterances shorter than this (in characters) get no verdict
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Length of the claim used when no clause can be extracted
    #[serde(default = "default_claim_fallback_chars")]
    pub claim_fallback_chars: usize,

    #[serde(default = "default_admission_confidence")]
    pub admission_confidence: f32,

    #[serde(default = "default_venting_confidence")]
    pub venting_confidence: f32,

    #[serde(default = "default_excuse_confidence")]
    pub excuse_confidence: f32,

    /// Excuse confidence when a concrete miss was also named
    #[serde(default = "default_excuse_with_failure_confidence")]
    pub excuse_with_failure_confidence: f32,

    #[serde(default = "default_rationalization_confidence")]
    pub rationalization_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            admission_phrases: default_admission_phrases(),
            causality_phrases: default_causality_phrases(),
            venting_phrases: default_venting_phrases(),
            failure_indicators: default_failure_indicators(),
            excuse_subtypes: default_excuse_subtypes(),
            min_length: default_min_length(),
            claim_fallback_chars: default_claim_fallback_chars(),
            admission_confidence: default_admission_confidence(),
            venting_confidence: default_venting_confidence(),
            excuse_confidence: default_excuse_confidence(),
            excuse_with_failure_confidence: default_excuse_with_failure_confidence(),
            rationalization_confidence: default_rationalization_confidence(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), NarrativeError> {
        let lists = [
            ("admission_phrases", &self.admission_phrases),
            ("causality_phrases", &self.causality_phrases),
            ("venting_phrases", &self.venting_phrases),
            ("failure_indicators", &self.failure_indicators),
        ];
        for (name, list) in lists {
            check_phrases(name, list)?;
        }

        if self.excuse_subtypes.is_empty() {
            return Err(NarrativeError::InvalidConfig(
                "excuse_subtypes must not be empty".to_string(),
            ));
        }
        for table in &self.excuse_subtypes {
            if table.excuse_type == ExcuseType::Rationalization {
                return Err(NarrativeError::InvalidConfig(
                    "rationalization is assigned by rule and cannot have keywords".to_string(),
                ));
            }
            check_phrases(table.excuse_type.as_str(), &table.keywords)?;
        }

        let confidences = [
            ("admission_confidence", self.admission_confidence),
            ("venting_confidence", self.venting_confidence),
            ("excuse_confidence", self.excuse_confidence),
            (
                "excuse_with_failure_confidence",
                self.excuse_with_failure_confidence,
            ),
            ("rationalization_confidence", self.rationalization_confidence),
        ];
        for (name, value) in confidences {
            if !(0.0..=1.0).contains(&value) {
                return Err(NarrativeError::InvalidConfig(format!(
                    "{} must be 0.0-1.0, got {}",
                    name, value
                )));
            }
        }

        if self.claim_fallback_chars == 0 {
            return Err(NarrativeError::InvalidConfig(
                "claim_fallback_chars must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_phrases(name: &str, list: &[String]) -> Result<(), NarrativeError> {
    if list.is_empty() {
        return Err(NarrativeError::InvalidConfig(format!(
            "{} must not be empty",
            name
        )));
    }
    if list.iter().any(|p| p.trim().is_empty()) {
        return Err(NarrativeError::InvalidConfig(format!(
            "{} contains an empty phrase",
            name
        )));
    }
    Ok(())
}

/// Narrative classifier using ordered phrase tables.
///
/// Phrases match on word boundaries, so "but" does not fire inside "butter".
#[derive(Debug, Clone)]
pub struct NarrativeClassifier {
    config: ClassifierConfig,
    admission: Vec<String>,
    causality: Vec<String>,
    venting: Vec<String>,
    failure: Vec<String>,
    subtypes: Vec<(ExcuseType, Vec<String>)>,
    /// Captures the clause following the first causal connective
    clause: Option<Regex>,
}

impl NarrativeClassifier {
    /// Create a new classifier with the default phrase tables.
    pub fn new() -> Self {
        Self::build(ClassifierConfig::default())
    }

    /// Create a classifier with custom configuration.
    pub fn with_config(config: ClassifierConfig) -> Result<Self, NarrativeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ClassifierConfig) -> Self {
        let causality = normalize_all(&config.causality_phrases);

        let alternatives = causality
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"\b(?:{})\b[\s,:;-]*(?P<clause>[^.!?;]+)",
            alternatives
        );
        let clause = match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(error = %e, "Causal clause pattern rejected, claims fall back to prefix");
                None
            }
        };

        Self {
            admission: normalize_all(&config.admission_phrases),
            venting: normalize_all(&config.venting_phrases),
            failure: normalize_all(&config.failure_indicators),
            subtypes: config
                .excuse_subtypes
                .iter()
                .map(|t| (t.excuse_type, normalize_all(&t.keywords)))
                .collect(),
            causality,
            clause,
            config,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify an utterance.
    pub fn classify(&self, utterance: &str) -> NarrativeAnalysis {
        let text = normalize(utterance);
        if text.chars().count() < self.config.min_length {
            return NarrativeAnalysis::none();
        }

        let causal = first_match(&text, &self.causality);
        let failure = first_match(&text, &self.failure);
        let evidence = NarrativeAnalysis {
            has_causality: causal.is_some(),
            has_failure_indicator: failure.is_some(),
            ..NarrativeAnalysis::none()
        };

        let result = self.decide(&text, evidence);
        debug!(
            verdict = ?result.verdict(),
            excuse_type = ?result.excuse_type,
            causal = ?causal,
            failure = ?failure,
            confidence = result.confidence,
            "Narrative classification"
        );
        result
    }

    fn decide(&self, text: &str, evidence: NarrativeAnalysis) -> NarrativeAnalysis {
        let has_causality = evidence.has_causality;
        let has_failure = evidence.has_failure_indicator;

        if !has_causality {
            if let Some(phrase) = first_match(text, &self.admission) {
                return NarrativeAnalysis {
                    is_honest_admission: true,
                    original_claim: phrase.to_string(),
                    confidence: self.config.admission_confidence,
                    ..evidence
                };
            }
        }

        if !has_causality && !has_failure {
            if let Some(phrase) = first_match(text, &self.venting) {
                return NarrativeAnalysis {
                    is_venting: true,
                    original_claim: phrase.to_string(),
                    confidence: self.config.venting_confidence,
                    ..evidence
                };
            }
        }

        if !has_causality {
            return evidence;
        }

        for (excuse_type, keywords) in &self.subtypes {
            if let Some(keyword) = first_match(text, keywords) {
                let confidence = if has_failure {
                    self.config.excuse_with_failure_confidence
                } else {
                    self.config.excuse_confidence
                };
                return NarrativeAnalysis {
                    detected: true,
                    excuse_type: Some(*excuse_type),
                    original_claim: keyword.to_string(),
                    confidence,
                    ..evidence
                };
            }
        }

        if has_failure {
            return NarrativeAnalysis {
                detected: true,
                excuse_type: Some(ExcuseType::Rationalization),
                original_claim: self.extract_claim(text),
                confidence: self.config.rationalization_confidence,
                ..evidence
            };
        }

        evidence
    }

    /// The clause following the first causal connective, or a prefix of the
    /// utterance when none can be extracted.
    fn extract_claim(&self, text: &str) -> String {
        self.clause
            .as_ref()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.name("clause"))
            .map(|m| m.as_str().trim().trim_end_matches(',').trim().to_string())
            .filter(|clause| !clause.is_empty())
            .unwrap_or_else(|| text.chars().take(self.config.claim_fallback_chars).collect())
    }
}

impl Default for NarrativeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, trim and fold typographic apostrophes.
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}', '\u{02bc}'], "'")
}

fn normalize_all(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty())
        .collect()
}

/// First phrase of `phrases` present in `text` on word boundaries.
fn first_match<'a>(text: &str, phrases: &'a [String]) -> Option<&'a str> {
    phrases
        .iter()
        .find(|p| contains_phrase(text, p))
        .map(|p| p.as_str())
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_admission_phrases() -> Vec<String> {
    strings(&[
        "my bad",
        "my fault",
        "my mistake",
        "that's on me",
        "it's on me",
        "i messed up",
        "i screwed up",
        "i blew it",
        "i dropped the ball",
        "i slipped up",
        "i own it",
        "i own that",
        "no excuse",
        "no excuses",
        "i admit",
        "i have to admit",
        "i was lazy",
        "i chose not to",
        "sorry",
    ])
}

fn default_causality_phrases() -> Vec<String> {
    strings(&[
        "because",
        "cause",
        "cuz",
        "but",
        "had to",
        "couldn't",
        "could not",
        "couldnt",
        "that's why",
        "due to",
        "wasn't able to",
        "kept me from",
        "made me",
        "ended up",
    ])
}

fn default_venting_phrases() -> Vec<String> {
    strings(&[
        "ugh",
        "argh",
        "ffs",
        "fml",
        "so frustrated",
        "frustrated",
        "i hate",
        "sick of",
        "fed up",
        "what a day",
        "brutal day",
        "rough day",
        "long day",
        "bad day",
        "annoying",
        "can't stand",
        "so tired of",
        "exhausting",
    ])
}

fn default_failure_indicators() -> Vec<String> {
    strings(&[
        "skipped",
        "missed",
        "didn't train",
        "didn't go",
        "didn't work out",
        "didn't make it",
        "couldn't train",
        "couldn't make it",
        "no workout",
        "over my calories",
        "over my macros",
        "over target",
        "went over",
        "cheated",
        "cheat meal",
        "binged",
        "blew my diet",
        "off plan",
        "off track",
        "fell off",
        "ate junk",
        "fast food",
        "ordered pizza",
        "drank too much",
        "bailed",
    ])
}

fn default_excuse_subtypes() -> Vec<ExcuseKeywords> {
    vec![
        ExcuseKeywords::new(
            ExcuseType::Time,
            &[
                "no time",
                "didn't have time",
                "ran out of time",
                "busy",
                "deadline",
                "schedule",
                "running late",
                "meetings",
                "overtime",
                "long hours",
            ],
        ),
        ExcuseKeywords::new(
            ExcuseType::Energy,
            &[
                "tired",
                "exhausted",
                "no energy",
                "drained",
                "fatigued",
                "wiped out",
                "sleepy",
                "worn out",
                "slept badly",
                "didn't sleep",
            ],
        ),
        ExcuseKeywords::new(
            ExcuseType::Emotional,
            &[
                "stressed",
                "stress",
                "sad",
                "depressed",
                "upset",
                "anxious",
                "comfort",
                "bad mood",
                "emotional",
                "lonely",
                "deserved",
                "treat myself",
            ],
        ),
        ExcuseKeywords::new(
            ExcuseType::External,
            &[
                "work was",
                "my boss",
                "the kids",
                "my kids",
                "family",
                "my wife",
                "my husband",
                "my partner",
                "friends",
                "weather",
                "gym was closed",
                "traffic",
                "travel",
                "party",
                "wedding",
                "got sick",
                "was sick",
            ],
        ),
    ]
}

fn default_min_length() -> usize {
    5
}
fn default_claim_fallback_chars() -> usize {
    50
}
fn default_admission_confidence() -> f32 {
    0.8
}
fn default_venting_confidence() -> f32 {
    0.7
}
fn default_excuse_confidence() -> f32 {
    0.75
}
fn default_excuse_with_failure_confidence() -> f32 {
    0.9
}
fn default_rationalization_confidence() -> f32 {
    0.6
}
