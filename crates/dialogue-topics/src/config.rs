//! Topic configuration and pattern tables.
//!
//! Keyword and phrase tables are plain data so they can be tuned from an
//! external file without touching the classification logic. The defaults
//! below are the compiled-in tables.

use serde::{Deserialize, Serialize};

use crate::error::TopicsError;
use crate::types::{ShiftType, TopicCategory, MAX_DEPTH};

/// Master configuration for topic tracking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Category keyword tables
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Shift phrase tables
    #[serde(default)]
    pub shift: ShiftConfig,

    /// Lifecycle thresholds and capacities
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl TopicsConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), TopicsError> {
        self.classifier.validate()?;
        self.shift.validate()?;
        self.lifecycle.validate()
    }
}

/// Keyword list for one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryKeywords {
    pub category: TopicCategory,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    fn new(category: TopicCategory, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Topic classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Keyword tables in tie-break order
    #[serde(default = "default_category_keywords")]
    pub categories: Vec<CategoryKeywords>,

    /// Confidence floor for any keyword hit
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f32,

    /// Weight of hits per word
    #[serde(default = "default_hit_weight")]
    pub hit_weight: f32,

    /// Upper bound on reported confidence
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f32,

    /// Confidence reported when nothing matched
    #[serde(default = "default_no_match_confidence")]
    pub no_match_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categories: default_category_keywords(),
            base_confidence: default_base_confidence(),
            hit_weight: default_hit_weight(),
            max_confidence: default_max_confidence(),
            no_match_confidence: default_no_match_confidence(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), TopicsError> {
        for table in &self.categories {
            if table.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(TopicsError::InvalidConfig(format!(
                    "empty keyword in {} table",
                    table.category
                )));
            }
        }
        for (name, value) in [
            ("base_confidence", self.base_confidence),
            ("max_confidence", self.max_confidence),
            ("no_match_confidence", self.no_match_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TopicsError::InvalidConfig(format!(
                    "{} must be 0.0-1.0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_category_keywords() -> Vec<CategoryKeywords> {
    vec![
        CategoryKeywords::new(
            TopicCategory::Training,
            &[
                "workout", "training", "train", "gym", "lift", "squat", "bench", "deadlift",
                "cardio", "reps", "exercise", "program",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Nutrition,
            &[
                "diet", "calorie", "protein", "carbs", "macros", "meal", "food", "eating",
                "bulking", "cutting", "fasting", "snack",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Supplements,
            &[
                "supplement", "creatine", "whey", "vitamin", "omega", "magnesium",
                "pre-workout", "caffeine", "zinc",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Sleep,
            &[
                "sleep", "slept", "insomnia", "nap", "bedtime", "melatonin", "circadian",
                "woke up",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Hormones,
            &[
                "testosterone", "estrogen", "cortisol", "hormone", "thyroid", "insulin",
                "libido",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Bloodwork,
            &[
                "bloodwork", "blood work", "blood test", "labs", "lab results", "cholesterol",
                "hematocrit", "ldl", "hdl",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Mindset,
            &[
                "motivation", "discipline", "mindset", "stress", "anxious", "confidence",
                "focus", "mental", "habit",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Recovery,
            &[
                "recovery", "recover", "sore", "deload", "injury", "injured", "rest day",
                "stretch", "mobility", "massage",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Lifestyle,
            &[
                "my job", "office", "travel", "family", "alcohol", "drinking", "social",
                "vacation", "commute", "weekend",
            ],
        ),
        CategoryKeywords::new(
            TopicCategory::Protocol,
            &[
                "protocol", "cycle", "dose", "dosage", "compound", "injection", "blast",
                "cruise",
            ],
        ),
    ]
}

fn default_base_confidence() -> f32 {
    0.3
}
fn default_hit_weight() -> f32 {
    2.0
}
fn default_max_confidence() -> f32 {
    0.95
}
fn default_no_match_confidence() -> f32 {
    0.2
}

/// One entry of the ordered phrase -> signal table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftPhrase {
    pub phrase: String,
    pub shift_type: ShiftType,
}

impl ShiftPhrase {
    fn new(phrase: &str, shift_type: ShiftType) -> Self {
        Self {
            phrase: phrase.to_string(),
            shift_type,
        }
    }
}

/// Shift signal detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftConfig {
    /// Ordered phrase table; first match wins
    #[serde(default = "default_shift_phrases")]
    pub phrases: Vec<ShiftPhrase>,

    /// Words that open a question when they lead the utterance
    #[serde(default = "default_interrogative_openers")]
    pub interrogative_openers: Vec<String>,

    /// Utterances at or above this length are never treated as bare questions
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            phrases: default_shift_phrases(),
            interrogative_openers: default_interrogative_openers(),
            max_question_length: default_max_question_length(),
        }
    }
}

impl ShiftConfig {
    pub fn validate(&self) -> Result<(), TopicsError> {
        if let Some(empty) = self.phrases.iter().find(|p| p.phrase.trim().is_empty()) {
            return Err(TopicsError::InvalidConfig(format!(
                "empty {} shift phrase",
                empty.shift_type.as_str()
            )));
        }
        if self.interrogative_openers.iter().any(|w| w.trim().is_empty()) {
            return Err(TopicsError::InvalidConfig(
                "empty interrogative opener".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_shift_phrases() -> Vec<ShiftPhrase> {
    use ShiftType::*;
    let mut phrases = Vec::new();
    for p in [
        "let's talk about",
        "lets talk about",
        "i want to talk about",
        "can we talk about",
        "can we discuss",
        "change the subject",
        "changing the subject",
        "switching gears",
        "different topic",
        "new topic",
        "moving on",
        "on another note",
        "let's switch to",
    ] {
        phrases.push(ShiftPhrase::new(p, Explicit));
    }
    for p in [
        "by the way",
        "btw",
        "speaking of",
        "that reminds me",
        "oh and",
        "another thing",
        "also wanted to",
        "while we're at it",
    ] {
        phrases.push(ShiftPhrase::new(p, Implicit));
    }
    for p in [
        "random thought",
        "off topic",
        "unrelated",
        "side note",
        "tangent",
    ] {
        phrases.push(ShiftPhrase::new(p, Tangent));
    }
    for p in ["what about", "how about", "what if", "have you heard"] {
        phrases.push(ShiftPhrase::new(p, Question));
    }
    phrases
}

fn default_interrogative_openers() -> Vec<String> {
    [
        "what", "how", "why", "when", "where", "who", "which", "should", "can", "could",
        "would", "is", "are", "do", "does", "did", "will",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_question_length() -> usize {
    100
}

/// Lifecycle thresholds and capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// A shift signal above this confidence forces a switch
    #[serde(default = "default_shift_switch_threshold")]
    pub shift_switch_threshold: f32,

    /// Category confidence above this switches away from a different primary
    #[serde(default = "default_category_switch_threshold")]
    pub category_switch_threshold: f32,

    /// Maximum paused topics kept for resumption
    #[serde(default = "default_max_secondary")]
    pub max_secondary: usize,

    /// Maximum archived topics retained
    #[serde(default = "default_max_archived")]
    pub max_archived: usize,

    /// Depth cap
    #[serde(default = "default_max_depth")]
    pub max_depth: f32,

    /// Depth gained when a paused topic is resumed
    #[serde(default = "default_resume_depth_step")]
    pub resume_depth_step: f32,

    /// Utterances longer than this deepen the primary topic
    #[serde(default = "default_continuation_length")]
    pub continuation_length: usize,

    /// Depth gained per long continuation
    #[serde(default = "default_continuation_depth_step")]
    pub continuation_depth_step: f32,

    /// Paused topics idle for less than this are follow-up candidates
    #[serde(default = "default_followup_window_minutes")]
    pub followup_window_minutes: i64,

    /// Paused topics must be deeper than this to be follow-up candidates
    #[serde(default = "default_followup_min_depth")]
    pub followup_min_depth: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shift_switch_threshold: default_shift_switch_threshold(),
            category_switch_threshold: default_category_switch_threshold(),
            max_secondary: default_max_secondary(),
            max_archived: default_max_archived(),
            max_depth: default_max_depth(),
            resume_depth_step: default_resume_depth_step(),
            continuation_length: default_continuation_length(),
            continuation_depth_step: default_continuation_depth_step(),
            followup_window_minutes: default_followup_window_minutes(),
            followup_min_depth: default_followup_min_depth(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), TopicsError> {
        if self.max_secondary == 0 {
            return Err(TopicsError::InvalidConfig(
                "max_secondary must be > 0".to_string(),
            ));
        }
        if !(0.0..=MAX_DEPTH).contains(&self.max_depth) {
            return Err(TopicsError::InvalidConfig(format!(
                "max_depth must be 0.0-{}, got {}",
                MAX_DEPTH, self.max_depth
            )));
        }
        if self.followup_window_minutes <= 0 {
            return Err(TopicsError::InvalidConfig(
                "followup_window_minutes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_shift_switch_threshold() -> f32 {
    0.6
}
fn default_category_switch_threshold() -> f32 {
    0.7
}
fn default_max_secondary() -> usize {
    3
}
fn default_max_archived() -> usize {
    10
}
fn default_max_depth() -> f32 {
    MAX_DEPTH
}
fn default_resume_depth_step() -> f32 {
    1.0
}
fn default_continuation_length() -> usize {
    50
}
fn default_continuation_depth_step() -> f32 {
    0.5
}
fn default_followup_window_minutes() -> i64 {
    30
}
fn default_followup_min_depth() -> f32 {
    1.0
}
