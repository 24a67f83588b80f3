//! Topic data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unique identifier for a topic.
pub type TopicId = String;

/// Maximum conversational depth a topic can reach.
pub const MAX_DEPTH: f32 = 3.0;

/// Closed set of subjects a coaching conversation can be about.
///
/// Declaration order matters: classification ties are broken in this order.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Training,
    Nutrition,
    Supplements,
    Sleep,
    Hormones,
    Bloodwork,
    Mindset,
    Recovery,
    Lifestyle,
    Protocol,
    #[default]
    General,
}

impl TopicCategory {
    /// All categories in declaration order.
    pub fn all() -> &'static [TopicCategory] {
        &[
            TopicCategory::Training,
            TopicCategory::Nutrition,
            TopicCategory::Supplements,
            TopicCategory::Sleep,
            TopicCategory::Hormones,
            TopicCategory::Bloodwork,
            TopicCategory::Mindset,
            TopicCategory::Recovery,
            TopicCategory::Lifestyle,
            TopicCategory::Protocol,
            TopicCategory::General,
        ]
    }

    /// Storage/wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicCategory::Training => "training",
            TopicCategory::Nutrition => "nutrition",
            TopicCategory::Supplements => "supplements",
            TopicCategory::Sleep => "sleep",
            TopicCategory::Hormones => "hormones",
            TopicCategory::Bloodwork => "bloodwork",
            TopicCategory::Mindset => "mindset",
            TopicCategory::Recovery => "recovery",
            TopicCategory::Lifestyle => "lifestyle",
            TopicCategory::Protocol => "protocol",
            TopicCategory::General => "general",
        }
    }

    /// Human-readable label used as the prefix of topic names.
    pub fn label(&self) -> &'static str {
        match self {
            TopicCategory::Training => "Training",
            TopicCategory::Nutrition => "Nutrition",
            TopicCategory::Supplements => "Supplements",
            TopicCategory::Sleep => "Sleep",
            TopicCategory::Hormones => "Hormones",
            TopicCategory::Bloodwork => "Bloodwork",
            TopicCategory::Mindset => "Mindset",
            TopicCategory::Recovery => "Recovery",
            TopicCategory::Lifestyle => "Lifestyle",
            TopicCategory::Protocol => "Protocol",
            TopicCategory::General => "General",
        }
    }

    /// Parse from code.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        Self::all().iter().copied().find(|c| c.as_str() == code)
    }

    /// Parse from code, falling back to `General` for anything unknown.
    pub fn from_code_or_general(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }
}

impl std::fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Topic lifecycle status.
///
/// `Active` and `Paused` alternate; `Resolved` and `Archived` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    /// The single subject currently being discussed
    Active,
    /// Set aside, can be resumed
    Paused,
    /// Explicitly wrapped up
    Resolved,
    /// Evicted from the paused list
    Archived,
}

impl TopicStatus {
    /// Whether the status is terminal (resolved or archived).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopicStatus::Resolved | TopicStatus::Archived)
    }
}

/// A tracked subject of conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// Unique identifier (ULID)
    pub id: TopicId,
    /// Display name, e.g. "Training: Workout"
    pub name: String,
    pub category: TopicCategory,
    pub status: TopicStatus,
    /// Conversational depth, 0.0 - 3.0
    pub depth: f32,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub user_questions: Vec<String>,
    #[serde(default)]
    pub pending_followups: Vec<String>,
}

impl Topic {
    /// Create a new active topic at depth zero.
    pub fn new(name: impl Into<String>, category: TopicCategory, now: DateTime<Utc>) -> Self {
        let id = ulid::Ulid::from_parts(now.timestamp_millis().max(0) as u64, rand::random());
        Self {
            id: id.to_string(),
            name: name.into(),
            category,
            status: TopicStatus::Active,
            depth: 0.0,
            started_at: now,
            last_active_at: now,
            resolved_at: None,
            key_points: Vec::new(),
            user_questions: Vec::new(),
            pending_followups: Vec::new(),
        }
    }

    /// Check if topic is active.
    pub fn is_active(&self) -> bool {
        self.status == TopicStatus::Active
    }

    /// Increase depth by `amount`, never past `max`.
    ///
    /// Depth never decreases.
    pub fn deepen(&mut self, amount: f32, max: f32) {
        if amount > 0.0 {
            self.depth = (self.depth + amount).min(max.min(MAX_DEPTH));
        }
    }

    /// Whether this topic refers to the same subject as `category`/`name`.
    ///
    /// Same category and one name equals or contains the other (case-insensitive).
    pub fn is_similar_to(&self, category: TopicCategory, name: &str) -> bool {
        if self.category != category {
            return false;
        }
        let a = self.name.to_lowercase();
        let b = name.to_lowercase();
        a == b || a.contains(&b) || b.contains(&a)
    }

    /// Append a user question, skipping exact repeats.
    pub fn record_question(&mut self, question: &str) {
        push_unique(&mut self.user_questions, question);
    }
}

pub(crate) fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

/// Per-session topic tracking state.
///
/// Created empty at session start, replaced once per inbound utterance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopicState {
    /// The single active topic, if any
    #[serde(default)]
    pub primary: Option<Topic>,
    /// Paused topics, most recently paused first
    #[serde(default)]
    pub secondary: Vec<Topic>,
    /// Resolved or archived topics, most recent first
    #[serde(default)]
    pub archived: Vec<Topic>,
    #[serde(default)]
    pub last_shift_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shift_count: u64,
}

impl TopicState {
    /// Create an empty state for a new session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over every tracked topic: primary, then secondary, then archived.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .chain(self.archived.iter())
    }

    /// Number of topics with `Active` status anywhere in the state.
    pub fn active_count(&self) -> usize {
        self.topics().filter(|t| t.is_active()).count()
    }

    /// Categories that have come up at any point in the session.
    pub fn discussed_categories(&self) -> BTreeSet<TopicCategory> {
        self.topics().map(|t| t.category).collect()
    }

    /// Category of the primary topic, `General` when there is none.
    pub fn current_category(&self) -> TopicCategory {
        self.primary
            .as_ref()
            .map(|t| t.category)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_empty() && self.archived.is_empty()
    }
}

/// Kind of topic-change cue found in an utterance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    /// "let's talk about", "moving on"
    Explicit,
    /// "by the way", "speaking of"
    Implicit,
    /// Interrogative opener
    Question,
    /// "random thought", "side note"
    Tangent,
}

impl ShiftType {
    /// Fixed confidence assigned to each signal type.
    pub fn confidence(&self) -> f32 {
        match self {
            ShiftType::Explicit => 0.9,
            ShiftType::Implicit => 0.7,
            ShiftType::Tangent => 0.5,
            ShiftType::Question => 0.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Explicit => "explicit",
            ShiftType::Implicit => "implicit",
            ShiftType::Question => "question",
            ShiftType::Tangent => "tangent",
        }
    }
}

/// A detected topic-change signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftSignal {
    pub shift_type: ShiftType,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Phrase that triggered the signal, absent for the opener fallback
    pub detected_phrase: Option<String>,
}

impl ShiftSignal {
    pub fn new(shift_type: ShiftType, detected_phrase: Option<String>) -> Self {
        Self {
            shift_type,
            confidence: shift_type.confidence(),
            detected_phrase,
        }
    }
}

/// Why the primary topic changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// The user signalled or steered the change
    UserInitiated,
    /// The conversation drifted without an explicit cue
    NaturalFlow,
    /// The previous primary topic was resolved
    Resolved,
}

/// Record of a primary-topic change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicTransition {
    pub from: Option<TopicId>,
    pub to: Option<TopicId>,
    pub reason: TransitionReason,
    pub at: DateTime<Utc>,
}

/// Prompt-injection view of a topic state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopicContext {
    pub primary_name: Option<String>,
    pub primary_depth: Option<f32>,
    /// Names of paused topics, most recently paused first
    pub paused: Vec<String>,
    /// Paused topics worth resurfacing with a natural remark
    pub followup_candidates: Vec<String>,
}

impl TopicContext {
    /// Render as a markdown section for the downstream generator's prompt.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec!["## Conversation Topics".to_string(), String::new()];

        match (&self.primary_name, self.primary_depth) {
            (Some(name), Some(depth)) => {
                lines.push(format!("- **Current:** {} (depth {:.1})", name, depth))
            }
            (Some(name), None) => lines.push(format!("- **Current:** {}", name)),
            _ => lines.push("- **Current:** none".to_string()),
        }

        if !self.paused.is_empty() {
            lines.push(format!("- **Paused:** {}", self.paused.join(", ")));
        }
        if !self.followup_candidates.is_empty() {
            lines.push(format!(
                "- **Worth resurfacing:** {}",
                self.followup_candidates.join(", ")
            ));
        }

        lines.join("\n")
    }
}
