//! # dialogue-topics
//!
//! Topic tracking for multi-turn coaching conversations.
//!
//! This crate follows which subject a conversation is about. Each inbound
//! utterance is classified into a fixed category set and scanned for shift
//! cues; the lifecycle manager then switches, resumes, deepens, archives or
//! resolves topics in an explicit [`TopicState`] owned by the caller.
//!
//! ## Features
//! - Keyword topic classification with declaration-order tie breaking
//! - Shift signal detection (explicit, implicit, tangent, question)
//! - Pause/resume/archive lifecycle with bounded paused and archived lists
//! - Follow-up candidates for resurfacing paused topics
//! - Static topic graph for proactive next-topic suggestions
//!
//! All classification and transition functions are total. Only building
//! components from an invalid configuration can fail.

pub mod classifier;
pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod shift;
pub mod types;

pub use classifier::{TopicClassification, TopicClassifier};
pub use config::{
    CategoryKeywords, ClassifierConfig, LifecycleConfig, ShiftConfig, ShiftPhrase, TopicsConfig,
};
pub use error::TopicsError;
pub use graph::{TopicGraphSuggester, TopicSuggestion};
pub use lifecycle::{TopicLifecycleManager, TopicUpdate};
pub use shift::ShiftSignalDetector;
pub use types::{
    ShiftSignal, ShiftType, Topic, TopicCategory, TopicContext, TopicId, TopicState, TopicStatus,
    TopicTransition, TransitionReason, MAX_DEPTH,
};
