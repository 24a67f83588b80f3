//! Topic lifecycle management.
//!
//! This module evolves a [`TopicState`] once per inbound utterance:
//! - Switching the primary topic on strong shift or category signals
//! - Resuming paused topics that the user comes back to
//! - Deepening the primary topic as the conversation continues
//! - Archiving the oldest paused topics on overflow
//! - Resolving the primary topic and promoting the next paused one
//!
//! Every operation is total and takes the state by value, returning the new
//! state for the caller to persist.
//!
//! ## Usage
//!
//! ```rust
//! use dialogue_topics::{TopicLifecycleManager, TopicState};
//!
//! let manager = TopicLifecycleManager::new();
//! let update = manager.process_message(TopicState::new(), "My squat workout felt heavy");
//! assert!(update.state.primary.is_some());
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::classifier::{TopicClassification, TopicClassifier};
use crate::config::{LifecycleConfig, TopicsConfig};
use crate::error::TopicsError;
use crate::shift::ShiftSignalDetector;
use crate::types::{
    push_unique, ShiftSignal, Topic, TopicCategory, TopicContext, TopicState, TopicStatus,
    TopicTransition, TransitionReason,
};

/// Outcome of processing one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicUpdate {
    /// The new state to persist
    pub state: TopicState,
    /// Topic classification of the utterance
    pub classification: TopicClassification,
    /// Shift signal found in the utterance, if any
    pub shift: Option<ShiftSignal>,
    /// Primary-topic change, if one happened
    pub transition: Option<TopicTransition>,
}

/// Manages the lifecycle of conversation topics.
///
/// Owns the topic classifier and the shift detector and combines their
/// output into state transitions.
#[derive(Debug, Clone)]
pub struct TopicLifecycleManager {
    classifier: TopicClassifier,
    detector: ShiftSignalDetector,
    config: LifecycleConfig,
}

impl TopicLifecycleManager {
    /// Create a manager with default tables and thresholds.
    pub fn new() -> Self {
        Self {
            classifier: TopicClassifier::new(),
            detector: ShiftSignalDetector::new(),
            config: LifecycleConfig::default(),
        }
    }

    /// Create a manager from a full topics configuration.
    pub fn with_config(config: TopicsConfig) -> Result<Self, TopicsError> {
        config.validate()?;
        Ok(Self {
            classifier: TopicClassifier::with_config(config.classifier),
            detector: ShiftSignalDetector::with_config(config.shift),
            config: config.lifecycle,
        })
    }

    pub fn classifier(&self) -> &TopicClassifier {
        &self.classifier
    }

    pub fn detector(&self) -> &ShiftSignalDetector {
        &self.detector
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Process an utterance against the wall clock.
    pub fn process_message(&self, state: TopicState, utterance: &str) -> TopicUpdate {
        self.process_message_at(state, utterance, Utc::now())
    }

    /// Process an utterance at an explicit point in time.
    #[instrument(skip_all, fields(shift_count = state.shift_count))]
    pub fn process_message_at(
        &self,
        mut state: TopicState,
        utterance: &str,
        now: DateTime<Utc>,
    ) -> TopicUpdate {
        let classification = self.classifier.classify(utterance);
        let shift = self.detector.detect(utterance);
        let category = classification.category;
        let name = classification.topic_name();
        let is_question = self.detector.is_interrogative(utterance);

        let shift_confidence = shift.as_ref().map(|s| s.confidence).unwrap_or(0.0);
        let category_changed = category != TopicCategory::General
            && state
                .primary
                .as_ref()
                .is_some_and(|p| p.category != category)
            && classification.confidence > self.config.category_switch_threshold;
        let signalled = shift_confidence > self.config.shift_switch_threshold;

        // A shift cue pointing back at the current subject is a continuation
        let already_primary = state
            .primary
            .as_ref()
            .is_some_and(|p| p.is_similar_to(category, &name));
        let should_switch = (signalled || category_changed) && !already_primary;

        debug!(
            category = %category,
            confidence = classification.confidence,
            shift_confidence = shift_confidence,
            should_switch = should_switch,
            "Topic turn decision"
        );

        let mut transition = None;

        if should_switch {
            let from = state.primary.as_ref().map(|p| p.id.clone());

            let resumable = state
                .secondary
                .iter()
                .position(|t| t.is_similar_to(category, &name));

            let (topic, reason) = match resumable {
                Some(index) => {
                    let mut resumed = state.secondary.remove(index);
                    resumed.status = TopicStatus::Active;
                    resumed.last_active_at = now;
                    resumed.deepen(self.config.resume_depth_step, self.config.max_depth);
                    info!(topic = %resumed.name, depth = resumed.depth, "Resumed paused topic");
                    (resumed, TransitionReason::UserInitiated)
                }
                None => {
                    let topic = Topic::new(name, category, now);
                    let reason = if shift.is_some() {
                        TransitionReason::UserInitiated
                    } else {
                        TransitionReason::NaturalFlow
                    };
                    info!(topic = %topic.name, reason = ?reason, "Opened new topic");
                    (topic, reason)
                }
            };

            self.demote_primary(&mut state);
            transition = Some(TopicTransition {
                from,
                to: Some(topic.id.clone()),
                reason,
                at: now,
            });
            state.primary = Some(topic);
            state.shift_count += 1;
            state.last_shift_at = Some(now);

            if is_question {
                if let Some(primary) = state.primary.as_mut() {
                    primary.record_question(utterance);
                }
            }
        } else if let Some(primary) = state.primary.as_mut() {
            primary.last_active_at = now;
            if utterance.trim().chars().count() > self.config.continuation_length {
                primary.deepen(self.config.continuation_depth_step, self.config.max_depth);
            }
            if is_question {
                primary.record_question(utterance);
            }
        } else if category != TopicCategory::General {
            let mut topic = Topic::new(name, category, now);
            if is_question {
                topic.record_question(utterance);
            }
            info!(topic = %topic.name, "Opened first topic of session");
            transition = Some(TopicTransition {
                from: None,
                to: Some(topic.id.clone()),
                reason: TransitionReason::NaturalFlow,
                at: now,
            });
            state.primary = Some(topic);
        }

        self.enforce_capacity(&mut state);

        TopicUpdate {
            state,
            classification,
            shift,
            transition,
        }
    }

    /// Resolve the primary topic against the wall clock.
    pub fn resolve_topic(&self, state: TopicState) -> (TopicState, Option<TopicTransition>) {
        self.resolve_topic_at(state, Utc::now())
    }

    /// Mark the primary topic resolved, archive it, and promote the most
    /// recently paused topic. A state without a primary topic is returned
    /// unchanged.
    #[instrument(skip_all)]
    pub fn resolve_topic_at(
        &self,
        mut state: TopicState,
        now: DateTime<Utc>,
    ) -> (TopicState, Option<TopicTransition>) {
        let Some(mut resolved) = state.primary.take() else {
            debug!("No primary topic to resolve");
            return (state, None);
        };

        resolved.status = TopicStatus::Resolved;
        resolved.resolved_at = Some(now);
        let from = Some(resolved.id.clone());
        info!(topic = %resolved.name, "Resolved topic");

        state.archived.insert(0, resolved);
        state.archived.truncate(self.config.max_archived);

        if !state.secondary.is_empty() {
            let mut next = state.secondary.remove(0);
            next.status = TopicStatus::Active;
            next.last_active_at = now;
            info!(topic = %next.name, "Promoted paused topic after resolution");
            state.primary = Some(next);
        }

        let transition = TopicTransition {
            from,
            to: state.primary.as_ref().map(|p| p.id.clone()),
            reason: TransitionReason::Resolved,
            at: now,
        };
        (state, Some(transition))
    }

    /// Paused topics worth resurfacing, against the wall clock.
    pub fn get_paused_topics_for_followup<'a>(&self, state: &'a TopicState) -> Vec<&'a Topic> {
        self.get_paused_topics_for_followup_at(state, Utc::now())
    }

    /// Paused topics that were active recently and discussed in some depth.
    pub fn get_paused_topics_for_followup_at<'a>(
        &self,
        state: &'a TopicState,
        now: DateTime<Utc>,
    ) -> Vec<&'a Topic> {
        let window = Duration::minutes(self.config.followup_window_minutes);
        state
            .secondary
            .iter()
            .filter(|t| now - t.last_active_at < window)
            .filter(|t| t.depth > self.config.followup_min_depth)
            .collect()
    }

    /// Build the prompt-injection view of a state.
    pub fn context_at(&self, state: &TopicState, now: DateTime<Utc>) -> TopicContext {
        TopicContext {
            primary_name: state.primary.as_ref().map(|p| p.name.clone()),
            primary_depth: state.primary.as_ref().map(|p| p.depth),
            paused: state.secondary.iter().map(|t| t.name.clone()).collect(),
            followup_candidates: self
                .get_paused_topics_for_followup_at(state, now)
                .into_iter()
                .map(|t| t.name.clone())
                .collect(),
        }
    }

    /// Record a key point on the primary topic. Returns false when there is
    /// no primary topic or the point was already recorded.
    pub fn note_key_point(&self, state: &mut TopicState, point: &str) -> bool {
        state
            .primary
            .as_mut()
            .is_some_and(|p| push_unique(&mut p.key_points, point))
    }

    /// Queue a follow-up on the primary topic. Returns false when there is
    /// no primary topic or the follow-up was already queued.
    pub fn queue_followup(&self, state: &mut TopicState, followup: &str) -> bool {
        state
            .primary
            .as_mut()
            .is_some_and(|p| push_unique(&mut p.pending_followups, followup))
    }

    /// Report violations of the state invariants. Empty when the state is
    /// well formed.
    pub fn check_invariants(&self, state: &TopicState) -> Vec<String> {
        let mut violations = Vec::new();

        if state.secondary.len() > self.config.max_secondary {
            violations.push(format!(
                "secondary holds {} topics (max {})",
                state.secondary.len(),
                self.config.max_secondary
            ));
        }
        if state.archived.len() > self.config.max_archived {
            violations.push(format!(
                "archived holds {} topics (max {})",
                state.archived.len(),
                self.config.max_archived
            ));
        }
        let active = state.active_count();
        if active > 1 {
            violations.push(format!("{} topics are active", active));
        }
        if let Some(primary) = &state.primary {
            if !primary.is_active() {
                violations.push(format!("primary topic {} is not active", primary.id));
            }
        }
        for topic in &state.secondary {
            if topic.status != TopicStatus::Paused {
                violations.push(format!("secondary topic {} is not paused", topic.id));
            }
        }
        for topic in &state.archived {
            if !topic.status.is_terminal() {
                violations.push(format!("archived topic {} is not terminal", topic.id));
            }
        }
        for topic in state.topics() {
            if !(0.0..=self.config.max_depth).contains(&topic.depth) {
                violations.push(format!("topic {} depth {} out of range", topic.id, topic.depth));
            }
        }

        violations
    }

    fn demote_primary(&self, state: &mut TopicState) {
        if let Some(mut previous) = state.primary.take() {
            previous.status = TopicStatus::Paused;
            debug!(topic = %previous.name, "Paused primary topic");
            state.secondary.insert(0, previous);
        }
    }

    /// Move the oldest paused topics to the archive and bound both lists.
    fn enforce_capacity(&self, state: &mut TopicState) {
        if state.secondary.len() <= self.config.max_secondary {
            return;
        }

        let mut overflow = state.secondary.split_off(self.config.max_secondary);
        for topic in overflow.iter_mut() {
            topic.status = TopicStatus::Archived;
        }
        debug!(count = overflow.len(), "Archived overflowing paused topics");

        overflow.append(&mut state.archived);
        overflow.truncate(self.config.max_archived);
        state.archived = overflow;
    }
}

impl Default for TopicLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
