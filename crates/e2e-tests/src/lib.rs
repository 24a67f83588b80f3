//! End-to-end test infrastructure for the dialogue engine.
//!
//! Provides a shared conversation harness and helpers for tests that drive
//! utterances through the full engine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dialogue_engine::{DialogueEngine, TurnInput, TurnOutcome};
use dialogue_topics::TopicState;

/// Fixed conversation start so time-dependent behavior is reproducible.
pub fn conversation_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 7, 30, 0).unwrap()
}

/// Drives a single conversation through the engine turn by turn.
///
/// Turns are spaced one minute apart and the suggestion tie-breaker is
/// seeded, so every run produces the same outcomes.
pub struct Conversation {
    pub engine: DialogueEngine,
    pub state: Option<TopicState>,
    pub now: DateTime<Utc>,
    pub protocol_mode: Option<String>,
    pub goals: Vec<String>,
    rng: StdRng,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_engine(DialogueEngine::new())
    }

    pub fn with_engine(engine: DialogueEngine) -> Self {
        Self {
            engine,
            state: None,
            now: conversation_start(),
            protocol_mode: None,
            goals: Vec::new(),
            rng: StdRng::seed_from_u64(7),
        }
    }

    pub fn with_protocol_mode(mut self, mode: &str) -> Self {
        self.protocol_mode = Some(mode.to_string());
        self
    }

    pub fn with_goals(mut self, goals: &[&str]) -> Self {
        self.goals = goals.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Send one utterance and keep the resulting state.
    pub fn say(&mut self, utterance: &str) -> TurnOutcome {
        let mut input = TurnInput::new(utterance).with_goals(self.goals.clone());
        if let Some(mode) = &self.protocol_mode {
            input = input.with_protocol_mode(mode.clone());
        }
        let identity = input.identity();
        let outcome = self.engine.process_turn(
            self.state.take(),
            &input,
            &identity,
            self.now,
            &mut self.rng,
        );
        self.state = Some(outcome.state.clone());
        self.now += Duration::minutes(1);
        outcome
    }

    /// Send several utterances, returning every outcome.
    pub fn say_all(&mut self, utterances: &[&str]) -> Vec<TurnOutcome> {
        utterances.iter().map(|u| self.say(u)).collect()
    }

    /// Current state, empty before the first turn.
    pub fn state(&self) -> TopicState {
        self.state.clone().unwrap_or_default()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// One short, high-confidence utterance per category, in first-seen order.
pub const CATEGORY_TOUR: [&str; 10] = [
    "Squat workout today",
    "Protein intake was low",
    "Creatine dose question",
    "Insomnia again lately",
    "Cortisol felt high",
    "Bloodwork came back",
    "Motivation is gone",
    "Deload week recovery",
    "Vacation with family",
    "Protocol injection timing",
];
