//! # dialogue-engine
//!
//! Runs the dialogue management components once per inbound utterance.
//!
//! The engine takes an utterance, the prior topic state and the user's
//! declared protocol mode, and returns structured decisions for a downstream
//! text generator: the new topic state, topic context, narrative analysis,
//! an optional correction directive and an optional next-topic suggestion.
//! It never produces user-facing text itself.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use dialogue_engine::{DialogueEngine, TurnInput};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let engine = DialogueEngine::new();
//! let input = TurnInput::new("Skipped leg day because I was exhausted").with_protocol_mode("assisted");
//! let outcome = engine.process_turn(None, &input, &input.identity(), Utc::now(), &mut StdRng::seed_from_u64(1));
//! assert!(outcome.directive.is_some());
//! ```

pub mod engine;
pub mod error;
pub mod patterns;
pub mod store;

pub use engine::{profile_resolver, DialogueEngine, TurnInput, TurnOutcome, VersionedOutcome};
pub use error::EngineError;
pub use patterns::{PatternTables, DEFAULT_PATTERNS_VERSION};
pub use store::{InMemorySessionStore, SessionStore, StoreError, VersionedState};
