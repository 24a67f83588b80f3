//! Dialogue harness library exports.
//!
//! This crate provides the `dialogue` binary, a local harness for tuning the
//! dialogue engine's pattern tables.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (classify, turn, replay, patterns)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, PatternCommands};
pub use commands::{
    build_engine, classify_utterance, dump_patterns, init_logging, load_settings,
    replay_transcript, run_turn, validate_patterns, RESOLVE_MARKER,
};
