//! CLI argument parsing for the dialogue tuning harness.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Dialogue engine tuning harness
///
/// Runs the dialogue management engine locally against single utterances or
/// whole transcripts, for tuning pattern tables.
#[derive(Parser, Debug)]
#[command(name = "dialogue")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/dialogue-engine/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Pattern table override file
    #[arg(short, long, global = true)]
    pub patterns: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Harness commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a single utterance without touching any state
    Classify {
        /// Utterance to classify
        utterance: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run one turn, optionally reading and writing a state file
    Turn {
        /// Utterance to process
        utterance: String,

        /// JSON file holding the topic state between turns
        #[arg(short, long)]
        state: Option<String>,

        /// Declared protocol mode (e.g. "enhanced,clinical")
        #[arg(short, long)]
        mode: Option<String>,

        /// Goal keyword steering suggestions (repeatable)
        #[arg(short, long = "goal")]
        goals: Vec<String>,

        /// Seed for the suggestion tie-breaker
        #[arg(long)]
        seed: Option<u64>,

        /// Print JSON instead of markdown
        #[arg(long)]
        json: bool,
    },

    /// Replay a transcript, one utterance per line
    Replay {
        /// Transcript file
        transcript: String,

        /// Declared protocol mode
        #[arg(short, long)]
        mode: Option<String>,

        /// Goal keyword steering suggestions (repeatable)
        #[arg(short, long = "goal")]
        goals: Vec<String>,

        /// Seed for the suggestion tie-breaker
        #[arg(long)]
        seed: Option<u64>,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pattern table commands
    #[command(subcommand)]
    Patterns(PatternCommands),
}

/// Pattern table subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PatternCommands {
    /// Validate a pattern table file
    Validate {
        /// File to validate
        path: String,
    },

    /// Print the compiled-in tables as TOML
    Dump,
}
