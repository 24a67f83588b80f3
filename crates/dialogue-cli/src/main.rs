//! Dialogue engine harness
//!
//! Runs the dialogue management engine locally for tuning pattern tables.
//!
//! # Usage
//!
//! ```bash
//! dialogue classify "I skipped leg day because work ran late"
//! dialogue turn "let's talk about sleep" --state state.json --mode enhanced
//! dialogue replay transcript.txt --seed 7
//! dialogue patterns dump > tables.toml
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/dialogue-engine/config.toml)
//! 3. Environment variables (DIALOGUE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use dialogue_cli::{
    build_engine, classify_utterance, dump_patterns, init_logging, load_settings,
    replay_transcript, run_turn, validate_patterns, Cli, Commands, PatternCommands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.patterns.as_deref(),
    )?;
    init_logging(&settings)?;

    let output = match cli.command {
        Commands::Patterns(PatternCommands::Dump) => dump_patterns()?,
        Commands::Patterns(PatternCommands::Validate { path }) => validate_patterns(&path)?,
        Commands::Classify { utterance, json } => {
            let engine = build_engine(&settings)?;
            classify_utterance(&engine, &utterance, json)?
        }
        Commands::Turn {
            utterance,
            state,
            mode,
            goals,
            seed,
            json,
        } => {
            let engine = build_engine(&settings)?;
            run_turn(
                &engine,
                &utterance,
                state.as_deref(),
                mode.as_deref(),
                &goals,
                seed,
                json,
            )?
        }
        Commands::Replay {
            transcript,
            mode,
            goals,
            seed,
            json,
        } => {
            let engine = build_engine(&settings)?;
            replay_transcript(&engine, &transcript, mode.as_deref(), &goals, seed, json).await?
        }
    };

    println!("{output}");
    Ok(())
}
