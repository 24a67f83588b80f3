//! Command implementations for the dialogue harness.
//!
//! Handles:
//! - classify: topic, shift and narrative verdicts for one utterance
//! - turn: one engine turn against an optional state file
//! - replay: a whole transcript through a versioned in-memory session
//! - patterns: validate or dump pattern tables
//!
//! Every handler returns the text to print so it can be tested without
//! capturing stdout.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use dialogue_engine::{DialogueEngine, InMemorySessionStore, PatternTables, TurnInput};
use dialogue_topics::TopicState;
use dialogue_types::Settings;

/// Transcript line that resolves the current primary topic.
pub const RESOLVE_MARKER: &str = "!resolve";

/// Session id used for replays.
const REPLAY_SESSION: &str = "replay";

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    patterns_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(patterns) = patterns_override {
        settings.patterns_path = Some(patterns.to_string());
    }

    Ok(settings)
}

/// Initialize logging. Output goes to stderr so stdout stays parseable.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build the engine, loading the pattern override when configured.
pub fn build_engine(settings: &Settings) -> Result<DialogueEngine> {
    if let Some(path) = &settings.patterns_path {
        info!(path = %path, "Using pattern table override");
    }
    DialogueEngine::from_settings(settings).context("Failed to build dialogue engine")
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Classify one utterance without any state.
pub fn classify_utterance(engine: &DialogueEngine, utterance: &str, json: bool) -> Result<String> {
    let lifecycle = engine.lifecycle();
    let classification = lifecycle.classifier().classify(utterance);
    let shift = lifecycle.detector().detect(utterance);
    let narrative = engine.narrative().classify(utterance);

    if json {
        let value = serde_json::json!({
            "classification": classification,
            "shift": shift,
            "narrative": narrative,
            "verdict": narrative.verdict(),
        });
        return serde_json::to_string_pretty(&value).context("Failed to serialize classification");
    }

    let mut out = String::new();
    writeln!(
        out,
        "topic:     {} ({}, {:.2})",
        classification.topic_name(),
        classification.category.as_str(),
        classification.confidence
    )?;
    if !classification.matched_keywords.is_empty() {
        writeln!(out, "keywords:  {}", classification.matched_keywords.join(", "))?;
    }
    match &shift {
        Some(signal) => writeln!(
            out,
            "shift:     {} {} ({:.2})",
            signal.shift_type.as_str(),
            signal
                .detected_phrase
                .as_deref()
                .map(|p| format!("\"{p}\""))
                .unwrap_or_else(|| "(opener)".to_string()),
            signal.confidence
        )?,
        None => writeln!(out, "shift:     none")?,
    }
    write!(out, "narrative: {:?}", narrative.verdict())?;
    if let Some(excuse_type) = narrative.excuse_type {
        write!(out, " [{excuse_type}]")?;
    }
    if !narrative.original_claim.is_empty() {
        write!(
            out,
            " ({:.2}) claim: \"{}\"",
            narrative.confidence, narrative.original_claim
        )?;
    }
    Ok(out)
}

fn read_state(path: &Path) -> Result<Option<TopicState>> {
    if !path.exists() {
        debug!(path = %path.display(), "No state file yet, starting fresh");
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let state = serde_json::from_str(&text)
        .with_context(|| format!("Invalid state file {}", path.display()))?;
    Ok(Some(state))
}

fn write_state(path: &Path, state: &TopicState) -> Result<()> {
    let text = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write state file {}", path.display()))?;
    debug!(path = %path.display(), "Wrote state file");
    Ok(())
}

fn turn_input(utterance: &str, mode: Option<&str>, goals: &[String]) -> TurnInput {
    let input = TurnInput::new(utterance).with_goals(goals.to_vec());
    match mode {
        Some(mode) => input.with_protocol_mode(mode),
        None => input,
    }
}

/// Run one turn, reading and writing `state_path` when given.
pub fn run_turn(
    engine: &DialogueEngine,
    utterance: &str,
    state_path: Option<&str>,
    mode: Option<&str>,
    goals: &[String],
    seed: Option<u64>,
    json: bool,
) -> Result<String> {
    let prior = match state_path {
        Some(path) => read_state(Path::new(path))?,
        None => None,
    };

    let input = turn_input(utterance, mode, goals);
    let identity = input.identity();
    let mut rng = rng_for(seed);
    let outcome = engine.process_turn(prior, &input, &identity, Utc::now(), &mut rng);

    if let Some(path) = state_path {
        write_state(Path::new(path), &outcome.state)?;
    }

    if json {
        serde_json::to_string_pretty(&outcome).context("Failed to serialize turn outcome")
    } else {
        Ok(outcome.to_markdown())
    }
}

/// Replay a transcript through a versioned in-memory session.
///
/// One utterance per line. Blank lines and lines starting with `#` are
/// skipped, and a line reading `!resolve` resolves the current primary topic.
/// Turns are spaced one minute apart.
pub async fn replay_transcript(
    engine: &DialogueEngine,
    transcript: &str,
    mode: Option<&str>,
    goals: &[String],
    seed: Option<u64>,
    json: bool,
) -> Result<String> {
    let text = std::fs::read_to_string(transcript)
        .with_context(|| format!("Failed to read transcript {transcript}"))?;

    let store = InMemorySessionStore::new();
    let mut rng = rng_for(seed);
    let start = Utc::now();
    let mut out = String::new();
    let mut final_state = TopicState::new();
    let mut turns = 0usize;

    let lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    for (i, line) in lines.enumerate() {
        let now = start + Duration::minutes(i as i64);

        if line == RESOLVE_MARKER {
            let (persisted, transition) = engine
                .resolve_topic(&store, REPLAY_SESSION, now)
                .await
                .context("Failed to resolve topic")?;
            match (transition, persisted.state.archived.first()) {
                (Some(_), Some(resolved)) => {
                    writeln!(out, "[{:>3}] resolved {}", i + 1, resolved.name)?
                }
                _ => writeln!(out, "[{:>3}] resolve: no primary topic", i + 1)?,
            }
            final_state = persisted.state;
            continue;
        }

        let input = turn_input(line, mode, goals);
        let identity = input.identity();
        let outcome = engine
            .handle_turn(&store, REPLAY_SESSION, &input, &identity, now, &mut rng)
            .await
            .with_context(|| format!("Turn {} failed", i + 1))?;
        turns += 1;

        let mut summary = format!(
            "[{:>3}] {:<16} {:?}",
            i + 1,
            outcome.context.primary_name.as_deref().unwrap_or("-"),
            outcome.narrative.verdict()
        );
        if let Some(t) = &outcome.transition {
            write!(summary, " | {:?}", t.reason)?;
        }
        if let Some(d) = &outcome.directive {
            write!(summary, " | directive L{}", d.challenge_level)?;
        }
        if let Some(s) = &outcome.suggestion {
            write!(summary, " | suggest {}", s.category.as_str())?;
        }
        writeln!(out, "{summary}")?;
        final_state = outcome.state;
    }

    info!(turns = turns, "Replay finished");

    if json {
        return serde_json::to_string_pretty(&final_state).context("Failed to serialize state");
    }

    writeln!(out)?;
    out.push_str(&engine.lifecycle().context_at(&final_state, Utc::now()).to_markdown());
    Ok(out)
}

/// Validate a pattern table file.
pub fn validate_patterns(path: &str) -> Result<String> {
    let tables = PatternTables::load(path)
        .with_context(|| format!("Pattern tables in {path} are invalid"))?;
    Ok(format!("{path}: OK (version {})", tables.version))
}

/// Render the compiled-in tables as TOML.
pub fn dump_patterns() -> Result<String> {
    PatternTables::default()
        .to_toml_string()
        .context("Failed to render pattern tables")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_classify_text_output() {
        let engine = DialogueEngine::new();
        let out = classify_utterance(
            &engine,
            "I skipped my workout because I was too busy with work",
            false,
        )
        .unwrap();
        assert!(out.contains("narrative: Excuse"));
        assert!(out.contains("[excuse_time]"));
    }

    #[test]
    fn test_classify_json_output() {
        let engine = DialogueEngine::new();
        let out = classify_utterance(&engine, "my bad, I skipped leg day", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["verdict"], "honest_admission");
        assert_eq!(value["narrative"]["detected"], false);
    }

    #[test]
    fn test_turn_persists_state_file() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("state.json");
        let state_path = state_path.to_str().unwrap();
        let engine = DialogueEngine::new();

        run_turn(
            &engine,
            "How should I structure my training split?",
            Some(state_path),
            None,
            &[],
            Some(1),
            false,
        )
        .unwrap();

        let out = run_turn(
            &engine,
            "Let's talk about sleep, I only get five hours",
            Some(state_path),
            None,
            &[],
            Some(1),
            true,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["state"]["primary"]["category"], "sleep");
        assert_eq!(value["state"]["secondary"][0]["category"], "training");

        let saved: TopicState =
            serde_json::from_str(&std::fs::read_to_string(state_path).unwrap()).unwrap();
        assert_eq!(saved.shift_count, 1);
    }

    #[test]
    fn test_turn_rejects_corrupt_state_file() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("state.json");
        std::fs::write(&state_path, "not json").unwrap();

        let engine = DialogueEngine::new();
        let result = run_turn(
            &engine,
            "hello",
            state_path.to_str(),
            None,
            &[],
            None,
            false,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_replay_transcript() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# warmup").unwrap();
        writeln!(file, "What's a good training split for hypertrophy?").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Let's talk about sleep, I wake up at 3am").unwrap();
        writeln!(file, "{RESOLVE_MARKER}").unwrap();

        let engine = DialogueEngine::new();
        let out = replay_transcript(
            &engine,
            file.path().to_str().unwrap(),
            Some("natural"),
            &[],
            Some(42),
            true,
        )
        .await
        .unwrap();

        let state: TopicState = serde_json::from_str(&out).unwrap();
        // Sleep was resolved and Training promoted back
        assert_eq!(
            state.primary.as_ref().map(|t| t.category.as_str()),
            Some("training")
        );
        assert_eq!(state.archived.len(), 1);
        assert_eq!(state.archived[0].category.as_str(), "sleep");
    }

    #[test]
    fn test_validate_patterns() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "version = 2").unwrap();
        let out = validate_patterns(file.path().to_str().unwrap()).unwrap();
        assert!(out.ends_with("OK (version 2)"));

        let mut bad = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(bad, "version = 0").unwrap();
        assert!(validate_patterns(bad.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_dump_patterns_round_trips() {
        let text = dump_patterns().unwrap();
        let tables = PatternTables::from_toml_str(&text).unwrap();
        assert_eq!(tables.version, dialogue_engine::DEFAULT_PATTERNS_VERSION);
    }
}
