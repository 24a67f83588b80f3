//! Identity resolution and persisted-session E2E tests.
//!
//! Covers protocol-mode normalization, profile-backed resolution with its
//! baseline fallback, and turns persisted through a versioned session store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use dialogue_engine::{
    profile_resolver, DialogueEngine, InMemorySessionStore, SessionStore, TurnInput,
};
use dialogue_narrative::{
    IdentityResolver, MockProfileProvider, ProtocolMode, ResolutionSource,
};
use dialogue_topics::{TopicCategory, TransitionReason};
use dialogue_types::Settings;
use e2e_tests::{conversation_start, CATEGORY_TOUR};

/// Token order does not matter for the combined tier.
#[test]
fn test_scenario_e_combined_tier_order_insensitive() {
    let a = IdentityResolver::resolve(Some("enhanced,clinical"));
    let b = IdentityResolver::resolve(Some("clinical,enhanced"));

    assert_eq!(a, b);
    assert_eq!(a.protocol_mode, ProtocolMode::Combined);

    for raw in [
        "enhanced-clinical",
        "enhanced_clinical",
        "assisted;supervised",
        "Enhanced,Clinical",
    ] {
        assert_eq!(IdentityResolver::resolve(Some(raw)), a, "{raw}");
    }
}

/// Unknown or missing modes fall back to the baseline tier.
#[test]
fn test_unknown_modes_resolve_to_baseline() {
    let baseline = IdentityResolver::context_for(ProtocolMode::Baseline);
    for mode in [None, Some(""), Some("superhuman"), Some("   ")] {
        assert_eq!(IdentityResolver::resolve(mode), baseline, "{mode:?}");
    }
}

/// A failing profile fetch never blocks a turn; the baseline tier is used.
#[tokio::test]
async fn test_profile_failure_falls_back_to_baseline() {
    let settings = Settings::default();
    let resolver = profile_resolver(Arc::new(MockProfileProvider::failing()), &settings);

    let resolution = resolver.resolve("user-1").await;
    assert_eq!(resolution.source, ResolutionSource::Fallback);
    assert_eq!(resolution.context.protocol_mode, ProtocolMode::Baseline);
    assert!(!resolution.warnings.is_empty());

    let engine = DialogueEngine::new();
    let mut rng = StdRng::seed_from_u64(1);
    let outcome = engine.process_turn(
        None,
        &TurnInput::new("I missed my workout because I was exhausted"),
        &resolution.context,
        conversation_start(),
        &mut rng,
    );
    let directive = outcome.directive.expect("excuse should produce a directive");
    assert_eq!(directive.protocol_mode, ProtocolMode::Baseline);
}

/// A slow profile fetch times out to the baseline tier.
#[tokio::test(start_paused = true)]
async fn test_slow_profile_times_out() {
    let provider = MockProfileProvider::new()
        .with_mode("user-1", "enhanced")
        .with_delay(Duration::from_secs(5));
    let settings = Settings {
        profile_timeout_ms: 100,
        ..Settings::default()
    };
    let resolver = profile_resolver(Arc::new(provider), &settings);

    let resolution = resolver.resolve("user-1").await;
    assert_eq!(resolution.source, ResolutionSource::Fallback);
    assert_eq!(resolution.context.protocol_mode, ProtocolMode::Baseline);
}

/// A fetched mode is cached for later turns.
#[tokio::test]
async fn test_profile_mode_is_cached() {
    let provider = Arc::new(MockProfileProvider::new().with_mode("user-1", "clinical+enhanced"));
    let resolver = profile_resolver(provider.clone(), &Settings::default());

    let first = resolver.resolve("user-1").await;
    let second = resolver.resolve("user-1").await;

    assert_eq!(first.source, ResolutionSource::Profile);
    assert_eq!(second.source, ResolutionSource::Cache);
    assert_eq!(first.context, second.context);
    assert_eq!(first.context.protocol_mode, ProtocolMode::Combined);
    assert_eq!(provider.calls(), 1);
}

/// Turns persisted through the store accumulate state and versions.
#[tokio::test]
async fn test_persisted_session_across_turns() {
    let engine = DialogueEngine::new();
    let store = InMemorySessionStore::new();
    let mut rng = StdRng::seed_from_u64(3);
    let identity = IdentityResolver::resolve(Some("natural"));
    let mut now = conversation_start();

    for (i, utterance) in CATEGORY_TOUR[..3].iter().enumerate() {
        let outcome = engine
            .handle_turn(&store, "session-1", &TurnInput::new(*utterance), &identity, now, &mut rng)
            .await
            .unwrap();
        assert_eq!(outcome.version, Some(i as u64 + 1));
        now += chrono::Duration::minutes(1);
    }

    let stored = store.load("session-1").await.unwrap().unwrap();
    assert_eq!(stored.version, 3);
    assert_eq!(
        stored.state.primary.as_ref().map(|t| t.category),
        Some(TopicCategory::Supplements)
    );
    assert_eq!(stored.state.secondary.len(), 2);

    let (persisted, transition) = engine.resolve_topic(&store, "session-1", now).await.unwrap();
    assert_eq!(persisted.version, 4);
    assert_eq!(
        transition.map(|t| t.reason),
        Some(TransitionReason::Resolved)
    );
    assert_eq!(
        persisted.state.primary.as_ref().map(|t| t.category),
        Some(TopicCategory::Nutrition)
    );

    // Other sessions are independent
    assert!(store.load("session-2").await.unwrap().is_none());
}

/// Pattern overrides loaded through settings change classification.
#[test]
fn test_engine_from_settings_with_pattern_override() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"
version = 2

[narrative]
causality_phrases = ["because", "thanks to"]
"#,
    )
    .unwrap();

    let settings = Settings {
        patterns_path: Some(file.path().to_string_lossy().into_owned()),
        suggestions_enabled: false,
        ..Settings::default()
    };
    let engine = DialogueEngine::from_settings(&settings).unwrap();

    let analysis = engine
        .narrative()
        .classify("I skipped cardio thanks to my boss");
    assert!(analysis.detected);

    let mut rng = StdRng::seed_from_u64(5);
    let outcome = engine.process_turn(
        None,
        &TurnInput::new(CATEGORY_TOUR[0]),
        &IdentityResolver::resolve(None),
        conversation_start(),
        &mut rng,
    );
    assert!(outcome.suggestion.is_none());
}
