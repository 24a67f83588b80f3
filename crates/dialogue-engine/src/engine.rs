//! Per-turn orchestration.
//!
//! [`DialogueEngine`] runs every component once for an inbound utterance and
//! bundles the structured decisions for the downstream text generator:
//! - Topic lifecycle update and prompt-injection context
//! - Narrative classification
//! - Correction directive when the utterance is an excuse
//! - At most one proactive topic suggestion, never alongside a directive
//!
//! [`DialogueEngine::process_turn`] is pure. [`DialogueEngine::handle_turn`]
//! wraps it in a versioned read-modify-write against a [`SessionStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use dialogue_narrative::{
    Directive, DirectiveComposer, IdentityContext, IdentityResolver, NarrativeAnalysis,
    NarrativeClassifier, ProfileIdentityResolver, ProfileProvider,
};
use dialogue_topics::{
    ShiftSignal, TopicClassification, TopicContext, TopicGraphSuggester, TopicLifecycleManager,
    TopicState, TopicSuggestion, TopicTransition,
};
use dialogue_types::Settings;

use crate::error::EngineError;
use crate::patterns::PatternTables;
use crate::store::{SessionStore, StoreError};

/// One inbound utterance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnInput {
    pub utterance: String,

    /// Declared protocol mode, as stored on the user profile
    #[serde(default)]
    pub protocol_mode: Option<String>,

    /// Goal keywords used to steer suggestions
    #[serde(default)]
    pub goals: Vec<String>,
}

impl TurnInput {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            ..Self::default()
        }
    }

    pub fn with_protocol_mode(mut self, mode: impl Into<String>) -> Self {
        self.protocol_mode = Some(mode.into());
        self
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    /// Identity resolved from the declared protocol mode.
    pub fn identity(&self) -> IdentityContext {
        IdentityResolver::resolve(self.protocol_mode.as_deref())
    }
}

/// Everything the engine decided for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// New topic state for the caller to persist
    pub state: TopicState,

    /// Stored version after `handle_turn`; absent for `process_turn`
    pub version: Option<u64>,

    pub classification: TopicClassification,

    pub shift: Option<ShiftSignal>,

    pub transition: Option<TopicTransition>,

    /// Prompt-injection view of `state`
    pub context: TopicContext,

    pub narrative: NarrativeAnalysis,

    pub identity: IdentityContext,

    /// Set only when the utterance is an excuse
    pub directive: Option<Directive>,

    /// Set only when no directive was issued
    pub suggestion: Option<TopicSuggestion>,
}

impl TurnOutcome {
    /// Render the generator-facing sections as markdown.
    pub fn to_markdown(&self) -> String {
        let mut sections = vec![self.context.to_markdown()];
        if let Some(directive) = &self.directive {
            sections.push(directive.to_markdown());
        }
        if let Some(suggestion) = &self.suggestion {
            sections.push(format!(
                "## Suggested Next Topic\n\n- **Category:** {}\n- **Transition:** {}",
                suggestion.category.label(),
                suggestion.transition_phrase
            ));
        }
        sections.join("\n\n")
    }
}

/// The dialogue management engine.
#[derive(Debug, Clone)]
pub struct DialogueEngine {
    lifecycle: TopicLifecycleManager,
    suggester: TopicGraphSuggester,
    narrative: NarrativeClassifier,
    composer: DirectiveComposer,
    suggestions_enabled: bool,
    max_retries: u32,
}

impl DialogueEngine {
    /// Create an engine with the compiled-in tables.
    pub fn new() -> Self {
        let lifecycle = TopicLifecycleManager::new();
        Self {
            suggester: TopicGraphSuggester::with_classifier(lifecycle.classifier().clone()),
            lifecycle,
            narrative: NarrativeClassifier::new(),
            composer: DirectiveComposer::new(),
            suggestions_enabled: true,
            max_retries: 3,
        }
    }

    /// Create an engine from validated pattern tables.
    pub fn from_patterns(tables: PatternTables) -> Result<Self, EngineError> {
        tables.validate()?;
        let lifecycle = TopicLifecycleManager::with_config(tables.topics)?;
        Ok(Self {
            suggester: TopicGraphSuggester::with_classifier(lifecycle.classifier().clone()),
            lifecycle,
            narrative: NarrativeClassifier::with_config(tables.narrative)?,
            composer: DirectiveComposer::new(),
            suggestions_enabled: true,
            max_retries: 3,
        })
    }

    /// Create an engine from host settings, loading the pattern override
    /// file when one is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let engine = match &settings.patterns_path {
            Some(path) => Self::from_patterns(PatternTables::load(path)?)?,
            None => Self::new(),
        };
        Ok(engine
            .with_suggestions(settings.suggestions_enabled)
            .with_max_retries(settings.store_max_retries))
    }

    pub fn with_suggestions(mut self, enabled: bool) -> Self {
        self.suggestions_enabled = enabled;
        self
    }

    /// Number of extra attempts `handle_turn` makes after a version conflict.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn lifecycle(&self) -> &TopicLifecycleManager {
        &self.lifecycle
    }

    pub fn narrative(&self) -> &NarrativeClassifier {
        &self.narrative
    }

    /// Process one utterance against an explicit prior state.
    #[instrument(skip_all, fields(utterance_len = input.utterance.len()))]
    pub fn process_turn<R: Rng + ?Sized>(
        &self,
        state: Option<TopicState>,
        input: &TurnInput,
        identity: &IdentityContext,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TurnOutcome {
        let update =
            self.lifecycle
                .process_message_at(state.unwrap_or_default(), &input.utterance, now);

        let violations = self.lifecycle.check_invariants(&update.state);
        if !violations.is_empty() {
            warn!(violations = ?violations, "Topic state invariants violated");
        }

        let narrative = self.narrative.classify(&input.utterance);
        let directive = self.composer.compose(&narrative, identity);
        let suggestion = if self.suggestions_enabled && directive.is_none() {
            self.suggester.suggest(&update.state, &input.goals, rng)
        } else {
            None
        };
        let context = self.lifecycle.context_at(&update.state, now);

        debug!(
            verdict = ?narrative.verdict(),
            directive = directive.is_some(),
            suggestion = ?suggestion.as_ref().map(|s| s.category),
            "Turn processed"
        );

        TurnOutcome {
            state: update.state,
            version: None,
            classification: update.classification,
            shift: update.shift,
            transition: update.transition,
            context,
            narrative,
            identity: identity.clone(),
            directive,
            suggestion,
        }
    }

    /// Process one utterance for a persisted session.
    ///
    /// Loads the session, processes the turn and writes it back
    /// conditionally. A lost race is retried against the fresh state up to
    /// the configured number of times.
    #[instrument(skip(self, store, input, identity, rng))]
    pub async fn handle_turn<S, R>(
        &self,
        store: &S,
        session_id: &str,
        input: &TurnInput,
        identity: &IdentityContext,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<TurnOutcome, EngineError>
    where
        S: SessionStore + ?Sized,
        R: Rng + ?Sized,
    {
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let stored = store.load(session_id).await?;
            let expected = stored.as_ref().map(|s| s.version).unwrap_or(0);

            let mut outcome =
                self.process_turn(stored.map(|s| s.state), input, identity, now, rng);

            match store.save(session_id, expected, outcome.state.clone()).await {
                Ok(version) => {
                    outcome.version = Some(version);
                    if outcome.transition.is_some() {
                        info!(
                            session_id = %session_id,
                            version = version,
                            primary = ?outcome.context.primary_name,
                            "Session topic changed"
                        );
                    }
                    return Ok(outcome);
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) => {
                    warn!(
                        session_id = %session_id,
                        attempt = attempt,
                        expected = expected,
                        actual = actual,
                        "Session write conflict, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::RetriesExhausted {
            session_id: session_id.to_string(),
            attempts,
        })
    }

    /// Resolve the session's primary topic and persist the result.
    ///
    /// Nothing is written when the session does not exist or has no primary
    /// topic; the stored version is returned unchanged.
    pub async fn resolve_topic<S>(
        &self,
        store: &S,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(VersionedOutcome, Option<TopicTransition>), EngineError>
    where
        S: SessionStore + ?Sized,
    {
        let attempts = self.max_retries + 1;

        for _ in 0..attempts {
            let Some(stored) = store.load(session_id).await? else {
                debug!(session_id = %session_id, "Resolve on unknown session, nothing to do");
                return Ok((
                    VersionedOutcome {
                        version: 0,
                        state: TopicState::default(),
                    },
                    None,
                ));
            };
            let version = stored.version;
            let (state, transition) = self.lifecycle.resolve_topic_at(stored.state, now);
            let Some(transition) = transition else {
                debug!(session_id = %session_id, "Session has no primary topic, nothing written");
                return Ok((VersionedOutcome { version, state }, None));
            };

            match store.save(session_id, version, state.clone()).await {
                Ok(version) => return Ok((VersionedOutcome { version, state }, Some(transition))),
                Err(StoreError::VersionConflict { .. }) => {
                    warn!(session_id = %session_id, "Resolve conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::RetriesExhausted {
            session_id: session_id.to_string(),
            attempts,
        })
    }
}

impl Default for DialogueEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted state and the version it was written at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedOutcome {
    pub version: u64,
    pub state: TopicState,
}

/// Build a profile-backed identity resolver from host settings.
pub fn profile_resolver<P: ProfileProvider>(
    provider: Arc<P>,
    settings: &Settings,
) -> ProfileIdentityResolver<P> {
    ProfileIdentityResolver::with_timeout(provider, settings.profile_timeout())
        .with_cache_duration(settings.profile_cache())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemorySessionStore, VersionedState};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use dialogue_narrative::{ExcuseType, MockProfileProvider, ProtocolMode};
    use dialogue_topics::TopicCategory;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 18, 30, 0).unwrap()
    }

    #[test]
    fn test_excuse_turn_issues_directive_without_suggestion() {
        let engine = DialogueEngine::new();
        let input = TurnInput::new("I couldn't train because work was insane")
            .with_protocol_mode("enhanced");
        let outcome = engine.process_turn(
            None,
            &input,
            &input.identity(),
            t0(),
            &mut StdRng::seed_from_u64(1),
        );

        assert!(outcome.narrative.detected);
        let directive = outcome.directive.as_ref().unwrap();
        assert_eq!(directive.excuse_type, ExcuseType::External);
        assert_eq!(directive.protocol_mode, ProtocolMode::Assisted);
        assert!(outcome.suggestion.is_none());
        assert_eq!(
            outcome.state.primary.as_ref().unwrap().category,
            TopicCategory::Training
        );
        assert!(outcome.version.is_none());
    }

    #[test]
    fn test_neutral_turn_offers_suggestion() {
        let engine = DialogueEngine::new();
        let input = TurnInput::new("Hit a new squat record today");
        let outcome = engine.process_turn(
            None,
            &input,
            &input.identity(),
            t0(),
            &mut StdRng::seed_from_u64(1),
        );

        assert!(outcome.directive.is_none());
        let suggestion = outcome.suggestion.as_ref().unwrap();
        assert_eq!(suggestion.from, TopicCategory::Training);
        assert_ne!(suggestion.category, TopicCategory::Training);
        assert_eq!(outcome.identity.protocol_mode, ProtocolMode::Baseline);
        assert!(outcome.to_markdown().contains("## Suggested Next Topic"));
    }

    #[test]
    fn test_suggestions_can_be_disabled() {
        let engine = DialogueEngine::new().with_suggestions(false);
        let input = TurnInput::new("Hit a new squat record today");
        let outcome = engine.process_turn(
            None,
            &input,
            &input.identity(),
            t0(),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(outcome.suggestion.is_none());
    }

    #[test]
    fn test_from_settings_with_patterns_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"version = 2\n[narrative]\ncausality_phrases = [\"because\"]\n",
        )
        .unwrap();

        let settings = Settings {
            patterns_path: Some(file.path().to_string_lossy().to_string()),
            suggestions_enabled: false,
            ..Settings::default()
        };
        let engine = DialogueEngine::from_settings(&settings).unwrap();
        assert_eq!(engine.narrative().config().causality_phrases, vec!["because"]);

        // "but" is no longer a causal connective
        let input = TurnInput::new("I skipped the gym but work was busy");
        let outcome = engine.process_turn(
            None,
            &input,
            &input.identity(),
            t0(),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(!outcome.narrative.has_causality);
        assert!(outcome.suggestion.is_none());
    }

    #[tokio::test]
    async fn test_handle_turn_persists_versions() {
        let engine = DialogueEngine::new();
        let store = InMemorySessionStore::new();
        let mut rng = StdRng::seed_from_u64(5);

        let first = TurnInput::new("Squat workout today");
        let outcome = engine
            .handle_turn(&store, "s1", &first, &first.identity(), t0(), &mut rng)
            .await
            .unwrap();
        assert_eq!(outcome.version, Some(1));

        let second = TurnInput::new("Protein intake was low");
        let outcome = engine
            .handle_turn(&store, "s1", &second, &second.identity(), t0(), &mut rng)
            .await
            .unwrap();
        assert_eq!(outcome.version, Some(2));
        assert_eq!(outcome.state.secondary.len(), 1);

        let stored = store.load("s1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state, outcome.state);
    }

    /// Store that lets another writer win the first `conflicts` saves.
    struct RacingStore {
        inner: InMemorySessionStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl SessionStore for RacingStore {
        async fn load(&self, session_id: &str) -> Result<Option<VersionedState>, StoreError> {
            self.inner.load(session_id).await
        }

        async fn save(
            &self,
            session_id: &str,
            expected_version: u64,
            state: TopicState,
        ) -> Result<u64, StoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                // A concurrent device writes first
                self.inner
                    .save(session_id, expected_version, TopicState::new())
                    .await?;
            }
            self.inner.save(session_id, expected_version, state).await
        }

        async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
            self.inner.delete(session_id).await
        }
    }

    #[tokio::test]
    async fn test_handle_turn_retries_on_conflict() {
        let engine = DialogueEngine::new();
        let store = RacingStore {
            inner: InMemorySessionStore::new(),
            conflicts: AtomicU32::new(2),
        };
        let input = TurnInput::new("Squat workout today");

        let outcome = engine
            .handle_turn(
                &store,
                "s1",
                &input,
                &input.identity(),
                t0(),
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap();
        // Two competing writes landed first
        assert_eq!(outcome.version, Some(3));
    }

    #[tokio::test]
    async fn test_handle_turn_gives_up() {
        let engine = DialogueEngine::new().with_max_retries(1);
        let store = RacingStore {
            inner: InMemorySessionStore::new(),
            conflicts: AtomicU32::new(5),
        };
        let input = TurnInput::new("Squat workout today");

        let err = engine
            .handle_turn(
                &store,
                "s1",
                &input,
                &input.identity(),
                t0(),
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn load(&self, _session_id: &str) -> Result<Option<VersionedState>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn save(&self, _: &str, _: u64, _: TopicState) -> Result<u64, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let engine = DialogueEngine::new();
        let input = TurnInput::new("Squat workout today");
        let err = engine
            .handle_turn(
                &BrokenStore,
                "s1",
                &input,
                &input.identity(),
                t0(),
                &mut StdRng::seed_from_u64(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_resolve_topic_persists() {
        let engine = DialogueEngine::new();
        let store = InMemorySessionStore::new();
        let mut rng = StdRng::seed_from_u64(2);
        for utterance in ["Squat workout today", "Protein intake was low"] {
            let input = TurnInput::new(utterance);
            engine
                .handle_turn(&store, "s1", &input, &input.identity(), t0(), &mut rng)
                .await
                .unwrap();
        }

        let (saved, transition) = engine.resolve_topic(&store, "s1", t0()).await.unwrap();
        assert_eq!(saved.version, 3);
        assert_eq!(
            saved.state.primary.as_ref().unwrap().category,
            TopicCategory::Training
        );
        assert_eq!(saved.state.archived.len(), 1);
        assert!(transition.is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_session_writes_nothing() {
        let engine = DialogueEngine::new();
        let store = InMemorySessionStore::new();

        let (outcome, transition) = engine.resolve_topic(&store, "ghost", t0()).await.unwrap();
        assert!(transition.is_none());
        assert_eq!(outcome.version, 0);
        assert!(outcome.state.primary.is_none());
        assert!(store.is_empty().await);
        assert!(store.load("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_primary_keeps_version() {
        let engine = DialogueEngine::new();
        let store = InMemorySessionStore::new();
        store.save("s1", 0, TopicState::new()).await.unwrap();

        let (outcome, transition) = engine.resolve_topic(&store, "s1", t0()).await.unwrap();
        assert!(transition.is_none());
        assert_eq!(outcome.version, 1);
        assert_eq!(store.load("s1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_profile_resolver_from_settings() {
        let provider = Arc::new(MockProfileProvider::new().with_mode("u1", "clinical"));
        let settings = Settings::default();
        let resolver = profile_resolver(provider, &settings);

        let resolution = resolver.resolve("u1").await;
        assert_eq!(resolution.context.protocol_mode, ProtocolMode::Supervised);
    }
}
