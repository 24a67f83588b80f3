//! Identity resolution for correction calibration.
//!
//! Maps a user's declared protocol mode to one of four fixed tiers. The pure
//! [`IdentityResolver`] never fails: anything it does not recognise resolves
//! to the baseline tier. [`ProfileIdentityResolver`] wraps the upstream
//! profile fetch, the only I/O boundary of the engine, with a timeout and a
//! short per-user cache, and degrades to baseline when the fetch fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::NarrativeError;
use crate::types::{IdentityContext, ProtocolMode};

const ASSISTED_TOKENS: &[&str] = &["assisted", "enhanced"];
const SUPERVISED_TOKENS: &[&str] = &["supervised", "clinical"];

/// Pure protocol-mode resolver.
pub struct IdentityResolver;

impl IdentityResolver {
    /// Normalize a declared mode string to a tier.
    ///
    /// The string is split on every non-alphanumeric character, so
    /// `"enhanced,clinical"`, `"clinical + enhanced"` and `"enhanced-clinical"`
    /// are the same tier.
    pub fn normalize(mode: Option<&str>) -> ProtocolMode {
        let Some(raw) = mode else {
            return ProtocolMode::Baseline;
        };
        let lower = raw.trim().to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let assisted = tokens.iter().any(|t| ASSISTED_TOKENS.contains(t));
        let supervised = tokens.iter().any(|t| SUPERVISED_TOKENS.contains(t));

        match tokens.as_slice() {
            _ if assisted && supervised => ProtocolMode::Combined,
            [single] if SUPERVISED_TOKENS.contains(single) => ProtocolMode::Supervised,
            [single] if ASSISTED_TOKENS.contains(single) => ProtocolMode::Assisted,
            ["combined"] => ProtocolMode::Combined,
            _ => ProtocolMode::Baseline,
        }
    }

    /// Resolve a declared mode string to its tier record.
    pub fn resolve(mode: Option<&str>) -> IdentityContext {
        Self::context_for(Self::normalize(mode))
    }

    /// The fixed record for a tier.
    pub fn context_for(mode: ProtocolMode) -> IdentityContext {
        let (label, description, challenge_baseline, directive_fragment) = match mode {
            ProtocolMode::Baseline => (
                "natural",
                "Training and nutrition without an assisted protocol",
                5,
                "Consistency is the only lever a natural athlete has; every missed \
                 session is progress that does not come back.",
            ),
            ProtocolMode::Assisted => (
                "enhanced",
                "Self-directed assisted protocol",
                7,
                "They chose an assisted protocol; training and nutrition that fall \
                 behind it waste the protocol and add risk for nothing.",
            ),
            ProtocolMode::Supervised => (
                "clinical",
                "Protocol run under medical supervision",
                6,
                "Their care team reads results against the plan; unreported deviations \
                 make that data unreliable.",
            ),
            ProtocolMode::Combined => (
                "enhanced clinical",
                "Assisted protocol run under medical supervision",
                8,
                "They are enhanced and clinically monitored; the standard is the \
                 highest there is and the plan is not optional.",
            ),
        };

        IdentityContext {
            protocol_mode: mode,
            label: label.to_string(),
            description: description.to_string(),
            challenge_baseline,
            directive_fragment: directive_fragment.to_string(),
        }
    }
}

/// Upstream source of a user's declared protocol mode.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetch the protocol-mode string from the user's profile.
    ///
    /// `Ok(None)` means the profile has no mode set.
    async fn protocol_mode(&self, user_id: &str) -> Result<Option<String>, NarrativeError>;
}

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Fresh profile fetch
    Profile,
    /// Cached profile fetch
    Cache,
    /// Fetch failed or timed out; baseline used
    Fallback,
}

/// Result of a profile-backed identity resolution.
#[derive(Debug, Clone)]
pub struct IdentityResolution {
    pub context: IdentityContext,

    pub source: ResolutionSource,

    /// Problems encountered; never shown to the end user
    pub warnings: Vec<String>,

    /// Time taken for the fetch
    pub fetch_time_ms: u64,
}

/// Identity resolver backed by the profile collaborator.
pub struct ProfileIdentityResolver<P: ProfileProvider> {
    provider: Arc<P>,
    /// Timeout for the profile fetch
    timeout: Duration,
    /// How long a fetched mode stays valid
    cache_duration: Duration,
    cache: Mutex<HashMap<String, (Option<String>, Instant)>>,
}

impl<P: ProfileProvider> ProfileIdentityResolver<P> {
    /// Create a resolver with default timeout (250ms) and cache (60s).
    pub fn new(provider: Arc<P>) -> Self {
        Self::with_timeout(provider, Duration::from_millis(250))
    }

    /// Create a resolver with a custom fetch timeout.
    pub fn with_timeout(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            cache_duration: Duration::from_secs(60),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Set the cache duration.
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    /// Resolve a user's identity, never failing.
    pub async fn resolve(&self, user_id: &str) -> IdentityResolution {
        let start = Instant::now();

        if let Some(mode) = self.get_cached(user_id) {
            debug!(user_id = %user_id, "Using cached protocol mode");
            return IdentityResolution {
                context: IdentityResolver::resolve(mode.as_deref()),
                source: ResolutionSource::Cache,
                warnings: Vec::new(),
                fetch_time_ms: start.elapsed().as_millis() as u64,
            };
        }

        match self.fetch_with_timeout(user_id).await {
            Ok(mode) => {
                self.set_cached(user_id, mode.clone());
                let context = IdentityResolver::resolve(mode.as_deref());
                let fetch_time_ms = start.elapsed().as_millis() as u64;
                info!(
                    user_id = %user_id,
                    protocol_mode = %context.protocol_mode,
                    fetch_time_ms = fetch_time_ms,
                    "Resolved identity from profile"
                );
                IdentityResolution {
                    context,
                    source: ResolutionSource::Profile,
                    warnings: Vec::new(),
                    fetch_time_ms,
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile fetch failed, using baseline tier");
                IdentityResolution {
                    context: IdentityResolver::context_for(ProtocolMode::Baseline),
                    source: ResolutionSource::Fallback,
                    warnings: vec![format!("Profile fetch failed: {}", e)],
                    fetch_time_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }

    /// Drop every cached mode.
    pub fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    async fn fetch_with_timeout(&self, user_id: &str) -> Result<Option<String>, NarrativeError> {
        match tokio::time::timeout(self.timeout, self.provider.protocol_mode(user_id)).await {
            Ok(result) => result,
            Err(_) => Err(NarrativeError::ProfileUnavailable(format!(
                "fetch timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Number of users with a cached mode, expired or not.
    pub fn cached_users(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn get_cached(&self, user_id: &str) -> Option<Option<String>> {
        let mut cache = self.cache.lock().ok()?;
        let (mode, fetched_at) = cache.get(user_id)?;
        if fetched_at.elapsed() < self.cache_duration {
            return Some(mode.clone());
        }
        cache.remove(user_id);
        None
    }

    fn set_cached(&self, user_id: &str, mode: Option<String>) {
        if let Ok(mut cache) = self.cache.lock() {
            // Sweep expired entries so users seen once do not accumulate
            let ttl = self.cache_duration;
            cache.retain(|_, (_, fetched_at)| fetched_at.elapsed() < ttl);
            cache.insert(user_id.to_string(), (mode, Instant::now()));
        }
    }
}

/// Mock profile provider for testing.
#[derive(Default)]
pub struct MockProfileProvider {
    modes: HashMap<String, String>,
    fail: bool,
    delay: Option<Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockProfileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's protocol mode.
    pub fn with_mode(mut self, user_id: &str, mode: &str) -> Self {
        self.modes.insert(user_id.to_string(), mode.to_string());
        self
    }

    /// Make every fetch fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delay every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileProvider for MockProfileProvider {
    async fn protocol_mode(&self, user_id: &str) -> Result<Option<String>, NarrativeError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(NarrativeError::ProfileUnavailable(
                "profile store offline".to_string(),
            ));
        }
        Ok(self.modes.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_single_tokens() {
        assert_eq!(
            IdentityResolver::normalize(Some("assisted")),
            ProtocolMode::Assisted
        );
        assert_eq!(
            IdentityResolver::normalize(Some(" Enhanced ")),
            ProtocolMode::Assisted
        );
        assert_eq!(
            IdentityResolver::normalize(Some("SUPERVISED")),
            ProtocolMode::Supervised
        );
        assert_eq!(
            IdentityResolver::normalize(Some("clinical")),
            ProtocolMode::Supervised
        );
        assert_eq!(
            IdentityResolver::normalize(Some("combined")),
            ProtocolMode::Combined
        );
    }

    #[test]
    fn test_normalize_combined_is_order_independent() {
        let a = IdentityResolver::resolve(Some("enhanced,clinical"));
        let b = IdentityResolver::resolve(Some("clinical,enhanced"));
        assert_eq!(a, b);
        assert_eq!(a.protocol_mode, ProtocolMode::Combined);
        assert_eq!(
            IdentityResolver::normalize(Some("assisted + supervised")),
            ProtocolMode::Combined
        );
        assert_eq!(
            IdentityResolver::normalize(Some("Supervised/Assisted")),
            ProtocolMode::Combined
        );
    }

    #[test]
    fn test_normalize_splits_on_any_separator() {
        for raw in [
            "enhanced-clinical",
            "enhanced_clinical",
            "assisted;supervised",
            "clinical|enhanced",
        ] {
            assert_eq!(
                IdentityResolver::normalize(Some(raw)),
                ProtocolMode::Combined,
                "{raw}"
            );
        }
        assert_eq!(
            IdentityResolver::normalize(Some("-clinical-")),
            ProtocolMode::Supervised
        );
    }

    #[test]
    fn test_normalize_defaults_to_baseline() {
        assert_eq!(IdentityResolver::normalize(None), ProtocolMode::Baseline);
        assert_eq!(IdentityResolver::normalize(Some("")), ProtocolMode::Baseline);
        assert_eq!(
            IdentityResolver::normalize(Some("superhuman")),
            ProtocolMode::Baseline
        );
        // Extra unknown tokens around a single class are not trusted
        assert_eq!(
            IdentityResolver::normalize(Some("kind of assisted")),
            ProtocolMode::Baseline
        );
    }

    #[test]
    fn test_tier_records_are_fixed() {
        for mode in ProtocolMode::all() {
            let context = IdentityResolver::context_for(*mode);
            assert_eq!(context.protocol_mode, *mode);
            assert!((1..=10).contains(&context.challenge_baseline));
            assert!(!context.label.is_empty());
            assert!(!context.directive_fragment.is_empty());
            assert_eq!(context, IdentityResolver::context_for(*mode));
        }
        assert!(
            IdentityResolver::context_for(ProtocolMode::Combined).challenge_baseline
                > IdentityResolver::context_for(ProtocolMode::Baseline).challenge_baseline
        );
    }

    #[tokio::test]
    async fn test_profile_resolution() {
        let provider = Arc::new(MockProfileProvider::new().with_mode("u1", "enhanced,clinical"));
        let resolver = ProfileIdentityResolver::new(provider);

        let resolution = resolver.resolve("u1").await;
        assert_eq!(resolution.source, ResolutionSource::Profile);
        assert_eq!(resolution.context.protocol_mode, ProtocolMode::Combined);
        assert!(resolution.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_mode_is_baseline() {
        let provider = Arc::new(MockProfileProvider::new());
        let resolver = ProfileIdentityResolver::new(provider);

        let resolution = resolver.resolve("nobody").await;
        assert_eq!(resolution.source, ResolutionSource::Profile);
        assert_eq!(resolution.context.protocol_mode, ProtocolMode::Baseline);
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_baseline() {
        let provider = Arc::new(MockProfileProvider::failing());
        let resolver = ProfileIdentityResolver::new(provider);

        let resolution = resolver.resolve("u1").await;
        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.context.protocol_mode, ProtocolMode::Baseline);
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_degrades_to_baseline() {
        let provider = Arc::new(
            MockProfileProvider::new()
                .with_mode("u1", "assisted")
                .with_delay(Duration::from_secs(5)),
        );
        let resolver = ProfileIdentityResolver::with_timeout(provider, Duration::from_millis(50));

        let resolution = resolver.resolve("u1").await;
        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert!(resolution.warnings[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_cache_works() {
        let provider = Arc::new(MockProfileProvider::new().with_mode("u1", "supervised"));
        let resolver = ProfileIdentityResolver::new(provider.clone());

        let first = resolver.resolve("u1").await;
        let second = resolver.resolve("u1").await;
        assert_eq!(first.source, ResolutionSource::Profile);
        assert_eq!(second.source, ResolutionSource::Cache);
        assert_eq!(second.context.protocol_mode, ProtocolMode::Supervised);
        assert_eq!(provider.calls(), 1);

        resolver.invalidate_cache();
        let third = resolver.resolve("u1").await;
        assert_eq!(third.source, ResolutionSource::Profile);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let provider = Arc::new(
            MockProfileProvider::new()
                .with_mode("u1", "assisted")
                .with_mode("u2", "supervised"),
        );
        let resolver =
            ProfileIdentityResolver::new(provider.clone()).with_cache_duration(Duration::ZERO);

        resolver.resolve("u1").await;
        assert_eq!(resolver.cached_users(), 1);

        // Storing u2 sweeps the expired u1 entry
        resolver.resolve("u2").await;
        assert_eq!(resolver.cached_users(), 1);

        // An expired hit is refetched, never served from the cache
        let again = resolver.resolve("u2").await;
        assert_eq!(again.source, ResolutionSource::Profile);
        assert_eq!(resolver.cached_users(), 1);
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn test_stale_lookup_removes_entry() {
        let provider = Arc::new(MockProfileProvider::new().with_mode("u1", "assisted"));
        let resolver =
            ProfileIdentityResolver::new(provider).with_cache_duration(Duration::ZERO);

        resolver.set_cached("u1", Some("assisted".to_string()));
        assert_eq!(resolver.cached_users(), 1);
        assert_eq!(resolver.get_cached("u1"), None);
        assert_eq!(resolver.cached_users(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(MockProfileProvider::failing());
        let resolver = ProfileIdentityResolver::new(provider.clone());

        resolver.resolve("u1").await;
        resolver.resolve("u1").await;
        assert_eq!(provider.calls(), 2);
    }
}
