//! # dialogue-narrative
//!
//! Narrative classification and correction directives.
//!
//! This crate decides how to respond to what a user says about a missed
//! target:
//! - **Honest admission**: accepted at face value
//! - **Venting**: frustration with no concrete miss
//! - **Excuse**: a causal justification, escalated into a [`Directive`]
//!
//! ## Components
//!
//! - [`NarrativeClassifier`]: Ordered phrase-table decision procedure
//! - [`IdentityResolver`]: Protocol mode to fixed tier record
//! - [`ProfileIdentityResolver`]: Profile-backed resolution with timeout and cache
//! - [`DirectiveComposer`]: Builds the identity-calibrated correction template
//!
//! ## Usage
//!
//! ```rust
//! use dialogue_narrative::{DirectiveComposer, IdentityResolver, NarrativeClassifier};
//!
//! let classifier = NarrativeClassifier::new();
//! let analysis = classifier.classify("I couldn't train because work was insane");
//! assert!(analysis.detected);
//!
//! let identity = IdentityResolver::resolve(Some("enhanced"));
//! let directive = DirectiveComposer::new().compose(&analysis, &identity).unwrap();
//! assert!(directive.validate().is_valid);
//! ```

pub mod classifier;
pub mod directive;
pub mod error;
pub mod identity;
pub mod types;

pub use classifier::{ClassifierConfig, ExcuseKeywords, NarrativeClassifier};
pub use directive::{
    BounceBackRule, Directive, DirectiveComposer, DirectiveIssue, DirectiveStep,
    DirectiveValidation, IssueSeverity, StepKind, MAX_CHALLENGE_LEVEL,
};
pub use error::NarrativeError;
pub use identity::{
    IdentityResolution, IdentityResolver, MockProfileProvider, ProfileIdentityResolver,
    ProfileProvider, ResolutionSource,
};
pub use types::{
    ExcuseType, IdentityContext, NarrativeAnalysis, NarrativeVerdict, ProtocolMode,
};
