//! Narrative classification E2E tests.
//!
//! Drives utterances through the full engine and checks the verdict, the
//! directive that accompanies it, and the priority rules between verdicts.

use pretty_assertions::assert_eq;

use dialogue_narrative::{ExcuseType, NarrativeClassifier, NarrativeVerdict};
use e2e_tests::Conversation;

/// An apology with a concrete miss and no justification is taken at face value.
#[test]
fn test_scenario_a_honest_admission() {
    let mut chat = Conversation::new();
    let outcome = chat.say("Sorry, I skipped the workout, my bad");

    assert!(outcome.narrative.is_honest_admission);
    assert!(!outcome.narrative.detected);
    assert_eq!(outcome.narrative.verdict(), NarrativeVerdict::HonestAdmission);
    assert!(outcome.narrative.has_failure_indicator);
    assert!(
        outcome.directive.is_none(),
        "An admission must never produce a correction directive"
    );
}

/// A missed session justified by circumstance is an excuse and gets a directive.
#[test]
fn test_scenario_b_causal_excuse() {
    let mut chat = Conversation::new();
    let outcome = chat.say("I couldn't train because work was insane");
    let analysis = &outcome.narrative;

    assert!(analysis.has_causality);
    assert!(analysis.detected);
    assert!(matches!(
        analysis.excuse_type,
        Some(ExcuseType::Time) | Some(ExcuseType::External)
    ));
    assert!(analysis.confidence >= 0.75);

    let directive = outcome.directive.expect("excuse should produce a directive");
    assert_eq!(Some(directive.excuse_type), analysis.excuse_type);
    assert!(directive.validate().is_valid);
    assert!(
        outcome.suggestion.is_none(),
        "No topic suggestion may accompany a directive"
    );
}

/// Frustration without a concrete miss is venting, never an excuse.
#[test]
fn test_scenario_c_venting() {
    let mut chat = Conversation::new();
    let outcome = chat.say("Ugh, what a brutal day");

    assert!(outcome.narrative.is_venting);
    assert!(!outcome.narrative.detected);
    assert!(!outcome.narrative.has_failure_indicator);
    assert!(outcome.directive.is_none());

    // A temporal "since" is not a justification
    let outcome = chat.say("Ugh, I've felt flat since the weekend");
    assert!(outcome.narrative.is_venting);
    assert!(!outcome.narrative.has_causality);
}

/// Admission wins over excuse keywords as long as no causal connective appears.
#[test]
fn test_admission_priority_over_excuse_keywords() {
    let classifier = NarrativeClassifier::new();
    for utterance in [
        "My fault, I was tired and skipped leg day",
        "I messed up, busy week and I missed two sessions",
        "No excuses, I ate junk at the office party",
        "My bad, I haven't trained since Monday",
        "That's on me, so I will plan better",
    ] {
        let analysis = classifier.classify(utterance);
        assert!(!analysis.has_causality, "{utterance}");
        assert!(analysis.is_honest_admission, "{utterance}");
        assert!(!analysis.detected, "{utterance}");
    }
}

/// An admission hedged with a justification is an excuse.
#[test]
fn test_hedged_admission_is_excuse() {
    let analysis = NarrativeClassifier::new()
        .classify("Sorry, I skipped the gym because I was exhausted");
    assert!(analysis.has_causality);
    assert!(analysis.detected);
    assert!(!analysis.is_honest_admission);
    assert_eq!(analysis.excuse_type, Some(ExcuseType::Energy));
}

/// Without a causal connective, nothing is ever an excuse.
#[test]
fn test_causality_gating() {
    let classifier = NarrativeClassifier::new();
    for utterance in [
        "I skipped the gym, too tired",
        "Missed cardio, busy week at work",
        "Traffic was terrible and I went over my macros",
        "Stressed out and fell off the plan",
        "Just a rough day honestly",
        "Squat workout today",
    ] {
        let analysis = classifier.classify(utterance);
        assert!(!analysis.has_causality, "{utterance}");
        assert!(!analysis.detected, "Excuse without causality: {utterance}");
        assert!(analysis.excuse_type.is_none(), "{utterance}");
    }
}

/// A justified miss with no known subtype is a rationalization.
#[test]
fn test_rationalization_claim() {
    let analysis =
        NarrativeClassifier::new().classify("I skipped the session because it felt pointless");
    assert!(analysis.detected);
    assert_eq!(analysis.excuse_type, Some(ExcuseType::Rationalization));
    assert_eq!(analysis.original_claim, "it felt pointless");
}

/// Directive strictness follows the declared tier.
#[test]
fn test_directive_calibrated_by_tier() {
    let utterance = "I didn't have time because of meetings";
    let level = |mode: &str| {
        let mut chat = Conversation::new().with_protocol_mode(mode);
        chat.say(utterance)
            .directive
            .expect("directive expected")
            .challenge_level
    };

    let natural = level("natural");
    let clinical = level("clinical");
    let enhanced = level("enhanced");
    let combined = level("enhanced,clinical");

    assert!(natural < clinical);
    assert!(clinical < enhanced);
    assert!(enhanced < combined);
}

/// Short utterances and small talk get no verdict.
#[test]
fn test_small_talk_has_no_verdict() {
    let classifier = NarrativeClassifier::new();
    for utterance in ["ok", "", "   ", "Thanks, talk tomorrow"] {
        assert_eq!(classifier.classify(utterance).verdict(), NarrativeVerdict::None);
    }
}
