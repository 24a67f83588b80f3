//! Shift signal detection.
//!
//! Finds cues that the user wants to change subject. The phrase table is
//! scanned in order (explicit, implicit, tangent, interrogative openers) and
//! the first match wins. A short utterance that opens with a question word is
//! reported as a `Question` signal when no phrase matched.

use std::collections::HashSet;

use tracing::debug;

use crate::config::ShiftConfig;
use crate::types::{ShiftSignal, ShiftType};

/// Detects topic-change signals in an utterance.
#[derive(Debug, Clone)]
pub struct ShiftSignalDetector {
    /// Lowercased phrase table in scan order
    phrases: Vec<(String, ShiftType)>,
    openers: HashSet<String>,
    max_question_length: usize,
}

impl ShiftSignalDetector {
    /// Create a detector with the default phrase table.
    pub fn new() -> Self {
        Self::with_config(ShiftConfig::default())
    }

    /// Create a detector with custom configuration.
    pub fn with_config(config: ShiftConfig) -> Self {
        let phrases = config
            .phrases
            .iter()
            .map(|p| (p.phrase.trim().to_lowercase(), p.shift_type))
            .filter(|(p, _)| !p.is_empty())
            .collect();
        let openers = config
            .interrogative_openers
            .iter()
            .map(|w| w.trim().to_lowercase())
            .collect();

        Self {
            phrases,
            openers,
            max_question_length: config.max_question_length,
        }
    }

    /// Detect a shift signal, if any.
    pub fn detect(&self, utterance: &str) -> Option<ShiftSignal> {
        let lower = utterance.to_lowercase();

        if let Some((phrase, shift_type)) = self
            .phrases
            .iter()
            .find(|(phrase, _)| lower.contains(phrase.as_str()))
        {
            debug!(phrase = %phrase, shift_type = shift_type.as_str(), "Shift phrase matched");
            return Some(ShiftSignal::new(*shift_type, Some(phrase.clone())));
        }

        if self.opens_with_question_word(&lower)
            && utterance.trim().chars().count() < self.max_question_length
        {
            debug!("Short interrogative utterance treated as question shift");
            return Some(ShiftSignal::new(ShiftType::Question, None));
        }

        None
    }

    /// Whether the utterance reads as a question: it ends with `?` or opens
    /// with an interrogative word.
    pub fn is_interrogative(&self, utterance: &str) -> bool {
        let trimmed = utterance.trim();
        trimmed.ends_with('?') || self.opens_with_question_word(&trimmed.to_lowercase())
    }

    fn opens_with_question_word(&self, lower: &str) -> bool {
        lower
            .split_whitespace()
            .next()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .is_some_and(|word| self.openers.contains(word))
    }
}

impl Default for ShiftSignalDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShiftPhrase;

    #[test]
    fn test_explicit_shift() {
        let detector = ShiftSignalDetector::new();
        let signal = detector
            .detect("Let's talk about my diet for a second")
            .unwrap();
        assert_eq!(signal.shift_type, ShiftType::Explicit);
        assert!((signal.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(signal.detected_phrase.as_deref(), Some("let's talk about"));
    }

    #[test]
    fn test_implicit_shift() {
        let detector = ShiftSignalDetector::new();
        let signal = detector.detect("Oh, by the way, my sleep is off").unwrap();
        assert_eq!(signal.shift_type, ShiftType::Implicit);
        assert!((signal.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_tangent_shift() {
        let detector = ShiftSignalDetector::new();
        let signal = detector.detect("Random thought: cold plunges?").unwrap();
        assert_eq!(signal.shift_type, ShiftType::Tangent);
        assert!((signal.confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_explicit_wins_over_implicit() {
        let detector = ShiftSignalDetector::new();
        // Contains both an implicit and an explicit phrase
        let signal = detector
            .detect("By the way, can we talk about supplements")
            .unwrap();
        assert_eq!(signal.shift_type, ShiftType::Explicit);
    }

    #[test]
    fn test_question_phrase() {
        let detector = ShiftSignalDetector::new();
        let signal = detector.detect("And what about fasting").unwrap();
        assert_eq!(signal.shift_type, ShiftType::Question);
        assert_eq!(signal.detected_phrase.as_deref(), Some("what about"));
    }

    #[test]
    fn test_interrogative_fallback() {
        let detector = ShiftSignalDetector::new();
        let signal = detector.detect("Should I take creatine daily?").unwrap();
        assert_eq!(signal.shift_type, ShiftType::Question);
        assert!((signal.confidence - 0.4).abs() < f32::EPSILON);
        assert!(signal.detected_phrase.is_none());
    }

    #[test]
    fn test_long_question_is_not_a_shift() {
        let detector = ShiftSignalDetector::new();
        let long = format!("Should I {}", "keep going with the same plan ".repeat(5));
        assert!(long.len() >= 100);
        assert!(detector.detect(&long).is_none());
        // Still reads as a question for bookkeeping
        assert!(detector.is_interrogative(&long));
    }

    #[test]
    fn test_no_signal() {
        let detector = ShiftSignalDetector::new();
        assert!(detector.detect("I hit all my sets today").is_none());
        assert!(detector.detect("").is_none());
    }

    #[test]
    fn test_opener_must_be_whole_word() {
        let detector = ShiftSignalDetector::new();
        // "Island" starts with "is" but is not the word "is"
        assert!(detector.detect("Island trip next week").is_none());
        assert!(!detector.is_interrogative("Island trip next week"));
    }

    #[test]
    fn test_is_interrogative() {
        let detector = ShiftSignalDetector::new();
        assert!(detector.is_interrogative("you think that's enough protein?"));
        assert!(detector.is_interrogative("How many sets"));
        assert!(!detector.is_interrogative("I slept well"));
    }

    #[test]
    fn test_custom_phrases() {
        let config = ShiftConfig {
            phrases: vec![ShiftPhrase {
                phrase: "Pivot".to_string(),
                shift_type: ShiftType::Explicit,
            }],
            ..ShiftConfig::default()
        };
        let detector = ShiftSignalDetector::with_config(config);
        let signal = detector.detect("time to pivot").unwrap();
        assert_eq!(signal.shift_type, ShiftType::Explicit);
        assert!(detector.detect("by the way").is_none());
    }
}
