//! Topic classification for utterances.
//!
//! This module implements the `TopicClassifier` which maps an utterance to one
//! of the fixed topic categories using keyword hit counts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::types::{Topic, TopicCategory};

/// Result of topic classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicClassification {
    /// The winning category (`General` when nothing matched)
    pub category: TopicCategory,

    /// Confidence score (0.0-0.95)
    pub confidence: f32,

    /// Keywords of the winning category found in the utterance, in table order
    pub matched_keywords: Vec<String>,
}

impl TopicClassification {
    /// Topic name derived from this classification.
    pub fn topic_name(&self) -> String {
        TopicClassifier::topic_name(self.category, &self.matched_keywords)
    }
}

/// Topic classifier using keyword heuristics.
///
/// Pure function of its tables: the same utterance always produces the same
/// classification.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    config: ClassifierConfig,
    /// Lowercased keyword tables in tie-break order
    tables: Vec<(TopicCategory, Vec<String>)>,
}

impl TopicClassifier {
    /// Create a new classifier with the default keyword tables.
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    /// Create a classifier with custom configuration.
    pub fn with_config(config: ClassifierConfig) -> Self {
        let tables = config
            .categories
            .iter()
            .map(|table| {
                let keywords = table
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (table.category, keywords)
            })
            .collect();

        Self { config, tables }
    }

    /// Classify the topic of an utterance.
    pub fn classify(&self, utterance: &str) -> TopicClassification {
        let lower = utterance.to_lowercase();
        let word_count = lower.split_whitespace().count().max(1);

        let mut best: Option<(TopicCategory, Vec<String>)> = None;
        for (category, keywords) in &self.tables {
            let matches: Vec<String> = keywords
                .iter()
                .filter(|k| lower.contains(k.as_str()))
                .cloned()
                .collect();

            let best_hits = best.as_ref().map(|(_, m)| m.len()).unwrap_or(0);
            // Strictly greater keeps the earlier category on ties
            if matches.len() > best_hits {
                best = Some((*category, matches));
            }
        }

        let result = match best {
            Some((category, matched_keywords)) => {
                let hits = matched_keywords.len() as f32;
                let confidence = (self.config.base_confidence
                    + self.config.hit_weight * hits / word_count as f32)
                    .min(self.config.max_confidence);
                TopicClassification {
                    category,
                    confidence,
                    matched_keywords,
                }
            }
            None => TopicClassification {
                category: TopicCategory::General,
                confidence: self.config.no_match_confidence,
                matched_keywords: Vec::new(),
            },
        };

        debug!(
            category = %result.category,
            confidence = result.confidence,
            hits = result.matched_keywords.len(),
            word_count = word_count,
            "Topic classification"
        );

        result
    }

    /// Keywords configured for a category (lowercased).
    pub fn keywords_for(&self, category: TopicCategory) -> &[String] {
        self.tables
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, k)| k.as_slice())
            .unwrap_or(&[])
    }

    /// Build a topic name: `"<Label>: <Capitalized first keyword>"`, or the
    /// bare label when there are no keywords.
    pub fn topic_name(category: TopicCategory, keywords: &[String]) -> String {
        match keywords.first() {
            Some(keyword) => format!("{}: {}", category.label(), capitalize(keyword)),
            None => category.label().to_string(),
        }
    }

    /// Whether two topics refer to the same subject.
    pub fn similar(a: &Topic, b: &Topic) -> bool {
        a.is_similar_to(b.category, &b.name)
    }
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
