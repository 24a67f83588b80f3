//! Topic graph and proactive suggestions.
//!
//! A static adjacency map links each category to the subjects that naturally
//! follow it in a coaching conversation. The suggester walks the map from the
//! current primary category and proposes one category that has not come up
//! yet, together with a canned transition phrase for the downstream generator.
//!
//! ## Usage
//!
//! ```rust
//! use dialogue_topics::{TopicGraphSuggester, TopicState};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let suggester = TopicGraphSuggester::new();
//! let mut rng = StdRng::seed_from_u64(7);
//! let suggestion = suggester.suggest(&TopicState::new(), &[], &mut rng);
//! assert!(suggestion.is_some());
//! ```

use std::collections::{BTreeSet, HashMap};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::TopicClassifier;
use crate::types::{TopicCategory, TopicState};

/// A proposed next subject to raise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicSuggestion {
    /// Category the walk started from
    pub from: TopicCategory,
    /// Suggested category
    pub category: TopicCategory,
    /// Canned phrase the generator can adapt to introduce the subject
    pub transition_phrase: String,
    /// Whether the category matched one of the caller's goal keywords
    pub goal_relevant: bool,
}

/// Suggests the next topic by walking the category adjacency map.
#[derive(Debug, Clone)]
pub struct TopicGraphSuggester {
    adjacency: HashMap<TopicCategory, Vec<TopicCategory>>,
    phrases: HashMap<TopicCategory, Vec<String>>,
    classifier: TopicClassifier,
}

impl TopicGraphSuggester {
    /// Create a suggester with the built-in map and the default classifier
    /// for goal matching.
    pub fn new() -> Self {
        Self::with_classifier(TopicClassifier::new())
    }

    /// Create a suggester that matches goal keywords with `classifier`.
    pub fn with_classifier(classifier: TopicClassifier) -> Self {
        Self {
            adjacency: default_adjacency(),
            phrases: default_phrases(),
            classifier,
        }
    }

    /// Categories adjacent to `category`, in map order.
    pub fn neighbors(&self, category: TopicCategory) -> &[TopicCategory] {
        self.adjacency
            .get(&category)
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    /// Categories the caller's goal keywords point at.
    pub fn goal_categories(&self, goals: &[String]) -> BTreeSet<TopicCategory> {
        goals
            .iter()
            .filter_map(|goal| {
                TopicCategory::from_code(goal).or_else(|| {
                    let classification = self.classifier.classify(goal);
                    (classification.category != TopicCategory::General)
                        .then_some(classification.category)
                })
            })
            .collect()
    }

    /// Propose one category to raise next, or `None` when every neighbor of
    /// the current category has already been discussed.
    pub fn suggest<R: Rng + ?Sized>(
        &self,
        state: &TopicState,
        goals: &[String],
        rng: &mut R,
    ) -> Option<TopicSuggestion> {
        let from = state.current_category();
        let discussed = state.discussed_categories();

        let candidates: Vec<TopicCategory> = self
            .neighbors(from)
            .iter()
            .copied()
            .filter(|c| *c != from && !discussed.contains(c))
            .collect();

        let wanted = self.goal_categories(goals);
        let relevant: Vec<TopicCategory> = candidates
            .iter()
            .copied()
            .filter(|c| wanted.contains(c))
            .collect();
        let goal_relevant = !relevant.is_empty();
        let pool = if goal_relevant { relevant } else { candidates };

        let category = *pool.choose(rng)?;
        let transition_phrase = self
            .phrases
            .get(&category)
            .and_then(|p| p.choose(rng))
            .cloned()
            .unwrap_or_else(|| format!("Let's talk about {}.", category.label().to_lowercase()));

        debug!(
            from = %from,
            category = %category,
            pool = pool.len(),
            goal_relevant = goal_relevant,
            "Topic suggestion"
        );

        Some(TopicSuggestion {
            from,
            category,
            transition_phrase,
            goal_relevant,
        })
    }
}

impl Default for TopicGraphSuggester {
    fn default() -> Self {
        Self::new()
    }
}

fn default_adjacency() -> HashMap<TopicCategory, Vec<TopicCategory>> {
    use TopicCategory::*;

    HashMap::from([
        (Training, vec![Nutrition, Recovery, Sleep, Supplements]),
        (Nutrition, vec![Training, Supplements, Bloodwork]),
        (Supplements, vec![Nutrition, Hormones, Bloodwork]),
        (Sleep, vec![Recovery, Hormones, Mindset]),
        (Hormones, vec![Bloodwork, Protocol, Sleep]),
        (Bloodwork, vec![Hormones, Protocol, Nutrition]),
        (Mindset, vec![Training, Lifestyle, Sleep]),
        (Recovery, vec![Sleep, Training, Nutrition]),
        (Lifestyle, vec![Mindset, Sleep, Nutrition]),
        (Protocol, vec![Bloodwork, Hormones, Supplements]),
        (General, vec![Training, Nutrition, Sleep, Mindset]),
    ])
}

fn default_phrases() -> HashMap<TopicCategory, Vec<String>> {
    use TopicCategory::*;

    let table: [(TopicCategory, &[&str]); 10] = [
        (
            Training,
            &[
                "How has training been going this week?",
                "Want to look at how your sessions are progressing?",
            ],
        ),
        (
            Nutrition,
            &[
                "How is your eating lining up with the plan?",
                "Have you been hitting your protein lately?",
            ],
        ),
        (
            Supplements,
            &[
                "Are you still taking the same supplements?",
                "Anything changed in your supplement stack?",
            ],
        ),
        (
            Sleep,
            &[
                "How have you been sleeping?",
                "Is your sleep holding up with everything going on?",
            ],
        ),
        (
            Hormones,
            &["Have you noticed any changes in energy or libido?"],
        ),
        (
            Bloodwork,
            &[
                "When did you last get bloodwork done?",
                "Any new lab results to go over?",
            ],
        ),
        (
            Mindset,
            &[
                "How is your head in all of this?",
                "How is motivation holding up?",
            ],
        ),
        (
            Recovery,
            &[
                "How is your body recovering between sessions?",
                "Any soreness or niggles we should plan around?",
            ],
        ),
        (
            Lifestyle,
            &["How is work and life outside the gym treating you?"],
        ),
        (
            Protocol,
            &["Is the current protocol still working for you?"],
        ),
    ];

    table
        .into_iter()
        .map(|(category, phrases)| {
            (
                category,
                phrases.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            )
        })
        .collect()
}
