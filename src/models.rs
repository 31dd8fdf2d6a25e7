use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Policy;

/// Structured identity of a concept inside a course.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptKey {
    pub topic: String,
    pub subtopic: String,
    pub concept: String,
}

impl ConceptKey {
    pub fn new(
        topic: impl Into<String>,
        subtopic: impl Into<String>,
        concept: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subtopic: subtopic.into(),
            concept: concept.into(),
        }
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.topic, self.subtopic, self.concept)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryLevel {
    New,
    Struggling,
    Developing,
    Mastered,
}

impl MasteryLevel {
    /// A single attempt is not enough evidence for either extreme, so it
    /// reports as developing.
    pub fn classify(attempts: u32, accuracy: f64, policy: &Policy) -> Self {
        if attempts == 0 {
            MasteryLevel::New
        } else if attempts < policy.min_attempts {
            MasteryLevel::Developing
        } else if accuracy < policy.weak_threshold {
            MasteryLevel::Struggling
        } else if accuracy >= policy.mastery_threshold {
            MasteryLevel::Mastered
        } else {
            MasteryLevel::Developing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::New => "new",
            MasteryLevel::Struggling => "struggling",
            MasteryLevel::Developing => "developing",
            MasteryLevel::Mastered => "mastered",
        }
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correct over attempts, 0 when nothing was attempted.
pub(crate) fn ratio(correct: u32, attempts: u32) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(attempts)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptScore {
    pub attempts: u32,
    pub correct: u32,
    pub incorrect: u32,
}

impl ConceptScore {
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.attempts)
    }

    pub fn is_weak(&self, policy: &Policy) -> bool {
        self.attempts >= policy.min_attempts && self.accuracy() < policy.weak_threshold
    }

    pub fn mastery(&self, policy: &Policy) -> MasteryLevel {
        MasteryLevel::classify(self.attempts, self.accuracy(), policy)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtopicScore {
    pub concept_scores: BTreeMap<String, ConceptScore>,
    pub overall_accuracy: f64,
}

impl SubtopicScore {
    /// `(correct, attempts)` summed over every concept.
    pub fn totals(&self) -> (u32, u32) {
        self.concept_scores
            .values()
            .fold((0, 0), |(correct, attempts), score| {
                (correct + score.correct, attempts + score.attempts)
            })
    }

    pub fn recompute(&mut self) {
        let (correct, attempts) = self.totals();
        self.overall_accuracy = ratio(correct, attempts);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicScore {
    pub subtopic_scores: BTreeMap<String, SubtopicScore>,
    pub overall_accuracy: f64,
}

impl TopicScore {
    pub fn totals(&self) -> (u32, u32) {
        self.subtopic_scores
            .values()
            .map(SubtopicScore::totals)
            .fold((0, 0), |(correct, attempts), (c, a)| (correct + c, attempts + a))
    }

    /// Pools raw counts, so stale subtopic accuracies never leak upward.
    pub fn recompute(&mut self) {
        let (correct, attempts) = self.totals();
        self.overall_accuracy = ratio(correct, attempts);
    }
}

/// Per-learner snapshot. The caller owns it between turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub total_questions_answered: u32,
    pub total_correct: u32,
    pub total_incorrect: u32,
    pub trophy_score: u32,
    pub overall_accuracy: f64,
    pub topic_scores: BTreeMap<String, TopicScore>,
}

/// Borrowed view of one concept score with its position in the tree.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEntry<'a> {
    pub topic: &'a str,
    pub subtopic: &'a str,
    pub concept: &'a str,
    pub score: &'a ConceptScore,
}

impl ScoreEntry<'_> {
    pub fn key(&self) -> ConceptKey {
        ConceptKey::new(self.topic, self.subtopic, self.concept)
    }
}

impl Performance {
    pub fn concepts(&self) -> impl Iterator<Item = ScoreEntry<'_>> + '_ {
        self.topic_scores.iter().flat_map(|(topic, topic_score)| {
            topic_score
                .subtopic_scores
                .iter()
                .flat_map(move |(subtopic, subtopic_score)| {
                    subtopic_score
                        .concept_scores
                        .iter()
                        .map(move |(concept, score)| ScoreEntry {
                            topic: topic.as_str(),
                            subtopic: subtopic.as_str(),
                            concept: concept.as_str(),
                            score,
                        })
                })
        })
    }

    pub fn concept_score(&self, key: &ConceptKey) -> Option<&ConceptScore> {
        self.topic_scores
            .get(&key.topic)?
            .subtopic_scores
            .get(&key.subtopic)?
            .concept_scores
            .get(&key.concept)
    }

    /// Pooled accuracy of a topic, `None` until something in it was attempted.
    pub fn topic_accuracy(&self, topic: &str) -> Option<f64> {
        let topic_score = self.topic_scores.get(topic)?;
        let (correct, attempts) = topic_score.totals();
        (attempts > 0).then(|| ratio(correct, attempts))
    }

    pub fn recompute(&mut self) {
        self.overall_accuracy = ratio(self.total_correct, self.total_questions_answered);
    }
}

/// One answered question, as it arrives from the quiz layer or an answer log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub topic: String,
    pub subtopic: String,
    pub concept: String,
    pub is_correct: bool,
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_key: Option<String>,
}

impl AnswerEvent {
    pub fn new(
        topic: impl Into<String>,
        subtopic: impl Into<String>,
        concept: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            topic: topic.into(),
            subtopic: subtopic.into(),
            concept: concept.into(),
            is_correct,
            answered_at: None,
            source_key: None,
        }
    }

    pub fn key(&self) -> ConceptKey {
        ConceptKey::new(&self.topic, &self.subtopic, &self.concept)
    }
}
