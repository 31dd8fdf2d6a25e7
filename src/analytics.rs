//! Derives weak areas, priorities and mastery from a snapshot.
//!
//! Everything here is recomputed from scratch on each call; nothing is
//! cached between turns.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::config::Policy;
use crate::models::{ConceptKey, MasteryLevel, Performance};

const BEGINNER_CUTOFF: u32 = 5;
const EARLY_CUTOFF: u32 = 15;
const EARLY_INTERMEDIATE: f64 = 0.75;
const ADVANCED: f64 = 0.85;
const INTERMEDIATE: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakArea {
    pub key: ConceptKey,
    pub accuracy: f64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityReason {
    Weak,
    InsufficientData,
}

impl fmt::Display for PriorityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityReason::Weak => f.write_str("weak"),
            PriorityReason::InsufficientData => f.write_str("insufficient data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityConcept {
    pub key: ConceptKey,
    pub reason: PriorityReason,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptMastery {
    pub key: ConceptKey,
    pub level: MasteryLevel,
    pub accuracy: f64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicBreakdown {
    pub topic: String,
    pub attempts: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub subtopic_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub key: ConceptKey,
    pub urgency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for OverallLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OverallLevel::Beginner => "Beginner",
            OverallLevel::Intermediate => "Intermediate",
            OverallLevel::Advanced => "Advanced",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub weak_areas: Vec<WeakArea>,
    pub priorities: Vec<PriorityConcept>,
    pub mastery: Vec<ConceptMastery>,
    pub topics: Vec<TopicBreakdown>,
    pub review: Vec<ReviewItem>,
    pub level: OverallLevel,
    pub messages: Vec<String>,
}

impl Insights {
    pub fn is_weak(&self, key: &ConceptKey) -> bool {
        self.weak_areas.iter().any(|area| &area.key == key)
    }
}

pub fn analyze(performance: &Performance, policy: &Policy) -> Insights {
    let weak_areas = weak_areas(performance, policy);
    let topics = topic_breakdown(performance);
    let level = overall_level(performance);
    let messages = insight_messages(performance, &weak_areas, &topics, level);

    Insights {
        priorities: priority_concepts(performance, policy),
        mastery: mastery_levels(performance, policy),
        review: review_urgency(performance, policy),
        weak_areas,
        topics,
        level,
        messages,
    }
}

/// Weak concepts, lowest accuracy first; among equals the more attempted
/// concept comes first.
pub fn weak_areas(performance: &Performance, policy: &Policy) -> Vec<WeakArea> {
    let mut areas: Vec<WeakArea> = performance
        .concepts()
        .filter(|entry| entry.score.is_weak(policy))
        .map(|entry| WeakArea {
            key: entry.key(),
            accuracy: entry.score.accuracy(),
            attempts: entry.score.attempts,
        })
        .collect();

    areas.sort_by(|a, b| {
        a.accuracy
            .partial_cmp(&b.accuracy)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.attempts.cmp(&a.attempts))
            .then_with(|| a.key.cmp(&b.key))
    });
    areas
}

/// Confirmed-weak concepts followed by concepts with too few attempts to
/// judge. Within each tier the higher `(1 - accuracy) * ln(1 + attempts)`
/// comes first.
pub fn priority_concepts(performance: &Performance, policy: &Policy) -> Vec<PriorityConcept> {
    let mut priorities: Vec<PriorityConcept> = performance
        .concepts()
        .filter_map(|entry| {
            let score = entry.score;
            let reason = if score.is_weak(policy) {
                PriorityReason::Weak
            } else if score.attempts >= 1 && score.attempts < policy.min_attempts {
                PriorityReason::InsufficientData
            } else {
                return None;
            };
            Some(PriorityConcept {
                key: entry.key(),
                reason,
                score: (1.0 - score.accuracy()) * f64::from(score.attempts).ln_1p(),
            })
        })
        .collect();

    priorities.sort_by(|a, b| {
        a.reason
            .cmp(&b.reason)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.key.cmp(&b.key))
    });
    priorities
}

pub fn mastery_levels(performance: &Performance, policy: &Policy) -> Vec<ConceptMastery> {
    performance
        .concepts()
        .map(|entry| ConceptMastery {
            key: entry.key(),
            level: entry.score.mastery(policy),
            accuracy: entry.score.accuracy(),
            attempts: entry.score.attempts,
        })
        .collect()
}

/// Per-topic totals, weakest topic first.
pub fn topic_breakdown(performance: &Performance) -> Vec<TopicBreakdown> {
    let mut breakdown: Vec<TopicBreakdown> = performance
        .topic_scores
        .iter()
        .map(|(topic, score)| {
            let (correct, attempts) = score.totals();
            TopicBreakdown {
                topic: topic.clone(),
                attempts,
                correct,
                accuracy: score.overall_accuracy,
                subtopic_count: score.subtopic_scores.len(),
            }
        })
        .collect();

    breakdown.sort_by(|a, b| a.accuracy.partial_cmp(&b.accuracy).unwrap_or(Ordering::Equal));
    breakdown
}

pub fn overall_level(performance: &Performance) -> OverallLevel {
    let answered = performance.total_questions_answered;
    let accuracy = performance.overall_accuracy;

    if answered < BEGINNER_CUTOFF {
        OverallLevel::Beginner
    } else if answered < EARLY_CUTOFF {
        if accuracy >= EARLY_INTERMEDIATE {
            OverallLevel::Intermediate
        } else {
            OverallLevel::Beginner
        }
    } else if accuracy >= ADVANCED {
        OverallLevel::Advanced
    } else if accuracy >= INTERMEDIATE {
        OverallLevel::Intermediate
    } else {
        OverallLevel::Beginner
    }
}

/// Review urgency over attempted concepts, most urgent first.
pub fn review_urgency(performance: &Performance, policy: &Policy) -> Vec<ReviewItem> {
    let mut urgency: Vec<ReviewItem> = performance
        .concepts()
        .filter(|entry| entry.score.attempts > 0)
        .map(|entry| {
            let score = entry.score;
            let attempt_factor = (f64::from(score.attempts) / 3.0).min(1.5);
            let mut value = (1.0 - score.accuracy()) * attempt_factor;
            if score.is_weak(policy) {
                value *= 1.5;
            }
            ReviewItem {
                key: entry.key(),
                urgency: value,
            }
        })
        .collect();

    urgency.sort_by(|a, b| {
        b.urgency
            .partial_cmp(&a.urgency)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    urgency
}

fn insight_messages(
    performance: &Performance,
    weak_areas: &[WeakArea],
    topics: &[TopicBreakdown],
    level: OverallLevel,
) -> Vec<String> {
    if performance.total_questions_answered == 0 {
        return vec!["Start answering questions to see your progress!".to_string()];
    }

    let mut messages = Vec::new();
    let percent = performance.overall_accuracy * 100.0;
    let opener = if performance.overall_accuracy >= 0.80 {
        "Excellent work!"
    } else if performance.overall_accuracy >= 0.60 {
        "Good progress!"
    } else {
        "Keep practicing!"
    };
    messages.push(format!("{opener} You're at {percent:.1}% accuracy."));

    if !weak_areas.is_empty() {
        messages.push(format!(
            "You have {} concepts that need more practice.",
            weak_areas.len()
        ));
        for area in weak_areas {
            messages.push(format!(
                "You're struggling with {} ({:.0}% over {} attempts), consider reviewing it.",
                area.key.concept,
                area.accuracy * 100.0,
                area.attempts
            ));
        }
    }

    if let Some(weakest) = topics.first().filter(|topic| topic.attempts > 0) {
        messages.push(format!(
            "Focus on '{}' (currently at {:.1}%).",
            weakest.topic,
            weakest.accuracy * 100.0
        ));
    }

    messages.push(format!("Your current level: {level}"));
    messages
}
