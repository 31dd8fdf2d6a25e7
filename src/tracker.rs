//! Applies answer events to a performance snapshot.

use std::path::Path;

use serde::Serialize;

use crate::catalog::{CatalogEntry, Course};
use crate::config::Policy;
use crate::models::{AnswerEvent, Performance};

/// Records one answer and refreshes every roll-up above it.
///
/// Missing topic, subtopic and concept entries are created on demand.
pub fn record_answer(
    mut performance: Performance,
    topic: &str,
    subtopic: &str,
    concept: &str,
    is_correct: bool,
    policy: &Policy,
) -> Performance {
    performance.total_questions_answered += 1;
    if is_correct {
        performance.total_correct += 1;
        performance.trophy_score = performance.trophy_score.saturating_add(policy.correct_reward);
    } else {
        performance.total_incorrect += 1;
        performance.trophy_score = performance
            .trophy_score
            .saturating_sub(policy.incorrect_penalty);
    }

    let topic_score = performance.topic_scores.entry(topic.to_string()).or_default();
    let subtopic_score = topic_score
        .subtopic_scores
        .entry(subtopic.to_string())
        .or_default();
    let concept_score = subtopic_score
        .concept_scores
        .entry(concept.to_string())
        .or_default();

    concept_score.attempts += 1;
    if is_correct {
        concept_score.correct += 1;
    } else {
        concept_score.incorrect += 1;
    }

    subtopic_score.recompute();
    topic_score.recompute();
    performance.recompute();
    performance
}

pub fn apply(performance: Performance, event: &AnswerEvent, policy: &Policy) -> Performance {
    record_answer(
        performance,
        &event.topic,
        &event.subtopic,
        &event.concept,
        event.is_correct,
        policy,
    )
}

/// Folds an answer log into a fresh snapshot.
pub fn replay<'a>(
    events: impl IntoIterator<Item = &'a AnswerEvent>,
    policy: &Policy,
) -> Performance {
    events
        .into_iter()
        .fold(Performance::default(), |performance, event| {
            apply(performance, event, policy)
        })
}

/// Catalog concepts with no recorded attempt, in catalog order.
pub fn untried_concepts<'a>(
    performance: &Performance,
    course: &'a Course,
) -> Vec<CatalogEntry<'a>> {
    course
        .concepts()
        .filter(|entry| {
            performance
                .concept_score(&entry.key())
                .map_or(true, |score| score.attempts == 0)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_questions: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub accuracy: f64,
    pub trophy_score: u32,
    pub topics_covered: usize,
    pub weak_areas_count: usize,
}

pub fn summary(performance: &Performance, policy: &Policy) -> Summary {
    Summary {
        total_questions: performance.total_questions_answered,
        correct: performance.total_correct,
        incorrect: performance.total_incorrect,
        accuracy: performance.overall_accuracy,
        trophy_score: performance.trophy_score,
        topics_covered: performance.topic_scores.len(),
        weak_areas_count: performance
            .concepts()
            .filter(|entry| entry.score.is_weak(policy))
            .count(),
    }
}

/// Reads an answer log CSV with columns
/// `topic,subtopic,concept,is_correct[,answered_at,source_key]`.
///
/// Rows carrying a timestamp are ordered by it; the sort is stable so
/// untimed rows keep file order.
pub fn read_answer_log(path: &Path) -> Result<Vec<AnswerEvent>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut events = Vec::new();
    for row in reader.deserialize::<AnswerEvent>() {
        events.push(row?);
    }
    events.sort_by_key(|event| event.answered_at);
    Ok(events)
}
