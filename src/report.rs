use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analytics::Insights;
use crate::models::{MasteryLevel, Performance};
use crate::selector::Selection;

pub fn build_report(
    learner: Option<&str>,
    generated_at: DateTime<Utc>,
    performance: &Performance,
    insights: &Insights,
    next: Option<&Selection>,
) -> String {
    let mut output = String::new();
    let learner_label = learner.unwrap_or("anonymous learner");

    let _ = writeln!(output, "# Learning Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        learner_label,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(
        output,
        "- Answered: {} ({} correct, {} incorrect)",
        performance.total_questions_answered, performance.total_correct, performance.total_incorrect
    );
    let _ = writeln!(output, "- Accuracy: {:.1}%", performance.overall_accuracy * 100.0);
    let _ = writeln!(output, "- Trophies: {}", performance.trophy_score);
    let _ = writeln!(output, "- Level: {}", insights.level);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Topic Breakdown");

    if insights.topics.is_empty() {
        let _ = writeln!(output, "No answers recorded yet.");
    } else {
        for topic in insights.topics.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.1}% across {} answers in {} subtopics",
                topic.topic,
                topic.accuracy * 100.0,
                topic.attempts,
                topic.subtopic_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weak Areas");

    if insights.weak_areas.is_empty() {
        let _ = writeln!(output, "No weak areas detected.");
    } else {
        for area in insights.weak_areas.iter() {
            let _ = writeln!(
                output,
                "- {}: {:.0}% over {} attempts",
                area.key,
                area.accuracy * 100.0,
                area.attempts
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Mastery");

    let mastered = insights
        .mastery
        .iter()
        .filter(|entry| entry.level == MasteryLevel::Mastered)
        .count();
    let _ = writeln!(
        output,
        "{} of {} practised concepts mastered.",
        mastered,
        insights.mastery.len()
    );
    for entry in insights.mastery.iter() {
        let _ = writeln!(output, "- {} ({}): {}", entry.key, entry.attempts, entry.level);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    for message in insights.messages.iter() {
        let _ = writeln!(output, "- {message}");
    }

    if let Some(selection) = next {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Up Next");
        let _ = writeln!(
            output,
            "{} at {} difficulty (from the {} pool)",
            selection.key, selection.difficulty, selection.pool
        );
    }

    output
}
