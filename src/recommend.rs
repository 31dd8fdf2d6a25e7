//! Ranks concepts for short instructional videos.

use std::collections::HashSet;

use serde::Serialize;

use crate::analytics::Insights;
use crate::catalog::Course;
use crate::models::{ConceptKey, Performance};
use crate::tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    WeakArea,
    NeedsPractice,
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRecommendation {
    pub key: ConceptKey,
    pub relevance: f64,
    pub reason: RecommendationReason,
}

/// Weak areas first (relevance `1 - accuracy`), then the remaining
/// priority concepts, then untried catalog concepts at zero relevance.
/// Only catalog concepts are returned, each at most once.
pub fn recommend_videos(
    insights: &Insights,
    performance: &Performance,
    course: &Course,
    max_videos: usize,
) -> Vec<VideoRecommendation> {
    let catalog: HashSet<ConceptKey> = course.keys().into_iter().collect();
    let mut seen = HashSet::new();
    let mut picks = Vec::new();

    let weak = insights
        .weak_areas
        .iter()
        .map(|area| (area.key.clone(), 1.0 - area.accuracy, RecommendationReason::WeakArea));
    let priority = insights
        .priorities
        .iter()
        .map(|concept| (concept.key.clone(), concept.score, RecommendationReason::NeedsPractice));
    let untried = tracker::untried_concepts(performance, course)
        .into_iter()
        .map(|entry| (entry.key(), 0.0, RecommendationReason::NotStarted));

    for (key, relevance, reason) in weak.chain(priority).chain(untried) {
        if picks.len() >= max_videos {
            break;
        }
        if !catalog.contains(&key) || !seen.insert(key.clone()) {
            continue;
        }
        picks.push(VideoRecommendation {
            key,
            relevance,
            reason,
        });
    }

    picks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::analyze;
    use crate::catalog::tests::python_course;
    use crate::config::Policy;
    use crate::tracker::record_answer;

    #[test]
    fn weak_areas_lead_without_duplicates() {
        let policy = Policy::default();
        let mut p = Performance::default();
        p = record_answer(p, "Python", "Control Flow", "Loops", false, &policy);
        p = record_answer(p, "Python", "Control Flow", "Loops", true, &policy);
        p = record_answer(p, "Python", "Control Flow", "Loops", false, &policy);
        p = record_answer(p, "Python", "Data", "Lists", false, &policy);
        p = record_answer(p, "Elsewhere", "Gone", "Removed", false, &policy);

        let insights = analyze(&p, &policy);
        let picks = recommend_videos(&insights, &p, &python_course(), 4);

        let ranked: Vec<(&str, RecommendationReason)> = picks
            .iter()
            .map(|pick| (pick.key.concept.as_str(), pick.reason))
            .collect();
        assert_eq!(
            ranked,
            [
                ("Loops", RecommendationReason::WeakArea),
                ("Lists", RecommendationReason::NeedsPractice),
                ("Conditionals", RecommendationReason::NotStarted),
                ("Dicts", RecommendationReason::NotStarted),
            ]
        );
        assert!((picks[0].relevance - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn respects_limit() {
        let p = Performance::default();
        let insights = analyze(&p, &Policy::default());
        assert!(recommend_videos(&insights, &p, &python_course(), 0).is_empty());
        assert_eq!(recommend_videos(&insights, &p, &python_course(), 2).len(), 2);
    }
}
