//! Picks the next concept and difficulty to quiz.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::Insights;
use crate::catalog::Course;
use crate::config::Policy;
use crate::error::CoreError;
use crate::models::{ConceptKey, Difficulty, Performance};
use crate::tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Weak,
    Priority,
    Exploration,
    Catalog,
}

impl PoolKind {
    /// Fall-through order when a pool has nothing to offer.
    const ORDER: [PoolKind; 4] = [
        PoolKind::Weak,
        PoolKind::Priority,
        PoolKind::Exploration,
        PoolKind::Catalog,
    ];
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PoolKind::Weak => "weak",
            PoolKind::Priority => "priority",
            PoolKind::Exploration => "exploration",
            PoolKind::Catalog => "catalog",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub key: ConceptKey,
    pub difficulty: Difficulty,
    pub pool: PoolKind,
}

/// Bounded window of recently served concepts, newest last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentHistory {
    entries: VecDeque<ConceptKey>,
}

impl RecentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `key` to the newest slot and drops the oldest entries beyond
    /// `window`.
    pub fn push(&mut self, key: ConceptKey, window: usize) {
        self.entries.retain(|existing| existing != &key);
        self.entries.push_back(key);
        while self.entries.len() > window {
            self.entries.pop_front();
        }
    }

    pub fn contains(&self, key: &ConceptKey) -> bool {
        self.entries.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConceptKey> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Candidate concepts per pool, restricted to the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePools {
    pub weak: Vec<ConceptKey>,
    pub priority: Vec<ConceptKey>,
    pub exploration: Vec<ConceptKey>,
    pub catalog: Vec<ConceptKey>,
}

impl CandidatePools {
    pub fn get(&self, kind: PoolKind) -> &[ConceptKey] {
        match kind {
            PoolKind::Weak => &self.weak,
            PoolKind::Priority => &self.priority,
            PoolKind::Exploration => &self.exploration,
            PoolKind::Catalog => &self.catalog,
        }
    }
}

/// The priority pool skips recently served concepts before it is cut to
/// `priority_top_n`, so lower-ranked concepts move up instead of the draw
/// falling through.
pub fn build_pools(
    performance: &Performance,
    insights: &Insights,
    course: &Course,
    history: &RecentHistory,
    policy: &Policy,
) -> CandidatePools {
    let catalog = course.keys();
    let in_catalog: HashSet<&ConceptKey> = catalog.iter().collect();

    let weak: Vec<ConceptKey> = insights
        .weak_areas
        .iter()
        .map(|area| &area.key)
        .filter(|key| in_catalog.contains(key))
        .cloned()
        .collect();

    let priority: Vec<ConceptKey> = insights
        .priorities
        .iter()
        .map(|concept| &concept.key)
        .filter(|key| in_catalog.contains(key) && !weak.contains(key))
        .filter(|key| !history.contains(key))
        .take(policy.priority_top_n)
        .cloned()
        .collect();

    let exploration = tracker::untried_concepts(performance, course)
        .iter()
        .map(|entry| entry.key())
        .collect();

    CandidatePools {
        weak,
        priority,
        exploration,
        catalog,
    }
}

/// Chooses the next concept to quiz.
///
/// One pool is drawn by weight; when it has no candidate outside the
/// recent history the draw falls through weak, priority, exploration and
/// finally the whole catalog. If every concept was served recently the
/// history is ignored.
pub fn select_next<R: Rng + ?Sized>(
    performance: &Performance,
    insights: &Insights,
    course: &Course,
    history: &RecentHistory,
    policy: &Policy,
    rng: &mut R,
) -> Result<Selection, CoreError> {
    if course.is_empty() {
        return Err(CoreError::EmptyCatalog);
    }

    let pools = build_pools(performance, insights, course, history, policy);
    let drawn = draw_pool(rng, policy);
    let start = PoolKind::ORDER
        .iter()
        .position(|kind| *kind == drawn)
        .unwrap_or(0);

    for &kind in &PoolKind::ORDER[start..] {
        let fresh: Vec<&ConceptKey> = pools
            .get(kind)
            .iter()
            .filter(|key| !history.contains(key))
            .collect();
        if fresh.is_empty() {
            debug!(pool = %kind, "pool exhausted, falling through");
            continue;
        }

        let key = pick(kind, &fresh, rng).clone();
        let difficulty = difficulty_for(performance, &key, policy);
        debug!(drawn = %drawn, pool = %kind, concept = %key, %difficulty, "selected concept");
        return Ok(Selection {
            key,
            difficulty,
            pool: kind,
        });
    }

    let key = pools.catalog[pick_index(rng, pools.catalog.len())].clone();
    let difficulty = difficulty_for(performance, &key, policy);
    debug!(concept = %key, "entire catalog in recent history, ignoring it");
    Ok(Selection {
        key,
        difficulty,
        pool: PoolKind::Catalog,
    })
}

/// Difficulty from the concept's own accuracy. Untried concepts start at
/// medium unless the policy lets them inherit their topic's accuracy.
pub fn difficulty_for(performance: &Performance, key: &ConceptKey, policy: &Policy) -> Difficulty {
    let accuracy = match performance.concept_score(key) {
        Some(score) if score.attempts > 0 => Some(score.accuracy()),
        _ if policy.difficulty_from_topic_average => performance.topic_accuracy(&key.topic),
        _ => None,
    };

    match accuracy {
        Some(accuracy) if accuracy > policy.mastery_threshold => Difficulty::Hard,
        Some(accuracy) if accuracy < policy.weak_threshold => Difficulty::Easy,
        _ => Difficulty::Medium,
    }
}

fn draw_pool<R: Rng + ?Sized>(rng: &mut R, policy: &Policy) -> PoolKind {
    let roll = rng.gen::<f64>() * policy.total_weight();
    if roll < policy.weak_weight {
        PoolKind::Weak
    } else if roll < policy.weak_weight + policy.priority_weight {
        PoolKind::Priority
    } else {
        PoolKind::Exploration
    }
}

/// Weak areas arrive ranked, so the weakest is served; other pools are
/// sampled uniformly.
fn pick<'a, R: Rng + ?Sized>(kind: PoolKind, candidates: &[&'a ConceptKey], rng: &mut R) -> &'a ConceptKey {
    match kind {
        PoolKind::Weak => candidates[0],
        _ => candidates[pick_index(rng, candidates.len())],
    }
}

fn pick_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> usize {
    let scaled = (rng.gen::<f64>() * len as f64) as usize;
    scaled.min(len.saturating_sub(1))
}
