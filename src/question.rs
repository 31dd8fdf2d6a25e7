//! Seam to the question-generation collaborator, plus a bounded cache.

use std::collections::HashSet;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Concept;
use crate::error::QuestionError;
use crate::models::{ConceptKey, Difficulty};
use crate::selector::Selection;

const MIN_ANSWERS: usize = 2;
const MAX_ANSWERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub key: ConceptKey,
    pub difficulty: Difficulty,
    pub text: String,
    pub answers: Vec<AnswerOption>,
    pub explanation: String,
}

impl Question {
    pub fn correct_index(&self) -> Option<usize> {
        self.answers.iter().position(|answer| answer.is_correct)
    }

    /// Checks the shape a servable question must have: non-empty text,
    /// 2 to 5 distinct non-empty answers, exactly one of them correct.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let count = self.answers.len();
        if !(MIN_ANSWERS..=MAX_ANSWERS).contains(&count) {
            return Err(QuestionError::AnswerCount { count });
        }

        let correct = self.answers.iter().filter(|answer| answer.is_correct).count();
        if correct != 1 {
            return Err(QuestionError::CorrectCount { count: correct });
        }

        let mut seen = HashSet::new();
        for (index, answer) in self.answers.iter().enumerate() {
            let text = answer.text.trim();
            if text.is_empty() {
                return Err(QuestionError::EmptyAnswer { index });
            }
            if !seen.insert(text.to_lowercase()) {
                return Err(QuestionError::DuplicateAnswer { index });
            }
        }

        Ok(())
    }
}

/// Produces a question for a selected concept. Implementations usually
/// call out to an LLM; their errors reach the caller unchanged.
pub trait QuestionGenerator {
    type Error;

    fn generate(&mut self, selection: &Selection, concept: &Concept) -> Result<Question, Self::Error>;
}

type CacheKey = (ConceptKey, Difficulty);

/// Bounded question cache keyed by concept identity and difficulty.
#[derive(Debug, Clone)]
pub struct QuestionCache {
    cache: Cache<CacheKey, Question>,
}

impl QuestionCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_entries.max(1)).build();
        Self { cache }
    }

    pub fn get(&self, key: &ConceptKey, difficulty: Difficulty) -> Option<Question> {
        self.cache.get(&(key.clone(), difficulty))
    }

    pub fn insert(&self, question: Question) {
        self.cache
            .insert((question.key.clone(), question.difficulty), question);
    }

    /// Entry count after pending evictions have been applied.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for QuestionCache {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Wraps a generator and reuses questions already produced for the same
/// concept and difficulty. Malformed questions are passed on uncached.
#[derive(Debug)]
pub struct CachedGenerator<G> {
    inner: G,
    cache: QuestionCache,
}

impl<G> CachedGenerator<G> {
    pub fn new(inner: G, cache: QuestionCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &QuestionCache {
        &self.cache
    }

    pub fn into_inner(self) -> G {
        self.inner
    }
}

impl<G: QuestionGenerator> QuestionGenerator for CachedGenerator<G> {
    type Error = G::Error;

    fn generate(&mut self, selection: &Selection, concept: &Concept) -> Result<Question, Self::Error> {
        if let Some(question) = self.cache.get(&selection.key, selection.difficulty) {
            debug!(concept = %selection.key, difficulty = %selection.difficulty, "question cache hit");
            return Ok(question);
        }
        let question = self.inner.generate(selection, concept)?;
        match question.validate() {
            Ok(()) => self.cache.insert(question.clone()),
            Err(reason) => warn!(concept = %selection.key, %reason, "not caching malformed question"),
        }
        Ok(question)
    }
}
