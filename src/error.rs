use std::path::PathBuf;

use crate::models::ConceptKey;

/// Failures of the adaptive core itself.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("course catalog contains no concepts")]
    EmptyCatalog,

    #[error("concept not found in course catalog: {0}")]
    UnknownConcept(ConceptKey),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read course file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed course JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid course: {reason}")]
    Invalid { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed policy TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid policy: {reason}")]
    Invalid { reason: String },
}

/// A generated question that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,

    #[error("expected 2 to 5 answers, got {count}")]
    AnswerCount { count: usize },

    #[error("expected exactly one correct answer, got {count}")]
    CorrectCount { count: usize },

    #[error("answer {index} is empty")]
    EmptyAnswer { index: usize },

    #[error("answer {index} repeats an earlier answer")]
    DuplicateAnswer { index: usize },
}

/// Failure of a full quiz turn. Generator errors pass through untouched.
#[derive(Debug, thiserror::Error)]
pub enum TurnError<E> {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("generated question is invalid: {0}")]
    InvalidQuestion(#[from] QuestionError),

    #[error("question generation failed: {0}")]
    Generation(#[source] E),
}
