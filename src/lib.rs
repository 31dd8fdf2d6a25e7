//! Adaptive quiz engine: per-concept performance tracking, analytics over
//! the tracked snapshot, and weighted selection of the next concept to
//! quiz.
//!
//! The core is synchronous and holds no state between calls. Callers own
//! the [`Performance`] snapshot and [`RecentHistory`] of each learner and
//! pass them into every turn.

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feedback;
pub mod models;
pub mod question;
pub mod recommend;
pub mod report;
pub mod selector;
pub mod tracker;

pub use analytics::{analyze, Insights};
pub use catalog::Course;
pub use config::Policy;
pub use error::CoreError;
pub use feedback::{submit_answer, FeedbackLoop, TurnOutcome};
pub use models::{AnswerEvent, ConceptKey, Difficulty, Performance};
pub use selector::{select_next, RecentHistory, Selection};
pub use tracker::record_answer;
