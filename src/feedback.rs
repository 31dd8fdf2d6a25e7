//! One quiz turn: record the answer, re-derive insights, choose what comes
//! next.

use std::fmt;

use rand::Rng;
use tracing::{debug, debug_span};

use crate::analytics::{self, Insights};
use crate::catalog::Course;
use crate::config::Policy;
use crate::error::{CoreError, TurnError};
use crate::models::{AnswerEvent, ConceptScore, Performance};
use crate::question::{Question, QuestionGenerator};
use crate::selector::{self, RecentHistory, Selection};
use crate::tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    AwaitingAnswer,
    Recorded,
    Analyzed,
    Selected,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TurnStage::AwaitingAnswer => "awaiting_answer",
            TurnStage::Recorded => "recorded",
            TurnStage::Analyzed => "analyzed",
            TurnStage::Selected => "selected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub performance: Performance,
    pub insights: Insights,
    pub selection: Selection,
    pub history: RecentHistory,
}

/// Binds a course and a policy for a run of quiz turns. Holds no learner
/// state; snapshots and history travel through the calls.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackLoop<'a> {
    course: &'a Course,
    policy: &'a Policy,
}

impl<'a> FeedbackLoop<'a> {
    pub fn new(course: &'a Course, policy: &'a Policy) -> Self {
        Self { course, policy }
    }

    pub fn course(&self) -> &'a Course {
        self.course
    }

    pub fn policy(&self) -> &'a Policy {
        self.policy
    }

    pub fn select_next<R: Rng + ?Sized>(
        &self,
        performance: &Performance,
        insights: &Insights,
        history: &RecentHistory,
        rng: &mut R,
    ) -> Result<Selection, CoreError> {
        selector::select_next(performance, insights, self.course, history, self.policy, rng)
    }

    /// Records `answer`, then picks the next concept with the answered
    /// concept pushed onto `history`. Any failure aborts the whole turn.
    pub fn submit_answer<R: Rng + ?Sized>(
        &self,
        performance: Performance,
        mut history: RecentHistory,
        answer: &AnswerEvent,
        rng: &mut R,
    ) -> Result<TurnOutcome, CoreError> {
        let key = answer.key();
        let span = debug_span!("turn", concept = %key, correct = answer.is_correct);
        let _enter = span.enter();
        debug!(stage = %TurnStage::AwaitingAnswer);

        let performance = tracker::apply(performance, answer, self.policy);
        debug!(
            stage = %TurnStage::Recorded,
            trophy_score = performance.trophy_score,
            answered = performance.total_questions_answered
        );

        let insights = analytics::analyze(&performance, self.policy);
        debug!(stage = %TurnStage::Analyzed, weak_areas = insights.weak_areas.len());

        history.push(key, self.policy.history_window);
        let selection = self.select_next(&performance, &insights, &history, rng)?;
        debug!(stage = %TurnStage::Selected, next = %selection.key, difficulty = %selection.difficulty);

        Ok(TurnOutcome {
            performance,
            insights,
            selection,
            history,
        })
    }

    /// Asks `generator` for a question on an already chosen concept.
    /// Malformed output is rejected before it reaches the learner.
    pub fn question_for<G: QuestionGenerator>(
        &self,
        generator: &mut G,
        selection: &Selection,
    ) -> Result<Question, TurnError<G::Error>> {
        let concept = self
            .course
            .find(&selection.key)
            .ok_or_else(|| CoreError::UnknownConcept(selection.key.clone()))?;
        let question = generator
            .generate(selection, concept)
            .map_err(TurnError::Generation)?;
        question.validate()?;
        Ok(question)
    }

    /// Selects the next concept and generates its question in one step.
    pub fn next_question<G: QuestionGenerator, R: Rng + ?Sized>(
        &self,
        generator: &mut G,
        performance: &Performance,
        history: &RecentHistory,
        rng: &mut R,
    ) -> Result<(Selection, Question), TurnError<G::Error>> {
        let insights = analytics::analyze(performance, self.policy);
        let selection = self.select_next(performance, &insights, history, rng)?;
        let question = self.question_for(generator, &selection)?;
        Ok((selection, question))
    }
}

/// Free-standing form of [`FeedbackLoop::submit_answer`].
pub fn submit_answer<R: Rng + ?Sized>(
    performance: Performance,
    course: &Course,
    history: RecentHistory,
    answer: &AnswerEvent,
    policy: &Policy,
    rng: &mut R,
) -> Result<TurnOutcome, CoreError> {
    FeedbackLoop::new(course, policy).submit_answer(performance, history, answer, rng)
}

/// Whether a learner should leave a concept: it is mastered, or it has
/// been failed long enough that continuing would only frustrate.
pub fn should_move_on(score: Option<&ConceptScore>, policy: &Policy) -> bool {
    let Some(score) = score else {
        return false;
    };
    if score.attempts < policy.move_on_min_attempts {
        return false;
    }
    if score.accuracy() >= policy.mastery_threshold {
        return true;
    }
    score.attempts >= policy.move_on_min_attempts * 2 && score.accuracy() < policy.give_up_accuracy
}
