//! Exact-match scoring of an attempt against an evaluation's answer key.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ScoringError;
use crate::model::{AnswerSet, AnswerValue, Evaluation, FlaggedSet, Question, QuestionKind};
use crate::results::{AttemptResult, QuestionGrade, QuestionResult};

/// Everything the taker produced during one attempt.
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub answers: &'a AnswerSet,
    pub flagged: &'a FlaggedSet,
    /// Time left on the clock when the attempt ended.
    pub remaining: Duration,
    pub attempt_number: u32,
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
}

/// Points tally over a question list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub earned: u32,
    pub max: u32,
    pub correct: usize,
    pub questions: Vec<QuestionResult>,
}

/// Whether `answer` is exactly the stored answer key of `kind`.
///
/// Choice questions compare option indices; open questions compare the
/// literal text with no trimming or case folding. A value of the wrong shape
/// never matches.
pub fn answer_matches(kind: &QuestionKind, answer: &AnswerValue) -> bool {
    match (kind, answer) {
        (QuestionKind::MultipleChoice { correct_index, .. }, AnswerValue::Choice(index))
        | (QuestionKind::TrueFalse { correct_index }, AnswerValue::Choice(index)) => {
            index == correct_index
        }
        (QuestionKind::Open { expected_text }, AnswerValue::Text(text)) => text == expected_text,
        _ => false,
    }
}

pub fn grade_question(question: &Question, answer: Option<&AnswerValue>) -> QuestionGrade {
    match answer {
        None => QuestionGrade::Unanswered,
        Some(value) if answer_matches(&question.kind, value) => QuestionGrade::Correct,
        Some(_) => QuestionGrade::Incorrect,
    }
}

/// Grade every question; unanswered questions earn nothing. Point sums
/// saturate at `u32::MAX`.
pub fn tally(questions: &[Question], answers: &AnswerSet, flagged: &FlaggedSet) -> Tally {
    let mut tally = Tally::default();
    for question in questions {
        tally.max = tally.max.saturating_add(question.points);
        let grade = grade_question(question, answers.get(&question.id));
        let points_earned = if grade == QuestionGrade::Correct {
            tally.correct += 1;
            question.points
        } else {
            0
        };
        tally.earned = tally.earned.saturating_add(points_earned);
        tally.questions.push(QuestionResult {
            question_id: question.id,
            points: question.points,
            points_earned,
            grade,
            flagged: flagged.contains(&question.id),
        });
    }
    tally
}

/// `earned / max × 100`, rounded half-up. `None` when `max` is zero.
pub fn percentage(earned: u32, max: u32) -> Option<u8> {
    if max == 0 {
        return None;
    }
    let earned = u64::from(earned.min(max));
    let max = u64::from(max);
    let rounded = (earned * 200 + max) / (2 * max);
    u8::try_from(rounded).ok()
}

/// The passing threshold is inclusive.
pub fn is_certified(percentage: u8, passing_score: u8) -> bool {
    percentage >= passing_score
}

/// Duration minus the whole minutes still on the clock.
pub fn time_spent_minutes(duration_minutes: u32, remaining: Duration) -> u32 {
    let remaining_minutes = u32::try_from(remaining.as_secs() / 60).unwrap_or(u32::MAX);
    duration_minutes.saturating_sub(remaining_minutes)
}

pub fn certificate_code() -> String {
    format!("CERT-{}", Uuid::new_v4().simple()).to_uppercase()
}

/// Score one attempt and build its result.
///
/// Pure apart from the generated ids: the evaluation and the submission are
/// left untouched, and recording the result is up to the caller.
pub fn score_attempt(
    evaluation: &Evaluation,
    submission: &Submission<'_>,
) -> Result<AttemptResult, ScoringError> {
    if evaluation.total_points().is_none() {
        return Err(ScoringError::PointsOverflow(evaluation.id));
    }
    let tally = tally(&evaluation.questions, submission.answers, submission.flagged);
    let percentage =
        percentage(tally.earned, tally.max).ok_or(ScoringError::ZeroTotalPoints(evaluation.id))?;
    let certified = is_certified(percentage, evaluation.passing_score);

    tracing::debug!(
        evaluation_id = evaluation.id,
        earned = tally.earned,
        max = tally.max,
        percentage,
        certified,
        "scored attempt"
    );

    Ok(AttemptResult {
        id: Uuid::new_v4(),
        evaluation_id: evaluation.id,
        evaluation_title: evaluation.title.clone(),
        category_id: evaluation.category_id,
        attempt_number: submission.attempt_number,
        score: tally.earned,
        max_score: tally.max,
        percentage,
        passing_score: evaluation.passing_score,
        certified,
        correct_answers: tally.correct,
        total_questions: evaluation.questions.len(),
        time_spent_minutes: time_spent_minutes(evaluation.duration_minutes, submission.remaining),
        timed_out: submission.timed_out,
        completed_at: submission.completed_at,
        certificate_code: certified.then(certificate_code),
        question_results: tally.questions,
    })
}
