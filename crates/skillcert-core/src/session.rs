//! One taker's pass through an evaluation.
//!
//! A session owns the answer set, the flagged set, the navigation cursor and
//! the countdown for exactly one attempt. Every way out of `InProgress`
//! (submit, timeout, cancel) stops the countdown and discards the transient
//! sets; a finished attempt is represented only by its [`AttemptResult`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::{AttemptError, SessionError};
use crate::model::{
    AnswerSet, AnswerValue, AttemptStatus, Evaluation, FlaggedSet, Question, QuestionId,
    QuestionKind,
};
use crate::results::AttemptResult;
use crate::scoring::{score_attempt, Submission};
use crate::timer::{CountdownTimer, Tick};

const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Questions the taker may want to revisit before submitting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub unanswered: Vec<QuestionId>,
    pub flagged: Vec<QuestionId>,
}

impl Review {
    pub fn is_clean(&self) -> bool {
        self.unanswered.is_empty() && self.flagged.is_empty()
    }
}

#[derive(Debug)]
pub struct AttemptSession {
    evaluation: Evaluation,
    attempt_number: u32,
    status: AttemptStatus,
    answers: AnswerSet,
    flagged: FlaggedSet,
    current: usize,
    remaining: Duration,
    tick_period: Duration,
    started_at: Option<DateTime<Utc>>,
    timer: Option<CountdownTimer>,
}

impl AttemptSession {
    /// A fresh, not yet started attempt with the full duration on the clock.
    pub fn new(evaluation: Evaluation, attempt_number: u32) -> Self {
        let remaining = Duration::from_secs(u64::from(evaluation.duration_minutes) * 60);
        Self {
            evaluation,
            attempt_number,
            status: AttemptStatus::NotStarted,
            answers: AnswerSet::new(),
            flagged: FlaggedSet::new(),
            current: 0,
            remaining,
            tick_period: DEFAULT_TICK,
            started_at: None,
            timer: None,
        }
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn flagged(&self) -> &FlaggedSet {
        &self.flagged
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(CountdownTimer::is_running)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.status != AttemptStatus::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.status = AttemptStatus::InProgress;
        self.started_at = Some(Utc::now());
        tracing::info!(
            evaluation_id = self.evaluation.id,
            attempt = self.attempt_number,
            remaining_secs = self.remaining.as_secs(),
            "attempt started"
        );
        Ok(())
    }

    /// Start the attempt and its countdown. Each received [`Tick`] should be
    /// fed back through [`AttemptSession::tick`], which then takes `period`
    /// off the clock.
    pub fn start_timed(
        &mut self,
        period: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Tick>, SessionError> {
        self.start()?;
        self.tick_period = period;
        let (timer, ticks) = CountdownTimer::start(period);
        self.timer = Some(timer);
        Ok(ticks)
    }

    /// One tick period elapsed (one second unless the attempt was started
    /// with [`AttemptSession::start_timed`]). Returns the result when this
    /// tick ran the clock out; ticks after the attempt has ended are ignored.
    pub fn tick(&mut self) -> Result<Option<AttemptResult>, AttemptError> {
        if self.status != AttemptStatus::InProgress {
            return Ok(None);
        }
        self.remaining = self.remaining.saturating_sub(self.tick_period);
        if !self.remaining.is_zero() {
            return Ok(None);
        }
        tracing::info!(evaluation_id = self.evaluation.id, "time is up, submitting");
        self.finish(AttemptStatus::Expired, true).map(Some)
    }

    pub fn submit(&mut self) -> Result<AttemptResult, AttemptError> {
        self.ensure_in_progress()?;
        self.finish(AttemptStatus::Completed, false)
    }

    /// Abandon the attempt. No result is produced.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        if self.status.is_finished() {
            return Err(SessionError::NotInProgress(self.status));
        }
        self.status = AttemptStatus::Abandoned;
        self.release();
        tracing::info!(evaluation_id = self.evaluation.id, "attempt cancelled");
        Ok(())
    }

    fn finish(
        &mut self,
        status: AttemptStatus,
        timed_out: bool,
    ) -> Result<AttemptResult, AttemptError> {
        let submission = Submission {
            answers: &self.answers,
            flagged: &self.flagged,
            remaining: self.remaining(),
            attempt_number: self.attempt_number,
            timed_out,
            completed_at: Utc::now(),
        };
        let scored = score_attempt(&self.evaluation, &submission);
        self.status = match scored {
            Ok(_) => status,
            Err(_) => AttemptStatus::Abandoned,
        };
        self.release();
        Ok(scored?)
    }

    fn release(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.answers.clear();
        self.flagged.clear();
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.status == AttemptStatus::InProgress {
            Ok(())
        } else {
            Err(SessionError::NotInProgress(self.status))
        }
    }

    // -----------------------------------------------------------------------
    // Answers and flags
    // -----------------------------------------------------------------------

    /// Record (or replace) the answer to a question.
    pub fn answer(&mut self, question_id: QuestionId, value: AnswerValue) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let question = self
            .evaluation
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        check_answer(question, &value)?;
        self.answers.insert(question_id, value);
        Ok(())
    }

    pub fn answer_current(&mut self, value: AnswerValue) -> Result<(), SessionError> {
        let question_id = self
            .current_question()
            .map(|q| q.id)
            .ok_or(SessionError::OutOfRange {
                index: self.current,
                len: self.evaluation.questions.len(),
            })?;
        self.answer(question_id, value)
    }

    pub fn clear_answer(&mut self, question_id: QuestionId) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.answers.remove(&question_id);
        Ok(())
    }

    /// Flip the review flag on a question and return the new state.
    pub fn toggle_flag(&mut self, question_id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        if self.evaluation.question(question_id).is_none() {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        if self.flagged.remove(&question_id) {
            Ok(false)
        } else {
            self.flagged.insert(question_id);
            Ok(true)
        }
    }

    pub fn answered_count(&self) -> usize {
        self.evaluation
            .questions
            .iter()
            .filter(|q| self.answers.contains_key(&q.id))
            .count()
    }

    /// Share of questions answered, rounded half-up.
    pub fn progress_percent(&self) -> u8 {
        let total = self.evaluation.questions.len();
        if total == 0 {
            return 0;
        }
        ((self.answered_count() * 200 + total) / (2 * total)) as u8
    }

    pub fn review(&self) -> Review {
        Review {
            unanswered: self
                .evaluation
                .questions
                .iter()
                .filter(|q| !self.answers.contains_key(&q.id))
                .map(|q| q.id)
                .collect(),
            flagged: self.flagged.iter().copied().collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn current_question(&self) -> Option<&Question> {
        self.evaluation.questions.get(self.current)
    }

    /// Move forward; returns false when already on the last question.
    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.evaluation.questions.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn go_to(&mut self, index: usize) -> Result<(), SessionError> {
        let len = self.evaluation.questions.len();
        if index >= len {
            return Err(SessionError::OutOfRange { index, len });
        }
        self.current = index;
        Ok(())
    }
}

fn check_answer(question: &Question, value: &AnswerValue) -> Result<(), SessionError> {
    let invalid = |reason: &str| SessionError::InvalidAnswer {
        question_id: question.id,
        reason: reason.to_string(),
    };
    match (&question.kind, value) {
        (QuestionKind::Open { .. }, AnswerValue::Text(_)) => Ok(()),
        (QuestionKind::Open { .. }, AnswerValue::Choice(_)) => {
            Err(invalid("open questions take a text answer"))
        }
        (_, AnswerValue::Text(_)) => Err(invalid("choice questions take an option index")),
        (kind, AnswerValue::Choice(index)) => {
            let len = kind.option_count().unwrap_or(0);
            if *index >= len {
                Err(SessionError::OutOfRange { index: *index, len })
            } else {
                Ok(())
            }
        }
    }
}

/// Input from the taker while an attempt is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Answer {
        question_id: QuestionId,
        value: AnswerValue,
    },
    ToggleFlag(QuestionId),
    Next,
    Previous,
    Submit,
    Cancel,
}

/// How a driven attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Finished(AttemptResult),
    Cancelled,
}

/// Drive a session from user commands and its own countdown until it ends.
///
/// Commands take priority over a tick that becomes ready at the same time.
/// Rejected commands are logged and the attempt continues; a closed command
/// channel cancels the attempt.
pub async fn run_attempt(
    session: &mut AttemptSession,
    tick_period: Duration,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> Result<SessionEnd, AttemptError> {
    let mut ticks = session.start_timed(tick_period)?;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    session.cancel()?;
                    return Ok(SessionEnd::Cancelled);
                };
                match command {
                    SessionCommand::Answer { question_id, value } => {
                        if let Err(e) = session.answer(question_id, value) {
                            tracing::warn!(error = %e, "answer rejected");
                        }
                    }
                    SessionCommand::ToggleFlag(question_id) => {
                        if let Err(e) = session.toggle_flag(question_id) {
                            tracing::warn!(error = %e, "flag rejected");
                        }
                    }
                    SessionCommand::Next => {
                        session.next();
                    }
                    SessionCommand::Previous => {
                        session.previous();
                    }
                    SessionCommand::Submit => {
                        return Ok(SessionEnd::Finished(session.submit()?));
                    }
                    SessionCommand::Cancel => {
                        session.cancel()?;
                        return Ok(SessionEnd::Cancelled);
                    }
                }
            }
            Some(Tick) = ticks.recv() => {
                if let Some(result) = session.tick()? {
                    return Ok(SessionEnd::Finished(result));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::tests::{choice, javascript_fundamentals, make_evaluation};

    fn started(evaluation: Evaluation) -> AttemptSession {
        let mut session = AttemptSession::new(evaluation, 1);
        session.start().unwrap();
        session
    }

    #[test]
    fn answers_only_while_in_progress() {
        let mut session = AttemptSession::new(javascript_fundamentals(), 1);
        assert_eq!(
            session.answer(1, AnswerValue::Choice(1)),
            Err(SessionError::NotInProgress(AttemptStatus::NotStarted))
        );
        session.start().unwrap();
        assert_eq!(session.start(), Err(SessionError::AlreadyStarted));
        session.answer(1, AnswerValue::Choice(1)).unwrap();
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn answer_validation() {
        let mut session = started(javascript_fundamentals());
        assert_eq!(
            session.answer(99, AnswerValue::Choice(0)),
            Err(SessionError::UnknownQuestion(99))
        );
        assert_eq!(
            session.answer(1, AnswerValue::Choice(4)),
            Err(SessionError::OutOfRange { index: 4, len: 4 })
        );
        // True/false questions have two options.
        assert_eq!(
            session.answer(2, AnswerValue::Choice(2)),
            Err(SessionError::OutOfRange { index: 2, len: 2 })
        );
        assert!(matches!(
            session.answer(1, AnswerValue::Text("b".into())),
            Err(SessionError::InvalidAnswer { question_id: 1, .. })
        ));
        assert_eq!(session.answered_count(), 0);
    }

    #[test]
    fn answers_can_be_replaced_and_cleared() {
        let mut session = started(javascript_fundamentals());
        session.answer(1, AnswerValue::Choice(0)).unwrap();
        session.answer(1, AnswerValue::Choice(1)).unwrap();
        assert_eq!(session.answers().get(&1), Some(&AnswerValue::Choice(1)));
        session.clear_answer(1).unwrap();
        assert!(session.answers().is_empty());
    }

    #[test]
    fn navigation_and_progress() {
        let mut session = started(javascript_fundamentals());
        assert!(!session.previous());
        assert!(session.next());
        assert_eq!(session.current_question().map(|q| q.id), Some(2));
        session.answer_current(AnswerValue::Choice(0)).unwrap();

        session.go_to(7).unwrap();
        assert!(!session.next());
        assert_eq!(
            session.go_to(8),
            Err(SessionError::OutOfRange { index: 8, len: 8 })
        );
        // 1 of 8 = 12.5%
        assert_eq!(session.progress_percent(), 13);
    }

    #[test]
    fn review_lists_unanswered_and_flagged() {
        let mut session = started(make_evaluation(
            1,
            vec![choice(1, 1, 0), choice(2, 1, 0), choice(3, 1, 0)],
            70,
        ));
        session.answer(1, AnswerValue::Choice(0)).unwrap();
        assert!(session.toggle_flag(3).unwrap());
        assert!(session.toggle_flag(1).unwrap());
        assert!(!session.toggle_flag(1).unwrap());

        let review = session.review();
        assert_eq!(review.unanswered, vec![2, 3]);
        assert_eq!(review.flagged, vec![3]);
        assert!(!review.is_clean());
    }

    #[test]
    fn submit_finishes_and_clears_transient_state() {
        let mut session = started(javascript_fundamentals());
        session.answer(1, AnswerValue::Choice(1)).unwrap();
        session.toggle_flag(2).unwrap();

        let result = session.submit().unwrap();
        assert_eq!(result.score, 5);
        assert!(!result.timed_out);
        assert_eq!(session.status(), AttemptStatus::Completed);
        assert!(session.answers().is_empty());
        assert!(session.flagged().is_empty());

        assert!(matches!(
            session.submit(),
            Err(AttemptError::Session(SessionError::NotInProgress(
                AttemptStatus::Completed
            )))
        ));
        assert!(session.cancel().is_err());
    }

    #[test]
    fn final_tick_auto_submits_exactly_once() {
        let mut evaluation = javascript_fundamentals();
        evaluation.duration_minutes = 1;
        let mut session = started(evaluation);
        session.answer(1, AnswerValue::Choice(1)).unwrap();

        for _ in 0..59 {
            assert!(session.tick().unwrap().is_none());
        }
        assert_eq!(session.remaining(), Duration::from_secs(1));

        let result = session.tick().unwrap().unwrap();
        assert!(result.timed_out);
        assert_eq!(result.score, 5);
        assert_eq!(result.time_spent_minutes, 1);
        assert_eq!(session.status(), AttemptStatus::Expired);

        assert!(session.tick().unwrap().is_none());
        assert_eq!(session.status(), AttemptStatus::Expired);
    }

    #[test]
    fn expiry_with_unanswered_questions_submits_what_is_there() {
        use crate::results::QuestionGrade;

        let mut evaluation = javascript_fundamentals();
        evaluation.duration_minutes = 1;
        let mut session = started(evaluation);
        for question_id in 1..=5 {
            session.answer(question_id, AnswerValue::Choice(0)).unwrap();
        }
        assert_eq!(session.review().unanswered, vec![6, 7, 8]);

        let mut results = Vec::new();
        for _ in 0..120 {
            if let Some(result) = session.tick().unwrap() {
                results.push(result);
            }
        }
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.timed_out);
        assert_eq!(result.total_questions, 8);
        let unanswered: Vec<_> = result
            .question_results
            .iter()
            .filter(|q| q.grade == QuestionGrade::Unanswered)
            .map(|q| q.question_id)
            .collect();
        assert_eq!(unanswered, vec![6, 7, 8]);
        assert!(result.question_results[5..].iter().all(|q| q.points_earned == 0));
        assert_eq!(session.status(), AttemptStatus::Expired);
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let mut session = AttemptSession::new(javascript_fundamentals(), 1);
        assert!(session.tick().unwrap().is_none());
        assert_eq!(session.remaining(), Duration::from_secs(45 * 60));
    }

    #[test]
    fn unscorable_attempt_is_abandoned() {
        let mut session = started(make_evaluation(5, vec![choice(1, 0, 0)], 70));
        assert!(matches!(session.submit(), Err(AttemptError::Scoring(_))));
        assert_eq!(session.status(), AttemptStatus::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_and_cancel_stop_the_timer() {
        let mut session = AttemptSession::new(javascript_fundamentals(), 1);
        let _ticks = session.start_timed(Duration::from_secs(1)).unwrap();
        assert!(session.timer_running());
        session.submit().unwrap();
        assert!(!session.timer_running());

        let mut session = AttemptSession::new(javascript_fundamentals(), 2);
        let mut ticks = session.start_timed(Duration::from_secs(1)).unwrap();
        session.cancel().unwrap();
        assert_eq!(session.status(), AttemptStatus::Abandoned);
        assert_eq!(ticks.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn driven_attempt_submits_on_command() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionCommand::Answer {
            question_id: 1,
            value: AnswerValue::Choice(1),
        })
        .await
        .unwrap();
        // Rejected, but the attempt keeps going.
        tx.send(SessionCommand::Answer {
            question_id: 42,
            value: AnswerValue::Choice(0),
        })
        .await
        .unwrap();
        tx.send(SessionCommand::ToggleFlag(3)).await.unwrap();
        tx.send(SessionCommand::Submit).await.unwrap();

        let mut session = AttemptSession::new(javascript_fundamentals(), 1);
        let end = run_attempt(&mut session, Duration::from_secs(1), rx)
            .await
            .unwrap();

        let SessionEnd::Finished(result) = end else {
            panic!("expected a finished attempt, got {end:?}");
        };
        assert_eq!(result.score, 5);
        assert!(result.question_results[2].flagged);
        assert!(!session.timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn driven_attempt_expires_when_time_runs_out() {
        let mut evaluation = javascript_fundamentals();
        evaluation.duration_minutes = 1;
        let (tx, rx) = mpsc::channel(8);
        tx.send(SessionCommand::Answer {
            question_id: 2,
            value: AnswerValue::Choice(0),
        })
        .await
        .unwrap();

        let mut session = AttemptSession::new(evaluation, 1);
        let end = run_attempt(&mut session, Duration::from_secs(1), rx)
            .await
            .unwrap();
        drop(tx);

        let SessionEnd::Finished(result) = end else {
            panic!("expected a finished attempt, got {end:?}");
        };
        assert!(result.timed_out);
        assert_eq!(result.score, 3);
        assert_eq!(session.status(), AttemptStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_tick_period_keeps_real_time() {
        let mut evaluation = javascript_fundamentals();
        evaluation.duration_minutes = 1;
        let (tx, rx) = mpsc::channel::<SessionCommand>(1);

        let mut session = AttemptSession::new(evaluation, 1);
        let begun = tokio::time::Instant::now();
        let end = run_attempt(&mut session, Duration::from_millis(250), rx)
            .await
            .unwrap();
        let elapsed = begun.elapsed();
        drop(tx);

        assert!(elapsed >= Duration::from_secs(60), "expired after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(61), "expired after {elapsed:?}");
        let SessionEnd::Finished(result) = end else {
            panic!("expected a finished attempt, got {end:?}");
        };
        assert!(result.timed_out);
        assert_eq!(result.time_spent_minutes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_command_channel_cancels() {
        let (tx, rx) = mpsc::channel::<SessionCommand>(1);
        drop(tx);
        let mut session = AttemptSession::new(javascript_fundamentals(), 1);
        let end = run_attempt(&mut session, Duration::from_secs(1), rx)
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(session.status(), AttemptStatus::Abandoned);
    }
}
