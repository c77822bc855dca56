//! Application state: the catalog, the result log, and the settings that
//! drive them, owned in one place and passed explicitly.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::catalog::Catalog;
use crate::config::SkillcertConfig;
use crate::error::{AttemptError, CatalogError};
use crate::model::{AnswerSet, CategoryId, Evaluation, EvaluationId, FlaggedSet};
use crate::progress::ProgressEvaluator;
use crate::report::DashboardReport;
use crate::results::{AttemptResult, ResultLog};
use crate::scoring::{score_attempt, Submission};
use crate::session::{AttemptSession, SessionEnd};

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub catalog: Catalog,
    pub results: ResultLog,
    pub config: SkillcertConfig,
}

impl AppState {
    pub fn new(catalog: Catalog, config: SkillcertConfig) -> Self {
        Self {
            catalog,
            results: ResultLog::new(),
            config,
        }
    }

    pub fn with_results(mut self, results: ResultLog) -> Self {
        self.results = results;
        self
    }

    /// Load the result log from the configured path (empty if absent).
    pub fn load_results(&mut self) -> Result<()> {
        self.results = ResultLog::load_or_default(&self.config.results_path)?;
        Ok(())
    }

    pub fn save_results(&self) -> Result<()> {
        self.results.save_json(&self.config.results_path)
    }

    pub fn evaluator(&self) -> ProgressEvaluator<'_> {
        ProgressEvaluator::new(
            self.catalog.categories(),
            self.catalog.evaluations(),
            &self.results,
        )
    }

    /// Check that a new attempt at `evaluation_id` may be started: the
    /// evaluation exists, is active, is unlocked, and has attempts left.
    pub fn check_can_attempt(&self, evaluation_id: EvaluationId) -> Result<&Evaluation, AttemptError> {
        let evaluation = self
            .catalog
            .evaluation(evaluation_id)
            .ok_or(CatalogError::UnknownEvaluation(evaluation_id))?;

        if !evaluation.is_active() {
            return Err(AttemptError::Inactive(evaluation_id));
        }
        if let Some(prerequisite_id) = evaluation.prerequisite_id {
            if !self.evaluator().is_evaluation_unlocked(evaluation) {
                return Err(AttemptError::Locked {
                    evaluation_id,
                    prerequisite_id,
                });
            }
        }
        if let Some(max) = evaluation.max_attempts {
            if self.results.attempt_count(evaluation_id) >= max {
                return Err(AttemptError::AttemptLimit { evaluation_id, max });
            }
        }
        Ok(evaluation)
    }

    /// A not yet started session for the next attempt at `evaluation_id`.
    pub fn begin_attempt(&self, evaluation_id: EvaluationId) -> Result<AttemptSession, AttemptError> {
        let evaluation = self.check_can_attempt(evaluation_id)?;
        Ok(AttemptSession::new(
            evaluation.clone(),
            self.next_attempt_number(evaluation_id),
        ))
    }

    /// Score a finished set of answers and append exactly one result.
    pub fn submit_attempt(
        &mut self,
        evaluation_id: EvaluationId,
        answers: &AnswerSet,
        flagged: &FlaggedSet,
        remaining: Duration,
    ) -> Result<&AttemptResult, AttemptError> {
        let evaluation = self.check_can_attempt(evaluation_id)?;
        let result = score_attempt(
            evaluation,
            &Submission {
                answers,
                flagged,
                remaining,
                attempt_number: self.next_attempt_number(evaluation_id),
                timed_out: false,
                completed_at: Utc::now(),
            },
        )?;
        Ok(self.results.record(result))
    }

    /// Record the outcome of a driven session. Cancelled attempts leave no
    /// trace.
    pub fn finish(&mut self, end: SessionEnd) -> Option<&AttemptResult> {
        match end {
            SessionEnd::Finished(result) => Some(self.results.record(result)),
            SessionEnd::Cancelled => None,
        }
    }

    pub fn is_evaluation_unlocked(&self, evaluation_id: EvaluationId) -> bool {
        self.evaluator().is_evaluation_id_unlocked(evaluation_id)
    }

    pub fn category_progress(&self, category_id: CategoryId) -> u8 {
        self.evaluator().category_progress(category_id)
    }

    pub fn is_category_unlocked(&self, category_id: CategoryId) -> bool {
        self.evaluator().is_category_id_unlocked(category_id)
    }

    pub fn dashboard(&self) -> DashboardReport {
        DashboardReport::build(&self.catalog, &self.results)
    }

    pub fn tick_period(&self) -> Duration {
        self.config.tick_period()
    }

    fn next_attempt_number(&self, evaluation_id: EvaluationId) -> u32 {
        self.results.attempt_count(evaluation_id) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerValue, EvaluationStatus};
    use crate::statistics::tests::two_category_catalog;

    fn state() -> AppState {
        AppState::new(two_category_catalog(), SkillcertConfig::default())
    }

    fn correct() -> AnswerSet {
        AnswerSet::from([(1, AnswerValue::Choice(0))])
    }

    fn wrong() -> AnswerSet {
        AnswerSet::from([(1, AnswerValue::Choice(3))])
    }

    #[test]
    fn submit_appends_exactly_one_result() {
        let mut state = state();
        let result = state
            .submit_attempt(1, &correct(), &FlaggedSet::new(), Duration::from_secs(600))
            .unwrap();
        assert_eq!(result.percentage, 100);
        assert!(result.certified);
        assert_eq!(result.time_spent_minutes, 20);
        assert_eq!(state.results.len(), 1);
    }

    #[test]
    fn certification_unlocks_the_dependent() {
        let mut state = state();
        assert!(!state.is_evaluation_unlocked(2));
        assert!(matches!(
            state.submit_attempt(2, &correct(), &FlaggedSet::new(), Duration::ZERO),
            Err(AttemptError::Locked {
                evaluation_id: 2,
                prerequisite_id: 1
            })
        ));
        assert!(state.results.is_empty());

        state
            .submit_attempt(1, &wrong(), &FlaggedSet::new(), Duration::ZERO)
            .unwrap();
        assert!(!state.is_evaluation_unlocked(2));

        let second = state
            .submit_attempt(1, &correct(), &FlaggedSet::new(), Duration::ZERO)
            .unwrap();
        assert_eq!(second.attempt_number, 2);
        assert!(state.is_evaluation_unlocked(2));
        assert_eq!(state.category_progress(1), 50);
        assert!(!state.is_category_unlocked(2));

        state
            .submit_attempt(2, &correct(), &FlaggedSet::new(), Duration::ZERO)
            .unwrap();
        assert_eq!(state.category_progress(1), 100);
        assert!(state.is_category_unlocked(2));
    }

    #[test]
    fn inactive_and_unknown_evaluations_cannot_be_attempted() {
        let mut state = state();
        state
            .catalog
            .set_evaluation_status(3, EvaluationStatus::Inactive)
            .unwrap();
        assert!(matches!(
            state.begin_attempt(3),
            Err(AttemptError::Inactive(3))
        ));
        assert!(matches!(
            state.begin_attempt(99),
            Err(AttemptError::Catalog(CatalogError::UnknownEvaluation(99)))
        ));
    }

    #[test]
    fn attempt_limit_is_enforced() {
        let mut state = state();
        let mut evaluation = state.catalog.evaluation(1).unwrap().clone();
        evaluation.max_attempts = Some(1);
        state.catalog.update_evaluation(evaluation).unwrap();

        state
            .submit_attempt(1, &wrong(), &FlaggedSet::new(), Duration::ZERO)
            .unwrap();
        assert!(matches!(
            state.submit_attempt(1, &correct(), &FlaggedSet::new(), Duration::ZERO),
            Err(AttemptError::AttemptLimit {
                evaluation_id: 1,
                max: 1
            })
        ));
        assert_eq!(state.results.len(), 1);
    }

    #[test]
    fn finished_sessions_are_recorded() {
        let mut state = state();
        let mut session = state.begin_attempt(1).unwrap();
        assert_eq!(session.attempt_number(), 1);
        session.start().unwrap();
        session.answer(1, AnswerValue::Choice(0)).unwrap();
        let result = session.submit().unwrap();

        assert!(state.finish(SessionEnd::Finished(result)).is_some());
        assert!(state.finish(SessionEnd::Cancelled).is_none());
        assert_eq!(state.results.len(), 1);
        assert!(state.is_evaluation_unlocked(2));
        assert_eq!(state.dashboard().stats.certificates, 1);
    }

    #[test]
    fn results_persist_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SkillcertConfig::default();
        config.results_path = dir.path().join("results.json");

        let mut state = AppState::new(two_category_catalog(), config.clone());
        state
            .submit_attempt(1, &correct(), &FlaggedSet::new(), Duration::ZERO)
            .unwrap();
        state.save_results().unwrap();

        let mut reloaded = AppState::new(two_category_catalog(), config);
        reloaded.load_results().unwrap();
        assert!(reloaded.is_evaluation_unlocked(2));
    }
}
