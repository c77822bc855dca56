//! Attempt results and the append-only result log.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{CategoryId, EvaluationId, QuestionId};

/// Outcome of one completed attempt. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub id: Uuid,
    pub evaluation_id: EvaluationId,
    pub evaluation_title: String,
    pub category_id: CategoryId,
    /// 1-based attempt counter for this evaluation.
    pub attempt_number: u32,
    /// Points earned.
    pub score: u32,
    /// Points available.
    pub max_score: u32,
    /// Rounded half-up, 0..=100.
    pub percentage: u8,
    pub passing_score: u8,
    pub certified: bool,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub time_spent_minutes: u32,
    /// True when the attempt was auto-submitted at timeout.
    #[serde(default)]
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
    /// Issued only for certified attempts.
    #[serde(default)]
    pub certificate_code: Option<String>,
    #[serde(default)]
    pub question_results: Vec<QuestionResult>,
}

/// Per-question breakdown of an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub points: u32,
    pub points_earned: u32,
    pub grade: QuestionGrade,
    #[serde(default)]
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionGrade {
    Correct,
    Incorrect,
    Unanswered,
}

/// Append-only history of completed attempts.
///
/// Unlock and progress state is always re-derived from this log; nothing
/// else records which evaluations have been certified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultLog {
    entries: Vec<AttemptResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result and return a reference to the stored entry.
    pub fn record(&mut self, result: AttemptResult) -> &AttemptResult {
        tracing::info!(
            evaluation_id = result.evaluation_id,
            attempt = result.attempt_number,
            percentage = result.percentage,
            certified = result.certified,
            "recorded attempt result"
        );
        self.entries.push(result);
        let last = self.entries.len() - 1;
        &self.entries[last]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttemptResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_evaluation(
        &self,
        evaluation_id: EvaluationId,
    ) -> impl Iterator<Item = &AttemptResult> {
        self.entries
            .iter()
            .filter(move |r| r.evaluation_id == evaluation_id)
    }

    /// Whether any attempt at `evaluation_id` was certified.
    pub fn has_certified(&self, evaluation_id: EvaluationId) -> bool {
        self.for_evaluation(evaluation_id).any(|r| r.certified)
    }

    pub fn attempt_count(&self, evaluation_id: EvaluationId) -> u32 {
        self.for_evaluation(evaluation_id).count() as u32
    }

    /// Certified results, in recording order.
    pub fn certificates(&self) -> impl Iterator<Item = &AttemptResult> {
        self.entries.iter().filter(|r| r.certified)
    }

    /// Highest-percentage result for an evaluation (earliest wins ties).
    pub fn best_for(&self, evaluation_id: EvaluationId) -> Option<&AttemptResult> {
        self.for_evaluation(evaluation_id)
            .fold(None, |best: Option<&AttemptResult>, r| match best {
                Some(b) if b.percentage >= r.percentage => Some(b),
                _ => Some(r),
            })
    }

    /// Export the log as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize result log")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result log to {}", path.display()))?;
        Ok(())
    }

    /// Import a log previously written by [`ResultLog::save_json`].
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result log from {}", path.display()))?;
        let log: ResultLog =
            serde_json::from_str(&content).context("failed to parse result log JSON")?;
        Ok(log)
    }

    /// Like [`ResultLog::load_json`], but a missing file yields an empty log.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl FromIterator<AttemptResult> for ResultLog {
    fn from_iter<T: IntoIterator<Item = AttemptResult>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_result(
        evaluation_id: EvaluationId,
        category_id: CategoryId,
        percentage: u8,
        certified: bool,
    ) -> AttemptResult {
        AttemptResult {
            id: Uuid::nil(),
            evaluation_id,
            evaluation_title: format!("Evaluation {evaluation_id}"),
            category_id,
            attempt_number: 1,
            score: percentage as u32,
            max_score: 100,
            percentage,
            passing_score: 70,
            certified,
            correct_answers: 0,
            total_questions: 0,
            time_spent_minutes: 10,
            timed_out: false,
            completed_at: Utc::now(),
            certificate_code: None,
            question_results: vec![],
        }
    }

    #[test]
    fn certification_queries() {
        let log: ResultLog = vec![
            make_result(1, 1, 55, false),
            make_result(1, 1, 85, true),
            make_result(2, 1, 40, false),
        ]
        .into_iter()
        .collect();

        assert!(log.has_certified(1));
        assert!(!log.has_certified(2));
        assert!(!log.has_certified(3));
        assert_eq!(log.attempt_count(1), 2);
        assert_eq!(log.certificates().count(), 1);
    }

    #[test]
    fn best_result_prefers_earliest_on_tie() {
        let mut first = make_result(1, 1, 80, true);
        first.attempt_number = 1;
        let mut second = make_result(1, 1, 80, true);
        second.attempt_number = 2;
        let log: ResultLog = vec![make_result(1, 1, 60, false), first, second]
            .into_iter()
            .collect();

        assert_eq!(log.best_for(1).map(|r| r.attempt_number), Some(1));
        assert!(log.best_for(9).is_none());
    }

    #[test]
    fn json_export_and_import() {
        let mut log = ResultLog::new();
        log.record(make_result(1, 1, 85, true));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        log.save_json(&path).unwrap();
        let loaded = ResultLog::load_json(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded.has_certified(1));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = ResultLog::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ResultLog::load_json(&path).is_err());
    }
}
