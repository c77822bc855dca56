//! Core data model types for skillcert.
//!
//! Categories group evaluations, evaluations own their question sets, and
//! answers are recorded per attempt against question ids.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CategoryId = u64;
pub type EvaluationId = u64;
pub type QuestionId = u64;

/// Labels shown for a true/false question, in index order.
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

/// A group of evaluations shown together on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display order. A prerequisite must have a strictly smaller order.
    pub order: u32,
    /// Category that must be fully certified before this one unlocks.
    #[serde(default)]
    pub prerequisite_id: Option<CategoryId>,
}

/// How hard an evaluation is advertised to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Basic => write!(f, "basic"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" | "beginner" => Ok(Difficulty::Basic),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Whether takers may start an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStatus::Active => write!(f, "active"),
            EvaluationStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for EvaluationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EvaluationStatus::Active),
            "inactive" => Ok(EvaluationStatus::Inactive),
            other => Err(format!("unknown evaluation status: {other}")),
        }
    }
}

/// A timed, scored set of questions belonging to one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Time limit for one attempt.
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
    /// Minimum percentage (inclusive) that certifies an attempt.
    pub passing_score: u8,
    /// Evaluation that must be certified before this one unlocks.
    #[serde(default)]
    pub prerequisite_id: Option<EvaluationId>,
    #[serde(default)]
    pub status: EvaluationStatus,
    /// Number of completed attempts reported to administrators.
    #[serde(default)]
    pub completions: u64,
    /// Upper bound on attempts per taker (None = unlimited).
    #[serde(default)]
    pub max_attempts: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Sum of the point values of every question, `None` if it does not fit
    /// in a `u32`.
    pub fn total_points(&self) -> Option<u32> {
        self.questions
            .iter()
            .try_fold(0u32, |total, q| total.checked_add(q.points))
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn is_active(&self) -> bool {
        self.status == EvaluationStatus::Active
    }
}

/// A single question embedded in an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub points: u32,
    pub kind: QuestionKind,
}

/// The answer key of a question, by question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    /// Options are fixed to [`TRUE_FALSE_OPTIONS`].
    TrueFalse { correct_index: usize },
    Open { expected_text: String },
}

impl QuestionKind {
    /// Number of selectable options, or `None` for free-text questions.
    pub fn option_count(&self) -> Option<usize> {
        match self {
            QuestionKind::MultipleChoice { options, .. } => Some(options.len()),
            QuestionKind::TrueFalse { .. } => Some(TRUE_FALSE_OPTIONS.len()),
            QuestionKind::Open { .. } => None,
        }
    }

    /// Option labels in index order (empty for free-text questions).
    pub fn option_labels(&self) -> Vec<&str> {
        match self {
            QuestionKind::MultipleChoice { options, .. } => {
                options.iter().map(String::as_str).collect()
            }
            QuestionKind::TrueFalse { .. } => TRUE_FALSE_OPTIONS.to_vec(),
            QuestionKind::Open { .. } => Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple-choice",
            QuestionKind::TrueFalse { .. } => "true-false",
            QuestionKind::Open { .. } => "open",
        }
    }
}

/// The value a taker recorded for one question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Index into the question's options.
    Choice(usize),
    /// Literal text for open questions.
    Text(String),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Choice(index) => write!(f, "#{index}"),
            AnswerValue::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// Answers recorded during one attempt, keyed by question id.
pub type AnswerSet = HashMap<QuestionId, AnswerValue>;

/// Questions the taker marked for review during one attempt.
pub type FlaggedSet = BTreeSet<QuestionId>;

/// Lifecycle of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    /// Submitted by the taker.
    Completed,
    /// Auto-submitted when the timer ran out.
    Expired,
    /// Cancelled; produces no result.
    Abandoned,
}

impl AttemptStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            AttemptStatus::Completed | AttemptStatus::Expired | AttemptStatus::Abandoned
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::NotStarted => write!(f, "not started"),
            AttemptStatus::InProgress => write!(f, "in progress"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Expired => write!(f, "expired"),
            AttemptStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_display_and_parse() {
        assert_eq!(Difficulty::Advanced.to_string(), "advanced");
        assert_eq!("Basic".parse::<Difficulty>().unwrap(), Difficulty::Basic);
        assert_eq!(
            "INTERMEDIATE".parse::<Difficulty>().unwrap(),
            Difficulty::Intermediate
        );
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn status_parse() {
        assert_eq!(
            "inactive".parse::<EvaluationStatus>().unwrap(),
            EvaluationStatus::Inactive
        );
        assert!("archived".parse::<EvaluationStatus>().is_err());
    }

    #[test]
    fn option_counts_by_kind() {
        let choice = QuestionKind::MultipleChoice {
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_index: 1,
        };
        assert_eq!(choice.option_count(), Some(3));
        assert_eq!(
            QuestionKind::TrueFalse { correct_index: 0 }.option_labels(),
            vec!["True", "False"]
        );
        let open = QuestionKind::Open {
            expected_text: "42".into(),
        };
        assert_eq!(open.option_count(), None);
        assert!(open.option_labels().is_empty());
    }

    #[test]
    fn answer_value_untagged_json() {
        let choice: AnswerValue = serde_json::from_str("2").unwrap();
        assert_eq!(choice, AnswerValue::Choice(2));
        let text: AnswerValue = serde_json::from_str("\"push()\"").unwrap();
        assert_eq!(text, AnswerValue::Text("push()".into()));
    }

    #[test]
    fn question_kind_is_tagged_by_type() {
        let json = r#"{"type":"true-false","correct_index":1}"#;
        let kind: QuestionKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind, QuestionKind::TrueFalse { correct_index: 1 });
        assert_eq!(kind.type_name(), "true-false");
    }

    #[test]
    fn finished_statuses() {
        assert!(!AttemptStatus::InProgress.is_finished());
        assert!(AttemptStatus::Expired.is_finished());
        assert!(AttemptStatus::Abandoned.is_finished());
    }
}
