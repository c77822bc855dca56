//! Error types for catalog integrity, scoring, and attempt sessions.
//!
//! All of these are local validation failures; they are meant to be shown to
//! the user, never swallowed.

use thiserror::Error;

use crate::model::{AttemptStatus, CategoryId, EvaluationId, QuestionId};

/// Rejections raised while creating, updating, or deleting catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("category {0} not found")]
    UnknownCategory(CategoryId),

    #[error("evaluation {0} not found")]
    UnknownEvaluation(EvaluationId),

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    /// Without points no percentage can ever be computed.
    #[error("evaluation '{0}' has zero total question points")]
    ZeroTotalPoints(String),

    #[error("evaluation '{0}' has more question points than can be counted")]
    PointsOverflow(String),

    #[error("passing score {0}% is above 100%")]
    InvalidPassingScore(u8),

    #[error("duration must be at least one minute")]
    ZeroDuration,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {question_id}: {message}")]
    InvalidQuestion {
        question_id: QuestionId,
        message: String,
    },

    #[error("{kind} prerequisite {id} does not exist")]
    DanglingPrerequisite { kind: &'static str, id: u64 },

    #[error("{kind} prerequisite chain through {id} forms a cycle")]
    PrerequisiteCycle { kind: &'static str, id: u64 },

    #[error("category prerequisite {prerequisite} must be ordered before {order}")]
    PrerequisiteOrder {
        prerequisite: CategoryId,
        order: u32,
    },

    #[error("{kind} {id} is still referenced by {dependents:?}")]
    InUse {
        kind: &'static str,
        id: u64,
        dependents: Vec<u64>,
    },
}

/// Failures computing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("evaluation {0} has zero total question points")]
    ZeroTotalPoints(EvaluationId),

    #[error("evaluation {0} has more question points than can be counted")]
    PointsOverflow(EvaluationId),
}

/// Invalid operations on an attempt session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("attempt is {0}, expected it to be in progress")]
    NotInProgress(AttemptStatus),

    #[error("attempt has already started")]
    AlreadyStarted,

    #[error("question {0} is not part of this evaluation")]
    UnknownQuestion(QuestionId),

    #[error("invalid answer for question {question_id}: {reason}")]
    InvalidAnswer {
        question_id: QuestionId,
        reason: String,
    },

    #[error("question index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
}

/// Everything that can stop an attempt from being started or recorded.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("evaluation {0} is not active")]
    Inactive(EvaluationId),

    #[error("evaluation {evaluation_id} is locked until evaluation {prerequisite_id} is certified")]
    Locked {
        evaluation_id: EvaluationId,
        prerequisite_id: EvaluationId,
    },

    #[error("evaluation {evaluation_id} allows at most {max} attempt(s)")]
    AttemptLimit {
        evaluation_id: EvaluationId,
        max: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_ids() {
        let err = CatalogError::DanglingPrerequisite {
            kind: "evaluation",
            id: 9,
        };
        assert_eq!(err.to_string(), "evaluation prerequisite 9 does not exist");

        let err = AttemptError::Locked {
            evaluation_id: 2,
            prerequisite_id: 1,
        };
        assert!(err.to_string().contains("evaluation 1 is certified"));
    }

    #[test]
    fn attempt_error_wraps_transparently() {
        let err: AttemptError = ScoringError::ZeroTotalPoints(4).into();
        assert_eq!(err.to_string(), "evaluation 4 has zero total question points");
    }
}
