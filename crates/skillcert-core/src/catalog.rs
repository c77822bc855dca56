//! Administrative catalog of categories and evaluations.
//!
//! Every mutation is validated up front so the scoring and gating code can
//! rely on the catalog's integrity: no zero-point evaluations, no dangling
//! prerequisites, no prerequisite cycles.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use crate::error::CatalogError;
use crate::model::{
    Category, CategoryId, Difficulty, Evaluation, EvaluationId, EvaluationStatus, Question,
    QuestionKind,
};

/// Fields an administrator fills in to create a category.
#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub order: u32,
    pub prerequisite_id: Option<CategoryId>,
}

/// Fields an administrator fills in to create an evaluation.
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub title: String,
    pub description: String,
    pub category_id: CategoryId,
    pub difficulty: Difficulty,
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
    pub passing_score: u8,
    pub prerequisite_id: Option<EvaluationId>,
    pub status: EvaluationStatus,
    pub max_attempts: Option<u32>,
}

/// The in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub name: String,
    pub description: String,
    categories: BTreeMap<CategoryId, Category>,
    evaluations: BTreeMap<EvaluationId, Evaluation>,
    next_category_id: CategoryId,
    next_evaluation_id: EvaluationId,
}

impl Catalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_category_id: 1,
            next_evaluation_id: 1,
            ..Default::default()
        }
    }

    pub fn categories(&self) -> &BTreeMap<CategoryId, Category> {
        &self.categories
    }

    pub fn evaluations(&self) -> &BTreeMap<EvaluationId, Evaluation> {
        &self.evaluations
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn evaluation(&self, id: EvaluationId) -> Option<&Evaluation> {
        self.evaluations.get(&id)
    }

    /// Categories sorted by display order.
    pub fn ordered_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().collect();
        categories.sort_by_key(|c| (c.order, c.id));
        categories
    }

    pub fn evaluations_in(&self, category_id: CategoryId) -> impl Iterator<Item = &Evaluation> {
        self.evaluations
            .values()
            .filter(move |e| e.category_id == category_id)
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub fn create_category(&mut self, new: NewCategory) -> Result<CategoryId, CatalogError> {
        let id = self.next_category_id.max(1);
        self.insert_category(Category {
            id,
            name: new.name,
            description: new.description,
            order: new.order,
            prerequisite_id: new.prerequisite_id,
        })?;
        Ok(id)
    }

    /// Insert a category with a caller-chosen id.
    pub fn insert_category(&mut self, category: Category) -> Result<(), CatalogError> {
        if self.categories.contains_key(&category.id) {
            return Err(CatalogError::DuplicateId {
                kind: "category",
                id: category.id,
            });
        }
        self.check_category(&category)?;
        tracing::debug!(category_id = category.id, name = %category.name, "created category");
        self.next_category_id = self.next_category_id.max(category.id + 1);
        self.categories.insert(category.id, category);
        Ok(())
    }

    pub fn update_category(&mut self, category: Category) -> Result<(), CatalogError> {
        if !self.categories.contains_key(&category.id) {
            return Err(CatalogError::UnknownCategory(category.id));
        }
        self.check_category(&category)?;
        // Dependents must stay ordered after the updated category.
        if let Some(dependent) = self
            .categories
            .values()
            .find(|c| c.prerequisite_id == Some(category.id) && c.order <= category.order)
        {
            return Err(CatalogError::PrerequisiteOrder {
                prerequisite: category.id,
                order: dependent.order,
            });
        }
        tracing::info!(category_id = category.id, "updated category");
        self.categories.insert(category.id, category);
        Ok(())
    }

    pub fn delete_category(&mut self, id: CategoryId) -> Result<Category, CatalogError> {
        if !self.categories.contains_key(&id) {
            return Err(CatalogError::UnknownCategory(id));
        }
        let mut dependents: Vec<u64> = self
            .categories
            .values()
            .filter(|c| c.prerequisite_id == Some(id))
            .map(|c| c.id)
            .collect();
        dependents.extend(self.evaluations_in(id).map(|e| e.id));
        if !dependents.is_empty() {
            return Err(CatalogError::InUse {
                kind: "category",
                id,
                dependents,
            });
        }
        tracing::info!(category_id = id, "deleted category");
        self.categories
            .remove(&id)
            .ok_or(CatalogError::UnknownCategory(id))
    }

    fn check_category(&self, category: &Category) -> Result<(), CatalogError> {
        if category.name.trim().is_empty() {
            return Err(CatalogError::EmptyField("category name"));
        }
        let Some(prerequisite_id) = category.prerequisite_id else {
            return Ok(());
        };
        if prerequisite_id == category.id {
            return Err(CatalogError::PrerequisiteCycle {
                kind: "category",
                id: prerequisite_id,
            });
        }
        let prerequisite =
            self.categories
                .get(&prerequisite_id)
                .ok_or(CatalogError::DanglingPrerequisite {
                    kind: "category",
                    id: prerequisite_id,
                })?;
        // Strictly decreasing order along a chain also rules out cycles.
        if prerequisite.order >= category.order {
            return Err(CatalogError::PrerequisiteOrder {
                prerequisite: prerequisite_id,
                order: category.order,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Evaluations
    // -----------------------------------------------------------------------

    pub fn create_evaluation(&mut self, new: NewEvaluation) -> Result<EvaluationId, CatalogError> {
        let id = self.next_evaluation_id.max(1);
        let now = Utc::now();
        self.insert_evaluation(Evaluation {
            id,
            title: new.title,
            description: new.description,
            category_id: new.category_id,
            difficulty: new.difficulty,
            duration_minutes: new.duration_minutes,
            questions: new.questions,
            passing_score: new.passing_score,
            prerequisite_id: new.prerequisite_id,
            status: new.status,
            completions: 0,
            max_attempts: new.max_attempts,
            created_at: now,
            updated_at: now,
        })?;
        Ok(id)
    }

    /// Insert an evaluation with a caller-chosen id.
    pub fn insert_evaluation(&mut self, evaluation: Evaluation) -> Result<(), CatalogError> {
        if self.evaluations.contains_key(&evaluation.id) {
            return Err(CatalogError::DuplicateId {
                kind: "evaluation",
                id: evaluation.id,
            });
        }
        self.check_evaluation(&evaluation)?;
        tracing::debug!(
            evaluation_id = evaluation.id,
            title = %evaluation.title,
            points = evaluation.total_points(),
            "created evaluation"
        );
        self.next_evaluation_id = self.next_evaluation_id.max(evaluation.id + 1);
        self.evaluations.insert(evaluation.id, evaluation);
        Ok(())
    }

    /// Replace an evaluation. `created_at` and `completions` are kept from
    /// the stored entry; `updated_at` is refreshed.
    pub fn update_evaluation(&mut self, mut evaluation: Evaluation) -> Result<(), CatalogError> {
        let existing = self
            .evaluations
            .get(&evaluation.id)
            .ok_or(CatalogError::UnknownEvaluation(evaluation.id))?;
        evaluation.created_at = existing.created_at;
        evaluation.completions = existing.completions;
        evaluation.updated_at = Utc::now();
        self.check_evaluation(&evaluation)?;
        tracing::info!(evaluation_id = evaluation.id, "updated evaluation");
        self.evaluations.insert(evaluation.id, evaluation);
        Ok(())
    }

    pub fn set_evaluation_status(
        &mut self,
        id: EvaluationId,
        status: EvaluationStatus,
    ) -> Result<(), CatalogError> {
        let evaluation = self
            .evaluations
            .get_mut(&id)
            .ok_or(CatalogError::UnknownEvaluation(id))?;
        evaluation.status = status;
        evaluation.updated_at = Utc::now();
        tracing::info!(evaluation_id = id, %status, "changed evaluation status");
        Ok(())
    }

    pub fn delete_evaluation(&mut self, id: EvaluationId) -> Result<Evaluation, CatalogError> {
        if !self.evaluations.contains_key(&id) {
            return Err(CatalogError::UnknownEvaluation(id));
        }
        let dependents: Vec<u64> = self
            .evaluations
            .values()
            .filter(|e| e.prerequisite_id == Some(id))
            .map(|e| e.id)
            .collect();
        if !dependents.is_empty() {
            return Err(CatalogError::InUse {
                kind: "evaluation",
                id,
                dependents,
            });
        }
        tracing::info!(evaluation_id = id, "deleted evaluation");
        self.evaluations
            .remove(&id)
            .ok_or(CatalogError::UnknownEvaluation(id))
    }

    fn check_evaluation(&self, evaluation: &Evaluation) -> Result<(), CatalogError> {
        if evaluation.title.trim().is_empty() {
            return Err(CatalogError::EmptyField("evaluation title"));
        }
        if !self.categories.contains_key(&evaluation.category_id) {
            return Err(CatalogError::UnknownCategory(evaluation.category_id));
        }
        if evaluation.duration_minutes == 0 {
            return Err(CatalogError::ZeroDuration);
        }
        if evaluation.passing_score > 100 {
            return Err(CatalogError::InvalidPassingScore(evaluation.passing_score));
        }

        let mut seen = HashSet::new();
        for question in &evaluation.questions {
            if !seen.insert(question.id) {
                return Err(CatalogError::DuplicateQuestion(question.id));
            }
            check_question(question)?;
        }
        match evaluation.total_points() {
            None => return Err(CatalogError::PointsOverflow(evaluation.title.clone())),
            Some(0) => return Err(CatalogError::ZeroTotalPoints(evaluation.title.clone())),
            Some(_) => {}
        }

        if let Some(prerequisite_id) = evaluation.prerequisite_id {
            self.check_evaluation_chain(evaluation.id, prerequisite_id)?;
        }
        Ok(())
    }

    /// Walk the prerequisite chain starting at `prerequisite_id` as if
    /// `evaluation_id` pointed at it.
    fn check_evaluation_chain(
        &self,
        evaluation_id: EvaluationId,
        prerequisite_id: EvaluationId,
    ) -> Result<(), CatalogError> {
        let mut seen = HashSet::from([evaluation_id]);
        let mut next = Some(prerequisite_id);
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(CatalogError::PrerequisiteCycle {
                    kind: "evaluation",
                    id,
                });
            }
            let Some(link) = self.evaluations.get(&id) else {
                return Err(CatalogError::DanglingPrerequisite {
                    kind: "evaluation",
                    id,
                });
            };
            next = link.prerequisite_id;
        }
        Ok(())
    }
}

fn check_question(question: &Question) -> Result<(), CatalogError> {
    let invalid = |message: &str| CatalogError::InvalidQuestion {
        question_id: question.id,
        message: message.to_string(),
    };

    if question.prompt.trim().is_empty() {
        return Err(invalid("prompt is empty"));
    }
    match &question.kind {
        QuestionKind::MultipleChoice {
            options,
            correct_index,
        } => {
            if options.len() < 2 {
                return Err(invalid("needs at least two options"));
            }
            if options.iter().any(|o| o.trim().is_empty()) {
                return Err(invalid("options must not be blank"));
            }
            if *correct_index >= options.len() {
                return Err(invalid("correct option index is out of range"));
            }
        }
        QuestionKind::TrueFalse { correct_index } => {
            if *correct_index > 1 {
                return Err(invalid("true/false answer must be 0 (true) or 1 (false)"));
            }
        }
        QuestionKind::Open { expected_text } => {
            if expected_text.is_empty() {
                return Err(invalid("expected answer text is empty"));
            }
        }
    }
    Ok(())
}
