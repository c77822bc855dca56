//! Prerequisite gating and category progress.
//!
//! Everything here is a pure function of the catalog and the result log, so
//! gating can be re-derived at any time and asking twice gives the same
//! answer.

use std::collections::{BTreeMap, HashSet};

use crate::model::{Category, CategoryId, Evaluation, EvaluationId};
use crate::results::ResultLog;

/// An evaluation with no prerequisite is always unlocked; otherwise it needs
/// at least one certified result for the prerequisite, from any attempt.
pub fn is_evaluation_unlocked(evaluation: &Evaluation, results: &ResultLog) -> bool {
    match evaluation.prerequisite_id {
        None => true,
        Some(prerequisite) => results.has_certified(prerequisite),
    }
}

/// Share of a category's evaluations with a certified result, rounded
/// half-up to a whole percent. A category without evaluations is at 0.
pub fn category_progress<'a, I>(category_id: CategoryId, evaluations: I, results: &ResultLog) -> u8
where
    I: IntoIterator<Item = &'a Evaluation>,
{
    let mut total = 0u64;
    let mut certified = 0u64;
    for evaluation in evaluations
        .into_iter()
        .filter(|e| e.category_id == category_id)
    {
        total += 1;
        if results.has_certified(evaluation.id) {
            certified += 1;
        }
    }
    if total == 0 {
        return 0;
    }
    ((certified * 200 + total) / (2 * total)) as u8
}

/// A category with a prerequisite unlocks only when that prerequisite is at
/// exactly 100%.
pub fn is_category_unlocked<'a, I>(category: &Category, evaluations: I, results: &ResultLog) -> bool
where
    I: IntoIterator<Item = &'a Evaluation>,
{
    match category.prerequisite_id {
        None => true,
        Some(prerequisite) => category_progress(prerequisite, evaluations, results) == 100,
    }
}

/// Catalog-aware gating.
///
/// Adds chain resolution on top of the free functions: a prerequisite that
/// points at a missing entry, or a chain that loops back on itself, keeps
/// the dependent locked for good.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvaluator<'a> {
    categories: &'a BTreeMap<CategoryId, Category>,
    evaluations: &'a BTreeMap<EvaluationId, Evaluation>,
    results: &'a ResultLog,
}

impl<'a> ProgressEvaluator<'a> {
    pub fn new(
        categories: &'a BTreeMap<CategoryId, Category>,
        evaluations: &'a BTreeMap<EvaluationId, Evaluation>,
        results: &'a ResultLog,
    ) -> Self {
        Self {
            categories,
            evaluations,
            results,
        }
    }

    pub fn is_evaluation_unlocked(&self, evaluation: &Evaluation) -> bool {
        if !self.evaluation_chain_resolves(evaluation) {
            tracing::warn!(
                evaluation_id = evaluation.id,
                "unresolvable prerequisite chain, keeping evaluation locked"
            );
            return false;
        }
        is_evaluation_unlocked(evaluation, self.results)
    }

    /// Unknown evaluation ids are reported as locked.
    pub fn is_evaluation_id_unlocked(&self, evaluation_id: EvaluationId) -> bool {
        self.evaluations
            .get(&evaluation_id)
            .is_some_and(|e| self.is_evaluation_unlocked(e))
    }

    pub fn category_progress(&self, category_id: CategoryId) -> u8 {
        category_progress(category_id, self.evaluations.values(), self.results)
    }

    pub fn is_category_unlocked(&self, category: &Category) -> bool {
        if !self.category_chain_resolves(category) {
            tracing::warn!(
                category_id = category.id,
                "unresolvable prerequisite chain, keeping category locked"
            );
            return false;
        }
        is_category_unlocked(category, self.evaluations.values(), self.results)
    }

    pub fn is_category_id_unlocked(&self, category_id: CategoryId) -> bool {
        self.categories
            .get(&category_id)
            .is_some_and(|c| self.is_category_unlocked(c))
    }

    /// Categories whose progress is exactly 100%.
    pub fn completed_categories(&self) -> usize {
        self.categories
            .keys()
            .filter(|id| self.category_progress(**id) == 100)
            .count()
    }

    fn evaluation_chain_resolves(&self, evaluation: &Evaluation) -> bool {
        chain_resolves(evaluation.id, evaluation.prerequisite_id, |id| {
            self.evaluations.get(&id).map(|e| e.prerequisite_id)
        })
    }

    fn category_chain_resolves(&self, category: &Category) -> bool {
        chain_resolves(category.id, category.prerequisite_id, |id| {
            self.categories.get(&id).map(|c| c.prerequisite_id)
        })
    }
}

/// Follow prerequisite links from `start`. `lookup` returns `None` for an
/// unknown id and `Some(next)` otherwise.
fn chain_resolves<F>(start: u64, first: Option<u64>, lookup: F) -> bool
where
    F: Fn(u64) -> Option<Option<u64>>,
{
    let mut seen = HashSet::from([start]);
    let mut next = first;
    while let Some(id) = next {
        if !seen.insert(id) {
            return false;
        }
        match lookup(id) {
            Some(link) => next = link,
            None => return false,
        }
    }
    true
}
