//! Dashboard statistics over the catalog and the result log.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::model::{CategoryId, EvaluationId};
use crate::progress::ProgressEvaluator;
use crate::results::ResultLog;

/// Mean percentage over every recorded attempt, rounded half-up.
/// 0 when nothing has been recorded.
pub fn average_score(results: &ResultLog) -> u8 {
    if results.is_empty() {
        return 0;
    }
    let n = results.len() as u64;
    let sum: u64 = results.iter().map(|r| u64::from(r.percentage)).sum();
    ((sum * 2 + n) / (2 * n)) as u8
}

pub fn certificate_count(results: &ResultLog) -> usize {
    results.certificates().count()
}

/// Categories at exactly 100% progress.
pub fn completed_categories(catalog: &Catalog, results: &ResultLog) -> usize {
    evaluator(catalog, results).completed_categories()
}

/// Sum of the administrative completion counters.
pub fn total_completions(catalog: &Catalog) -> u64 {
    catalog.evaluations().values().map(|e| e.completions).sum()
}

pub fn active_evaluations(catalog: &Catalog) -> usize {
    catalog
        .evaluations()
        .values()
        .filter(|e| e.is_active())
        .count()
}

pub fn best_percentage(results: &ResultLog, evaluation_id: EvaluationId) -> Option<u8> {
    results.best_for(evaluation_id).map(|r| r.percentage)
}

/// Headline numbers for the dashboard cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub attempts: usize,
    pub average_score: u8,
    pub certificates: usize,
    pub completed_categories: usize,
    pub total_categories: usize,
    pub active_evaluations: usize,
    pub total_completions: u64,
}

/// Progress of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub name: String,
    pub order: u32,
    pub progress: u8,
    pub unlocked: bool,
    pub evaluations: usize,
    pub certified_evaluations: usize,
}

pub fn compute_dashboard_stats(catalog: &Catalog, results: &ResultLog) -> DashboardStats {
    DashboardStats {
        attempts: results.len(),
        average_score: average_score(results),
        certificates: certificate_count(results),
        completed_categories: completed_categories(catalog, results),
        total_categories: catalog.categories().len(),
        active_evaluations: active_evaluations(catalog),
        total_completions: total_completions(catalog),
    }
}

/// One summary per category, in display order.
pub fn category_summaries(catalog: &Catalog, results: &ResultLog) -> Vec<CategorySummary> {
    let evaluator = evaluator(catalog, results);
    catalog
        .ordered_categories()
        .into_iter()
        .map(|category| {
            let (evaluations, certified_evaluations) = catalog
                .evaluations_in(category.id)
                .fold((0, 0), |(total, certified), e| {
                    (total + 1, certified + usize::from(results.has_certified(e.id)))
                });
            CategorySummary {
                category_id: category.id,
                name: category.name.clone(),
                order: category.order,
                progress: evaluator.category_progress(category.id),
                unlocked: evaluator.is_category_unlocked(category),
                evaluations,
                certified_evaluations,
            }
        })
        .collect()
}

fn evaluator<'a>(catalog: &'a Catalog, results: &'a ResultLog) -> ProgressEvaluator<'a> {
    ProgressEvaluator::new(catalog.categories(), catalog.evaluations(), results)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{NewCategory, NewEvaluation};
    use crate::model::{Difficulty, EvaluationStatus};
    use crate::results::tests::make_result;
    use crate::scoring::tests::choice;

    /// Two categories; the second requires the first. Evaluations 1 and 2
    /// belong to category 1, evaluation 3 to category 2.
    pub(crate) fn two_category_catalog() -> Catalog {
        let mut catalog = Catalog::new("stats");
        let first = catalog
            .create_category(NewCategory {
                name: "Programming Fundamentals".into(),
                order: 1,
                ..Default::default()
            })
            .unwrap();
        let second = catalog
            .create_category(NewCategory {
                name: "Frontend Development".into(),
                order: 2,
                prerequisite_id: Some(first),
                ..Default::default()
            })
            .unwrap();
        for (category_id, prerequisite_id) in [(first, None), (first, Some(1)), (second, None)] {
            catalog
                .create_evaluation(NewEvaluation {
                    title: "Evaluation".into(),
                    description: String::new(),
                    category_id,
                    difficulty: Difficulty::Basic,
                    duration_minutes: 30,
                    questions: vec![choice(1, 2, 0)],
                    passing_score: 70,
                    prerequisite_id,
                    status: EvaluationStatus::Active,
                    max_attempts: None,
                })
                .unwrap();
        }
        catalog
    }

    #[test]
    fn average_is_rounded_mean() {
        assert_eq!(average_score(&ResultLog::new()), 0);
        let log: ResultLog = vec![
            make_result(1, 1, 76, true),
            make_result(1, 1, 50, false),
            make_result(2, 1, 85, true),
        ]
        .into_iter()
        .collect();
        // 211 / 3 = 70.33
        assert_eq!(average_score(&log), 70);
        assert_eq!(certificate_count(&log), 2);
        assert_eq!(best_percentage(&log, 1), Some(76));
        assert_eq!(best_percentage(&log, 9), None);
    }

    #[test]
    fn dashboard_counts_completed_categories() {
        let mut catalog = two_category_catalog();
        catalog
            .set_evaluation_status(3, EvaluationStatus::Inactive)
            .unwrap();
        let log: ResultLog = vec![make_result(1, 1, 90, true), make_result(2, 1, 80, true)]
            .into_iter()
            .collect();

        let stats = compute_dashboard_stats(&catalog, &log);
        assert_eq!(stats.completed_categories, 1);
        assert_eq!(stats.total_categories, 2);
        assert_eq!(stats.active_evaluations, 2);
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.average_score, 85);
    }

    #[test]
    fn summaries_follow_display_order() {
        let catalog = two_category_catalog();
        let log: ResultLog = vec![make_result(1, 1, 90, true)].into_iter().collect();

        let summaries = category_summaries(&catalog, &log);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].progress, 50);
        assert_eq!(summaries[0].certified_evaluations, 1);
        assert!(summaries[0].unlocked);
        assert_eq!(summaries[1].evaluations, 1);
        assert!(!summaries[1].unlocked);
    }
}
