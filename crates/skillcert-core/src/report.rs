//! Dashboard snapshot with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::model::{CategoryId, Difficulty, EvaluationId, EvaluationStatus};
use crate::progress::ProgressEvaluator;
use crate::results::ResultLog;
use crate::statistics::{category_summaries, compute_dashboard_stats, CategorySummary, DashboardStats};

/// Everything the dashboard shows, derived from the catalog and result log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_name: String,
    pub stats: DashboardStats,
    pub categories: Vec<CategorySummary>,
    pub evaluations: Vec<EvaluationRow>,
}

/// One evaluation as listed on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub evaluation_id: EvaluationId,
    pub title: String,
    pub category_id: CategoryId,
    pub difficulty: Difficulty,
    pub status: EvaluationStatus,
    pub duration_minutes: u32,
    pub question_count: usize,
    pub passing_score: u8,
    pub prerequisite_id: Option<EvaluationId>,
    pub unlocked: bool,
    pub attempts: u32,
    pub best_percentage: Option<u8>,
    pub certified: bool,
}

impl DashboardReport {
    pub fn build(catalog: &Catalog, results: &ResultLog) -> Self {
        let evaluator =
            ProgressEvaluator::new(catalog.categories(), catalog.evaluations(), results);

        // Evaluations grouped by category display order.
        let evaluations: Vec<EvaluationRow> = catalog
            .ordered_categories()
            .into_iter()
            .flat_map(|c| catalog.evaluations_in(c.id))
            .map(|e| EvaluationRow {
                evaluation_id: e.id,
                title: e.title.clone(),
                category_id: e.category_id,
                difficulty: e.difficulty,
                status: e.status,
                duration_minutes: e.duration_minutes,
                question_count: e.questions.len(),
                passing_score: e.passing_score,
                prerequisite_id: e.prerequisite_id,
                unlocked: evaluator.is_evaluation_unlocked(e),
                attempts: results.attempt_count(e.id),
                best_percentage: results.best_for(e.id).map(|r| r.percentage),
                certified: results.has_certified(e.id),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            catalog_name: catalog.name.clone(),
            stats: compute_dashboard_stats(catalog, results),
            categories: category_summaries(catalog, results),
            evaluations,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize dashboard")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write dashboard to {}", path.display()))?;
        Ok(())
    }

    /// Format the dashboard as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## {}\n\n", self.catalog_name));
        md.push_str(&format!(
            "**Summary:** {} attempts, average score {}%, {} certificates, {}/{} categories completed\n\n",
            self.stats.attempts,
            self.stats.average_score,
            self.stats.certificates,
            self.stats.completed_categories,
            self.stats.total_categories
        ));

        if !self.categories.is_empty() {
            md.push_str("### Categories\n\n");
            md.push_str("| Category | Progress | Certified | Status |\n");
            md.push_str("|----------|----------|-----------|--------|\n");
            for c in &self.categories {
                md.push_str(&format!(
                    "| {} | {}% | {}/{} | {} |\n",
                    c.name,
                    c.progress,
                    c.certified_evaluations,
                    c.evaluations,
                    lock_label(c.unlocked)
                ));
            }
            md.push('\n');
        }

        if !self.evaluations.is_empty() {
            md.push_str("### Evaluations\n\n");
            md.push_str("| Evaluation | Difficulty | Passing | Best | Attempts | Status |\n");
            md.push_str("|------------|------------|---------|------|----------|--------|\n");
            for e in &self.evaluations {
                let best = e
                    .best_percentage
                    .map(|p| format!("{p}%"))
                    .unwrap_or_else(|| "-".into());
                let status = if e.certified {
                    "certified"
                } else if e.status == EvaluationStatus::Inactive {
                    "inactive"
                } else {
                    lock_label(e.unlocked)
                };
                md.push_str(&format!(
                    "| {} | {} | {}% | {} | {} | {} |\n",
                    e.title, e.difficulty, e.passing_score, best, e.attempts, status
                ));
            }
        }

        md
    }
}

fn lock_label(unlocked: bool) -> &'static str {
    if unlocked {
        "unlocked"
    } else {
        "locked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::tests::make_result;
    use crate::statistics::tests::two_category_catalog;

    #[test]
    fn fresh_dashboard_locks_dependents() {
        let catalog = two_category_catalog();
        let report = DashboardReport::build(&catalog, &ResultLog::new());

        assert_eq!(report.stats.attempts, 0);
        assert_eq!(report.stats.average_score, 0);
        let unlocked: Vec<bool> = report.evaluations.iter().map(|e| e.unlocked).collect();
        assert_eq!(unlocked, vec![true, false, true]);
        assert!(!report.categories[1].unlocked);
    }

    #[test]
    fn markdown_lists_progress_and_best_scores() {
        let catalog = two_category_catalog();
        let log: ResultLog = vec![make_result(1, 1, 60, false), make_result(1, 1, 90, true)]
            .into_iter()
            .collect();
        let md = DashboardReport::build(&catalog, &log).to_markdown();

        assert!(md.contains("## stats"));
        assert!(md.contains("2 attempts, average score 75%, 1 certificates"));
        assert!(md.contains("| Programming Fundamentals | 50% | 1/2 | unlocked |"));
        assert!(md.contains("| Frontend Development | 0% | 0/1 | locked |"));
        assert!(md.contains("| 90% | 2 | certified |"));
    }

    #[test]
    fn json_round_trip_keeps_rows() {
        let catalog = two_category_catalog();
        let report = DashboardReport::build(&catalog, &ResultLog::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        report.save_json(&path).unwrap();

        let loaded: DashboardReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.evaluations.len(), 3);
        assert_eq!(loaded.stats, report.stats);
    }
}
