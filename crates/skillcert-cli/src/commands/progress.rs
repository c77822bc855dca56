//! The `skillcert progress` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use skillcert_core::report::DashboardReport;

use super::load_state;

pub fn execute(
    catalog_path: PathBuf,
    results: Option<PathBuf>,
    format: String,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let state = load_state(&catalog_path, results, config.as_deref())?;
    let report = state.dashboard();

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "text" => print_text(&report),
        other => anyhow::bail!("unknown format '{other}' (expected text, markdown or json)"),
    }

    if let Some(path) = &output {
        report.save_json(path)?;
        tracing::info!(path = %path.display(), "dashboard saved");
    }

    Ok(())
}

fn print_text(report: &DashboardReport) {
    let stats = &report.stats;
    println!("{}", report.catalog_name);
    println!(
        "Attempts: {}  Average score: {}%  Certificates: {}  Completed categories: {}/{}",
        stats.attempts,
        stats.average_score,
        stats.certificates,
        stats.completed_categories,
        stats.total_categories
    );

    let mut categories = Table::new();
    categories.set_header(vec!["Category", "Progress", "Certified", "Status"]);
    for c in &report.categories {
        categories.add_row(vec![
            Cell::new(&c.name),
            Cell::new(format!("{}%", c.progress)),
            Cell::new(format!("{}/{}", c.certified_evaluations, c.evaluations)),
            Cell::new(if c.unlocked { "unlocked" } else { "locked" }),
        ]);
    }
    println!("\n{categories}");

    let mut evaluations = Table::new();
    evaluations.set_header(vec![
        "ID",
        "Evaluation",
        "Difficulty",
        "Duration",
        "Passing",
        "Best",
        "Attempts",
        "Status",
    ]);
    for e in &report.evaluations {
        let status = if e.certified {
            "certified".to_string()
        } else if !e.unlocked {
            match e.prerequisite_id {
                Some(p) => format!("locked (needs {p})"),
                None => "locked".to_string(),
            }
        } else {
            e.status.to_string()
        };
        evaluations.add_row(vec![
            Cell::new(e.evaluation_id),
            Cell::new(&e.title),
            Cell::new(e.difficulty),
            Cell::new(format!("{} min", e.duration_minutes)),
            Cell::new(format!("{}%", e.passing_score)),
            Cell::new(
                e.best_percentage
                    .map(|p| format!("{p}%"))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(e.attempts),
            Cell::new(status),
        ]);
    }
    println!("\n{evaluations}");
}
