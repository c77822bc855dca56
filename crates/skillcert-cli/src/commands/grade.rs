//! The `skillcert grade` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use skillcert_core::model::Evaluation;
use skillcert_core::parser::parse_answer_sheet;
use skillcert_core::results::{AttemptResult, QuestionGrade};

use super::load_state;

pub fn execute(
    catalog_path: PathBuf,
    evaluation: Option<u64>,
    answers_path: PathBuf,
    remaining_secs: Option<u64>,
    results: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let persist = results.is_some();
    let mut state = load_state(&catalog_path, results, config.as_deref())?;
    let sheet = parse_answer_sheet(&answers_path)?;

    let evaluation_id = evaluation.or(sheet.evaluation_id).context(
        "no evaluation selected: pass --evaluation or set `evaluation` in the answer sheet",
    )?;
    if let (Some(arg), Some(named)) = (evaluation, sheet.evaluation_id) {
        if arg != named {
            tracing::warn!(
                evaluation = arg,
                sheet = named,
                "answer sheet names a different evaluation"
            );
        }
    }

    let remaining = Duration::from_secs(remaining_secs.or(sheet.remaining_secs).unwrap_or(0));
    let result = state
        .submit_attempt(evaluation_id, &sheet.answers, &sheet.flagged, remaining)?
        .clone();

    if let Some(evaluation) = state.catalog.evaluation(evaluation_id) {
        for id in sheet.answers.keys().filter(|id| evaluation.question(**id).is_none()) {
            tracing::warn!(question_id = id, "answer for unknown question ignored");
        }
        print_result(evaluation, &result);
    }

    if result.certified {
        for dependent in state
            .catalog
            .evaluations()
            .values()
            .filter(|e| e.prerequisite_id == Some(evaluation_id))
        {
            if state.is_evaluation_unlocked(dependent.id) {
                println!("Unlocked: {}", dependent.title);
            }
        }
    }

    if persist {
        state.save_results()?;
        println!("Result appended to {}", state.config.results_path.display());
    }

    Ok(())
}

pub(crate) fn print_result(evaluation: &Evaluation, result: &AttemptResult) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Points", "Earned", "Grade"]);

    for (n, (question, graded)) in evaluation
        .questions
        .iter()
        .zip(&result.question_results)
        .enumerate()
    {
        let grade = match graded.grade {
            QuestionGrade::Correct => "correct",
            QuestionGrade::Incorrect => "incorrect",
            QuestionGrade::Unanswered => "unanswered",
        };
        let flag = if graded.flagged { " (flagged)" } else { "" };
        table.add_row(vec![
            Cell::new(n + 1),
            Cell::new(&question.prompt),
            Cell::new(graded.points),
            Cell::new(graded.points_earned),
            Cell::new(format!("{grade}{flag}")),
        ]);
    }

    println!("{} (attempt {})", result.evaluation_title, result.attempt_number);
    println!("{table}");
    println!(
        "Score: {}/{} ({}%), {} of {} correct",
        result.score,
        result.max_score,
        result.percentage,
        result.correct_answers,
        result.total_questions
    );
    println!("Time spent: {} min", result.time_spent_minutes);
    if result.certified {
        println!("Result: CERTIFIED (passing score {}%)", result.passing_score);
    } else {
        println!("Result: NOT CERTIFIED (passing score {}%)", result.passing_score);
    }
    if let Some(code) = &result.certificate_code {
        println!("Certificate: {code}");
    }
}
