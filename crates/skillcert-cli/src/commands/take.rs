//! The `skillcert take` command: a timed attempt driven from stdin.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;

use skillcert_core::model::{AnswerValue, Evaluation, QuestionId, QuestionKind};
use skillcert_core::session::{run_attempt, SessionCommand};

use super::grade::print_result;
use super::load_state;

pub async fn execute(
    catalog_path: PathBuf,
    evaluation_id: u64,
    results: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut state = load_state(&catalog_path, results, config.as_deref())?;
    let mut session = state.begin_attempt(evaluation_id)?;
    print_instructions(session.evaluation());

    let open_questions = session
        .evaluation()
        .questions
        .iter()
        .filter(|q| matches!(q.kind, QuestionKind::Open { .. }))
        .map(|q| q.id)
        .collect();
    // A plain thread: a blocked stdin read must not hold up shutdown.
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || read_commands(tx, open_questions));

    let end = run_attempt(&mut session, state.tick_period(), rx).await?;
    let evaluation = session.evaluation().clone();

    match state.finish(end) {
        Some(result) => {
            print_result(&evaluation, result);
            state.save_results()?;
            println!("Result appended to {}", state.config.results_path.display());
        }
        None => println!("Attempt cancelled, nothing recorded."),
    }

    Ok(())
}

fn read_commands(tx: mpsc::Sender<SessionCommand>, open_questions: BTreeSet<QuestionId>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match parse_command(&line, &open_questions) {
            Ok(Some(command)) => {
                if tx.blocking_send(command).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }
}

/// One line of input. Blank lines are ignored.
///
/// ```text
/// answer <question> <option index | true | false | "text">
/// flag <question>
/// next | prev | submit | cancel
/// ```
///
/// Answers to the questions in `open_questions` are always taken as text.
fn parse_command(
    line: &str,
    open_questions: &BTreeSet<QuestionId>,
) -> Result<Option<SessionCommand>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let command = match word {
        "" => return Ok(None),
        "submit" => SessionCommand::Submit,
        "cancel" => SessionCommand::Cancel,
        "next" | "n" => SessionCommand::Next,
        "prev" | "p" => SessionCommand::Previous,
        "flag" => SessionCommand::ToggleFlag(parse_question_id(rest.trim())?),
        "answer" | "a" => {
            let rest = rest.trim_start();
            let (id, value) = rest.split_once(' ').ok_or("usage: answer <question> <value>")?;
            let question_id = parse_question_id(id)?;
            let value = value.trim();
            let value = if open_questions.contains(&question_id) {
                AnswerValue::Text(unquote(value).unwrap_or(value).to_string())
            } else {
                parse_value(value)
            };
            SessionCommand::Answer { question_id, value }
        }
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}

fn parse_question_id(s: &str) -> Result<u64, String> {
    s.parse().map_err(|_| format!("'{s}' is not a question id"))
}

fn parse_value(s: &str) -> AnswerValue {
    match s {
        "true" => AnswerValue::Choice(0),
        "false" => AnswerValue::Choice(1),
        _ => {
            if let Some(text) = unquote(s) {
                AnswerValue::Text(text.to_string())
            } else if let Ok(index) = s.parse() {
                AnswerValue::Choice(index)
            } else {
                AnswerValue::Text(s.to_string())
            }
        }
    }
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('"').and_then(|t| t.strip_suffix('"'))
}

fn print_instructions(evaluation: &Evaluation) {
    println!(
        "{}: {} questions, {} minutes, passing score {}%",
        evaluation.title,
        evaluation.questions.len(),
        evaluation.duration_minutes,
        evaluation.passing_score
    );
    for question in &evaluation.questions {
        println!("\n[{}] {} ({} pts)", question.id, question.prompt, question.points);
        for (i, label) in question.kind.option_labels().iter().enumerate() {
            println!("    {i}) {label}");
        }
        if matches!(question.kind, QuestionKind::Open { .. }) {
            println!("    (free text)");
        }
    }
    println!(
        "\nCommands: answer <question> <option number | true | false | text>, \
         flag <question>, next, prev, submit, cancel"
    );
}
