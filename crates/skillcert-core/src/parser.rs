//! TOML catalog and answer-sheet parser.
//!
//! Loads catalogs from TOML files and directories, validates them, and reads
//! answer sheets for offline grading.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;

use crate::catalog::Catalog;
use crate::config::CatalogDefaults;
use crate::model::{
    AnswerSet, AnswerValue, Category, Difficulty, Evaluation, EvaluationId, EvaluationStatus,
    FlaggedSet, Question, QuestionKind,
};

/// Intermediate TOML structure for catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    categories: Vec<TomlCategory>,
    #[serde(default)]
    evaluations: Vec<TomlEvaluation>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlCategory {
    id: u64,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    order: Option<u32>,
    #[serde(default)]
    prerequisite: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlEvaluation {
    id: u64,
    title: String,
    #[serde(default)]
    description: String,
    category: u64,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    passing_score: Option<u8>,
    #[serde(default)]
    prerequisite: Option<u64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    completions: u64,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: String,
    prompt: String,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default)]
    options: Vec<String>,
    /// Index of the correct option (multiple-choice).
    #[serde(default)]
    correct: Option<usize>,
    /// Correct value (true-false).
    #[serde(default)]
    answer: Option<bool>,
    /// Expected text (open).
    #[serde(default)]
    expected: Option<String>,
}

fn default_points() -> u32 {
    1
}

/// Parse a single TOML file into a [`Catalog`].
pub fn parse_catalog(path: &Path, defaults: &CatalogDefaults) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path, defaults)
}

/// Parse a TOML string into a [`Catalog`] (useful for testing).
///
/// Entries go through the same integrity checks as administrative edits, so
/// a catalog with zero-point evaluations or broken prerequisites is an error.
pub fn parse_catalog_str(
    content: &str,
    source_path: &Path,
    defaults: &CatalogDefaults,
) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut catalog = Catalog::new(parsed.catalog.name);
    catalog.description = parsed.catalog.description;

    // Prerequisites must be ordered first, so inserting by order lets every
    // well-formed category find its prerequisite already present.
    let mut categories: Vec<Category> = parsed
        .categories
        .into_iter()
        .enumerate()
        .map(|(i, c)| Category {
            id: c.id,
            name: c.name,
            description: c.description,
            order: c.order.unwrap_or(i as u32 + 1),
            prerequisite_id: c.prerequisite,
        })
        .collect();
    categories.sort_by_key(|c| (c.order, c.id));
    for category in categories {
        let id = category.id;
        catalog
            .insert_category(category)
            .with_context(|| format!("invalid category {id} in {}", source_path.display()))?;
    }

    let evaluations = parsed
        .evaluations
        .into_iter()
        .map(|e| convert_evaluation(e, defaults))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid evaluation in {}", source_path.display()))?;

    for evaluation in prerequisite_order(evaluations) {
        let id = evaluation.id;
        catalog
            .insert_evaluation(evaluation)
            .with_context(|| format!("invalid evaluation {id} in {}", source_path.display()))?;
    }

    tracing::debug!(
        catalog = %catalog.name,
        categories = catalog.categories().len(),
        evaluations = catalog.evaluations().len(),
        "parsed catalog"
    );
    Ok(catalog)
}

fn convert_evaluation(e: TomlEvaluation, defaults: &CatalogDefaults) -> Result<Evaluation> {
    let difficulty: Difficulty = match e.difficulty {
        Some(d) => d.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?,
        None => Difficulty::default(),
    };
    let status: EvaluationStatus = match e.status {
        Some(s) => s.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?,
        None => EvaluationStatus::default(),
    };

    let questions = e
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| convert_question(q, i as u64 + 1))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("evaluation {}", e.id))?;

    let now = Utc::now();
    Ok(Evaluation {
        id: e.id,
        title: e.title,
        description: e.description,
        category_id: e.category,
        difficulty,
        duration_minutes: e.duration_minutes.unwrap_or(defaults.duration_minutes),
        questions,
        passing_score: e.passing_score.unwrap_or(defaults.passing_score),
        prerequisite_id: e.prerequisite,
        status,
        completions: e.completions,
        max_attempts: e.max_attempts.or(defaults.max_attempts),
        created_at: now,
        updated_at: now,
    })
}

fn convert_question(q: TomlQuestion, fallback_id: u64) -> Result<Question> {
    let id = q.id.unwrap_or(fallback_id);
    let kind = match q.kind.as_str() {
        "multiple-choice" | "multiple_choice" => QuestionKind::MultipleChoice {
            correct_index: q
                .correct
                .with_context(|| format!("question {id}: multiple-choice needs `correct`"))?,
            options: q.options,
        },
        "true-false" | "true_false" => {
            let answer = q
                .answer
                .with_context(|| format!("question {id}: true-false needs `answer`"))?;
            QuestionKind::TrueFalse {
                correct_index: if answer { 0 } else { 1 },
            }
        }
        "open" => QuestionKind::Open {
            expected_text: q
                .expected
                .with_context(|| format!("question {id}: open needs `expected`"))?,
        },
        other => anyhow::bail!("question {id}: unknown question type '{other}'"),
    };
    Ok(Question {
        id,
        prompt: q.prompt,
        points: q.points,
        kind,
    })
}

/// Reorder evaluations so each one follows its prerequisite. Entries whose
/// chain never resolves are left at the end, where insertion rejects them.
fn prerequisite_order(mut pending: Vec<Evaluation>) -> Vec<Evaluation> {
    let mut ordered = Vec::with_capacity(pending.len());
    let mut placed: HashSet<EvaluationId> = HashSet::new();
    loop {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|e| e.prerequisite_id.map_or(true, |p| placed.contains(&p)));
        if ready.is_empty() {
            ordered.extend(blocked);
            return ordered;
        }
        placed.extend(ready.iter().map(|e| e.id));
        ordered.extend(ready);
        pending = blocked;
    }
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path, defaults: &CatalogDefaults) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path, defaults)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path, defaults) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// A non-fatal issue found in a loaded catalog.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The evaluation concerned, if any.
    pub evaluation_id: Option<EvaluationId>,
    pub message: String,
}

/// Check a catalog for content that loads fine but is probably a mistake.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for category in catalog.ordered_categories() {
        if catalog.evaluations_in(category.id).next().is_none() {
            warnings.push(ValidationWarning {
                evaluation_id: None,
                message: format!(
                    "category '{}' has no evaluations; it can never reach 100%",
                    category.name
                ),
            });
        }
    }

    for evaluation in catalog.evaluations().values() {
        let warn = |message: String| ValidationWarning {
            evaluation_id: Some(evaluation.id),
            message,
        };

        if evaluation.passing_score == 0 {
            warnings.push(warn("passing score is 0%; every attempt certifies".into()));
        }

        for question in &evaluation.questions {
            if question.points == 0 {
                warnings.push(warn(format!("question {} is worth 0 points", question.id)));
            }
            if matches!(question.kind, QuestionKind::Open { .. }) {
                warnings.push(warn(format!(
                    "question {} is open; only the exact expected text is accepted",
                    question.id
                )));
            }
        }

        let Some(prerequisite) = evaluation
            .prerequisite_id
            .and_then(|id| catalog.evaluation(id))
        else {
            continue;
        };
        if evaluation.is_active() && !prerequisite.is_active() {
            warnings.push(warn(format!(
                "prerequisite {} is inactive, so this evaluation stays locked",
                prerequisite.id
            )));
        }
        let order_of = |id| catalog.category(id).map(|c| c.order);
        if order_of(prerequisite.category_id) > order_of(evaluation.category_id) {
            warnings.push(warn(format!(
                "prerequisite {} belongs to a later category",
                prerequisite.id
            )));
        }
    }

    warnings
}

/// Answers for one evaluation, read from a TOML answer sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerSheet {
    pub evaluation_id: Option<EvaluationId>,
    pub answers: AnswerSet,
    pub flagged: FlaggedSet,
    pub remaining_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlAnswerSheet {
    #[serde(default)]
    evaluation: Option<u64>,
    #[serde(default)]
    remaining_secs: Option<u64>,
    #[serde(default)]
    flagged: Vec<u64>,
    #[serde(default)]
    answers: BTreeMap<String, toml::Value>,
}

pub fn parse_answer_sheet(path: &Path) -> Result<AnswerSheet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answer sheet: {}", path.display()))?;

    parse_answer_sheet_str(&content)
        .with_context(|| format!("failed to parse answer sheet: {}", path.display()))
}

/// Integers select an option, `true`/`false` select option 0/1, and strings
/// are open-question text.
pub fn parse_answer_sheet_str(content: &str) -> Result<AnswerSheet> {
    let parsed: TomlAnswerSheet = toml::from_str(content)?;

    let answers = parsed
        .answers
        .into_iter()
        .map(|(key, value)| -> Result<(u64, AnswerValue)> {
            let question_id: u64 = key
                .parse()
                .with_context(|| format!("answer key '{key}' is not a question id"))?;
            let value = match value {
                toml::Value::Integer(i) => AnswerValue::Choice(
                    usize::try_from(i)
                        .with_context(|| format!("question {question_id}: negative option index"))?,
                ),
                toml::Value::Boolean(b) => AnswerValue::Choice(if b { 0 } else { 1 }),
                toml::Value::String(s) => AnswerValue::Text(s),
                other => anyhow::bail!(
                    "question {question_id}: unsupported answer type {}",
                    other.type_str()
                ),
            };
            Ok((question_id, value))
        })
        .collect::<Result<HashMap<_, _>>>()?;

    Ok(AnswerSheet {
        evaluation_id: parsed.evaluation,
        answers,
        flagged: parsed.flagged.into_iter().collect(),
        remaining_secs: parsed.remaining_secs,
    })
}
