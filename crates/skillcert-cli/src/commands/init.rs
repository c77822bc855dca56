//! The `skillcert init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("skillcert.toml").exists() {
        println!("skillcert.toml already exists, skipping.");
    } else {
        std::fs::write("skillcert.toml", SAMPLE_CONFIG)?;
        println!("Created skillcert.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let example_path = Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    std::fs::create_dir_all("answers")?;
    let answers_path = Path::new("answers/example.toml");
    if answers_path.exists() {
        println!("answers/example.toml already exists, skipping.");
    } else {
        std::fs::write(answers_path, EXAMPLE_ANSWERS)?;
        println!("Created answers/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: skillcert validate --catalog catalogs/example.toml");
    println!("  2. Run: skillcert grade --catalog catalogs/example.toml --answers answers/example.toml --results skillcert-results.json");
    println!("  3. Run: skillcert progress --catalog catalogs/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# skillcert configuration

default_passing_score = 70
default_duration_minutes = 30
# default_max_attempts = 3
tick_interval_ms = 1000
results_path = "./skillcert-results.json"
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
name = "Example Catalog"
description = "A small catalog to get started"

[[categories]]
id = 1
name = "Basics"
order = 1

[[categories]]
id = 2
name = "Next Steps"
order = 2
prerequisite = 1

[[evaluations]]
id = 1
title = "Getting Started"
category = 1
duration_minutes = 10

[[evaluations.questions]]
type = "multiple-choice"
prompt = "Which score certifies an attempt with a 70% passing score?"
points = 2
options = ["69%", "70%"]
correct = 1

[[evaluations.questions]]
type = "true-false"
prompt = "Unanswered questions earn no points."
points = 1
answer = true

[[evaluations]]
id = 2
title = "Prerequisites"
category = 2
prerequisite = 1

[[evaluations.questions]]
type = "true-false"
prompt = "A later failed attempt locks a dependent evaluation again."
points = 1
answer = false
"#;

const EXAMPLE_ANSWERS: &str = r#"evaluation = 1

[answers]
1 = 1
2 = true
"#;
