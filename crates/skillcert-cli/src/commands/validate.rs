//! The `skillcert validate` command.

use std::path::PathBuf;

use anyhow::Result;

use skillcert_core::config::load_config_from;
use skillcert_core::parser::{load_catalog_directory, parse_catalog, validate_catalog};

pub fn execute(catalog_path: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let defaults = load_config_from(config.as_deref())?.catalog_defaults();
    let catalogs = if catalog_path.is_dir() {
        load_catalog_directory(&catalog_path, &defaults)?
    } else {
        vec![parse_catalog(&catalog_path, &defaults)?]
    };

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Catalog: {} ({} categories, {} evaluations)",
            catalog.name,
            catalog.categories().len(),
            catalog.evaluations().len()
        );

        let warnings = validate_catalog(catalog);
        for w in &warnings {
            let prefix = w
                .evaluation_id
                .map(|id| format!("  [evaluation {id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
