pub mod grade;
pub mod init;
pub mod progress;
pub mod take;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Result;

use skillcert_core::config::load_config_from;
use skillcert_core::parser::parse_catalog;
use skillcert_core::results::ResultLog;
use skillcert_core::state::AppState;

/// Load config, catalog and result log into one state. `results` overrides
/// the configured result log path; a missing log file is an empty history.
pub fn load_state(
    catalog_path: &Path,
    results: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<AppState> {
    let mut config = load_config_from(config_path)?;
    if let Some(results) = results {
        config.results_path = results;
    }
    let catalog = parse_catalog(catalog_path, &config.catalog_defaults())?;
    let log = ResultLog::load_or_default(&config.results_path)?;
    Ok(AppState::new(catalog, config).with_results(log))
}
