//! skillcert configuration: catalog defaults, timer period, and where the
//! result log lives.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`SkillcertConfig::results_path`].
pub const RESULTS_ENV: &str = "SKILLCERT_RESULTS";

/// Top-level skillcert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillcertConfig {
    /// Passing score applied to catalog evaluations that omit one.
    #[serde(default = "default_passing_score")]
    pub default_passing_score: u8,
    /// Duration applied to catalog evaluations that omit one.
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
    /// Attempt limit applied to catalog evaluations that omit one.
    #[serde(default)]
    pub default_max_attempts: Option<u32>,
    /// Countdown tick period; each tick takes this much off the attempt clock.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Result log JSON file.
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_passing_score() -> u8 {
    70
}
fn default_duration() -> u32 {
    30
}
fn default_tick_interval() -> u64 {
    1000
}
fn default_results_path() -> PathBuf {
    PathBuf::from("./skillcert-results.json")
}

impl Default for SkillcertConfig {
    fn default() -> Self {
        Self {
            default_passing_score: default_passing_score(),
            default_duration_minutes: default_duration(),
            default_max_attempts: None,
            tick_interval_ms: default_tick_interval(),
            results_path: default_results_path(),
        }
    }
}

/// Values filled into catalog evaluations that leave a field out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogDefaults {
    pub passing_score: u8,
    pub duration_minutes: u32,
    pub max_attempts: Option<u32>,
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        SkillcertConfig::default().catalog_defaults()
    }
}

impl SkillcertConfig {
    pub fn catalog_defaults(&self) -> CatalogDefaults {
        CatalogDefaults {
            passing_score: self.default_passing_score,
            duration_minutes: self.default_duration_minutes,
            max_attempts: self.default_max_attempts,
        }
    }

    /// Tick period, never shorter than one millisecond.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Load config from an explicit path, or search the well-known locations.
///
/// Search order without an explicit path:
/// 1. `skillcert.toml` in the current directory
/// 2. `~/.config/skillcert/config.toml`
///
/// `SKILLCERT_RESULTS` overrides the result log path.
pub fn load_config_from(path: Option<&Path>) -> Result<SkillcertConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("skillcert.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_str(
                &std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?,
            )
            .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SkillcertConfig::default(),
    };

    if let Ok(results) = std::env::var(RESULTS_ENV) {
        if !results.is_empty() {
            config.results_path = PathBuf::from(results);
        }
    }

    Ok(config)
}

/// Parse and sanity-check a config document.
pub fn parse_config_str(content: &str) -> Result<SkillcertConfig> {
    let config: SkillcertConfig = toml::from_str(content)?;
    if config.default_passing_score > 100 {
        anyhow::bail!(
            "default_passing_score must be between 0 and 100, got {}",
            config.default_passing_score
        );
    }
    if config.default_duration_minutes == 0 {
        anyhow::bail!("default_duration_minutes must be at least 1");
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("skillcert"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SkillcertConfig::default();
        assert_eq!(config.default_passing_score, 70);
        assert_eq!(config.default_duration_minutes, 30);
        assert_eq!(config.tick_period(), Duration::from_secs(1));
        assert!(config.default_max_attempts.is_none());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = parse_config_str(
            r#"
default_passing_score = 80
default_max_attempts = 3
"#,
        )
        .unwrap();
        assert_eq!(config.default_passing_score, 80);
        assert_eq!(config.default_duration_minutes, 30);
        assert_eq!(config.catalog_defaults().max_attempts, Some(3));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(parse_config_str("default_passing_score = 120").is_err());
        assert!(parse_config_str("default_duration_minutes = 0").is_err());
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "tick_interval_ms = 250\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.tick_period(), Duration::from_millis(250));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/skillcert.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
