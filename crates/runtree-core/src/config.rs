//! Project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::suite::ConfigurationEntry;

/// Top-level runtree configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntreeConfig {
    /// Timeout given to each new test, in milliseconds. Zero disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry attempts the execution engine may make after a failure.
    #[serde(default)]
    pub retries: u32,
    /// Factor applied to the timeout of tests marked slow.
    #[serde(default = "default_slow_multiplier")]
    pub slow_timeout_multiplier: u64,
    /// Worker configuration applied to every file suite.
    #[serde(default)]
    pub configuration: Vec<ConfigurationEntry>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_slow_multiplier() -> u64 {
    3
}

impl Default for RuntreeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: 0,
            slow_timeout_multiplier: default_slow_multiplier(),
            configuration: Vec::new(),
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `runtree.toml` in the current directory
/// 2. `~/.config/runtree/config.toml`
///
/// Environment variable overrides: `RUNTREE_TIMEOUT_MS`, `RUNTREE_RETRIES`.
pub fn load_config() -> Result<RuntreeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RuntreeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("runtree.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<RuntreeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            RuntreeConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Apply `RUNTREE_*` overrides read through `lookup`.
fn apply_env_overrides(
    config: &mut RuntreeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(value) = lookup("RUNTREE_TIMEOUT_MS") {
        config.timeout_ms = value
            .trim()
            .parse()
            .with_context(|| format!("invalid RUNTREE_TIMEOUT_MS: {value}"))?;
    }
    if let Some(value) = lookup("RUNTREE_RETRIES") {
        config.retries = value
            .trim()
            .parse()
            .with_context(|| format!("invalid RUNTREE_RETRIES: {value}"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("runtree"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RuntreeConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.retries, 0);
        assert_eq!(config.slow_timeout_multiplier, 3);
        assert!(config.configuration.is_empty());
    }

    #[test]
    fn parse_config_keeps_configuration_order() {
        let toml_str = r#"
timeout_ms = 10000
retries = 2

[[configuration]]
name = "browser"
value = "chromium"

[[configuration]]
name = "os"
value = "linux"
"#;
        let config: RuntreeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.retries, 2);
        assert_eq!(config.slow_timeout_multiplier, 3);
        let names: Vec<_> = config.configuration.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["browser", "os"]);
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtree.toml");
        std::fs::write(&path, "slow_timeout_multiplier = 5\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.slow_timeout_multiplier, 5);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timeout_ms = \"soon\"").unwrap();
        assert!(load_config_from(Some(&path)).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = RuntreeConfig::default();
        apply_env_overrides(&mut config, |name| match name {
            "RUNTREE_TIMEOUT_MS" => Some("500".into()),
            "RUNTREE_RETRIES" => Some(" 3 ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.retries, 3);
    }

    #[test]
    fn unparsable_override_is_an_error() {
        let mut config = RuntreeConfig::default();
        let err = apply_env_overrides(&mut config, |name| {
            (name == "RUNTREE_RETRIES").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("RUNTREE_RETRIES"));
    }
}
