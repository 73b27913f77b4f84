//! CLI configuration

use std::path::PathBuf;

use anyhow::Context;
use cfpq_core::{Algorithm, Backend};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "CFPQ_CONFIG_DIR";

/// Directory holding `config.toml`
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cfpq")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Algorithm used when `--algorithm` is not given
    pub default_algorithm: String,

    /// Matrix backend: sparse or dense
    pub backend: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// table, json or csv
    pub output_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_algorithm: Algorithm::default().to_string(),
            backend: "sparse".to_string(),
            max_iterations: None,
            timeout_ms: None,
            output_format: "table".to_string(),
        }
    }
}

impl Config {
    /// Load the config file, or defaults if it is missing or unreadable
    pub fn load() -> Self {
        let path = config_file_path();
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "default_algorithm",
            "backend",
            "max_iterations",
            "timeout_ms",
            "output_format",
        ]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let optional = |v: Option<u64>| v.map_or_else(|| "none".to_string(), |v| v.to_string());
        match key {
            "default_algorithm" => Some(self.default_algorithm.clone()),
            "backend" => Some(self.backend.clone()),
            "max_iterations" => Some(optional(self.max_iterations)),
            "timeout_ms" => Some(optional(self.timeout_ms)),
            "output_format" => Some(self.output_format.clone()),
            _ => None,
        }
    }

    /// Set a key, validating the value
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "default_algorithm" => {
                let algorithm: Algorithm = value.parse()?;
                self.default_algorithm = algorithm.to_string();
            }
            "backend" => {
                value.parse::<Backend>()?;
                self.backend = value.to_lowercase();
            }
            "max_iterations" => self.max_iterations = parse_optional(key, value)?,
            "timeout_ms" => self.timeout_ms = parse_optional(key, value)?,
            "output_format" => {
                let format = value.to_lowercase();
                if !matches!(format.as_str(), "table" | "json" | "csv") {
                    anyhow::bail!("output_format must be table, json or csv (got {})", value);
                }
                self.output_format = format;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Available keys: {}",
                key,
                Self::keys().join(", ")
            ),
        }
        Ok(())
    }

    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        Ok(self.default_algorithm.parse()?)
    }
}

/// `none` clears the value
fn parse_optional(key: &str, value: &str) -> anyhow::Result<Option<u64>> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let parsed = value
        .parse::<u64>()
        .with_context(|| format!("{} must be a positive integer or `none`", key))?;
    Ok(Some(parsed))
}
