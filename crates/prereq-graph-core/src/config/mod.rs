//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::domain::prerequisites::Strength;

/// prereq-graph configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub strength: StrengthConfig,
    pub classifier: ClassifierConfig,
    pub merge: MergeConfig,
    pub ingestion: IngestionConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file; `None` uses the platform data directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

/// Frequency thresholds for edge strength tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthConfig {
    pub medium_threshold: u32,
    pub strong_threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub min_label_len: usize,
    pub hint_mismatch_margin: usize,
}

/// Weights for merge-candidate scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub shared_concept_weight: u32,
    pub shared_topic_weight: u32,
    pub name_similarity_weight: u32,
    pub name_similarity_threshold: f64,
    pub max_candidates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub max_lock_wait_ms: u64,
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub learning_path_limit: usize,
    pub analytics_top_n: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for StrengthConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 4,
            strong_threshold: 10,
        }
    }
}

impl StrengthConfig {
    /// Map a frequency to its strength tier using these thresholds
    pub fn strength_of(&self, frequency: i64) -> Strength {
        if frequency >= i64::from(self.strong_threshold) {
            Strength::Strong
        } else if frequency >= i64::from(self.medium_threshold) {
            Strength::Medium
        } else {
            Strength::Weak
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_label_len: 3,
            hint_mismatch_margin: 2,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            shared_concept_weight: 30,
            shared_topic_weight: 10,
            name_similarity_weight: 20,
            name_similarity_threshold: 0.7,
            max_candidates: 10,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            max_lock_wait_ms: 5_000,
            job_timeout_secs: 30,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            learning_path_limit: 5,
            analytics_top_n: 10,
        }
    }
}

const KEYS: &[&str] = &[
    "database.path",
    "database.max_connections",
    "database.busy_timeout_ms",
    "strength.medium_threshold",
    "strength.strong_threshold",
    "classifier.min_label_len",
    "classifier.hint_mismatch_margin",
    "merge.shared_concept_weight",
    "merge.shared_topic_weight",
    "merge.name_similarity_weight",
    "merge.name_similarity_threshold",
    "merge.max_candidates",
    "ingestion.workers",
    "ingestion.max_attempts",
    "ingestion.max_lock_wait_ms",
    "ingestion.job_timeout_secs",
    "query.learning_path_limit",
    "query.analytics_top_n",
];

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PREREQ_GRAPH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("prereq-graph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.strength.medium_threshold == 0
            || self.strength.medium_threshold >= self.strength.strong_threshold
        {
            return Err(anyhow!(
                "strength.medium_threshold must be positive and below strength.strong_threshold"
            ));
        }
        if !(0.0..=1.0).contains(&self.merge.name_similarity_threshold) {
            return Err(anyhow!(
                "merge.name_similarity_threshold must be between 0.0 and 1.0"
            ));
        }
        if self.merge.max_candidates == 0 {
            return Err(anyhow!("merge.max_candidates must be at least 1"));
        }
        if self.ingestion.workers == 0 || self.ingestion.max_attempts == 0 {
            return Err(anyhow!(
                "ingestion.workers and ingestion.max_attempts must be at least 1"
            ));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let value = match key {
            "database.path" => self
                .database
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string()),
            "database.max_connections" => self.database.max_connections.to_string(),
            "database.busy_timeout_ms" => self.database.busy_timeout_ms.to_string(),
            "strength.medium_threshold" => self.strength.medium_threshold.to_string(),
            "strength.strong_threshold" => self.strength.strong_threshold.to_string(),
            "classifier.min_label_len" => self.classifier.min_label_len.to_string(),
            "classifier.hint_mismatch_margin" => self.classifier.hint_mismatch_margin.to_string(),
            "merge.shared_concept_weight" => self.merge.shared_concept_weight.to_string(),
            "merge.shared_topic_weight" => self.merge.shared_topic_weight.to_string(),
            "merge.name_similarity_weight" => self.merge.name_similarity_weight.to_string(),
            "merge.name_similarity_threshold" => self.merge.name_similarity_threshold.to_string(),
            "merge.max_candidates" => self.merge.max_candidates.to_string(),
            "ingestion.workers" => self.ingestion.workers.to_string(),
            "ingestion.max_attempts" => self.ingestion.max_attempts.to_string(),
            "ingestion.max_lock_wait_ms" => self.ingestion.max_lock_wait_ms.to_string(),
            "ingestion.job_timeout_secs" => self.ingestion.job_timeout_secs.to_string(),
            "query.learning_path_limit" => self.query.learning_path_limit.to_string(),
            "query.analytics_top_n" => self.query.analytics_top_n.to_string(),
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `prereq-graph config list` to see available keys.",
                    key
                ));
            }
        };
        Ok(value)
    }

    /// Set a configuration value by key
    ///
    /// The updated configuration is validated before being accepted.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut updated = self.clone();
        match key {
            "database.path" => updated.database.path = Some(PathBuf::from(value)),
            "database.max_connections" => {
                updated.database.max_connections = parse_value(key, value)?
            }
            "database.busy_timeout_ms" => {
                updated.database.busy_timeout_ms = parse_value(key, value)?
            }
            "strength.medium_threshold" => {
                updated.strength.medium_threshold = parse_value(key, value)?
            }
            "strength.strong_threshold" => {
                updated.strength.strong_threshold = parse_value(key, value)?
            }
            "classifier.min_label_len" => {
                updated.classifier.min_label_len = parse_value(key, value)?
            }
            "classifier.hint_mismatch_margin" => {
                updated.classifier.hint_mismatch_margin = parse_value(key, value)?
            }
            "merge.shared_concept_weight" => {
                updated.merge.shared_concept_weight = parse_value(key, value)?
            }
            "merge.shared_topic_weight" => {
                updated.merge.shared_topic_weight = parse_value(key, value)?
            }
            "merge.name_similarity_weight" => {
                updated.merge.name_similarity_weight = parse_value(key, value)?
            }
            "merge.name_similarity_threshold" => {
                updated.merge.name_similarity_threshold = parse_value(key, value)?
            }
            "merge.max_candidates" => updated.merge.max_candidates = parse_value(key, value)?,
            "ingestion.workers" => updated.ingestion.workers = parse_value(key, value)?,
            "ingestion.max_attempts" => updated.ingestion.max_attempts = parse_value(key, value)?,
            "ingestion.max_lock_wait_ms" => {
                updated.ingestion.max_lock_wait_ms = parse_value(key, value)?
            }
            "ingestion.job_timeout_secs" => {
                updated.ingestion.job_timeout_secs = parse_value(key, value)?
            }
            "query.learning_path_limit" => {
                updated.query.learning_path_limit = parse_value(key, value)?
            }
            "query.analytics_top_n" => updated.query.analytics_top_n = parse_value(key, value)?,
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `prereq-graph config list` to see available keys.",
                    key
                ));
            }
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
