use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AgentryError, AgentryResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentryConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Simultaneous in-flight operations per actor; further calls queue.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// When set, remote calls that take longer fail as unreachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_max_length")]
    pub max_length: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_max_round")]
    pub max_round: u32,

    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

fn default_max_concurrency() -> usize {
    10
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_max_length() -> u32 {
    4096
}

fn default_top_p() -> f64 {
    0.95
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_round() -> u32 {
    10
}

fn default_admin_name() -> String {
    "Admin".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            mailbox_capacity: default_mailbox_capacity(),
            call_timeout_secs: None,
        }
    }
}

impl RuntimeConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            top_p: default_top_p(),
            temperature: default_temperature(),
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            max_round: default_max_round(),
            admin_name: default_admin_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AgentryConfig {
    pub fn load() -> AgentryResult<Self> {
        Self::load_from_paths(get_config_paths())
    }

    pub fn load_from_paths(paths: Vec<PathBuf>) -> AgentryResult<Self> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("AGENTRY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut agentry_config: AgentryConfig = config.try_deserialize()?;

        if let Ok(level) = std::env::var("AGENTRY_LOG_LEVEL") {
            agentry_config.logging.level = level;
        }

        agentry_config.validate()?;

        Ok(agentry_config)
    }

    pub fn validate(&self) -> AgentryResult<()> {
        if self.runtime.max_concurrency == 0 {
            return Err(invalid("runtime.max_concurrency", "Must be greater than 0"));
        }

        if self.runtime.mailbox_capacity == 0 {
            return Err(invalid("runtime.mailbox_capacity", "Must be greater than 0"));
        }

        if self.runtime.call_timeout_secs == Some(0) {
            return Err(invalid("runtime.call_timeout_secs", "Must be greater than 0"));
        }

        if self.group.max_round == 0 {
            return Err(invalid("group.max_round", "Must be greater than 0"));
        }

        if !(self.model.top_p > 0.0 && self.model.top_p <= 1.0) {
            return Err(invalid("model.top_p", "Must be in (0, 1]"));
        }

        if self.model.temperature < 0.0 {
            return Err(invalid("model.temperature", "Must not be negative"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(AgentryError::InvalidConfigValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }
}

fn invalid(key: &str, message: &str) -> AgentryError {
    AgentryError::InvalidConfigValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("agentry.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join(".env"));
    }

    for path in paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agentry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AgentryConfig::default();

        assert_eq!(config.runtime.max_concurrency, 10);
        assert_eq!(config.runtime.mailbox_capacity, 256);
        assert!(config.runtime.call_timeout().is_none());
        assert_eq!(config.model.max_length, 4096);
        assert_eq!(config.group.max_round, 10);
        assert_eq!(config.group.admin_name, "Admin");
        assert_eq!(config.log_level(), "info");
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(AgentryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut config = AgentryConfig::default();
        config.runtime.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_max_round() {
        let mut config = AgentryConfig::default();
        config.group.max_round = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_top_p_range() {
        let mut config = AgentryConfig::default();
        config.model.top_p = 1.5;
        assert!(config.validate().is_err());
        config.model.top_p = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AgentryConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_complex_log_level() {
        let mut config = AgentryConfig::default();
        config.logging.level = "agentry_core=debug,warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agentry.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[runtime]\nmax_concurrency = 4\ncall_timeout_secs = 3\n\n[group]\nadmin_name = \"boss\""
        )
        .unwrap();

        let config = AgentryConfig::load_from_paths(vec![path]).unwrap();
        assert_eq!(config.runtime.max_concurrency, 4);
        assert_eq!(config.runtime.call_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.group.admin_name, "boss");
        assert_eq!(config.group.max_round, 10);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agentry.toml");
        std::fs::write(&path, "[runtime]\nmailbox_capacity = 0\n").unwrap();

        let result = AgentryConfig::load_from_paths(vec![path]);
        assert!(matches!(
            result,
            Err(AgentryError::InvalidConfigValue { ref key, .. }) if key == "runtime.mailbox_capacity"
        ));
    }
}
