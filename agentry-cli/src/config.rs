use agentry_core::{get_config_dir, AgentryConfig};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub core: AgentryConfig,
    pub source: Option<PathBuf>,
}

impl CliConfig {
    /// Loads the layered configuration, or only `path` plus the environment
    /// when a file is given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv_files();

        let core = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!("Config file {:?} does not exist", path));
                }
                AgentryConfig::load_from_paths(vec![path.to_path_buf()])
                    .with_context(|| format!("Failed to load config from {:?}", path))?
            }
            None => AgentryConfig::load().context("Failed to load configuration")?,
        };

        Ok(Self {
            core,
            source: path.map(Path::to_path_buf),
        })
    }
}

fn load_dotenv_files() {
    let env_paths = [
        dirs::home_dir().map(|d| d.join(".agentry").join(".env")),
        dirs::config_dir().map(|d| d.join("agentry").join(".env")),
    ];

    for path in env_paths.iter().flatten() {
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    get_config_dir()
        .map(|d| d.join(CONFIG_FILE_NAME))
        .ok_or_else(|| anyhow!("Could not determine config directory"))
}

/// Writes `config` as TOML to `path`, refusing to overwrite unless `force`.
pub fn write_config(config: &AgentryConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{:?} already exists, pass --force to overwrite it",
            path
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, contents).with_context(|| format!("Failed to write config to {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with("agentry/config.toml"));
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agentry.toml");

        let mut config = AgentryConfig::default();
        config.group.admin_name = "chair".to_string();
        write_config(&config, &path, false).unwrap();

        let loaded = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.core.group.admin_name, "chair");
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));

        assert!(write_config(&config, &path, false).is_err());
        assert!(write_config(&config, &path, true).is_ok());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
