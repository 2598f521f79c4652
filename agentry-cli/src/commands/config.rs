use agentry_core::AgentryConfig;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{default_config_path, write_config, CliConfig};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    #[command(about = "Show the effective configuration")]
    Show {
        #[arg(short, long, default_value = "text", help = "Output format (text, json, toml)")]
        format: String,
    },

    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(help = "Target path (defaults to the user config directory)")]
        path: Option<PathBuf>,

        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Print the default configuration file path")]
    Path,
}

pub async fn handle_config_command(cmd: Option<ConfigCommand>, config: &CliConfig) -> anyhow::Result<()> {
    match cmd.unwrap_or(ConfigCommand::Show {
        format: "text".to_string(),
    }) {
        ConfigCommand::Show { format } => cmd_config_show(config, &format),
        ConfigCommand::Init { path, force } => cmd_config_init(path, force),
        ConfigCommand::Path => {
            println!("{}", default_config_path()?.display());
            Ok(())
        }
    }
}

fn cmd_config_show(config: &CliConfig, format: &str) -> anyhow::Result<()> {
    let core = &config.core;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(core)?),
        "toml" => print!("{}", toml::to_string_pretty(core)?),
        _ => {
            println!("{}", "Agentry Configuration".cyan().bold());
            println!("{}", "═".repeat(40).dimmed());
            let source = config
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults + user config + environment".to_string());
            println!("  {:<20} {}", "Source:".bold(), source);
            println!();

            println!("  {}", "Runtime".yellow().bold());
            println!("    {:<18} {}", "Max concurrency:", core.runtime.max_concurrency);
            println!("    {:<18} {}", "Mailbox capacity:", core.runtime.mailbox_capacity);
            println!(
                "    {:<18} {}",
                "Call timeout:",
                core.runtime
                    .call_timeout_secs
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(|| "none".to_string())
            );
            println!();

            println!("  {}", "Model".yellow().bold());
            println!("    {:<18} {}", "Max length:", core.model.max_length);
            println!("    {:<18} {}", "Top p:", core.model.top_p);
            println!("    {:<18} {}", "Temperature:", core.model.temperature);
            println!();

            println!("  {}", "Group".yellow().bold());
            println!("    {:<18} {}", "Max round:", core.group.max_round);
            println!("    {:<18} {}", "Admin name:", core.group.admin_name);
            println!();

            println!("  {}", "Logging".yellow().bold());
            println!("    {:<18} {}", "Level:", core.logging.level);
            println!("    {:<18} {}", "JSON format:", core.logging.json_format);
        }
    }
    Ok(())
}

fn cmd_config_init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    write_config(&AgentryConfig::default(), &path, force)?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green().bold(),
        path.display().to_string().cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        cmd_config_init(Some(path.clone()), false).unwrap();
        let loaded = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.core.runtime.max_concurrency, 10);

        assert!(cmd_config_init(Some(path), false).is_err());
    }
}
