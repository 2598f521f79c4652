use agentry_core::{init_logging, AgentryError, CliErrorDisplay};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use commands::{
    handle_chat_command, handle_config_command, handle_group_command, ChatArgs, ConfigCommand,
    GroupArgs,
};
use config::CliConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "agentry")]
#[command(version = VERSION)]
#[command(about = "Agentry - conversational agents, in-process or as actors")]
#[command(long_about = r#"
Agentry builds conversational agents either in the calling process or as
named actors, and assembles them into group chats run by a manager agent.

Use 'agentry chat' to talk to a single agent, 'agentry group' to assemble a
group and broadcast a message through its manager, and 'agentry config' to
inspect or write the configuration file.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, help = "Load configuration from this file only")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = 0, help = "Retries for transient dispatch failures")]
    retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Assemble a group chat and broadcast a message through its manager")]
    Group(GroupArgs),

    #[command(about = "Exchange messages with a single conversable agent")]
    Chat(ChatArgs),

    #[command(about = "Show or initialize configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommand>,
    },

    #[command(about = "Show version information")]
    Version {
        #[arg(short, long)]
        detailed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AgentryError>() {
                Some(err) => {
                    err.log();
                    eprintln!("{}", CliErrorDisplay::new(err));
                }
                None => eprintln!("{}: {:#}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    init_logging(&config.core.logging, cli.verbose)?;

    match cli.command {
        Commands::Group(args) => handle_group_command(args, &config, cli.retries).await,
        Commands::Chat(args) => handle_chat_command(args, &config, cli.retries).await,
        Commands::Config { action } => handle_config_command(action, &config).await,
        Commands::Version { detailed } => cmd_version(detailed),
    }
}

fn cmd_version(detailed: bool) -> anyhow::Result<()> {
    if detailed {
        println!("{}", "Agentry Version Information".cyan().bold());
        println!("{}", "═".repeat(40).dimmed());
        println!("  {:<15} {}", "Version:".bold(), VERSION);
        println!("  {:<15} {}", "Name:".bold(), NAME);
        println!("  {:<15} Apache-2.0", "License:".bold());
        println!();
        println!("  {}", "Agent Kinds:".bold());
        println!("    ◎ conversable");
        println!("    ◈ group_chat_manager");
        println!();
        println!("  {}", "Build Information:".bold());
        println!("    Rust Edition: 2021");
        #[cfg(debug_assertions)]
        println!("    Build:        Debug");
        #[cfg(not(debug_assertions))]
        println!("    Build:        Release");
    } else {
        println!("agentry {}", VERSION);
    }

    Ok(())
}
