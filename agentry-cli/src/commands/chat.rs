use agentry_core::{AgentFactory, AgentParams, Args, ConversableKind, EchoBackend, Placement};
use clap::Args as ClapArgs;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::{invoke, message_args, RunOptions};
use crate::config::CliConfig;

const USER: &str = "user";

#[derive(ClapArgs, Debug)]
pub struct ChatArgs {
    #[arg(help = "Messages to send, one turn each")]
    pub messages: Vec<String>,

    #[arg(short, long, default_value = "assistant", help = "Name of the agent")]
    pub name: String,

    #[arg(short, long, default_value = "local", help = "Placement (local, remote)")]
    pub placement: String,

    #[arg(short, long, help = "System message for the agent")]
    pub system: Option<String>,

    #[arg(long, help = "Maximum reply length in characters")]
    pub max_length: Option<u32>,

    #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct ChatTurn {
    input: String,
    reply: String,
}

pub async fn handle_chat_command(args: ChatArgs, config: &CliConfig, retries: u32) -> anyhow::Result<()> {
    let options = RunOptions::new(&args.format, retries);
    let placement: Placement = args.placement.parse()?;
    let factory = AgentFactory::from_config(&config.core);

    let mut params = AgentParams::new(args.name.as_str(), Arc::new(EchoBackend::new("echo")));
    if let Some(system) = &args.system {
        params = params.with_arg("system_message", json!(system));
    }
    if let Some(max_length) = args.max_length {
        params = params.with_arg("llm_config", json!({ "max_length": max_length }));
    }

    let handle = factory
        .create(placement, Arc::new(ConversableKind), params)
        .await?;
    let dispatcher = factory.dispatcher();
    let name = dispatcher.resolve_name(&handle).await?;

    if !options.is_json() {
        println!("{} {} ({})", "Chat with".cyan().bold(), name.bold(), handle.variant());
        println!("{}", "═".repeat(40).dimmed());
    }

    let mut turns = Vec::with_capacity(args.messages.len());
    let mut failure = None;
    for input in &args.messages {
        match chat_turn(&factory, &handle, input, &options).await {
            Ok(reply) => {
                if !options.is_json() {
                    println!("  {} {}: {}", "→".blue(), USER.bold(), input);
                    println!("  {} {}: {}", "←".green(), name.bold(), reply);
                }
                turns.push(ChatTurn {
                    input: input.clone(),
                    reply,
                });
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    factory.runtime().shutdown().await;
    if let Some(e) = failure {
        return Err(e);
    }

    if options.is_json() {
        let output = json!({
            "agent": name,
            "placement": handle.variant(),
            "turns": turns,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if turns.is_empty() {
        println!("  {}", "No messages given.".dimmed());
    }

    Ok(())
}

async fn chat_turn(
    factory: &AgentFactory,
    handle: &agentry_core::AgentHandle,
    input: &str,
    options: &RunOptions,
) -> anyhow::Result<String> {
    let dispatcher = factory.dispatcher();
    let count = invoke(dispatcher, handle, "receive", message_args(USER, input), options).await?;
    debug!(history = %count, "Message received");

    let mut reply_args = Args::new();
    reply_args.insert("sender".to_string(), json!(USER));
    let reply = invoke(dispatcher, handle, "generate_reply", reply_args, options).await?;

    Ok(reply["content"].as_str().unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_turn_echoes_through_an_actor() {
        let factory = AgentFactory::new(agentry_core::ActorRuntime::default());
        let handle = factory
            .create(
                Placement::Remote,
                Arc::new(ConversableKind),
                AgentParams::new("helper", Arc::new(EchoBackend::new("echo")))
                    .with_arg("llm_config", json!({ "max_length": 4 })),
            )
            .await
            .unwrap();

        let options = RunOptions::new("text", 0);
        let reply = chat_turn(&factory, &handle, "hello there", &options)
            .await
            .unwrap();
        assert_eq!(reply, "hell");

        factory.runtime().shutdown().await;
    }
}
