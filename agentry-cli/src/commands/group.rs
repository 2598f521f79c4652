use agentry_core::{
    AgentFactory, AgentHandle, AgentParams, Args, ConversableKind, EchoBackend, GroupAssembler,
    Placement, SharedModel,
};
use clap::Args as ClapArgs;
use colored::Colorize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::actors::print_actor_table;
use super::{invoke, message_args, parse_key_values, RunOptions};
use crate::config::CliConfig;

#[derive(ClapArgs, Debug)]
pub struct GroupArgs {
    #[arg(short, long, default_value = "team1", help = "Name of the group manager")]
    pub name: String,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "alice,bob,carol",
        help = "Comma-separated member names"
    )]
    pub members: Vec<String>,

    #[arg(short, long, default_value = "local", help = "Placement (local, remote)")]
    pub placement: String,

    #[arg(long, default_value = "Hello team, what is the plan?", help = "Message the first member broadcasts")]
    pub message: String,

    #[arg(long, help = "Upper bound on scheduling rounds")]
    pub max_round: Option<u32>,

    #[arg(long, help = "Name of the administering agent")]
    pub admin: Option<String>,

    #[arg(long = "arg", help = "Extra key=value option, repeatable")]
    pub extra: Vec<String>,

    #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
    pub format: String,
}

pub async fn handle_group_command(args: GroupArgs, config: &CliConfig, retries: u32) -> anyhow::Result<()> {
    let options = RunOptions::new(&args.format, retries);
    let placement: Placement = args.placement.parse()?;
    let members = args
        .members
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>();
    if members.is_empty() {
        anyhow::bail!("A group needs at least one member");
    }

    let factory = AgentFactory::from_config(&config.core);
    let model: SharedModel = Arc::new(EchoBackend::new("echo").with_prefix("ack: "));

    let mut extra = parse_key_values(&args.extra)?;
    if let Some(max_round) = args.max_round {
        extra.insert("max_round".to_string(), json!(max_round));
    }
    if let Some(admin) = &args.admin {
        extra.insert("admin_name".to_string(), json!(admin));
    }

    let kind = Arc::new(ConversableKind);
    let mut handles = Vec::with_capacity(members.len());
    for member in &members {
        let params = AgentParams::new(member.as_str(), model.clone());
        handles.push(factory.create(placement, kind.clone(), params).await?);
    }

    let assembler = GroupAssembler::with_defaults(factory.clone(), config.core.group.clone());
    let manager = assembler
        .assemble(placement, &args.name, handles.clone(), model.clone(), None, extra)
        .await?;

    let result = run_group(&factory, &manager, &handles, &members, &args.message, &options).await;

    if placement == Placement::Remote && !options.is_json() && result.is_ok() {
        println!();
        print_actor_table(&factory.runtime().list_actors().await);
    }
    factory.runtime().shutdown().await;

    let report = result?;
    if options.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn run_group(
    factory: &AgentFactory,
    manager: &AgentHandle,
    handles: &[AgentHandle],
    members: &[String],
    message: &str,
    options: &RunOptions,
) -> anyhow::Result<Value> {
    let dispatcher = factory.dispatcher();
    let sender = &members[0];

    let manager_name = dispatcher.resolve_name(manager).await?;
    let description = invoke(dispatcher, manager, "describe", Args::new(), options).await?;
    let names = invoke(dispatcher, manager, "agent_names", Args::new(), options).await?;

    if !options.is_json() {
        println!(
            "{} {} ({})",
            "Group".cyan().bold(),
            manager_name.bold(),
            manager.variant()
        );
        println!("{}", "═".repeat(40).dimmed());
        println!("  {:<12} {}", "Members:".bold(), join_names(&names));
        println!("  {:<12} {}", "Admin:".bold(), description["admin_name"].as_str().unwrap_or("-"));
        println!("  {:<12} {}", "Max rounds:".bold(), description["max_round"]);
        println!();
        println!("  {} {}: {}", "→".blue(), sender.bold(), message);
    }

    let recipients = invoke(
        dispatcher,
        manager,
        "broadcast",
        message_args(sender, message),
        options,
    )
    .await?;

    let mut replies = Vec::new();
    for (handle, name) in handles.iter().zip(members) {
        if name == sender {
            continue;
        }
        let mut reply_args = Args::new();
        reply_args.insert("sender".to_string(), json!(sender));
        let reply = invoke(dispatcher, handle, "generate_reply", reply_args, options).await?;
        if !options.is_json() {
            println!(
                "  {} {}: {}",
                "←".green(),
                name.bold(),
                reply["content"].as_str().unwrap_or_default()
            );
        }
        replies.push(json!({ "agent": name, "reply": reply }));
    }

    let transcript = invoke(dispatcher, manager, "messages", Args::new(), options).await?;

    if !options.is_json() {
        println!();
        println!(
            "{} {} recipients, {} transcript entries",
            "✓".green().bold(),
            recipients.as_array().map(Vec::len).unwrap_or(0),
            transcript.as_array().map(Vec::len).unwrap_or(0)
        );
    }

    Ok(json!({
        "group": manager_name,
        "placement": manager.variant(),
        "description": description,
        "members": names,
        "recipients": recipients,
        "replies": replies,
        "transcript": transcript,
    }))
}

fn join_names(names: &Value) -> String {
    names
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_names() {
        assert_eq!(join_names(&json!(["a", "b"])), "a, b");
        assert_eq!(join_names(&json!(null)), "");
    }

    #[tokio::test]
    async fn test_run_group_reports_replies() {
        let factory = AgentFactory::new(agentry_core::ActorRuntime::default());
        let model: SharedModel = Arc::new(EchoBackend::new("echo"));
        let members = vec!["alice".to_string(), "bob".to_string()];
        let mut handles = Vec::new();
        for member in &members {
            handles.push(
                factory
                    .create(
                        Placement::Remote,
                        Arc::new(ConversableKind),
                        AgentParams::new(member.as_str(), model.clone()),
                    )
                    .await
                    .unwrap(),
            );
        }
        let manager = GroupAssembler::new(factory.clone())
            .assemble(Placement::Remote, "crew", handles.clone(), model, None, Args::new())
            .await
            .unwrap();

        let options = RunOptions::new("json", 0);
        let report = run_group(&factory, &manager, &handles, &members, "hi", &options)
            .await
            .unwrap();

        assert_eq!(report["group"], json!("crew"));
        assert_eq!(report["recipients"], json!(["bob"]));
        assert_eq!(report["replies"][0]["reply"]["content"], json!("hi"));
    }
}
