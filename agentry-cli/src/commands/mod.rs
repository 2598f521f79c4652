pub mod actors;
pub mod chat;
pub mod config;
pub mod group;

pub use chat::{handle_chat_command, ChatArgs};
pub use config::{handle_config_command, ConfigCommand};
pub use group::{handle_group_command, GroupArgs};

use agentry_core::{retry_async_with_config, AgentHandle, Args, Dispatcher, RetryConfig};
use anyhow::{anyhow, Result};
use serde_json::Value;

/// Operations that only read agent state. Only these are retried: a timed-out
/// `receive` or `generate_reply` may already have changed the agent.
const RETRYABLE_OPERATIONS: &[&str] = &[
    "get_name",
    "describe",
    "agent_names",
    "messages",
    "last_message",
    "system_message",
    "check_function_call",
];

/// Options shared by every command that dispatches operations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub format: String,
    pub retry: RetryConfig,
}

impl RunOptions {
    pub fn new(format: &str, retries: u32) -> Self {
        Self {
            format: format.to_string(),
            retry: RetryConfig {
                max_attempts: retries.saturating_add(1),
                ..RetryConfig::for_remote_call()
            },
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    /// Retry policy for `operation`; a single attempt unless it is read-only.
    pub fn retry_for(&self, operation: &str) -> RetryConfig {
        if RETRYABLE_OPERATIONS.contains(&operation) {
            self.retry.clone()
        } else {
            RetryConfig {
                max_attempts: 1,
                ..self.retry.clone()
            }
        }
    }
}

/// Invokes `operation`, retrying transient failures of read-only operations
/// the way `--retries` asks.
pub async fn invoke(
    dispatcher: &Dispatcher,
    handle: &AgentHandle,
    operation: &str,
    args: Args,
    options: &RunOptions,
) -> Result<Value> {
    let value = retry_async_with_config(
        move || dispatcher.invoke(handle, operation, args.clone()),
        options.retry_for(operation),
    )
    .await?;
    Ok(value)
}

/// Parses `key=value` pairs. Values are read as JSON when they parse,
/// otherwise kept as plain strings.
pub fn parse_key_values(pairs: &[String]) -> Result<Args> {
    let mut args = Args::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected key=value, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Empty key in '{}'", pair));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        args.insert(key.to_string(), value);
    }
    Ok(args)
}

pub fn message_args(sender: &str, content: &str) -> Args {
    let mut args = Args::new();
    args.insert("sender".to_string(), Value::String(sender.to_string()));
    args.insert(
        "message".to_string(),
        agentry_core::Message::user(content).to_value(),
    );
    args
}
