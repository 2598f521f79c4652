//! Error types for the Agentry core library.
//!
//! Every failure the dispatch core can surface is a variant of [`AgentryError`].
//! Nothing in this crate downgrades an error to a log line or retries it;
//! retry is a caller policy, available through [`retry_async`].
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Envelope | Message and conversation mutation errors |
//! | E2001-E2099 | Dispatch | Name resolution and operation dispatch errors |
//! | E3001-E3099 | Registry | Actor spawn, naming and runtime errors |
//! | E4001-E4099 | Group | Group assembly and policy option errors |
//! | E5001-E5099 | Model | Model backend errors |
//! | E6001-E6099 | Config | Configuration loading and validation errors |
//! | E9001-E9099 | General | Internal, IO and serialization errors |

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Configuration for caller-side retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Retry profile for calls that go through an actor mailbox.
    pub fn for_remote_call() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Build a profile with a fixed attempt count and the default delays.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            capped_delay * (1.0 + rand_jitter() * 0.25)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Cheap jitter source in `[0.0, 1.0)` derived from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// The main error type for the Agentry core library.
#[derive(Debug, Error)]
pub enum AgentryError {
    // ========================================================================
    // Envelope Errors (E1001-E1099)
    // ========================================================================
    /// Attempted to replace the last message of an empty conversation
    #[error("[E1001] Cannot replace the last message of an empty conversation")]
    EmptyConversation,

    /// A value could not be read as a message
    #[error("[E1002] Invalid message: {0}")]
    InvalidMessage(String),

    // ========================================================================
    // Dispatch Errors (E2001-E2099)
    // ========================================================================
    /// Remote transport failure or timeout
    #[error("[E2001] Agent '{agent}' is unreachable: {message}")]
    AgentUnreachable { agent: String, message: String },

    /// Target agent does not expose the requested operation
    #[error("[E2002] Agent '{agent}' has no operation '{operation}'")]
    UnknownOperation { agent: String, operation: String },

    /// No actor registered under the given name
    #[error("[E2003] No agent registered under name '{0}'")]
    AgentNotFound(String),

    /// Operation arguments did not match what the operation expects
    #[error("[E2004] Invalid arguments for '{operation}': {message}")]
    InvalidArguments { operation: String, message: String },

    /// The operation ran and reported a failure of its own
    #[error("[E2005] Operation '{operation}' failed on agent '{agent}': {message}")]
    OperationFailed {
        agent: String,
        operation: String,
        message: String,
    },

    // ========================================================================
    // Registry Errors (E3001-E3099)
    // ========================================================================
    /// Registry name already taken
    #[error("[E3001] An agent named '{0}' is already registered")]
    NameCollision(String),

    /// The agent kind refused to build an instance
    #[error("[E3002] Failed to construct agent '{name}' of kind '{kind}': {message}")]
    AgentConstructionFailed {
        name: String,
        kind: String,
        message: String,
    },

    /// The actor runtime has been shut down
    #[error("[E3003] Actor runtime is shut down")]
    RuntimeShutdown,

    // ========================================================================
    // Group Errors (E4001-E4099)
    // ========================================================================
    /// Local group given members that do not satisfy the agent capability set
    #[error("[E4001] Invalid group members: {}", .0.join(", "))]
    InvalidAgentType(Vec<String>),

    /// A recognized group policy option had an unusable value
    #[error("[E4002] Invalid group option '{key}': {message}")]
    InvalidGroupOption { key: String, message: String },

    // ========================================================================
    // Model Errors (E5001-E5099)
    // ========================================================================
    /// Model backend returned no responses
    #[error("[E5001] Model backend '{0}' returned no responses")]
    EmptyModelResponse(String),

    /// Model backend call failed
    #[error("[E5002] Model backend '{backend}' failed: {message}")]
    ModelBackendFailed { backend: String, message: String },

    // ========================================================================
    // Configuration Errors (E6001-E6099)
    // ========================================================================
    /// Configuration file or environment could not be parsed
    #[error("[E6001] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Invalid configuration value
    #[error("[E6002] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    /// Internal error (catch-all for unexpected conditions)
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("[E9002] Serialization error: {0}")]
    SerializationError(String),

    /// IO error
    #[error("[E9003] IO error: {0}")]
    IoError(String),
}

/// Result type alias for Agentry operations.
pub type AgentryResult<T> = Result<T, AgentryError>;

// ============================================================================
// Constructors
// ============================================================================

impl AgentryError {
    pub fn unreachable(agent: impl Into<String>, message: impl Into<String>) -> Self {
        AgentryError::AgentUnreachable {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn unknown_operation(agent: impl Into<String>, operation: impl Into<String>) -> Self {
        AgentryError::UnknownOperation {
            agent: agent.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_arguments(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AgentryError::InvalidArguments {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_group_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        AgentryError::InvalidGroupOption {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From trait implementations for seamless error propagation
// ============================================================================

impl From<serde_json::Error> for AgentryError {
    fn from(err: serde_json::Error) -> Self {
        AgentryError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for AgentryError {
    fn from(err: std::io::Error) -> Self {
        AgentryError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for AgentryError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => AgentryError::InvalidConfigValue {
                key,
                message: "Key not found".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => AgentryError::ConfigParseError(
                format!("Failed to parse {}: {}", uri.unwrap_or_default(), cause),
            ),
            config::ConfigError::Type {
                origin,
                unexpected,
                expected,
                key,
            } => AgentryError::InvalidConfigValue {
                key: key.unwrap_or_else(|| origin.map(|o| o.to_string()).unwrap_or_default()),
                message: format!("Expected {}, got {}", expected, unexpected),
            },
            _ => AgentryError::ConfigParseError(err.to_string()),
        }
    }
}

// ============================================================================
// Error categorization helpers
// ============================================================================

impl AgentryError {
    /// Returns true if this error came out of name resolution or dispatch.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            AgentryError::AgentUnreachable { .. }
                | AgentryError::UnknownOperation { .. }
                | AgentryError::AgentNotFound(_)
                | AgentryError::InvalidArguments { .. }
                | AgentryError::OperationFailed { .. }
        )
    }

    /// Returns true if this error came out of actor spawning or naming.
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            AgentryError::NameCollision(_)
                | AgentryError::AgentConstructionFailed { .. }
                | AgentryError::RuntimeShutdown
        )
    }

    /// Returns true if this error came out of group assembly.
    pub fn is_group_error(&self) -> bool {
        matches!(
            self,
            AgentryError::InvalidAgentType(_) | AgentryError::InvalidGroupOption { .. }
        )
    }

    /// Returns true if this error is transient and a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentryError::AgentUnreachable { .. } | AgentryError::ModelBackendFailed { .. }
        )
    }

    /// Returns an error code suitable for logging or external reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentryError::EmptyConversation => "E1001",
            AgentryError::InvalidMessage(_) => "E1002",
            AgentryError::AgentUnreachable { .. } => "E2001",
            AgentryError::UnknownOperation { .. } => "E2002",
            AgentryError::AgentNotFound(_) => "E2003",
            AgentryError::InvalidArguments { .. } => "E2004",
            AgentryError::OperationFailed { .. } => "E2005",
            AgentryError::NameCollision(_) => "E3001",
            AgentryError::AgentConstructionFailed { .. } => "E3002",
            AgentryError::RuntimeShutdown => "E3003",
            AgentryError::InvalidAgentType(_) => "E4001",
            AgentryError::InvalidGroupOption { .. } => "E4002",
            AgentryError::EmptyModelResponse(_) => "E5001",
            AgentryError::ModelBackendFailed { .. } => "E5002",
            AgentryError::ConfigParseError(_) => "E6001",
            AgentryError::InvalidConfigValue { .. } => "E6002",
            AgentryError::Internal(_) => "E9001",
            AgentryError::SerializationError(_) => "E9002",
            AgentryError::IoError(_) => "E9003",
        }
    }

    /// Returns a user-friendly suggestion for how to resolve this error.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            AgentryError::AgentUnreachable { .. } => {
                Some("Check that the actor is still running or raise runtime.call_timeout_secs")
            }
            AgentryError::AgentNotFound(_) => {
                Some("Spawn the agent first; name lookups do not wait for registration")
            }
            AgentryError::NameCollision(_) => {
                Some("Pick a different name or kill the existing actor first")
            }
            AgentryError::InvalidAgentType(_) => {
                Some("Local groups accept only in-process agents exposing receive/generate_reply/reset")
            }
            AgentryError::ConfigParseError(_) => Some("Check agentry.toml and AGENTRY_* variables"),
            _ => None,
        }
    }

    /// Log this error with appropriate severity level.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_transient() {
            warn!(
                error_code = %code,
                suggestion = suggestion,
                "Transient error occurred: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }
}

// ============================================================================
// Retry utilities
// ============================================================================

/// Execute an async operation, retrying transient failures with the default profile.
///
/// # Example
/// ```ignore
/// use agentry_core::error::retry_async;
///
/// let name = retry_async(|| async { dispatcher.resolve_name(&handle).await }).await?;
/// ```
pub async fn retry_async<F, Fut, T>(operation: F) -> AgentryResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = AgentryResult<T>>,
{
    retry_async_with_config(operation, RetryConfig::default()).await
}

/// Execute an async operation with a custom retry configuration.
pub async fn retry_async_with_config<F, Fut, T>(
    operation: F,
    config: RetryConfig,
) -> AgentryResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = AgentryResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!("Operation succeeded on attempt {}", attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_transient() || attempt + 1 >= config.max_attempts {
                    e.log();
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| AgentryError::Internal("Retry loop exhausted without error".to_string())))
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with its suggestion.
pub struct CliErrorDisplay<'a> {
    error: &'a AgentryError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a AgentryError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        if self.error.is_transient() {
            writeln!(f)?;
            writeln!(f, "  This error may be temporary. Retrying may help.")?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_error_display() {
        let err = AgentryError::AgentNotFound("planner".to_string());
        assert!(err.to_string().contains("E2003"));
        assert!(err.to_string().contains("planner"));

        let err = AgentryError::InvalidAgentType(vec![
            "[0] remote actor".to_string(),
            "[2] name 'bob'".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "[E4001] Invalid group members: [0] remote actor, [2] name 'bob'"
        );
    }

    #[test]
    fn test_error_categorization() {
        let err = AgentryError::unknown_operation("a", "fly");
        assert!(err.is_dispatch_error());
        assert!(!err.is_registry_error());
        assert!(!err.is_group_error());

        assert!(AgentryError::NameCollision("a".to_string()).is_registry_error());
        assert!(AgentryError::invalid_group_option("max_round", "zero").is_group_error());
    }

    #[test]
    fn test_is_transient() {
        assert!(AgentryError::unreachable("a", "timed out").is_transient());
        assert!(AgentryError::ModelBackendFailed {
            backend: "echo".to_string(),
            message: "503".to_string(),
        }
        .is_transient());

        assert!(!AgentryError::EmptyConversation.is_transient());
        assert!(!AgentryError::AgentNotFound("a".to_string()).is_transient());
        assert!(!AgentryError::unknown_operation("a", "b").is_transient());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AgentryError::EmptyConversation.error_code(), "E1001");
        assert_eq!(AgentryError::unreachable("a", "b").error_code(), "E2001");
        assert_eq!(AgentryError::NameCollision("a".into()).error_code(), "E3001");
        assert_eq!(AgentryError::InvalidAgentType(vec![]).error_code(), "E4001");
        assert_eq!(
            AgentryError::EmptyModelResponse("m".into()).error_code(),
            "E5001"
        );
        assert_eq!(AgentryError::Internal("x".into()).error_code(), "E9001");
    }

    #[test]
    fn test_retry_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
    }

    #[test]
    fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: AgentryResult<()> = tokio_test::block_on(retry_async(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AgentryError::AgentNotFound("ghost".to_string())) }
        }));

        assert!(matches!(result, Err(AgentryError::AgentNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicU32::new(0);
        let result = retry_async_with_config(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(AgentryError::unreachable("worker", "mailbox closed"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            RetryConfig::with_attempts(3),
        )
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AgentryError = json_err.into();
        assert!(matches!(err, AgentryError::SerializationError(_)));
    }

    #[test]
    fn test_cli_error_display() {
        let err = AgentryError::NameCollision("team1".to_string());
        let output = CliErrorDisplay::new(&err).to_string();
        assert!(output.contains("team1"));
        assert!(output.contains("Suggestion"));

        let output = CliErrorDisplay::new(&err).without_suggestion().to_string();
        assert!(!output.contains("Suggestion"));
    }
}
