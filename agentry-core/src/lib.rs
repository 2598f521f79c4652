#![allow(
    clippy::needless_borrows_for_generic_args,
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::len_without_is_empty
)]

pub mod agent;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod group;
pub mod handle;
pub mod logging;
pub mod message;
pub mod response;
pub mod runtime;

pub use agent::{
    builtin_kind, call_local, missing_member_operations, Agent, AgentContext, AgentKind,
    AgentParams, Args, ConversableAgent, ConversableKind, DEFAULT_SYSTEM_MESSAGE, GET_NAME,
    MEMBER_OPERATIONS,
};
pub use backend::{
    trim_at_markers, ChatConfig, EchoBackend, ModelBackend, NamedRetrieval, RetrievalBackend,
    RoleMapping, SharedModel, SharedRetrieval, END_MARKERS,
};
pub use config::{
    get_config_dir, AgentryConfig, GroupConfig, LoggingConfig, ModelConfig, RuntimeConfig,
};
pub use dispatch::Dispatcher;
pub use error::{
    retry_async, retry_async_with_config, AgentryError, AgentryResult, CliErrorDisplay,
    RetryConfig,
};
pub use factory::{AgentFactory, Placement};
pub use group::{
    FuncCallFilter, Group, GroupAssembler, GroupChat, GroupChatConstructor, GroupChatManager,
    GroupChatManagerKind, GroupConstructor, GroupOptions, POLICY_KEYS,
};
pub use handle::AgentHandle;
pub use logging::init_logging;
pub use message::{
    copy_message, modify_content, modify_metadata, replace_last, Conversation, Message, Metadata,
};
pub use response::{ChatResponse, GenerationStats, METADATA_KEY};
pub use runtime::{ActorInfo, ActorOptions, ActorRef, ActorRegistry, ActorRuntime};
