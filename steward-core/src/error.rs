//! Error types for the Steward core.
//!
//! Uses `thiserror` for structured error variants covering the planner,
//! tool execution, permissions, engine, and configuration domains.

use std::time::Duration;

/// Top-level error type for the Steward core library.
#[derive(Debug, thiserror::Error)]
pub enum StewardError {
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from plan generation.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Planner request failed: {message}")]
    RequestFailed { message: String },

    #[error("Planner returned an unparseable plan: {message}")]
    InvalidPlan { message: String },

    #[error("Planner timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from tool registration, validation, and execution.
///
/// Retry eligibility is decided by variant, not by message sniffing:
/// `Timeout` and `ExecutionFailed` may be retried; `InvalidArguments`,
/// `PermissionDenied`, and `RateLimited` are deterministic and never are.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Tool '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Tool '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },

    #[error("Tool '{name}' is rate limited, retry after {retry_after:?}")]
    RateLimited {
        name: String,
        retry_after: Option<Duration>,
    },

    #[error("Permission denied for tool '{name}': {reason}")]
    PermissionDenied { name: String, reason: String },

    #[error("Tool '{name}' was cancelled")]
    Cancelled { name: String },
}

impl ToolError {
    /// Whether the orchestrator may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. }
        )
    }
}

/// Errors from the permission evaluator.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Command matches denied pattern: {pattern}")]
    CommandDenied { pattern: String },

    #[error("Path access denied: {path}")]
    PathDenied { path: String },

    #[error("Domain access denied: {domain}")]
    DomainDenied { domain: String },

    #[error("Session approval limit reached for tool '{tool}'")]
    SessionLimit { tool: String },

    #[error("No confirmation callback registered")]
    NoCallback,
}

/// Errors from the execution engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Task was cancelled")]
    Cancelled,

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("A run is already in progress")]
    AlreadyRunning,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `StewardError`.
pub type Result<T> = std::result::Result<T, StewardError>;
