//! Core type definitions for the Steward agent.
//!
//! Defines the fundamental data structures shared across the system:
//! risk tiers, tool definitions, tool output, and permission value objects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The risk tier of an operation, ordered from least to most dangerous.
///
/// The tier alone determines whether the execution engine must request
/// user confirmation before running a step: `Delete` and `System` always
/// prompt in the default configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Read-only operations (level 0).
    Read = 0,
    /// Reversible modifications (level 1).
    Modify = 1,
    /// Irreversible deletions (level 2).
    Delete = 2,
    /// System-level operations such as shell execution (level 3).
    System = 3,
}

impl RiskLevel {
    /// Whether this tier always requires interactive confirmation.
    pub fn is_dangerous(&self) -> bool {
        matches!(self, RiskLevel::Delete | RiskLevel::System)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Read => write!(f, "read"),
            RiskLevel::Modify => write!(f, "modify"),
            RiskLevel::Delete => write!(f, "delete"),
            RiskLevel::System => write!(f, "system"),
        }
    }
}

/// A definition describing a tool to the planner and the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Output produced by a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ToolOutput {
    /// Create a simple text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Create an error output.
    pub fn error(message: impl Into<String>) -> Self {
        let mut output = Self::text(message);
        output
            .metadata
            .insert("is_error".into(), serde_json::Value::Bool(true));
        output
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The kind of action a permission request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A shell command.
    Shell,
    /// A filesystem path access.
    FileSystem,
    /// A network request against a URL.
    Network,
    /// Anything else.
    Other,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Shell => write!(f, "shell"),
            ActionKind::FileSystem => write!(f, "filesystem"),
            ActionKind::Network => write!(f, "network"),
            ActionKind::Other => write!(f, "other"),
        }
    }
}

/// A request to perform a gated action.
///
/// Stateless value object; the evaluator owns no reference to it after
/// `evaluate` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub tool_name: String,
    pub action: ActionKind,
    /// Path, command line, or URL the action operates on.
    pub target: Option<String>,
    pub risk_level: RiskLevel,
    pub description: String,
}

impl PermissionRequest {
    pub fn new(
        tool_name: impl Into<String>,
        action: ActionKind,
        risk_level: RiskLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            action,
            target: None,
            risk_level,
            description: description.into(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// The outcome of a permission evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResult {
    pub granted: bool,
    pub reason: Option<String>,
    /// Set when a granted modification should be preceded by a backup.
    pub requires_backup: bool,
}

impl PermissionResult {
    pub fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
            requires_backup: false,
        }
    }

    pub fn granted_with_backup() -> Self {
        Self {
            granted: true,
            reason: None,
            requires_backup: true,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: Some(reason.into()),
            requires_backup: false,
        }
    }
}
