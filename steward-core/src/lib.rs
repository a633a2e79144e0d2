//! # Steward Core
//!
//! Core library for the Steward agent. Provides the intent router, the
//! risk & permission evaluator, the plan model, planner collaborators, the
//! execution engine, configuration, and fundamental types.

pub mod config;
pub mod engine;
pub mod error;
pub mod permission;
pub mod plan;
pub mod planner;
pub mod router;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{load_config, EngineConfig, OrchestratorConfig, PermissionConfig, StewardConfig};
pub use engine::{
    EngineEvent, EnginePhase, ExecutionEngine, ExecutionResult, Formatter, StepExecutor,
};
pub use error::{Result, StewardError, ToolError};
pub use permission::{AutoConfirm, ConfirmCallback, PermissionEvaluator};
pub use plan::{ExecutionPlan, PlanStatus, PlanStep, StepResult};
pub use planner::{LlmPlanner, MockPlanner, Planner};
pub use router::{IntentKind, IntentResult, IntentRouter, QueryCache, QueryType, ToolMatcher};
pub use types::{
    ActionKind, PermissionRequest, PermissionResult, RiskLevel, ToolDefinition, ToolOutput,
};
