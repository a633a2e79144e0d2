//! # Steward Tools
//!
//! Tool implementations and orchestration for the Steward agent.
//! Provides the tool registry, parameter validation, the per-tool rate
//! limiter, the orchestration pipeline, and the built-in tools.

#[macro_use]
pub mod macros;

pub mod file;
pub mod orchestrator;
pub mod ratelimit;
pub mod registry;
pub mod shell;
pub mod system;
pub mod utils;
pub mod validate;
pub mod web;

use registry::{Tool, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;

pub use orchestrator::{ExecutionOutcome, OrchestratorHooks, ToolOrchestrator, ToolRequest};
pub use ratelimit::{RateDecision, RateLimiter};
pub use validate::{validate, Validation};

/// Register all built-in tools with the given workspace path.
pub fn register_builtin_tools(registry: &mut ToolRegistry, workspace: PathBuf) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(file::FileReadTool::new(workspace.clone())),
        Arc::new(file::FileWriteTool::new(workspace.clone())),
        Arc::new(file::FileDeleteTool::new(workspace.clone())),
        Arc::new(file::FileMoveTool::new(workspace.clone())),
        Arc::new(file::FileListTool::new(workspace.clone())),
        Arc::new(shell::ShellExecuteTool::new(workspace.clone())),
        Arc::new(system::SystemQueryTool::new(workspace)),
        Arc::new(web::UrlOpenTool),
        Arc::new(utils::EchoTool),
        Arc::new(utils::DateTimeTool),
    ];

    for tool in tools {
        if let Err(e) = registry.register(tool) {
            tracing::warn!("Failed to register tool: {}", e);
        }
    }
}
