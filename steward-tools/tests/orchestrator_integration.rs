//! End-to-end: the engine driving real tools through the orchestrator.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use steward_core::config::{
    EngineConfig, OrchestratorConfig, PermissionConfig, RateLimitConfig, ToolRateLimit,
};
use steward_core::engine::{EngineEvent, ExecutionEngine, ExecutionResult};
use steward_core::permission::{AutoConfirm, PermissionEvaluator};
use steward_core::plan::PlanStep;
use steward_core::planner::MockPlanner;
use steward_core::types::RiskLevel;
use steward_tools::registry::ToolRegistry;
use steward_tools::{register_builtin_tools, ToolOrchestrator, ToolRequest};
use tempfile::TempDir;

fn orchestrator_for(workspace: &TempDir) -> ToolOrchestrator {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, workspace.path().to_path_buf());
    let mut orchestrator = ToolOrchestrator::new(
        registry,
        RateLimitConfig::default(),
        OrchestratorConfig {
            retry_delay_ms: 10,
            ..OrchestratorConfig::default()
        },
    );
    let mut evaluator = PermissionEvaluator::new(PermissionConfig::default());
    evaluator.set_callback(Arc::new(AutoConfirm { answer: true }));
    orchestrator.set_permission_evaluator(evaluator);
    orchestrator
}

async fn drive(engine: Arc<ExecutionEngine>, goal: &str) -> ExecutionResult {
    let mut rx = engine.take_events().unwrap();
    let runner = {
        let engine = engine.clone();
        let goal = goal.to_string();
        tokio::spawn(async move { engine.run(&goal).await })
    };
    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::ConfirmPlan { .. } => engine.confirm_plan(true),
            EngineEvent::ConfirmPermission { .. } => engine.confirm_permission(true),
            EngineEvent::Result { .. } => break,
            _ => {}
        }
    }
    runner.await.unwrap()
}

/// Write a file, then read it back, end to end through plan execution.
#[tokio::test]
async fn write_then_read_through_the_full_stack() {
    let workspace = TempDir::new().unwrap();
    let orchestrator = Arc::new(orchestrator_for(&workspace));

    let planner = MockPlanner::with_steps(vec![
        PlanStep::new(
            "s1",
            "file_write",
            json!({"path": "notes.txt", "content": "from the plan"}),
            RiskLevel::Modify,
        ),
        PlanStep::new(
            "s2",
            "file_read",
            json!({"path": "notes.txt"}),
            RiskLevel::Read,
        ),
    ]);
    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(planner),
        orchestrator,
        EngineConfig::default(),
    ));

    let result = drive(engine, "write then read notes.txt").await;

    assert!(result.success);
    assert_eq!(result.steps.len(), 2);
    let read_output = result.steps[1].output.as_ref().unwrap();
    assert_eq!(read_output["content"], "from the plan");
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("notes.txt")).unwrap(),
        "from the plan"
    );
}

/// A System-tier shell step still runs after the user confirms it.
#[tokio::test]
async fn confirmed_shell_step_executes() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("data.txt"), "payload").unwrap();
    let orchestrator = Arc::new(orchestrator_for(&workspace));

    let planner = MockPlanner::with_steps(vec![PlanStep::new(
        "s1",
        "shell_execute",
        json!({"command": "cat data.txt"}),
        RiskLevel::System,
    )]);
    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(planner),
        orchestrator,
        EngineConfig::default(),
    ));

    let result = drive(engine, "show the data file").await;

    assert!(result.success);
    let output = result.steps[0].output.as_ref().unwrap();
    assert!(output["content"].as_str().unwrap().contains("payload"));
}

/// A denylisted command is refused by the permission evaluator inside the
/// orchestrator, and the step records the denial reason.
#[tokio::test]
async fn denied_command_is_blocked_by_policy() {
    let workspace = TempDir::new().unwrap();
    let orchestrator = Arc::new(orchestrator_for(&workspace));

    let planner = MockPlanner::with_steps(vec![PlanStep::new(
        "s1",
        "shell_execute",
        json!({"command": "sudo rm -rf /"}),
        RiskLevel::System,
    )]);
    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(planner),
        orchestrator,
        EngineConfig::default(),
    ));

    let result = drive(engine, "nuke everything").await;

    assert!(!result.success);
    assert!(result.steps[0]
        .error
        .as_ref()
        .unwrap()
        .contains("denied pattern"));
}

/// With a one-call-per-second budget, the second call right after the
/// first is refused and carries a retry hint.
#[tokio::test]
async fn rate_limited_second_call() {
    let workspace = TempDir::new().unwrap();
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, workspace.path().to_path_buf());

    let mut overrides = HashMap::new();
    overrides.insert(
        "datetime".to_string(),
        ToolRateLimit {
            max_calls: 1,
            window_ms: 1_000,
        },
    );
    let orchestrator = ToolOrchestrator::new(
        registry,
        RateLimitConfig {
            default_max_calls: 100,
            default_window_ms: 60_000,
            overrides,
        },
        OrchestratorConfig::default(),
    );

    let first = orchestrator
        .execute(ToolRequest::new("datetime", json!({})))
        .await;
    assert!(first.success);

    let second = orchestrator
        .execute(ToolRequest::new("datetime", json!({})))
        .await;
    assert!(!second.success);
    assert!(second.retry_after.is_some());
}

/// Parallel plan over real read-only tools: results align with plan order.
#[tokio::test]
async fn parallel_plan_with_real_tools() {
    let workspace = TempDir::new().unwrap();
    for i in 0..4 {
        std::fs::write(workspace.path().join(format!("f{i}.txt")), format!("v{i}")).unwrap();
    }
    let orchestrator = Arc::new(orchestrator_for(&workspace));

    let steps: Vec<PlanStep> = (0..4)
        .map(|i| {
            PlanStep::new(
                format!("s{i}"),
                "file_read",
                json!({"path": format!("f{i}.txt")}),
                RiskLevel::Read,
            )
        })
        .collect();
    let config = EngineConfig {
        parallel: true,
        max_parallel: 2,
        ..EngineConfig::default()
    };
    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(MockPlanner::with_steps(steps.clone())),
        orchestrator,
        config,
    ));

    let result = drive(engine, "read all the files").await;

    assert!(result.success);
    for (i, step_result) in result.steps.iter().enumerate() {
        assert_eq!(step_result.step_id, steps[i].id);
        let output = step_result.output.as_ref().unwrap();
        assert_eq!(output["content"], format!("v{i}"));
    }
}
