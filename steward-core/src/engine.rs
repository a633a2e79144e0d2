//! Execution engine — plan, confirm, execute, format.
//!
//! The engine is an explicit state machine with two suspension points:
//! plan confirmation and per-step permission confirmation. At most one
//! confirmation is outstanding at a time; it is resolved exogenously via
//! [`ExecutionEngine::confirm_plan`] / [`ExecutionEngine::confirm_permission`],
//! and `cancel()` resolves any pending confirmation as denied. Progress is
//! reported on an event channel consumable by any front end.

use crate::config::EngineConfig;
use crate::error::{EngineError, ToolError};
use crate::plan::{ExecutionPlan, PlanStatus, PlanStep, StepResult};
use crate::planner::Planner;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Executes a single plan step. Implemented by the tool orchestrator; tests
/// substitute counting stubs.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(&self, step: &PlanStep) -> Result<serde_json::Value, ToolError>;
}

/// Renders step results into a final answer. Optional; a formatter failure
/// falls back to the raw step results.
#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, goal: &str, results: &[StepResult]) -> anyhow::Result<String>;
}

/// Phases announced on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Planning,
    Executing,
    Formatting,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnginePhase::Planning => write!(f, "planning"),
            EnginePhase::Executing => write!(f, "executing"),
            EnginePhase::Formatting => write!(f, "formatting"),
        }
    }
}

/// Events emitted while a run progresses.
///
/// Consumers must treat unknown variants as ignorable.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EngineEvent {
    Status(EnginePhase),
    /// The plan awaits approval. `dangerous` is the System/Delete subset,
    /// for UI highlighting.
    ConfirmPlan {
        steps: Vec<PlanStep>,
        dangerous: Vec<PlanStep>,
    },
    StepStart {
        index: usize,
        step: PlanStep,
    },
    StepComplete {
        index: usize,
        result: StepResult,
    },
    /// A System/Delete step awaits approval.
    ConfirmPermission {
        index: usize,
        step: PlanStep,
    },
    /// Terminal: the run finished (successfully or not).
    Result {
        result: ExecutionResult,
    },
    /// Terminal: the planner failed before any step ran.
    Error {
        message: String,
    },
}

/// The final outcome of a run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// True iff every step succeeded.
    pub success: bool,
    pub steps: Vec<StepResult>,
    /// Formatter output, when a formatter was supplied and succeeded.
    pub summary: Option<String>,
    /// Run-level failure reason (planner error, rejection, cancellation).
    pub error: Option<String>,
}

impl ExecutionResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            steps: Vec::new(),
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// Which confirmation is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfirmKind {
    Plan,
    Permission,
}

struct PendingConfirmation {
    kind: ConfirmKind,
    tx: oneshot::Sender<bool>,
}

/// The execution engine.
pub struct ExecutionEngine {
    planner: Arc<dyn Planner>,
    executor: Arc<dyn StepExecutor>,
    formatter: Option<Arc<dyn Formatter>>,
    config: EngineConfig,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    pending: Mutex<Option<PendingConfirmation>>,
    cancel_token: CancellationToken,
    running: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: Arc<dyn StepExecutor>,
        config: EngineConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            planner,
            executor,
            formatter: None,
            config,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            pending: Mutex::new(None),
            cancel_token: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Take the event receiver. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Resolve a pending plan confirmation. A no-op unless a plan
    /// confirmation is the one outstanding.
    pub fn confirm_plan(&self, approved: bool) {
        self.resolve_confirmation(ConfirmKind::Plan, approved);
    }

    /// Resolve a pending permission confirmation. A no-op unless a
    /// permission confirmation is the one outstanding.
    pub fn confirm_permission(&self, approved: bool) {
        self.resolve_confirmation(ConfirmKind::Permission, approved);
    }

    /// Request cancellation: no new steps or confirmations start, and any
    /// pending confirmation resolves as denied. Idempotent; emits nothing.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
        if let Some(pending) = self.pending.lock().unwrap().take() {
            let _ = pending.tx.send(false);
        }
    }

    fn resolve_confirmation(&self, kind: ConfirmKind, approved: bool) {
        let mut slot = self.pending.lock().unwrap();
        if slot.as_ref().map(|p| p.kind) == Some(kind) {
            if let Some(pending) = slot.take() {
                let _ = pending.tx.send(approved);
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.config.call_timeout_ms)
    }

    /// Register a confirmation, announce it with `event`, and suspend until
    /// it is resolved. The pending slot is registered BEFORE the event goes
    /// out, so a consumer may answer the moment it sees the event.
    async fn request_confirmation(&self, kind: ConfirmKind, event: EngineEvent) -> bool {
        if self.cancel_token.is_cancelled() {
            return false;
        }
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap() = Some(PendingConfirmation { kind, tx });

        // cancel() may have run between the check above and registration;
        // drop the slot so the sender closes and the await resolves false.
        if self.cancel_token.is_cancelled() {
            self.pending.lock().unwrap().take();
            return false;
        }
        self.emit(event);
        rx.await.unwrap_or(false)
    }

    /// Run a goal to completion. Every outcome, including planner failure
    /// and cancellation, is reported as an [`ExecutionResult`].
    pub async fn run(&self, goal: &str) -> ExecutionResult {
        if self
            .running
            .swap(true, Ordering::SeqCst)
        {
            return ExecutionResult::failure(EngineError::AlreadyRunning.to_string());
        }
        let result = self.run_inner(goal).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, goal: &str) -> ExecutionResult {
        if self.cancel_token.is_cancelled() {
            let result = ExecutionResult::failure(EngineError::Cancelled.to_string());
            self.emit(EngineEvent::Result {
                result: result.clone(),
            });
            return result;
        }

        // Planning.
        self.emit(EngineEvent::Status(EnginePhase::Planning));
        info!(goal = goal, "Generating plan");
        let steps = match tokio::time::timeout(self.call_timeout(), self.planner.plan(goal)).await
        {
            Ok(Ok(steps)) => steps,
            Ok(Err(e)) => {
                let message = e.to_string();
                warn!(error = %message, "Planner failed");
                self.emit(EngineEvent::Error {
                    message: message.clone(),
                });
                let result = ExecutionResult::failure(message);
                self.emit(EngineEvent::Result {
                    result: result.clone(),
                });
                return result;
            }
            Err(_) => {
                let message = EngineError::Timeout {
                    timeout_secs: self.call_timeout().as_secs(),
                }
                .to_string();
                self.emit(EngineEvent::Error {
                    message: message.clone(),
                });
                let result = ExecutionResult::failure(message);
                self.emit(EngineEvent::Result {
                    result: result.clone(),
                });
                return result;
            }
        };

        let mut plan = ExecutionPlan::new(goal, steps);

        // A plan with nothing to do succeeds without bothering the user.
        if plan.steps.is_empty() {
            plan.transition(PlanStatus::Running);
            plan.transition(PlanStatus::Completed);
            let result = ExecutionResult {
                success: true,
                steps: Vec::new(),
                summary: None,
                error: None,
            };
            self.emit(EngineEvent::Result {
                result: result.clone(),
            });
            return result;
        }

        // Plan confirmation.
        let confirm_event = EngineEvent::ConfirmPlan {
            steps: plan.steps.clone(),
            dangerous: plan.dangerous_steps().into_iter().cloned().collect(),
        };
        if !self
            .request_confirmation(ConfirmKind::Plan, confirm_event)
            .await
        {
            plan.transition(PlanStatus::Cancelled);
            info!("Plan rejected by user");
            let result = ExecutionResult::failure("user cancelled");
            self.emit(EngineEvent::Result {
                result: result.clone(),
            });
            return result;
        }

        if self.cancel_token.is_cancelled() {
            plan.transition(PlanStatus::Cancelled);
            let result = ExecutionResult::failure(EngineError::Cancelled.to_string());
            self.emit(EngineEvent::Result {
                result: result.clone(),
            });
            return result;
        }

        // Execution.
        self.emit(EngineEvent::Status(EnginePhase::Executing));
        plan.transition(PlanStatus::Running);
        let (step_results, cancelled) = if self.config.parallel {
            self.execute_partitioned(&plan).await
        } else {
            self.execute_serial(&plan).await
        };

        // Formatting: only when something succeeded and a formatter exists.
        let mut summary = None;
        if !cancelled && step_results.iter().any(|r| r.success) {
            if let Some(ref formatter) = self.formatter {
                self.emit(EngineEvent::Status(EnginePhase::Formatting));
                match formatter.format(&plan.goal, &step_results).await {
                    Ok(text) => summary = Some(text),
                    Err(e) => {
                        warn!(error = %e, "Formatter failed; falling back to raw step results");
                    }
                }
            }
        }

        let success = !cancelled && step_results.iter().all(|r| r.success);
        plan.transition(if cancelled {
            PlanStatus::Cancelled
        } else if success {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        });

        let result = ExecutionResult {
            success,
            steps: step_results,
            summary,
            error: cancelled.then(|| EngineError::Cancelled.to_string()),
        };
        self.emit(EngineEvent::Result {
            result: result.clone(),
        });
        result
    }

    /// Execute all steps in plan order. Returns the results and whether the
    /// run was cancelled part-way.
    async fn execute_serial(&self, plan: &ExecutionPlan) -> (Vec<StepResult>, bool) {
        let mut results = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            if self.cancel_token.is_cancelled() {
                self.fill_cancelled(&mut results, &plan.steps[index..]);
                return (results, true);
            }
            results.push(self.run_step(index, step, true).await);
        }
        (results, false)
    }

    /// Execute independent steps in concurrency-limited batches, then the
    /// dependent steps serially. Result indexes align with plan order.
    async fn execute_partitioned(&self, plan: &ExecutionPlan) -> (Vec<StepResult>, bool) {
        // Confirmation-gated steps run serially regardless of tool name:
        // only one confirmation may be pending at a time.
        let (independent, dependent): (Vec<usize>, Vec<usize>) =
            (0..plan.steps.len()).partition(|&i| {
                let step = &plan.steps[i];
                !step.risk_level.is_dangerous()
                    && !self
                        .config
                        .dependent_tools
                        .iter()
                        .any(|t| t == &step.tool_name)
            });

        let mut slots: Vec<Option<StepResult>> = (0..plan.steps.len()).map(|_| None).collect();
        let mut cancelled = false;

        for batch in independent.chunks(self.config.max_parallel.max(1)) {
            if self.cancel_token.is_cancelled() {
                cancelled = true;
                break;
            }
            let futures = batch.iter().map(|&index| {
                let step = &plan.steps[index];
                async move { (index, self.run_step(index, step, false).await) }
            });
            for (index, result) in join_all(futures).await {
                slots[index] = Some(result);
            }
        }

        if !cancelled {
            for &index in &dependent {
                if self.cancel_token.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let result = self.run_step(index, &plan.steps[index], true).await;
                slots[index] = Some(result);
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    StepResult::failed(&plan.steps[index].id, EngineError::Cancelled.to_string())
                })
            })
            .collect();
        (results, cancelled)
    }

    /// Run one step: permission prompt for dangerous tiers, timed execution,
    /// start/complete events. Failures never propagate; they become the
    /// step's result.
    async fn run_step(&self, index: usize, step: &PlanStep, allow_confirm: bool) -> StepResult {
        if step.risk_level.is_dangerous() && allow_confirm {
            let confirm_event = EngineEvent::ConfirmPermission {
                index,
                step: step.clone(),
            };
            if !self
                .request_confirmation(ConfirmKind::Permission, confirm_event)
                .await
            {
                debug!(step = %step.id, tool = %step.tool_name, "Step denied by user");
                let result = StepResult::failed(&step.id, "user denied");
                self.emit(EngineEvent::StepComplete {
                    index,
                    result: result.clone(),
                });
                return result;
            }
        }

        self.emit(EngineEvent::StepStart {
            index,
            step: step.clone(),
        });
        debug!(step = %step.id, tool = %step.tool_name, "Executing step");

        let outcome =
            tokio::time::timeout(self.call_timeout(), self.executor.execute_step(step)).await;
        let result = match outcome {
            Ok(Ok(value)) => StepResult::ok(&step.id, value),
            Ok(Err(e)) => StepResult::failed(&step.id, e.to_string()),
            Err(_) => StepResult::failed(
                &step.id,
                EngineError::Timeout {
                    timeout_secs: self.call_timeout().as_secs(),
                }
                .to_string(),
            ),
        };

        self.emit(EngineEvent::StepComplete {
            index,
            result: result.clone(),
        });
        result
    }

    fn fill_cancelled(&self, results: &mut Vec<StepResult>, remaining: &[PlanStep]) {
        for step in remaining {
            results.push(StepResult::failed(
                &step.id,
                EngineError::Cancelled.to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::MockPlanner;
    use crate::types::RiskLevel;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// An executor that counts invocations and can fail or stall on request.
    struct TestExecutor {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        delay: Option<Duration>,
    }

    impl TestExecutor {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                delay: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::new()
            }
        }

        fn stalling(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StepExecutor for TestExecutor {
        async fn execute_step(&self, step: &PlanStep) -> Result<serde_json::Value, ToolError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on_call == Some(call) {
                return Err(ToolError::ExecutionFailed {
                    name: step.tool_name.clone(),
                    message: "simulated failure".to_string(),
                });
            }
            Ok(json!({ "step": step.id }))
        }
    }

    fn step(id: &str, tool: &str, risk: RiskLevel) -> PlanStep {
        PlanStep::new(id, tool, json!({}), risk)
    }

    fn engine_with(
        steps: Vec<PlanStep>,
        executor: Arc<TestExecutor>,
        config: EngineConfig,
    ) -> Arc<ExecutionEngine> {
        Arc::new(ExecutionEngine::new(
            Arc::new(MockPlanner::with_steps(steps)),
            executor,
            config,
        ))
    }

    /// Drive a run, answering plan confirmations with `plan_answer` and
    /// permission confirmations with `permission_answer`. Returns the final
    /// result and all observed events.
    async fn drive(
        engine: Arc<ExecutionEngine>,
        plan_answer: bool,
        permission_answer: bool,
    ) -> (ExecutionResult, Vec<EngineEvent>) {
        let mut rx = engine.take_events().unwrap();
        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("test goal").await })
        };

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            match &event {
                EngineEvent::ConfirmPlan { .. } => engine.confirm_plan(plan_answer),
                EngineEvent::ConfirmPermission { .. } => {
                    engine.confirm_permission(permission_answer)
                }
                _ => {}
            }
            let done = matches!(event, EngineEvent::Result { .. });
            events.push(event);
            if done {
                break;
            }
        }
        (runner.await.unwrap(), events)
    }

    fn permission_prompts(events: &[EngineEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::ConfirmPermission { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_read_modify_plan_never_prompts() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![
                step("s1", "file_read", RiskLevel::Read),
                step("s2", "file_write", RiskLevel::Modify),
            ],
            executor.clone(),
            EngineConfig::default(),
        );
        let (result, events) = drive(engine, true, false).await;

        assert!(result.success);
        assert!(permission_prompts(&events).is_empty());
        assert_eq!(executor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_one_prompt_per_dangerous_step_in_plan_order() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![
                step("s1", "shell_execute", RiskLevel::System),
                step("s2", "file_read", RiskLevel::Read),
                step("s3", "file_delete", RiskLevel::Delete),
            ],
            executor.clone(),
            EngineConfig::default(),
        );
        let (result, events) = drive(engine, true, true).await;

        assert!(result.success);
        assert_eq!(permission_prompts(&events), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_plan_rejection_runs_nothing() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![step("s1", "file_delete", RiskLevel::Delete)],
            executor.clone(),
            EngineConfig::default(),
        );
        let (result, events) = drive(engine, false, true).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("user cancelled"));
        assert_eq!(executor.call_count(), 0);
        assert!(permission_prompts(&events).is_empty());
    }

    #[tokio::test]
    async fn test_permission_denial_continues_to_next_step() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![
                step("s1", "shell_execute", RiskLevel::System),
                step("s2", "file_read", RiskLevel::Read),
            ],
            executor.clone(),
            EngineConfig::default(),
        );
        let (result, _) = drive(engine, true, false).await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert!(!result.steps[0].success);
        assert_eq!(result.steps[0].error.as_deref(), Some("user denied"));
        assert!(result.steps[1].success);
        // The denied step never reached the executor.
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_executor_failure_is_recorded_and_run_continues() {
        let executor = Arc::new(TestExecutor::failing_on(2));
        let engine = engine_with(
            vec![
                step("s1", "file_read", RiskLevel::Read),
                step("s2", "file_read", RiskLevel::Read),
                step("s3", "file_read", RiskLevel::Read),
            ],
            executor.clone(),
            EngineConfig::default(),
        );
        let (result, _) = drive(engine, true, false).await;

        assert!(!result.success);
        assert_eq!(executor.call_count(), 3);
        assert!(result.steps[0].success);
        assert!(!result.steps[1].success);
        assert!(result.steps[1].error.as_ref().unwrap().contains("simulated failure"));
        assert!(result.steps[2].success);
    }

    #[tokio::test]
    async fn test_planner_failure_is_fatal() {
        let executor = Arc::new(TestExecutor::new());
        let engine = Arc::new(ExecutionEngine::new(
            Arc::new(MockPlanner::failing("model unavailable")),
            executor.clone(),
            EngineConfig::default(),
        ));
        let (result, events) = drive(engine, true, true).await;

        assert!(!result.success);
        assert_eq!(executor.call_count(), 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::Error { message } if message.contains("model unavailable"))));
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds_without_confirmation() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(vec![], executor.clone(), EngineConfig::default());
        let (result, events) = drive(engine, false, false).await;

        assert!(result.success);
        assert!(result.steps.is_empty());
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::ConfirmPlan { .. })));
    }

    #[tokio::test]
    async fn test_step_timeout_has_distinct_message() {
        let executor = Arc::new(TestExecutor::stalling(Duration::from_millis(200)));
        let config = EngineConfig {
            call_timeout_ms: 20,
            ..EngineConfig::default()
        };
        let engine = engine_with(
            vec![step("s1", "file_read", RiskLevel::Read)],
            executor.clone(),
            config,
        );
        let (result, _) = drive(engine, true, false).await;

        assert!(!result.success);
        let error = result.steps[0].error.as_ref().unwrap();
        assert!(error.contains("timed out"));
        assert!(!error.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_parallel_results_align_with_plan_order() {
        let executor = Arc::new(TestExecutor::new());
        let config = EngineConfig {
            parallel: true,
            max_parallel: 2,
            ..EngineConfig::default()
        };
        let steps: Vec<PlanStep> = (0..5)
            .map(|i| step(&format!("s{i}"), "file_read", RiskLevel::Read))
            .collect();
        let engine = engine_with(steps.clone(), executor.clone(), config);
        let (result, _) = drive(engine, true, false).await;

        assert!(result.success);
        assert_eq!(executor.call_count(), 5);
        assert_eq!(result.steps.len(), 5);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(result.steps[i].step_id, step.id);
        }
    }

    #[tokio::test]
    async fn test_parallel_dependent_steps_run_after_independent() {
        let executor = Arc::new(TestExecutor::new());
        let config = EngineConfig {
            parallel: true,
            max_parallel: 3,
            ..EngineConfig::default()
        };
        let engine = engine_with(
            vec![
                step("s0", "file_write", RiskLevel::Modify),
                step("s1", "file_read", RiskLevel::Read),
                step("s2", "file_read", RiskLevel::Read),
            ],
            executor.clone(),
            config,
        );
        let (result, events) = drive(engine, true, false).await;

        assert!(result.success);
        // The dependent file_write step starts only after both independent
        // reads have completed.
        let mut write_started_at = None;
        let mut reads_completed = 0;
        for event in &events {
            match event {
                EngineEvent::StepStart { index: 0, .. } => {
                    write_started_at = Some(reads_completed);
                }
                EngineEvent::StepComplete { index, .. } if *index != 0 => {
                    reads_completed += 1;
                }
                _ => {}
            }
        }
        assert_eq!(write_started_at, Some(2));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![step("s1", "file_read", RiskLevel::Read)],
            executor.clone(),
            EngineConfig::default(),
        );
        let mut rx = engine.take_events().unwrap();
        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("goal").await })
        };
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::ConfirmPlan { .. } => engine.confirm_plan(true),
                EngineEvent::Result { .. } => break,
                _ => {}
            }
        }
        let result = runner.await.unwrap();
        assert!(result.success);

        engine.cancel();
        // No further events appear.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_resolves_pending_confirmation() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![step("s1", "file_read", RiskLevel::Read)],
            executor.clone(),
            EngineConfig::default(),
        );
        let mut rx = engine.take_events().unwrap();
        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("goal").await })
        };
        // Cancel while the plan confirmation is pending.
        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::ConfirmPlan { .. }) {
                engine.cancel();
                break;
            }
        }
        let result = runner.await.unwrap();
        assert!(!result.success);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_confirm_kind_is_noop() {
        let executor = Arc::new(TestExecutor::new());
        let engine = engine_with(
            vec![step("s1", "file_read", RiskLevel::Read)],
            executor.clone(),
            EngineConfig::default(),
        );
        let mut rx = engine.take_events().unwrap();
        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("goal").await })
        };
        let mut confirmed = false;
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::ConfirmPlan { .. } if !confirmed => {
                    // The wrong method first: must not unblock the engine.
                    engine.confirm_permission(true);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    engine.confirm_plan(true);
                    confirmed = true;
                }
                EngineEvent::Result { .. } => break,
                _ => {}
            }
        }
        let result = runner.await.unwrap();
        assert!(result.success);
    }

    /// A formatter that fails, to exercise the raw-results fallback.
    struct FailingFormatter;

    #[async_trait]
    impl Formatter for FailingFormatter {
        async fn format(&self, _goal: &str, _results: &[StepResult]) -> anyhow::Result<String> {
            anyhow::bail!("formatter exploded")
        }
    }

    struct EchoFormatter;

    #[async_trait]
    impl Formatter for EchoFormatter {
        async fn format(&self, goal: &str, results: &[StepResult]) -> anyhow::Result<String> {
            Ok(format!("{goal}: {} steps", results.len()))
        }
    }

    #[tokio::test]
    async fn test_formatter_output_becomes_summary() {
        let executor = Arc::new(TestExecutor::new());
        let engine = Arc::new(
            ExecutionEngine::new(
                Arc::new(MockPlanner::with_steps(vec![step(
                    "s1",
                    "file_read",
                    RiskLevel::Read,
                )])),
                executor,
                EngineConfig::default(),
            )
            .with_formatter(Arc::new(EchoFormatter)),
        );
        let (result, _) = drive(engine, true, false).await;
        assert_eq!(result.summary.as_deref(), Some("test goal: 1 steps"));
    }

    #[tokio::test]
    async fn test_formatter_failure_falls_back_to_raw_results() {
        let executor = Arc::new(TestExecutor::new());
        let engine = Arc::new(
            ExecutionEngine::new(
                Arc::new(MockPlanner::with_steps(vec![step(
                    "s1",
                    "file_read",
                    RiskLevel::Read,
                )])),
                executor,
                EngineConfig::default(),
            )
            .with_formatter(Arc::new(FailingFormatter)),
        );
        let (result, _) = drive(engine, true, false).await;
        // Run still succeeds; the summary is simply absent.
        assert!(result.success);
        assert!(result.summary.is_none());
        assert_eq!(result.steps.len(), 1);
    }
}
