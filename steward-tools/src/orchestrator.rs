//! Tool orchestrator — composes validation, rate limiting, permission
//! evaluation, and retry/timeout handling around tool invocation.
//!
//! Single-call pipeline, each stage able to short-circuit with a failure
//! outcome: existence → validation → rate limit → permission → hooks →
//! timed execution with retry. Validation, permission, and rate-limit
//! failures are deterministic and never retried.

use crate::ratelimit::RateLimiter;
use crate::registry::{Tool, ToolRegistry};
use crate::validate;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_core::config::{OrchestratorConfig, RateLimitConfig};
use steward_core::engine::StepExecutor;
use steward_core::error::ToolError;
use steward_core::permission::PermissionEvaluator;
use steward_core::plan::PlanStep;
use steward_core::types::{ActionKind, PermissionRequest, ToolOutput};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A request to invoke one tool.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool_name: String,
    pub params: Value,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            params,
        }
    }
}

/// The outcome of one orchestrated tool call.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub tool_name: String,
    pub success: bool,
    pub output: Option<ToolOutput>,
    pub error: Option<String>,
    pub duration: Duration,
    pub retries: usize,
    /// Hint for rate-limited failures.
    pub retry_after: Option<Duration>,
}

impl ExecutionOutcome {
    fn failure(tool_name: &str, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration,
            retries: 0,
            retry_after: None,
        }
    }
}

/// Hooks into the orchestration pipeline. All default to no-ops.
#[async_trait]
pub trait OrchestratorHooks: Send + Sync {
    /// A call was rejected by the rate limiter.
    async fn on_rate_limited(&self, _tool: &str, _retry_after: Option<Duration>) {}

    /// Permission was denied. Returning `true` grants one more chance and
    /// lets the call proceed; `false` keeps the denial.
    async fn on_permission_required(&self, _request: &PermissionRequest) -> bool {
        false
    }

    /// About to execute. Returning `false` vetoes the call.
    async fn on_before_execute(&self, _tool: &str, _params: &Value) -> bool {
        true
    }

    /// Always fires with the final outcome, success or failure.
    async fn on_after_execute(&self, _outcome: &ExecutionOutcome) {}
}

/// The tool orchestrator.
pub struct ToolOrchestrator {
    registry: ToolRegistry,
    limiter: Mutex<RateLimiter>,
    evaluator: Option<Mutex<PermissionEvaluator>>,
    hooks: Option<Arc<dyn OrchestratorHooks>>,
    config: OrchestratorConfig,
}

impl ToolOrchestrator {
    pub fn new(
        registry: ToolRegistry,
        rate_config: RateLimitConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            limiter: Mutex::new(RateLimiter::new(rate_config)),
            evaluator: None,
            hooks: None,
            config,
        }
    }

    /// Install the permission evaluator guarding every call.
    pub fn set_permission_evaluator(&mut self, evaluator: PermissionEvaluator) {
        self.evaluator = Some(Mutex::new(evaluator));
    }

    pub fn set_hooks(&mut self, hooks: Arc<dyn OrchestratorHooks>) {
        self.hooks = Some(hooks);
    }

    /// Register a tool. Startup-time only; execution borrows immutably.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        self.registry.register(tool)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run the full pipeline for one request.
    pub async fn execute(&self, request: ToolRequest) -> ExecutionOutcome {
        let start = Instant::now();
        let name = request.tool_name.as_str();

        // 1. Existence.
        let Some(tool) = self.registry.get(name) else {
            let err = ToolError::NotFound {
                name: name.to_string(),
            };
            let outcome = ExecutionOutcome::failure(name, err.to_string(), start.elapsed());
            self.after(&outcome).await;
            return outcome;
        };

        // 2. Structural validation.
        let validation = validate::validate(&tool.parameters_schema(), &request.params);
        if !validation.valid {
            let err = ToolError::InvalidArguments {
                name: name.to_string(),
                reason: validation.errors.join("; "),
            };
            let outcome = ExecutionOutcome::failure(name, err.to_string(), start.elapsed());
            self.after(&outcome).await;
            return outcome;
        }

        // 3. Rate limit.
        let decision = self.limiter.lock().await.check(name);
        if !decision.allowed {
            if let Some(ref hooks) = self.hooks {
                hooks.on_rate_limited(name, decision.retry_after).await;
            }
            let err = ToolError::RateLimited {
                name: name.to_string(),
                retry_after: decision.retry_after,
            };
            let mut outcome = ExecutionOutcome::failure(name, err.to_string(), start.elapsed());
            outcome.retry_after = decision.retry_after;
            self.after(&outcome).await;
            return outcome;
        }

        // 4. Permission.
        if let Some(ref evaluator) = self.evaluator {
            let permission_request = permission_request_for(tool.as_ref(), &request.params);
            let result = evaluator.lock().await.evaluate(&permission_request).await;
            if !result.granted {
                let reason = result
                    .reason
                    .unwrap_or_else(|| "permission denied".to_string());
                // The hook gets one more chance to let the call through.
                let escalated = match self.hooks {
                    Some(ref hooks) => hooks.on_permission_required(&permission_request).await,
                    None => false,
                };
                if !escalated {
                    let err = ToolError::PermissionDenied {
                        name: name.to_string(),
                        reason,
                    };
                    let outcome =
                        ExecutionOutcome::failure(name, err.to_string(), start.elapsed());
                    self.after(&outcome).await;
                    return outcome;
                }
                info!(tool = name, "Permission denial escalated and overridden by hook");
            } else if result.requires_backup {
                debug!(tool = name, "Backup recommended before this modification");
            }
        }

        // 5. Pre-execution veto.
        if let Some(ref hooks) = self.hooks {
            if !hooks.on_before_execute(name, &request.params).await {
                let outcome = ExecutionOutcome::failure(
                    name,
                    format!("Tool '{name}' execution vetoed by hook"),
                    start.elapsed(),
                );
                self.after(&outcome).await;
                return outcome;
            }
        }

        // 6. Record the call, then execute with timeout and retry.
        self.limiter.lock().await.record(name);
        let outcome = self.execute_with_retry(tool, &request, start).await;
        self.after(&outcome).await;
        outcome
    }

    /// Execute batches of requests concurrently. Batch *i* fully completes
    /// before batch *i+1* starts; the output order matches the input order.
    pub async fn execute_parallel(&self, requests: Vec<ToolRequest>) -> Vec<ExecutionOutcome> {
        let batch_size = self.config.max_parallel_calls.max(1);
        let mut outcomes = Vec::with_capacity(requests.len());
        for batch in requests.chunks(batch_size) {
            let futures = batch.iter().map(|request| self.execute(request.clone()));
            outcomes.extend(join_all(futures).await);
        }
        outcomes
    }

    async fn execute_with_retry(
        &self,
        tool: Arc<dyn Tool>,
        request: &ToolRequest,
        start: Instant,
    ) -> ExecutionOutcome {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let name = request.tool_name.as_str();
        let mut retries = 0;

        loop {
            let attempt = tokio::time::timeout(timeout, tool.execute(request.params.clone())).await;
            let error = match attempt {
                Ok(Ok(output)) => {
                    return ExecutionOutcome {
                        tool_name: name.to_string(),
                        success: true,
                        output: Some(output),
                        error: None,
                        duration: start.elapsed(),
                        retries,
                        retry_after: None,
                    };
                }
                Ok(Err(e)) => e,
                Err(_) => ToolError::Timeout {
                    name: name.to_string(),
                    timeout_secs: timeout.as_secs(),
                },
            };

            if error.is_retryable() && retries < self.config.retry_count {
                retries += 1;
                warn!(tool = name, retry = retries, error = %error, "Retrying after failure");
                tokio::time::sleep(delay).await;
                continue;
            }

            let mut outcome = ExecutionOutcome::failure(name, error.to_string(), start.elapsed());
            outcome.retries = retries;
            return outcome;
        }
    }

    async fn after(&self, outcome: &ExecutionOutcome) {
        if let Some(ref hooks) = self.hooks {
            hooks.on_after_execute(outcome).await;
        }
    }
}

/// Build a permission request from a tool call, mapping well-known tools to
/// their action kind and target.
fn permission_request_for(tool: &dyn Tool, params: &Value) -> PermissionRequest {
    let (action, target) = match tool.name() {
        "shell_execute" => (ActionKind::Shell, params["command"].as_str()),
        "url_open" => (ActionKind::Network, params["url"].as_str()),
        name if name.starts_with("file_") => (ActionKind::FileSystem, params["path"].as_str()),
        _ => (ActionKind::Other, None),
    };

    let mut request = PermissionRequest::new(
        tool.name(),
        action,
        tool.risk_level(),
        tool.description(),
    );
    if let Some(target) = target {
        request = request.with_target(target);
    }
    request
}

#[async_trait]
impl StepExecutor for ToolOrchestrator {
    async fn execute_step(&self, step: &PlanStep) -> Result<Value, ToolError> {
        let outcome = self
            .execute(ToolRequest::new(&step.tool_name, step.params.clone()))
            .await;
        if outcome.success {
            let output = outcome.output.unwrap_or_else(|| ToolOutput::text(""));
            serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed {
                name: step.tool_name.clone(),
                message: e.to_string(),
            })
        } else {
            Err(ToolError::ExecutionFailed {
                name: step.tool_name.clone(),
                message: outcome
                    .error
                    .unwrap_or_else(|| "tool execution failed".to_string()),
            })
        }
    }
}
