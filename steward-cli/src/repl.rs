//! REPL for interactive and single-task modes.
//!
//! Input is routed locally first: system queries and simple file operations
//! are answered without the model, slash commands dispatch directly, and
//! everything else becomes an engine task with plan and permission prompts.

use crate::slash::CommandRegistry;
use anyhow::Context;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use steward_core::config::StewardConfig;
use steward_core::engine::{EngineEvent, EnginePhase, ExecutionEngine, Formatter};
use steward_core::permission::{ConfirmCallback, PermissionEvaluator};
use steward_core::plan::StepResult;
use steward_core::planner::{LlmPlanner, Planner};
use steward_core::router::{FileOp, IntentKind, IntentRouter, QueryCache, QueryType};
use steward_core::types::{PermissionRequest, RiskLevel};
use steward_tools::registry::ToolRegistry;
use steward_tools::{register_builtin_tools, ToolOrchestrator, ToolRequest};
use tracing::debug;

/// Interactive confirmation through a terminal prompt.
struct CliConfirm;

#[async_trait::async_trait]
impl ConfirmCallback for CliConfirm {
    async fn confirm(&self, request: &PermissionRequest) -> bool {
        let prompt = format!(
            "[{}] {} (risk: {}){}",
            request.tool_name,
            request.description,
            request.risk_level,
            request
                .target
                .as_deref()
                .map(|t| format!(" — target: {t}"))
                .unwrap_or_default()
        );
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

/// Summarizes step results without another model round-trip.
struct PlainFormatter;

#[async_trait::async_trait]
impl Formatter for PlainFormatter {
    async fn format(&self, goal: &str, results: &[StepResult]) -> anyhow::Result<String> {
        let succeeded = results.iter().filter(|r| r.success).count();
        let mut out = format!("{goal}: {succeeded}/{} steps succeeded", results.len());
        for result in results.iter().filter(|r| !r.success) {
            out.push_str(&format!(
                "\n  failed {}: {}",
                result.step_id,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
        Ok(out)
    }
}

/// The interactive shell.
pub struct Repl {
    config: StewardConfig,
    orchestrator: Arc<ToolOrchestrator>,
    router: IntentRouter,
    cache: QueryCache,
    commands: CommandRegistry,
}

impl Repl {
    pub fn new(config: StewardConfig, workspace: PathBuf) -> anyhow::Result<Self> {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, workspace);

        let mut evaluator = PermissionEvaluator::new(config.permission.clone());
        evaluator.set_callback(Arc::new(CliConfirm));

        let mut orchestrator = ToolOrchestrator::new(
            registry,
            config.rate_limit.clone(),
            config.orchestrator.clone(),
        );
        orchestrator.set_permission_evaluator(evaluator);

        let router = IntentRouter::new(&config.router).context("router configuration")?;

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            router,
            cache: QueryCache::new(),
            commands: CommandRegistry::with_defaults(),
        })
    }

    /// Run the interactive loop until /quit or EOF.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("Steward — type a request, /help for commands, /quit to exit.");
        let stdin = io::stdin();
        loop {
            print!("\x1b[1msteward>\x1b[0m ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            if input.starts_with('/') {
                if !self.handle_slash(input).await {
                    break;
                }
                continue;
            }
            self.handle_input(input).await;
        }
        Ok(())
    }

    /// Execute one task and exit (the `steward "<task>"` mode).
    pub async fn run_single(&mut self, task: &str) -> anyhow::Result<()> {
        self.handle_input(task).await;
        Ok(())
    }

    /// Dispatch a slash command. Returns false when the REPL should exit.
    async fn handle_slash(&mut self, input: &str) -> bool {
        let resolved = self
            .commands
            .resolve(input)
            .or_else(|| self.commands.resolve_fuzzy(input));
        let Some(info) = resolved else {
            println!("Unknown command: {input} — try /help");
            return true;
        };

        match info.name {
            "/quit" => return false,
            "/clear" => {
                print!("\x1b[2J\x1b[H");
                let _ = io::stdout().flush();
            }
            "/help" => println!("{}", self.commands.help_text()),
            "/tools" => {
                let mut names = self.orchestrator.registry().list_definitions();
                names.sort_by(|a, b| a.name.cmp(&b.name));
                for def in names {
                    let risk = self
                        .orchestrator
                        .registry()
                        .get(&def.name)
                        .map(|t| t.risk_level())
                        .unwrap_or(RiskLevel::Read);
                    println!("  {:<14} [{}] {}", def.name, risk, def.description);
                }
            }
            "/plan" => {
                let engine = &self.config.engine;
                println!(
                    "  parallel: {}\n  max_parallel: {}\n  call_timeout_ms: {}\n  dependent_tools: {}",
                    engine.parallel,
                    engine.max_parallel,
                    engine.call_timeout_ms,
                    engine.dependent_tools.join(", ")
                );
            }
            "/config" => match toml::to_string_pretty(&self.config) {
                Ok(text) => println!("{text}"),
                Err(e) => println!("Failed to render config: {e}"),
            },
            _ => {}
        }
        true
    }

    /// Route one line of natural-language input.
    async fn handle_input(&mut self, input: &str) {
        let intent = self.router.detect(input);
        debug!(kind = %intent.kind, needs_llm = intent.needs_llm, "Routed input");

        if self.router.is_fast_path(&intent) {
            if let Some(query_type) = intent.query_type {
                self.answer_system_query(query_type).await;
                return;
            }
        }

        match intent.kind {
            IntentKind::FileOperation => self.handle_file_operation(&intent.path, intent.file_op, input).await,
            IntentKind::Chat => {
                println!("I run tasks and answer system queries. Describe what you'd like done, or /help for commands.");
            }
            _ => self.run_task(input).await,
        }
    }

    /// Fast path: answer from the TTL cache or the system_query tool.
    async fn answer_system_query(&mut self, query_type: QueryType) {
        if let Some(cached) = self.cache.get(query_type) {
            println!("{cached}");
            return;
        }
        let outcome = self
            .orchestrator
            .execute(ToolRequest::new(
                "system_query",
                serde_json::json!({"query_type": query_type.as_str()}),
            ))
            .await;
        match outcome.output {
            Some(output) if outcome.success => {
                self.cache.put(query_type, output.content.clone());
                println!("{}", output.content);
            }
            _ => println!(
                "Query failed: {}",
                outcome.error.unwrap_or_else(|| "unknown error".into())
            ),
        }
    }

    /// Deterministic file operations run directly through the orchestrator;
    /// writes need content from a plan, so they go to the engine.
    async fn handle_file_operation(&mut self, path: &Option<String>, op: Option<FileOp>, input: &str) {
        let request = match (op, path) {
            (Some(FileOp::Read), Some(path)) => {
                ToolRequest::new("file_read", serde_json::json!({"path": path}))
            }
            (Some(FileOp::List), _) => ToolRequest::new(
                "file_list",
                serde_json::json!({"path": path.as_deref().unwrap_or(".")}),
            ),
            (Some(FileOp::Delete), Some(path)) => {
                ToolRequest::new("file_delete", serde_json::json!({"path": path}))
            }
            _ => {
                // No usable path, or a write: let the planner work it out.
                self.run_task(input).await;
                return;
            }
        };

        let outcome = self.orchestrator.execute(request).await;
        if outcome.success {
            if let Some(output) = outcome.output {
                println!("{}", output.content);
            }
        } else {
            println!(
                "Failed: {}",
                outcome.error.unwrap_or_else(|| "unknown error".into())
            );
        }
    }

    /// Drive a full plan-confirm-execute run with live event rendering.
    async fn run_task(&mut self, goal: &str) {
        let planner: Arc<dyn Planner> = match LlmPlanner::new(self.config.planner.clone()) {
            Ok(planner) => Arc::new(planner),
            Err(e) => {
                println!("Planner unavailable: {e}");
                return;
            }
        };

        let engine = Arc::new(
            ExecutionEngine::new(
                planner,
                self.orchestrator.clone(),
                self.config.engine.clone(),
            )
            .with_formatter(Arc::new(PlainFormatter)),
        );
        let Some(mut events) = engine.take_events() else {
            return;
        };

        let runner = {
            let engine = engine.clone();
            let goal = goal.to_string();
            tokio::spawn(async move { engine.run(&goal).await })
        };

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if self.render_event(&engine, event).await {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nCancelling...");
                    engine.cancel();
                }
            }
        }

        if let Ok(result) = runner.await {
            if let Some(summary) = result.summary {
                println!("\n\x1b[32m{summary}\x1b[0m");
            } else if let Some(error) = result.error {
                println!("\n\x1b[31mRun failed: {error}\x1b[0m");
            }
        }
    }

    /// Render one engine event. Returns true when the run is over.
    async fn render_event(&self, engine: &Arc<ExecutionEngine>, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Status(phase) => {
                let label = match phase {
                    EnginePhase::Planning => "planning...",
                    EnginePhase::Executing => "executing...",
                    EnginePhase::Formatting => "formatting...",
                };
                println!("\x1b[90m  {label}\x1b[0m");
            }
            EngineEvent::ConfirmPlan { steps, dangerous } => {
                println!("\nProposed plan ({} steps):", steps.len());
                for (i, step) in steps.iter().enumerate() {
                    let marker = if step.risk_level.is_dangerous() {
                        "\x1b[31m!\x1b[0m"
                    } else {
                        " "
                    };
                    println!(
                        " {marker} {}. [{}] {} {}",
                        i + 1,
                        step.risk_level,
                        step.tool_name,
                        step.description.as_deref().unwrap_or("")
                    );
                }
                if !dangerous.is_empty() {
                    println!(
                        "  \x1b[33m{} step(s) need per-step approval\x1b[0m",
                        dangerous.len()
                    );
                }
                let approved = prompt_bool("Run this plan?").await;
                engine.confirm_plan(approved);
            }
            EngineEvent::ConfirmPermission { index, step } => {
                println!(
                    "\n\x1b[33m[Approval required]\x1b[0m step {} — [{}] {}",
                    index + 1,
                    step.risk_level,
                    step.tool_name
                );
                let approved = prompt_bool("Allow this step?").await;
                engine.confirm_permission(approved);
            }
            EngineEvent::StepStart { index, step } => {
                println!("\x1b[36m  [{}] step {} running...\x1b[0m", step.tool_name, index + 1);
            }
            EngineEvent::StepComplete { index, result } => {
                if result.success {
                    println!("\x1b[36m  step {} done\x1b[0m", index + 1);
                } else {
                    println!(
                        "\x1b[31m  step {} failed: {}\x1b[0m",
                        index + 1,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            EngineEvent::Error { message } => {
                println!("\x1b[31mPlanner error: {message}\x1b[0m");
            }
            EngineEvent::Result { .. } => return true,
            // Future event types are ignorable by contract.
            _ => {}
        }
        false
    }
}

async fn prompt_bool(prompt: &str) -> bool {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
