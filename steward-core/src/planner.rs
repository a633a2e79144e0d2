//! Plan generation — the external planner collaborator.
//!
//! The engine only sees the [`Planner`] trait. `MockPlanner` drives tests;
//! `LlmPlanner` is a thin client for any endpoint following the OpenAI chat
//! completions API format, prompting the model for a JSON step array.

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::plan::PlanStep;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Produces an ordered step list for a goal. May fail; the engine treats a
/// planner failure as fatal for the run.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, goal: &str) -> Result<Vec<PlanStep>, PlannerError>;
}

/// A scripted planner for tests: returns queued plans in order, or an error.
pub struct MockPlanner {
    plans: std::sync::Mutex<Vec<Result<Vec<PlanStep>, String>>>,
}

impl MockPlanner {
    pub fn new() -> Self {
        Self {
            plans: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A planner that always returns the given steps.
    pub fn with_steps(steps: Vec<PlanStep>) -> Self {
        let planner = Self::new();
        planner.queue(Ok(steps));
        planner
    }

    /// A planner whose next call fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        let planner = Self::new();
        planner.queue(Err(message.into()));
        planner
    }

    /// Queue the outcome of the next `plan` call.
    pub fn queue(&self, outcome: Result<Vec<PlanStep>, String>) {
        self.plans.lock().unwrap().push(outcome);
    }
}

impl Default for MockPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, _goal: &str) -> Result<Vec<PlanStep>, PlannerError> {
        let mut plans = self.plans.lock().unwrap();
        if plans.is_empty() {
            return Ok(Vec::new());
        }
        plans
            .remove(0)
            .map_err(|message| PlannerError::RequestFailed { message })
    }
}

const PLAN_SYSTEM_PROMPT: &str = "\
You are a task planner for a CLI agent. Decompose the user's goal into an \
ordered JSON array of steps. Each step is an object with fields: \
\"id\" (string, unique), \"tool_name\" (one of the available tools), \
\"params\" (object), \"risk_level\" (\"READ\", \"MODIFY\", \"DELETE\", or \
\"SYSTEM\"), and optional \"description\". Respond with the JSON array only, \
no prose.";

/// Planner backed by an OpenAI-compatible chat completions endpoint.
pub struct LlmPlanner {
    client: Client,
    config: PlannerConfig,
    api_key: String,
}

impl LlmPlanner {
    /// Create a planner from configuration, reading the API key from the
    /// environment variable named in `config.api_key_env`.
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| PlannerError::RequestFailed {
                message: format!("environment variable '{}' not set", config.api_key_env),
            })?;
        Ok(Self {
            client: Client::new(),
            config,
            api_key,
        })
    }

    /// Parse the model's reply into steps, tolerating code fences.
    fn parse_steps(&self, content: &str) -> Result<Vec<PlanStep>, PlannerError> {
        let trimmed = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        let steps: Vec<PlanStep> =
            serde_json::from_str(trimmed).map_err(|e| PlannerError::InvalidPlan {
                message: format!("{e}: {}", truncated(trimmed, 120)),
            })?;

        if steps.len() > self.config.max_steps {
            warn!(
                steps = steps.len(),
                max = self.config.max_steps,
                "Planner returned more steps than allowed; truncating"
            );
            return Ok(steps.into_iter().take(self.config.max_steps).collect());
        }
        Ok(steps)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, goal: &str) -> Result<Vec<PlanStep>, PlannerError> {
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": PLAN_SYSTEM_PROMPT },
                { "role": "user", "content": goal },
            ],
        });

        debug!(model = %self.config.model, goal = goal, "Requesting plan");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlannerError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PlannerError::RequestFailed {
                message: format!("HTTP {status}: {}", truncated(&text, 200)),
            });
        }

        let payload: Value = response.json().await.map_err(|e| PlannerError::RequestFailed {
            message: e.to_string(),
        })?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| PlannerError::InvalidPlan {
                message: "response has no message content".to_string(),
            })?;

        self.parse_steps(content)
    }
}

fn truncated(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}..", &s[..idx]),
        None => s.to_string(),
    }
}
