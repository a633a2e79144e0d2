//! Configuration system for Steward.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment -> explicit overrides. Configuration is
//! loaded from `~/.config/steward/config.toml` and/or `.steward/config.toml`
//! in the workspace directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::RiskLevel;

/// Top-level configuration for the Steward agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StewardConfig {
    pub permission: PermissionConfig,
    pub rate_limit: RateLimitConfig,
    pub engine: EngineConfig,
    pub orchestrator: OrchestratorConfig,
    pub router: RouterConfig,
    pub planner: PlannerConfig,
}

/// Policy configuration for the permission evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Command substrings that are always denied (matched case-insensitively).
    pub denied_commands: Vec<String>,
    /// If non-empty, a shell command must start with one of these prefixes.
    pub allowed_commands: Vec<String>,
    /// Path prefixes that are always denied.
    pub denied_paths: Vec<String>,
    /// If non-empty, a path must start with one of these prefixes.
    pub allowed_paths: Vec<String>,
    /// Domain substrings that are always denied.
    pub denied_domains: Vec<String>,
    /// If non-empty, a URL hostname must contain one of these.
    pub allowed_domains: Vec<String>,
    /// Risk tiers that bypass interactive confirmation.
    pub auto_approve: Vec<RiskLevel>,
    /// Risk tiers that always require interactive confirmation.
    pub require_confirmation: Vec<RiskLevel>,
    /// What happens to tiers listed in neither set.
    pub deny_by_default: bool,
    /// Idle time after which session approval counters reset.
    pub session_timeout_ms: u64,
    /// Maximum interactive approvals per tool per session window.
    pub session_max_approvals: usize,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            denied_commands: vec![
                "sudo".to_string(),
                "rm -rf /".to_string(),
                "mkfs".to_string(),
                "dd if=".to_string(),
                "curl | sh".to_string(),
                "wget | bash".to_string(),
                "shutdown".to_string(),
                "reboot".to_string(),
            ],
            allowed_commands: Vec::new(),
            denied_paths: vec![
                "/etc".to_string(),
                "/boot".to_string(),
                "/sys".to_string(),
                ".ssh".to_string(),
                ".env".to_string(),
            ],
            allowed_paths: Vec::new(),
            denied_domains: vec!["169.254.169.254".to_string()],
            allowed_domains: Vec::new(),
            auto_approve: vec![RiskLevel::Read, RiskLevel::Modify],
            require_confirmation: vec![RiskLevel::Delete, RiskLevel::System],
            deny_by_default: false,
            session_timeout_ms: 300_000,
            session_max_approvals: 100,
        }
    }
}

/// Rate limit applied to a single tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToolRateLimit {
    pub max_calls: usize,
    pub window_ms: u64,
}

/// Per-tool sliding-window call budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Applied to tools without an explicit override.
    pub default_max_calls: usize,
    pub default_window_ms: u64,
    /// Tool-specific overrides keyed by tool name.
    #[serde(default)]
    pub overrides: HashMap<String, ToolRateLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert(
            "shell_execute".to_string(),
            ToolRateLimit {
                max_calls: 20,
                window_ms: 60_000,
            },
        );
        overrides.insert(
            "file_read".to_string(),
            ToolRateLimit {
                max_calls: 200,
                window_ms: 60_000,
            },
        );
        Self {
            default_max_calls: 100,
            default_window_ms: 60_000,
            overrides,
        }
    }
}

/// Configuration for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard timeout racing every planner/executor invocation.
    pub call_timeout_ms: u64,
    /// Execute independent steps in concurrency-limited batches.
    pub parallel: bool,
    /// Batch size for independent steps.
    pub max_parallel: usize,
    /// Tools whose steps are never parallelized (mutating operations).
    pub dependent_tools: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            parallel: false,
            max_parallel: 4,
            dependent_tools: vec![
                "file_write".to_string(),
                "file_delete".to_string(),
                "file_move".to_string(),
                "shell_execute".to_string(),
            ],
        }
    }
}

/// Configuration for the tool orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-call execution timeout.
    pub timeout_ms: u64,
    /// Retries for transient failures (timeouts and execution errors).
    pub retry_count: usize,
    /// Fixed delay between retries.
    pub retry_delay_ms: u64,
    /// Batch size for `execute_parallel`.
    pub max_parallel_calls: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry_count: 2,
            retry_delay_ms: 1_000,
            max_parallel_calls: 4,
        }
    }
}

/// A user-supplied classification rule, checked before the built-in rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRuleConfig {
    /// Intent name: chat, system_query, file_operation, shell_command, complex_task.
    pub intent: String,
    /// Regex patterns, any of which matches the rule.
    pub patterns: Vec<String>,
    /// Query type carried by system_query rules (cpu, memory, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,
}

/// Configuration for the intent router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Inputs shorter than this fall back to chat instead of complex_task.
    pub short_input_threshold: usize,
    /// Minimum score for the keyword matcher to accept a tool match.
    pub match_threshold: f64,
    /// Custom rules, consulted before the built-in rule list.
    #[serde(default)]
    pub custom_rules: Vec<IntentRuleConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            short_input_threshold: 20,
            match_threshold: 0.75,
            custom_rules: Vec::new(),
        }
    }
}

/// Configuration for the LLM-backed planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    /// Upper bound on steps accepted from the planner.
    pub max_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "STEWARD_API_KEY".to_string(),
            temperature: 0.2,
            max_steps: 20,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `STEWARD_`)
/// 3. Workspace-local config (`.steward/config.toml`)
/// 4. User config (`~/.config/steward/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&StewardConfig>,
) -> Result<StewardConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(StewardConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "steward", "steward") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".steward").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (STEWARD_ENGINE__PARALLEL, STEWARD_PLANNER__MODEL, etc.)
    figment = figment.merge(Env::prefixed("STEWARD_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
