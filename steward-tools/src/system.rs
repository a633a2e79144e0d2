//! System query tool — the deterministic data source behind the fast path.
//!
//! Each query type maps to a local read (std, /proc, or a short OS command)
//! with no model round-trip. Answers are plain text suitable for direct
//! display or TTL caching.

use crate::registry::Tool;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use steward_core::error::ToolError;
use steward_core::router::QueryType;
use steward_core::types::{RiskLevel, ToolOutput};
use tracing::debug;

/// Answer system queries: cpu, memory, disk, process, time, path, env,
/// network.
pub struct SystemQueryTool {
    workspace: PathBuf,
}

impl SystemQueryTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    async fn answer(&self, query_type: QueryType, args: &serde_json::Value) -> String {
        match query_type {
            QueryType::Time => chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string(),
            QueryType::Path => match std::env::current_dir() {
                Ok(dir) => dir.display().to_string(),
                Err(e) => format!("current directory unavailable: {e}"),
            },
            QueryType::Env => Self::env_answer(args),
            QueryType::Cpu => Self::cpu_answer().await,
            QueryType::Memory => Self::memory_answer().await,
            QueryType::Disk => self.disk_answer().await,
            QueryType::Process => Self::process_answer().await,
            QueryType::Network => Self::network_answer().await,
        }
    }

    fn env_answer(args: &serde_json::Value) -> String {
        if let Some(name) = args["name"].as_str() {
            return match std::env::var(name) {
                Ok(value) => format!("{name}={value}"),
                Err(_) => format!("{name} is not set"),
            };
        }
        let count = std::env::vars().count();
        let mut lines = vec![format!("{count} environment variables set")];
        for name in ["HOME", "USER", "SHELL", "PATH", "LANG"] {
            if let Ok(value) = std::env::var(name) {
                lines.push(format!("{name}={value}"));
            }
        }
        lines.join("\n")
    }

    async fn cpu_answer() -> String {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match tokio::fs::read_to_string("/proc/loadavg").await {
            Ok(loadavg) => {
                let fields: Vec<&str> = loadavg.split_whitespace().take(3).collect();
                format!("{cores} cores, load average: {}", fields.join(" "))
            }
            Err(_) => format!("{cores} cores"),
        }
    }

    async fn memory_answer() -> String {
        match tokio::fs::read_to_string("/proc/meminfo").await {
            Ok(meminfo) => {
                let field = |key: &str| {
                    meminfo
                        .lines()
                        .find(|l| l.starts_with(key))
                        .and_then(|l| l.split_whitespace().nth(1))
                        .and_then(|v| v.parse::<u64>().ok())
                };
                match (field("MemTotal:"), field("MemAvailable:")) {
                    (Some(total), Some(available)) => format!(
                        "memory: {} MiB total, {} MiB available",
                        total / 1024,
                        available / 1024
                    ),
                    _ => "memory info unavailable".to_string(),
                }
            }
            Err(_) => "memory info unavailable".to_string(),
        }
    }

    async fn disk_answer(&self) -> String {
        run_command("df", &["-h", &self.workspace.display().to_string()])
            .await
            .unwrap_or_else(|| "disk info unavailable".to_string())
    }

    async fn process_answer() -> String {
        match run_command("ps", &["-eo", "pid,comm,%cpu", "--sort=-%cpu"]).await {
            Some(output) => {
                let top: Vec<&str> = output.lines().take(11).collect();
                top.join("\n")
            }
            None => "process info unavailable".to_string(),
        }
    }

    async fn network_answer() -> String {
        let hostname = tokio::fs::read_to_string("/proc/sys/kernel/hostname")
            .await
            .map(|h| h.trim().to_string())
            .ok();
        let addresses = run_command("ip", &["-brief", "addr"]).await;
        match (hostname, addresses) {
            (Some(host), Some(addrs)) => format!("hostname: {host}\n{addrs}"),
            (Some(host), None) => format!("hostname: {host}"),
            (None, Some(addrs)) => addrs,
            (None, None) => "network info unavailable".to_string(),
        }
    }
}

/// Run a short OS command, returning its trimmed stdout on success.
async fn run_command(program: &str, args: &[&str]) -> Option<String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Tool for SystemQueryTool {
    fn name(&self) -> &str {
        "system_query"
    }

    fn description(&self) -> &str {
        "Answer a deterministic system query: cpu, memory, disk, process, time, path, env, or network."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query_type": {
                    "type": "string",
                    "enum": ["cpu", "memory", "disk", "process", "time", "path", "env", "network"],
                    "description": "Which system datum to fetch"
                },
                "name": {
                    "type": "string",
                    "description": "Environment variable name (env queries only)"
                }
            },
            "required": ["query_type"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let raw = args["query_type"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                name: "system_query".into(),
                reason: "'query_type' parameter is required".into(),
            })?;
        let query_type = QueryType::parse(raw).ok_or_else(|| ToolError::InvalidArguments {
            name: "system_query".into(),
            reason: format!("unknown query type '{}'", raw),
        })?;

        debug!(query_type = raw, "Answering system query");
        let answer = self.answer(query_type, &args).await;
        Ok(ToolOutput::text(answer).with_metadata("query_type", serde_json::json!(raw)))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Read
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> SystemQueryTool {
        SystemQueryTool::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_time_query() {
        let result = tool()
            .execute(serde_json::json!({"query_type": "time"}))
            .await
            .unwrap();
        // A formatted timestamp containing the current year.
        let year = chrono::Local::now().format("%Y").to_string();
        assert!(result.content.contains(&year));
    }

    #[tokio::test]
    async fn test_path_query() {
        let result = tool()
            .execute(serde_json::json!({"query_type": "path"}))
            .await
            .unwrap();
        assert!(!result.content.is_empty());
    }

    #[tokio::test]
    async fn test_env_query_specific_variable() {
        std::env::set_var("STEWARD_TEST_VAR", "42");
        let result = tool()
            .execute(serde_json::json!({"query_type": "env", "name": "STEWARD_TEST_VAR"}))
            .await
            .unwrap();
        assert_eq!(result.content, "STEWARD_TEST_VAR=42");
    }

    #[tokio::test]
    async fn test_env_query_missing_variable() {
        let result = tool()
            .execute(serde_json::json!({"query_type": "env", "name": "STEWARD_NO_SUCH_VAR"}))
            .await
            .unwrap();
        assert!(result.content.contains("not set"));
    }

    #[tokio::test]
    async fn test_cpu_query_reports_cores() {
        let result = tool()
            .execute(serde_json::json!({"query_type": "cpu"}))
            .await
            .unwrap();
        assert!(result.content.contains("cores"));
    }

    #[tokio::test]
    async fn test_unknown_query_type() {
        let result = tool()
            .execute(serde_json::json!({"query_type": "gpu"}))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            ToolError::InvalidArguments { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_query_type() {
        let result = tool().execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_properties() {
        let t = tool();
        assert_eq!(t.name(), "system_query");
        assert_eq!(t.risk_level(), RiskLevel::Read);
        let schema = t.parameters_schema();
        assert!(schema["properties"]["query_type"]["enum"].is_array());
    }
}
