//! Browser hand-off tool. Opening a URL in the system browser is the only
//! browser operation implemented; everything else is out of scope.

use crate::registry::Tool;
use async_trait::async_trait;
use std::time::Duration;
use steward_core::error::ToolError;
use steward_core::types::{RiskLevel, ToolOutput};
use tracing::info;

/// Open a URL in the default system browser.
pub struct UrlOpenTool;

#[async_trait]
impl Tool for UrlOpenTool {
    fn name(&self) -> &str {
        "url_open"
    }

    fn description(&self) -> &str {
        "Open a URL in the default system browser."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to open"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                name: "url_open".into(),
                reason: "'url' parameter is required".into(),
            })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments {
                name: "url_open".into(),
                reason: format!("'{}' is not an http(s) URL", url),
            });
        }

        info!(url = url, "Opening URL in system browser");
        let url_owned = url.to_string();
        tokio::task::spawn_blocking(move || open::that(&url_owned))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: "url_open".into(),
                message: format!("Browser task failed: {}", e),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                name: "url_open".into(),
                message: format!("Failed to open browser: {}", e),
            })?;

        Ok(ToolOutput::text(format!("Opened {}", url)))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Read
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}
