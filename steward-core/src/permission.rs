//! Risk & permission evaluator — gates every tool action.
//!
//! Evaluation layers, in order, short-circuiting on the first denial:
//! 1. Command denylist/allowlist (shell targets)
//! 2. Path denylist/allowlist (filesystem targets)
//! 3. Domain denylist/allowlist (URL targets)
//! 4. Risk-tier confirmation policy
//! 5. Session approval quota
//! 6. Interactive confirmation callback (fail-closed when absent)

use crate::config::PermissionConfig;
use crate::types::{ActionKind, PermissionRequest, PermissionResult, RiskLevel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Callback used to ask the user about a gated action.
#[async_trait::async_trait]
pub trait ConfirmCallback: Send + Sync {
    async fn confirm(&self, request: &PermissionRequest) -> bool;
}

/// A callback that always answers the same way. Useful for tests and
/// non-interactive runs.
pub struct AutoConfirm {
    pub answer: bool,
}

#[async_trait::async_trait]
impl ConfirmCallback for AutoConfirm {
    async fn confirm(&self, _request: &PermissionRequest) -> bool {
        self.answer
    }
}

/// Per-tool approval bookkeeping for the current session window.
#[derive(Debug)]
struct SessionApproval {
    approvals: usize,
    last_activity: Instant,
}

/// The permission evaluator.
///
/// Owns the session approval map — the only mutable state here. Callers in
/// concurrent contexts wrap the evaluator in a mutex; evaluation itself is
/// single-writer.
pub struct PermissionEvaluator {
    config: PermissionConfig,
    sessions: HashMap<String, SessionApproval>,
    callback: Option<Arc<dyn ConfirmCallback>>,
}

impl PermissionEvaluator {
    pub fn new(config: PermissionConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            callback: None,
        }
    }

    /// Register the interactive confirmation callback.
    pub fn set_callback(&mut self, callback: Arc<dyn ConfirmCallback>) {
        self.callback = Some(callback);
    }

    /// Evaluate a permission request against policy, quotas, and the user.
    pub async fn evaluate(&mut self, request: &PermissionRequest) -> PermissionResult {
        // Layers 1-3: target checks, always applied before tier policy.
        if let Some(reason) = self.check_target(request) {
            debug!(tool = %request.tool_name, reason = %reason, "Permission denied by target check");
            return PermissionResult::denied(reason);
        }

        // Layer 4: risk-tier confirmation policy.
        let tier = request.risk_level;
        if self.config.auto_approve.contains(&tier) {
            return if tier == RiskLevel::Modify {
                PermissionResult::granted_with_backup()
            } else {
                PermissionResult::granted()
            };
        }
        if !self.config.require_confirmation.contains(&tier) {
            return if self.config.deny_by_default {
                PermissionResult::denied(format!("risk tier '{tier}' denied by default policy"))
            } else if tier == RiskLevel::Modify {
                PermissionResult::granted_with_backup()
            } else {
                PermissionResult::granted()
            };
        }

        // Layer 5: session approval quota.
        if let Some(reason) = self.consume_session_quota(&request.tool_name) {
            return PermissionResult::denied(reason);
        }

        // Layer 6: interactive confirmation, fail-closed without a callback.
        let Some(callback) = self.callback.clone() else {
            return PermissionResult::denied("no confirmation callback registered");
        };
        if callback.confirm(request).await {
            if tier == RiskLevel::Modify {
                PermissionResult::granted_with_backup()
            } else {
                PermissionResult::granted()
            }
        } else {
            PermissionResult::denied("user denied")
        }
    }

    /// Check command, path, and domain policies for the request target.
    fn check_target(&self, request: &PermissionRequest) -> Option<String> {
        let target = request.target.as_deref()?;

        if request.action == ActionKind::Shell {
            return self.check_command(target);
        }
        if target.starts_with("http") {
            return self.check_url(target);
        }
        self.check_path(target)
    }

    /// Deny commands containing a denylisted substring, case-insensitively.
    fn check_command(&self, command: &str) -> Option<String> {
        let lower = command.to_lowercase();
        for denied in &self.config.denied_commands {
            if lower.contains(&denied.to_lowercase()) {
                return Some(format!(
                    "command '{command}' matches denied pattern '{denied}'"
                ));
            }
        }
        if !self.config.allowed_commands.is_empty()
            && !self
                .config
                .allowed_commands
                .iter()
                .any(|allowed| lower.starts_with(&allowed.to_lowercase()))
        {
            return Some(format!("command '{command}' is not in the allowed list"));
        }
        None
    }

    /// Deny paths under a denylisted prefix.
    fn check_path(&self, path: &str) -> Option<String> {
        for denied in &self.config.denied_paths {
            if path.starts_with(denied.as_str()) || path.contains(&format!("/{denied}")) {
                return Some(format!("path '{path}' matches denied prefix '{denied}'"));
            }
        }
        if !self.config.allowed_paths.is_empty()
            && !self
                .config
                .allowed_paths
                .iter()
                .any(|allowed| path.starts_with(allowed.as_str()))
        {
            return Some(format!("path '{path}' is not under an allowed prefix"));
        }
        None
    }

    /// Deny URLs whose hostname contains a denylisted domain substring.
    ///
    /// An unparseable URL is treated as allowed and falls through to the
    /// tier policy. This fail-open behavior is preserved from the original
    /// policy; the warning keeps the gap visible in traces.
    fn check_url(&self, target: &str) -> Option<String> {
        let parsed = match url::Url::parse(target) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(target = target, error = %e, "URL failed to parse; domain check skipped");
                return None;
            }
        };
        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        for denied in &self.config.denied_domains {
            if host.contains(&denied.to_lowercase()) {
                return Some(format!("domain '{host}' matches denied domain '{denied}'"));
            }
        }
        if !self.config.allowed_domains.is_empty()
            && !self
                .config
                .allowed_domains
                .iter()
                .any(|allowed| host.contains(&allowed.to_lowercase()))
        {
            return Some(format!("domain '{host}' is not in the allowed list"));
        }
        None
    }

    /// Enforce the per-tool session approval cap, resetting idle sessions.
    fn consume_session_quota(&mut self, tool: &str) -> Option<String> {
        let timeout = Duration::from_millis(self.config.session_timeout_ms);
        let now = Instant::now();
        let session = self
            .sessions
            .entry(tool.to_string())
            .or_insert(SessionApproval {
                approvals: 0,
                last_activity: now,
            });

        if now.duration_since(session.last_activity) > timeout {
            session.approvals = 0;
        }
        session.last_activity = now;

        if session.approvals >= self.config.session_max_approvals {
            return Some(format!(
                "session approval limit ({}) reached for tool '{tool}'",
                self.config.session_max_approvals
            ));
        }
        session.approvals += 1;
        None
    }

    /// Approvals consumed for a tool in the current session window.
    pub fn session_approvals(&self, tool: &str) -> usize {
        self.sessions.get(tool).map(|s| s.approvals).unwrap_or(0)
    }
}
