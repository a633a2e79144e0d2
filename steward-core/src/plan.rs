//! Plan data model — steps proposed by a planner and their results.
//!
//! A plan is created once per run. Its status only ever moves forward
//! (pending → running → terminal); attempts to move backward are ignored.

use crate::types::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of work inside a plan. Immutable once created by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique within the owning plan.
    pub id: String,
    pub tool_name: String,
    /// Opaque key/value parameters, validated before any tool sees them.
    #[serde(default)]
    pub params: serde_json::Value,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PlanStep {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        params: serde_json::Value,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            params,
            risk_level,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Lifecycle state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    /// Position in the forward-only ordering. Terminal states share rank.
    fn rank(self) -> u8 {
        match self {
            PlanStatus::Pending => 0,
            PlanStatus::Running => 1,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::Running => write!(f, "running"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Failed => write!(f, "failed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An ordered sequence of steps for a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub task_id: Uuid,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionPlan {
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            goal: goal.into(),
            steps,
            status: PlanStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the lifecycle. Backward transitions and transitions out of a
    /// terminal state are ignored, keeping the status monotonic.
    pub fn transition(&mut self, next: PlanStatus) -> bool {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// The subset of steps that always require confirmation.
    pub fn dangerous_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.risk_level.is_dangerous())
            .collect()
    }
}

/// The outcome of one step. Appended as the engine progresses; never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn ok(step_id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}
