//! Task type: the atomic unit of work routed by the orchestrator.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Priority;

/// The closed set of task kinds the orchestrator knows how to route.
///
/// Modeled as a tagged variant over the payload rather than a bare string so
/// that `payload` and `task_type` can never disagree (design note §9,
/// "Dynamic typing / schemaless payloads").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    AgentAction {
        action: String,
        params: serde_json::Value,
    },
    LlmChat {
        messages: Vec<serde_json::Value>,
        #[serde(default)]
        options: serde_json::Value,
    },
    EvolutionCrossover {
        parent_a: String,
        parent_b: String,
    },
    EvolutionMutation {
        genome: serde_json::Value,
    },
    CodeGeneration {
        prompt: String,
        #[serde(default)]
        language: Option<String>,
    },
    ShellExec(ShellPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellPayload {
    pub command: String,
    pub working_dir: String,
}

impl Payload {
    /// The `task_type` tag this payload corresponds to.
    pub fn task_type(&self) -> TaskType {
        match self {
            Payload::AgentAction { .. } => TaskType::AgentAction,
            Payload::LlmChat { .. } => TaskType::LlmChat,
            Payload::EvolutionCrossover { .. } => TaskType::EvolutionCrossover,
            Payload::EvolutionMutation { .. } => TaskType::EvolutionMutation,
            Payload::CodeGeneration { .. } => TaskType::CodeGeneration,
            Payload::ShellExec(_) => TaskType::ShellExec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    AgentAction,
    LlmChat,
    EvolutionCrossover,
    EvolutionMutation,
    CodeGeneration,
    ShellExec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
    TimedOut,
}

impl TaskStatus {
    /// Terminal statuses never transition further (spec §3 invariant).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub payload: Payload,
    pub priority: Priority,
    pub required_capabilities: BTreeSet<String>,
    pub status: TaskStatus,
    pub assigned_worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub attempt_count: u32,
}

impl Task {
    pub fn new(payload: Payload, priority: Priority, required_capabilities: BTreeSet<String>) -> Self {
        Self {
            task_id: Uuid::now_v7().to_string(),
            payload,
            priority: super::clamp_priority(priority),
            required_capabilities,
            status: TaskStatus::Pending,
            assigned_worker_id: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
            result: None,
            failure_reason: None,
            attempt_count: 0,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_matches_payload() {
        let task = Task::new(
            Payload::LlmChat {
                messages: vec![],
                options: serde_json::Value::Null,
            },
            5,
            BTreeSet::new(),
        );
        assert_eq!(task.task_type(), TaskType::LlmChat);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempt_count, 0);
    }

    #[test]
    fn priority_is_clamped() {
        let task = Task::new(Payload::EvolutionMutation { genome: serde_json::Value::Null }, 255, BTreeSet::new());
        assert_eq!(task.priority, 10);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::TimedOut.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
    }
}
