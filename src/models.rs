use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of a worker. See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub parent_agent_id: Option<String>,
    pub status: AgentStatus,
    pub current_task_id: Option<String>,
    pub last_heartbeat: Option<i64>,
    pub soul_md: Option<String>,
    pub skills: Vec<String>,
    pub config: HashMap<String, serde_json::Value>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Primary,
    SubAgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Blocked,
    Sleeping,
    Offline,
}

/// A unit of work owned by exactly one Agent. See spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub agent_id: String,
    pub linear_issue_id: Option<String>,
    pub project_id: Option<String>,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AgentTask {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Declarative notification policy. See spec §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub trigger: AlertTrigger,
    pub priority_filter: PriorityFilter,
    pub delay_ms: u64,
    pub channel: Channel,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    Blocked,
    Error,
    Completed,
    IdleTooLong,
    StaleTask,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    High,
    Medium,
    Low,
    All,
}

impl PriorityFilter {
    pub fn matches(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::High => priority == Priority::High,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::Low => priority == Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    InApp,
    Both,
}

/// A persisted notification. Content is encrypted at rest by the Store;
/// the rest of the core only ever sees plaintext `Message` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    #[serde(rename = "type")]
    pub message_type: String,
    pub content: String,
    pub todo_id: Option<String>,
    pub session_id: Option<String>,
    pub project_id: Option<String>,
    pub read: bool,
    pub created_at: i64,
}

/// Cached mirror rows for the external issue tracker. Only
/// `LinearIssue.agent_task_id` has control-plane semantics (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearProject {
    pub id: String,
    pub name: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearIssue {
    pub id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub priority: Option<u8>,
    pub state_type: Option<String>,
    pub state_name: Option<String>,
    pub assignee_name: Option<String>,
    pub agent_task_id: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearWorkflowState {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub state_type: String,
}

/// An event fed into the Alert Engine (spec §4.4 "Inputs").
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub trigger: AlertTrigger,
    pub agent_id: String,
    pub task_id: String,
    pub title: String,
    pub priority: Priority,
    pub reason: Option<String>,
    pub project_id: Option<String>,
}

/// Event published on the in-process Event Bus (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardEvent {
    #[serde(rename = "type")]
    pub event_type: DashboardEventType,
    pub payload: serde_json::Value,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DashboardEventType {
    #[serde(rename = "todo:updated")]
    TodoUpdated,
    #[serde(rename = "todo:created")]
    TodoCreated,
    #[serde(rename = "todo:deleted")]
    TodoDeleted,
    #[serde(rename = "message:created")]
    MessageCreated,
    #[serde(rename = "sprint:updated")]
    SprintUpdated,
    #[serde(rename = "sprint:created")]
    SprintCreated,
    #[serde(rename = "agent:status")]
    AgentStatusChanged,
    #[serde(rename = "project:updated")]
    ProjectUpdated,
    /// Synthetic event emitted to a client on connect (spec §4.5).
    Connected,
    /// Emitted when a subscriber's queue dropped events (spec §4.5).
    Resync,
}

/// Sleep-window configuration (spec §4.6.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepScheduleConfig {
    pub start_hour: u8,
    pub end_hour: u8,
    pub timezone: String,
    pub enabled: bool,
}

impl Default for SleepScheduleConfig {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 6,
            timezone: "UTC".to_string(),
            enabled: false,
        }
    }
}
