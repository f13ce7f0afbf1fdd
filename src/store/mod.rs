//! Typed, transactional access to the entities of the control plane.
//! The trait exposes only named operations the rest of the crate actually
//! uses; no generic query language or raw SQL ever escapes this module.
mod memory;

pub use memory::InMemoryStore;

use crate::models::{
    Agent, AgentStatus, AgentTask, AgentType, AlertRule, AlertTrigger, LinearIssue, LinearProject,
    LinearWorkflowState, Message,
};
use crate::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub status: Option<AgentStatus>,
    pub agent_type: Option<AgentType>,
    pub parent_agent_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub status: Option<AgentStatus>,
    pub current_task_id: Option<Option<String>>,
    pub last_heartbeat: Option<Option<i64>>,
    pub soul_md: Option<Option<String>>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<crate::models::TaskStatus>,
    pub blocked_reason: Option<Option<String>>,
    pub blocked_at: Option<Option<i64>>,
    pub started_at: Option<Option<i64>>,
    pub completed_at: Option<Option<i64>>,
    pub priority: Option<crate::models::Priority>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub project_id: Option<String>,
    pub unread_only: bool,
    pub limit: Option<usize>,
}

/// Compound result of a cross-entity transition that must commit atomically
/// (spec §4.2: "Cross-entity compound operations ... must execute inside a
/// single transaction").
pub struct TaskAgentTransition {
    pub task: AgentTask,
    pub agent: Agent,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>>;
    async fn list_agents(&self, filter: AgentFilter) -> Result<Vec<Agent>>;
    async fn create_agent(&self, agent: Agent) -> Result<Agent>;
    async fn update_agent(&self, id: &str, patch: AgentPatch) -> Result<Agent>;
    async fn delete_agent(&self, id: &str) -> Result<()>;

    async fn get_task(&self, id: &str) -> Result<Option<AgentTask>>;
    async fn list_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<AgentTask>>;
    async fn create_task(&self, task: AgentTask) -> Result<AgentTask>;
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<AgentTask>;
    async fn delete_task(&self, id: &str) -> Result<()>;

    /// Atomically transitions a task and its owning agent together, so a
    /// reader never observes one without the other (spec §4.6.5, §4.6.8).
    async fn transition_task_and_agent(
        &self,
        task_id: &str,
        task_patch: TaskPatch,
        agent_id: &str,
        agent_patch: AgentPatch,
    ) -> Result<TaskAgentTransition>;

    async fn seed_default_alert_rules(&self) -> Result<()>;
    async fn list_alert_rules(&self) -> Result<Vec<AlertRule>>;
    async fn list_alert_rules_for(
        &self,
        trigger: AlertTrigger,
        priority: crate::models::Priority,
    ) -> Result<Vec<AlertRule>>;
    async fn upsert_alert_rule(&self, rule: AlertRule) -> Result<AlertRule>;
    async fn delete_alert_rule(&self, id: &str) -> Result<()>;

    async fn create_message(
        &self,
        message_type: &str,
        content: &str,
        todo_id: Option<String>,
        session_id: Option<String>,
        project_id: Option<String>,
    ) -> Result<u64>;
    async fn list_messages(&self, filter: MessageFilter) -> Result<Vec<Message>>;
    async fn mark_message_read(&self, id: u64) -> Result<()>;

    async fn upsert_linear_project(&self, project: LinearProject) -> Result<LinearProject>;
    async fn upsert_linear_issue(&self, issue: LinearIssue) -> Result<LinearIssue>;
    async fn get_linear_issue(&self, id: &str) -> Result<Option<LinearIssue>>;
    async fn delete_linear_issue(&self, id: &str) -> Result<()>;
    async fn upsert_linear_workflow_state(
        &self,
        state: LinearWorkflowState,
    ) -> Result<LinearWorkflowState>;
    async fn link_linear_issue_to_task(&self, issue_id: &str, task_id: &str) -> Result<()>;
}
