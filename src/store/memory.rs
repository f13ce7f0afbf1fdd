use super::{AgentFilter, AgentPatch, MessageFilter, Store, TaskAgentTransition, TaskPatch};
use crate::models::{
    Agent, AgentTask, AlertRule, AlertTrigger, Channel, LinearIssue, LinearProject,
    LinearWorkflowState, Message, Priority, PriorityFilter,
};
use crate::security::EncryptionKey;
use crate::{constants, FleetError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    agents: HashMap<String, Agent>,
    tasks: HashMap<String, AgentTask>,
    alert_rules: HashMap<String, AlertRule>,
    messages: Vec<StoredMessage>,
    linear_projects: HashMap<String, LinearProject>,
    linear_issues: HashMap<String, LinearIssue>,
    linear_workflow_states: HashMap<String, LinearWorkflowState>,
}

struct StoredMessage {
    id: u64,
    message_type: String,
    ciphertext: String,
    todo_id: Option<String>,
    session_id: Option<String>,
    project_id: Option<String>,
    read: bool,
    created_at: i64,
}

/// Single-process transactional store. All mutation goes through one
/// `tokio::sync::RwLock`, so a write holding the lock observes (and
/// commits) a consistent snapshot across tables — this is the in-memory
/// stand-in for the `withTx` scope described for the host engine.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    next_message_id: AtomicU64,
    encryption_key: EncryptionKey,
}

impl InMemoryStore {
    pub fn new(encryption_key: EncryptionKey) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_message_id: AtomicU64::new(1),
            encryption_key,
        }
    }

    fn now() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn decode_message(&self, stored: &StoredMessage) -> Result<Message> {
        Ok(Message {
            id: stored.id,
            message_type: stored.message_type.clone(),
            content: self.encryption_key.decrypt(&stored.ciphertext)?,
            todo_id: stored.todo_id.clone(),
            session_id: stored.session_id.clone(),
            project_id: stored.project_id.clone(),
            read: stored.read,
            created_at: stored.created_at,
        })
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(id).cloned())
    }

    async fn list_agents(&self, filter: AgentFilter) -> Result<Vec<Agent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .agents
            .values()
            .filter(|a| filter.status.map(|s| s == a.status).unwrap_or(true))
            .filter(|a| {
                filter
                    .agent_type
                    .map(|t| t == a.agent_type)
                    .unwrap_or(true)
            })
            .filter(|a| {
                filter
                    .parent_agent_id
                    .as_ref()
                    .map(|p| a.parent_agent_id.as_deref() == Some(p.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn create_agent(&self, agent: Agent) -> Result<Agent> {
        let mut tables = self.tables.write().await;
        if tables.agents.contains_key(&agent.id) {
            return Err(FleetError::Conflict(format!(
                "agent '{}' already exists",
                agent.id
            )));
        }
        tables.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn update_agent(&self, id: &str, patch: AgentPatch) -> Result<Agent> {
        let mut tables = self.tables.write().await;
        let agent = tables
            .agents
            .get_mut(id)
            .ok_or_else(|| FleetError::NotFound(format!("agent '{id}' not found")))?;
        apply_agent_patch(agent, patch);
        Ok(agent.clone())
    }

    async fn delete_agent(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.agents.remove(id).is_none() {
            return Err(FleetError::NotFound(format!("agent '{id}' not found")));
        }
        tables.tasks.retain(|_, t| t.agent_id != id);
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<AgentTask>> {
        Ok(self.tables.read().await.tasks.get(id).cloned())
    }

    async fn list_tasks_by_agent(&self, agent_id: &str) -> Result<Vec<AgentTask>> {
        Ok(self
            .tables
            .read()
            .await
            .tasks
            .values()
            .filter(|t| t.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: AgentTask) -> Result<AgentTask> {
        let mut tables = self.tables.write().await;
        if tables.tasks.contains_key(&task.id) {
            return Err(FleetError::Conflict(format!(
                "task '{}' already exists",
                task.id
            )));
        }
        tables.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<AgentTask> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(id)
            .ok_or_else(|| FleetError::NotFound(format!("task '{id}' not found")))?;
        apply_task_patch(task, patch, Self::now());
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| FleetError::NotFound(format!("task '{id}' not found")))
    }

    async fn transition_task_and_agent(
        &self,
        task_id: &str,
        task_patch: TaskPatch,
        agent_id: &str,
        agent_patch: AgentPatch,
    ) -> Result<TaskAgentTransition> {
        let mut tables = self.tables.write().await;
        {
            let task = tables
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| FleetError::NotFound(format!("task '{task_id}' not found")))?;
            apply_task_patch(task, task_patch, Self::now());
        }
        let agent = tables
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| FleetError::NotFound(format!("agent '{agent_id}' not found")))?;
        apply_agent_patch(agent, agent_patch);
        let agent = agent.clone();
        let task = tables.tasks.get(task_id).cloned().expect("checked above");
        Ok(TaskAgentTransition { task, agent })
    }

    async fn seed_default_alert_rules(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.alert_rules.is_empty() {
            return Ok(());
        }
        for rule in default_alert_rules() {
            tables.alert_rules.insert(rule.id.clone(), rule);
        }
        Ok(())
    }

    async fn list_alert_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.tables.read().await.alert_rules.values().cloned().collect())
    }

    async fn list_alert_rules_for(
        &self,
        trigger: AlertTrigger,
        priority: Priority,
    ) -> Result<Vec<AlertRule>> {
        Ok(self
            .tables
            .read()
            .await
            .alert_rules
            .values()
            .filter(|r| r.enabled && r.trigger == trigger && r.priority_filter.matches(priority))
            .cloned()
            .collect())
    }

    async fn upsert_alert_rule(&self, rule: AlertRule) -> Result<AlertRule> {
        let mut tables = self.tables.write().await;
        tables.alert_rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    async fn delete_alert_rule(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .alert_rules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| FleetError::NotFound(format!("alert rule '{id}' not found")))
    }

    async fn create_message(
        &self,
        message_type: &str,
        content: &str,
        todo_id: Option<String>,
        session_id: Option<String>,
        project_id: Option<String>,
    ) -> Result<u64> {
        let ciphertext = self.encryption_key.encrypt(content)?;
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().await;
        tables.messages.push(StoredMessage {
            id,
            message_type: message_type.to_string(),
            ciphertext,
            todo_id,
            session_id,
            project_id,
            read: false,
            created_at: Self::now(),
        });
        Ok(id)
    }

    async fn list_messages(&self, filter: MessageFilter) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut out = Vec::new();
        for stored in tables.messages.iter().rev() {
            if filter.unread_only && stored.read {
                continue;
            }
            if let Some(project_id) = &filter.project_id {
                if stored.project_id.as_deref() != Some(project_id.as_str()) {
                    continue;
                }
            }
            out.push(self.decode_message(stored)?);
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn mark_message_read(&self, id: u64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| FleetError::NotFound(format!("message '{id}' not found")))?;
        message.read = true;
        Ok(())
    }

    async fn upsert_linear_project(&self, project: LinearProject) -> Result<LinearProject> {
        let mut tables = self.tables.write().await;
        tables
            .linear_projects
            .insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn upsert_linear_issue(&self, mut issue: LinearIssue) -> Result<LinearIssue> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.linear_issues.get(&issue.id) {
            if issue.agent_task_id.is_none() {
                issue.agent_task_id = existing.agent_task_id.clone();
            }
        }
        tables.linear_issues.insert(issue.id.clone(), issue.clone());
        Ok(issue)
    }

    async fn get_linear_issue(&self, id: &str) -> Result<Option<LinearIssue>> {
        Ok(self.tables.read().await.linear_issues.get(id).cloned())
    }

    async fn delete_linear_issue(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.linear_issues.remove(id);
        Ok(())
    }

    async fn upsert_linear_workflow_state(
        &self,
        state: LinearWorkflowState,
    ) -> Result<LinearWorkflowState> {
        let mut tables = self.tables.write().await;
        tables
            .linear_workflow_states
            .insert(state.id.clone(), state.clone());
        Ok(state)
    }

    async fn link_linear_issue_to_task(&self, issue_id: &str, task_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let issue = tables
            .linear_issues
            .get_mut(issue_id)
            .ok_or_else(|| FleetError::NotFound(format!("linear issue '{issue_id}' not found")))?;
        issue.agent_task_id = Some(task_id.to_string());
        Ok(())
    }
}

fn apply_agent_patch(agent: &mut Agent, patch: AgentPatch) {
    if let Some(name) = patch.name {
        agent.name = name;
    }
    if let Some(status) = patch.status {
        agent.status = status;
    }
    if let Some(current_task_id) = patch.current_task_id {
        agent.current_task_id = current_task_id;
    }
    if let Some(last_heartbeat) = patch.last_heartbeat {
        agent.last_heartbeat = last_heartbeat;
    }
    if let Some(soul_md) = patch.soul_md {
        agent.soul_md = soul_md;
    }
    if let Some(skills) = patch.skills {
        agent.skills = skills;
    }
}

fn apply_task_patch(task: &mut AgentTask, patch: TaskPatch, now: i64) {
    if let Some(status) = patch.status {
        if status == crate::models::TaskStatus::InProgress && task.started_at.is_none() {
            task.started_at = Some(now);
        }
        task.status = status;
    }
    if let Some(blocked_reason) = patch.blocked_reason {
        task.blocked_reason = blocked_reason;
    }
    if let Some(blocked_at) = patch.blocked_at {
        task.blocked_at = blocked_at;
    }
    if let Some(started_at) = patch.started_at {
        task.started_at = started_at;
    }
    if let Some(completed_at) = patch.completed_at {
        task.completed_at = completed_at;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    task.updated_at = now;
}

fn default_alert_rules() -> Vec<AlertRule> {
    use AlertTrigger::*;
    use PriorityFilter::*;
    vec![
        rule("blocked-high", Blocked, High, 0, Channel::Both),
        rule(
            "blocked-medium",
            Blocked,
            Medium,
            constants::DELAY_BLOCKED_MEDIUM_MS,
            Channel::Both,
        ),
        rule(
            "blocked-low",
            Blocked,
            Low,
            constants::DELAY_BLOCKED_LOW_MS,
            Channel::InApp,
        ),
        rule("error-all", Error, All, 0, Channel::Both),
        rule("completed-high", Completed, High, 0, Channel::InApp),
        rule(
            "completed-batch-medium",
            Completed,
            Medium,
            constants::DELAY_COMPLETED_BATCH_MS,
            Channel::InApp,
        ),
        rule(
            "completed-batch-low",
            Completed,
            Low,
            constants::DELAY_COMPLETED_BATCH_MS,
            Channel::InApp,
        ),
        rule(
            "idle-all",
            IdleTooLong,
            All,
            constants::DELAY_IDLE_ALL_MS,
            Channel::InApp,
        ),
        rule(
            "stale-all",
            StaleTask,
            All,
            constants::DELAY_STALE_ALL_MS,
            Channel::Push,
        ),
    ]
}

fn rule(
    id: &str,
    trigger: AlertTrigger,
    priority_filter: PriorityFilter,
    delay_ms: u64,
    channel: Channel,
) -> AlertRule {
    AlertRule {
        id: id.to_string(),
        trigger,
        priority_filter,
        delay_ms,
        channel,
        enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentStatus, AgentType, TaskStatus};
    use std::collections::HashMap as Map;

    fn test_store() -> InMemoryStore {
        let tmp = tempfile::tempdir().unwrap();
        let key = crate::security::load_or_generate_encryption_key(tmp.path()).unwrap();
        InMemoryStore::new(key)
    }

    fn sample_agent(id: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: id.to_string(),
            agent_type: AgentType::Primary,
            parent_agent_id: None,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat: None,
            soul_md: None,
            skills: vec![],
            config: Map::new(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn create_agent_rejects_duplicate_id() {
        let store = test_store();
        store.create_agent(sample_agent("a1")).await.unwrap();
        let err = store.create_agent(sample_agent("a1")).await.unwrap_err();
        assert!(matches!(err, FleetError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_agent_missing_is_not_found() {
        let store = test_store();
        let err = store
            .update_agent("missing", AgentPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_agent_cascades_tasks() {
        let store = test_store();
        store.create_agent(sample_agent("a1")).await.unwrap();
        store
            .create_task(AgentTask {
                id: "t1".to_string(),
                agent_id: "a1".to_string(),
                linear_issue_id: None,
                project_id: None,
                title: "work".to_string(),
                status: TaskStatus::Pending,
                priority: Priority::Medium,
                blocked_reason: None,
                blocked_at: None,
                started_at: None,
                completed_at: None,
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();

        store.delete_agent("a1").await.unwrap();

        assert!(store.get_task("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transition_task_and_agent_commits_both_or_neither() {
        let store = test_store();
        store.create_agent(sample_agent("a1")).await.unwrap();
        store
            .create_task(AgentTask {
                id: "t1".to_string(),
                agent_id: "a1".to_string(),
                linear_issue_id: None,
                project_id: None,
                title: "work".to_string(),
                status: TaskStatus::InProgress,
                priority: Priority::Medium,
                blocked_reason: None,
                blocked_at: None,
                started_at: Some(0),
                completed_at: None,
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();

        let result = store
            .transition_task_and_agent(
                "t1",
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    completed_at: Some(Some(100)),
                    ..Default::default()
                },
                "a1",
                AgentPatch {
                    status: Some(AgentStatus::Idle),
                    current_task_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.task.status, TaskStatus::Completed);
        assert_eq!(result.agent.status, AgentStatus::Idle);
        assert!(result.agent.current_task_id.is_none());
    }

    #[tokio::test]
    async fn message_content_round_trips_encrypted() {
        let store = test_store();
        let id = store
            .create_message("blocked", "needs a key", None, None, None)
            .await
            .unwrap();

        let messages = store.list_messages(MessageFilter::default()).await.unwrap();
        let found = messages.iter().find(|m| m.id == id).unwrap();
        assert_eq!(found.content, "needs a key");
    }

    #[tokio::test]
    async fn seed_default_alert_rules_is_idempotent() {
        let store = test_store();
        store.seed_default_alert_rules().await.unwrap();
        let first = store.list_alert_rules().await.unwrap().len();
        store.seed_default_alert_rules().await.unwrap();
        let second = store.list_alert_rules().await.unwrap().len();
        assert_eq!(first, second);
        assert_eq!(first, 9);
    }

    #[tokio::test]
    async fn upsert_linear_issue_is_last_write_wins_for_present_fields() {
        let store = test_store();
        store
            .upsert_linear_issue(LinearIssue {
                id: "I1".to_string(),
                project_id: Some("P1".to_string()),
                title: "first".to_string(),
                priority: Some(3),
                state_type: None,
                state_name: None,
                assignee_name: None,
                agent_task_id: Some("t1".to_string()),
                updated_at: 0,
            })
            .await
            .unwrap();

        let updated = store
            .upsert_linear_issue(LinearIssue {
                id: "I1".to_string(),
                project_id: Some("P1".to_string()),
                title: "second".to_string(),
                priority: Some(3),
                state_type: None,
                state_name: None,
                assignee_name: None,
                agent_task_id: None,
                updated_at: 1,
            })
            .await
            .unwrap();

        assert_eq!(updated.title, "second");
        assert_eq!(updated.agent_task_id, Some("t1".to_string()));
    }
}
