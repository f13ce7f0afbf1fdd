//! Agent/task state machines, watchdog timers, and block-detection
//! policy (spec §4.6). All mutations for a single agent serialise
//! through a per-agent lock; lock acquisition across distinct agents is
//! ascending by `id` to preclude deadlock (spec §5).
mod sleep_window;

pub use sleep_window::SleepWindow;

use crate::alert::AlertEngine;
use crate::constants::{
    ERROR_BLOCK_THRESHOLD, ERROR_SLEEP_THRESHOLD, ERROR_WINDOW_SECS, IDLE_MONITOR_SECS,
    IDLE_TOO_LONG_SECS,
};
use crate::event_bus::EventBus;
use crate::models::{
    Agent, AgentStatus, AgentTask, AgentType, AlertEvent, AlertTrigger, Channel, DashboardEvent,
    DashboardEventType, Priority, SleepScheduleConfig, TaskStatus,
};
use crate::store::{AgentFilter, AgentPatch, Store, TaskPatch};
use crate::timer::{TimerHandle, TimerService};
use crate::{FleetError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Sources accepted by `detectBlocked` (spec §4.6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSource {
    Explicit,
    Question,
    RepeatedErrors,
    Idle,
    ResourceDenied,
}

impl BlockSource {
    fn label(self) -> &'static str {
        match self {
            BlockSource::Explicit => "explicit",
            BlockSource::Question => "question",
            BlockSource::RepeatedErrors => "repeated_errors",
            BlockSource::Idle => "idle",
            BlockSource::ResourceDenied => "resource_denied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentAction {
    Sleep,
    Stop,
    Unblock,
    Restart,
}

struct ErrorCounter {
    window_start: i64,
    count: u32,
}

pub struct LifecycleManager {
    store: Arc<dyn Store>,
    timers: TimerService,
    bus: Arc<EventBus>,
    alerts: Arc<AlertEngine>,
    pub sleep_window: SleepWindow,
    agent_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    idle_timers: Mutex<HashMap<String, TimerHandle>>,
    error_counters: Mutex<HashMap<(String, String), ErrorCounter>>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        timers: TimerService,
        bus: Arc<EventBus>,
        alerts: Arc<AlertEngine>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            timers,
            bus,
            alerts,
            sleep_window: SleepWindow::new(SleepScheduleConfig::default()),
            agent_locks: Mutex::new(HashMap::new()),
            idle_timers: Mutex::new(HashMap::new()),
            error_counters: Mutex::new(HashMap::new()),
        })
    }

    async fn lock_for(&self, agent_id: &str) -> Arc<AsyncMutex<()>> {
        self.agent_locks
            .lock()
            .unwrap()
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn publish_agent_status(&self, agent_id: &str, action: &str, extra: serde_json::Value) {
        let mut payload = json!({ "agent_id": agent_id, "action": action });
        if let serde_json::Value::Object(extra_map) = extra {
            if let serde_json::Value::Object(map) = &mut payload {
                map.extend(extra_map);
            }
        }
        self.bus.publish(DashboardEvent {
            event_type: DashboardEventType::AgentStatusChanged,
            payload,
            timestamp_ms: self.timers.now_ms(),
        });
    }

    /// Creates an agent in `idle` (spec §4.6.1 `register`).
    pub async fn register(
        &self,
        id: String,
        name: String,
        agent_type: AgentType,
        parent_agent_id: Option<String>,
        soul_md: Option<String>,
        skills: Vec<String>,
    ) -> Result<Agent> {
        let agent = Agent {
            id,
            name,
            agent_type,
            parent_agent_id,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat: None,
            soul_md,
            skills,
            config: Default::default(),
            created_at: self.timers.now(),
        };
        self.store.create_agent(agent).await
    }

    pub async fn list_agents(&self, filter: AgentFilter) -> Result<Vec<Agent>> {
        self.store.list_agents(filter).await
    }

    pub async fn get_agent(&self, id: &str) -> Result<Agent> {
        self.store
            .get_agent(id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("agent '{id}' not found")))
    }

    pub async fn delete_agent(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        self.cancel_idle_timer(id);
        self.store.delete_agent(id).await
    }

    /// `assignTask` (spec §4.6.3).
    #[allow(clippy::too_many_arguments)]
    pub async fn assign_task(
        self: &Arc<Self>,
        agent_id: &str,
        task_id: &str,
        title: String,
        priority: Priority,
        linear_issue_id: Option<String>,
        project_id: Option<String>,
    ) -> Result<AgentTask> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;

        self.get_agent(agent_id).await?;
        let now = self.timers.now();
        let task = AgentTask {
            id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            linear_issue_id: linear_issue_id.clone(),
            project_id,
            title,
            status: TaskStatus::Pending,
            priority,
            blocked_reason: None,
            blocked_at: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let created = self.store.create_task(task).await?;

        self.store
            .update_agent(
                agent_id,
                AgentPatch {
                    status: Some(AgentStatus::Working),
                    current_task_id: Some(Some(task_id.to_string())),
                    last_heartbeat: Some(Some(now)),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(issue_id) = linear_issue_id {
            if let Err(err) = self.store.link_linear_issue_to_task(&issue_id, task_id).await {
                warn!(%issue_id, %task_id, error = %err, "failed to link linear issue to task");
            }
        }

        self.start_idle_monitor(agent_id);
        self.publish_agent_status(agent_id, "task_assigned", json!({ "task_id": task_id }));

        Ok(created)
    }

    /// `refreshHeartbeat` (spec §4.6.7).
    pub async fn refresh_heartbeat(self: &Arc<Self>, agent_id: &str) -> Result<()> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;

        self.store
            .update_agent(
                agent_id,
                AgentPatch {
                    last_heartbeat: Some(Some(self.timers.now())),
                    ..Default::default()
                },
            )
            .await?;
        self.start_idle_monitor(agent_id);
        Ok(())
    }

    fn cancel_idle_timer(&self, agent_id: &str) {
        if let Some(handle) = self.idle_timers.lock().unwrap().remove(agent_id) {
            self.timers.cancel(&handle);
        }
    }

    fn start_idle_monitor(self: &Arc<Self>, agent_id: &str) {
        self.cancel_idle_timer(agent_id);
        let manager = self.clone();
        let agent_id = agent_id.to_string();
        let agent_id_for_timer = agent_id.clone();
        let handle = self
            .timers
            .schedule((IDLE_MONITOR_SECS as u64) * 1000, move || {
                let manager = manager.clone();
                let agent_id = agent_id_for_timer.clone();
                async move {
                    manager.idle_timers.lock().unwrap().remove(&agent_id);
                    manager.on_idle_timer_fire(&agent_id).await;
                }
            });
        self.idle_timers.lock().unwrap().insert(agent_id, handle);
    }

    async fn on_idle_timer_fire(self: &Arc<Self>, agent_id: &str) {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;

        let Ok(Some(agent)) = self.store.get_agent(agent_id).await else {
            return;
        };
        let Some(last_heartbeat) = agent.last_heartbeat else {
            return;
        };
        let now = self.timers.now();
        let silence = now - last_heartbeat;

        if agent.status == AgentStatus::Working
            && silence > IDLE_MONITOR_SECS
            && agent.current_task_id.is_some()
        {
            let task_id = agent.current_task_id.clone().unwrap();
            self.detect_blocked_inner(
                &agent,
                BlockSource::Idle,
                format!("idle {} minutes with in_progress task", silence / 60),
                &task_id,
            )
            .await;
            return;
        }

        if silence > IDLE_TOO_LONG_SECS {
            if let Ok(tasks) = self.store.list_tasks_by_agent(agent_id).await {
                if let Some(first_pending) = tasks.iter().find(|t| t.is_pending()) {
                    self.alerts
                        .process_event(AlertEvent {
                            trigger: AlertTrigger::IdleTooLong,
                            agent_id: agent_id.to_string(),
                            task_id: first_pending.id.clone(),
                            title: first_pending.title.clone(),
                            priority: Priority::Medium,
                            reason: None,
                            project_id: first_pending.project_id.clone(),
                        })
                        .await
                        .ok();
                }
            }
        }
    }

    /// `recordError` (spec §4.6.4). Returns whether a threshold fired.
    pub async fn record_error(self: &Arc<Self>, agent_id: &str, task_id: &str) -> Result<bool> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;

        let now = self.timers.now();
        let key = (agent_id.to_string(), task_id.to_string());
        let (count, elapsed) = {
            let mut counters = self.error_counters.lock().unwrap();
            let entry = counters.entry(key).or_insert(ErrorCounter {
                window_start: now,
                count: 0,
            });
            if now - entry.window_start > ERROR_WINDOW_SECS {
                entry.window_start = now;
                entry.count = 0;
            }
            entry.count += 1;
            (entry.count, now - entry.window_start)
        };

        let agent = self.get_agent(agent_id).await?;

        if count == ERROR_BLOCK_THRESHOLD {
            self.detect_blocked_inner(
                &agent,
                BlockSource::RepeatedErrors,
                format!("{count} consecutive errors in {elapsed}s"),
                task_id,
            )
            .await;
            return Ok(true);
        }
        if count == ERROR_SLEEP_THRESHOLD {
            self.trigger_sleep_inner(&agent, "error_threshold").await;
            return Ok(true);
        }
        Ok(false)
    }

    /// `detectBlocked` (spec §4.6.5).
    pub async fn detect_blocked(
        self: &Arc<Self>,
        agent_id: &str,
        source: BlockSource,
        reason: String,
        task_id: &str,
    ) -> Result<()> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;
        let agent = self.get_agent(agent_id).await?;
        self.detect_blocked_inner(&agent, source, reason, task_id).await;
        Ok(())
    }

    async fn detect_blocked_inner(
        self: &Arc<Self>,
        agent: &Agent,
        source: BlockSource,
        reason: String,
        task_id: &str,
    ) {
        let Ok(Some(task)) = self.store.get_task(task_id).await else {
            return;
        };
        let now = self.timers.now();
        let blocked_reason = format!("[{}] {}", source.label(), reason);

        let transition = match self
            .store
            .transition_task_and_agent(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::Blocked),
                    blocked_reason: Some(Some(blocked_reason)),
                    blocked_at: Some(Some(now)),
                    ..Default::default()
                },
                &agent.id,
                AgentPatch {
                    status: Some(AgentStatus::Blocked),
                    current_task_id: Some(Some(task_id.to_string())),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(t) => t,
            Err(err) => {
                error!(agent_id = %agent.id, %task_id, error = %err, "failed to transition task/agent to blocked");
                return;
            }
        };

        self.alerts.cancel_pending_alerts(&agent.id, Some(task_id));

        self.alerts
            .process_event(AlertEvent {
                trigger: AlertTrigger::Blocked,
                agent_id: agent.id.clone(),
                task_id: task_id.to_string(),
                title: task.title.clone(),
                priority: transition.task.priority,
                reason: Some(reason),
                project_id: task.project_id.clone(),
            })
            .await
            .ok();

        self.publish_agent_status(&agent.id, "blocked", json!({ "task_id": task_id }));
    }

    async fn trigger_sleep_inner(&self, agent: &Agent, _reason: &str) {
        if matches!(agent.status, AgentStatus::Sleeping | AgentStatus::Offline) {
            return;
        }
        if let Err(err) = self
            .store
            .update_agent(
                &agent.id,
                AgentPatch {
                    status: Some(AgentStatus::Sleeping),
                    ..Default::default()
                },
            )
            .await
        {
            error!(agent_id = %agent.id, error = %err, "failed to put agent to sleep");
        }
    }

    /// `completeTask` (spec §4.6.8).
    pub async fn complete_task(self: &Arc<Self>, agent_id: &str, task_id: &str) -> Result<()> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;

        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("task '{task_id}' not found")))?;
        if task.agent_id != agent_id {
            return Err(FleetError::NotFound(format!(
                "task '{task_id}' does not belong to agent '{agent_id}'"
            )));
        }

        let now = self.timers.now();
        let other_tasks = self.store.list_tasks_by_agent(agent_id).await?;
        let has_other_pending = other_tasks
            .iter()
            .any(|t| t.id != task_id && t.is_pending());

        let agent_patch = if has_other_pending {
            AgentPatch {
                current_task_id: Some(None),
                ..Default::default()
            }
        } else if self.sleep_window.is_in_sleep_window(now).await {
            AgentPatch {
                status: Some(AgentStatus::Sleeping),
                current_task_id: Some(None),
                ..Default::default()
            }
        } else {
            AgentPatch {
                status: Some(AgentStatus::Idle),
                current_task_id: Some(None),
                ..Default::default()
            }
        };

        let transition = self
            .store
            .transition_task_and_agent(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    completed_at: Some(Some(now)),
                    ..Default::default()
                },
                agent_id,
                agent_patch,
            )
            .await?;

        self.cancel_idle_timer(agent_id);
        self.alerts.cancel_pending_alerts(agent_id, Some(task_id));
        self.alerts
            .process_event(AlertEvent {
                trigger: AlertTrigger::Completed,
                agent_id: agent_id.to_string(),
                task_id: task_id.to_string(),
                title: transition.task.title.clone(),
                priority: transition.task.priority,
                reason: None,
                project_id: transition.task.project_id.clone(),
            })
            .await
            .ok();
        self.publish_agent_status(agent_id, "task_completed", json!({ "task_id": task_id }));

        Ok(())
    }

    /// Admin actions: `sleep`, `stop`, `unblock`, `restart` (spec §6).
    pub async fn apply_action(self: &Arc<Self>, agent_id: &str, action: AgentAction) -> Result<Agent> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;
        let agent = self.get_agent(agent_id).await?;

        match action {
            AgentAction::Sleep => {
                self.trigger_sleep_inner(&agent, "manual").await;
            }
            AgentAction::Stop => {
                for task in self.store.list_tasks_by_agent(agent_id).await? {
                    if !task.is_terminal() {
                        self.store
                            .update_task(
                                &task.id,
                                TaskPatch {
                                    status: Some(TaskStatus::Cancelled),
                                    completed_at: Some(Some(self.timers.now())),
                                    ..Default::default()
                                },
                            )
                            .await?;
                    }
                }
                self.cancel_idle_timer(agent_id);
                self.store
                    .update_agent(
                        agent_id,
                        AgentPatch {
                            status: Some(AgentStatus::Offline),
                            current_task_id: Some(None),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            AgentAction::Unblock => {
                if let Some(task_id) = agent.current_task_id.clone() {
                    self.store
                        .update_task(
                            &task_id,
                            TaskPatch {
                                status: Some(TaskStatus::InProgress),
                                blocked_reason: Some(None),
                                blocked_at: Some(None),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                self.store
                    .update_agent(
                        agent_id,
                        AgentPatch {
                            status: Some(AgentStatus::Working),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            AgentAction::Restart => {
                self.cancel_idle_timer(agent_id);
                self.store
                    .update_agent(
                        agent_id,
                        AgentPatch {
                            status: Some(AgentStatus::Idle),
                            current_task_id: Some(None),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }

        self.get_agent(agent_id).await
    }

    /// `triggerWake` (spec §4.6.1).
    pub async fn trigger_wake(&self, agent_id: &str) -> Result<Agent> {
        let lock = self.lock_for(agent_id).await;
        let _guard = lock.lock().await;
        let agent = self.get_agent(agent_id).await?;
        if agent.status == AgentStatus::Sleeping {
            self.store
                .update_agent(
                    agent_id,
                    AgentPatch {
                        status: Some(AgentStatus::Idle),
                        ..Default::default()
                    },
                )
                .await?;
        }
        self.get_agent(agent_id).await
    }

    /// `shouldSendMessage` pass-through for callers that push notifications
    /// outside the Alert Engine's own rule-matching path.
    pub fn should_send_message(&self, agent_id: &str, channel: Channel) -> bool {
        self.alerts.should_send_message(agent_id, channel)
    }

    /// Startup reconciliation (spec §5): re-seed idle monitors for every
    /// agent mid-task and re-evaluate blocked tasks' alert index.
    pub async fn reconcile(self: &Arc<Self>) -> Result<()> {
        let agents = self.store.list_agents(AgentFilter::default()).await?;
        for agent in &agents {
            if agent.status == AgentStatus::Working {
                self.start_idle_monitor(&agent.id);
            }
        }
        for agent in &agents {
            for task in self.store.list_tasks_by_agent(&agent.id).await? {
                if task.status == TaskStatus::Blocked {
                    self.alerts
                        .process_event(AlertEvent {
                            trigger: AlertTrigger::Blocked,
                            agent_id: agent.id.clone(),
                            task_id: task.id.clone(),
                            title: task.title.clone(),
                            priority: task.priority,
                            reason: task.blocked_reason.clone(),
                            project_id: task.project_id.clone(),
                        })
                        .await
                        .ok();
                }
            }
        }
        info!(agents = agents.len(), "lifecycle reconciliation complete");
        Ok(())
    }

    pub async fn shutdown(&self) {
        let handles: Vec<TimerHandle> = self
            .idle_timers
            .lock()
            .unwrap()
            .drain()
            .map(|(_, h)| h)
            .collect();
        for handle in handles {
            self.timers.cancel(&handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::security::load_or_generate_encryption_key;
    use crate::store::InMemoryStore;

    async fn manager() -> Arc<LifecycleManager> {
        let tmp = tempfile::tempdir().unwrap();
        let key = load_or_generate_encryption_key(tmp.path()).unwrap();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(key));
        store.seed_default_alert_rules().await.unwrap();
        let bus = Arc::new(EventBus::new());
        let timers = TimerService::new();
        let alerts = AlertEngine::new(store.clone(), timers.clone(), bus.clone());
        LifecycleManager::new(store, timers, bus, alerts)
    }

    #[tokio::test]
    async fn register_creates_idle_agent_with_no_task() {
        let manager = manager().await;
        let agent = manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task_id.is_none());
    }

    #[tokio::test]
    async fn assign_task_moves_agent_to_working() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();

        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Working);
        assert_eq!(agent.current_task_id, Some("t1".to_string()));
    }

    #[tokio::test]
    async fn detect_blocked_marks_task_and_agent_and_cancels_idle_timer() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        manager
            .detect_blocked(
                "a1",
                BlockSource::Idle,
                "idle 5 minutes with in_progress task".into(),
                "t1",
            )
            .await
            .unwrap();

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Blocked);
        assert_eq!(agent.current_task_id, Some("t1".to_string()));
    }

    #[tokio::test]
    async fn record_error_blocks_on_third_error_within_window() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        assert!(!manager.record_error("a1", "t1").await.unwrap());
        assert!(!manager.record_error("a1", "t1").await.unwrap());
        assert!(manager.record_error("a1", "t1").await.unwrap());

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Blocked);
    }

    #[tokio::test]
    async fn record_error_sleeps_agent_on_fifth_error() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        for _ in 0..5 {
            manager.record_error("a1", "t1").await.unwrap();
        }

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Sleeping);
    }

    #[tokio::test]
    async fn complete_task_returns_to_idle_when_no_other_pending_work() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        manager.complete_task("a1", "t1").await.unwrap();

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task_id.is_none());
    }

    #[tokio::test]
    async fn complete_task_keeps_agent_working_with_other_pending_tasks() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "first".into(), Priority::High, None, None)
            .await
            .unwrap();
        manager
            .assign_task("a1", "t2", "second".into(), Priority::Medium, None, None)
            .await
            .unwrap();

        manager.complete_task("a1", "t1").await.unwrap();

        let agent = manager.get_agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Working);
        assert!(agent.current_task_id.is_none());
    }

    #[tokio::test]
    async fn stop_cancels_in_progress_tasks_and_takes_agent_offline() {
        let manager = manager().await;
        manager
            .register("a1".into(), "Agent One".into(), AgentType::Primary, None, None, vec![])
            .await
            .unwrap();
        manager
            .assign_task("a1", "t1", "ship it".into(), Priority::High, None, None)
            .await
            .unwrap();

        let agent = manager.apply_action("a1", AgentAction::Stop).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
    }
}
