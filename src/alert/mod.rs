//! Converts `AlertEvent`s into `Message` rows under the timing, batching,
//! and throttling rules of spec §4.4. Has no dependency on the Lifecycle
//! Manager beyond the `AlertEvent` struct it's fed.
mod throttle;

use crate::event_bus::EventBus;
use crate::models::{AlertEvent, AlertTrigger, Channel, DashboardEvent, DashboardEventType};
use crate::store::Store;
use crate::timer::{TimerHandle, TimerService};
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use throttle::{CrossAgentPushThrottle, DigestDecision, InAppDigest, PushThrottle};
use tracing::{debug, warn};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct PendingKey {
    agent_id: String,
    task_id: String,
    trigger: AlertTrigger,
    rule_id: String,
}

struct BatchItem {
    agent_id: String,
    task_id: String,
    title: String,
}

struct CompletionBatch {
    rule_id: String,
    items: Vec<BatchItem>,
    timer: Option<TimerHandle>,
}

pub struct AlertEngine {
    store: Arc<dyn Store>,
    timers: TimerService,
    bus: Arc<EventBus>,
    pending: Mutex<HashMap<PendingKey, TimerHandle>>,
    completion_batches: Mutex<HashMap<String, CompletionBatch>>,
    push_throttle: PushThrottle,
    cross_agent_push_throttle: CrossAgentPushThrottle,
    in_app_digest: InAppDigest,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn Store>, timers: TimerService, bus: Arc<EventBus>) -> Arc<Self> {
        let now_ms = timers.now_ms();
        Arc::new(Self {
            store,
            timers,
            bus,
            pending: Mutex::new(HashMap::new()),
            completion_batches: Mutex::new(HashMap::new()),
            push_throttle: PushThrottle::new(now_ms),
            cross_agent_push_throttle: CrossAgentPushThrottle::new(),
            in_app_digest: InAppDigest::new(),
        })
    }

    /// `shouldSendMessage` (spec §4.6.9), used by the Lifecycle Manager for
    /// cross-agent coordination pushes outside the rule-matching path.
    pub fn should_send_message(&self, agent_id: &str, channel: Channel) -> bool {
        self.cross_agent_push_throttle.should_send(
            agent_id,
            matches!(channel, Channel::Push),
            self.timers.now_ms(),
        )
    }

    pub async fn process_event(self: &Arc<Self>, event: AlertEvent) -> Result<()> {
        let rules = self
            .store
            .list_alert_rules_for(event.trigger, event.priority)
            .await?;

        for rule in rules {
            if rule.delay_ms == 0 {
                let engine = self.clone();
                let event = event.clone();
                let rule_id = rule.id.clone();
                let channel = rule.channel;
                tokio::spawn(async move {
                    engine.deliver(&rule_id, channel, &event).await;
                });
                continue;
            }

            if event.trigger == AlertTrigger::Completed {
                self.enqueue_batch(&rule.id, rule.delay_ms, rule.channel, &event);
            } else {
                self.schedule_delayed(&rule.id, rule.delay_ms, rule.channel, &event);
            }
        }
        Ok(())
    }

    fn schedule_delayed(
        self: &Arc<Self>,
        rule_id: &str,
        delay_ms: u64,
        channel: Channel,
        event: &AlertEvent,
    ) {
        let key = PendingKey {
            agent_id: event.agent_id.clone(),
            task_id: event.task_id.clone(),
            trigger: event.trigger,
            rule_id: rule_id.to_string(),
        };
        let engine = self.clone();
        let event = event.clone();
        let rule_id_owned = rule_id.to_string();
        let key_for_cleanup = key.clone();

        let handle = self.timers.schedule(delay_ms, move || {
            let engine = engine.clone();
            async move {
                engine.pending.lock().unwrap().remove(&key_for_cleanup);
                engine.deliver(&rule_id_owned, channel, &event).await;
            }
        });
        self.pending.lock().unwrap().insert(key, handle);
    }

    fn enqueue_batch(
        self: &Arc<Self>,
        rule_id: &str,
        delay_ms: u64,
        channel: Channel,
        event: &AlertEvent,
    ) {
        let mut batches = self.completion_batches.lock().unwrap();
        let batch = batches
            .entry(rule_id.to_string())
            .or_insert_with(|| CompletionBatch {
                rule_id: rule_id.to_string(),
                items: Vec::new(),
                timer: None,
            });
        batch.items.push(BatchItem {
            agent_id: event.agent_id.clone(),
            task_id: event.task_id.clone(),
            title: event.title.clone(),
        });

        if batch.timer.is_none() {
            let engine = self.clone();
            let rule_id_owned = rule_id.to_string();
            let handle = self.timers.schedule(delay_ms, move || {
                let engine = engine.clone();
                async move {
                    engine.flush_batch(&rule_id_owned, channel).await;
                }
            });
            batch.timer = Some(handle);
        }
    }

    async fn flush_batch(self: &Arc<Self>, rule_id: &str, channel: Channel) {
        let items = {
            let mut batches = self.completion_batches.lock().unwrap();
            batches.remove(rule_id).map(|b| b.items).unwrap_or_default()
        };
        if items.is_empty() {
            return;
        }
        let summary = if items.len() == 1 {
            format!("{} completed", items[0].title)
        } else {
            format!(
                "{} tasks completed: {}",
                items.len(),
                items
                    .iter()
                    .map(|i| i.title.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let agent_id = items[0].agent_id.clone();
        self.create_and_publish(rule_id, channel, &agent_id, None, "completed", &summary)
            .await;
    }

    async fn deliver(self: &Arc<Self>, rule_id: &str, channel: Channel, event: &AlertEvent) {
        let content = match &event.reason {
            Some(reason) => format!("{}: {}", event.title, reason),
            None => event.title.clone(),
        };
        let trigger_name = trigger_label(event.trigger);

        match channel {
            Channel::InApp => {
                self.deliver_in_app(rule_id, &event.agent_id, trigger_name, &content)
                    .await;
            }
            Channel::Push => {
                if self
                    .push_throttle
                    .try_send(&event.agent_id, self.timers.now_ms())
                {
                    self.create_and_publish(
                        rule_id,
                        Channel::Push,
                        &event.agent_id,
                        Some(event.task_id.clone()),
                        trigger_name,
                        &content,
                    )
                    .await;
                } else {
                    self.deliver_in_app(rule_id, &event.agent_id, trigger_name, &content)
                        .await;
                }
            }
            Channel::Both => {
                self.deliver_in_app(rule_id, &event.agent_id, trigger_name, &content)
                    .await;
                if self
                    .push_throttle
                    .try_send(&event.agent_id, self.timers.now_ms())
                {
                    self.create_and_publish(
                        rule_id,
                        Channel::Push,
                        &event.agent_id,
                        Some(event.task_id.clone()),
                        trigger_name,
                        &content,
                    )
                    .await;
                }
            }
        }
    }

    async fn deliver_in_app(
        self: &Arc<Self>,
        rule_id: &str,
        agent_id: &str,
        trigger_name: &str,
        content: &str,
    ) {
        match self.in_app_digest.decide(agent_id, self.timers.now()) {
            DigestDecision::DeliverNew => {
                if let Some(id) = self
                    .create_and_publish(rule_id, Channel::InApp, agent_id, None, trigger_name, content)
                    .await
                {
                    self.in_app_digest.record_digest_message(agent_id, id);
                }
            }
            DigestDecision::MergeInto(_existing) => {
                debug!(%agent_id, "merging in_app alert into existing digest");
            }
        }
    }

    async fn create_and_publish(
        self: &Arc<Self>,
        rule_id: &str,
        channel: Channel,
        agent_id: &str,
        task_id: Option<String>,
        trigger_name: &str,
        content: &str,
    ) -> Option<u64> {
        match self
            .store
            .create_message(trigger_name, content, task_id, Some(agent_id.to_string()), None)
            .await
        {
            Ok(id) => {
                self.bus.publish(DashboardEvent {
                    event_type: DashboardEventType::MessageCreated,
                    payload: serde_json::json!({ "channel": channel_label(channel), "rule_id": rule_id }),
                    timestamp_ms: self.timers.now_ms(),
                });
                Some(id)
            }
            Err(err) => {
                warn!(%rule_id, %agent_id, error = %err, "failed to persist alert message");
                None
            }
        }
    }

    /// Cancels every scheduled delayed alert matching `agent_id` (and
    /// `task_id` when given), including entries sitting inside a pending
    /// completion batch. Idempotent: a second call returns 0.
    pub fn cancel_pending_alerts(&self, agent_id: &str, task_id: Option<&str>) -> usize {
        let mut cancelled = 0;

        {
            let mut pending = self.pending.lock().unwrap();
            let matching: Vec<PendingKey> = pending
                .keys()
                .filter(|k| {
                    k.agent_id == agent_id && task_id.map(|t| k.task_id == t).unwrap_or(true)
                })
                .cloned()
                .collect();
            for key in matching {
                if let Some(handle) = pending.remove(&key) {
                    if self.timers.cancel(&handle) {
                        cancelled += 1;
                    }
                }
            }
        }

        {
            let mut batches = self.completion_batches.lock().unwrap();
            for batch in batches.values_mut() {
                let before = batch.items.len();
                batch.items.retain(|item| {
                    !(item.agent_id == agent_id && task_id.map(|t| item.task_id == t).unwrap_or(true))
                });
                cancelled += before - batch.items.len();
            }
        }

        cancelled
    }
}

fn trigger_label(trigger: AlertTrigger) -> &'static str {
    match trigger {
        AlertTrigger::Blocked => "blocked",
        AlertTrigger::Error => "error",
        AlertTrigger::Completed => "completed",
        AlertTrigger::IdleTooLong => "idle_too_long",
        AlertTrigger::StaleTask => "stale_task",
    }
}

fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::Push => "push",
        Channel::InApp => "in_app",
        Channel::Both => "both",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::security::load_or_generate_encryption_key;
    use crate::store::{InMemoryStore, MessageFilter};

    async fn engine() -> (Arc<AlertEngine>, Arc<dyn Store>) {
        let tmp = tempfile::tempdir().unwrap();
        let key = load_or_generate_encryption_key(tmp.path()).unwrap();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(key));
        store.seed_default_alert_rules().await.unwrap();
        let bus = Arc::new(EventBus::new());
        let engine = AlertEngine::new(store.clone(), TimerService::new(), bus);
        (engine, store)
    }

    fn event(trigger: AlertTrigger, priority: Priority, agent: &str, task: &str) -> AlertEvent {
        AlertEvent {
            trigger,
            agent_id: agent.to_string(),
            task_id: task.to_string(),
            title: "do the thing".to_string(),
            priority,
            reason: None,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn immediate_rule_creates_message_without_delay() {
        let (engine, store) = engine().await;
        engine
            .process_event(event(AlertTrigger::Blocked, Priority::High, "a1", "t1"))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        let messages = store.list_messages(MessageFilter::default()).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_batch_with_one_event_flushes_one_message() {
        let (engine, store) = engine().await;
        engine
            .process_event(event(AlertTrigger::Completed, Priority::Medium, "a1", "t1"))
            .await
            .unwrap();

        tokio::time::advance(std::time::Duration::from_millis(
            crate::constants::DELAY_COMPLETED_BATCH_MS + 100,
        ))
        .await;
        tokio::task::yield_now().await;

        let messages = store.list_messages(MessageFilter::default()).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_alerts_is_idempotent() {
        let (engine, _store) = engine().await;
        engine
            .process_event(event(AlertTrigger::Blocked, Priority::Medium, "a1", "t1"))
            .await
            .unwrap();

        let first = engine.cancel_pending_alerts("a1", Some("t1"));
        let second = engine.cancel_pending_alerts("a1", Some("t1"));

        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_blocked_medium_alert_never_fires() {
        let (engine, store) = engine().await;
        engine
            .process_event(event(AlertTrigger::Blocked, Priority::Medium, "a1", "t1"))
            .await
            .unwrap();
        engine.cancel_pending_alerts("a1", Some("t1"));

        tokio::time::advance(std::time::Duration::from_millis(
            crate::constants::DELAY_BLOCKED_MEDIUM_MS + 1000,
        ))
        .await;
        tokio::task::yield_now().await;

        let messages = store.list_messages(MessageFilter::default()).await.unwrap();
        assert_eq!(messages.len(), 0);
    }

    #[tokio::test]
    async fn push_anti_spam_caps_delivered_push_messages() {
        let (engine, _store) = engine().await;
        let subscriber = engine.bus.subscribe();

        for i in 0..4 {
            engine
                .process_event(event(
                    AlertTrigger::Error,
                    Priority::High,
                    "a1",
                    &format!("t{i}"),
                ))
                .await
                .unwrap();
        }
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let mut in_app_count = 0;
        let mut push_count = 0;
        while let Ok(Some(crate::event_bus::EventOrGap::Event(e))) =
            tokio::time::timeout(std::time::Duration::from_millis(50), subscriber.recv()).await
        {
            match e.payload["channel"].as_str() {
                Some("in_app") => in_app_count += 1,
                Some("push") => push_count += 1,
                _ => {}
            }
        }

        assert_eq!(in_app_count, 4);
        assert!(push_count <= 3);
    }
}
