//! In-process publish/subscribe fan-out for `DashboardEvent`s. A single
//! slow subscriber never blocks the publisher: each subscriber gets a
//! bounded queue and, on overflow, the oldest entry is dropped and a
//! gap marker recorded for the Stream Gateway to surface as `resync`.
use crate::constants::EVENT_BUS_QUEUE_CAPACITY;
use crate::models::DashboardEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

struct Subscriber {
    queue: Mutex<VecDeque<DashboardEvent>>,
    dropped: AtomicU64,
    notify: Notify,
    closed: std::sync::atomic::AtomicBool,
}

#[derive(Clone)]
pub struct SubscriberHandle {
    id: u64,
    inner: Arc<Subscriber>,
}

impl SubscriberHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Awaits the next event, or `None` if the bus closed this subscription.
    pub async fn recv(&self) -> Option<EventOrGap> {
        loop {
            {
                let mut queue = self.inner.queue.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    return Some(EventOrGap::Event(event));
                }
                let dropped = self.inner.dropped.swap(0, Ordering::SeqCst);
                if dropped > 0 {
                    return Some(EventOrGap::Gap(dropped));
                }
                if self.inner.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.inner.notify.notified().await;
        }
    }
}

pub enum EventOrGap {
    Event(DashboardEvent),
    Gap(u64),
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Arc<Subscriber>)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> SubscriberHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::new(Subscriber {
            queue: Mutex::new(VecDeque::with_capacity(EVENT_BUS_QUEUE_CAPACITY)),
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        self.subscribers.lock().unwrap().push((id, inner.clone()));
        SubscriberHandle { id, inner }
    }

    pub fn unsubscribe(&self, handle: &SubscriberHandle) {
        handle.inner.closed.store(true, Ordering::SeqCst);
        handle.inner.notify.notify_waiters();
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != handle.id);
    }

    /// Never blocks: a full subscriber queue drops its oldest entry.
    pub fn publish(&self, event: DashboardEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for (_, subscriber) in subscribers.iter() {
            let mut queue = subscriber.queue.lock().unwrap();
            if queue.len() >= EVENT_BUS_QUEUE_CAPACITY {
                queue.pop_front();
                subscriber.dropped.fetch_add(1, Ordering::SeqCst);
            }
            queue.push_back(event.clone());
            drop(queue);
            subscriber.notify.notify_waiters();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DashboardEventType;
    use serde_json::json;

    fn sample_event() -> DashboardEvent {
        DashboardEvent {
            event_type: DashboardEventType::AgentStatusChanged,
            payload: json!({"action": "task_assigned"}),
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn publish_fans_out_to_all_subscribers() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(sample_event());

        assert!(matches!(a.recv().await, Some(EventOrGap::Event(_))));
        assert!(matches!(b.recv().await, Some(EventOrGap::Event(_))));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_and_closes_handle() {
        let bus = EventBus::new();
        let handle = bus.subscribe();
        bus.unsubscribe(&handle);

        assert_eq!(bus.subscriber_count(), 0);
        assert!(handle.recv().await.is_none());
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_reports_gap() {
        let bus = EventBus::new();
        let handle = bus.subscribe();

        for _ in 0..(EVENT_BUS_QUEUE_CAPACITY + 5) {
            bus.publish(sample_event());
        }

        let mut events = 0;
        let mut gap = None;
        while let Some(item) = handle.recv().await {
            match item {
                EventOrGap::Event(_) => events += 1,
                EventOrGap::Gap(n) => {
                    gap = Some(n);
                    break;
                }
            }
        }

        assert_eq!(events, EVENT_BUS_QUEUE_CAPACITY);
        assert_eq!(gap, Some(5));
    }

    #[tokio::test]
    async fn publish_does_not_block_with_no_subscribers() {
        let bus = EventBus::new();
        bus.publish(sample_event());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
