//! Long-lived per-client event stream (spec §4.5). Each connection
//! subscribes to the Event Bus, forwards events as SSE frames, emits a
//! synthetic `connected` event up front, a `resync` event whenever the
//! bus reports dropped events, and a keep-alive comment every 15 s.
use crate::constants::STREAM_KEEPALIVE_SECS;
use crate::event_bus::{EventBus, EventOrGap};
use crate::models::{DashboardEvent, DashboardEventType};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

fn to_sse_event(dashboard_event: &DashboardEvent) -> Event {
    let event_type = match dashboard_event.event_type {
        DashboardEventType::TodoUpdated => "todo:updated",
        DashboardEventType::TodoCreated => "todo:created",
        DashboardEventType::TodoDeleted => "todo:deleted",
        DashboardEventType::MessageCreated => "message:created",
        DashboardEventType::SprintUpdated => "sprint:updated",
        DashboardEventType::SprintCreated => "sprint:created",
        DashboardEventType::AgentStatusChanged => "agent:status",
        DashboardEventType::ProjectUpdated => "project:updated",
        DashboardEventType::Connected => "connected",
        DashboardEventType::Resync => "resync",
    };
    Event::default()
        .event(event_type)
        .data(dashboard_event.payload.to_string())
}

/// Builds the SSE response for `GET /api/stream`. The returned stream runs
/// until the client disconnects; the bus subscription is released when the
/// forwarding task notices the channel receiver has gone away.
pub fn handle_stream(
    bus: Arc<EventBus>,
    now_ms: i64,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(32);
    let subscriber = bus.subscribe();

    tokio::spawn(async move {
        let connected = DashboardEvent {
            event_type: DashboardEventType::Connected,
            payload: json!({}),
            timestamp_ms: now_ms,
        };
        if tx.send(to_sse_event(&connected)).await.is_err() {
            bus.unsubscribe(&subscriber);
            return;
        }

        loop {
            match subscriber.recv().await {
                Some(EventOrGap::Event(event)) => {
                    if tx.send(to_sse_event(&event)).await.is_err() {
                        break;
                    }
                }
                Some(EventOrGap::Gap(dropped)) => {
                    let resync = DashboardEvent {
                        event_type: DashboardEventType::Resync,
                        payload: json!({ "dropped": dropped }),
                        timestamp_ms: now_ms,
                    };
                    if tx.send(to_sse_event(&resync)).await.is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        bus.unsubscribe(&subscriber);
    });

    Sse::new(ReceiverStream::new(rx).map(Ok)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(STREAM_KEEPALIVE_SECS))
            .text(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DashboardEventType as Ty;
    use axum::response::IntoResponse;
    use futures::StreamExt;

    #[tokio::test]
    async fn emits_connected_event_first() {
        let bus = Arc::new(EventBus::new());
        let sse = handle_stream(bus, 0);
        let mut stream = sse.into_response().into_body().into_data_stream();
        let first_chunk = stream.next().await.unwrap().unwrap();
        let text = String::from_utf8(first_chunk.to_vec()).unwrap();
        assert!(text.contains("event:connected") || text.contains("event: connected"));
    }

    #[tokio::test]
    async fn forwards_published_event_as_named_sse_frame() {
        let bus = Arc::new(EventBus::new());
        let sse = handle_stream(bus.clone(), 0);
        let mut stream = sse.into_response().into_body().into_data_stream();
        let _connected = stream.next().await.unwrap().unwrap();

        bus.publish(DashboardEvent {
            event_type: Ty::AgentStatusChanged,
            payload: json!({"action": "task_assigned"}),
            timestamp_ms: 0,
        });

        let chunk = stream.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("task_assigned"));
    }
}
