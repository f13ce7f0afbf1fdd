//! HTTP adapter (spec §6). Thin request/response translation over the
//! Lifecycle Manager, Alert Engine, Store, and Stream Gateway; no
//! business logic lives here.
use crate::alert::AlertEngine;
use crate::auth::{auth_middleware, create_auth_state};
use crate::config::Config;
use crate::event_bus::EventBus;
use crate::lifecycle::{AgentAction, BlockSource, LifecycleManager};
use crate::models::{Agent, AgentStatus, AgentTask, AgentType, Message, Priority, SleepScheduleConfig};
use crate::rate_limit::{rate_limit_middleware, RateLimitState};
use crate::store::{AgentFilter, MessageFilter, Store};
use crate::webhook::{WebhookIngest, WebhookPayload};
use crate::{FleetError, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{sse::Event as SseEvent, Json, Sse},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

const SERVICE_NAME: &str = "agent-fleet-control";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub lifecycle: Arc<LifecycleManager>,
    pub alerts: Arc<AlertEngine>,
    pub bus: Arc<EventBus>,
    pub webhook: Arc<WebhookIngest>,
    pub webhook_secret: Option<String>,
}

/// Assembles the public router. Layer order mirrors the request's actual
/// path: rate limiting first (so it sees every caller, even unauthenticated
/// ones), then auth, then tracing and CORS.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let auth_state = create_auth_state(config.api.dashboard_api_key.clone());
    let rate_limit_state = RateLimitState::new(config.rate_limit.window_ms, config.rate_limit.max_requests);

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .api
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderName::from_static("x-api-key"),
            axum::http::HeaderName::from_static("linear-signature"),
        ]);

    let authenticated = Router::new()
        .route("/api/agents", get(list_agents).post(register_agent))
        .route(
            "/api/agents/{id}",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route("/api/agents/{id}/tasks", axum::routing::post(assign_task))
        .route(
            "/api/agents/{id}/tasks/{task_id}",
            axum::routing::patch(update_task),
        )
        .route("/api/agents/{id}/heartbeat", axum::routing::post(heartbeat))
        .route("/api/agents/{id}/block", axum::routing::post(block_agent))
        .route("/api/agents/{id}/error", axum::routing::post(record_error))
        .route("/api/agents/{id}/complete", axum::routing::post(complete_task))
        .route("/api/agents/{id}/assign", axum::routing::post(assign_task))
        .route("/api/agents/{id}/actions", axum::routing::post(apply_action))
        .route("/api/messages", get(list_messages))
        .route("/api/messages/{id}/read", axum::routing::post(mark_message_read))
        .route("/api/stream", get(stream))
        .route(
            "/api/settings/sleep-schedule",
            get(get_sleep_schedule).put(put_sleep_schedule),
        )
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/linear/webhook", axum::routing::post(linear_webhook))
        .merge(authenticated)
        .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
    }))
}

#[derive(Debug, Deserialize)]
struct AgentListQuery {
    status: Option<AgentStatus>,
    #[serde(rename = "type")]
    agent_type: Option<AgentType>,
    parent_agent_id: Option<String>,
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentListQuery>,
) -> Result<Json<Vec<Agent>>> {
    let agents = state
        .lifecycle
        .list_agents(AgentFilter {
            status: query.status,
            agent_type: query.agent_type,
            parent_agent_id: query.parent_agent_id,
        })
        .await?;
    Ok(Json(agents))
}

#[derive(Debug, Deserialize)]
struct RegisterAgentRequest {
    id: String,
    name: String,
    #[serde(rename = "type")]
    agent_type: AgentType,
    parent_agent_id: Option<String>,
    soul_md: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>)> {
    if body.id.trim().is_empty() || body.name.trim().is_empty() {
        return Err(FleetError::Validation(
            "agent id and name must not be empty".to_string(),
        ));
    }
    let agent = state
        .lifecycle
        .register(
            body.id,
            body.name,
            body.agent_type,
            body.parent_agent_id,
            body.soul_md,
            body.skills,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn get_agent(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Agent>> {
    Ok(Json(state.lifecycle.get_agent(&id).await?))
}

#[derive(Debug, Deserialize)]
struct UpdateAgentRequest {
    name: Option<String>,
    soul_md: Option<String>,
    skills: Option<Vec<String>>,
}

async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAgentRequest>,
) -> Result<Json<Agent>> {
    use crate::store::AgentPatch;
    let agent = state
        .store
        .update_agent(
            &id,
            AgentPatch {
                name: body.name,
                soul_md: body.soul_md.map(Some),
                skills: body.skills,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(agent))
}

async fn delete_agent(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.lifecycle.delete_agent(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AssignTaskRequest {
    task_id: String,
    title: String,
    #[serde(default = "default_priority")]
    priority: Priority,
    linear_issue_id: Option<String>,
    project_id: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Medium
}

async fn assign_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignTaskRequest>,
) -> Result<(StatusCode, Json<AgentTask>)> {
    let task = state
        .lifecycle
        .assign_task(
            &id,
            &body.task_id,
            body.title,
            body.priority,
            body.linear_issue_id,
            body.project_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    priority: Option<Priority>,
}

async fn update_task(
    State(state): State<AppState>,
    Path((_agent_id, task_id)): Path<(String, String)>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<AgentTask>> {
    use crate::store::TaskPatch;
    let task = state
        .store
        .update_task(
            &task_id,
            TaskPatch {
                priority: body.priority,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(task))
}

async fn heartbeat(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.lifecycle.refresh_heartbeat(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BlockRequest {
    task_id: String,
    reason: String,
    #[serde(default)]
    source: BlockSourceWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BlockSourceWire {
    #[default]
    Explicit,
    Question,
    ResourceDenied,
}

async fn block_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BlockRequest>,
) -> Result<StatusCode> {
    let source = match body.source {
        BlockSourceWire::Explicit => BlockSource::Explicit,
        BlockSourceWire::Question => BlockSource::Question,
        BlockSourceWire::ResourceDenied => BlockSource::ResourceDenied,
    };
    state
        .lifecycle
        .detect_blocked(&id, source, body.reason, &body.task_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ErrorRequest {
    task_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorAckResponse {
    threshold_triggered: bool,
}

async fn record_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ErrorRequest>,
) -> Result<Json<ErrorAckResponse>> {
    let triggered = state.lifecycle.record_error(&id, &body.task_id).await?;
    Ok(Json(ErrorAckResponse {
        threshold_triggered: triggered,
    }))
}

#[derive(Debug, Deserialize)]
struct CompleteRequest {
    task_id: String,
}

async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> Result<StatusCode> {
    state.lifecycle.complete_task(&id, &body.task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ActionRequest {
    Sleep,
    Stop,
    Unblock,
    Restart,
    Wake,
}

async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Result<Json<Agent>> {
    let agent = match body {
        ActionRequest::Sleep => state.lifecycle.apply_action(&id, AgentAction::Sleep).await?,
        ActionRequest::Stop => state.lifecycle.apply_action(&id, AgentAction::Stop).await?,
        ActionRequest::Unblock => state.lifecycle.apply_action(&id, AgentAction::Unblock).await?,
        ActionRequest::Restart => state.lifecycle.apply_action(&id, AgentAction::Restart).await?,
        ActionRequest::Wake => state.lifecycle.trigger_wake(&id).await?,
    };
    Ok(Json(agent))
}

#[derive(Debug, Deserialize)]
struct MessageListQuery {
    project_id: Option<String>,
    #[serde(default)]
    unread_only: bool,
    limit: Option<usize>,
}

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<Vec<Message>>> {
    let messages = state
        .store
        .list_messages(MessageFilter {
            project_id: query.project_id,
            unread_only: query.unread_only,
            limit: query.limit,
        })
        .await?;
    Ok(Json(messages))
}

async fn mark_message_read(State(state): State<AppState>, Path(id): Path<u64>) -> Result<StatusCode> {
    state.store.mark_message_read(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_sleep_schedule(State(state): State<AppState>) -> Json<SleepScheduleConfig> {
    Json(state.lifecycle.sleep_window.get().await)
}

async fn put_sleep_schedule(
    State(state): State<AppState>,
    Json(config): Json<SleepScheduleConfig>,
) -> Result<StatusCode> {
    if config.start_hour > 23 || config.end_hour > 23 {
        return Err(FleetError::Validation(
            "start_hour and end_hour must be 0-23".to_string(),
        ));
    }
    state.lifecycle.sleep_window.set(config).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    crate::stream_gateway::handle_stream(state.bus.clone(), chrono::Utc::now().timestamp_millis())
}

async fn linear_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get("linear-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(FleetError::Unauthorized)?;

    crate::webhook::verify_signature(state.webhook_secret.as_deref(), &body, signature)?;

    let payload: WebhookPayload = serde_json::from_slice(&body)?;
    info!(entity_type = %payload.entity_type, action = %payload.action, "received linear webhook");
    state.webhook.handle(payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::security::load_or_generate_encryption_key;
    use crate::store::InMemoryStore;
    use crate::timer::TimerService;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::Request;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345)))
    }

    async fn test_app() -> (Router, tempfile::TempDir) {
        std::env::set_var("DASHBOARD_API_KEY", "a-secret-key-that-is-long-enough-32");
        std::env::set_var("LINEAR_WEBHOOK_SECRET", "webhook-secret");
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("DATA_DIR", tmp.path());
        let config = Config::load().unwrap();

        let key = load_or_generate_encryption_key(&config.storage.data_dir).unwrap();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(key));
        store.seed_default_alert_rules().await.unwrap();
        let bus = Arc::new(EventBus::new());
        let timers = TimerService::new();
        let alerts = AlertEngine::new(store.clone(), timers.clone(), bus.clone());
        let lifecycle = LifecycleManager::new(store.clone(), timers, bus.clone(), alerts.clone());
        let webhook = Arc::new(WebhookIngest::new(store.clone(), lifecycle.clone()));

        let state = AppState {
            store,
            lifecycle,
            alerts,
            bus,
            webhook,
            webhook_secret: config.webhook.linear_webhook_secret.clone(),
        };
        (build_router(state, &config), tmp)
    }

    #[tokio::test]
    async fn health_check_requires_no_auth() {
        let (app, _tmp) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .extension(peer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_and_fetch_agent_round_trip() {
        let (app, _tmp) = test_app().await;
        let body = serde_json::json!({
            "id": "a1",
            "name": "Agent One",
            "type": "primary",
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/agents")
                    .extension(peer())
                    .header("content-type", "application/json")
                    .header("x-api-key", "a-secret-key-that-is-long-enough-32")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/agents/a1")
                    .extension(peer())
                    .header("x-api-key", "a-secret-key-that-is-long-enough-32")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agent_routes_require_auth() {
        let (app, _tmp) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/agents")
                    .extension(peer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature() {
        let (app, _tmp) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/linear/webhook")
                    .extension(peer())
                    .header("linear-signature", "deadbeef")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"Issue","action":"create","data":{}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
