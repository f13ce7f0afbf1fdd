use agent_fleet_control::alert::AlertEngine;
use agent_fleet_control::api::{build_router, AppState};
use agent_fleet_control::config::Config;
use agent_fleet_control::event_bus::EventBus;
use agent_fleet_control::lifecycle::LifecycleManager;
use agent_fleet_control::security::load_or_generate_encryption_key;
use agent_fleet_control::store::{InMemoryStore, Store};
use agent_fleet_control::timer::TimerService;
use agent_fleet_control::webhook::WebhookIngest;
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("starting agent fleet control plane");

    let config = Config::load()?;

    let encryption_key = load_or_generate_encryption_key(&config.storage.data_dir)?;
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(encryption_key));
    store.seed_default_alert_rules().await?;

    let bus = Arc::new(EventBus::new());
    let timers = TimerService::new();
    let alerts = AlertEngine::new(store.clone(), timers.clone(), bus.clone());
    let lifecycle = LifecycleManager::new(store.clone(), timers, bus.clone(), alerts.clone());
    let webhook = Arc::new(WebhookIngest::new(store.clone(), lifecycle.clone()));

    lifecycle.reconcile().await?;

    let addr: std::net::SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;

    let state = AppState {
        store,
        lifecycle: lifecycle.clone(),
        alerts,
        bus,
        webhook,
        webhook_secret: config.webhook.linear_webhook_secret.clone(),
    };
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "server exited with error");
    }

    lifecycle.shutdown().await;
    info!("agent fleet control plane stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
