use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use salon_scheduler::config::AppConfig;
use salon_scheduler::db::SqliteStore;
use salon_scheduler::handlers;
use salon_scheduler::services::events::webhook::WebhookEventSink;
use salon_scheduler::services::events::{LifecycleEventSink, LogEventSink};
use salon_scheduler::services::no_show::run_sweeper;
use salon_scheduler::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store = SqliteStore::open(&config.database_url)?;

    let events: Box<dyn LifecycleEventSink> = match &config.event_webhook_url {
        Some(url) => {
            tracing::info!(
                "delivering lifecycle events to {url} (signed: {})",
                config.event_webhook_secret.is_some()
            );
            Box::new(WebhookEventSink::new(
                url.clone(),
                config.event_webhook_secret.clone(),
            ))
        }
        None => {
            tracing::info!("EVENT_WEBHOOK_URL not set; lifecycle events are only logged");
            Box::new(LogEventSink)
        }
    };

    let state = Arc::new(AppState {
        store,
        config: config.clone(),
        events,
    });

    tokio::spawn(run_sweeper(state.clone()));
    tracing::info!(
        "no-show sweeper running every {}s",
        config.sweep_interval_secs
    );

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/professionals/:id/slots",
            get(handlers::slots::get_slots),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/status",
            post(handlers::bookings::update_status),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/reschedule",
            post(handlers::bookings::reschedule_booking),
        )
        .route(
            "/api/bookings/:id/cancellation-quote",
            get(handlers::bookings::cancellation_quote),
        )
        .route(
            "/api/salons/:id/policies",
            post(handlers::policies::publish_policy),
        )
        .route("/api/sweeps", post(handlers::sweeps::trigger_sweep))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
