//! FormBridge HTTP API service entry point.
//!
//! Wires [`state::AppState`] to an axum [`Router`] exposing the submission,
//! approval, upload, resume, and event-stream surface from §6, and starts
//! the two background schedulers (expiry, webhook retry) alongside it.

mod config;
mod delivery;
mod extract;
mod handlers;
mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ApiConfig;
use state::AppState;

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/intake/:intake_id/submissions", post(handlers::submissions::create))
        .route(
            "/intake/:intake_id/submissions/:submission_id",
            get(handlers::submissions::get).patch(handlers::submissions::set_fields),
        )
        .route("/intake/:intake_id/submissions/:submission_id/submit", post(handlers::submissions::submit))
        .route(
            "/intake/:intake_id/submissions/:submission_id/uploads",
            post(handlers::uploads::request_upload),
        )
        .route(
            "/intake/:intake_id/submissions/:submission_id/uploads/:upload_id/confirm",
            post(handlers::uploads::confirm_upload),
        )
        .route("/submissions/:submission_id/handoff", post(handlers::submissions::handoff))
        .route("/submissions/:submission_id/events", get(handlers::events::list))
        .route("/submissions/:submission_id/approve", post(handlers::approvals::approve))
        .route("/submissions/:submission_id/reject", post(handlers::approvals::reject))
        .route(
            "/submissions/:submission_id/request-changes",
            post(handlers::approvals::request_changes),
        )
        .route("/submissions/resume/:resume_token", get(handlers::resume::get))
        .route("/submissions/resume/:resume_token/resumed", post(handlers::resume::resumed))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() {
    let config = ApiConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::bootstrap(&config).await;

    let expiry_handle = Arc::clone(&state.expiry_scheduler).start();
    let retry_handle = Arc::clone(&state.retry_scheduler).start();

    let app = build_router(Arc::clone(&state));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("failed to bind");

    tracing::info!(addr = %bind_addr, "formbridge-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    state.expiry_scheduler.stop();
    state.retry_scheduler.stop();
    expiry_handle.abort();
    retry_handle.abort();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl_c");
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_check_returns_ok() {
        let config = ApiConfig::from_env();
        let state = AppState::bootstrap(&config).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
