//! Admin HTTP API.
//!
//! Read-only views of the ledger plus a manual sweep trigger, all behind a
//! bearer key. Bound to localhost by default.

pub mod auth;
pub mod handlers;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::subscription::{ExpirySweeper, SubscriptionService};

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<SubscriptionService>,
    pub sweeper: Arc<ExpirySweeper>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(service: Arc<SubscriptionService>, sweeper: Arc<ExpirySweeper>, api_key: &str) -> Self {
        Self {
            service,
            sweeper,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/accounts/{user_id}", get(get_account))
        .route("/admin/sweep", post(trigger_sweep))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until shutdown.
pub async fn serve(listener: TcpListener, router: Router, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Admin API shutting down");
        })
        .await
}
