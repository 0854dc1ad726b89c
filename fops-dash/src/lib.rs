//! fops-dash library - field operations dashboard service
//!
//! Serves filtered contractor / target / area lists, the live activity
//! feed and the approval queue over HTTP, and relays dashboard events to
//! browsers over SSE.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use fops_common::context::DashboardContext;
use fops_common::events::EventBus;

pub mod api;
pub mod dispatch;
pub mod poller;
pub mod runtime;
pub mod transport;

use runtime::RuntimeHandle;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Immutable collections and filter engines
    pub context: Arc<DashboardContext>,
    /// Sender side of the dashboard runtime
    pub runtime: RuntimeHandle,
    /// Dashboard event broadcast, relayed over SSE
    pub bus: EventBus,
}

impl AppState {
    pub fn new(context: Arc<DashboardContext>, runtime: RuntimeHandle, bus: EventBus) -> Self {
        Self {
            context,
            runtime,
            bus,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/areas", get(api::list_areas))
        .route("/api/contractors", get(api::list_contractors))
        .route("/api/targets", get(api::list_targets))
        .route("/api/feed", get(api::get_feed))
        .route("/api/approvals", get(api::list_approvals))
        .route("/api/approvals/:id/approve", post(api::approve))
        .route("/api/approvals/:id/reject", post(api::reject))
        .route("/api/status", get(api::get_status))
        .route("/api/events", get(api::event_stream))
        .route("/api/buildinfo", get(api::get_build_info));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
