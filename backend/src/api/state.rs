use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, patch, post, put};

use crate::api::handlers;
use crate::metrics::Counters;
use crate::nozzle::SqlxNozzleRegistry;
use crate::shift::ShiftService;

/// Shared state for the route handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ShiftService>,
    pub registry: Arc<SqlxNozzleRegistry>,
    pub counters: Counters,
    pub started_at: Instant,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/status", get(handlers::status))
        .route("/v1/nozzles", get(handlers::list_nozzles))
        // Shift lifecycle
        .route("/v1/shifts", post(handlers::start_shift))
        .route("/v1/shifts/active", get(handlers::active_shift))
        .route("/v1/shifts/{id}", get(handlers::get_shift))
        .route(
            "/v1/shifts/{id}/readings/{reading_id}",
            patch(handlers::update_reading),
        )
        // Payment ledger
        .route("/v1/shifts/{id}/payments", post(handlers::add_payment))
        .route(
            "/v1/shifts/{id}/payments/{payment_id}",
            put(handlers::update_payment).delete(handlers::delete_payment),
        )
        // Finalization
        .route("/v1/shifts/{id}/complete", post(handlers::complete_shift))
        .route("/v1/shifts/{id}/review", post(handlers::review_shift))
        .route("/v1/shifts/{id}/summary", get(handlers::summary))
        .with_state(state)
}
