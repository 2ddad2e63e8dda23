//! Route handlers. Each request runs under a root span carrying a fresh
//! trace id; the station (and session, where known) are recorded onto it
//! before the service is invoked.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use tracing::Instrument;
use uuid::Uuid;

use common::{TraceId, root_span};

use crate::access::{Caller, Role};
use crate::api::error::ApiError;
use crate::api::state::ApiState;
use crate::api::types::{
    CompleteShiftRequest, DeletePaymentQuery, LedgerView, NewPaymentRequest, NozzleView,
    PaymentPatchRequest, ReadingPatchRequest, ReadingView, ReviewShiftRequest, SessionView,
    StartShiftRequest, StatusView, SummaryView,
};
use crate::logger::annotate_span;

/* ========================= Identity headers ========================= */

/// Builds the caller from the gateway-supplied identity headers. The role
/// header is optional and defaults to the least-privileged role.
fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id = uuid_header(headers, "x-user-id")?;
    let station_id = uuid_header(headers, "x-station-id")?;
    let role = match headers.get("x-role") {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| s.parse::<Role>().ok())
            .ok_or(ApiError::BadHeader("x-role"))?,
        None => Role::Attendant,
    };
    Ok(Caller {
        user_id,
        station_id,
        role,
    })
}

fn uuid_header(headers: &HeaderMap, name: &'static str) -> Result<Uuid, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(ApiError::BadHeader(name))
}

/* ========================= Shift lifecycle ========================= */

pub async fn start_shift(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<StartShiftRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let span = root_span("start_shift", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, None);

        let record = state
            .service
            .start_shift(&caller, &body.name, body.nozzle_ids)
            .await?;
        Ok((StatusCode::CREATED, Json(record.into())))
    }
    .instrument(span)
    .await
}

pub async fn get_shift(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let span = root_span("get_shift", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let record = state.service.get_shift(&caller, &session_id).await?;
        Ok(Json(record.into()))
    }
    .instrument(span)
    .await
}

pub async fn active_shift(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SessionView>, ApiError> {
    let span = root_span("active_shift", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, None);

        let record = state.service.active_shift(&caller).await?;
        Ok(Json(record.into()))
    }
    .instrument(span)
    .await
}

pub async fn update_reading(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((session_id, reading_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReadingPatchRequest>,
) -> Result<Json<ReadingView>, ApiError> {
    let span = root_span("update_reading", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let reading = state
            .service
            .update_reading(
                &caller,
                &session_id,
                &reading_id,
                body.test_qty,
                body.closing,
                body.expected_revision,
            )
            .await?;
        Ok(Json(reading.into()))
    }
    .instrument(span)
    .await
}

/* ========================= Payment ledger ========================= */

pub async fn add_payment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
    Json(body): Json<NewPaymentRequest>,
) -> Result<(StatusCode, Json<LedgerView>), ApiError> {
    let span = root_span("add_payment", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let ledger = state
            .service
            .add_payment(
                &caller,
                &session_id,
                &body.method,
                body.amount,
                body.quantity,
                body.expected_revision,
            )
            .await?;
        Ok((StatusCode::CREATED, Json(ledger.into())))
    }
    .instrument(span)
    .await
}

pub async fn update_payment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((session_id, payment_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<PaymentPatchRequest>,
) -> Result<Json<LedgerView>, ApiError> {
    let span = root_span("update_payment", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let ledger = state
            .service
            .update_payment(
                &caller,
                &session_id,
                &payment_id,
                body.method,
                body.amount,
                body.quantity,
                body.expected_revision,
            )
            .await?;
        Ok(Json(ledger.into()))
    }
    .instrument(span)
    .await
}

pub async fn delete_payment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((session_id, payment_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<DeletePaymentQuery>,
) -> Result<Json<LedgerView>, ApiError> {
    let span = root_span("delete_payment", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let ledger = state
            .service
            .delete_payment(&caller, &session_id, &payment_id, query.expected_revision)
            .await?;
        Ok(Json(ledger.into()))
    }
    .instrument(span)
    .await
}

/* ========================= Finalization ========================= */

pub async fn complete_shift(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
    Json(body): Json<CompleteShiftRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let span = root_span("complete_shift", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let record = state
            .service
            .complete_shift(&caller, &session_id, body.notes, body.expected_revision)
            .await?;
        Ok(Json(record.into()))
    }
    .instrument(span)
    .await
}

pub async fn review_shift(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
    Json(body): Json<ReviewShiftRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let span = root_span("review_shift", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let record = state
            .service
            .review_shift(&caller, &session_id, body.approve, body.note)
            .await?;
        Ok(Json(record.into()))
    }
    .instrument(span)
    .await
}

pub async fn summary(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SummaryView>, ApiError> {
    let span = root_span("summary", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, Some(&session_id));

        let summary = state.service.summary(&caller, &session_id).await?;
        Ok(Json(summary.into()))
    }
    .instrument(span)
    .await
}

/* ========================= Station surface ========================= */

pub async fn list_nozzles(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<NozzleView>>, ApiError> {
    let span = root_span("list_nozzles", &TraceId::new());
    async move {
        let caller = caller_from_headers(&headers)?;
        annotate_span(&caller.station_id, None);

        let nozzles = state.registry.list(&caller.station_id).await?;
        Ok(Json(nozzles.into_iter().map(NozzleView::from).collect()))
    }
    .instrument(span)
    .await
}

pub async fn status(State(state): State<ApiState>) -> Json<StatusView> {
    Json(StatusView {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        counters: state.counters.snapshot(),
    })
}
