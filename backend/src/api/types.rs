//! Request and response bodies for the shift API.
//!
//! Money and meter values serialize as decimal strings; timestamps as
//! RFC 3339. Identity never appears in request bodies, it rides on the
//! `x-user-id` / `x-station-id` / `x-role` headers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::CountersSnapshot;
use crate::nozzle::Nozzle;
use crate::reconcile::{FuelSaleLine, ShiftSummary};
use crate::shift::model::{NozzleReading, PaymentLedger, SessionPayment, SessionRecord};
use crate::time::ms_to_rfc3339;

/* ========================= Requests ========================= */

#[derive(Debug, Deserialize)]
pub struct StartShiftRequest {
    pub name: String,
    pub nozzle_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingPatchRequest {
    #[serde(default)]
    pub test_qty: Option<Decimal>,
    #[serde(default)]
    pub closing: Option<Decimal>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewPaymentRequest {
    pub method: String,
    pub amount: Decimal,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

/// Absent fields leave the stored payment untouched.
#[derive(Debug, Deserialize)]
pub struct PaymentPatchRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteShiftRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewShiftRequest {
    pub approve: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// DELETE carries no body; the revision guard rides the query string.
#[derive(Debug, Deserialize)]
pub struct DeletePaymentQuery {
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

/* ========================= Responses ========================= */

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub station_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub notes: Option<String>,
    pub total_collected: Decimal,
    pub revision: i64,
    pub readings: Vec<ReadingView>,
    pub payments: Vec<PaymentView>,
}

impl From<SessionRecord> for SessionView {
    fn from(record: SessionRecord) -> Self {
        let session = record.session;
        Self {
            session_id: session.session_id,
            station_id: session.station_id,
            user_id: session.user_id,
            name: session.name,
            status: session.status.to_string(),
            started_at: ms_to_rfc3339(session.started_at_ms),
            ended_at: session.ended_at_ms.and_then(ms_to_rfc3339),
            notes: session.notes,
            total_collected: session.total_collected,
            revision: session.revision,
            readings: record.readings.into_iter().map(ReadingView::from).collect(),
            payments: record.payments.into_iter().map(PaymentView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadingView {
    pub reading_id: Uuid,
    pub nozzle_id: Uuid,
    pub nozzle_code: String,
    pub unit_price: Decimal,
    pub opening: Decimal,
    pub test_qty: Decimal,
    pub closing: Option<Decimal>,
    pub dispensed: Option<Decimal>,
}

impl From<NozzleReading> for ReadingView {
    fn from(r: NozzleReading) -> Self {
        Self {
            reading_id: r.reading_id,
            nozzle_id: r.nozzle_id,
            nozzle_code: r.nozzle_code,
            unit_price: r.unit_price,
            opening: r.opening,
            test_qty: r.test_qty,
            closing: r.closing,
            dispensed: r.dispensed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub recorded_at: Option<String>,
}

impl From<SessionPayment> for PaymentView {
    fn from(p: SessionPayment) -> Self {
        Self {
            payment_id: p.payment_id,
            method: p.method,
            amount: p.amount,
            quantity: p.quantity,
            recorded_at: ms_to_rfc3339(p.recorded_at_ms),
        }
    }
}

/// Surviving payment rows plus the recomputed cached total.
#[derive(Debug, Serialize)]
pub struct LedgerView {
    pub payments: Vec<PaymentView>,
    pub total_collected: Decimal,
}

impl From<PaymentLedger> for LedgerView {
    fn from(ledger: PaymentLedger) -> Self {
        Self {
            payments: ledger.payments.into_iter().map(PaymentView::from).collect(),
            total_collected: ledger.total_collected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaleLineView {
    pub nozzle_code: String,
    pub unit_price: Decimal,
    pub dispensed: Decimal,
    pub amount: Decimal,
}

impl From<FuelSaleLine> for SaleLineView {
    fn from(line: FuelSaleLine) -> Self {
        Self {
            nozzle_code: line.nozzle_code,
            unit_price: line.unit_price,
            dispensed: line.dispensed,
            amount: line.amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub session_id: Uuid,
    pub status: String,
    pub lines: Vec<SaleLineView>,
    pub total_fuel_sales: Decimal,
    pub total_collected: Decimal,
    /// Collections minus sales: negative is a shortage, positive an excess.
    pub discrepancy: Decimal,
}

impl From<ShiftSummary> for SummaryView {
    fn from(summary: ShiftSummary) -> Self {
        Self {
            session_id: summary.session_id,
            status: summary.status.to_string(),
            lines: summary.lines.into_iter().map(SaleLineView::from).collect(),
            total_fuel_sales: summary.total_fuel_sales,
            total_collected: summary.total_collected,
            discrepancy: summary.discrepancy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NozzleView {
    pub nozzle_id: Uuid,
    pub code: String,
    pub fuel: String,
    pub unit_price: Decimal,
    pub current_reading: Decimal,
    pub is_available: bool,
    pub is_active: bool,
}

impl From<Nozzle> for NozzleView {
    fn from(n: Nozzle) -> Self {
        Self {
            nozzle_id: n.nozzle_id,
            code: n.code,
            fuel: n.fuel,
            unit_price: n.unit_price,
            current_reading: n.current_reading,
            is_available: n.is_available,
            is_active: n.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub counters: CountersSnapshot,
}
