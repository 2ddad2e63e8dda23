use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::ShiftError;

pub type SessionId = Uuid;

/// Lifecycle states of a duty session.
///
/// `InProgress -> Completed` is the happy path. With verification enabled,
/// completion lands in `PendingVerification` and a supervisor review moves it
/// to `Verified` or `Rejected`. Everything except `InProgress` and
/// `PendingVerification` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftStatus {
    InProgress,
    Completed,
    PendingVerification,
    Verified,
    Rejected,
}

impl ShiftStatus {
    /// Readings and payments are mutable only while the shift is open.
    pub fn is_open(&self) -> bool {
        matches!(self, ShiftStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShiftStatus::Completed | ShiftStatus::Verified | ShiftStatus::Rejected
        )
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShiftStatus::InProgress => "InProgress",
            ShiftStatus::Completed => "Completed",
            ShiftStatus::PendingVerification => "PendingVerification",
            ShiftStatus::Verified => "Verified",
            ShiftStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for ShiftStatus {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InProgress" => Ok(ShiftStatus::InProgress),
            "Completed" => Ok(ShiftStatus::Completed),
            "PendingVerification" => Ok(ShiftStatus::PendingVerification),
            "Verified" => Ok(ShiftStatus::Verified),
            "Rejected" => Ok(ShiftStatus::Rejected),
            other => Err(ShiftError::Malformed(format!("unknown status {other:?}"))),
        }
    }
}

/// One attendant's shift over a set of claimed nozzles.
#[derive(Clone, Debug)]
pub struct DutySession {
    pub session_id: SessionId,
    /// Tenant scope, supplied by the external multi-tenancy layer.
    pub station_id: Uuid,
    /// Owning attendant.
    pub user_id: Uuid,
    /// Human-readable shift name ("morning", "night A", ...).
    pub name: String,
    pub status: ShiftStatus,
    pub started_at_ms: i64,
    pub ended_at_ms: Option<i64>,
    pub notes: Option<String>,
    /// Cached sum of the payment rows, recomputed inside every payment
    /// transaction so dashboards can read it without joining payments.
    pub total_collected: Decimal,
    /// Monotonic counter bumped by every mutation; mutating requests may
    /// carry an expected value and fail on mismatch.
    pub revision: i64,
}

/// Per-nozzle meter record within a shift.
///
/// `opening` is snapshotted from the nozzle at start. `closing` stays None
/// until recorded; `dispensed` is derived whenever `closing` is present.
/// The nozzle's code and live unit price are joined in for rendering and
/// reconciliation.
#[derive(Clone, Debug)]
pub struct NozzleReading {
    pub reading_id: Uuid,
    pub session_id: SessionId,
    pub nozzle_id: Uuid,
    pub nozzle_code: String,
    pub unit_price: Decimal,
    pub opening: Decimal,
    /// Litres burned on the dispenser self-test, excluded from sales.
    pub test_qty: Decimal,
    pub closing: Option<Decimal>,
    pub dispensed: Option<Decimal>,
}

impl NozzleReading {
    /// The one formula for metered volume. A test burn larger than the meter
    /// delta yields a negative value; that is tolerated, not clamped.
    pub fn dispensed_value(opening: Decimal, test_qty: Decimal, closing: Decimal) -> Decimal {
        closing - opening - test_qty
    }
}

/// One cash/card/credit entry in the shift's payment ledger.
#[derive(Clone, Debug)]
pub struct SessionPayment {
    pub payment_id: Uuid,
    pub session_id: SessionId,
    /// Opaque payment-method code; the method catalog is an external
    /// collaborator and is not validated here.
    pub method: String,
    pub amount: Decimal,
    /// Optional metered quantity (e.g. litres on a fuel-card sale).
    pub quantity: Option<Decimal>,
    pub recorded_at_ms: i64,
}

/// A session with its nested ledgers, as returned by every read and by the
/// mutating operations that finalize state.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session: DutySession,
    pub readings: Vec<NozzleReading>,
    pub payments: Vec<SessionPayment>,
}

impl SessionRecord {
    /// Sum of the payment rows. Equals `session.total_collected` whenever the
    /// record was read transactionally; the reconciliation tests assert it.
    pub fn payments_total(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn closing_count(&self) -> usize {
        self.readings.iter().filter(|r| r.closing.is_some()).count()
    }
}

///// Payment-ledger view returned by add/update/delete payment: the surviving
/// rows plus the freshly recomputed cached total.
#[derive(Clone, Debug)]
pub struct PaymentLedger {
    pub payments: Vec<SessionPayment>,
    pub total_collected: Decimal,
}
