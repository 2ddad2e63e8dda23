use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::ShiftError;
use crate::shift::model::{NozzleReading, PaymentLedger, SessionRecord};

/// Inputs for `start_session`, already shape-validated by the service
/// (non-empty trimmed name, non-empty distinct nozzle ids).
#[derive(Clone, Debug)]
pub struct NewSession {
    pub station_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub nozzle_ids: Vec<Uuid>,
    pub now_ms: i64,
}

/// Patch for one reading. `None` leaves the stored value in place; dispensed
/// is always recomputed from the effective (fresh) values inside the store
/// transaction, never from stale inputs.
#[derive(Clone, Debug)]
pub struct ReadingUpdate {
    pub station_id: Uuid,
    pub session_id: Uuid,
    pub reading_id: Uuid,
    pub test_qty: Option<Decimal>,
    pub closing: Option<Decimal>,
    pub expected_revision: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct NewPayment {
    pub station_id: Uuid,
    pub session_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub now_ms: i64,
    pub expected_revision: Option<i64>,
}

/// Patch for one payment; `None` fields are left unchanged.
#[derive(Clone, Debug)]
pub struct PaymentUpdate {
    pub station_id: Uuid,
    pub session_id: Uuid,
    pub payment_id: Uuid,
    pub method: Option<String>,
    pub amount: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub expected_revision: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct CompleteSession {
    pub station_id: Uuid,
    pub session_id: Uuid,
    pub notes: Option<String>,
    pub now_ms: i64,
    /// Target `PendingVerification` instead of `Completed`.
    pub require_verification: bool,
    pub expected_revision: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ReviewSession {
    pub station_id: Uuid,
    pub session_id: Uuid,
    pub approve: bool,
    pub note: Option<String>,
}

/// Persistence seam for the shift lifecycle.
///
/// Every mutating method is one store transaction and re-validates session
/// state inside it; implementations must never leave nozzles half-claimed or
/// the cached total out of sync with the payment rows.
#[async_trait]
pub trait ShiftRepository: Send + Sync {
    async fn start_session(&self, new: NewSession) -> Result<SessionRecord, ShiftError>;

    async fn fetch_session(
        &self,
        station_id: &Uuid,
        session_id: &Uuid,
    ) -> Result<Option<SessionRecord>, ShiftError>;

    /// The caller's in-progress session, if any.
    async fn fetch_active_for_user(
        &self,
        station_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<SessionRecord>, ShiftError>;

    async fn update_reading(&self, update: ReadingUpdate) -> Result<NozzleReading, ShiftError>;

    async fn add_payment(&self, payment: NewPayment) -> Result<PaymentLedger, ShiftError>;

    async fn update_payment(&self, update: PaymentUpdate) -> Result<PaymentLedger, ShiftError>;

    async fn delete_payment(
        &self,
        station_id: &Uuid,
        session_id: &Uuid,
        payment_id: &Uuid,
        expected_revision: Option<i64>,
    ) -> Result<PaymentLedger, ShiftError>;

    async fn complete_session(&self, complete: CompleteSession)
    -> Result<SessionRecord, ShiftError>;

    async fn review_session(&self, review: ReviewSession) -> Result<SessionRecord, ShiftError>;
}
