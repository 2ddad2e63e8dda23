use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::access::{AccessPolicy, Caller};
use crate::error::{ErrorKind, ShiftError};
use crate::logger::warn_if_slow;
use crate::metrics::Counters;
use crate::reconcile::{self, ShiftSummary};
use crate::shift::model::{NozzleReading, PaymentLedger, SessionRecord};
use crate::shift::repository::{
    CompleteSession, NewPayment, NewSession, PaymentUpdate, ReadingUpdate, ReviewSession,
    ShiftRepository,
};
use crate::time::now_ms;

/// Lifecycle orchestration in front of the transactional repository: shape
/// validation, ownership checks and counter bookkeeping. Station and user
/// identity always come from the [`Caller`], never from request bodies.
pub struct ShiftService {
    repo: Arc<dyn ShiftRepository>,
    access: Arc<dyn AccessPolicy>,
    counters: Counters,
    require_verification: bool,
}

impl ShiftService {
    pub fn new(
        repo: Arc<dyn ShiftRepository>,
        access: Arc<dyn AccessPolicy>,
        counters: Counters,
        require_verification: bool,
    ) -> Self {
        Self {
            repo,
            access,
            counters,
            require_verification,
        }
    }

    /// Opens a shift and claims the listed nozzles in one store transaction.
    #[instrument(
        skip(self, nozzle_ids),
        target = "shift",
        fields(user_id = %caller.user_id, nozzles = nozzle_ids.len())
    )]
    pub async fn start_shift(
        &self,
        caller: &Caller,
        name: &str,
        nozzle_ids: Vec<Uuid>,
    ) -> Result<SessionRecord, ShiftError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShiftError::EmptyName);
        }
        if nozzle_ids.is_empty() {
            return Err(ShiftError::NoNozzles);
        }
        let mut seen = HashSet::with_capacity(nozzle_ids.len());
        for id in &nozzle_ids {
            if !seen.insert(*id) {
                return Err(ShiftError::DuplicateNozzle(*id));
            }
        }

        let new = NewSession {
            station_id: caller.station_id,
            user_id: caller.user_id,
            name: name.to_string(),
            nozzle_ids,
            now_ms: now_ms(),
        };

        let result = warn_if_slow("db_start_session", Duration::from_millis(250), async {
            self.repo.start_session(new).await
        })
        .await;

        match &result {
            Ok(record) => {
                self.counters.shifts_started.fetch_add(1, Ordering::Relaxed);
                info!(session_id = %record.session.session_id, "shift started");
            }
            Err(e) if e.kind() == ErrorKind::Conflict => {
                self.counters.start_conflicts.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "shift start lost to a concurrent claim");
            }
            Err(_) => {}
        }
        result
    }

    #[instrument(skip(self), target = "shift", fields(session_id = %session_id))]
    pub async fn get_shift(
        &self,
        caller: &Caller,
        session_id: &Uuid,
    ) -> Result<SessionRecord, ShiftError> {
        self.authorize(caller, session_id).await
    }

    /// The caller's own in-progress shift; not-found when none is open.
    #[instrument(skip(self), target = "shift", fields(user_id = %caller.user_id))]
    pub async fn active_shift(&self, caller: &Caller) -> Result<SessionRecord, ShiftError> {
        self.repo
            .fetch_active_for_user(&caller.station_id, &caller.user_id)
            .await?
            .ok_or(ShiftError::SessionNotFound)
    }

    #[instrument(
        skip(self),
        target = "shift",
        fields(session_id = %session_id, reading_id = %reading_id)
    )]
    pub async fn update_reading(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        reading_id: &Uuid,
        test_qty: Option<Decimal>,
        closing: Option<Decimal>,
        expected_revision: Option<i64>,
    ) -> Result<NozzleReading, ShiftError> {
        if let Some(qty) = test_qty {
            if qty < Decimal::ZERO {
                return Err(ShiftError::NegativeTestQty(qty));
            }
        }
        self.authorize(caller, session_id).await?;

        let update = ReadingUpdate {
            station_id: caller.station_id,
            session_id: *session_id,
            reading_id: *reading_id,
            test_qty,
            closing,
            expected_revision,
        };
        let reading = warn_if_slow("db_update_reading", Duration::from_millis(150), async {
            self.repo.update_reading(update).await
        })
        .await?;

        self.counters.readings_updated.fetch_add(1, Ordering::Relaxed);
        Ok(reading)
    }

    #[instrument(skip(self, method), target = "shift", fields(session_id = %session_id))]
    pub async fn add_payment(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        method: &str,
        amount: Decimal,
        quantity: Option<Decimal>,
        expected_revision: Option<i64>,
    ) -> Result<PaymentLedger, ShiftError> {
        if amount <= Decimal::ZERO {
            return Err(ShiftError::NonPositiveAmount(amount));
        }
        let method = method.trim();
        if method.is_empty() {
            return Err(ShiftError::EmptyMethod);
        }
        if let Some(qty) = quantity {
            if qty < Decimal::ZERO {
                return Err(ShiftError::NegativeQuantity(qty));
            }
        }
        self.authorize(caller, session_id).await?;

        let payment = NewPayment {
            station_id: caller.station_id,
            session_id: *session_id,
            method: method.to_string(),
            amount,
            quantity,
            now_ms: now_ms(),
            expected_revision,
        };
        let ledger = warn_if_slow("db_add_payment", Duration::from_millis(150), async {
            self.repo.add_payment(payment).await
        })
        .await?;

        self.counters.payment_mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ledger)
    }

    #[instrument(
        skip(self, method),
        target = "shift",
        fields(session_id = %session_id, payment_id = %payment_id)
    )]
    pub async fn update_payment(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        payment_id: &Uuid,
        method: Option<String>,
        amount: Option<Decimal>,
        quantity: Option<Decimal>,
        expected_revision: Option<i64>,
    ) -> Result<PaymentLedger, ShiftError> {
        if let Some(amount) = amount {
            if amount <= Decimal::ZERO {
                return Err(ShiftError::NonPositiveAmount(amount));
            }
        }
        if let Some(ref method) = method {
            if method.trim().is_empty() {
                return Err(ShiftError::EmptyMethod);
            }
        }
        if let Some(qty) = quantity {
            if qty < Decimal::ZERO {
                return Err(ShiftError::NegativeQuantity(qty));
            }
        }
        self.authorize(caller, session_id).await?;

        let update = PaymentUpdate {
            station_id: caller.station_id,
            session_id: *session_id,
            payment_id: *payment_id,
            method,
            amount,
            quantity,
            expected_revision,
        };
        let ledger = warn_if_slow("db_update_payment", Duration::from_millis(150), async {
            self.repo.update_payment(update).await
        })
        .await?;

        self.counters.payment_mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ledger)
    }

    #[instrument(
        skip(self),
        target = "shift",
        fields(session_id = %session_id, payment_id = %payment_id)
    )]
    pub async fn delete_payment(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        payment_id: &Uuid,
        expected_revision: Option<i64>,
    ) -> Result<PaymentLedger, ShiftError> {
        self.authorize(caller, session_id).await?;

        let ledger = warn_if_slow("db_delete_payment", Duration::from_millis(150), async {
            self.repo
                .delete_payment(&caller.station_id, session_id, payment_id, expected_revision)
                .await
        })
        .await?;

        self.counters.payment_mutations.fetch_add(1, Ordering::Relaxed);
        Ok(ledger)
    }

    /// Finalizes the shift: releases every claimed nozzle, rolls meters
    /// forward and lands on `Completed` or `PendingVerification` depending on
    /// configuration.
    #[instrument(skip(self, notes), target = "shift", fields(session_id = %session_id))]
    pub async fn complete_shift(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        notes: Option<String>,
        expected_revision: Option<i64>,
    ) -> Result<SessionRecord, ShiftError> {
        self.authorize(caller, session_id).await?;

        let complete = CompleteSession {
            station_id: caller.station_id,
            session_id: *session_id,
            notes,
            now_ms: now_ms(),
            require_verification: self.require_verification,
            expected_revision,
        };
        let record = warn_if_slow("db_complete_session", Duration::from_millis(250), async {
            self.repo.complete_session(complete).await
        })
        .await?;

        self.counters.shifts_completed.fetch_add(1, Ordering::Relaxed);
        info!(status = %record.session.status, "shift completed");
        Ok(record)
    }

    /// Supervisor verdict on a pending shift. Ownership is irrelevant here;
    /// the role check alone gates it.
    #[instrument(
        skip(self, note),
        target = "shift",
        fields(session_id = %session_id, approve)
    )]
    pub async fn review_shift(
        &self,
        caller: &Caller,
        session_id: &Uuid,
        approve: bool,
        note: Option<String>,
    ) -> Result<SessionRecord, ShiftError> {
        if !self.access.is_privileged(caller) {
            warn!(role = %caller.role, "review attempted without a privileged role");
            return Err(ShiftError::Forbidden);
        }

        let review = ReviewSession {
            station_id: caller.station_id,
            session_id: *session_id,
            approve,
            note,
        };
        let record = self.repo.review_session(review).await?;

        self.counters.shifts_reviewed.fetch_add(1, Ordering::Relaxed);
        info!(status = %record.session.status, "shift reviewed");
        Ok(record)
    }

    /// Sales-vs-collections summary, computed from a transactional read.
    #[instrument(skip(self), target = "shift", fields(session_id = %session_id))]
    pub async fn summary(
        &self,
        caller: &Caller,
        session_id: &Uuid,
    ) -> Result<ShiftSummary, ShiftError> {
        let record = self.authorize(caller, session_id).await?;
        self.counters.summaries_served.fetch_add(1, Ordering::Relaxed);
        Ok(reconcile::summarize(&record))
    }

    /// Loads the session and enforces the access policy against its owner.
    async fn authorize(
        &self,
        caller: &Caller,
        session_id: &Uuid,
    ) -> Result<SessionRecord, ShiftError> {
        debug!(session_id = %session_id, "loading session for access check");
        let record = self
            .repo
            .fetch_session(&caller.station_id, session_id)
            .await?
            .ok_or(ShiftError::SessionNotFound)?;

        if !self.access.can_access(caller, &record.session.user_id) {
            warn!(owner = %record.session.user_id, "access denied to foreign shift");
            return Err(ShiftError::Forbidden);
        }
        Ok(record)
    }
}
