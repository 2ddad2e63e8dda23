use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{AnyConnection, AnyPool, Row};
use uuid::Uuid;

use crate::db::rows::{parse_decimal, parse_opt_decimal, parse_uuid};
use crate::error::ShiftError;
use crate::shift::model::{
    DutySession, NozzleReading, PaymentLedger, SessionPayment, SessionRecord, ShiftStatus,
};
use crate::shift::repository::{
    CompleteSession, NewPayment, NewSession, PaymentUpdate, ReadingUpdate, ReviewSession,
    ShiftRepository,
};

/// SQLx-backed implementation of ShiftRepository.
///
/// Responsible for persistence, row mapping, and the transactional invariants:
/// nozzle claim/release rides in the same transaction as session
/// insert/finalize, and the availability check IS the conditional UPDATE, not
/// a preceding read. The partial unique index on in-progress sessions closes
/// the duplicate-shift race that a check-then-write cannot.
pub struct SqlxShiftRepository {
    pool: AnyPool,
}

impl SqlxShiftRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftRepository for SqlxShiftRepository {
    async fn start_session(&self, new: NewSession) -> Result<SessionRecord, ShiftError> {
        let station = new.station_id.to_string();
        let mut tx = self.pool.begin().await?;

        // Friendly fast path; the unique index below still closes the race.
        let active = sqlx::query(
            r#"SELECT session_id FROM duty_sessions
               WHERE station_id = ? AND user_id = ? AND status = ?;"#,
        )
        .bind(&station)
        .bind(new.user_id.to_string())
        .bind(ShiftStatus::InProgress.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        if active.is_some() {
            return Err(ShiftError::AlreadyActive);
        }

        // Atomic claim: the WHERE clause re-validates availability inside the
        // writing transaction. A shortfall in rows_affected means at least one
        // nozzle is missing, inactive, or already held.
        let placeholders = vec!["?"; new.nozzle_ids.len()].join(", ");
        let claim_sql = format!(
            "UPDATE nozzles SET is_available = 0 \
             WHERE station_id = ? AND is_active = 1 AND is_available = 1 \
               AND nozzle_id IN ({placeholders});"
        );
        let mut claim = sqlx::query(&claim_sql).bind(&station);
        for id in &new.nozzle_ids {
            claim = claim.bind(id.to_string());
        }
        let claimed = claim.execute(&mut *tx).await?.rows_affected();

        if claimed != new.nozzle_ids.len() as u64 {
            tx.rollback().await?;
            let codes = self.unclaimable_codes(&station, &new.nozzle_ids).await?;
            tracing::debug!(claimed, requested = new.nozzle_ids.len(), "nozzle claim fell short");
            return Err(ShiftError::NozzlesUnavailable { codes });
        }

        let snapshots = fetch_claimed(&mut tx, &station, &new.nozzle_ids).await?;

        let session_id = Uuid::new_v4();
        sqlx::query(
            r#"
INSERT INTO duty_sessions
  (session_id, station_id, user_id, name, status, started_at_ms,
   ended_at_ms, notes, total_collected, revision)
VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, 1);
"#,
        )
        .bind(session_id.to_string())
        .bind(&station)
        .bind(new.user_id.to_string())
        .bind(&new.name)
        .bind(ShiftStatus::InProgress.to_string())
        .bind(new.now_ms)
        .bind(Decimal::ZERO.to_string())
        .execute(&mut *tx)
        .await
        .map_err(unique_to_already_active)?;

        for snap in &snapshots {
            sqlx::query(
                r#"
INSERT INTO session_readings
  (reading_id, session_id, nozzle_id, opening, test_qty, closing, dispensed)
VALUES (?, ?, ?, ?, ?, NULL, NULL);
"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session_id.to_string())
            .bind(snap.nozzle_id.to_string())
            .bind(snap.current_reading.to_string())
            .bind(Decimal::ZERO.to_string())
            .execute(&mut *tx)
            .await?;
        }

        let record = load_record(&mut tx, &station, &session_id.to_string())
            .await?
            .ok_or(ShiftError::SessionNotFound)?;
        tx.commit().await?;

        Ok(record)
    }

    async fn fetch_session(
        &self,
        station_id: &Uuid,
        session_id: &Uuid,
    ) -> Result<Option<SessionRecord>, ShiftError> {
        let mut conn = self.pool.acquire().await?;
        load_record(&mut conn, &station_id.to_string(), &session_id.to_string()).await
    }

    async fn fetch_active_for_user(
        &self,
        station_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<SessionRecord>, ShiftError> {
        let station = station_id.to_string();
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query(
            r#"SELECT session_id FROM duty_sessions
               WHERE station_id = ? AND user_id = ? AND status = ?;"#,
        )
        .bind(&station)
        .bind(user_id.to_string())
        .bind(ShiftStatus::InProgress.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => load_record(&mut conn, &station, &r.get::<String, _>("session_id")).await,
            None => Ok(None),
        }
    }

    async fn update_reading(&self, update: ReadingUpdate) -> Result<NozzleReading, ShiftError> {
        let station = update.station_id.to_string();
        let sid = update.session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        require_open(&head, update.expected_revision)?;

        let row = sqlx::query(
            r#"
SELECT r.reading_id, r.session_id, r.nozzle_id, r.opening, r.test_qty,
       r.closing, r.dispensed, n.code, n.unit_price
FROM session_readings r
JOIN nozzles n ON n.nozzle_id = r.nozzle_id
WHERE r.session_id = ? AND r.reading_id = ?;
"#,
        )
        .bind(&sid)
        .bind(update.reading_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ShiftError::ReadingNotFound)?;
        let stored = row_to_reading(&row)?;

        // Effective values: freshly supplied or stored, never a stale mix.
        let test_qty = update.test_qty.unwrap_or(stored.test_qty);
        let closing = update.closing.or(stored.closing);

        let dispensed = match closing {
            Some(c) => {
                if c < stored.opening {
                    return Err(ShiftError::InvalidClosingReading {
                        closing: c,
                        opening: stored.opening,
                    });
                }
                Some(NozzleReading::dispensed_value(stored.opening, test_qty, c))
            }
            None => None,
        };

        sqlx::query(
            r#"UPDATE session_readings SET test_qty = ?, closing = ?, dispensed = ?
               WHERE reading_id = ?;"#,
        )
        .bind(test_qty.to_string())
        .bind(closing.map(|d| d.to_string()))
        .bind(dispensed.map(|d| d.to_string()))
        .bind(update.reading_id.to_string())
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx, &sid).await?;
        tx.commit().await?;

        Ok(NozzleReading {
            test_qty,
            closing,
            dispensed,
            ..stored
        })
    }

    async fn add_payment(&self, payment: NewPayment) -> Result<PaymentLedger, ShiftError> {
        let station = payment.station_id.to_string();
        let sid = payment.session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        require_open(&head, payment.expected_revision)?;

        sqlx::query(
            r#"
INSERT INTO session_payments
  (payment_id, session_id, method, amount, quantity, recorded_at_ms)
VALUES (?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sid)
        .bind(&payment.method)
        .bind(payment.amount.to_string())
        .bind(payment.quantity.map(|q| q.to_string()))
        .bind(payment.now_ms)
        .execute(&mut *tx)
        .await?;

        let ledger = settle_ledger(&mut tx, &sid).await?;
        tx.commit().await?;
        Ok(ledger)
    }

    async fn update_payment(&self, update: PaymentUpdate) -> Result<PaymentLedger, ShiftError> {
        let station = update.station_id.to_string();
        let sid = update.session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        require_open(&head, update.expected_revision)?;

        let row = sqlx::query(
            r#"SELECT payment_id, session_id, method, amount, quantity, recorded_at_ms
               FROM session_payments WHERE session_id = ? AND payment_id = ?;"#,
        )
        .bind(&sid)
        .bind(update.payment_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ShiftError::PaymentNotFound)?;
        let stored = row_to_payment(&row)?;

        let method = update.method.unwrap_or(stored.method);
        let amount = update.amount.unwrap_or(stored.amount);
        let quantity = update.quantity.or(stored.quantity);

        sqlx::query(
            r#"UPDATE session_payments SET method = ?, amount = ?, quantity = ?
               WHERE payment_id = ?;"#,
        )
        .bind(&method)
        .bind(amount.to_string())
        .bind(quantity.map(|q| q.to_string()))
        .bind(update.payment_id.to_string())
        .execute(&mut *tx)
        .await?;

        let ledger = settle_ledger(&mut tx, &sid).await?;
        tx.commit().await?;
        Ok(ledger)
    }

    async fn delete_payment(
        &self,
        station_id: &Uuid,
        session_id: &Uuid,
        payment_id: &Uuid,
        expected_revision: Option<i64>,
    ) -> Result<PaymentLedger, ShiftError> {
        let station = station_id.to_string();
        let sid = session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        require_open(&head, expected_revision)?;

        let deleted = sqlx::query(
            r#"DELETE FROM session_payments WHERE session_id = ? AND payment_id = ?;"#,
        )
        .bind(&sid)
        .bind(payment_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(ShiftError::PaymentNotFound);
        }

        let ledger = settle_ledger(&mut tx, &sid).await?;
        tx.commit().await?;
        Ok(ledger)
    }

    async fn complete_session(
        &self,
        complete: CompleteSession,
    ) -> Result<SessionRecord, ShiftError> {
        let station = complete.station_id.to_string();
        let sid = complete.session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        require_open(&head, complete.expected_revision)?;

        let readings = load_readings(&mut tx, &sid).await?;
        if readings.iter().all(|r| r.closing.is_none()) {
            return Err(ShiftError::NoClosingReadings);
        }

        // Advance meters where a closing exists; release every nozzle
        // regardless, so none stays locked past session end.
        for reading in &readings {
            if let Some(closing) = reading.closing {
                sqlx::query(r#"UPDATE nozzles SET current_reading = ? WHERE nozzle_id = ?;"#)
                    .bind(closing.to_string())
                    .bind(reading.nozzle_id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let placeholders = vec!["?"; readings.len()].join(", ");
        let release_sql =
            format!("UPDATE nozzles SET is_available = 1 WHERE nozzle_id IN ({placeholders});");
        let mut release = sqlx::query(&release_sql);
        for reading in &readings {
            release = release.bind(reading.nozzle_id.to_string());
        }
        release.execute(&mut *tx).await?;

        let status = if complete.require_verification {
            ShiftStatus::PendingVerification
        } else {
            ShiftStatus::Completed
        };

        sqlx::query(
            r#"UPDATE duty_sessions
               SET status = ?, ended_at_ms = ?, notes = ?, revision = revision + 1
               WHERE session_id = ?;"#,
        )
        .bind(status.to_string())
        .bind(complete.now_ms)
        .bind(complete.notes.as_deref())
        .bind(&sid)
        .execute(&mut *tx)
        .await?;

        let record = load_record(&mut tx, &station, &sid)
            .await?
            .ok_or(ShiftError::SessionNotFound)?;
        tx.commit().await?;
        Ok(record)
    }

    async fn review_session(&self, review: ReviewSession) -> Result<SessionRecord, ShiftError> {
        let station = review.station_id.to_string();
        let sid = review.session_id.to_string();
        let mut tx = self.pool.begin().await?;

        let head = session_head(&mut tx, &station, &sid).await?;
        if head.status != ShiftStatus::PendingVerification {
            return Err(ShiftError::NotPending {
                status: head.status,
            });
        }

        let notes: Option<String> =
            sqlx::query(r#"SELECT notes FROM duty_sessions WHERE session_id = ?;"#)
                .bind(&sid)
                .fetch_one(&mut *tx)
                .await?
                .get("notes");

        let merged = match (notes, review.note) {
            (Some(existing), Some(note)) => Some(format!("{existing}\n{note}")),
            (None, Some(note)) => Some(note),
            (existing, None) => existing,
        };

        let status = if review.approve {
            ShiftStatus::Verified
        } else {
            ShiftStatus::Rejected
        };

        sqlx::query(
            r#"UPDATE duty_sessions
               SET status = ?, notes = ?, revision = revision + 1
               WHERE session_id = ?;"#,
        )
        .bind(status.to_string())
        .bind(merged.as_deref())
        .bind(&sid)
        .execute(&mut *tx)
        .await?;

        let record = load_record(&mut tx, &station, &sid)
            .await?
            .ok_or(ShiftError::SessionNotFound)?;
        tx.commit().await?;
        Ok(record)
    }
}

impl SqlxShiftRepository {
    /// Post-rollback diagnosis of a failed claim: which requested nozzles are
    /// missing, inactive, or held. Advisory only — the conflict itself came
    /// from the conditional UPDATE's row count.
    async fn unclaimable_codes(
        &self,
        station: &str,
        requested: &[Uuid],
    ) -> Result<Vec<String>, ShiftError> {
        let placeholders = vec!["?"; requested.len()].join(", ");
        let sql = format!(
            "SELECT nozzle_id, code, is_available, is_active FROM nozzles \
             WHERE station_id = ? AND nozzle_id IN ({placeholders});"
        );
        let mut query = sqlx::query(&sql).bind(station);
        for id in requested {
            query = query.bind(id.to_string());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut found: HashMap<Uuid, (String, bool)> = HashMap::new();
        for r in rows {
            let id = parse_uuid(&r.get::<String, _>("nozzle_id"), "nozzle_id")?;
            let claimable =
                r.get::<i64, _>("is_available") == 1 && r.get::<i64, _>("is_active") == 1;
            found.insert(id, (r.get("code"), claimable));
        }

        let mut codes = Vec::new();
        for id in requested {
            match found.get(id) {
                None => codes.push(id.to_string()),
                Some((code, false)) => codes.push(code.clone()),
                Some((_, true)) => {}
            }
        }
        Ok(codes)
    }
}

/* =========================
Transaction building blocks
========================= */

struct SessionHead {
    status: ShiftStatus,
    revision: i64,
}

async fn session_head(
    conn: &mut AnyConnection,
    station: &str,
    session_id: &str,
) -> Result<SessionHead, ShiftError> {
    let row = sqlx::query(
        r#"SELECT status, revision FROM duty_sessions
           WHERE station_id = ? AND session_id = ?;"#,
    )
    .bind(station)
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(ShiftError::SessionNotFound)?;

    Ok(SessionHead {
        status: row.get::<String, _>("status").parse()?,
        revision: row.get("revision"),
    })
}

fn require_open(head: &SessionHead, expected_revision: Option<i64>) -> Result<(), ShiftError> {
    if !head.status.is_open() {
        return Err(ShiftError::ShiftClosed {
            status: head.status,
        });
    }
    if let Some(expected) = expected_revision {
        if expected != head.revision {
            return Err(ShiftError::RevisionMismatch {
                expected,
                found: head.revision,
            });
        }
    }
    Ok(())
}

async fn bump_revision(conn: &mut AnyConnection, session_id: &str) -> Result<(), ShiftError> {
    sqlx::query(r#"UPDATE duty_sessions SET revision = revision + 1 WHERE session_id = ?;"#)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Re-sum the payment rows and store the result on the session, then bump the
/// revision. The cached total is only ever written here, inside the same
/// transaction as the payment mutation it reflects.
async fn settle_ledger(
    conn: &mut AnyConnection,
    session_id: &str,
) -> Result<PaymentLedger, ShiftError> {
    let payments = load_payments(&mut *conn, session_id).await?;
    let total: Decimal = payments.iter().map(|p| p.amount).sum();

    sqlx::query(r#"UPDATE duty_sessions SET total_collected = ? WHERE session_id = ?;"#)
        .bind(total.to_string())
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    bump_revision(conn, session_id).await?;

    Ok(PaymentLedger {
        payments,
        total_collected: total,
    })
}

struct ClaimedNozzle {
    nozzle_id: Uuid,
    current_reading: Decimal,
}

async fn fetch_claimed(
    conn: &mut AnyConnection,
    station: &str,
    nozzle_ids: &[Uuid],
) -> Result<Vec<ClaimedNozzle>, ShiftError> {
    let placeholders = vec!["?"; nozzle_ids.len()].join(", ");
    let sql = format!(
        "SELECT nozzle_id, current_reading FROM nozzles \
         WHERE station_id = ? AND nozzle_id IN ({placeholders}) ORDER BY code;"
    );
    let mut query = sqlx::query(&sql).bind(station);
    for id in nozzle_ids {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(ClaimedNozzle {
            nozzle_id: parse_uuid(&r.get::<String, _>("nozzle_id"), "nozzle_id")?,
            current_reading: parse_decimal(
                &r.get::<String, _>("current_reading"),
                "current_reading",
            )?,
        });
    }
    Ok(out)
}

async fn load_record(
    conn: &mut AnyConnection,
    station: &str,
    session_id: &str,
) -> Result<Option<SessionRecord>, ShiftError> {
    let row = sqlx::query(
        r#"
SELECT session_id, station_id, user_id, name, status, started_at_ms,
       ended_at_ms, notes, total_collected, revision
FROM duty_sessions
WHERE station_id = ? AND session_id = ?;
"#,
    )
    .bind(station)
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let session = row_to_session(&row)?;
    let readings = load_readings(conn, session_id).await?;
    let payments = load_payments(conn, session_id).await?;

    Ok(Some(SessionRecord {
        session,
        readings,
        payments,
    }))
}

async fn load_readings(
    conn: &mut AnyConnection,
    session_id: &str,
) -> Result<Vec<NozzleReading>, ShiftError> {
    let rows = sqlx::query(
        r#"
SELECT r.reading_id, r.session_id, r.nozzle_id, r.opening, r.test_qty,
       r.closing, r.dispensed, n.code, n.unit_price
FROM session_readings r
JOIN nozzles n ON n.nozzle_id = r.nozzle_id
WHERE r.session_id = ?
ORDER BY n.code;
"#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(row_to_reading(&r)?);
    }
    Ok(out)
}

async fn load_payments(
    conn: &mut AnyConnection,
    session_id: &str,
) -> Result<Vec<SessionPayment>, ShiftError> {
    let rows = sqlx::query(
        r#"
SELECT payment_id, session_id, method, amount, quantity, recorded_at_ms
FROM session_payments
WHERE session_id = ?
ORDER BY recorded_at_ms, payment_id;
"#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        out.push(row_to_payment(&r)?);
    }
    Ok(out)
}

/* =========================
Row mapping
========================= */

fn row_to_session(r: &sqlx::any::AnyRow) -> Result<DutySession, ShiftError> {
    Ok(DutySession {
        session_id: parse_uuid(&r.get::<String, _>("session_id"), "session_id")?,
        station_id: parse_uuid(&r.get::<String, _>("station_id"), "station_id")?,
        user_id: parse_uuid(&r.get::<String, _>("user_id"), "user_id")?,
        name: r.get("name"),
        status: r.get::<String, _>("status").parse()?,
        started_at_ms: r.get("started_at_ms"),
        ended_at_ms: r.get::<Option<i64>, _>("ended_at_ms"),
        notes: r.get::<Option<String>, _>("notes"),
        total_collected: parse_decimal(&r.get::<String, _>("total_collected"), "total_collected")?,
        revision: r.get("revision"),
    })
}

fn row_to_reading(r: &sqlx::any::AnyRow) -> Result<NozzleReading, ShiftError> {
    Ok(NozzleReading {
        reading_id: parse_uuid(&r.get::<String, _>("reading_id"), "reading_id")?,
        session_id: parse_uuid(&r.get::<String, _>("session_id"), "session_id")?,
        nozzle_id: parse_uuid(&r.get::<String, _>("nozzle_id"), "nozzle_id")?,
        nozzle_code: r.get("code"),
        unit_price: parse_decimal(&r.get::<String, _>("unit_price"), "unit_price")?,
        opening: parse_decimal(&r.get::<String, _>("opening"), "opening")?,
        test_qty: parse_decimal(&r.get::<String, _>("test_qty"), "test_qty")?,
        closing: parse_opt_decimal(r.get::<Option<String>, _>("closing"), "closing")?,
        dispensed: parse_opt_decimal(r.get::<Option<String>, _>("dispensed"), "dispensed")?,
    })
}

fn row_to_payment(r: &sqlx::any::AnyRow) -> Result<SessionPayment, ShiftError> {
    Ok(SessionPayment {
        payment_id: parse_uuid(&r.get::<String, _>("payment_id"), "payment_id")?,
        session_id: parse_uuid(&r.get::<String, _>("session_id"), "session_id")?,
        method: r.get("method"),
        amount: parse_decimal(&r.get::<String, _>("amount"), "amount")?,
        quantity: parse_opt_decimal(r.get::<Option<String>, _>("quantity"), "quantity")?,
        recorded_at_ms: r.get("recorded_at_ms"),
    })
}

fn unique_to_already_active(e: sqlx::Error) -> ShiftError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() || db.message().contains("UNIQUE") {
            return ShiftError::AlreadyActive;
        }
    }
    ShiftError::Store(e)
}
