use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tokio::task::JoinSet;
use uuid::Uuid;

use backend::db::schema;
use backend::error::ShiftError;
use backend::nozzle::{Nozzle, SqlxNozzleRegistry};
use backend::shift::SqlxShiftRepository;
use backend::shift::model::ShiftStatus;
use backend::shift::repository::{
    CompleteSession, NewPayment, NewSession, PaymentUpdate, ReadingUpdate, ReviewSession,
    ShiftRepository,
};

/// Helper to setup an isolated, unique in-memory SQLite database.
/// Using a unique name in the connection string prevents cross-test collisions
/// during parallel execution while still allowing shared cache access.
async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();
    pool
}

async fn seed_nozzle(
    pool: &AnyPool,
    station: &Uuid,
    code: &str,
    price: Decimal,
    reading: Decimal,
) -> Uuid {
    let nozzle = Nozzle {
        nozzle_id: Uuid::new_v4(),
        station_id: *station,
        code: code.to_string(),
        fuel: "petrol".to_string(),
        unit_price: price,
        current_reading: reading,
        is_available: true,
        is_active: true,
    };
    SqlxNozzleRegistry::new(pool.clone())
        .insert(&nozzle)
        .await
        .unwrap();
    nozzle.nozzle_id
}

fn start_req(station: Uuid, user: Uuid, nozzles: Vec<Uuid>) -> NewSession {
    NewSession {
        station_id: station,
        user_id: user,
        name: "morning".to_string(),
        nozzle_ids: nozzles,
        now_ms: 1_700_000_000_000,
    }
}

fn patch(station: Uuid, session: Uuid, reading: Uuid) -> ReadingUpdate {
    ReadingUpdate {
        station_id: station,
        session_id: session,
        reading_id: reading,
        test_qty: None,
        closing: None,
        expected_revision: None,
    }
}

fn pay(station: Uuid, session: Uuid, amount: Decimal, now_ms: i64) -> NewPayment {
    NewPayment {
        station_id: station,
        session_id: session,
        method: "cash".to_string(),
        amount,
        quantity: None,
        now_ms,
        expected_revision: None,
    }
}

fn finish(station: Uuid, session: Uuid) -> CompleteSession {
    CompleteSession {
        station_id: station,
        session_id: session,
        notes: None,
        now_ms: 1_700_000_200_000,
        require_verification: false,
        expected_revision: None,
    }
}

fn d(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

async fn nozzle_state(pool: &AnyPool, id: &Uuid) -> (bool, Decimal) {
    let row = sqlx::query("SELECT is_available, current_reading FROM nozzles WHERE nozzle_id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .unwrap();
    (
        row.get::<i64, _>("is_available") == 1,
        d(&row.get::<String, _>("current_reading")),
    )
}

#[tokio::test]
async fn start_claims_nozzles_and_snapshots_openings() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let user = Uuid::new_v4();

    let n1 = seed_nozzle(&pool, &station, "P1-D1", dec!(100), dec!(100.0)).await;
    let n2 = seed_nozzle(&pool, &station, "P1-D2", dec!(90), dec!(250.0)).await;

    let record = repo
        .start_session(start_req(station, user, vec![n1, n2]))
        .await
        .unwrap();

    assert_eq!(record.session.status, ShiftStatus::InProgress);
    assert_eq!(record.session.revision, 1);
    assert_eq!(record.session.total_collected, dec!(0));
    assert_eq!(record.readings.len(), 2);
    assert!(record.payments.is_empty());

    // Readings are code-ordered with openings copied from the meters.
    assert_eq!(record.readings[0].nozzle_code, "P1-D1");
    assert_eq!(record.readings[0].opening, dec!(100));
    assert_eq!(record.readings[0].test_qty, dec!(0));
    assert!(record.readings[0].closing.is_none());
    assert_eq!(record.readings[1].opening, dec!(250));

    let (free1, _) = nozzle_state(&pool, &n1).await;
    let (free2, _) = nozzle_state(&pool, &n2).await;
    assert!(!free1 && !free2, "both nozzles must be claimed");
}

#[tokio::test]
async fn start_lists_every_unclaimable_code() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();

    let free = seed_nozzle(&pool, &station, "A1", dec!(100), dec!(0)).await;
    let held = seed_nozzle(&pool, &station, "B1", dec!(100), dec!(0)).await;
    let dead = seed_nozzle(&pool, &station, "C1", dec!(100), dec!(0)).await;
    sqlx::query("UPDATE nozzles SET is_available = 0 WHERE nozzle_id = ?")
        .bind(held.to_string())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE nozzles SET is_active = 0 WHERE nozzle_id = ?")
        .bind(dead.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let err = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![free, held, dead]))
        .await
        .unwrap_err();

    match err {
        ShiftError::NozzlesUnavailable { codes } => {
            assert!(codes.contains(&"B1".to_string()));
            assert!(codes.contains(&"C1".to_string()));
            assert!(!codes.contains(&"A1".to_string()));
        }
        other => panic!("expected NozzlesUnavailable, got {other:?}"),
    }

    // No partial reservation: the free nozzle must stay free.
    let (still_free, _) = nozzle_state(&pool, &free).await;
    assert!(still_free, "claim must roll back atomically");
}

#[tokio::test]
async fn start_reports_unknown_nozzles() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let ghost = Uuid::new_v4();

    let err = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![ghost]))
        .await
        .unwrap_err();

    match err {
        ShiftError::NozzlesUnavailable { codes } => {
            assert_eq!(codes, vec![ghost.to_string()]);
        }
        other => panic!("expected NozzlesUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn second_start_for_same_user_is_rejected() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let user = Uuid::new_v4();

    let n1 = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;
    let n2 = seed_nozzle(&pool, &station, "P2", dec!(100), dec!(0)).await;

    repo.start_session(start_req(station, user, vec![n1]))
        .await
        .unwrap();

    let err = repo
        .start_session(start_req(station, user, vec![n2]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::AlreadyActive));

    let (free, _) = nozzle_state(&pool, &n2).await;
    assert!(free, "rejected start must not leave its nozzle claimed");
}

#[tokio::test]
async fn concurrent_starts_on_one_nozzle_admit_exactly_one() {
    let pool = setup_db().await;
    let repo = Arc::new(SqlxShiftRepository::new(pool.clone()));
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let mut set = JoinSet::new();
    for _ in 0..6 {
        let r = Arc::clone(&repo);
        set.spawn(async move {
            r.start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
                .await
        });
    }

    let mut winners = 0;
    while let Some(res) = set.join_next().await {
        match res.expect("task panicked") {
            Ok(_) => winners += 1,
            Err(ShiftError::NozzlesUnavailable { .. }) | Err(ShiftError::Store(_)) => {}
            Err(other) => panic!("unexpected loss reason: {other:?}"),
        }
    }
    assert_eq!(winners, 1, "exactly one start may claim the nozzle");

    let (free, _) = nozzle_state(&pool, &nozzle).await;
    assert!(!free);
}

#[tokio::test]
async fn concurrent_starts_by_one_user_leave_one_active_session() {
    let pool = setup_db().await;
    let repo = Arc::new(SqlxShiftRepository::new(pool.clone()));
    let station = Uuid::new_v4();
    let user = Uuid::new_v4();

    let n1 = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;
    let n2 = seed_nozzle(&pool, &station, "P2", dec!(100), dec!(0)).await;

    let mut set = JoinSet::new();
    for nozzle in [n1, n2] {
        let r = Arc::clone(&repo);
        set.spawn(async move { r.start_session(start_req(station, user, vec![nozzle])).await });
    }

    let mut winners = 0;
    while let Some(res) = set.join_next().await {
        match res.expect("task panicked") {
            Ok(_) => winners += 1,
            Err(ShiftError::AlreadyActive) | Err(ShiftError::Store(_)) => {}
            Err(other) => panic!("unexpected loss reason: {other:?}"),
        }
    }
    assert_eq!(winners, 1);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM duty_sessions WHERE user_id = ? AND status = 'InProgress'",
    )
    .bind(user.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1, "the unique index must hold under races");
}

#[tokio::test]
async fn dispensed_is_recomputed_from_fresh_values() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let user = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(90), dec!(250.0)).await;

    let record = repo
        .start_session(start_req(station, user, vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;
    let reading = record.readings[0].reading_id;

    // Closing alone: dispensed = 300 - 250 - 0.
    let updated = repo
        .update_reading(ReadingUpdate {
            closing: Some(dec!(300.0)),
            ..patch(station, session, reading)
        })
        .await
        .unwrap();
    assert_eq!(updated.dispensed, Some(dec!(50.0)));

    // A later test burn must flow into the recompute: 300 - 250 - 5.
    let updated = repo
        .update_reading(ReadingUpdate {
            test_qty: Some(dec!(5)),
            ..patch(station, session, reading)
        })
        .await
        .unwrap();
    assert_eq!(updated.test_qty, dec!(5));
    assert_eq!(updated.closing, Some(dec!(300.0)));
    assert_eq!(updated.dispensed, Some(dec!(45.0)));

    // Two mutations on top of the initial revision.
    let fetched = repo.fetch_session(&station, &session).await.unwrap().unwrap();
    assert_eq!(fetched.session.revision, 3);
    assert_eq!(fetched.readings[0].dispensed, Some(dec!(45.0)));
}

#[tokio::test]
async fn closing_below_opening_is_rejected_without_mutation() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(100.0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;
    let reading = record.readings[0].reading_id;

    let err = repo
        .update_reading(ReadingUpdate {
            closing: Some(dec!(90)),
            ..patch(station, session, reading)
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftError::InvalidClosingReading { closing, opening }
            if closing == dec!(90) && opening == dec!(100)
    ));

    let fetched = repo.fetch_session(&station, &session).await.unwrap().unwrap();
    assert!(fetched.readings[0].closing.is_none());
    assert!(fetched.readings[0].dispensed.is_none());
    assert_eq!(fetched.session.revision, 1, "rejected write must not bump");
}

#[tokio::test]
async fn test_qty_alone_is_a_valid_mid_shift_state() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();

    let updated = repo
        .update_reading(ReadingUpdate {
            test_qty: Some(dec!(5)),
            ..patch(station, record.session.session_id, record.readings[0].reading_id)
        })
        .await
        .unwrap();

    assert_eq!(updated.test_qty, dec!(5));
    assert!(updated.closing.is_none());
    assert!(updated.dispensed.is_none());
}

#[tokio::test]
async fn payment_mutations_keep_the_cached_total_in_step() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;

    let ledger = repo
        .add_payment(pay(station, session, dec!(500), 1_700_000_100_000))
        .await
        .unwrap();
    assert_eq!(ledger.total_collected, dec!(500));

    let ledger = repo
        .add_payment(pay(station, session, dec!(250), 1_700_000_100_001))
        .await
        .unwrap();
    assert_eq!(ledger.total_collected, dec!(750));
    assert_eq!(ledger.payments.len(), 2);

    // The denormalized column matches the rows after every mutation.
    let cached: String =
        sqlx::query_scalar("SELECT total_collected FROM duty_sessions WHERE session_id = ?")
            .bind(session.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(d(&cached), dec!(750));

    let second = ledger.payments[1].payment_id;
    let ledger = repo
        .update_payment(PaymentUpdate {
            station_id: station,
            session_id: session,
            payment_id: second,
            method: Some("card".to_string()),
            amount: Some(dec!(300)),
            quantity: None,
            expected_revision: None,
        })
        .await
        .unwrap();
    assert_eq!(ledger.total_collected, dec!(800));
    assert_eq!(ledger.payments[1].method, "card");

    let ledger = repo
        .delete_payment(&station, &session, &second, None)
        .await
        .unwrap();
    assert_eq!(ledger.total_collected, dec!(500));
    assert_eq!(ledger.payments.len(), 1);

    let cached: String =
        sqlx::query_scalar("SELECT total_collected FROM duty_sessions WHERE session_id = ?")
            .bind(session.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(d(&cached), dec!(500));
}

#[tokio::test]
async fn deleting_a_foreign_payment_is_not_found() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();

    let err = repo
        .delete_payment(
            &station,
            &record.session.session_id,
            &Uuid::new_v4(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::PaymentNotFound));
}

#[tokio::test]
async fn stale_revision_is_detected() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;

    // Guarded write against the fresh revision succeeds and bumps it.
    repo.add_payment(NewPayment {
        expected_revision: Some(1),
        ..pay(station, session, dec!(100), 1_700_000_100_000)
    })
    .await
    .unwrap();

    // A second writer still holding revision 1 must be turned away.
    let err = repo
        .add_payment(NewPayment {
            expected_revision: Some(1),
            ..pay(station, session, dec!(100), 1_700_000_100_001)
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftError::RevisionMismatch { expected: 1, found: 2 }
    ));
}

#[tokio::test]
async fn completing_without_any_closing_reading_fails() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();

    let err = repo
        .complete_session(finish(station, record.session.session_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::NoClosingReadings));

    // Still open, nozzle still held.
    let fetched = repo
        .fetch_session(&station, &record.session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.session.status, ShiftStatus::InProgress);
    let (free, _) = nozzle_state(&pool, &nozzle).await;
    assert!(!free);
}

#[tokio::test]
async fn complete_releases_all_nozzles_and_advances_closed_meters() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();

    let closed = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(100.0)).await;
    let untouched = seed_nozzle(&pool, &station, "P2", dec!(90), dec!(250.0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![closed, untouched]))
        .await
        .unwrap();
    let session = record.session.session_id;

    repo.update_reading(ReadingUpdate {
        closing: Some(dec!(150.0)),
        ..patch(station, session, record.readings[0].reading_id)
    })
    .await
    .unwrap();

    let done = repo
        .complete_session(CompleteSession {
            notes: Some("evening handover".to_string()),
            ..finish(station, session)
        })
        .await
        .unwrap();

    assert_eq!(done.session.status, ShiftStatus::Completed);
    assert_eq!(done.session.ended_at_ms, Some(1_700_000_200_000));
    assert_eq!(done.session.notes.as_deref(), Some("evening handover"));

    // Closed meter advanced; unclosed meter untouched; both released.
    let (free1, meter1) = nozzle_state(&pool, &closed).await;
    let (free2, meter2) = nozzle_state(&pool, &untouched).await;
    assert!(free1 && free2, "every session nozzle must be released");
    assert_eq!(meter1, dec!(150));
    assert_eq!(meter2, dec!(250));
}

#[tokio::test]
async fn closed_sessions_reject_further_mutation() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;
    let reading = record.readings[0].reading_id;

    repo.update_reading(ReadingUpdate {
        closing: Some(dec!(10)),
        ..patch(station, session, reading)
    })
    .await
    .unwrap();
    repo.complete_session(finish(station, session)).await.unwrap();

    let err = repo
        .add_payment(pay(station, session, dec!(100), 1_700_000_300_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftError::ShiftClosed { status: ShiftStatus::Completed }
    ));

    let err = repo
        .update_reading(ReadingUpdate {
            test_qty: Some(dec!(1)),
            ..patch(station, session, reading)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::ShiftClosed { .. }));
}

#[tokio::test]
async fn verification_flow_lands_on_a_reviewed_status() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;

    repo.update_reading(ReadingUpdate {
        closing: Some(dec!(10)),
        ..patch(station, session, record.readings[0].reading_id)
    })
    .await
    .unwrap();

    let pending = repo
        .complete_session(CompleteSession {
            require_verification: true,
            notes: Some("cash counted".to_string()),
            ..finish(station, session)
        })
        .await
        .unwrap();
    assert_eq!(pending.session.status, ShiftStatus::PendingVerification);

    // Pending is closed for edits but open for review.
    let err = repo
        .add_payment(pay(station, session, dec!(1), 1_700_000_300_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::ShiftClosed { .. }));

    let reviewed = repo
        .review_session(ReviewSession {
            station_id: station,
            session_id: session,
            approve: false,
            note: Some("short by 50".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(reviewed.session.status, ShiftStatus::Rejected);
    assert_eq!(
        reviewed.session.notes.as_deref(),
        Some("cash counted\nshort by 50")
    );

    // A verdict is final.
    let err = repo
        .review_session(ReviewSession {
            station_id: station,
            session_id: session,
            approve: true,
            note: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftError::NotPending { status: ShiftStatus::Rejected }
    ));
}

#[tokio::test]
async fn review_approval_verifies_the_session() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;

    repo.update_reading(ReadingUpdate {
        closing: Some(dec!(10)),
        ..patch(station, session, record.readings[0].reading_id)
    })
    .await
    .unwrap();
    repo.complete_session(CompleteSession {
        require_verification: true,
        ..finish(station, session)
    })
    .await
    .unwrap();

    let reviewed = repo
        .review_session(ReviewSession {
            station_id: station,
            session_id: session,
            approve: true,
            note: None,
        })
        .await
        .unwrap();
    assert_eq!(reviewed.session.status, ShiftStatus::Verified);

    // Reviewing a session that was never pending is a conflict.
    let fresh_nozzle = seed_nozzle(&pool, &station, "P9", dec!(100), dec!(0)).await;
    let fresh = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![fresh_nozzle]))
        .await
        .unwrap();
    let err = repo
        .review_session(ReviewSession {
            station_id: station,
            session_id: fresh.session.session_id,
            approve: true,
            note: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShiftError::NotPending { status: ShiftStatus::InProgress }
    ));
}

#[tokio::test]
async fn fetch_active_tracks_the_lifecycle() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let user = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    assert!(
        repo.fetch_active_for_user(&station, &user)
            .await
            .unwrap()
            .is_none()
    );

    let record = repo
        .start_session(start_req(station, user, vec![nozzle]))
        .await
        .unwrap();
    let session = record.session.session_id;

    let active = repo
        .fetch_active_for_user(&station, &user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.session.session_id, session);

    // Someone else's lookup sees nothing.
    assert!(
        repo.fetch_active_for_user(&station, &Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );

    repo.update_reading(ReadingUpdate {
        closing: Some(dec!(10)),
        ..patch(station, session, record.readings[0].reading_id)
    })
    .await
    .unwrap();
    repo.complete_session(finish(station, session)).await.unwrap();

    assert!(
        repo.fetch_active_for_user(&station, &user)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sessions_are_scoped_to_their_station() {
    let pool = setup_db().await;
    let repo = SqlxShiftRepository::new(pool.clone());
    let station = Uuid::new_v4();
    let nozzle = seed_nozzle(&pool, &station, "P1", dec!(100), dec!(0)).await;

    let record = repo
        .start_session(start_req(station, Uuid::new_v4(), vec![nozzle]))
        .await
        .unwrap();

    let foreign = repo
        .fetch_session(&Uuid::new_v4(), &record.session.session_id)
        .await
        .unwrap();
    assert!(foreign.is_none(), "other stations must not see the session");
}
