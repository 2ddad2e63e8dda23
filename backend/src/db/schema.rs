use sqlx::AnyPool;

/// Idempotent schema creation. Decimal values (readings, prices, amounts) are
/// stored as TEXT and parsed with `rust_decimal` on read; binary floating
/// point never touches them.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Nozzles
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS nozzles (
  nozzle_id TEXT PRIMARY KEY,
  station_id TEXT NOT NULL,
  code TEXT NOT NULL,
  fuel TEXT NOT NULL,
  unit_price TEXT NOT NULL,
  current_reading TEXT NOT NULL,
  is_available INTEGER NOT NULL CHECK (is_available IN (0,1)),
  is_active INTEGER NOT NULL CHECK (is_active IN (0,1))
);
"#,
    )
    .execute(pool)
    .await?;

    // Duty sessions
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS duty_sessions (
  session_id TEXT PRIMARY KEY,
  station_id TEXT NOT NULL,
  user_id TEXT NOT NULL,
  name TEXT NOT NULL,
  status TEXT NOT NULL,
  started_at_ms BIGINT NOT NULL,
  ended_at_ms BIGINT,
  notes TEXT,
  total_collected TEXT NOT NULL,
  revision BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Readings
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS session_readings (
  reading_id TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  nozzle_id TEXT NOT NULL,
  opening TEXT NOT NULL,
  test_qty TEXT NOT NULL,
  closing TEXT,
  dispensed TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Payments
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS session_payments (
  payment_id TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  method TEXT NOT NULL,
  amount TEXT NOT NULL,
  quantity TEXT,
  recorded_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_nozzles_station_code
           ON nozzles(station_id, code);"#,
    )
    .execute(pool)
    .await?;

    // Store-level enforcement of "one in-progress shift per user per station".
    // The insert inside start() relies on this index closing the race that a
    // check-then-write cannot.
    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_duty_sessions_one_active
           ON duty_sessions(station_id, user_id) WHERE status = 'InProgress';"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_duty_sessions_user
           ON duty_sessions(station_id, user_id);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_session_readings_session
           ON session_readings(session_id);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_session_payments_session
           ON session_payments(session_id);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
