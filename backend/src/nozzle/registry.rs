use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::db::rows::{flag_from_i64, parse_decimal, parse_uuid};
use crate::error::ShiftError;
use crate::nozzle::model::Nozzle;

/// SQLx-backed view of the nozzle catalog.
///
/// Only the reads the engine and its operators need, plus an insert for
/// seeding. Claim/release of nozzles happens in the shift repository's
/// transactions, never here.
pub struct SqlxNozzleRegistry {
    pool: AnyPool,
}

impl SqlxNozzleRegistry {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, nozzle: &Nozzle) -> Result<(), ShiftError> {
        sqlx::query(
            r#"
INSERT INTO nozzles
  (nozzle_id, station_id, code, fuel, unit_price, current_reading, is_available, is_active)
VALUES (?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(nozzle.nozzle_id.to_string())
        .bind(nozzle.station_id.to_string())
        .bind(&nozzle.code)
        .bind(&nozzle.fuel)
        .bind(nozzle.unit_price.to_string())
        .bind(nozzle.current_reading.to_string())
        .bind(if nozzle.is_available { 1_i64 } else { 0 })
        .bind(if nozzle.is_active { 1_i64 } else { 0 })
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self, station_id: &Uuid) -> Result<Vec<Nozzle>, ShiftError> {
        let rows = sqlx::query(
            r#"
SELECT nozzle_id, station_id, code, fuel, unit_price, current_reading,
       is_available, is_active
FROM nozzles
WHERE station_id = ?
ORDER BY code;
"#,
        )
        .bind(station_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(row_to_nozzle(&r)?);
        }
        Ok(out)
    }

    pub async fn fetch_by_code(
        &self,
        station_id: &Uuid,
        code: &str,
    ) -> Result<Option<Nozzle>, ShiftError> {
        let row = sqlx::query(
            r#"
SELECT nozzle_id, station_id, code, fuel, unit_price, current_reading,
       is_available, is_active
FROM nozzles
WHERE station_id = ? AND code = ?;
"#,
        )
        .bind(station_id.to_string())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_nozzle(&r)?)),
            None => Ok(None),
        }
    }
}

fn row_to_nozzle(r: &sqlx::any::AnyRow) -> Result<Nozzle, ShiftError> {
    Ok(Nozzle {
        nozzle_id: parse_uuid(&r.get::<String, _>("nozzle_id"), "nozzle_id")?,
        station_id: parse_uuid(&r.get::<String, _>("station_id"), "station_id")?,
        code: r.get("code"),
        fuel: r.get("fuel"),
        unit_price: parse_decimal(&r.get::<String, _>("unit_price"), "unit_price")?,
        current_reading: parse_decimal(&r.get::<String, _>("current_reading"), "current_reading")?,
        is_available: flag_from_i64(r.get("is_available")),
        is_active: flag_from_i64(r.get("is_active")),
    })
}
