use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::ShiftError;

/// Column-level parse helpers shared by the sqlx row mappers. A row that
/// fails to parse is store corruption, not caller error, hence `Malformed`.

pub(crate) fn parse_uuid(raw: &str, col: &str) -> Result<Uuid, ShiftError> {
    Uuid::parse_str(raw).map_err(|e| ShiftError::Malformed(format!("{col} {raw:?}: {e}")))
}

pub(crate) fn parse_decimal(raw: &str, col: &str) -> Result<Decimal, ShiftError> {
    Decimal::from_str(raw).map_err(|e| ShiftError::Malformed(format!("{col} {raw:?}: {e}")))
}

pub(crate) fn parse_opt_decimal(
    raw: Option<String>,
    col: &str,
) -> Result<Option<Decimal>, ShiftError> {
    raw.map(|v| parse_decimal(&v, col)).transpose()
}

pub(crate) fn flag_from_i64(v: i64) -> bool {
    v != 0
}
