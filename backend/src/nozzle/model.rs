use rust_decimal::Decimal;
use uuid::Uuid;

/// A physical dispensing nozzle as the engine sees it.
///
/// The nozzle catalog (codes, fuels, pricing) is owned by external CRUD; the
/// engine only toggles `is_available` and advances `current_reading`, both
/// inside shift transactions.
#[derive(Clone, Debug)]
pub struct Nozzle {
    pub nozzle_id: Uuid,
    pub station_id: Uuid,
    /// Human-facing pump/nozzle code, unique per station (e.g. "P1-D2").
    pub code: String,
    /// Fuel label, informational only here.
    pub fuel: String,
    pub unit_price: Decimal,
    /// Meter value at the last shift close.
    pub current_reading: Decimal,
    /// Exclusivity flag: false means held by exactly one in-progress shift.
    pub is_available: bool,
    /// Catalog visibility; inactive nozzles can never be claimed.
    pub is_active: bool,
}

impl Nozzle {
    /// True when a starting shift may claim this nozzle.
    pub fn is_claimable(&self) -> bool {
        self.is_active && self.is_available
    }
}
