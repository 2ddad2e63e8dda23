use rust_decimal::Decimal;
use uuid::Uuid;

use crate::shift::model::{SessionRecord, ShiftStatus};

/// One nozzle's contribution to expected revenue.
#[derive(Clone, Debug, PartialEq)]
pub struct FuelSaleLine {
    pub nozzle_code: String,
    pub unit_price: Decimal,
    /// Metered volume; zero when no closing reading was recorded.
    pub dispensed: Decimal,
    pub amount: Decimal,
}

/// Expected vs. collected revenue for one shift.
///
/// Sign convention: positive discrepancy = excess cash over fuel sold,
/// negative = shortage.
#[derive(Clone, Debug)]
pub struct ShiftSummary {
    pub session_id: Uuid,
    pub status: ShiftStatus,
    pub lines: Vec<FuelSaleLine>,
    pub total_fuel_sales: Decimal,
    pub total_collected: Decimal,
    pub discrepancy: Decimal,
}

/// Pure reconciliation over a session's readings and payments.
///
/// Never mutates anything and depends only on its input, so invoking it any
/// number of times yields identical results. Readings without a dispensed
/// value contribute a zero line (kept, so renderings show every nozzle).
pub fn summarize(record: &SessionRecord) -> ShiftSummary {
    let lines: Vec<FuelSaleLine> = record
        .readings
        .iter()
        .map(|r| {
            let dispensed = r.dispensed.unwrap_or(Decimal::ZERO);
            FuelSaleLine {
                nozzle_code: r.nozzle_code.clone(),
                unit_price: r.unit_price,
                dispensed,
                amount: dispensed * r.unit_price,
            }
        })
        .collect();

    let total_fuel_sales: Decimal = lines.iter().map(|l| l.amount).sum();
    let total_collected: Decimal = record.payments.iter().map(|p| p.amount).sum();

    ShiftSummary {
        session_id: record.session.session_id,
        status: record.session.status,
        lines,
        total_fuel_sales,
        total_collected,
        discrepancy: total_collected - total_fuel_sales,
    }
}
