pub mod cli;

use std::sync::Arc;

use clap::Parser;
use uuid::Uuid;

use backend::access::{Caller, RoleBasedAccess};
use backend::config::AppConfig;
use backend::db::Db;
use backend::error::ShiftError;
use backend::metrics::Counters;
use backend::nozzle::{Nozzle, SqlxNozzleRegistry};
use backend::reconcile::ShiftSummary;
use backend::shift::{SessionRecord, ShiftService, SqlxShiftRepository};
use backend::time::ms_to_rfc3339;
use cli::*;

fn fmt_opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn print_record(record: &SessionRecord) {
    let s = &record.session;
    println!(
        "shift {}  [{}]  \"{}\"  rev {}",
        s.session_id, s.status, s.name, s.revision
    );
    println!(
        "  started {}  ended {}  collected {}",
        ms_to_rfc3339(s.started_at_ms).unwrap_or_default(),
        fmt_opt(&s.ended_at_ms.and_then(ms_to_rfc3339)),
        s.total_collected
    );
    if let Some(notes) = &s.notes {
        println!("  notes: {notes}");
    }
    for r in &record.readings {
        println!(
            "  nozzle {}  open {}  test {}  close {}  dispensed {}  (reading {})",
            r.nozzle_code,
            r.opening,
            r.test_qty,
            fmt_opt(&r.closing),
            fmt_opt(&r.dispensed),
            r.reading_id
        );
    }
    for p in &record.payments {
        println!(
            "  payment {}  {}  {}  qty {}",
            p.payment_id,
            p.method,
            p.amount,
            fmt_opt(&p.quantity)
        );
    }
}

fn print_summary(summary: &ShiftSummary) {
    println!("shift {}  [{}]", summary.session_id, summary.status);
    for line in &summary.lines {
        println!(
            "  {}  {} l  @ {}  = {}",
            line.nozzle_code, line.dispensed, line.unit_price, line.amount
        );
    }
    println!("  fuel sales  {}", summary.total_fuel_sales);
    println!("  collected   {}", summary.total_collected);
    println!("  discrepancy {}", summary.discrepancy);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    common::init_logger("forecourt-cli");
    sqlx::any::install_default_drivers();

    let db = Db::connect(&cli.database_url, 4).await?;
    db.migrate().await?;

    let registry = SqlxNozzleRegistry::new(db.pool.clone());
    let service = ShiftService::new(
        Arc::new(SqlxShiftRepository::new(db.pool.clone())),
        Arc::new(RoleBasedAccess),
        Counters::default(),
        AppConfig::from_env().require_verification,
    );
    let caller = Caller {
        user_id: cli.user,
        station_id: cli.station,
        role: cli_to_role(&cli.role),
    };

    match cli.command {
        Command::Nozzles => {
            for n in registry.list(&caller.station_id).await? {
                let state = if n.is_claimable() {
                    "free"
                } else if !n.is_active {
                    "inactive"
                } else {
                    "claimed"
                };
                println!(
                    "{}  {}  @ {}  reading {}  {}",
                    n.code, n.fuel, n.unit_price, n.current_reading, state
                );
            }
        }

        Command::AddNozzle {
            code,
            fuel,
            price,
            reading,
        } => {
            let nozzle = Nozzle {
                nozzle_id: Uuid::new_v4(),
                station_id: caller.station_id,
                code,
                fuel,
                unit_price: price,
                current_reading: reading,
                is_available: true,
                is_active: true,
            };
            registry.insert(&nozzle).await?;
            println!("added nozzle {} ({})", nozzle.code, nozzle.nozzle_id);
        }

        Command::Start { name, nozzles } => {
            let mut ids = Vec::with_capacity(nozzles.len());
            for code in &nozzles {
                let nozzle = registry
                    .fetch_by_code(&caller.station_id, code)
                    .await?
                    .ok_or_else(|| ShiftError::NozzleUnknown(code.clone()))?;
                ids.push(nozzle.nozzle_id);
            }
            let record = service.start_shift(&caller, &name, ids).await?;
            print_record(&record);
        }

        Command::Active => {
            let record = service.active_shift(&caller).await?;
            print_record(&record);
        }

        Command::Reading {
            session,
            nozzle,
            test_qty,
            closing,
        } => {
            let record = service.get_shift(&caller, &session).await?;
            let target = record
                .readings
                .iter()
                .find(|r| r.nozzle_code == nozzle)
                .ok_or(ShiftError::ReadingNotFound)?;

            let updated = service
                .update_reading(&caller, &session, &target.reading_id, test_qty, closing, None)
                .await?;
            println!(
                "nozzle {}  open {}  test {}  close {}  dispensed {}",
                updated.nozzle_code,
                updated.opening,
                updated.test_qty,
                fmt_opt(&updated.closing),
                fmt_opt(&updated.dispensed)
            );
        }

        Command::Pay {
            session,
            method,
            amount,
            quantity,
        } => {
            let ledger = service
                .add_payment(&caller, &session, &method, amount, quantity, None)
                .await?;
            println!("collected {}", ledger.total_collected);
        }

        Command::EditPay {
            session,
            payment,
            method,
            amount,
            quantity,
        } => {
            let ledger = service
                .update_payment(&caller, &session, &payment, method, amount, quantity, None)
                .await?;
            println!("collected {}", ledger.total_collected);
        }

        Command::DeletePay { session, payment } => {
            let ledger = service
                .delete_payment(&caller, &session, &payment, None)
                .await?;
            println!("collected {}", ledger.total_collected);
        }

        Command::Complete { session, notes } => {
            let record = service
                .complete_shift(&caller, &session, notes, None)
                .await?;
            print_record(&record);
        }

        Command::Review {
            session,
            reject,
            note,
        } => {
            let record = service
                .review_shift(&caller, &session, !reject, note)
                .await?;
            print_record(&record);
        }

        Command::Summary { session } => {
            let summary = service.summary(&caller, &session).await?;
            print_summary(&summary);
        }
    }

    Ok(())
}
