use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use uuid::Uuid;

use backend::access::Role;

#[derive(Debug, Clone, ValueEnum)]
pub enum RoleCli {
    Attendant,
    Manager,
    Admin,
}

/// Convert CLI role selection → internal Role enum
pub(crate) fn cli_to_role(r: &RoleCli) -> Role {
    match r {
        RoleCli::Attendant => Role::Attendant,
        RoleCli::Manager => Role::Manager,
        RoleCli::Admin => Role::Admin,
    }
}

#[derive(Debug, Parser)]
#[clap(name = "forecourt", version)]
pub struct Cli {
    /// Database to operate on
    #[clap(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://forecourt_dev.db"
    )]
    pub database_url: String,

    /// Station scope for every command
    #[clap(long, env = "STATION_ID")]
    pub station: Uuid,

    /// Acting user
    #[clap(long, env = "USER_ID")]
    pub user: Uuid,

    /// Acting role
    #[clap(long, value_enum, default_value = "attendant")]
    pub role: RoleCli,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the station's nozzles
    Nozzles,

    /// Register a nozzle on the station
    AddNozzle {
        code: String,
        fuel: String,
        /// Price per litre
        #[clap(long)]
        price: Decimal,
        /// Current meter value
        #[clap(long, default_value = "0")]
        reading: Decimal,
    },

    /// Open a shift, claiming the named nozzles
    Start {
        name: String,
        /// Nozzle codes (comma-separated)
        #[clap(value_delimiter = ',', required = true)]
        nozzles: Vec<String>,
    },

    /// Show the caller's shift in progress
    Active,

    /// Record meter values for one nozzle of a shift
    Reading {
        session: Uuid,
        /// Nozzle code within the shift
        nozzle: String,
        #[clap(long)]
        test_qty: Option<Decimal>,
        #[clap(long)]
        closing: Option<Decimal>,
    },

    /// Add a payment to a shift
    Pay {
        session: Uuid,
        method: String,
        amount: Decimal,
        /// Metered quantity sold under this payment
        #[clap(long)]
        quantity: Option<Decimal>,
    },

    /// Amend a recorded payment
    EditPay {
        session: Uuid,
        payment: Uuid,
        #[clap(long)]
        method: Option<String>,
        #[clap(long)]
        amount: Option<Decimal>,
        #[clap(long)]
        quantity: Option<Decimal>,
    },

    /// Remove a recorded payment
    DeletePay { session: Uuid, payment: Uuid },

    /// Close a shift, releasing its nozzles
    Complete {
        session: Uuid,
        #[clap(long)]
        notes: Option<String>,
    },

    /// Supervisor verdict on a pending shift
    Review {
        session: Uuid,
        /// Reject instead of approving
        #[clap(long)]
        reject: bool,
        #[clap(long)]
        note: Option<String>,
    },

    /// Sales vs. collections for a shift
    Summary { session: Uuid },
}
