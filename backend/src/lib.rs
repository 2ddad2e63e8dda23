pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod metrics;
pub mod nozzle;
pub mod reconcile;
pub mod shift;

pub mod error;
pub mod logger;
pub mod time;
