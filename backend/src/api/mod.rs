//! HTTP surface: axum router, handlers, wire types and the error mapping.

pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

pub use error::ApiError;
pub use state::{ApiState, router};
