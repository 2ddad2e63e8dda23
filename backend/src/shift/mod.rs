pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service;

pub use model::{DutySession, NozzleReading, SessionPayment, SessionRecord, ShiftStatus};
pub use repository::ShiftRepository;
pub use repository_sqlx::SqlxShiftRepository;
pub use service::ShiftService;
