use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::shift::model::ShiftStatus;

/// Failure classes the API and callers branch on (retryability, status codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Transient,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("shift name must not be empty")]
    EmptyName,

    #[error("at least one nozzle must be selected")]
    NoNozzles,

    #[error("nozzle selected twice: {0}")]
    DuplicateNozzle(Uuid),

    #[error("test quantity must not be negative: {0}")]
    NegativeTestQty(Decimal),

    #[error("closing reading {closing} is below opening reading {opening}")]
    InvalidClosingReading { closing: Decimal, opening: Decimal },

    #[error("payment amount must be positive: {0}")]
    NonPositiveAmount(Decimal),

    #[error("payment quantity must not be negative: {0}")]
    NegativeQuantity(Decimal),

    #[error("payment method must not be empty")]
    EmptyMethod,

    #[error("no closing readings recorded; shift cannot be completed")]
    NoClosingReadings,

    #[error("user already has a shift in progress")]
    AlreadyActive,

    #[error("nozzles unavailable: {}", .codes.join(", "))]
    NozzlesUnavailable { codes: Vec<String> },

    #[error("shift revision mismatch: expected {expected}, found {found}")]
    RevisionMismatch { expected: i64, found: i64 },

    #[error("shift is {status}; only an in-progress shift can be modified")]
    ShiftClosed { status: ShiftStatus },

    #[error("shift is {status}; only a pending-verification shift can be reviewed")]
    NotPending { status: ShiftStatus },

    #[error("shift not found")]
    SessionNotFound,

    #[error("reading not found")]
    ReadingNotFound,

    #[error("payment not found")]
    PaymentNotFound,

    #[error("no nozzle with code {0}")]
    NozzleUnknown(String),

    #[error("caller may not act on this shift")]
    Forbidden,

    #[error("malformed row: {0}")]
    Malformed(String),

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl ShiftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShiftError::EmptyName
            | ShiftError::NoNozzles
            | ShiftError::DuplicateNozzle(_)
            | ShiftError::NegativeTestQty(_)
            | ShiftError::InvalidClosingReading { .. }
            | ShiftError::NonPositiveAmount(_)
            | ShiftError::NegativeQuantity(_)
            | ShiftError::EmptyMethod
            | ShiftError::NoClosingReadings => ErrorKind::Validation,

            ShiftError::AlreadyActive
            | ShiftError::NozzlesUnavailable { .. }
            | ShiftError::RevisionMismatch { .. }
            | ShiftError::ShiftClosed { .. }
            | ShiftError::NotPending { .. } => ErrorKind::Conflict,

            ShiftError::SessionNotFound
            | ShiftError::ReadingNotFound
            | ShiftError::PaymentNotFound
            | ShiftError::NozzleUnknown(_) => ErrorKind::NotFound,

            ShiftError::Forbidden => ErrorKind::Forbidden,

            ShiftError::Store(_) => ErrorKind::Transient,
            ShiftError::Malformed(_) => ErrorKind::Internal,
        }
    }

    /// True for failures a caller may retry verbatim (store contention,
    /// timeouts). Conflicts are not retryable without re-reading state.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
