pub mod logger;

pub use logger::{child_span, init_logger, root_span, TraceId};
