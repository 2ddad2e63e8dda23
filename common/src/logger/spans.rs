use tracing::{field, info_span, Span};

use super::TraceId;

/// Create a root span for a request / shift operation.
///
/// The span name is fixed so subscribers can filter on it; the operation goes
/// in the `op` field. `station_id` / `session_id` start empty and are recorded
/// once known (they usually are not, at span-creation time).
pub fn root_span(op: &'static str, trace_id: &TraceId) -> Span {
    info_span!(
        "request",
        op,
        trace_id = %trace_id,
        station_id = field::Empty,
        session_id = field::Empty,
    )
}

/// Create a child span (inherits trace_id from the current span).
pub fn child_span(op: &'static str) -> Span {
    info_span!(
        "step",
        op,
        station_id = field::Empty,
        session_id = field::Empty,
    )
}
