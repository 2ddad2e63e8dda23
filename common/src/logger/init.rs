use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Install the process-wide subscriber once; later calls are no-ops.
///
/// Filtering comes from `RUST_LOG`, defaulting to `info`. Uses `try_init`
/// so a subscriber installed earlier (e.g. by a test harness) wins quietly.
pub fn init_logger(service_name: &'static str) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = fmt()
            .with_env_filter(filter)
            .with_target(true) // <-- shows crate/module path
            .with_thread_ids(true)
            .with_line_number(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .is_ok();

        if installed {
            tracing::info!(service = service_name, "logger initialized");
        }
    });
}
