#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    pub http_addr: String,

    /// Connection pool ceiling.
    ///
    /// Every lifecycle operation runs inside one transaction, so a
    /// connection is held only for the duration of that transaction;
    /// a small pool goes a long way.
    pub max_connections: u32,

    // =========================
    // Lifecycle configuration
    // =========================
    /// When true, completing a shift lands it in `PendingVerification`
    /// instead of `Completed`, and a supervisor must review it into
    /// `Verified` or `Rejected`.
    ///
    /// Verification is bookkeeping only:
    /// - nozzles are released at completion either way
    /// - readings and payments freeze at completion either way
    pub require_verification: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://forecourt_dev.db".to_string());

        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);

        let require_verification = std::env::var("REQUIRE_VERIFICATION")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            database_url,
            http_addr,
            max_connections,
            require_verification,
        }
    }
}
