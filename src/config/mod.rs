//! Configuration module for the FieldOps backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding head registration (open when unset)
    pub bootstrap_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Root directory of the local media store
    pub media_dir: PathBuf,
    /// Public URL prefix under which stored media is served
    pub media_base_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Reconciliation job period in seconds; 0 disables the job
    pub reconcile_interval_secs: u64,
    /// Days a soft-deleted student is kept before hard deletion
    pub student_retention_days: i64,
    /// Maximum number of active students per teacher
    pub max_students: usize,
    /// Maximum size of a single uploaded file
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bootstrap_key = env::var("FIELDOPS_BOOTSTRAP_KEY").ok();

        let db_path = env::var("FIELDOPS_DB_PATH")
            .unwrap_or_else(|_| "./data/fieldops.sqlite".to_string())
            .into();

        let media_dir = env::var("FIELDOPS_MEDIA_DIR")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();

        let media_base_url =
            env::var("FIELDOPS_MEDIA_BASE_URL").unwrap_or_else(|_| "/media".to_string());

        let bind_addr = env::var("FIELDOPS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3004".to_string())
            .parse()
            .expect("Invalid FIELDOPS_BIND_ADDR format");

        let log_level = env::var("FIELDOPS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            bootstrap_key,
            db_path,
            media_dir,
            media_base_url,
            bind_addr,
            log_level,
            session_ttl_hours: env_or("FIELDOPS_SESSION_TTL_HOURS", 24),
            reconcile_interval_secs: env_or("FIELDOPS_RECONCILE_INTERVAL_SECS", 3600),
            student_retention_days: env_or("FIELDOPS_STUDENT_RETENTION_DAYS", 30),
            max_students: env_or("FIELDOPS_MAX_STUDENTS", 50),
            max_upload_bytes: env_or("FIELDOPS_MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
        }
    }
}

/// Parse a numeric variable, falling back to the default when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring malformed configuration value");
            default
        }),
        Err(_) => default,
    }
}
