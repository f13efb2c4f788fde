//! Utilities: logging setup (dynamic level) and per-request correlation ids.
//!
//! Key items:
//!   init_logging / derive_level
//!   request_id

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging helpers.
pub mod logging {
    use super::*;

    /// Map the global -v / -q flags onto a tracing level.
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Install the global subscriber. RUST_LOG, when set and valid, wins over `level`.
    pub fn init_logging(level: LevelFilter) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

        // A second init (tests) is harmless; keep the first subscriber.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

/// Short correlation id for a request: the arrival time in hex Unix seconds,
/// minus its three leading digits. Requests within the same second share it.
pub fn request_id(at: SystemTime) -> String {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hex = format!("{secs:x}");
    hex.get(3..).unwrap_or_default().to_string()
}
