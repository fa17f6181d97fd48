//! Logging initialization.
//!
//! - `MODMERGE_LOG` sets the filter, in `EnvFilter` syntax (default `warn`).
//! - `MODMERGE_LOG_FORMAT=json` switches from human-readable lines to JSON
//!   events with span-close records.
//!
//! Everything goes to stderr so command output on stdout stays clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter environment variable.
pub const LOG_ENV: &str = "MODMERGE_LOG";
/// Format environment variable.
pub const LOG_FORMAT_ENV: &str = "MODMERGE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn";

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Interpret the value of [`LOG_FORMAT_ENV`]; anything but `json`
    /// (case-insensitive) is human-readable.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Human,
        }
    }
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::from_env_value(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Human => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("warning: logging already initialized: {e}");
    }
}
