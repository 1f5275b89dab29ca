//! Tracing subscriber initialization.
//!
//! `RUST_LOG` always wins over the level passed in by the caller.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, with timestamps.
    #[default]
    Json,
    /// Human-readable single-line output.
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{other}' (expected json or text)")),
        }
    }
}

/// JSON logs at `info` unless `RUST_LOG` says otherwise.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    init_with("info", LogFormat::Json);
}

/// Initialize logging with a fallback filter directive and an output format.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init_with(default_level: &str, format: LogFormat) {
    let filter = build_filter(default_level);

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already set; skipping re-initialization");
    }
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
