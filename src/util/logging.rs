//! Tracing subscriber setup
//!
//! Pretty console output by default, JSON lines when requested. The
//! `parley` target follows the configured level; `RUST_LOG` directives are
//! honoured on top of it, and when `RUST_LOG` is unset the HTTP stack
//! (`hyper`, `h2`, `reqwest`) is held at `warn`.
//!
//! Initialization happens at most once per process; later calls are no-ops.
//!
//! ```no_run
//! use parley::util::logging;
//!
//! // PARLEY_LOG_LEVEL=debug PARLEY_LOG_JSON=true
//! logging::init_from_env();
//! tracing::info!(provider = "ollama", "Chat assistant ready");
//! ```

use std::env;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

const QUIET_CRATES: [&str; 3] = ["h2", "hyper", "reqwest"];

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: Level,
    /// JSON lines instead of human-readable output
    pub use_json: bool,
    /// Include the module target (e.g. `parley::detection`)
    pub include_target: bool,
    /// Include file and line number
    pub include_location: bool,
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with location and thread metadata, for log shippers
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    /// Reads `PARLEY_LOG_LEVEL` and `PARLEY_LOG_JSON` through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup("PARLEY_LOG_LEVEL")
            .and_then(|value| parse_level(&value))
            .unwrap_or(Level::INFO);
        let use_json = lookup("PARLEY_LOG_JSON")
            .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }
}

/// Case-insensitive level name; `None` for anything unrecognized
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn build_filter(level: Level, rust_log_set: bool) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();

    if let Ok(directive) = format!("parley={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    if !rust_log_set {
        for name in QUIET_CRATES {
            if let Ok(directive) = format!("{}=warn", name).parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level, env::var_os("RUST_LOG").is_some());

        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids)
            .with_writer(std::io::stderr);

        // Another subscriber may already be installed, e.g. by a test harness.
        let result = if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging was not initialized: {}", e);
        }
    });
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_lookup(|key| env::var(key).ok()));
}
