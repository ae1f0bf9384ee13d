//! Log setup for the `estimator` binary.
//!
//! Everything goes to stderr; stdout carries only the JSON report.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP client internals are noisy at debug level.
const QUIET_TARGETS: &str = "hyper=warn,reqwest=warn,rustls=warn";

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init_logging(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (plain, json) = if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    format!("{},{QUIET_TARGETS}", level.as_str().to_ascii_lowercase())
}

/// Level from a name such as `debug` or `WARN`; anything else is `INFO`.
pub fn parse_level(raw: &str) -> Level {
    raw.trim().parse().unwrap_or(Level::INFO)
}
