//! Tracing setup.
//!
//! A simplified form of the teacher's `fd-otel::init_telemetry`: the same
//! `EnvFilter` + `SubscriberInitExt` idiom, without the OTLP exporter —
//! there is no collector to ship spans to for a CLI that runs and exits.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init(level: &str, verbose: bool) {
    let directive = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init();
}
