//! Host for the cold-calling assistant
//!
//! Wires settings, persistence and the language model into a
//! [`CallManager`](cold_call_agent::CallManager), and drives it from recorded
//! transcripts.

pub mod replay;
pub mod script;

pub use replay::{parse_events, replay, ReplayError, ReplayEvent, ReplaySummary};
pub use script::ScriptedModel;

use cold_call_config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Initialize tracing; `RUST_LOG` overrides the configured level
pub fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("cold_call={}", config.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}
