//! Subscriber setup for the CLI binary.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `BLOGPORT_LOG` overrides the
/// default filter. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("BLOGPORT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("blogport=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}
