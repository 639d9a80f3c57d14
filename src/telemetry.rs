//! Process-wide tracing setup shared by both binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install a formatted stderr subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()
}
