use tracing_subscriber::EnvFilter;

use crate::error::{NodeError, NodeResult};

/// Install the global fmt subscriber.
///
/// `filter` takes `EnvFilter` directives (`"crypta_sync=debug,info"`). Without
/// one, `RUST_LOG` is used, then `info`. Fails if a global subscriber is
/// already installed.
pub fn init_tracing(filter: Option<&str>) -> NodeResult<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| NodeError::Config(format!("invalid log filter {directives:?}: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| NodeError::Telemetry(e.to_string()))
}
