//! Tracing subscriber setup shared by tests and embedding binaries.

use crate::error::{GraphError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter applied when neither an explicit directive nor `RUST_LOG` is set:
/// this crate's events at debug, everything else silenced.
const DEFAULT_DIRECTIVES: &str = "tessera=debug";

/// Initializes the global tracing subscriber.
///
/// An explicit `directives` string wins; otherwise `RUST_LOG` is consulted,
/// falling back to [`DEFAULT_DIRECTIVES`]. Fails when the directives do not
/// parse or a subscriber is already installed.
pub fn init_logging(directives: Option<&str>) -> Result<()> {
    let filter = match directives {
        Some(d) => EnvFilter::try_new(d)
            .map_err(|e| GraphError::InvalidArgument(format!("invalid log filter '{d}': {e}")))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| GraphError::InvalidArgument("logging already initialized".into()))
}
