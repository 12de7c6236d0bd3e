//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events. Hosts that do not install
//! their own subscriber can call [`init_tracing`] once at startup.

use crate::error::{ConvertError, ConvertResult};

/// Install a global `fmt` subscriber
///
/// `verbose` lowers the default level from `info` to `debug`; `json`
/// switches to JSON lines. `RUST_LOG`, when set, overrides the level.
///
/// # Errors
/// `ConvertError::TracingInit` if a global subscriber is already set.
pub fn init_tracing(verbose: bool, json: bool) -> ConvertResult<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
            .map_err(|e| ConvertError::TracingInit(e.to_string()))
    } else {
        fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init()
            .map_err(|e| ConvertError::TracingInit(e.to_string()))
    }
}
