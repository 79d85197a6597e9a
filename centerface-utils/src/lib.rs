//! Common helpers shared across the CenterFace crates.

/// Parser and application settings with JSON persistence.
pub mod config;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use anyhow::Result;
use log::LevelFilter;

pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once for any front end.
///
/// Respects the `RUST_LOG` environment variable when it is set and falls back
/// to the provided default filter level otherwise.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("centerface::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}
