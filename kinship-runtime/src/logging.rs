//! Logging infrastructure for kinship.
//!
//! Structured logging controlled by the `KINSHIP_DEBUG` environment variable.
//!
//! # Environment Variables
//!
//! - `KINSHIP_DEBUG=true` - Enable debug logging
//! - `KINSHIP_DEBUG=1` - Enable debug logging
//! - `KINSHIP_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `KINSHIP_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use kinship_runtime::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! # Internal Logging
//!
//! The runtime emits through the standard tracing macros:
//!
//! ```rust,ignore
//! debug!(entity = S::NAME, relation = name, keys = keys.len(), "Loading association batch");
//! trace!(relation = name, "Association already resolved");
//! warn!(relation = name, elapsed_ms = ms, "Slow association loader");
//! ```

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `KINSHIP_DEBUG`.
///
/// Returns `true` if `KINSHIP_DEBUG` is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("KINSHIP_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `KINSHIP_LOG_LEVEL`.
///
/// Defaults to "debug" if `KINSHIP_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("KINSHIP_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `KINSHIP_LOG_FORMAT`.
///
/// Defaults to "json".
pub fn get_log_format() -> &'static str {
    env::var("KINSHIP_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize the kinship logging system.
///
/// Subsequent calls are no-ops. Without the `tracing-subscriber` feature the
/// runtime only emits events; installing a subscriber is left to the caller.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("KINSHIP_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "kinship={},kinship_runtime={}",
                level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(
                level = level,
                format = get_log_format(),
                "kinship logging initialized"
            );
        }
    });
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: This should only be called at program startup before threads are spawned.
    unsafe {
        env::set_var("KINSHIP_LOG_LEVEL", level);
    }
    init();
}

/// Macro for conditional debug logging.
///
/// Only logs if `KINSHIP_DEBUG` is enabled at runtime.
#[macro_export]
macro_rules! kinship_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
