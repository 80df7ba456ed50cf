// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging backend for the `log` facade.
//!
//! Every component logs through `log::{debug, info, warn, error}!` with a
//! bracketed component prefix (`[http]`, `[soap-udp]`, `[pool]`, ...). This
//! module provides the sink those records end up in:
//!
//! - [`ConsoleOutput`] - stderr, one line per record
//! - [`FileOutput`] - truncating log file
//!
//! ```ignore
//! use dpws::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
//! ```
//!
//! The `trace_fn!()` macro marks function entry at trace level when the
//! `trace` feature is enabled and expands to nothing otherwise.

pub mod logger;
mod output;

pub use logger::{flush_logger, init_logger};
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

/// Function entry trace marker.
///
/// Logs `[ENTER:FNC] function_name` at trace level.
/// Only active when the `trace` feature is enabled.
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        log::trace!("[ENTER:FNC] {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
