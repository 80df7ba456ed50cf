// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger instance and initialization.
//!
//! Bridges the `log` facade used throughout the crate to an [`Output`]
//! backend. Installed at most once per process.

use super::output::{LogLevel, Output};
use std::io;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<&'static GlobalLogger> = OnceLock::new();

/// Global logger state: one output and a level filter.
pub struct GlobalLogger {
    output: Arc<dyn Output>,
    level_filter: LogLevel,
}

impl log::Log for GlobalLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogLevel::from(metadata.level()) >= self.level_filter
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{}: {}", record.target(), record.args());
        // A failing sink must never take the caller down with it.
        let _ = self.output.write(record.level().into(), &line);
    }

    fn flush(&self) {
        let _ = self.output.flush();
    }
}

/// Initialize the global logger with the given output.
///
/// Only the first call installs a logger; subsequent calls (including those
/// made after another `log` backend was installed) are ignored.
///
/// # Example
/// ```
/// use dpws::logging::{init_logger, ConsoleOutput, LogLevel};
/// use std::sync::Arc;
///
/// init_logger(Arc::new(ConsoleOutput::new(LogLevel::Info)), LogLevel::Info);
/// log::info!("[app] started");
/// ```
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        Box::leak(Box::new(GlobalLogger {
            output,
            level_filter: level,
        }))
    });
    if installed && log::set_logger(*logger).is_ok() {
        log::set_max_level(level.to_filter());
    }
}

/// Flush the global logger's output.
///
/// Safe to call even if logger not initialized.
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.output.flush(),
        None => Ok(()),
    }
}
