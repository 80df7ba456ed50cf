// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Component modules keep their own narrow error enums (`LockError`,
//! `PoolError`, `MimeError`, `HandlerError`, `SoapError`); all of them convert
//! into [`Error`] so callers crossing component boundaries can use `?`.

/// Errors returned by DPWS engine operations.
///
/// Variants map onto the failure classes the engine distinguishes on the wire:
///
/// | Variant | Effect |
/// |---------|--------|
/// | `Protocol` | 400 response, connection closed |
/// | `Handler` | 500 response, connection closed |
/// | `Auth` | 401 response, connection may stay open |
/// | `Timeout` | connection closed silently |
/// | `Deadlock` | raised to both conflicting lock upgraders |
/// | `Send` | remaining UDP repeats aborted |
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Wire / protocol
    // ========================================================================
    /// Malformed request line, header block or multipart boundary.
    Protocol(String),
    /// A handler failed while producing a response.
    Handler(String),
    /// Missing or invalid credentials.
    Auth(String),
    /// No request arrived within the configured deadline.
    Timeout,
    /// XML envelope could not be parsed or built.
    Xml(String),
    /// Action URI not known in any supported protocol generation.
    UnknownAction(String),

    // ========================================================================
    // Concurrency
    // ========================================================================
    /// Two threads tried to upgrade a shared lock at the same time.
    Deadlock,
    /// Worker pool refused the task (no idle worker and at capacity).
    Rejected,
    /// Component already shut down.
    ShutDown,
    /// API misuse (releasing an unheld lock, reading a stale MIME part).
    Usage(String),

    // ========================================================================
    // Transport / configuration
    // ========================================================================
    /// UDP send failed.
    Send(String),
    /// I/O error with underlying cause.
    Io(std::io::Error),
    /// Invalid configuration value.
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Error::Handler(msg) => write!(f, "Handler error: {}", msg),
            Error::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Timeout => write!(f, "Request timeout"),
            Error::Xml(msg) => write!(f, "XML error: {}", msg),
            Error::UnknownAction(action) => write!(f, "Unknown action: {}", action),
            Error::Deadlock => write!(f, "Lock upgrade deadlock detected"),
            Error::Rejected => write!(f, "Task rejected: no worker available"),
            Error::ShutDown => write!(f, "Component shut down"),
            Error::Usage(msg) => write!(f, "Usage error: {}", msg),
            Error::Send(msg) => write!(f, "Send failed: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for results using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::Timeout.to_string(), "Request timeout");
        assert_eq!(
            Error::Protocol("bad request line".into()).to_string(),
            "Protocol error: bad request line"
        );
        assert_eq!(Error::Deadlock.to_string(), "Lock upgrade deadlock detected");
    }

    #[test]
    fn test_io_source_preserved() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(err.source().is_some());
        assert!(Error::Rejected.source().is_none());
    }
}
