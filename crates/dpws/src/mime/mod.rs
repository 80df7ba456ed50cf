// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MIME multipart support for SOAP-with-attachments bodies.
//!
//! - [`MultipartReader`]: streaming part iterator over any `Read`
//! - [`MimeBodyHeader`], [`ContentType`]: header block and parameter parsing
//! - [`BoundaryMatcher`]: incremental delimiter search used by the reader

mod header;
mod reader;
mod scanner;

pub use header::{ContentType, MimeBodyHeader};
pub use reader::{MimePart, MultipartReader};
pub use scanner::{find_delimiter, BoundaryMatcher};

use std::io;

/// Errors raised while reading a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeError {
    /// Delimiter or header block violates the multipart syntax.
    Malformed(String),
    /// Stream ended before the closing delimiter.
    UnexpectedEnd,
    /// Read on a part the reader has already moved past.
    StalePart,
    /// Underlying stream failed.
    Io { kind: io::ErrorKind, message: String },
}

impl MimeError {
    /// Recover a `MimeError` carried inside an `io::Error` by [`MimePart`].
    pub fn from_io(e: io::Error) -> Self {
        if let Some(inner) = e.get_ref().and_then(|i| i.downcast_ref::<MimeError>()) {
            return inner.clone();
        }
        MimeError::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            MimeError::Malformed(_) => io::ErrorKind::InvalidData,
            MimeError::UnexpectedEnd => io::ErrorKind::UnexpectedEof,
            MimeError::StalePart => io::ErrorKind::Other,
            MimeError::Io { kind, .. } => *kind,
        }
    }
}

impl std::fmt::Display for MimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MimeError::Malformed(msg) => write!(f, "malformed multipart body: {}", msg),
            MimeError::UnexpectedEnd => write!(f, "multipart body ended before closing delimiter"),
            MimeError::StalePart => write!(f, "part is no longer current"),
            MimeError::Io { message, .. } => write!(f, "multipart I/O error: {}", message),
        }
    }
}

impl std::error::Error for MimeError {}

impl From<io::Error> for MimeError {
    fn from(e: io::Error) -> Self {
        MimeError::from_io(e)
    }
}

impl From<MimeError> for io::Error {
    fn from(e: MimeError) -> Self {
        io::Error::new(e.io_kind(), e)
    }
}

impl From<MimeError> for crate::Error {
    fn from(e: MimeError) -> Self {
        match e {
            MimeError::Malformed(_) | MimeError::UnexpectedEnd => {
                crate::Error::Protocol(e.to_string())
            }
            MimeError::StalePart => crate::Error::Usage(e.to_string()),
            MimeError::Io { kind, message } => crate::Error::Io(io::Error::new(kind, message)),
        }
    }
}
