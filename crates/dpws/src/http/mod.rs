// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Persistent HTTP/1.1 server.
//!
//! One accepted connection runs on one worker-pool thread and walks the
//! state machine in [`connection`]: await request, parse head, reject or
//! dispatch, serialize response, then loop or close.
//!
//! # Architecture
//!
//! ```text
//! accept thread --submit--> WorkerPool ---> serve_connection()
//!                                            |  read head (HeadLimits)
//!                                            |  HandlerRegistry::resolve
//!                                            |  Basic auth / conditional GET
//!                                            |  HttpHandler::handle
//!                                            v  write_response + drain body
//! ```
//!
//! A watchdog closes the socket when no request arrives within the
//! configured request timeout; the blocked reader then sees EOF.

mod auth;
mod body;
mod chunked;
pub(crate) mod connection;
mod date;
mod header;
mod registry;
mod resource;
mod response;
mod server;
mod watchdog;

pub use auth::{basic_authorization, AuthError, AuthGroup};
pub use body::RequestBody;
pub use chunked::{ChunkedReader, ChunkedWriter};
pub use date::{format_http_date, parse_http_date};
pub use header::{
    reason_phrase, HeadLimits, HeaderMap, HttpRequestHeader, HttpResponseHeader, HttpVersion,
};
pub use registry::{HandlerRegistry, HttpHandler, HttpRequest, Resolved};
pub use resource::StaticResource;
pub use response::{BodyWriter, HttpResponse, ResponseBody};
pub use server::HttpServer;

use std::fmt;
use std::io;

/// Failure to parse a request or response head.
#[derive(Debug)]
pub enum HttpError {
    /// Syntactically invalid head.
    BadRequest(String),
    /// Request line or header block over the configured limit.
    HeaderTooLarge,
    /// Transport failure while reading.
    Io(io::Error),
}

impl HttpError {
    /// Status used when rejecting the request.
    pub fn status(&self) -> u16 {
        match self {
            HttpError::HeaderTooLarge => 431,
            _ => 400,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            HttpError::HeaderTooLarge => write!(f, "request head too large"),
            HttpError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        HttpError::Io(e)
    }
}

impl From<HttpError> for io::Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

impl From<HttpError> for crate::Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io(e) => crate::Error::Io(e),
            other => crate::Error::Protocol(other.to_string()),
        }
    }
}

/// Failure raised by an [`HttpHandler`]; answered with `status` and the
/// connection is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub status: u16,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for HandlerError {}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        Self::internal(format!("reading request body: {}", e))
    }
}

impl From<HandlerError> for crate::Error {
    fn from(e: HandlerError) -> Self {
        crate::Error::Handler(e.to_string())
    }
}
