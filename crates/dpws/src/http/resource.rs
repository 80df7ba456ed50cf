// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::header::HttpRequestHeader;
use super::registry::{HttpHandler, HttpRequest};
use super::response::HttpResponse;
use super::HandlerError;
use parking_lot::RwLock;
use std::time::SystemTime;

/// In-memory document served on GET/HEAD (WSDL files, device icons).
pub struct StaticResource {
    content_type: String,
    state: RwLock<(Vec<u8>, SystemTime)>,
}

impl StaticResource {
    pub fn new(content_type: &str, bytes: Vec<u8>) -> Self {
        Self::with_last_modified(content_type, bytes, SystemTime::now())
    }

    pub fn with_last_modified(content_type: &str, bytes: Vec<u8>, modified: SystemTime) -> Self {
        Self {
            content_type: content_type.to_string(),
            state: RwLock::new((bytes, modified)),
        }
    }

    /// Replace the content and bump the modification time.
    pub fn update(&self, bytes: Vec<u8>) {
        *self.state.write() = (bytes, SystemTime::now());
    }
}

impl HttpHandler for StaticResource {
    fn handle(&self, request: &mut HttpRequest<'_>) -> Result<HttpResponse, HandlerError> {
        match request.method() {
            "GET" | "HEAD" => {
                let state = self.state.read();
                Ok(HttpResponse::ok()
                    .with_content_type(&self.content_type)
                    .with_last_modified(state.1)
                    .with_body(state.0.clone()))
            }
            other => Ok(HttpResponse::text(405, &format!("{} not allowed", other))
                .with_header("Allow", "GET, HEAD")),
        }
    }

    fn last_modified(&self, _header: &HttpRequestHeader) -> Option<SystemTime> {
        Some(self.state.read().1)
    }
}
