// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Path / media-type handler registry with per-path Basic auth groups.

use super::auth::AuthGroup;
use super::body::RequestBody;
use super::header::HttpRequestHeader;
use super::response::HttpResponse;
use super::HandlerError;
use crate::rt::FairRwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// Request handed to a handler. The body reads straight from the socket.
pub struct HttpRequest<'a> {
    pub header: HttpRequestHeader,
    pub peer: Option<SocketAddr>,
    pub body: RequestBody<'a>,
    /// Authenticated user when the path is protected.
    pub user: Option<String>,
}

impl HttpRequest<'_> {
    pub fn path(&self) -> &str {
        self.header.path()
    }

    pub fn method(&self) -> &str {
        &self.header.method
    }
}

/// Produces responses for one registered path.
pub trait HttpHandler: Send + Sync {
    fn handle(&self, request: &mut HttpRequest<'_>) -> Result<HttpResponse, HandlerError>;

    /// Modification time of the resource, enabling `304 Not Modified`.
    fn last_modified(&self, _header: &HttpRequestHeader) -> Option<SystemTime> {
        None
    }
}

impl<F> HttpHandler for F
where
    F: Fn(&mut HttpRequest<'_>) -> Result<HttpResponse, HandlerError> + Send + Sync,
{
    fn handle(&self, request: &mut HttpRequest<'_>) -> Result<HttpResponse, HandlerError> {
        self(request)
    }
}

type Key = (String, Option<String>);

struct Entry {
    handler: Arc<dyn HttpHandler>,
    auth_group: Option<String>,
}

#[derive(Default)]
struct Table {
    handlers: HashMap<Key, Entry>,
    auth_groups: HashMap<String, AuthGroup>,
}

/// Outcome of a successful lookup.
#[derive(Clone)]
pub struct Resolved {
    pub handler: Arc<dyn HttpHandler>,
    /// Credentials the request must satisfy, if any.
    pub auth: Option<AuthGroup>,
    /// Path the handler was registered under.
    pub matched_path: String,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("matched_path", &self.matched_path)
            .field("auth", &self.auth.as_ref().map(AuthGroup::name))
            .finish_non_exhaustive()
    }
}

/// Handlers keyed by `(path, media type)`.
///
/// A handler registered without a media type serves every media type on its
/// path. Registrations and lookups go through one [`FairRwLock`] so a
/// re-registration is never starved by steady request traffic.
#[derive(Default)]
pub struct HandlerRegistry {
    table: FairRwLock<Table>,
}

fn normalize_media(media: Option<&str>) -> Option<String> {
    media.map(|m| m.trim().to_ascii_lowercase()).filter(|m| !m.is_empty())
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `path` and optionally one media type.
    /// Replaces any previous handler under the same key.
    pub fn register(
        &self,
        path: &str,
        media_type: Option<&str>,
        handler: Arc<dyn HttpHandler>,
    ) -> crate::Result<()> {
        self.insert(path, media_type, handler, None)
    }

    /// Register a handler whose requests must authenticate against `group`.
    pub fn register_with_auth(
        &self,
        path: &str,
        media_type: Option<&str>,
        handler: Arc<dyn HttpHandler>,
        group: &str,
    ) -> crate::Result<()> {
        self.insert(path, media_type, handler, Some(group.to_string()))
    }

    fn insert(
        &self,
        path: &str,
        media_type: Option<&str>,
        handler: Arc<dyn HttpHandler>,
        auth_group: Option<String>,
    ) -> crate::Result<()> {
        let key = (path.to_string(), normalize_media(media_type));
        log::debug!("[http] register {} {:?} auth={:?}", key.0, key.1, auth_group);
        self.table
            .write()?
            .handlers
            .insert(key, Entry { handler, auth_group });
        Ok(())
    }

    /// Remove a registration. Returns whether one existed.
    pub fn unregister(&self, path: &str, media_type: Option<&str>) -> crate::Result<bool> {
        let key = (path.to_string(), normalize_media(media_type));
        Ok(self.table.write()?.handlers.remove(&key).is_some())
    }

    /// Add or replace a credential group.
    pub fn add_auth_group(&self, group: AuthGroup) -> crate::Result<()> {
        self.table
            .write()?
            .auth_groups
            .insert(group.name().to_string(), group);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.read().map_or(0, |t| t.handlers.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the handler for a request.
    ///
    /// Order: exact path and media type, then path alone, then (when
    /// `backtracking` is set) the same two probes for each parent path.
    pub fn resolve(
        &self,
        path: &str,
        media_type: Option<&str>,
        backtracking: bool,
    ) -> crate::Result<Option<Resolved>> {
        let media = normalize_media(media_type);
        let table = self.table.read()?;

        let mut candidate = path.to_string();
        loop {
            if let Some(found) = lookup(&table, &candidate, media.as_deref()) {
                return Ok(Some(found));
            }
            if !backtracking {
                return Ok(None);
            }
            match parent_path(&candidate) {
                Some(parent) => candidate = parent,
                None => return Ok(None),
            }
        }
    }
}

fn lookup(table: &Table, path: &str, media: Option<&str>) -> Option<Resolved> {
    let exact = media.and_then(|m| {
        table
            .handlers
            .get(&(path.to_string(), Some(m.to_string())))
    });
    let entry = exact.or_else(|| table.handlers.get(&(path.to_string(), None)))?;

    let auth = match &entry.auth_group {
        Some(name) => match table.auth_groups.get(name) {
            Some(group) => Some(group.clone()),
            None => {
                // Unknown group: deny everyone rather than serve unprotected.
                log::warn!("[http] auth group '{}' not registered for {}", name, path);
                Some(AuthGroup::new(name))
            }
        },
        None => None,
    };
    Some(Resolved {
        handler: Arc::clone(&entry.handler),
        auth,
        matched_path: path.to_string(),
    })
}

/// `/a/b/c` -> `/a/b` -> `/a` -> `/` -> None.
fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => Some("/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> Arc<dyn HttpHandler> {
        Arc::new(
            move |_req: &mut HttpRequest<'_>| -> Result<HttpResponse, HandlerError> {
                Ok(HttpResponse::ok().with_body(tag.as_bytes().to_vec()))
            },
        )
    }

    fn tag_of(resolved: &Resolved) -> Vec<u8> {
        let mut req = HttpRequest {
            header: HttpRequestHeader::new("GET", &resolved.matched_path),
            peer: None,
            body: RequestBody::empty(),
            user: None,
        };
        match resolved.handler.handle(&mut req).unwrap().body {
            super::super::ResponseBody::Fixed(b) => b,
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_exact_media_type_preferred() {
        let reg = HandlerRegistry::new();
        reg.register("/svc", Some("application/soap+xml"), tagged("H1")).unwrap();
        reg.register("/svc", None, tagged("H2")).unwrap();

        let hit = reg
            .resolve("/svc", Some("application/soap+xml"), false)
            .unwrap()
            .unwrap();
        assert_eq!(tag_of(&hit), b"H1");

        let fallback = reg.resolve("/svc", Some("text/plain"), false).unwrap().unwrap();
        assert_eq!(tag_of(&fallback), b"H2");

        let no_type = reg.resolve("/svc", None, false).unwrap().unwrap();
        assert_eq!(tag_of(&no_type), b"H2");
    }

    #[test]
    fn test_media_type_case_insensitive() {
        let reg = HandlerRegistry::new();
        reg.register("/svc", Some("Application/SOAP+xml"), tagged("H1")).unwrap();
        assert!(reg
            .resolve("/svc", Some("application/soap+xml"), false)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_unknown_path() {
        let reg = HandlerRegistry::new();
        reg.register("/svc", None, tagged("H")).unwrap();
        assert!(reg.resolve("/other", None, false).unwrap().is_none());
        assert!(reg.resolve("/svc/sub", None, false).unwrap().is_none());
    }

    #[test]
    fn test_backtracking_uses_longest_prefix() {
        let reg = HandlerRegistry::new();
        reg.register("/", None, tagged("root")).unwrap();
        reg.register("/docs", None, tagged("docs")).unwrap();

        let hit = reg.resolve("/docs/a/b.html", None, true).unwrap().unwrap();
        assert_eq!(hit.matched_path, "/docs");
        let root = reg.resolve("/img/x.png", None, true).unwrap().unwrap();
        assert_eq!(root.matched_path, "/");
    }

    #[test]
    fn test_unregister() {
        let reg = HandlerRegistry::new();
        reg.register("/svc", None, tagged("H")).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.unregister("/svc", None).unwrap());
        assert!(!reg.unregister("/svc", None).unwrap());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_auth_group_attached() {
        let reg = HandlerRegistry::new();
        reg.add_auth_group(AuthGroup::new("admins").with_user("root", "pw"))
            .unwrap();
        reg.register_with_auth("/admin", None, tagged("A"), "admins")
            .unwrap();
        let hit = reg.resolve("/admin", None, false).unwrap().unwrap();
        let group = hit.auth.unwrap();
        assert_eq!(group.name(), "admins");
        assert!(group
            .authenticate(Some(&super::super::basic_authorization("root", "pw")))
            .is_ok());
    }

    #[test]
    fn test_missing_auth_group_denies() {
        let reg = HandlerRegistry::new();
        reg.register_with_auth("/admin", None, tagged("A"), "ghost")
            .unwrap();
        let group = reg.resolve("/admin", None, false).unwrap().unwrap().auth.unwrap();
        assert!(group
            .authenticate(Some(&super::super::basic_authorization("x", "y")))
            .is_err());
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/a/b/c").as_deref(), Some("/a/b"));
        assert_eq!(parent_path("/a/").as_deref(), Some("/"));
        assert_eq!(parent_path("/a").as_deref(), Some("/"));
        assert_eq!(parent_path("/"), None);
    }
}
