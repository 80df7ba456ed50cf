// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP Basic authentication against named credential groups.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;

/// Why a request was not authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header.
    Missing,
    /// Header is not valid `Basic <base64(user:password)>`.
    Malformed,
    /// Unknown user or wrong password.
    Rejected(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Missing => write!(f, "credentials required"),
            AuthError::Malformed => write!(f, "malformed Authorization header"),
            AuthError::Rejected(user) => write!(f, "invalid credentials for {:?}", user),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<AuthError> for crate::Error {
    fn from(e: AuthError) -> Self {
        crate::Error::Auth(e.to_string())
    }
}

/// Named set of user/password pairs guarding one or more paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGroup {
    name: String,
    realm: String,
    credentials: HashMap<String, String>,
}

impl AuthGroup {
    /// Group whose realm defaults to its name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            realm: name.to_string(),
            credentials: HashMap::new(),
        }
    }

    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = realm.to_string();
        self
    }

    pub fn with_user(mut self, user: &str, password: &str) -> Self {
        self.credentials
            .insert(user.to_string(), password.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `WWW-Authenticate` value sent with a 401.
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm.replace('"', "'"))
    }

    /// Check an `Authorization` header; returns the user name on success.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        let value = authorization.ok_or(AuthError::Missing)?.trim();
        let (scheme, encoded) = value.split_once(' ').ok_or(AuthError::Malformed)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::Malformed);
        }
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
        let (user, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;

        match self.credentials.get(user) {
            Some(expected) if expected == password => Ok(user.to_string()),
            _ => {
                log::debug!("[http-auth] {}: rejected user {:?}", self.name, user);
                Err(AuthError::Rejected(user.to_string()))
            }
        }
    }
}

/// `Authorization` header value for the given credentials.
pub fn basic_authorization(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}
