// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WS-Discovery payloads and probe matching.

use super::{EndpointReference, QName};

/// Scope matching rule of a Probe (`MatchBy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMatchRule {
    /// Segment-wise prefix match on the URI (the default rule).
    #[default]
    Rfc3986,
    /// Exact, case-sensitive string comparison.
    Strcmp0,
}

impl ScopeMatchRule {
    /// Accepts either generation's rule URI (the legacy one says rfc2396).
    pub fn from_uri(uri: &str) -> Option<Self> {
        if uri.ends_with("/rfc3986") || uri.ends_with("/rfc2396") {
            Some(Self::Rfc3986)
        } else if uri.ends_with("/strcmp0") {
            Some(Self::Strcmp0)
        } else {
            None
        }
    }

    pub fn matches(self, probe_scope: &str, target_scope: &str) -> bool {
        match self {
            Self::Strcmp0 => probe_scope == target_scope,
            Self::Rfc3986 => rfc3986_match(probe_scope, target_scope),
        }
    }
}

fn rfc3986_match(probe: &str, target: &str) -> bool {
    let split = |uri: &str| -> Option<(String, Vec<String>)> {
        let (scheme, rest) = uri.split_once("://")?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let origin = format!(
            "{}://{}",
            scheme.to_ascii_lowercase(),
            authority.to_ascii_lowercase()
        );
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Some((origin, segments))
    };
    match (split(probe), split(target)) {
        (Some((po, ps)), Some((to, ts))) => {
            po == to && ps.len() <= ts.len() && ps.iter().zip(&ts).all(|(a, b)| a == b)
        }
        _ => probe == target,
    }
}

/// Discovery data of one target service: the body of Hello, Bye, ProbeMatch
/// and ResolveMatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryData {
    pub endpoint_reference: EndpointReference,
    pub types: Vec<QName>,
    pub scopes: Vec<String>,
    pub xaddrs: Vec<String>,
    pub metadata_version: u64,
}

impl DiscoveryData {
    pub fn new(endpoint_reference: EndpointReference) -> Self {
        Self {
            endpoint_reference,
            metadata_version: 1,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, qname: QName) -> Self {
        if !self.types.contains(&qname) {
            self.types.push(qname);
        }
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_xaddr(mut self, xaddr: impl Into<String>) -> Self {
        self.xaddrs.push(xaddr.into());
        self
    }

    /// True if every probed type is offered and every probed scope matches.
    pub fn matches_probe(&self, probe: &Probe) -> bool {
        probe.types.iter().all(|t| self.types.contains(t))
            && probe.scopes.iter().all(|ps| {
                self.scopes
                    .iter()
                    .any(|ts| probe.match_by.matches(ps, ts))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub types: Vec<QName>,
    pub scopes: Vec<String>,
    pub match_by: ScopeMatchRule,
}

impl Probe {
    pub fn for_type(qname: QName) -> Self {
        Self {
            types: vec![qname],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeMatches {
    pub matches: Vec<DiscoveryData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolve {
    pub endpoint_reference: EndpointReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveMatches {
    pub matched: Option<DiscoveryData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer() -> QName {
        QName::new("http://example.org/print", "Printer")
    }

    #[test]
    fn test_probe_type_matching() {
        let data = DiscoveryData::new(EndpointReference::random()).with_type(printer());
        assert!(data.matches_probe(&Probe::default()));
        assert!(data.matches_probe(&Probe::for_type(printer())));
        assert!(!data.matches_probe(&Probe::for_type(QName::new("urn:x", "Scanner"))));
    }

    #[test]
    fn test_rfc3986_scope_prefix() {
        let data = DiscoveryData::new(EndpointReference::random())
            .with_scope("http://Example.org/building/floor2/room7");
        let probe = |scope: &str| Probe {
            scopes: vec![scope.to_string()],
            ..Default::default()
        };
        assert!(data.matches_probe(&probe("http://example.org/building")));
        assert!(data.matches_probe(&probe("http://example.org/building/floor2/")));
        assert!(!data.matches_probe(&probe("http://example.org/build")));
        assert!(!data.matches_probe(&probe("http://example.org/building/floor3")));
    }

    #[test]
    fn test_strcmp0_scope() {
        let data = DiscoveryData::new(EndpointReference::random()).with_scope("urn:scope:a");
        let mut probe = Probe {
            scopes: vec!["urn:scope:a".into()],
            match_by: ScopeMatchRule::Strcmp0,
            ..Default::default()
        };
        assert!(data.matches_probe(&probe));
        probe.scopes = vec!["urn:scope".into()];
        assert!(!data.matches_probe(&probe));
    }

    #[test]
    fn test_match_rule_from_uri() {
        assert_eq!(
            ScopeMatchRule::from_uri("http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/strcmp0"),
            Some(ScopeMatchRule::Strcmp0)
        );
        assert_eq!(ScopeMatchRule::from_uri("urn:other"), None);
    }
}
