// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host address model with canonical textual form.
//!
//! Accepts the spellings that show up in XAddrs, Host headers and interface
//! listings (`192.168.0.1`, `[fe80::1]`, `FE80::0001%eth0`,
//! `::ffff:10.0.0.1`) and reduces them to one canonical string, so two
//! addresses compare equal exactly when they name the same host.

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP host address. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct NetworkAddress {
    canonical: String,
    ip: IpAddr,
    zone: Option<String>,
}

impl NetworkAddress {
    /// Build from a parsed IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        let ip = unmap_ipv4(ip);
        Self {
            canonical: ip.to_string(),
            ip,
            zone: None,
        }
    }

    /// Parse any accepted textual form.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        let (host, zone) = match unbracketed.split_once('%') {
            Some((host, zone)) if !zone.is_empty() => (host, Some(zone.to_string())),
            Some(_) => return Err(Error::Config(format!("empty zone id in '{}'", text))),
            None => (unbracketed, None),
        };

        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| Error::Config(format!("invalid IP address '{}'", text)))?;
        let ip = unmap_ipv4(ip);

        // Zone ids only make sense for IPv6 scoped addresses.
        let zone = if ip.is_ipv6() { zone } else { None };
        let canonical = match &zone {
            Some(zone) => format!("{}%{}", ip, zone),
            None => ip.to_string(),
        };

        Ok(Self { canonical, ip, zone })
    }

    /// Canonical textual form (no brackets).
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Underlying IP address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Scope/zone id of a link-local IPv6 address, if any.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// True for IPv6 addresses.
    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }

    /// True for 127.0.0.0/8 and ::1.
    pub fn is_loopback(&self) -> bool {
        self.ip.is_loopback()
    }

    /// True for 169.254.0.0/16 and fe80::/10.
    pub fn is_link_local(&self) -> bool {
        match self.ip {
            IpAddr::V4(v4) => v4.is_link_local(),
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    /// Host part as it must appear inside a URL (`[v6]` bracketed, zone
    /// escaped as `%25`).
    pub fn url_host(&self) -> String {
        match (&self.ip, &self.zone) {
            (IpAddr::V6(v6), Some(zone)) => format!("[{}%25{}]", v6, zone),
            (IpAddr::V6(v6), None) => format!("[{}]", v6),
            (IpAddr::V4(v4), _) => v4.to_string(),
        }
    }
}

fn unmap_ipv4(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

impl PartialEq for NetworkAddress {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for NetworkAddress {}

impl Hash for NetworkAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for NetworkAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Ipv4Addr> for NetworkAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self::from_ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for NetworkAddress {
    fn from(ip: Ipv6Addr) -> Self {
        Self::from_ip(IpAddr::V6(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_canonicalization() {
        let a = NetworkAddress::parse("FE80:0000::0001").expect("parse");
        let b = NetworkAddress::parse("[fe80::1]").expect("parse");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "fe80::1");
        assert!(a.is_ipv6());
        assert!(a.is_link_local());
        assert!(!a.is_loopback());
    }

    #[test]
    fn test_ipv4_mapped_is_unmapped() {
        let mapped = NetworkAddress::parse("::ffff:10.0.0.7").expect("parse");
        let plain = NetworkAddress::parse("10.0.0.7").expect("parse");
        assert_eq!(mapped, plain);
        assert!(!mapped.is_ipv6());
    }

    #[test]
    fn test_flags() {
        assert!(NetworkAddress::parse("127.0.0.1").expect("parse").is_loopback());
        assert!(NetworkAddress::parse("::1").expect("parse").is_loopback());
        assert!(NetworkAddress::parse("169.254.3.4").expect("parse").is_link_local());
        assert!(!NetworkAddress::parse("192.168.1.2").expect("parse").is_link_local());
    }

    #[test]
    fn test_zone_id() {
        let addr = NetworkAddress::parse("fe80::1%eth0").expect("parse");
        assert_eq!(addr.zone(), Some("eth0"));
        assert_eq!(addr.as_str(), "fe80::1%eth0");
        assert_eq!(addr.url_host(), "[fe80::1%25eth0]");
        assert_ne!(addr, NetworkAddress::parse("fe80::1").expect("parse"));
    }

    #[test]
    fn test_url_host() {
        assert_eq!(
            NetworkAddress::parse("10.1.2.3").expect("parse").url_host(),
            "10.1.2.3"
        );
        assert_eq!(NetworkAddress::parse("::1").expect("parse").url_host(), "[::1]");
    }

    #[test]
    fn test_invalid() {
        assert!(NetworkAddress::parse("not-an-ip").is_err());
        assert!(NetworkAddress::parse("fe80::1%").is_err());
    }
}
