// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network interface detection.
//!
//! Interfaces are detected in one pass and published as an immutable
//! snapshot; a re-detection builds a fresh snapshot and swaps it in whole,
//! so readers never observe a half-updated interface.

use super::address::NetworkAddress;
use arc_swap::ArcSwap;
use std::net::IpAddr;
use std::sync::Arc;

/// One host network interface and its addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkInterface {
    name: String,
    supports_multicast: bool,
    up: bool,
    loopback: bool,
    addresses: Vec<NetworkAddress>,
}

impl NetworkInterface {
    /// Create an interface with no addresses.
    pub fn new(name: &str, supports_multicast: bool, up: bool, loopback: bool) -> Self {
        Self {
            name: name.to_string(),
            supports_multicast,
            up,
            loopback,
            addresses: Vec::new(),
        }
    }

    /// Builder: add an address (duplicates by canonical form are ignored,
    /// insertion order is kept).
    pub fn with_address(mut self, address: NetworkAddress) -> Self {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
        self
    }

    /// Interface name (`eth0`, `en0`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Multicast capable.
    pub fn supports_multicast(&self) -> bool {
        self.supports_multicast
    }

    /// Administratively up.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Loopback interface.
    pub fn is_loopback(&self) -> bool {
        self.loopback
    }

    /// Addresses in detection order.
    pub fn addresses(&self) -> &[NetworkAddress] {
        &self.addresses
    }

    /// First IPv4 address, if any.
    pub fn ipv4_address(&self) -> Option<&NetworkAddress> {
        self.addresses.iter().find(|a| !a.is_ipv6())
    }

    /// First IPv6 address, preferring link-local (discovery uses FF02::C).
    pub fn ipv6_address(&self) -> Option<&NetworkAddress> {
        self.addresses
            .iter()
            .find(|a| a.is_ipv6() && a.is_link_local())
            .or_else(|| self.addresses.iter().find(|a| a.is_ipv6()))
    }
}

/// Group a flat `(name, ip)` listing into interfaces, keeping first-seen order.
pub fn group_interfaces(listing: &[(String, IpAddr)]) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();
    for (name, ip) in listing {
        let address = NetworkAddress::from_ip(*ip);
        match interfaces.iter_mut().find(|i| &i.name == name) {
            Some(existing) => {
                if address.is_loopback() {
                    existing.loopback = true;
                    existing.supports_multicast = false;
                }
                if !existing.addresses.contains(&address) {
                    existing.addresses.push(address);
                }
            }
            None => {
                let loopback = address.is_loopback();
                interfaces.push(
                    NetworkInterface::new(name, !loopback, true, loopback).with_address(address),
                );
            }
        }
    }
    interfaces
}

/// Detect host interfaces.
///
/// Failure to enumerate is not fatal: an empty list is returned and logged,
/// callers fall back to the unspecified address.
pub fn detect_interfaces() -> Vec<NetworkInterface> {
    crate::trace_fn!("detect_interfaces");
    match local_ip_address::list_afinet_netifas() {
        Ok(listing) => {
            let interfaces = group_interfaces(&listing);
            log::debug!("[net] detected {} interface(s)", interfaces.len());
            interfaces
        }
        Err(e) => {
            log::debug!("[net] Failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}

/// Atomically replaced snapshot of detected interfaces.
pub struct InterfaceTable {
    current: ArcSwap<Vec<NetworkInterface>>,
}

impl InterfaceTable {
    /// Table holding the given snapshot.
    pub fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            current: ArcSwap::from_pointee(interfaces),
        }
    }

    /// Table populated by [`detect_interfaces`].
    pub fn detect() -> Self {
        Self::new(detect_interfaces())
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Vec<NetworkInterface>> {
        self.current.load_full()
    }

    /// Replace the snapshot wholesale.
    pub fn replace(&self, interfaces: Vec<NetworkInterface>) {
        self.current.store(Arc::new(interfaces));
    }

    /// Re-detect and replace.
    pub fn refresh(&self) {
        self.replace(detect_interfaces());
    }

    /// Up, multicast-capable, non-loopback interfaces.
    pub fn multicast_interfaces(&self) -> Vec<NetworkInterface> {
        self.snapshot()
            .iter()
            .filter(|i| i.is_up() && i.supports_multicast() && !i.is_loopback())
            .cloned()
            .collect()
    }

    /// Interface owning the given address.
    pub fn find_by_address(&self, address: &NetworkAddress) -> Option<NetworkInterface> {
        self.snapshot()
            .iter()
            .find(|i| i.addresses().contains(address))
            .cloned()
    }
}
