// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery multicast socket setup.
//!
//! Joins the WS-Discovery group on every multicast-capable interface (not
//! just the default route), skipping interfaces that refuse the join.

use super::interface::NetworkInterface;
use crate::config::{multicast_interface_override, DISCOVERY_MULTICAST_V4, DISCOVERY_MULTICAST_V6};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Bind a UDP socket for discovery traffic on `port` (0 = ephemeral).
///
/// The socket allows address reuse so several stacks on one host can share
/// the well-known port.
pub fn bind_discovery_socket(port: u16, ipv6: bool) -> io::Result<UdpSocket> {
    let (domain, addr) = if ipv6 {
        (
            socket2::Domain::IPV6,
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
        )
    } else {
        (
            socket2::Domain::IPV4,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        )
    };

    let socket = socket2::Socket::new(domain, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if ipv6 {
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// Join the discovery multicast group on the given interfaces.
///
/// Returns the IPv4 interface address used for outgoing multicast
/// (`DPWS_MULTICAST_IF` wins when set), or UNSPECIFIED.
pub fn join_discovery_group(
    socket: &UdpSocket,
    interfaces: &[NetworkInterface],
) -> io::Result<Ipv4Addr> {
    let candidates: Vec<&NetworkInterface> = interfaces
        .iter()
        .filter(|i| i.is_up() && i.supports_multicast() && !i.is_loopback())
        .collect();

    let is_v6 = socket.local_addr()?.is_ipv6();
    if is_v6 {
        // Interface index 0 lets the kernel pick; per-interface v6 joins need
        // indices the portable enumeration does not provide.
        socket.join_multicast_v6(&DISCOVERY_MULTICAST_V6, 0)?;
        socket.set_multicast_loop_v6(true)?;
        return Ok(Ipv4Addr::UNSPECIFIED);
    }

    let mut outgoing = Ipv4Addr::UNSPECIFIED;
    if candidates.is_empty() {
        log::debug!("[net] No multicast interfaces found, joining on UNSPECIFIED");
        socket.join_multicast_v4(&DISCOVERY_MULTICAST_V4, &Ipv4Addr::UNSPECIFIED)?;
    } else {
        for iface in candidates {
            let Some(IpAddr::V4(addr)) = iface.ipv4_address().map(|a| a.ip()) else {
                continue;
            };
            match socket.join_multicast_v4(&DISCOVERY_MULTICAST_V4, &addr) {
                Ok(()) => {
                    log::debug!("[net] joined {} on {} ({})", DISCOVERY_MULTICAST_V4, iface.name(), addr);
                    if outgoing.is_unspecified() {
                        outgoing = addr;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    log::debug!("[net] {} already joined on {}, skipping", DISCOVERY_MULTICAST_V4, addr);
                }
                Err(e) => {
                    log::debug!(
                        "[net] join {} on {} failed (non-fatal): {}",
                        DISCOVERY_MULTICAST_V4,
                        addr,
                        e
                    );
                }
            }
        }
    }

    if let Some(IpAddr::V4(forced)) = multicast_interface_override() {
        outgoing = forced;
    }
    if !outgoing.is_unspecified() {
        socket2::SockRef::from(socket).set_multicast_if_v4(&outgoing)?;
    }
    socket.set_multicast_loop_v4(true)?;
    let _ = socket.set_multicast_ttl_v4(1);
    Ok(outgoing)
}
