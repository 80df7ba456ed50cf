// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network address and interface model, plus multicast socket setup.

mod address;
mod interface;
mod multicast;

pub use address::NetworkAddress;
pub use interface::{detect_interfaces, group_interfaces, InterfaceTable, NetworkInterface};
pub use multicast::{bind_discovery_socket, join_discovery_group};
