// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DPWS 2006/02, WS-Discovery 2005/04, WS-Addressing 2004/08.

use super::{shared_actions, Vocabulary};
use crate::message::MessageKind;

pub(super) static VOCABULARY: Vocabulary = Vocabulary {
    name: "DPWS 2006/02",
    dpws_ns: "http://schemas.xmlsoap.org/ws/2006/02/devprof",
    discovery_ns: "http://schemas.xmlsoap.org/ws/2005/04/discovery",
    addressing_ns: "http://schemas.xmlsoap.org/ws/2004/08/addressing",
    anonymous: "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous",
    adhoc_to: "urn:schemas-xmlsoap-org:ws:2005:04:discovery",
    rfc_match_rule: "http://schemas.xmlsoap.org/ws/2005/04/discovery/rfc2396",
    strcmp_match_rule: "http://schemas.xmlsoap.org/ws/2005/04/discovery/strcmp0",
    this_model_dialect: "http://schemas.xmlsoap.org/ws/2006/02/devprof/ThisModel",
    this_device_dialect: "http://schemas.xmlsoap.org/ws/2006/02/devprof/ThisDevice",
    relationship_dialect: "http://schemas.xmlsoap.org/ws/2006/02/devprof/Relationship",
    host_relationship: "http://schemas.xmlsoap.org/ws/2006/02/devprof/host",
    action_filter_dialect: "http://schemas.xmlsoap.org/ws/2006/02/devprof/Action",
    discovery_actions: [
        (MessageKind::Hello, "http://schemas.xmlsoap.org/ws/2005/04/discovery/Hello"),
        (MessageKind::Bye, "http://schemas.xmlsoap.org/ws/2005/04/discovery/Bye"),
        (MessageKind::Probe, "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe"),
        (
            MessageKind::ProbeMatches,
            "http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches",
        ),
        (MessageKind::Resolve, "http://schemas.xmlsoap.org/ws/2005/04/discovery/Resolve"),
        (
            MessageKind::ResolveMatches,
            "http://schemas.xmlsoap.org/ws/2005/04/discovery/ResolveMatches",
        ),
        (
            MessageKind::Fault,
            "http://schemas.xmlsoap.org/ws/2004/08/addressing/fault",
        ),
    ],
    shared_actions: shared_actions(),
};
