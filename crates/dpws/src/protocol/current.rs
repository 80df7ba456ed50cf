// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DPWS 1.1, WS-Discovery 1.1 (2009/01), WS-Addressing 1.0 (2005/08).

use super::{shared_actions, Vocabulary};
use crate::message::MessageKind;

pub(super) static VOCABULARY: Vocabulary = Vocabulary {
    name: "DPWS 1.1",
    dpws_ns: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01",
    discovery_ns: "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01",
    addressing_ns: "http://www.w3.org/2005/08/addressing",
    anonymous: "http://www.w3.org/2005/08/addressing/anonymous",
    adhoc_to: "urn:docs-oasis-open-org:ws-dd:ns:discovery:2009:01",
    rfc_match_rule: "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/rfc3986",
    strcmp_match_rule: "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/strcmp0",
    this_model_dialect: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/ThisModel",
    this_device_dialect: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/ThisDevice",
    relationship_dialect: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/Relationship",
    host_relationship: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/host",
    action_filter_dialect: "http://docs.oasis-open.org/ws-dd/ns/dpws/2009/01/Action",
    discovery_actions: [
        (MessageKind::Hello, "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/Hello"),
        (MessageKind::Bye, "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/Bye"),
        (MessageKind::Probe, "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/Probe"),
        (
            MessageKind::ProbeMatches,
            "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/ProbeMatches",
        ),
        (
            MessageKind::Resolve,
            "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/Resolve",
        ),
        (
            MessageKind::ResolveMatches,
            "http://docs.oasis-open.org/ws-dd/ns/discovery/2009/01/ResolveMatches",
        ),
        (MessageKind::Fault, "http://www.w3.org/2005/08/addressing/fault"),
    ],
    shared_actions: shared_actions(),
};
