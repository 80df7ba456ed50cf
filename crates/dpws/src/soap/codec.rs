// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SOAP 1.2 envelope codec for every message kind.
//!
//! Encoding translates the message to the target generation first and then
//! writes it with that generation's namespaces under fixed prefixes:
//!
//! | Prefix | Namespace |
//! |--------|-----------|
//! | `s` | SOAP 1.2 envelope |
//! | `a` | WS-Addressing (per generation) |
//! | `d` | WS-Discovery (per generation) |
//! | `dpws` | DPWS (per generation) |
//! | `wse` | WS-Eventing |
//! | `mex` | WS-MetadataExchange |
//!
//! QName lists (`Types`) declare their own `tN` prefixes on the element.
//! Decoding detects the generation from the namespace of `Action`, matches
//! body elements by local name and normalizes the result to the current
//! generation.

use super::xml::XmlWriter;
use super::{Decoded, MessageGenerator, SoapError};
use crate::message::{
    format_duration, parse_duration, AppSequence, DeviceMetadata, DiscoveryData,
    EndpointReference, Fault, FaultCode, Filter, GetMetadata, Message, MessageBody, MessageKind,
    MetadataLocation, MetadataResponse, Probe, ProbeMatches, QName, ReferenceParameter,
    Relationship, Renew, RenewResponse, Resolve, ResolveMatches, ScopeMatchRule,
    ServiceEndpoint, SoapHeader, Subscribe, SubscribeResponse, SubscriptionEnd,
    SubscriptionEndStatus, ThisDevice, ThisModel,
};
use crate::protocol::{
    normalize_incoming, translate_outgoing, upgrade_incoming_probe, ProtocolVersion, Vocabulary,
    EVENTING_NS, MEX_NS, SOAP_ENVELOPE_NS,
};
use roxmltree::{Document, Node};
use std::time::Duration;

/// Default [`MessageGenerator`]: SOAP 1.2 envelopes in either generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoapCodec;

impl MessageGenerator for SoapCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, SoapError> {
        crate::trace_fn!("SoapCodec::decode");
        decode_envelope(bytes)
    }

    fn encode(&self, message: &Message, version: ProtocolVersion) -> Result<Vec<u8>, SoapError> {
        crate::trace_fn!("SoapCodec::encode");
        Ok(encode_envelope(message, version).into_bytes())
    }
}

/// Map a generation-specific namespace (addressing, discovery, DPWS) to
/// its counterpart in `target`. Other namespaces are returned unchanged.
fn rebase_namespace(ns: &str, target: &Vocabulary) -> String {
    for version in ProtocolVersion::ALL {
        let vocab = version.vocabulary();
        if ns == vocab.addressing_ns {
            return target.addressing_ns.to_string();
        }
        if ns == vocab.discovery_ns {
            return target.discovery_ns.to_string();
        }
        if ns == vocab.dpws_ns {
            return target.dpws_ns.to_string();
        }
    }
    ns.to_string()
}

fn rebase_filter_dialect(dialect: &str, target: &Vocabulary) -> String {
    let known = ProtocolVersion::ALL
        .into_iter()
        .any(|v| v.vocabulary().action_filter_dialect == dialect);
    if known {
        target.action_filter_dialect.to_string()
    } else {
        dialect.to_string()
    }
}

// ===========================================================================
// Encoding
// ===========================================================================

fn encode_envelope(message: &Message, version: ProtocolVersion) -> String {
    let wire = translate_outgoing(message, version);
    let vocab = version.vocabulary();

    let mut w = XmlWriter::new();
    w.start(
        "s:Envelope",
        &[
            ("xmlns:s", SOAP_ENVELOPE_NS),
            ("xmlns:a", vocab.addressing_ns),
            ("xmlns:d", vocab.discovery_ns),
            ("xmlns:dpws", vocab.dpws_ns),
            ("xmlns:wse", EVENTING_NS),
            ("xmlns:mex", MEX_NS),
        ],
    );
    write_header(&mut w, &wire.header, version);
    w.start("s:Body", &[]);
    write_body(&mut w, &wire.body, vocab);
    w.finish()
}

fn write_header(w: &mut XmlWriter, header: &SoapHeader, version: ProtocolVersion) {
    w.start("s:Header", &[]);
    w.element("a:Action", &[], &header.action);
    w.element("a:MessageID", &[], &header.message_id);
    w.element_opt("a:RelatesTo", header.relates_to.as_deref());
    if let Some(reply_to) = &header.reply_to {
        write_epr(w, "a:ReplyTo", reply_to);
    }
    w.element_opt("a:To", header.to.as_deref());
    if let Some(seq) = header.app_sequence {
        let instance = seq.instance_id.to_string();
        let number = seq.message_number.to_string();
        w.empty(
            "d:AppSequence",
            &[
                ("InstanceId", instance.as_str()),
                ("MessageNumber", number.as_str()),
            ],
        );
    }
    // WS-Addressing 1.0 marks reference parameters echoed into a header.
    write_reference_parameters(
        w,
        &header.reference_parameters,
        version == ProtocolVersion::Current,
    );
    w.end();
}

fn write_reference_parameters(w: &mut XmlWriter, params: &[ReferenceParameter], mark: bool) {
    for (i, param) in params.iter().enumerate() {
        let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(2);
        let prefix_decl = format!("xmlns:rp{}", i);
        let name = if param.name.namespace.is_empty() {
            param.name.local.clone()
        } else {
            attrs.push((prefix_decl.as_str(), param.name.namespace.as_str()));
            format!("rp{}:{}", i, param.name.local)
        };
        if mark {
            attrs.push(("a:IsReferenceParameter", "true"));
        }
        w.element(&name, &attrs, &param.value);
    }
}

fn write_epr(w: &mut XmlWriter, name: &str, epr: &EndpointReference) {
    w.start(name, &[]);
    w.element("a:Address", &[], &epr.address);
    if !epr.reference_parameters.is_empty() {
        w.start("a:ReferenceParameters", &[]);
        write_reference_parameters(w, &epr.reference_parameters, false);
        w.end();
    }
    w.end();
}

fn write_qnames(w: &mut XmlWriter, name: &str, qnames: &[QName]) {
    if qnames.is_empty() {
        return;
    }
    let mut namespaces: Vec<&str> = Vec::new();
    let mut items = Vec::with_capacity(qnames.len());
    for qname in qnames {
        if qname.namespace.is_empty() {
            items.push(qname.local.clone());
            continue;
        }
        let idx = match namespaces.iter().position(|ns| *ns == qname.namespace) {
            Some(idx) => idx,
            None => {
                namespaces.push(&qname.namespace);
                namespaces.len() - 1
            }
        };
        items.push(format!("t{}:{}", idx, qname.local));
    }
    let decls: Vec<String> = (0..namespaces.len()).map(|i| format!("xmlns:t{}", i)).collect();
    let attrs: Vec<(&str, &str)> = decls
        .iter()
        .map(String::as_str)
        .zip(namespaces.iter().copied())
        .collect();
    w.element(name, &attrs, &items.join(" "));
}

fn write_list(w: &mut XmlWriter, name: &str, items: &[String]) {
    if !items.is_empty() {
        w.element(name, &[], &items.join(" "));
    }
}

fn write_discovery_data(w: &mut XmlWriter, data: &DiscoveryData) {
    write_epr(w, "a:EndpointReference", &data.endpoint_reference);
    write_qnames(w, "d:Types", &data.types);
    write_list(w, "d:Scopes", &data.scopes);
    write_list(w, "d:XAddrs", &data.xaddrs);
    w.element("d:MetadataVersion", &[], &data.metadata_version.to_string());
}

fn write_this_model(w: &mut XmlWriter, model: &ThisModel) {
    w.start("dpws:ThisModel", &[]);
    w.element("dpws:Manufacturer", &[], &model.manufacturer);
    w.element_opt("dpws:ManufacturerUrl", model.manufacturer_url.as_deref());
    w.element("dpws:ModelName", &[], &model.model_name);
    w.element_opt("dpws:ModelNumber", model.model_number.as_deref());
    w.element_opt("dpws:ModelUrl", model.model_url.as_deref());
    w.element_opt("dpws:PresentationUrl", model.presentation_url.as_deref());
    w.end();
}

fn write_this_device(w: &mut XmlWriter, device: &ThisDevice) {
    w.start("dpws:ThisDevice", &[]);
    w.element("dpws:FriendlyName", &[], &device.friendly_name);
    w.element_opt("dpws:FirmwareVersion", device.firmware_version.as_deref());
    w.element_opt("dpws:SerialNumber", device.serial_number.as_deref());
    w.end();
}

fn write_service(w: &mut XmlWriter, name: &str, service: &ServiceEndpoint, hosted: bool) {
    w.start(name, &[]);
    for epr in &service.endpoint_references {
        write_epr(w, "a:EndpointReference", epr);
    }
    write_qnames(w, "dpws:Types", &service.types);
    if hosted {
        w.element("dpws:ServiceId", &[], &service.service_id);
    }
    w.end();
}

fn write_relationship(w: &mut XmlWriter, rel: &Relationship, vocab: &Vocabulary) {
    w.start("mex:MetadataSection", &[("Dialect", vocab.relationship_dialect)]);
    w.start("dpws:Relationship", &[("Type", vocab.host_relationship)]);
    if let Some(host) = &rel.host {
        write_service(w, "dpws:Host", host, false);
    }
    for hosted in &rel.hosted {
        write_service(w, "dpws:Hosted", hosted, true);
    }
    w.end();
    w.end();
}

fn write_expires(w: &mut XmlWriter, expires: Option<Duration>) {
    if let Some(expires) = expires {
        w.element("wse:Expires", &[], &format_duration(expires));
    }
}

fn write_body(w: &mut XmlWriter, body: &MessageBody, vocab: &Vocabulary) {
    match body {
        MessageBody::Hello(data) | MessageBody::Bye(data) => {
            let name = if matches!(body, MessageBody::Hello(_)) {
                "d:Hello"
            } else {
                "d:Bye"
            };
            w.start(name, &[]);
            write_discovery_data(w, data);
            w.end();
        }
        MessageBody::Probe(probe) => {
            w.start("d:Probe", &[]);
            write_qnames(w, "d:Types", &probe.types);
            if !probe.scopes.is_empty() {
                let rule = vocab.match_rule_uri(probe.match_by);
                w.element("d:Scopes", &[("MatchBy", rule)], &probe.scopes.join(" "));
            }
            w.end();
        }
        MessageBody::ProbeMatches(matches) => {
            w.start("d:ProbeMatches", &[]);
            for data in &matches.matches {
                w.start("d:ProbeMatch", &[]);
                write_discovery_data(w, data);
                w.end();
            }
            w.end();
        }
        MessageBody::Resolve(resolve) => {
            w.start("d:Resolve", &[]);
            write_epr(w, "a:EndpointReference", &resolve.endpoint_reference);
            w.end();
        }
        MessageBody::ResolveMatches(matches) => {
            w.start("d:ResolveMatches", &[]);
            if let Some(data) = &matches.matched {
                w.start("d:ResolveMatch", &[]);
                write_discovery_data(w, data);
                w.end();
            }
            w.end();
        }
        MessageBody::Get | MessageBody::UnsubscribeResponse => {}
        MessageBody::GetResponse(meta) => {
            w.start("mex:Metadata", &[]);
            if let Some(model) = &meta.this_model {
                w.start("mex:MetadataSection", &[("Dialect", vocab.this_model_dialect)]);
                write_this_model(w, model);
                w.end();
            }
            if let Some(device) = &meta.this_device {
                w.start("mex:MetadataSection", &[("Dialect", vocab.this_device_dialect)]);
                write_this_device(w, device);
                w.end();
            }
            if let Some(rel) = &meta.relationship {
                write_relationship(w, rel, vocab);
            }
            w.end();
        }
        MessageBody::GetMetadata(request) => {
            w.start("mex:GetMetadata", &[]);
            w.element_opt("mex:Dialect", request.dialect.as_deref());
            w.element_opt("mex:Identifier", request.identifier.as_deref());
            w.end();
        }
        MessageBody::GetMetadataResponse(response) => {
            w.start("mex:Metadata", &[]);
            for location in &response.locations {
                w.start("mex:MetadataSection", &[("Dialect", location.dialect.as_str())]);
                w.element("mex:Location", &[], &location.location);
                w.end();
            }
            if let Some(rel) = &response.relationship {
                write_relationship(w, rel, vocab);
            }
            w.end();
        }
        MessageBody::Subscribe(subscribe) => {
            w.start("wse:Subscribe", &[]);
            if let Some(end_to) = &subscribe.end_to {
                write_epr(w, "wse:EndTo", end_to);
            }
            w.start("wse:Delivery", &[]);
            write_epr(w, "wse:NotifyTo", &subscribe.notify_to);
            w.end();
            write_expires(w, subscribe.expires);
            if let Some(filter) = &subscribe.filter {
                let dialect = rebase_filter_dialect(&filter.dialect, vocab);
                w.element(
                    "wse:Filter",
                    &[("Dialect", dialect.as_str())],
                    &filter.actions.join(" "),
                );
            }
            w.end();
        }
        MessageBody::SubscribeResponse(response) => {
            w.start("wse:SubscribeResponse", &[]);
            write_epr(w, "wse:SubscriptionManager", &response.subscription_manager);
            write_expires(w, Some(response.expires));
            w.end();
        }
        MessageBody::Renew(renew) => {
            w.start("wse:Renew", &[]);
            write_expires(w, renew.expires);
            w.end();
        }
        MessageBody::RenewResponse(response) => {
            w.start("wse:RenewResponse", &[]);
            write_expires(w, response.expires);
            w.end();
        }
        MessageBody::Unsubscribe => {
            w.empty("wse:Unsubscribe", &[]);
        }
        MessageBody::SubscriptionEnd(end) => {
            w.start("wse:SubscriptionEnd", &[]);
            write_epr(w, "wse:SubscriptionManager", &end.subscription_manager);
            w.element("wse:Status", &[], &vocab.subscription_end_status(end.status));
            if let Some(reason) = &end.reason {
                w.element("wse:Reason", &[("xml:lang", "en")], reason);
            }
            w.end();
        }
        MessageBody::Fault(fault) => write_fault(w, fault, vocab),
    }
}

fn write_fault(w: &mut XmlWriter, fault: &Fault, vocab: &Vocabulary) {
    w.start("s:Fault", &[]);
    w.start("s:Code", &[]);
    w.element("s:Value", &[], &format!("s:{}", fault.code.local_name()));
    if let Some(subcode) = &fault.subcode {
        let ns = rebase_namespace(&subcode.namespace, vocab);
        w.start("s:Subcode", &[]);
        w.element(
            "s:Value",
            &[("xmlns:f", ns.as_str())],
            &format!("f:{}", subcode.local),
        );
        w.end();
    }
    w.end();
    w.start("s:Reason", &[]);
    w.element("s:Text", &[("xml:lang", "en")], &fault.reason);
    w.end();
    if let Some(detail) = &fault.detail {
        w.element("s:Detail", &[], detail);
    }
    w.end();
}

// ===========================================================================
// Decoding
// ===========================================================================

fn elements<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'i>(node: Node<'a, 'i>, local: &str) -> Option<Node<'a, 'i>> {
    elements(node).find(|n| n.tag_name().name() == local)
}

fn children_named<'a, 'i>(
    node: Node<'a, 'i>,
    local: &'static str,
) -> impl Iterator<Item = Node<'a, 'i>> {
    elements(node).filter(move |n| n.tag_name().name() == local)
}

fn required<'a, 'i>(node: Node<'a, 'i>, local: &'static str) -> Result<Node<'a, 'i>, SoapError> {
    child(node, local).ok_or(SoapError::Missing(local))
}

fn text_of(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

fn read_list(node: Node<'_, '_>) -> Vec<String> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn read_qname(node: Node<'_, '_>, token: &str) -> Result<QName, SoapError> {
    match token.split_once(':') {
        Some((prefix, local)) => {
            let ns = node
                .lookup_namespace_uri(Some(prefix))
                .ok_or_else(|| SoapError::Invalid(format!("undeclared prefix in {}", token)))?;
            Ok(QName::new(ns, local))
        }
        None => Ok(QName::new(
            node.lookup_namespace_uri(None).unwrap_or_default(),
            token,
        )),
    }
}

fn read_qnames(node: Node<'_, '_>) -> Result<Vec<QName>, SoapError> {
    node.text()
        .unwrap_or_default()
        .split_whitespace()
        .map(|token| read_qname(node, token))
        .collect()
}

fn read_number(node: Node<'_, '_>, what: &str) -> Result<u64, SoapError> {
    text_of(node)
        .parse()
        .map_err(|_| SoapError::Invalid(format!("{} is not a number", what)))
}

fn read_duration(node: Node<'_, '_>) -> Result<Duration, SoapError> {
    let text = text_of(node);
    parse_duration(&text).ok_or_else(|| SoapError::Invalid(format!("bad duration: {}", text)))
}

fn read_reference_parameter(node: Node<'_, '_>) -> ReferenceParameter {
    ReferenceParameter::new(
        QName::new(
            node.tag_name().namespace().unwrap_or_default(),
            node.tag_name().name(),
        ),
        text_of(node),
    )
}

fn read_epr(node: Node<'_, '_>) -> Result<EndpointReference, SoapError> {
    let mut epr = EndpointReference::new(text_of(required(node, "Address")?));
    for container in elements(node).filter(|n| {
        matches!(
            n.tag_name().name(),
            "ReferenceParameters" | "ReferenceProperties"
        )
    }) {
        epr.reference_parameters
            .extend(elements(container).map(read_reference_parameter));
    }
    Ok(epr)
}

fn read_discovery_data(node: Node<'_, '_>) -> Result<DiscoveryData, SoapError> {
    let mut data = DiscoveryData::new(read_epr(required(node, "EndpointReference")?)?);
    if let Some(types) = child(node, "Types") {
        data.types = read_qnames(types)?;
    }
    if let Some(scopes) = child(node, "Scopes") {
        data.scopes = read_list(scopes);
    }
    if let Some(xaddrs) = child(node, "XAddrs") {
        data.xaddrs = read_list(xaddrs);
    }
    if let Some(version) = child(node, "MetadataVersion") {
        data.metadata_version = read_number(version, "MetadataVersion")?;
    }
    Ok(data)
}

fn is_addressing_ns(ns: Option<&str>) -> bool {
    ns.is_some_and(|ns| {
        ProtocolVersion::ALL
            .into_iter()
            .any(|v| v.vocabulary().addressing_ns == ns)
    })
}

fn read_header(node: Node<'_, '_>) -> Result<SoapHeader, SoapError> {
    let mut header = SoapHeader {
        action: String::new(),
        message_id: String::new(),
        relates_to: None,
        reply_to: None,
        to: None,
        app_sequence: None,
        reference_parameters: Vec::new(),
    };

    for element in elements(node) {
        let name = element.tag_name();
        if is_addressing_ns(name.namespace()) {
            match name.name() {
                "Action" => header.action = text_of(element),
                "MessageID" => header.message_id = text_of(element),
                "RelatesTo" => header.relates_to = Some(text_of(element)),
                "ReplyTo" => header.reply_to = Some(read_epr(element)?),
                "To" => header.to = Some(text_of(element)),
                _ => {}
            }
        } else if name.name() == "AppSequence" {
            let attr = |key: &str| -> Result<u64, SoapError> {
                element
                    .attribute(key)
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or_else(|| SoapError::Invalid(format!("AppSequence/@{}", key)))
            };
            header.app_sequence = Some(AppSequence {
                instance_id: attr("InstanceId")?,
                message_number: attr("MessageNumber")?,
            });
        } else {
            header
                .reference_parameters
                .push(read_reference_parameter(element));
        }
    }

    if header.action.is_empty() {
        return Err(SoapError::Missing("Action"));
    }
    Ok(header)
}

fn read_service(node: Node<'_, '_>) -> Result<ServiceEndpoint, SoapError> {
    Ok(ServiceEndpoint {
        endpoint_references: children_named(node, "EndpointReference")
            .map(read_epr)
            .collect::<Result<_, _>>()?,
        types: child(node, "Types")
            .map(read_qnames)
            .transpose()?
            .unwrap_or_default(),
        service_id: child(node, "ServiceId").map(text_of).unwrap_or_default(),
    })
}

fn read_relationship(node: Node<'_, '_>) -> Result<Relationship, SoapError> {
    Ok(Relationship {
        host: child(node, "Host").map(read_service).transpose()?,
        hosted: children_named(node, "Hosted")
            .map(read_service)
            .collect::<Result<_, _>>()?,
    })
}

fn opt_text(node: Node<'_, '_>, local: &str) -> Option<String> {
    child(node, local).map(text_of)
}

fn read_this_model(node: Node<'_, '_>) -> ThisModel {
    ThisModel {
        manufacturer: opt_text(node, "Manufacturer").unwrap_or_default(),
        manufacturer_url: opt_text(node, "ManufacturerUrl"),
        model_name: opt_text(node, "ModelName").unwrap_or_default(),
        model_number: opt_text(node, "ModelNumber"),
        model_url: opt_text(node, "ModelUrl"),
        presentation_url: opt_text(node, "PresentationUrl"),
    }
}

fn read_this_device(node: Node<'_, '_>) -> ThisDevice {
    ThisDevice {
        friendly_name: opt_text(node, "FriendlyName").unwrap_or_default(),
        firmware_version: opt_text(node, "FirmwareVersion"),
        serial_number: opt_text(node, "SerialNumber"),
    }
}

/// Walk `mex:Metadata` sections, dispatching on the section content.
fn read_metadata(
    node: Node<'_, '_>,
) -> Result<(DeviceMetadata, Vec<MetadataLocation>), SoapError> {
    let mut meta = DeviceMetadata::default();
    let mut locations = Vec::new();
    for section in children_named(node, "MetadataSection") {
        let Some(content) = elements(section).next() else {
            continue;
        };
        match content.tag_name().name() {
            "ThisModel" => meta.this_model = Some(read_this_model(content)),
            "ThisDevice" => meta.this_device = Some(read_this_device(content)),
            "Relationship" => meta.relationship = Some(read_relationship(content)?),
            "Location" => locations.push(MetadataLocation {
                dialect: section.attribute("Dialect").unwrap_or_default().to_string(),
                location: text_of(content),
            }),
            other => log::debug!("[soap] skipping metadata section <{}>", other),
        }
    }
    Ok((meta, locations))
}

fn read_fault(node: Node<'_, '_>) -> Result<Fault, SoapError> {
    let code = required(node, "Code")?;
    let value = text_of(required(code, "Value")?);
    let local = value.rsplit(':').next().unwrap_or_default();
    let code_value = FaultCode::from_local_name(local)
        .ok_or_else(|| SoapError::Invalid(format!("fault code {}", value)))?;

    let subcode = match child(code, "Subcode").and_then(|s| child(s, "Value")) {
        Some(value) => {
            let mut qname = read_qname(value, &text_of(value))?;
            qname.namespace =
                rebase_namespace(&qname.namespace, ProtocolVersion::Current.vocabulary());
            Some(qname)
        }
        None => None,
    };

    Ok(Fault {
        code: code_value,
        subcode,
        reason: child(node, "Reason")
            .and_then(|r| child(r, "Text"))
            .map(text_of)
            .unwrap_or_default(),
        detail: opt_text(node, "Detail"),
    })
}

fn read_body(kind: MessageKind, body: Node<'_, '_>) -> Result<MessageBody, SoapError> {
    let current = ProtocolVersion::Current.vocabulary();
    Ok(match kind {
        MessageKind::Hello => MessageBody::Hello(read_discovery_data(required(body, "Hello")?)?),
        MessageKind::Bye => MessageBody::Bye(read_discovery_data(required(body, "Bye")?)?),
        MessageKind::Probe => {
            let node = required(body, "Probe")?;
            let mut probe = Probe::default();
            if let Some(types) = child(node, "Types") {
                probe.types = read_qnames(types)?;
            }
            if let Some(scopes) = child(node, "Scopes") {
                probe.scopes = read_list(scopes);
                if let Some(uri) = scopes.attribute("MatchBy") {
                    probe.match_by = ScopeMatchRule::from_uri(uri).ok_or_else(|| {
                        SoapError::Invalid(format!("unsupported match rule: {}", uri))
                    })?;
                }
            }
            MessageBody::Probe(probe)
        }
        MessageKind::ProbeMatches => MessageBody::ProbeMatches(ProbeMatches {
            matches: children_named(required(body, "ProbeMatches")?, "ProbeMatch")
                .map(read_discovery_data)
                .collect::<Result<_, _>>()?,
        }),
        MessageKind::Resolve => MessageBody::Resolve(Resolve {
            endpoint_reference: read_epr(required(required(body, "Resolve")?, "EndpointReference")?)?,
        }),
        MessageKind::ResolveMatches => MessageBody::ResolveMatches(ResolveMatches {
            matched: child(required(body, "ResolveMatches")?, "ResolveMatch")
                .map(read_discovery_data)
                .transpose()?,
        }),
        MessageKind::Get => MessageBody::Get,
        MessageKind::GetResponse => {
            MessageBody::GetResponse(read_metadata(required(body, "Metadata")?)?.0)
        }
        MessageKind::GetMetadata => {
            MessageBody::GetMetadata(match child(body, "GetMetadata") {
                Some(node) => GetMetadata {
                    dialect: opt_text(node, "Dialect"),
                    identifier: opt_text(node, "Identifier"),
                },
                None => GetMetadata::default(),
            })
        }
        MessageKind::GetMetadataResponse => {
            let (meta, locations) = read_metadata(required(body, "Metadata")?)?;
            MessageBody::GetMetadataResponse(MetadataResponse {
                locations,
                relationship: meta.relationship,
            })
        }
        MessageKind::Subscribe => {
            let node = required(body, "Subscribe")?;
            let delivery = required(node, "Delivery")?;
            MessageBody::Subscribe(Subscribe {
                end_to: child(node, "EndTo").map(read_epr).transpose()?,
                notify_to: read_epr(required(delivery, "NotifyTo")?)?,
                expires: child(node, "Expires").map(read_duration).transpose()?,
                filter: child(node, "Filter").map(|f| Filter {
                    dialect: rebase_filter_dialect(
                        f.attribute("Dialect").unwrap_or_default(),
                        current,
                    ),
                    actions: read_list(f),
                }),
            })
        }
        MessageKind::SubscribeResponse => {
            let node = required(body, "SubscribeResponse")?;
            MessageBody::SubscribeResponse(SubscribeResponse {
                subscription_manager: read_epr(required(node, "SubscriptionManager")?)?,
                expires: read_duration(required(node, "Expires")?)?,
            })
        }
        MessageKind::Renew => MessageBody::Renew(Renew {
            expires: child(required(body, "Renew")?, "Expires")
                .map(read_duration)
                .transpose()?,
        }),
        MessageKind::RenewResponse => MessageBody::RenewResponse(RenewResponse {
            expires: child(body, "RenewResponse")
                .and_then(|n| child(n, "Expires"))
                .map(read_duration)
                .transpose()?,
        }),
        MessageKind::Unsubscribe => MessageBody::Unsubscribe,
        MessageKind::UnsubscribeResponse => MessageBody::UnsubscribeResponse,
        MessageKind::SubscriptionEnd => {
            let node = required(body, "SubscriptionEnd")?;
            let status_uri = text_of(required(node, "Status")?);
            let status = status_uri
                .rsplit('/')
                .next()
                .and_then(SubscriptionEndStatus::from_local_name)
                .ok_or_else(|| SoapError::Invalid(format!("status {}", status_uri)))?;
            MessageBody::SubscriptionEnd(SubscriptionEnd {
                subscription_manager: read_epr(required(node, "SubscriptionManager")?)?,
                status,
                reason: opt_text(node, "Reason"),
            })
        }
        MessageKind::Fault => MessageBody::Fault(read_fault(required(body, "Fault")?)?),
    })
}

fn decode_envelope(bytes: &[u8]) -> Result<Decoded, SoapError> {
    let text = std::str::from_utf8(bytes).map_err(|e| SoapError::Xml(e.to_string()))?;
    let doc = Document::parse(text).map_err(|e| SoapError::Xml(e.to_string()))?;

    let envelope = doc.root_element();
    let name = envelope.tag_name();
    if name.name() != "Envelope" || name.namespace() != Some(SOAP_ENVELOPE_NS) {
        return Err(SoapError::Xml(format!(
            "not a SOAP 1.2 envelope: {{{}}}{}",
            name.namespace().unwrap_or_default(),
            name.name()
        )));
    }
    let header_node = required(envelope, "Header")?;
    let body_node = required(envelope, "Body")?;

    let version = child(header_node, "Action")
        .and_then(|n| n.tag_name().namespace())
        .and_then(ProtocolVersion::from_namespace)
        .ok_or(SoapError::Missing("Action"))?;
    let header = read_header(header_node)?;
    let kind = ProtocolVersion::kind_of_action(&header.action)
        .ok_or_else(|| SoapError::UnknownAction(header.action.clone()))?;
    let body = read_body(kind, body_node)?;

    let mut message = Message { header, body };
    if version == ProtocolVersion::Legacy && upgrade_incoming_probe(&mut message) {
        log::debug!("[soap] upgraded legacy Probe types");
    }
    normalize_incoming(&mut message);
    Ok(Decoded { message, version })
}
