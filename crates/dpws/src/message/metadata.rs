// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DPWS device metadata (WS-Transfer Get / WS-MetadataExchange payloads).

use super::{EndpointReference, QName};

/// `dpws:ThisModel` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThisModel {
    pub manufacturer: String,
    pub manufacturer_url: Option<String>,
    pub model_name: String,
    pub model_number: Option<String>,
    pub model_url: Option<String>,
    pub presentation_url: Option<String>,
}

/// `dpws:ThisDevice` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThisDevice {
    pub friendly_name: String,
    pub firmware_version: Option<String>,
    pub serial_number: Option<String>,
}

/// Host or hosted service entry of a relationship section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub endpoint_references: Vec<EndpointReference>,
    pub types: Vec<QName>,
    /// Empty for the host entry.
    pub service_id: String,
}

/// `dpws:Relationship` section of type `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationship {
    pub host: Option<ServiceEndpoint>,
    pub hosted: Vec<ServiceEndpoint>,
}

/// Body of a Transfer GetResponse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub this_model: Option<ThisModel>,
    pub this_device: Option<ThisDevice>,
    pub relationship: Option<Relationship>,
}

/// Body of a GetMetadata request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetMetadata {
    pub dialect: Option<String>,
    pub identifier: Option<String>,
}

/// Metadata section referring to a document by location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLocation {
    pub dialect: String,
    pub location: String,
}

/// Body of a GetMetadata response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataResponse {
    pub locations: Vec<MetadataLocation>,
    pub relationship: Option<Relationship>,
}

/// WSDL 1.1 dialect URI, shared by both generations.
pub const WSDL_DIALECT: &str = "http://schemas.xmlsoap.org/wsdl/";
