// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::labels;
use crate::error::{MicroserviceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Desired state of a microservice: one Deployment plus one Service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceSpec {
    /// Identifier and selector label value, immutable once created
    pub name: String,
    /// Container image reference (e.g. nginx:latest)
    pub image: String,
    pub replicas: i32,
    /// Port mappings, the first entry provides the container port
    pub ports: Vec<PortMapping>,
    #[serde(default, alias = "expose_type")]
    pub expose_type: ExposureKind,
    /// DNS name the Service aliases when exposed as ExternalName
    #[serde(default, alias = "external_name", skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(alias = "container_port")]
    pub container_port: i32,
    #[serde(alias = "service_port")]
    pub service_port: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "SCTP")]
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }

    /// Parse the protocol string reported by the API server.
    /// An absent protocol means TCP.
    pub fn from_api(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("TCP") => Some(Protocol::Tcp),
            Some("UDP") => Some(Protocol::Udp),
            Some("SCTP") => Some(Protocol::Sctp),
            Some(_) => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the Service publishes the workload.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExposureKind {
    #[default]
    #[serde(rename = "ClusterIP")]
    ClusterIp,
    ExternalName,
    NodePort,
    LoadBalancer,
}

impl ExposureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureKind::ClusterIp => "ClusterIP",
            ExposureKind::ExternalName => "ExternalName",
            ExposureKind::NodePort => "NodePort",
            ExposureKind::LoadBalancer => "LoadBalancer",
        }
    }

    /// Parse `spec.type` of a Service. The API defaults an absent type to ClusterIP.
    pub fn from_api(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("ClusterIP") => Some(ExposureKind::ClusterIp),
            Some("ExternalName") => Some(ExposureKind::ExternalName),
            Some("NodePort") => Some(ExposureKind::NodePort),
            Some("LoadBalancer") => Some(ExposureKind::LoadBalancer),
            Some(_) => None,
        }
    }

    /// Whether the API allocates node ports for this kind
    pub fn allocates_node_ports(&self) -> bool {
        matches!(self, ExposureKind::NodePort | ExposureKind::LoadBalancer)
    }
}

impl fmt::Display for ExposureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels binding the Service selector to the Deployment's pods
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::MICROSERVICE.to_string(), name.to_string())])
}

impl MicroserviceSpec {
    /// Parse a desired-state document and validate it.
    pub fn from_yaml(document: &str) -> Result<Self> {
        let spec: MicroserviceSpec = serde_yaml::from_str(document)
            .map_err(|e| MicroserviceError::InvalidSpec(format!("Failed to parse spec: {}", e)))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MicroserviceError::InvalidSpec("name must not be empty".into()));
        }
        if self.image.trim().is_empty() {
            return Err(MicroserviceError::InvalidSpec(format!(
                "image of {} must not be empty",
                self.name
            )));
        }
        if self.replicas < 0 {
            return Err(MicroserviceError::InvalidSpec(format!(
                "replicas of {} must be non-negative, got {}",
                self.name, self.replicas
            )));
        }
        if self.ports.is_empty() {
            return Err(MicroserviceError::InvalidSpec(format!(
                "{} needs at least one port mapping",
                self.name
            )));
        }
        let mut published = HashSet::new();
        for port in &self.ports {
            for value in [port.container_port, port.service_port] {
                if !(1..=65535).contains(&value) {
                    return Err(MicroserviceError::InvalidSpec(format!(
                        "port {} of {} is outside 1-65535",
                        value, self.name
                    )));
                }
            }
            // Service port names are derived from protocol and published port
            if !published.insert((port.protocol, port.service_port)) {
                return Err(MicroserviceError::InvalidSpec(format!(
                    "{} publishes {}/{} more than once",
                    self.name, port.protocol, port.service_port
                )));
            }
        }
        if self.expose_type == ExposureKind::ExternalName
            && self.external_name.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            return Err(MicroserviceError::InvalidSpec(format!(
                "{} is exposed as ExternalName but has no externalName",
                self.name
            )));
        }
        Ok(())
    }

    /// The mapping that provides the workload's container port
    pub fn primary_port(&self) -> Option<&PortMapping> {
        self.ports.first()
    }

    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        selector_labels(&self.name)
    }
}
