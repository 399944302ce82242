// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Exposure adapter - the Service routing traffic to the workload's pods.

use crate::adapters::lifecycle::{
    delete_and_confirm, fetch, replace_with_retry, submit, LifecycleSettings,
};
use crate::error::{MicroserviceError, ObjectKind, Phase, Result};
use crate::types::{ExposureKind, MicroserviceSpec, PortMapping, Protocol};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{api::ObjectMeta, Api, Client};
use tracing::{debug, info, instrument};

const KIND: ObjectKind = ObjectKind::Exposure;

/// Build the Service for a microservice.
///
/// The selector is always derived from the microservice name so the Service
/// routes to the Deployment's pods.
pub fn build_service(spec: &MicroserviceSpec, namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(spec.selector_labels()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(spec.expose_type.as_str().to_string()),
            selector: Some(spec.selector_labels()),
            ports: Some(service_ports(spec, &[])),
            external_name: external_name(spec),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn external_name(spec: &MicroserviceSpec) -> Option<String> {
    match spec.expose_type {
        ExposureKind::ExternalName => spec.external_name.clone(),
        _ => None,
    }
}

/// Port name unique within the Service, e.g. `tcp-80`
fn port_name(mapping: &PortMapping) -> String {
    format!(
        "{}-{}",
        mapping.protocol.as_str().to_lowercase(),
        mapping.service_port
    )
}

/// Translate the port mappings into Service ports.
///
/// Node ports already allocated for an unchanged port/protocol pair are kept
/// while the Service type still allocates them, so an update does not move
/// the published node port.
fn service_ports(spec: &MicroserviceSpec, existing: &[ServicePort]) -> Vec<ServicePort> {
    spec.ports
        .iter()
        .map(|mapping| {
            let node_port = if spec.expose_type.allocates_node_ports() {
                existing
                    .iter()
                    .find(|p| {
                        p.port == mapping.service_port
                            && Protocol::from_api(p.protocol.as_deref()) == Some(mapping.protocol)
                    })
                    .and_then(|p| p.node_port)
            } else {
                None
            };

            ServicePort {
                name: Some(port_name(mapping)),
                protocol: Some(mapping.protocol.as_str().to_string()),
                port: mapping.service_port,
                target_port: Some(IntOrString::Int(mapping.container_port)),
                node_port,
                ..Default::default()
            }
        })
        .collect()
}

/// Apply the spec-level fields of `spec` onto a live Service.
///
/// Type, ports, external name and selector are rewritten; metadata and
/// server-assigned fields such as the cluster IP are kept unless the new type
/// forbids them.
pub fn apply_spec(service: &mut Service, spec: &MicroserviceSpec) -> Result<()> {
    let service_spec = service
        .spec
        .as_mut()
        .ok_or_else(|| MicroserviceError::UnexpectedObject {
            kind: KIND,
            name: spec.name.clone(),
            message: "Service has no spec".to_string(),
        })?;

    let existing = service_spec.ports.take().unwrap_or_default();
    service_spec.ports = Some(service_ports(spec, &existing));
    service_spec.type_ = Some(spec.expose_type.as_str().to_string());
    service_spec.selector = Some(spec.selector_labels());
    service_spec.external_name = external_name(spec);

    if spec.expose_type == ExposureKind::ExternalName {
        debug!("Clearing cluster IPs of {} for ExternalName", spec.name);
        service_spec.cluster_ip = None;
        service_spec.cluster_ips = None;
    }

    Ok(())
}

/// The microservice fields reported by a live Service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedExposure {
    pub expose_type: ExposureKind,
    pub ports: Vec<PortMapping>,
    pub external_name: Option<String>,
}

/// Read back exposure kind and port mappings from a live Service
pub fn observe(service: &Service) -> Result<ObservedExposure> {
    let name = service.metadata.name.clone().unwrap_or_default();
    let unexpected = |message: String| MicroserviceError::UnexpectedObject {
        kind: KIND,
        name: name.clone(),
        message,
    };

    let spec = service
        .spec
        .as_ref()
        .ok_or_else(|| unexpected("Service has no spec".to_string()))?;
    let expose_type = ExposureKind::from_api(spec.type_.as_deref())
        .ok_or_else(|| unexpected(format!("unsupported service type {:?}", spec.type_)))?;

    let ports = spec
        .ports
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|port| {
            let protocol = Protocol::from_api(port.protocol.as_deref())
                .ok_or_else(|| unexpected(format!("unsupported protocol {:?}", port.protocol)))?;
            let container_port = match &port.target_port {
                // An unset target port defaults to the published port
                None => port.port,
                Some(IntOrString::Int(target)) => *target,
                Some(IntOrString::String(named)) => {
                    return Err(unexpected(format!("named target port '{}'", named)));
                }
            };
            Ok(PortMapping {
                protocol,
                container_port,
                service_port: port.port,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ObservedExposure {
        expose_type,
        ports,
        external_name: spec.external_name.clone(),
    })
}

#[instrument(skip(client, spec), fields(name = %spec.name))]
pub async fn create(client: &Client, spec: &MicroserviceSpec, namespace: &str) -> Result<Service> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = build_service(spec, namespace);

    let created = submit(&api, KIND, &spec.name, &service).await?;
    info!(
        "Created {} Service {}/{}",
        spec.expose_type, namespace, spec.name
    );
    Ok(created)
}

#[instrument(skip(client))]
pub async fn read(client: &Client, name: &str, namespace: &str) -> Result<Service> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    fetch(&api, KIND, Phase::Read, name).await
}

#[instrument(skip(client, spec, settings))]
pub async fn update(
    client: &Client,
    name: &str,
    namespace: &str,
    spec: &MicroserviceSpec,
    settings: &LifecycleSettings,
) -> Result<Service> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);

    let updated = replace_with_retry(&api, KIND, name, settings.conflict_retry_attempts, |current| {
        apply_spec(current, spec)
    })
    .await?;
    info!("Updated Service {}/{}", namespace, name);
    Ok(updated)
}

#[instrument(skip(client, settings))]
pub async fn delete(
    client: &Client,
    name: &str,
    namespace: &str,
    settings: &LifecycleSettings,
) -> Result<()> {
    let api: Api<Service> = Api::namespaced(client.clone(), namespace);
    delete_and_confirm(&api, KIND, name, settings).await
}
