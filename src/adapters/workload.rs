// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload adapter - the Deployment running the microservice's replicas.

use crate::adapters::lifecycle::{
    delete_and_confirm, fetch, replace_with_retry, submit, LifecycleSettings,
};
use crate::constants::{labels, CONTAINER_PORT_NAME};
use crate::error::{MicroserviceError, ObjectKind, Phase, Result};
use crate::types::{selector_labels, MicroserviceSpec, PortMapping};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{api::ObjectMeta, Api, Client};
use tracing::{info, instrument};

const KIND: ObjectKind = ObjectKind::Workload;

/// Build the Deployment for a microservice
pub fn build_deployment(spec: &MicroserviceSpec, namespace: &str) -> Deployment {
    let labels = spec.selector_labels();

    Deployment {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: spec.name.clone(),
                        image: Some(spec.image.clone()),
                        ports: spec.primary_port().map(|p| vec![container_port(p)]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_port(mapping: &PortMapping) -> ContainerPort {
    ContainerPort {
        name: Some(CONTAINER_PORT_NAME.to_string()),
        container_port: mapping.container_port,
        protocol: Some(mapping.protocol.as_str().to_string()),
        ..Default::default()
    }
}

/// Apply the spec-level fields of `spec` onto a live Deployment.
///
/// Replicas, image and the named container port are overwritten. Metadata,
/// the immutable selector and any other container settings are kept.
pub fn apply_spec(deployment: &mut Deployment, spec: &MicroserviceSpec) -> Result<()> {
    let unexpected = |message: &str| MicroserviceError::UnexpectedObject {
        kind: KIND,
        name: spec.name.clone(),
        message: message.to_string(),
    };

    let deployment_spec = deployment
        .spec
        .as_mut()
        .ok_or_else(|| unexpected("Deployment has no spec"))?;
    deployment_spec.replicas = Some(spec.replicas);

    let template_labels = deployment_spec
        .template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default);
    template_labels.insert(labels::MICROSERVICE.to_string(), spec.name.clone());

    let pod_spec = deployment_spec
        .template
        .spec
        .as_mut()
        .ok_or_else(|| unexpected("pod template has no spec"))?;
    let position = pod_spec
        .containers
        .iter()
        .position(|c| c.name == spec.name)
        .unwrap_or(0);
    let container = pod_spec
        .containers
        .get_mut(position)
        .ok_or_else(|| unexpected("pod template has no containers"))?;

    container.image = Some(spec.image.clone());
    if let Some(mapping) = spec.primary_port() {
        let ports = container.ports.get_or_insert_with(Vec::new);
        match ports
            .iter_mut()
            .find(|p| p.name.as_deref() == Some(CONTAINER_PORT_NAME))
        {
            Some(port) => {
                port.container_port = mapping.container_port;
                port.protocol = Some(mapping.protocol.as_str().to_string());
            }
            None => ports.insert(0, container_port(mapping)),
        }
    }

    Ok(())
}

/// The microservice fields reported by a live Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedWorkload {
    pub name: String,
    pub image: String,
    pub replicas: i32,
}

/// Read back name, image and replica count from a live Deployment.
///
/// The name comes from the selector label, so a Deployment that does not
/// select a microservice's pods is reported as unexpected.
pub fn observe(deployment: &Deployment) -> Result<ObservedWorkload> {
    let object_name = deployment.metadata.name.clone().unwrap_or_default();
    let unexpected = |message: &str| MicroserviceError::UnexpectedObject {
        kind: KIND,
        name: object_name.clone(),
        message: message.to_string(),
    };

    let spec = deployment
        .spec
        .as_ref()
        .ok_or_else(|| unexpected("Deployment has no spec"))?;
    let name = spec
        .selector
        .match_labels
        .as_ref()
        .and_then(|l| l.get(labels::MICROSERVICE))
        .cloned()
        .ok_or_else(|| unexpected("selector has no microservice label"))?;
    let containers = spec
        .template
        .spec
        .as_ref()
        .map(|p| p.containers.as_slice())
        .unwrap_or_default();
    let container = containers
        .iter()
        .find(|c| c.name == name)
        .or_else(|| containers.first())
        .ok_or_else(|| unexpected("pod template has no containers"))?;
    let image = container
        .image
        .clone()
        .ok_or_else(|| unexpected("container has no image"))?;

    Ok(ObservedWorkload {
        name,
        image,
        // The API server defaults an unset replica count to 1
        replicas: spec.replicas.unwrap_or(1),
    })
}

/// Whether a Deployment selects the pods of the named microservice
pub fn is_managed_by(deployment: &Deployment, name: &str) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.as_ref())
        .is_some_and(|labels| labels == &selector_labels(name))
}

/// Whether the API has accepted a delete for this Deployment
pub fn is_terminating(deployment: &Deployment) -> bool {
    deployment.metadata.deletion_timestamp.is_some()
}

#[instrument(skip(client, spec), fields(name = %spec.name))]
pub async fn create(client: &Client, spec: &MicroserviceSpec, namespace: &str) -> Result<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let deployment = build_deployment(spec, namespace);

    let created = submit(&api, KIND, &spec.name, &deployment).await?;
    info!("Created Deployment {}/{}", namespace, spec.name);
    Ok(created)
}

#[instrument(skip(client))]
pub async fn read(client: &Client, name: &str, namespace: &str) -> Result<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    fetch(&api, KIND, Phase::Read, name).await
}

#[instrument(skip(client, spec, settings))]
pub async fn update(
    client: &Client,
    name: &str,
    namespace: &str,
    spec: &MicroserviceSpec,
    settings: &LifecycleSettings,
) -> Result<Deployment> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    let updated = replace_with_retry(&api, KIND, name, settings.conflict_retry_attempts, |current| {
        apply_spec(current, spec)
    })
    .await?;
    info!("Updated Deployment {}/{}", namespace, name);
    Ok(updated)
}

#[instrument(skip(client, settings))]
pub async fn delete(
    client: &Client,
    name: &str,
    namespace: &str,
    settings: &LifecycleSettings,
) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    delete_and_confirm(&api, KIND, name, settings).await
}
