// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation engine - drives the workload and exposure adapters as one
//! microservice.
//!
//! Ordering rules:
//! - create: Deployment first, Service only once the Deployment exists. A
//!   failed Service create leaves the Deployment in place.
//! - update: Deployment, then Service, then a fresh read.
//! - delete: Deployment, then Service, each confirmed absent before returning.

use crate::adapters::{exposure, workload, LifecycleSettings};
use crate::error::{MicroserviceError, Result};
use crate::types::MicroserviceSpec;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Client;
use tracing::{error, info, instrument, warn};

/// Lifecycle entry point for a microservice.
///
/// At most one operation per name and namespace may be in flight; the
/// reconciler holds no locks of its own.
pub struct MicroserviceReconciler {
    client: Client,
    settings: LifecycleSettings,
}

impl MicroserviceReconciler {
    pub fn new(client: Client, settings: LifecycleSettings) -> Self {
        Self { client, settings }
    }

    /// Create the Deployment and then the Service, returning the identifier
    /// the caller should persist.
    ///
    /// A Deployment left behind by an earlier partial create is adopted when
    /// it already selects this microservice's pods and is not being deleted.
    /// The adopted Deployment is brought to `spec` before the Service is
    /// created.
    #[instrument(skip(self, spec), fields(name = %spec.name))]
    pub async fn create(&self, spec: &MicroserviceSpec, namespace: &str) -> Result<String> {
        spec.validate()?;

        match workload::create(&self.client, spec, namespace).await {
            Ok(_) => {}
            Err(err) if err.is_already_exists() => {
                let existing = workload::read(&self.client, &spec.name, namespace).await?;
                if !workload::is_managed_by(&existing, &spec.name)
                    || workload::is_terminating(&existing)
                {
                    error!("Failed to create deployment: {}", err);
                    return Err(err);
                }
                warn!(
                    "Deployment {}/{} already exists from an earlier create, adopting it",
                    namespace, spec.name
                );
                if let Err(err) =
                    workload::update(&self.client, &spec.name, namespace, spec, &self.settings).await
                {
                    error!("Failed to update adopted deployment: {}", err);
                    return Err(err);
                }
            }
            Err(err) => {
                error!("Failed to create deployment: {}", err);
                return Err(err);
            }
        }

        if let Err(err) = exposure::create(&self.client, spec, namespace).await {
            error!(
                "Failed to create service, deployment {}/{} is left in place: {}",
                namespace, spec.name, err
            );
            return Err(err);
        }

        info!("Microservice {}/{} created", namespace, spec.name);
        Ok(spec.name.clone())
    }

    /// Read both objects and merge them into the desired-state shape
    #[instrument(skip(self))]
    pub async fn read(&self, name: &str, namespace: &str) -> Result<MicroserviceSpec> {
        let deployment = workload::read(&self.client, name, namespace).await?;
        let service = exposure::read(&self.client, name, namespace).await?;

        merge_view(&deployment, &service)
    }

    /// Update the Deployment, then the Service, and return the merged state
    /// read back from the API.
    #[instrument(skip(self, spec))]
    pub async fn update(
        &self,
        name: &str,
        namespace: &str,
        spec: &MicroserviceSpec,
    ) -> Result<MicroserviceSpec> {
        spec.validate()?;
        if spec.name != name {
            return Err(MicroserviceError::InvalidSpec(format!(
                "name is immutable: {} cannot be renamed to {}",
                name, spec.name
            )));
        }

        if let Err(err) = workload::update(&self.client, name, namespace, spec, &self.settings).await
        {
            error!("Failed to update deployment: {}", err);
            return Err(err);
        }

        if let Err(err) = exposure::update(&self.client, name, namespace, spec, &self.settings).await
        {
            error!("Failed to update service: {}", err);
            return Err(err);
        }

        self.read(name, namespace).await
    }

    /// Delete the Deployment, then the Service, waiting for each to disappear.
    ///
    /// On error the caller keeps its identifier; repeating the call is safe.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
        if let Err(err) = workload::delete(&self.client, name, namespace, &self.settings).await {
            error!("Failed to delete deployment: {}", err);
            return Err(err);
        }

        if let Err(err) = exposure::delete(&self.client, name, namespace, &self.settings).await {
            error!("Failed to delete service: {}", err);
            return Err(err);
        }

        info!("Microservice {}/{} deleted", namespace, name);
        Ok(())
    }
}

/// Name, image and replicas come from the Deployment; ports and exposure
/// from the Service.
pub fn merge_view(deployment: &Deployment, service: &Service) -> Result<MicroserviceSpec> {
    let observed_workload = workload::observe(deployment)?;
    let observed_exposure = exposure::observe(service)?;

    Ok(MicroserviceSpec {
        name: observed_workload.name,
        image: observed_workload.image,
        replicas: observed_workload.replicas,
        ports: observed_exposure.ports,
        expose_type: observed_exposure.expose_type,
        external_name: observed_exposure.external_name,
    })
}
