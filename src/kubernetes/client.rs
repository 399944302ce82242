// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client creation from kubeconfig files and contexts

use crate::config::Config;
use crate::error::{MicroserviceError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Create a Kubernetes client from the configured kubeconfig path and context.
///
/// Without a path or context the configuration is inferred (in-cluster service
/// account, then `$KUBECONFIG`, then `~/.kube/config`).
#[instrument(skip(config), fields(namespace = %config.namespace))]
pub async fn create_client(config: &Config) -> Result<Client> {
    match (&config.kubeconfig_path, &config.kube_context) {
        (None, None) => {
            debug!("No kubeconfig path or context configured, inferring client config");
            let c = KConfig::infer().await.map_err(|e| {
                MicroserviceError::KubeconfigError(format!("Failed to infer config: {}", e))
            })?;
            Client::try_from(c).map_err(|e| {
                MicroserviceError::KubeconfigError(format!("Failed to create client: {}", e))
            })
        }
        (Some(path), context) => {
            let kubeconfig = read_kubeconfig_file(path).await?;
            create_client_from_kubeconfig(&kubeconfig, context.as_deref()).await
        }
        (None, Some(context)) => {
            let kubeconfig = Kubeconfig::read().map_err(|e| {
                MicroserviceError::KubeconfigError(format!("Failed to read kubeconfig: {}", e))
            })?;
            client_from_parsed(kubeconfig, Some(context)).await
        }
    }
}

async fn read_kubeconfig_file(path: &Path) -> Result<String> {
    info!("Loading kubeconfig from {}", path.display());
    tokio::fs::read_to_string(path).await.map_err(|e| {
        MicroserviceError::KubeconfigError(format!(
            "Failed to read kubeconfig {}: {}",
            path.display(),
            e
        ))
    })
}

/// Create a Kubernetes client from a kubeconfig document, optionally pinning a context
pub async fn create_client_from_kubeconfig(kubeconfig: &str, context: Option<&str>) -> Result<Client> {
    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig).map_err(|e| {
        MicroserviceError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e))
    })?;

    client_from_parsed(kubeconfig_parsed, context).await
}

async fn client_from_parsed(kubeconfig: Kubeconfig, context: Option<&str>) -> Result<Client> {
    let client_config = config_from_parsed(kubeconfig, context).await?;

    Client::try_from(client_config)
        .map_err(|e| MicroserviceError::KubeconfigError(format!("Failed to create client: {}", e)))
}

async fn config_from_parsed(kubeconfig: Kubeconfig, context: Option<&str>) -> Result<KConfig> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    KConfig::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| MicroserviceError::KubeconfigError(format!("Failed to create config: {}", e)))
}
