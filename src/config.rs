// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::adapters::LifecycleSettings;
use crate::constants::{conflict, deletion, DEFAULT_NAMESPACE};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace the Deployment and Service live in
    pub namespace: String,
    /// Kubeconfig file, kube's standard lookup is used when unset
    pub kubeconfig_path: Option<PathBuf>,
    /// Kubeconfig context overriding the current context
    pub kube_context: Option<String>,
    pub conflict_retry_attempts: u32,
    pub deletion_poll_interval: Duration,
    pub deletion_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("PROJECT_NAMESPACE")
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let kubeconfig_path = lookup("KUBECONFIG_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let kube_context = lookup("KUBE_CONTEXT").filter(|c| !c.is_empty());

        let conflict_retry_attempts: u32 =
            parse_or(&lookup, "CONFLICT_RETRY_ATTEMPTS", conflict::RETRY_ATTEMPTS)?;
        if conflict_retry_attempts == 0 {
            anyhow::bail!("CONFLICT_RETRY_ATTEMPTS must be at least 1");
        }
        let poll_secs: u64 = parse_or(
            &lookup,
            "DELETION_POLL_INTERVAL_SECS",
            deletion::POLL_INTERVAL_SECS,
        )?;
        let timeout_secs: u64 = parse_or(&lookup, "DELETION_TIMEOUT_SECS", deletion::TIMEOUT_SECS)?;

        Ok(Config {
            namespace,
            kubeconfig_path,
            kube_context,
            conflict_retry_attempts,
            deletion_poll_interval: Duration::from_secs(poll_secs),
            deletion_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Retry and polling settings handed to the reconciler
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            conflict_retry_attempts: self.conflict_retry_attempts,
            deletion_poll_interval: self.deletion_poll_interval,
            deletion_timeout: self.deletion_timeout,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
