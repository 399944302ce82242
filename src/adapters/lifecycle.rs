// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create, fetch, conflict-retrying update and confirmed deletion, shared by
//! the workload and exposure adapters.

use crate::constants::{conflict, deletion};
use crate::error::{MicroserviceError, ObjectKind, Phase, Result};
use crate::kubernetes::{is_conflict, is_not_found};
use kube::api::{DeleteParams, PostParams};
use kube::Api;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Retry budget and deletion polling used by every lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Write attempts before an update reports `ConflictRetryExhausted`
    pub conflict_retry_attempts: u32,
    pub deletion_poll_interval: Duration,
    /// Overall deadline for a deleted object to disappear
    pub deletion_timeout: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            conflict_retry_attempts: conflict::RETRY_ATTEMPTS,
            deletion_poll_interval: Duration::from_secs(deletion::POLL_INTERVAL_SECS),
            deletion_timeout: Duration::from_secs(deletion::TIMEOUT_SECS),
        }
    }
}

/// Submit a new object. Any rejection is surfaced as `RemoteWrite`.
pub async fn submit<K>(api: &Api<K>, kind: ObjectKind, name: &str, object: &K) -> Result<K>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    api.create(&PostParams::default(), object)
        .await
        .map_err(|source| MicroserviceError::RemoteWrite {
            kind,
            phase: Phase::Create,
            name: name.to_string(),
            source,
        })
}

/// Fetch an object, mapping a 404 to `NotFound` for the given phase.
pub async fn fetch<K>(api: &Api<K>, kind: ObjectKind, phase: Phase, name: &str) -> Result<K>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(object) => Ok(object),
        Err(e) if is_not_found(&e) => Err(MicroserviceError::NotFound {
            kind,
            phase,
            name: name.to_string(),
        }),
        Err(source) => Err(MicroserviceError::RemoteRead {
            kind,
            phase,
            name: name.to_string(),
            source,
        }),
    }
}

/// Apply desired changes onto the live object and write it back.
///
/// Each attempt re-fetches the object so the write carries the latest
/// `resourceVersion`. Only conflicts are retried, without delay; every other
/// failure aborts the update.
pub async fn replace_with_retry<K, F>(
    api: &Api<K>,
    kind: ObjectKind,
    name: &str,
    attempts: u32,
    mut apply: F,
) -> Result<K>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
    F: FnMut(&mut K) -> Result<()>,
{
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        let mut current = fetch(api, kind, Phase::Update, name).await?;
        apply(&mut current)?;

        match api.replace(name, &PostParams::default(), &current).await {
            Ok(updated) => {
                debug!("Updated {} {} on attempt {}", kind, name, attempt);
                return Ok(updated);
            }
            Err(e) if is_conflict(&e) => {
                debug!(
                    "Write conflict updating {} {} (attempt {}/{})",
                    kind, name, attempt, attempts
                );
            }
            Err(e) if is_not_found(&e) => {
                return Err(MicroserviceError::NotFound {
                    kind,
                    phase: Phase::Update,
                    name: name.to_string(),
                });
            }
            Err(source) => {
                return Err(MicroserviceError::RemoteWrite {
                    kind,
                    phase: Phase::Update,
                    name: name.to_string(),
                    source,
                });
            }
        }
    }

    warn!(
        "Giving up on {} {} after {} conflicting writes",
        kind, name, attempts
    );
    Err(MicroserviceError::ConflictRetryExhausted {
        kind,
        name: name.to_string(),
        attempts,
    })
}

/// Request deletion and wait until the object can no longer be read.
///
/// An object that is already gone counts as deleted, so the call can be
/// repeated after a timeout. Read errors other than 404 while polling are
/// logged and polling continues until the deadline.
pub async fn delete_and_confirm<K>(
    api: &Api<K>,
    kind: ObjectKind,
    name: &str,
    settings: &LifecycleSettings,
) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => debug!("Deletion of {} {} accepted", kind, name),
        Err(e) if is_not_found(&e) => debug!("{} {} already absent", kind, name),
        Err(source) => {
            return Err(MicroserviceError::RemoteWrite {
                kind,
                phase: Phase::Delete,
                name: name.to_string(),
                source,
            });
        }
    }

    let deadline = Instant::now() + settings.deletion_timeout;

    loop {
        match api.get(name).await {
            Err(e) if is_not_found(&e) => {
                info!("{} {} deleted", kind, name);
                return Ok(());
            }
            Ok(_) => debug!("{} {} still present, waiting for cleanup", kind, name),
            Err(e) => warn!(
                "Error checking whether {} {} is gone: {}, retrying",
                kind, name, e
            ),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(MicroserviceError::DeletionTimeout {
                kind,
                name: name.to_string(),
                timeout: settings.deletion_timeout,
            });
        }

        sleep(settings.deletion_poll_interval.min(deadline - now)).await;
    }
}
