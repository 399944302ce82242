// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The remote object a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Workload,
    Exposure,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Workload => f.write_str("workload (Deployment)"),
            ObjectKind::Exposure => f.write_str("exposure (Service)"),
        }
    }
}

/// The lifecycle operation that was running when a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Create => f.write_str("create"),
            Phase::Read => f.write_str("read"),
            Phase::Update => f.write_str("update"),
            Phase::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MicroserviceError {
    #[error("{kind} '{name}' not found during {phase}")]
    NotFound {
        kind: ObjectKind,
        phase: Phase,
        name: String,
    },

    #[error("{phase} of {kind} '{name}' rejected by the API: {source}")]
    RemoteWrite {
        kind: ObjectKind,
        phase: Phase,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("{phase} of {kind} '{name}' failed to read from the API: {source}")]
    RemoteRead {
        kind: ObjectKind,
        phase: Phase,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("update of {kind} '{name}' lost {attempts} consecutive write conflicts")]
    ConflictRetryExhausted {
        kind: ObjectKind,
        name: String,
        attempts: u32,
    },

    #[error("{kind} '{name}' still present {timeout:?} after deletion was requested")]
    DeletionTimeout {
        kind: ObjectKind,
        name: String,
        timeout: Duration,
    },

    #[error("{kind} '{name}' does not have the expected shape: {message}")]
    UnexpectedObject {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    #[error("Invalid microservice spec: {0}")]
    InvalidSpec(String),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),
}

impl MicroserviceError {
    /// The remote object the error is about, if any
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            MicroserviceError::NotFound { kind, .. }
            | MicroserviceError::RemoteWrite { kind, .. }
            | MicroserviceError::RemoteRead { kind, .. }
            | MicroserviceError::ConflictRetryExhausted { kind, .. }
            | MicroserviceError::DeletionTimeout { kind, .. }
            | MicroserviceError::UnexpectedObject { kind, .. } => Some(*kind),
            MicroserviceError::InvalidSpec(_) | MicroserviceError::KubeconfigError(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MicroserviceError::NotFound { .. })
    }

    /// A create rejected because an object with the same name exists
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            MicroserviceError::RemoteWrite { source, .. } if crate::kubernetes::is_already_exists(source)
        )
    }
}

pub type Result<T> = std::result::Result<T, MicroserviceError>;
