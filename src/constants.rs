// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys shared by the Deployment and the Service
pub mod labels {
    /// Selector label binding the Service to the Deployment's pods, value is the microservice name
    pub const MICROSERVICE: &str = "microservice";
}

/// Name of the container port exposed by the workload
pub const CONTAINER_PORT_NAME: &str = "http";

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Optimistic-concurrency retry configuration
pub mod conflict {
    /// Write attempts before an update gives up on conflicts
    pub const RETRY_ATTEMPTS: u32 = 5;
}

/// Deletion confirmation polling configuration
pub mod deletion {
    /// Interval in seconds between existence checks after a delete
    pub const POLL_INTERVAL_SECS: u64 = 5;
    /// Seconds to wait for an object to disappear before giving up
    pub const TIMEOUT_SECS: u64 = 300;
}
