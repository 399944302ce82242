// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Adapters for the two remote objects making up a microservice.

pub mod exposure;
pub mod lifecycle;
pub mod workload;

pub use lifecycle::LifecycleSettings;
