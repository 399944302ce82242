// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired-state types for a microservice.

pub mod microservice;

pub use microservice::{selector_labels, ExposureKind, MicroserviceSpec, PortMapping, Protocol};
