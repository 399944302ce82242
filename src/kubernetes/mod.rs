// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation and API error classification.

pub mod client;
pub mod status;

pub use client::create_client;
pub use status::{is_already_exists, is_conflict, is_not_found};
