// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Handoff routing engine.
//!
//! This crate provides the error taxonomy, the domain types, and the adapter
//! traits shared by every other crate in the workspace. Channel, enrichment,
//! notification, and storage adapters all implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::HandoffError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{ChannelAdapter, Enricher, PluginAdapter, StorageAdapter, TicketNotifier};
