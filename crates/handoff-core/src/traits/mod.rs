// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Handoff routing engine.
//!
//! Network-facing adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` so they can be held as trait objects by the orchestrator.

pub mod adapter;
pub mod channel;
pub mod enrichment;
pub mod notifier;
pub mod storage;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use enrichment::Enricher;
pub use notifier::TicketNotifier;
pub use storage::StorageAdapter;
