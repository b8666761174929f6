// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Handoff integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic,
//! CI-runnable tests without chat platforms, AI providers or mail relays.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock channel adapter with captured outbound sends
//! - [`MockEnricher`] - Scripted enrichment provider
//! - [`MockNotifier`] - Ticket notifier that records instead of mailing
//! - [`TestHarness`] - SQLite-backed router wired to the mocks above

pub mod harness;
pub mod mock_channel;
pub mod mock_enricher;
pub mod mock_notifier;

pub use handoff_routing::FixedClock;
pub use harness::{TENANT_ID, TestHarness, WEBHOOK_SECRET, default_tenant};
pub use mock_channel::{MockChannel, MockInbound, SentItem};
pub use mock_enricher::{EnrichBehavior, MockEnricher, result_with_intent};
pub use mock_notifier::{FiledTicket, MockNotifier};
