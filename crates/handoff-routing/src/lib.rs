// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational routing and bot/agent handoff.
//!
//! This crate provides:
//! - [`TenantResolver`]: tenant and channel-credential lookup plus webhook authentication
//! - [`ThreadResolver`]: stores each inbound message in its contact's single open conversation
//! - [`handoff`]: the ordered decision table mapping a turn to a [`BotAction`]
//! - [`AssignmentBalancer`]: least-loaded agent selection
//! - [`BusinessHoursGate`]: per-tenant opening hours in the tenant's timezone
//! - [`Router`]: the per-webhook pipeline tying them together

pub mod balancer;
pub mod clock;
pub mod handoff;
pub mod hours;
pub mod identity;
pub mod orchestrator;
pub mod replies;
pub mod tenant;

pub use balancer::{AssignmentBalancer, select_least_loaded};
pub use clock::{Clock, FixedClock, SystemClock};
pub use handoff::{BotAction, TurnFacts, decide};
pub use hours::{BusinessHoursGate, is_open_at};
pub use identity::{ResolvedThread, ThreadResolver};
pub use orchestrator::{Router, RoutingSettings, WebhookOutcome};
pub use tenant::{ResolvedTenant, TenantResolver};
