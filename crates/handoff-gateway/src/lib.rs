// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Handoff engine.
//!
//! Receives platform webhooks at `/webhooks/{channel}/{tenant_id}` and hands
//! them to the routing [`Router`](handoff_routing::Router). Platforms only
//! ever see `{"ok": true}`, 401 for a bad secret, or 404 for a tenant or
//! channel that is not configured. `/health` and `/metrics` are served
//! alongside for process supervisors and Prometheus.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, HealthState, build_app, start_server};
