// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Handoff routing engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and typed
//! operations for tenants, agents, contacts, conversations, and messages.
//! The thread-identity and idempotency guarantees live in the schema
//! (partial unique indexes), so they hold across processes sharing a file.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
