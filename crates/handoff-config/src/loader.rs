// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./handoff.toml` > `~/.config/handoff/handoff.toml` >
//! `/etc/handoff/handoff.toml` with environment variable overrides via `HANDOFF_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HandoffConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/handoff/handoff.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "handoff.toml";

/// Top-level sections addressable from `HANDOFF_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "server",
    "storage",
    "telegram",
    "whatsapp",
    "enrichment",
    "email",
    "routing",
    "prometheus",
];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("handoff/handoff.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/handoff/handoff.toml` (system-wide)
/// 3. `~/.config/handoff/handoff.toml` (user XDG config)
/// 4. `./handoff.toml` (local directory)
/// 5. `HANDOFF_*` environment variables
pub fn load_config() -> Result<HandoffConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<HandoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HandoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider mapping `HANDOFF_SECTION_KEY` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `HANDOFF_ENRICHMENT_GEMINI_API_KEY` maps to `enrichment.gemini_api_key`.
fn env_provider() -> Env {
    Env::prefixed("HANDOFF_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
