// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff - conversational routing and bot/agent handoff for chat platforms.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod import;
mod serve;
mod shutdown;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use handoff_config::{ConfigError, HandoffConfig};

/// Handoff - conversational routing and bot/agent handoff.
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server.
    Serve,
    /// Validate the configuration and print a summary.
    CheckConfig,
    /// Upsert tenants, channel credentials and agents from a TOML file.
    ImportTenants {
        /// Path to the tenants file.
        file: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<HandoffConfig, Vec<ConfigError>> {
    match path {
        Some(path) => handoff_config::load_and_validate_path(path),
        None => handoff_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            handoff_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::CheckConfig => {
            println!("{}", check::summary(&config));
            Ok(())
        }
        Commands::ImportTenants { file } => import::run_import(&config, &file).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["handoff", "--config", "h.toml", "import-tenants", "t.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("h.toml")));
        assert!(matches!(
            cli.command,
            Commands::ImportTenants { ref file } if file == Path::new("t.toml")
        ));

        let cli = Cli::try_parse_from(["handoff", "check-config"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("handoff.toml");
        std::fs::write(&path, "[server]\nport = 9911\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9911);
    }
}
