mod cache;
mod config;
mod error;
mod gate;
mod launcher;
mod stager;
mod vfs;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::DiskCache;
use crate::config::Config;
use crate::launcher::{ExecEntry, LaunchArguments, LaunchOptions, Launcher, LocateFile};
use crate::vfs::HostDirFs;

fn print_help() {
    println!(
        "\
yard-bootstrap v{}

Stages cached game assets into a private filesystem and starts the
dedicated server once they are in place.

USAGE:
    yard-bootstrap [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/bootstrap.toml]

OPTIONS:
    -h, --help        Print this help message and exit
    -V, --version     Print version and exit
        --print-args  Print the server command line, one argument per line, and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG    Log level filter for tracing
                (e.g. debug, yard_bootstrap=debug,warn)

NOTES:
    Assets are never downloaded here. If the cache is empty, run the
    client once so it populates the cache, then start the server again.

EXAMPLES:
    yard-bootstrap                               # uses config/bootstrap.toml
    yard-bootstrap /etc/yard/bootstrap.toml      # custom config path
    RUST_LOG=debug yard-bootstrap                # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let mut print_args = false;
    let mut config_path = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("yard-bootstrap v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--print-args" => print_args = true,
            other if other.starts_with('-') => {
                return Err(anyhow!("Unknown option: {other} (see --help)"));
            }
            other => config_path = Some(other.to_string()),
        }
    }

    // Initialize logging (RUST_LOG=debug for debug mode)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("yard_bootstrap=info")),
        )
        .init();

    let config_path = config_path.unwrap_or_else(|| "config/bootstrap.toml".to_string());
    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    let arguments = LaunchArguments::from_template(&config.server.arguments);
    if print_args {
        for arg in arguments.as_slice() {
            println!("{arg}");
        }
        return Ok(());
    }

    info!(
        "Cache: '{}' in {}",
        config.cache.name,
        config.cache.dir.display()
    );
    info!("Server root: {}", config.server.root.display());
    if arguments.is_empty() {
        warn!("Argument template is empty, starting server without arguments");
    } else {
        info!("Arguments ({}): {arguments}", arguments.len());
    }

    let cache = Arc::new(DiskCache::open(&config.cache.dir, &config.cache.name));
    let fs = Arc::new(HostDirFs::new(&config.server.root));
    let entry = ExecEntry::new(
        &LocateFile::new(&config.server.build_path),
        &config.server.binary,
    );

    let launcher = Launcher::new(cache, fs);
    let options = LaunchOptions {
        arguments,
        working_assets: config.working_assets(),
    };

    tokio::select! {
        result = launcher.launch(&entry, options) => {
            match result {
                Ok(report) if report.is_success() => Ok(()),
                Ok(report) => {
                    error!("Server exited with code {:?}", report.code);
                    Err(anyhow!("Server exited with code {:?}", report.code))
                }
                Err(e) => {
                    let unreleased = launcher.dependencies().unreleased();
                    if !unreleased.is_empty() {
                        error!("Server not started, run dependencies still held: {}", unreleased.join(", "));
                    }
                    error!("Launch failed: {e}");
                    Err(e.into())
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
            Ok(())
        }
    }
}
