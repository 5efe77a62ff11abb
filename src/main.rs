// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use hawkbit_agent::config::{CliOverrides, ConfigFile};
use hawkbit_agent::error::{AgentError, Result as AgentResult};
use hawkbit_agent::installer::{InstallOutcome, InstallerCapability, RebootCapability};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hawkbit-agent", version, about = "hawkBit DDI update agent")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "/etc/hawkbit-agent/config.toml")]
    config: PathBuf,

    /// Poll exactly once, then exit with a status reflecting the base poll.
    #[arg(long)]
    run_once: bool,

    /// Force TLS on or off regardless of the config file.
    #[arg(long)]
    tls: Option<bool>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,
}

/// Stand-in for the installer/service-manager collaborators spec.md §1 scopes
/// out of this crate entirely. Embedders wire a real
/// [`InstallerCapability`]/[`RebootCapability`] in place of these; this
/// binary exists to drive the poll/identify/deployment state machine, not to
/// ship a production installer.
struct UnwiredInstaller;

#[async_trait]
impl InstallerCapability for UnwiredInstaller {
    async fn notify_ready(&self, _bundle_path: &PathBuf) -> AgentResult<InstallOutcome> {
        Err(AgentError::FileIo(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no installer capability wired into this binary",
        )))
    }
}

struct UnwiredRebooter;

#[async_trait]
impl RebootCapability for UnwiredRebooter {
    async fn request_reboot(&self) -> AgentResult<()> {
        Err(AgentError::FileIo(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no reboot capability wired into this binary",
        )))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("hawkbit_agent=debug")
    } else {
        EnvFilter::new("hawkbit_agent=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let overrides = CliOverrides {
        tls: args.tls,
        run_once: args.run_once,
    };
    let config = ConfigFile::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?
        .resolve(overrides)
        .context("validating configuration")?;

    info!(
        host = %config.host,
        controller_id = %config.controller_id,
        run_once = config.run_once,
        "starting hawkbit-agent"
    );

    let installer = Arc::new(UnwiredInstaller);
    let rebooter = Arc::new(UnwiredRebooter);
    let state = hawkbit_agent::build_state(config, installer, rebooter)
        .await
        .context("initializing agent state")?;

    let exit_code = hawkbit_agent::run(state).await;
    Ok(ExitCode::from(exit_code as u8))
}
