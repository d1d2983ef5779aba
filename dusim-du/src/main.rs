//! dusim - 5G DU/UE simulator
//!
//! Connects a simulated gNB-DU to a CU-CP over F1-C, brings up one UE once
//! F1 Setup succeeds and runs until Ctrl+C or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! dusim --config config/config.yml --log-level debug
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dusim_common::{init_logging, LogLevel, SimConfig};
use dusim_du::{Du, SctpTransport};
use tokio::signal;
use tracing::{error, info};

/// dusim - simulated 5G gNB-DU and UE
#[derive(Parser, Debug)]
#[command(name = "dusim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "config/config.yml")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

fn build_transport(config: &SimConfig) -> Result<SctpTransport> {
    let du = &config.du;
    let transport = SctpTransport::new(&du.cucp_address, du.cucp_port);
    if du.local_address.is_empty() {
        return Ok(transport);
    }
    let local: SocketAddr = format!("{}:{}", du.local_address, du.local_port)
        .parse()
        .with_context(|| format!("Invalid local address {}:{}", du.local_address, du.local_port))?;
    Ok(transport.bind(local))
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                let _ = signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Loading configuration from: {}", args.config_file);
    let config = SimConfig::load(&args.config_file)
        .with_context(|| format!("Failed to load configuration from {}", args.config_file))?;
    info!(
        "DU {} ({}) -> CU-CP {}:{}, PLMN {}-{}, PCI {}",
        config.du.id,
        config.du.name,
        config.du.cucp_address,
        config.du.cucp_port,
        config.du.plmn.mcc,
        config.du.plmn.mnc,
        config.du.cell.pci
    );

    let transport = build_transport(&config)?;
    let du = Du::with_transport(config, transport).context("Failed to create DU")?;
    du.start().await.context("Failed to start DU")?;

    wait_for_shutdown().await;
    du.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run(args).await {
        Ok(()) => {
            info!("dusim exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("dusim failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
