//! udplog - UDP log collector with a live web viewer
//!
//! Receives log lines over UDP, keeps the most recent in memory, writes them
//! to daily files and streams them to browsers.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use udplog_config::{AppConfig, DEFAULT_CONFIG_FILE};
use udplog_server::LogServer;

#[derive(Parser)]
#[command(name = "udplog")]
#[command(about = "UDP log collector with a live web viewer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector
    Run {
        /// Path to config file
        #[arg(short, long, env = "UDPLOG_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Override the UDP port
        #[arg(long, env = "UDPLOG_UDP_PORT")]
        udp_port: Option<u16>,

        /// Override the HTTP port
        #[arg(long, env = "UDPLOG_WEB_PORT")]
        web_port: Option<u16>,

        /// Emit logs as JSON
        #[arg(long)]
        log_json: bool,
    },

    /// Write a config file with every default filled in
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            udp_port,
            web_port,
            log_json,
        } => {
            init_tracing(log_json)?;
            if let Err(e) = run(config, udp_port, web_port).await {
                error!(error = %e, "udplog failed");
                return Err(e);
            }
        }

        Commands::InitConfig { output, force } => {
            init_tracing(false)?;
            init_config(&output, force)?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("udplog=info".parse()?);
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

async fn run(
    config_path: PathBuf,
    udp_port: Option<u16>,
    web_port: Option<u16>,
) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting udplog");

    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(port) = udp_port {
        config.udp_port = port;
    }
    if let Some(port) = web_port {
        config.web_port = port;
    }

    LogServer::new(config)
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for ctrl-c, shutting down");
            }
        })
        .await?;
    Ok(())
}

fn init_config(output: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
    }

    AppConfig::default().save(output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the file as needed, then run:");
    println!("  udplog run --config {}", output.display());

    Ok(())
}
