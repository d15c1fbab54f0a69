//! Emulator entry point: CLI flags, logging, and listener spawn.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use rnetsim::config::ServerConfig;
use rnetsim::plugins::PluginId;
use rnetsim::server::{self, EmulatorServer};

#[derive(Parser, Debug)]
#[command(
    name = "rnetsim",
    about = "SSH network device emulator for automation testing and training",
    version
)]
struct Args {
    /// Base port for the SSH server
    #[arg(short, long, default_value_t = 2200)]
    base_port: u16,

    /// Path to the device/commands directories
    #[arg(short, long, default_value = "./configs")]
    directory: PathBuf,

    /// SSH server authentication password
    #[arg(short, long)]
    password: Option<String>,

    /// SSH server authentication username
    #[arg(short, long)]
    username: Option<String>,

    /// Comma-separated list of plugins to enable
    #[arg(
        short,
        long,
        default_value = "confmode,showfs,help,history,navigation"
    )]
    enable_plugins: String,

    /// Number of SSH listeners to start
    #[arg(short = 'c', long, default_value_t = 1)]
    server_count: u16,

    /// Server-side SSH key file path
    #[arg(short = 'k', long)]
    ssh_key: PathBuf,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rnetsim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_plugins(list: &str) -> Result<Vec<PluginId>> {
    list.split(',')
        .filter(|id| !id.trim().is_empty())
        .map(|id| {
            id.parse::<PluginId>()
                .with_context(|| format!("in --enable-plugins '{list}'"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = ServerConfig {
        host_key_path: args.ssh_key,
        base_port: args.base_port,
        server_count: args.server_count,
        directory: args.directory,
        username: args.username,
        password: args.password,
        plugins: parse_plugins(&args.enable_plugins)?,
    };
    config.validate().context("invalid configuration")?;

    // Fatal at startup rather than on first connection.
    let host_key = server::load_host_key(&config.host_key_path)?;

    let config = Arc::new(config);
    let mut listeners = Vec::new();
    for port in config.ports() {
        let server = EmulatorServer::new(config.clone(), host_key.clone());
        listeners.push(tokio::spawn(async move {
            if let Err(err) = server.run(port).await {
                error!("listener on port {} failed: {}", port, err);
            }
        }));
    }
    for listener in listeners {
        listener.await.context("listener task panicked")?;
    }
    Ok(())
}
