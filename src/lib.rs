//! # rnetsim - Network Device SSH Emulator
//!
//! `rnetsim` emulates the interactive command-line shell of a network
//! device over SSH, for automation testing and training. It presents a
//! router-like prompt, accepts line-oriented commands, and dispatches
//! each to a pluggable handler that may answer inline, switch the session
//! into a sub-mode (e.g. configure), or replay history.
//!
//! ## Features
//!
//! - **Per-Session Dispatch Engine**: explicit `Normal`/`InContext` state
//!   machine routing each completed line to exact-match, pattern-match,
//!   or modal handlers
//! - **Plugin Catalogue**: a small, fixed set of command plugins enabled
//!   per configuration, registered once per session
//! - **Content-Backed Commands**: one text file per emulated command in a
//!   directory-per-hostname tree
//! - **Hostname Impersonation**: the SSH username carries the emulated
//!   hostname (`admin::core-sw1`)
//! - **Async/Await**: one Tokio task per session; many concurrent
//!   sessions per listener
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use rnetsim::config::ServerConfig;
//! use rnetsim::plugins::PluginId;
//! use rnetsim::server::{self, EmulatorServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ServerConfig {
//!         host_key_path: PathBuf::from("./ssh_host_key"),
//!         base_port: 2200,
//!         server_count: 1,
//!         directory: PathBuf::from("./configs"),
//!         username: None,
//!         password: None,
//!         plugins: vec![
//!             PluginId::ConfMode,
//!             PluginId::ShowFs,
//!             PluginId::Help,
//!             PluginId::History,
//!             PluginId::Navigation,
//!         ],
//!     });
//!     config.validate()?;
//!
//!     let host_key = server::load_host_key(&config.host_key_path)?;
//!     EmulatorServer::new(config, host_key).run(2200).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`session::Dispatcher`] - the per-session command dispatch engine
//! - [`plugins::CommandPlugin`] - the capability contract plugins implement
//! - [`server::EmulatorServer`] - the SSH listener binding sessions to
//!   channels
//! - [`config::ServerConfig`] - process-wide configuration
//! - [`error::ServerError`] - error types for the server core

pub mod config;
pub mod error;
pub mod plugins;
pub mod server;
pub mod session;
