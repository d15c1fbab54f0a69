//! Error types for the SSH emulator.
//!
//! This module defines all faults the server can raise: configuration
//! problems detected at startup, transport failures during a session, and
//! violations of the dispatch contract. Command plugins do not surface
//! expected domain failures here; those are rendered as response output.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the emulator core and its SSH transport.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A configured plugin identifier is not in the compile-time catalogue.
    ///
    /// Reported once at startup; the process exits non-zero.
    #[error("unknown plugin id '{0}'")]
    UnknownPlugin(String),

    /// The server configuration is inconsistent (port range, listener count).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The server host key could not be loaded.
    #[error("failed to load host key {path}: {source}")]
    HostKey {
        path: PathBuf,
        source: russh::keys::Error,
    },

    /// A shell was requested on a connection that never authenticated.
    #[error("shell requested before authentication")]
    NotAuthenticated,

    /// The session transport is gone; the session loop terminates.
    #[error("transport closed")]
    TransportClosed,

    /// A re-issued command produced another re-issue.
    ///
    /// The dispatch trampoline is bounded to a single re-dispatch; a chain
    /// that tries to go deeper indicates a misconfigured plugin set and
    /// tears down the session rather than looping.
    #[error("command re-issue loop detected at '{0}'")]
    CommandLoop(String),

    /// An external automation job reported failure.
    #[error("automation job failed: {0}")]
    JobFailed(String),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),

    /// An I/O error outside the SSH transport (content files, job runner).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
