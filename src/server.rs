//! SSH transport for the emulator.
//!
//! Terminates SSH with russh: password authentication (the username
//! carries the emulated hostname as `username::hostname`), PTY and shell
//! requests, and the plumbing that binds an accepted channel to a session
//! driver task. A failing session tears down only its own channel; the
//! listener keeps accepting.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::keys::PrivateKey;
use russh::server::{Auth, Config, Handler, Msg, Server, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{self, ServerConfig};
use crate::error::ServerError;
use crate::session::{Dispatcher, Principal, SessionDriver, Transport};

/// Loads the server host key.
///
/// # Errors
///
/// Returns [`ServerError::HostKey`] when the key file is missing or not a
/// valid private key. Callers treat this as fatal at startup.
pub fn load_host_key(path: &Path) -> Result<PrivateKey, ServerError> {
    russh::keys::load_secret_key(path, None).map_err(|source| ServerError::HostKey {
        path: path.to_path_buf(),
        source,
    })
}

fn digest(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// One SSH listener serving emulated device sessions.
pub struct EmulatorServer {
    config: Arc<ServerConfig>,
    host_key: PrivateKey,
}

impl EmulatorServer {
    pub fn new(config: Arc<ServerConfig>, host_key: PrivateKey) -> Self {
        Self { config, host_key }
    }

    /// Binds the given port and serves connections until the listener
    /// fails.
    pub async fn run(mut self, port: u16) -> Result<(), ServerError> {
        let ssh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            auth_rejection_time: Duration::from_secs(3),
            auth_rejection_time_initial: Some(Duration::ZERO),
            keys: vec![self.host_key.clone()],
            preferred: config::server_preferred(),
            ..Default::default()
        };

        info!("SSH server listening on port {}", port);
        self.run_on_address(Arc::new(ssh_config), ("0.0.0.0", port))
            .await?;
        Ok(())
    }
}

impl Server for EmulatorServer {
    type Handler = ClientHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> ClientHandler {
        debug!("Connection from {:?}", peer_addr);
        ClientHandler::new(self.config.clone())
    }

    fn handle_session_error(&mut self, error: ServerError) {
        // One failed session must not take down the listener.
        error!("session ended with error: {}", error);
    }
}

/// Per-connection russh handler.
///
/// Holds the authenticated principal and the input channel into the
/// session task. The accepted `Channel` itself is not stored: russh
/// enqueues every message into the channel's internal buffer before the
/// callback runs, and an undrained buffer stalls the whole session event
/// loop.
pub struct ClientHandler {
    config: Arc<ServerConfig>,
    expected_password_hash: Option<[u8; 32]>,
    principal: Option<Principal>,
    input: Option<mpsc::Sender<Vec<u8>>>,
}

impl ClientHandler {
    fn new(config: Arc<ServerConfig>) -> Self {
        // The credential text stays in the shared config; the handler
        // keeps only a digest for comparison.
        let expected_password_hash = config.password.as_deref().map(digest);
        Self {
            config,
            expected_password_hash,
            principal: None,
            input: None,
        }
    }

    fn reject() -> Auth {
        Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        }
    }
}

impl Handler for ClientHandler {
    type Error = ServerError;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let principal = Principal::from_login(user);
        if user.split_once("::").is_none() {
            warn!(
                "login '{}' did not use the username::hostname form, emulating '{}'",
                user, principal.hostname
            );
        }

        if let Some(expected) = &self.expected_password_hash
            && digest(password) != *expected
        {
            info!("{}: password rejected", principal.username);
            return Ok(Self::reject());
        }
        if let Some(required) = &self.config.username
            && principal.username != *required
        {
            info!("{}: username rejected", principal.username);
            return Ok(Self::reject());
        }

        info!(
            "{}: Hostname set to {}",
            principal.username, principal.hostname
        );
        self.principal = Some(principal);
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!("session channel {} opened", channel.id());
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!("pty requested for terminal '{}'", term);
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let principal = self
            .principal
            .clone()
            .ok_or(ServerError::NotAuthenticated)?;
        session.channel_success(channel)?;

        let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>(256);
        self.input = Some(input_tx);

        let dispatcher = Dispatcher::build(&self.config, &principal).await;
        let transport = ChannelTransport::new(session.handle(), channel, input_rx);
        let hostname = principal.hostname;

        tokio::spawn(async move {
            let driver = SessionDriver::new(transport, dispatcher);
            if let Err(err) = driver.run().await {
                error!("{}: session terminated: {}", hostname, err);
            }
        });
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(input) = &self.input
            && input.send(data.to_vec()).await.is_err()
        {
            // The session task is gone; drop our side and close the
            // channel.
            self.input = None;
            let _ = session.close(channel);
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.input = None;
        Ok(())
    }

    async fn channel_close(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.input = None;
        Ok(())
    }
}

/// Session transport over an accepted SSH channel.
///
/// Sends go through the session handle; receives drain the byte queue fed
/// by the `data` callback. Dropping the sender side (client disconnect,
/// channel close) ends the stream.
pub struct ChannelTransport {
    handle: russh::server::Handle,
    channel: ChannelId,
    input: mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl ChannelTransport {
    pub fn new(
        handle: russh::server::Handle,
        channel: ChannelId,
        input: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        Self {
            handle,
            channel,
            input,
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ServerError> {
        self.handle
            .data(self.channel, CryptoVec::from_slice(bytes))
            .await
            .map_err(|_| ServerError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Some(byte);
            }
            match self.input.recv().await {
                Some(chunk) => self.pending.extend(chunk),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.handle.eof(self.channel).await;
        let _ = self.handle.close(self.channel).await;
    }
}
