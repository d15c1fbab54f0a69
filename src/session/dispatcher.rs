//! The per-session dispatch state machine.
//!
//! The dispatcher owns the active modal context, the prompt, and the
//! command history. For every completed line it resolves a handler in a
//! fixed order (active context, exact key, pattern key, the built-in
//! `exit`, miss), invokes it, and applies the returned response envelope:
//! output accumulation, prompt replacement, context transition, and an
//! optional single re-dispatch via `issue_command`.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use tracing::{debug, info};

use super::registry::CommandRegistry;
use super::{Principal, Reply};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::plugins::{
    self, CommandPlugin, ContextSwitch, PluginContext, SharedCommandIndex, SharedHistory,
};

/// Maximum number of `issue_command` re-dispatches per completed line.
///
/// One level covers history replay; anything deeper is a plugin
/// configuration error.
const MAX_REISSUE_DEPTH: usize = 1;

/// Dispatch ownership of incoming lines.
#[derive(Clone, Default)]
pub enum DispatchState {
    /// Lines are resolved through the registry.
    #[default]
    Normal,
    /// The contained plugin owns every line until it releases the context.
    InContext(Arc<dyn CommandPlugin>),
}

enum Resolution {
    Handler(Arc<dyn CommandPlugin>),
    Exit,
    Miss,
}

/// Routes completed lines and keystrokes to plugins and applies their
/// response envelopes.
pub struct Dispatcher {
    hostname: String,
    prompt: String,
    state: DispatchState,
    registry: CommandRegistry,
    history: SharedHistory,
}

impl Dispatcher {
    /// Builds the full session engine for an authenticated principal:
    /// plugin instances in configuration order, the registry, and the
    /// initial `<hostname>#` prompt.
    pub async fn build(config: &ServerConfig, principal: &Principal) -> Self {
        let history = SharedHistory::default();
        let command_index = SharedCommandIndex::default();
        let ctx = PluginContext {
            hostname: principal.hostname.clone(),
            username: principal.username.clone(),
            directory: config.directory.clone(),
            history: history.clone(),
            command_index: command_index.clone(),
        };

        let mut instances = Vec::with_capacity(config.plugins.len());
        for id in &config.plugins {
            instances.push(plugins::build_plugin(*id, &ctx).await);
        }
        let registry = CommandRegistry::build(&instances, &command_index);

        Self::new(principal.hostname.clone(), registry, history)
    }

    /// Assembles a dispatcher from prebuilt parts.
    pub fn new(hostname: String, registry: CommandRegistry, history: SharedHistory) -> Self {
        let prompt = format!("{hostname}#");
        Self {
            hostname,
            prompt,
            state: DispatchState::Normal,
            registry,
            history,
        }
    }

    /// The session's current prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The hostname this session impersonates.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Whether a modal context currently owns the input.
    pub fn in_context(&self) -> bool {
        matches!(self.state, DispatchState::InContext(_))
    }

    /// Keystroke bytes the assembler should intercept.
    pub fn keystroke_intercepts(&self) -> HashSet<u8> {
        self.registry.keystroke_intercepts()
    }

    fn resolve(&self, line: &str) -> Resolution {
        // An active context owns every line unconditionally; no registry
        // lookup happens until it releases ownership.
        if let DispatchState::InContext(handler) = &self.state {
            return Resolution::Handler(handler.clone());
        }
        if let Some(handler) = self.registry.resolve(line) {
            return Resolution::Handler(handler);
        }
        if line == "exit" {
            return Resolution::Exit;
        }
        Resolution::Miss
    }

    /// Dispatches one completed line and aggregates the session effect.
    ///
    /// The line is appended to history before dispatch regardless of the
    /// match outcome; re-issued commands inside the trampoline are not.
    /// When a chain re-issues, the final envelope's prompt decision wins.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::CommandLoop`] when a re-issued command
    /// produces another re-issue.
    pub async fn dispatch_line(&mut self, line: &str) -> Result<Reply, ServerError> {
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());

        let mut reply = Reply::default();
        let mut pending = Some(line.to_string());
        let mut reissues = 0usize;

        while let Some(current) = pending.take() {
            match self.resolve(&current) {
                Resolution::Exit => {
                    debug!("{}: session closed by 'exit'", self.hostname);
                    reply.close = true;
                }
                Resolution::Miss => {
                    info!("{}: No match for '{}'", self.hostname, current);
                    reply.redraw_prompt = true;
                }
                Resolution::Handler(handler) => {
                    let envelope = handler.execute_command(&current).await;

                    reply.output.push_str(&envelope.output);
                    self.state = match envelope.context {
                        ContextSwitch::Clear => DispatchState::Normal,
                        ContextSwitch::Retain => DispatchState::InContext(handler.clone()),
                        ContextSwitch::Delegate(other) => DispatchState::InContext(other),
                    };
                    if let Some(new_prompt) = envelope.new_prompt {
                        self.prompt = new_prompt;
                    }
                    reply.redraw_prompt = envelope.prompt;

                    if let Some(next) = envelope.issue_command {
                        if reissues >= MAX_REISSUE_DEPTH {
                            return Err(ServerError::CommandLoop(next));
                        }
                        reissues += 1;
                        pending = Some(next);
                    }
                }
            }
        }
        Ok(reply)
    }

    /// Dispatches one intercepted keystroke.
    ///
    /// Only the output and prompt fields of the keystroke envelope are
    /// applied; context transitions and re-issues are line concerns.
    pub async fn dispatch_keystroke(&mut self, byte: u8, line_buffer: &str) -> Reply {
        let Some(handler) = self.registry.keystroke_handler(byte) else {
            return Reply::default();
        };
        let envelope = handler.execute_keystroke(byte, line_buffer).await;
        Reply {
            output: envelope.output,
            redraw_prompt: envelope.prompt,
            close: false,
        }
    }
}
