//! Command plugins and the capability contract they implement.
//!
//! Every command module the emulator can serve is a [`CommandPlugin`]: it
//! declares the command keys and keystroke intercepts it answers to and
//! produces a [`Response`] envelope for each invocation. Plugins are
//! instantiated once per session from the compile-time catalogue (see
//! [`build_plugin`]) in configuration order; they never touch session
//! state directly and communicate with the dispatcher only through their
//! envelopes.
//!
//! # Main Components
//!
//! - [`CommandPlugin`] - the capability contract
//! - [`Response`] - the structured result of every invocation
//! - [`CommandKey`] - literal or pattern routing key
//! - [`PluginId`] / [`build_plugin`] - the fixed plugin catalogue

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

mod command_runner;
mod configure;
mod help;
mod history;
mod navigation;
mod show_files;

pub use command_runner::{CommandRunner, InventoryVars, JobSpec};
pub use configure::Configure;
pub use help::Help;
pub use history::History;
pub use navigation::Navigation;
pub use show_files::ShowFileServer;

/// Shared read view of the session command history.
///
/// The dispatcher is the only writer; plugins that need the history (the
/// history plugin) hold a clone of the handle and only read it.
pub type SharedHistory = Arc<RwLock<Vec<String>>>;

/// Shared read view of the literal command keys registered in a session.
///
/// Populated once by the registry after all plugins are built; the help
/// plugin reads it when rendering its listing.
pub type SharedCommandIndex = Arc<RwLock<Vec<String>>>;

/// A routing key a plugin answers to.
#[derive(Debug, Clone)]
pub enum CommandKey {
    /// Matches a completed line exactly.
    Exact(String),
    /// Matches a completed line against an anchored pattern.
    Pattern(Regex),
}

/// Who owns the next completed line after a response is applied.
#[derive(Clone, Default)]
pub enum ContextSwitch {
    /// Return the session to normal registry dispatch.
    #[default]
    Clear,
    /// The plugin that produced this response keeps ownership of input.
    Retain,
    /// Hand ownership of input to another plugin.
    Delegate(Arc<dyn CommandPlugin>),
}

impl fmt::Debug for ContextSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => f.write_str("Clear"),
            Self::Retain => f.write_str("Retain"),
            Self::Delegate(plugin) => write!(f, "Delegate({})", plugin.name()),
        }
    }
}

/// The structured result of every plugin invocation.
///
/// Expected domain failures (missing content file, malformed sub-command)
/// are rendered as explanatory `output` text in an otherwise normal
/// response; plugins do not raise errors for them.
#[derive(Debug, Clone)]
pub struct Response {
    /// Text sent to the client verbatim.
    pub output: String,

    /// Whether the prompt is redrawn after the output.
    pub prompt: bool,

    /// Modal context transition applied by the dispatcher.
    pub context: ContextSwitch,

    /// Replacement prompt string, if the session prompt changes.
    pub new_prompt: Option<String>,

    /// A command line to re-dispatch immediately (history replay).
    pub issue_command: Option<String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            output: String::new(),
            prompt: true,
            context: ContextSwitch::Clear,
            new_prompt: None,
            issue_command: None,
        }
    }
}

impl Response {
    /// A response with output text and a prompt redraw.
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            output: text.into(),
            ..Self::default()
        }
    }

    /// An empty response that neither prints nor redraws the prompt.
    pub fn silent() -> Self {
        Self {
            prompt: false,
            ..Self::default()
        }
    }
}

/// Session facts handed to every plugin at construction.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Hostname the session impersonates.
    pub hostname: String,
    /// Authenticated username.
    pub username: String,
    /// Root of the device/commands content tree.
    pub directory: PathBuf,
    /// Read handle on the session history.
    pub history: SharedHistory,
    /// Read handle on the registered literal command keys.
    pub command_index: SharedCommandIndex,
}

/// The capability contract every command module implements.
///
/// `commands` and `keystrokes` are queried once at session setup;
/// `execute_command` may be long-running and have side effects (content
/// files, external jobs) and suspends the session flow only at its own
/// await point.
#[async_trait]
pub trait CommandPlugin: Send + Sync {
    /// Catalogue name of the plugin, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Command keys this plugin answers to.
    fn commands(&self) -> Vec<CommandKey>;

    /// Raw input bytes this plugin intercepts before line completion.
    fn keystrokes(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Executes a completed line already matched against this plugin's
    /// keys (or owned by its active modal context).
    async fn execute_command(&self, line: &str) -> Response;

    /// Handles one intercepted keystroke.
    ///
    /// `line_buffer` is the in-progress line. The plugin only signals
    /// intent through the response; the assembler performs any buffer
    /// truncation itself.
    async fn execute_keystroke(&self, _byte: u8, _line_buffer: &str) -> Response {
        Response::silent()
    }
}

/// Identifier of a plugin in the compile-time catalogue.
///
/// The configuration's ordered plugin list uses these ids; order is
/// registration order and therefore pattern-match priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum PluginId {
    /// Configure-mode modal context.
    #[serde(rename = "confmode")]
    ConfMode,
    /// Canned per-hostname command content.
    #[serde(rename = "showfs")]
    ShowFs,
    /// `help` command and `?` keystroke.
    #[serde(rename = "help")]
    Help,
    /// History listing and `!<n>` replay.
    #[serde(rename = "history")]
    History,
    /// Destructive-backspace keystroke handling.
    #[serde(rename = "navigation")]
    Navigation,
    /// External automation job runner.
    #[serde(rename = "cmdrunner")]
    CmdRunner,
}

impl PluginId {
    /// The configuration-facing name of this id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfMode => "confmode",
            Self::ShowFs => "showfs",
            Self::Help => "help",
            Self::History => "history",
            Self::Navigation => "navigation",
            Self::CmdRunner => "cmdrunner",
        }
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginId {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "confmode" => Ok(Self::ConfMode),
            "showfs" => Ok(Self::ShowFs),
            "help" => Ok(Self::Help),
            "history" => Ok(Self::History),
            "navigation" => Ok(Self::Navigation),
            "cmdrunner" => Ok(Self::CmdRunner),
            other => Err(ServerError::UnknownPlugin(other.to_string())),
        }
    }
}

/// Builds one catalogue plugin for a session.
///
/// Construction is infallible: a plugin whose backing content is missing
/// (for example an absent hostname directory) degrades to an empty
/// command set and logs a warning instead of failing the session.
pub async fn build_plugin(id: PluginId, ctx: &PluginContext) -> Arc<dyn CommandPlugin> {
    match id {
        PluginId::ConfMode => Arc::new(Configure::new(ctx)),
        PluginId::ShowFs => Arc::new(ShowFileServer::new(ctx).await),
        PluginId::Help => Arc::new(Help::new(ctx)),
        PluginId::History => Arc::new(History::new(ctx)),
        PluginId::Navigation => Arc::new(Navigation::new()),
        PluginId::CmdRunner => Arc::new(CommandRunner::new(ctx)),
    }
}

#[cfg(test)]
pub(crate) fn test_context(directory: PathBuf) -> PluginContext {
    PluginContext {
        hostname: "router1".to_string(),
        username: "admin".to_string(),
        directory,
        history: SharedHistory::default(),
        command_index: SharedCommandIndex::default(),
    }
}
