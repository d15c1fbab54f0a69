//! Modal context that drives an external automation job.
//!
//! Inside the `cmdrunner` context the operator accumulates job metadata
//! with `set <key>=<value>` and launches a collection run with `run`. The
//! job is handed to an external runner program as a JSON [`JobSpec`] on
//! stdin; the runner reports one JSON event per line on stdout while it
//! works through the command list, and successful command output is
//! written back into the content tree so subsequent sessions can serve it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use super::{CommandKey, CommandPlugin, ContextSwitch, PluginContext, Response};
use crate::error::ServerError;

const CHECK: char = '\u{2714}';
const XMARK: char = '\u{2716}';

/// Runner program used when the operator does not `set runner=...`.
const DEFAULT_RUNNER: &str = "netrun";

static SET_META: Lazy<Regex> =
    Lazy::new(|| match Regex::new(r"^set (?P<meta>[^=]+)=(?P<value>.*)$") {
        Ok(re) => re,
        Err(err) => panic!("invalid SET_META regex: {err}"),
    });

/// Connection variables handed to the runner for every target host.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InventoryVars {
    pub username: String,
    pub password: String,
    pub become_password: String,
    pub become_enabled: bool,
    pub connection: String,
    pub network_os: String,
}

/// The job specification serialized to the runner's stdin.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    pub hosts: Vec<String>,
    pub commands: Vec<String>,
    pub inventory: InventoryVars,
}

/// One progress event emitted by the runner, one JSON object per line.
#[derive(Debug, Deserialize)]
struct RunnerEvent {
    host: String,
    command: String,
    status: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    message: String,
}

#[derive(Default)]
struct RunnerState {
    in_context: bool,
    meta: HashMap<String, String>,
}

/// The `cmdrunner` modal context.
pub struct CommandRunner {
    hostname: String,
    username: String,
    directory: PathBuf,
    state: Mutex<RunnerState>,
}

impl CommandRunner {
    pub fn new(ctx: &PluginContext) -> Self {
        Self {
            hostname: ctx.hostname.clone(),
            username: ctx.username.clone(),
            directory: ctx.directory.clone(),
            state: Mutex::new(RunnerState::default()),
        }
    }

    fn context_response(&self) -> Response {
        Response {
            context: ContextSwitch::Retain,
            new_prompt: Some("cmdrunner>".to_string()),
            ..Response::default()
        }
    }

    /// Default collection commands per network OS.
    fn default_commands(os: &str) -> Vec<String> {
        let commands: &[&str] = match os {
            "ios" => &["show running-config"],
            "nxos" => &[
                "show privilege",
                "show inventory",
                "show version",
                "show running-config",
            ],
            "eos" => &[
                "show version | json",
                "show hostname | json",
                "show running-config",
            ],
            "vyos" => &["show config", "show configuration commands"],
            _ => &[],
        };
        commands.iter().map(|s| s.to_string()).collect()
    }

    fn job_spec(&self, meta: &HashMap<String, String>, os: &str, password: &str) -> JobSpec {
        let hosts = match meta.get("hosts") {
            Some(hosts) => hosts.split(',').map(|h| h.trim().to_string()).collect(),
            None => vec![self.hostname.clone()],
        };
        let commands = match meta.get("commands") {
            Some(commands) => commands.split(',').map(|c| c.trim().to_string()).collect(),
            None => Self::default_commands(os),
        };
        let username = meta
            .get("username")
            .cloned()
            .unwrap_or_else(|| self.username.clone());
        let become_password = meta
            .get("become_pass")
            .cloned()
            .unwrap_or_else(|| password.to_string());
        JobSpec {
            hosts,
            commands,
            inventory: InventoryVars {
                username,
                password: password.to_string(),
                become_password,
                become_enabled: !meta.contains_key("become"),
                connection: "network_cli".to_string(),
                network_os: os.to_string(),
            },
        }
    }

    /// Spawns the runner, feeds it the job, and collects its events.
    async fn spawn_runner(
        &self,
        runner: &str,
        job: &JobSpec,
    ) -> Result<Vec<RunnerEvent>, ServerError> {
        let mut child = Command::new(runner)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let payload = serde_json::to_vec(job)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            // Dropping stdin closes the pipe so the runner sees EOF.
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServerError::JobFailed("runner stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunnerEvent>(&line) {
                Ok(event) => events.push(event),
                Err(err) => warn!("{}: discarding runner event '{}': {}", self.hostname, line, err),
            }
        }

        let exit = child.wait().await?;
        if !exit.success() {
            return Err(ServerError::JobFailed(format!(
                "runner '{runner}' exited with {exit}"
            )));
        }
        Ok(events)
    }

    async fn write_result(&self, event: &RunnerEvent) -> Result<PathBuf, std::io::Error> {
        let host_dir = self.directory.join(&event.host);
        tokio::fs::create_dir_all(&host_dir).await?;
        let path = host_dir.join(format!("{}.txt", event.command));
        tokio::fs::write(&path, &event.stdout).await?;
        Ok(path)
    }

    /// Runs the job described by `meta` and renders the progress report.
    ///
    /// All failures are rendered as output text; the session stays in the
    /// cmdrunner context either way.
    async fn run_job(&self, meta: &HashMap<String, String>) -> String {
        let mut status = String::new();
        if !meta.contains_key("password") {
            status.push_str("\r\nPassword must be set 'set password=xxxx'");
        }
        if !meta.contains_key("os") {
            status.push_str(
                "\r\nThe OS must be set to a valid network os 'set os=nxos'",
            );
        }
        let (Some(os), Some(password)) = (meta.get("os"), meta.get("password")) else {
            status.push_str("\r\n");
            return status;
        };

        let job = self.job_spec(meta, os, password);
        let runner = meta
            .get("runner")
            .map(String::as_str)
            .unwrap_or(DEFAULT_RUNNER);
        status.push_str("\r\nRunning...");

        match self.spawn_runner(runner, &job).await {
            Ok(events) => {
                for event in &events {
                    match event.status.as_str() {
                        "ok" => {
                            status.push_str(&format!(
                                "\r\n[{CHECK}] [{}] ran '{}'",
                                event.host, event.command
                            ));
                            match self.write_result(event).await {
                                Ok(path) => status.push_str(&format!(
                                    "\r\n[{CHECK}] [{}] wrote '{}'",
                                    event.host,
                                    path.display()
                                )),
                                Err(err) => status.push_str(&format!(
                                    "\r\n[{XMARK}] [{}] could not write '{}': {}",
                                    event.host, event.command, err
                                )),
                            }
                        }
                        "failed" => status.push_str(&format!(
                            "\r\n[{XMARK}] [{}] error '{}' '{}'",
                            event.host, event.command, event.message
                        )),
                        other => status.push_str(&format!(
                            "\r\n[{XMARK}] [{}] '{}' reported '{other}'",
                            event.host, event.command
                        )),
                    }
                }
            }
            Err(err) => {
                status.push_str(&format!("\r\n[{XMARK}] {err}"));
            }
        }
        status.push_str("\r\n");
        status
    }
}

#[async_trait]
impl CommandPlugin for CommandRunner {
    fn name(&self) -> &'static str {
        "cmdrunner"
    }

    fn commands(&self) -> Vec<CommandKey> {
        vec![CommandKey::Exact("cmdrunner".to_string())]
    }

    async fn execute_command(&self, line: &str) -> Response {
        enum Action {
            Entered,
            Left,
            Set,
            Run(HashMap<String, String>),
            Other,
        }

        // Decide under the lock, run without it.
        let action = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.in_context {
                state.in_context = true;
                Action::Entered
            } else if line == "exit" || line == "end" {
                state.in_context = false;
                Action::Left
            } else if let Some(caps) = SET_META.captures(line) {
                state
                    .meta
                    .insert(caps["meta"].trim().to_string(), caps["value"].to_string());
                Action::Set
            } else if line.trim() == "run" {
                Action::Run(state.meta.clone())
            } else {
                Action::Other
            }
        };

        match action {
            Action::Entered => {
                info!("{}: User entered cmdrunner mode", self.hostname);
                self.context_response()
            }
            Action::Left => {
                info!("{}: User exited cmdrunner mode", self.hostname);
                Response {
                    context: ContextSwitch::Clear,
                    new_prompt: Some(format!("{}#", self.hostname)),
                    ..Response::default()
                }
            }
            Action::Set | Action::Other => self.context_response(),
            Action::Run(meta) => {
                info!("{}: Starting automation job", self.hostname);
                let output = self.run_job(&meta).await;
                Response {
                    output,
                    ..self.context_response()
                }
            }
        }
    }
}
