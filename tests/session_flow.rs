//! End-to-end session scenarios over an in-memory transport.
//!
//! Each test scripts the raw keystrokes a client would send, runs the
//! full driver loop (echo, assembly, dispatch, prompts), and asserts on
//! the byte stream the client would see.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rnetsim::config::ServerConfig;
use rnetsim::error::ServerError;
use rnetsim::plugins::PluginId;
use rnetsim::session::{Dispatcher, Principal, SessionDriver, Transport};

/// Feeds a scripted byte sequence and records everything sent back.
struct ScriptedTransport {
    incoming: VecDeque<u8>,
    outgoing: Arc<Mutex<Vec<u8>>>,
    closed: Arc<Mutex<bool>>,
}

impl ScriptedTransport {
    fn new(script: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>, Arc<Mutex<bool>>) {
        let outgoing = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let transport = Self {
            incoming: script.iter().copied().collect(),
            outgoing: outgoing.clone(),
            closed: closed.clone(),
        };
        (transport, outgoing, closed)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ServerError> {
        self.outgoing.lock().expect("outgoing lock").extend(bytes);
        Ok(())
    }

    async fn recv(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }

    async fn close(&mut self) {
        *self.closed.lock().expect("closed lock") = true;
    }
}

fn test_config(directory: &Path) -> ServerConfig {
    ServerConfig {
        host_key_path: PathBuf::from("/unused/host_key"),
        base_port: 2200,
        server_count: 1,
        directory: directory.to_path_buf(),
        username: None,
        password: None,
        plugins: vec![
            PluginId::ConfMode,
            PluginId::ShowFs,
            PluginId::Help,
            PluginId::History,
            PluginId::Navigation,
        ],
    }
}

async fn seed_content(directory: &Path, hostname: &str, command: &str, body: &str) {
    let host_dir = directory.join(hostname);
    tokio::fs::create_dir_all(&host_dir).await.expect("mkdir");
    tokio::fs::write(host_dir.join(format!("{command}.txt")), body)
        .await
        .expect("seed content");
}

/// Runs one scripted session and returns what the client saw plus the
/// close flag.
async fn run_session(directory: &Path, script: &[u8]) -> (String, bool) {
    let config = test_config(directory);
    let principal = Principal::from_login("admin::router1");
    let dispatcher = Dispatcher::build(&config, &principal).await;

    let (transport, outgoing, closed) = ScriptedTransport::new(script);
    SessionDriver::new(transport, dispatcher)
        .run()
        .await
        .expect("session run");

    let output = String::from_utf8_lossy(&outgoing.lock().expect("outgoing lock")).into_owned();
    let was_closed = *closed.lock().expect("closed lock");
    (output, was_closed)
}

#[tokio::test]
async fn session_opens_with_the_hostname_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (output, _) = run_session(dir.path(), b"").await;
    assert!(output.starts_with("\r\nrouter1#"));
}

#[tokio::test]
async fn help_round_trip_lists_other_commands_and_redraws_the_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_content(dir.path(), "router1", "show version", "IOS 15.2").await;

    let (output, _) = run_session(dir.path(), b"help\r").await;
    assert!(output.contains("GENERAL COMMANDS"));
    assert!(output.contains("OTHER AVAILABLE COMMANDS"));
    assert!(output.contains("history"));
    assert!(output.contains("show version"));
    // The banner comes before the final prompt redraw.
    let banner = output.find("GENERAL COMMANDS").expect("banner");
    let last_prompt = output.rfind("router1#").expect("prompt");
    assert!(banner < last_prompt);
}

#[tokio::test]
async fn canned_content_is_served_for_the_emulated_hostname() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_content(dir.path(), "router1", "show version", "IOS 15.2\nuptime 1 day").await;

    let (output, _) = run_session(dir.path(), b"show version\r").await;
    assert!(output.contains("\r\nIOS 15.2\r\nuptime 1 day\r\n"));
}

#[tokio::test]
async fn configure_mode_switches_the_prompt_and_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (output, _) = run_session(dir.path(), b"configure terminal\rexit\r").await;

    let configure_prompt = output
        .find("router1(configure)#")
        .expect("configure prompt shown");
    let restored_prompt = output.rfind("\r\nrouter1#").expect("restored prompt");
    assert!(configure_prompt < restored_prompt);
}

#[tokio::test]
async fn while_in_context_even_registered_commands_go_to_the_context() {
    let dir = tempfile::tempdir().expect("tempdir");
    // "help" inside configure mode must not render the help banner.
    let (output, _) = run_session(dir.path(), b"configure terminal\rhelp\rend\r").await;
    assert!(!output.contains("GENERAL COMMANDS"));
    assert!(output.contains("router1(configure)#"));
}

#[tokio::test]
async fn unmatched_input_only_redraws_the_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (output, _) = run_session(dir.path(), b"frobnicate\r").await;

    // Echo of the line, then a fresh prompt; no notice text in between.
    assert!(output.contains("frobnicate"));
    assert!(output.ends_with("\r\nrouter1#"));
    assert!(!output.contains("No match"));
}

#[tokio::test]
async fn history_replay_reissues_the_referenced_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_content(dir.path(), "router1", "show version", "IOS 15.2").await;
    seed_content(dir.path(), "router1", "show inventory", "Chassis: C9300").await;

    // History: 0 = "show version", 1 = "show inventory"; !1 replays the
    // inventory command.
    let script = b"show version\rshow inventory\r!1\r";
    let (output, _) = run_session(dir.path(), script).await;

    let occurrences = output.matches("Chassis: C9300").count();
    assert_eq!(occurrences, 2, "replay should serve the content again");
}

#[tokio::test]
async fn history_listing_is_zero_indexed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (output, _) = run_session(dir.path(), b"alpha\rbravo\rhistory\r").await;
    assert!(output.contains(" 0  alpha"));
    assert!(output.contains(" 1  bravo"));
    assert!(output.contains(" 2  history"));
}

#[tokio::test]
async fn exit_at_top_level_closes_the_transport() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, closed) = run_session(dir.path(), b"exit\r").await;
    assert!(closed);
}

#[tokio::test]
async fn exit_inside_configure_mode_does_not_close_the_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, closed) = run_session(dir.path(), b"configure terminal\rexit\r").await;
    assert!(!closed);
}

#[tokio::test]
async fn backspace_erases_the_previous_keystroke() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_content(dir.path(), "router1", "show version", "IOS 15.2").await;

    // Type "show versionx", erase the trailing x, complete the line.
    let script = b"show versionx\x7f\r";
    let (output, _) = run_session(dir.path(), script).await;
    assert!(output.contains("\r\nIOS 15.2\r\n"));
    // The erase echo rubs out the stray character.
    assert!(output.contains("\u{8} \u{8}"));
}

#[tokio::test]
async fn question_mark_renders_help_without_losing_the_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_content(dir.path(), "router1", "show version", "IOS 15.2").await;

    let (output, _) = run_session(dir.path(), b"sh?\r").await;
    assert!(output.contains("GENERAL COMMANDS"));
}
