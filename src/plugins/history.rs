//! History listing and `!<n>` replay.

use std::sync::PoisonError;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::{CommandKey, CommandPlugin, PluginContext, Response, SharedHistory};

/// Matches a history replay reference like `!3`.
static REPLAY: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^!(?P<index>\d+)$") {
    Ok(re) => re,
    Err(err) => panic!("invalid REPLAY regex: {err}"),
});

/// Answers `history` with an indexed listing and `!<n>` by re-issuing the
/// referenced entry through the response envelope.
pub struct History {
    hostname: String,
    history: SharedHistory,
}

impl History {
    pub fn new(ctx: &PluginContext) -> Self {
        Self {
            hostname: ctx.hostname.clone(),
            history: ctx.history.clone(),
        }
    }

    fn render_listing(&self) -> String {
        let entries = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let width = entries.len().to_string().len() + 1;
        let mut output = String::new();
        for (idx, command) in entries.iter().enumerate() {
            output.push_str(&format!("\r\n{idx:>width$}  {command}"));
        }
        output.push_str("\r\n");
        output
    }

    fn replay(&self, index: usize) -> Response {
        let entries = self.history.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(index) {
            // Replaying another replay reference would chain re-dispatches;
            // refuse it instead of tripping the dispatcher's loop guard.
            Some(entry) if REPLAY.is_match(entry) => Response::output(format!(
                "\r\n% History entry {index} is itself a replay\r\n"
            )),
            Some(entry) => Response {
                issue_command: Some(entry.clone()),
                ..Response::default()
            },
            None => Response::output(format!("\r\n% No history entry {index}\r\n")),
        }
    }
}

#[async_trait]
impl CommandPlugin for History {
    fn name(&self) -> &'static str {
        "history"
    }

    fn commands(&self) -> Vec<CommandKey> {
        vec![
            CommandKey::Exact("history".to_string()),
            CommandKey::Pattern(REPLAY.clone()),
        ]
    }

    async fn execute_command(&self, line: &str) -> Response {
        info!("{}: {}", self.hostname, line);
        if line == "history" {
            return Response::output(self.render_listing());
        }
        if let Some(caps) = REPLAY.captures(line) {
            // Digits only, so parse fails solely on overflow; treat that
            // as out of range.
            return match caps["index"].parse::<usize>() {
                Ok(index) => self.replay(index),
                Err(_) => Response::output("\r\n% No such history entry\r\n"),
            };
        }
        Response::default()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::PoisonError;

    use super::super::test_context;
    use super::*;

    fn history_with_entries(entries: &[&str]) -> History {
        let ctx = test_context(PathBuf::from("."));
        {
            let mut history = ctx
                .history
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *history = entries.iter().map(|s| s.to_string()).collect();
        }
        History::new(&ctx)
    }

    #[tokio::test]
    async fn listing_is_zero_indexed_and_right_justified() {
        let plugin = history_with_entries(&["show version", "configure terminal"]);
        let response = plugin.execute_command("history").await;
        assert!(response.output.contains(" 0  show version"));
        assert!(response.output.contains(" 1  configure terminal"));
        assert!(response.prompt);
    }

    #[tokio::test]
    async fn replay_reference_issues_the_stored_entry() {
        let plugin = history_with_entries(&["show version", "show run", "!1"]);
        let response = plugin.execute_command("!1").await;
        assert_eq!(response.issue_command.as_deref(), Some("show run"));
        assert!(response.output.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_replay_is_a_domain_failure() {
        let plugin = history_with_entries(&["show version"]);
        let response = plugin.execute_command("!7").await;
        assert!(response.output.contains("No history entry 7"));
        assert!(response.issue_command.is_none());
    }

    #[tokio::test]
    async fn replay_of_a_replay_is_refused() {
        let plugin = history_with_entries(&["!0", "show run"]);
        let response = plugin.execute_command("!0").await;
        assert!(response.output.contains("itself a replay"));
        assert!(response.issue_command.is_none());
    }
}
