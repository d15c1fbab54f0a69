//! The `help` command and inline `?` help keystroke.

use std::sync::PoisonError;

use async_trait::async_trait;

use super::{CommandKey, CommandPlugin, PluginContext, Response, SharedCommandIndex};

/// Answers `help` and the `?` keystroke with a command listing.
pub struct Help {
    command_index: SharedCommandIndex,
}

impl Help {
    pub fn new(ctx: &PluginContext) -> Self {
        Self {
            command_index: ctx.command_index.clone(),
        }
    }

    /// Renders the banner plus the sorted literal command listing.
    ///
    /// Pattern keys are not listed; neither is `help` itself.
    fn render(&self) -> String {
        let mut output = String::from("\r\n\r\nGENERAL COMMANDS");
        output.push_str(&format!("\r\n{:<20}{:<50}", "exit", "Exit the session"));
        output.push_str(&format!("\r\n{:<20}{:<50}", "help", "Get help"));
        output.push_str(&format!("\r\n{:<20}{:<50}", "!x", "Run cmd from history"));
        output.push_str("\r\n\r\nOTHER AVAILABLE COMMANDS");
        let index = self
            .command_index
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for command in index.iter().filter(|command| command.as_str() != "help") {
            output.push_str("\r\n");
            output.push_str(command);
        }
        output.push_str("\r\n");
        output
    }
}

#[async_trait]
impl CommandPlugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn commands(&self) -> Vec<CommandKey> {
        vec![CommandKey::Exact("help".to_string())]
    }

    fn keystrokes(&self) -> Vec<u8> {
        vec![b'?']
    }

    async fn execute_command(&self, _line: &str) -> Response {
        Response::output(self.render())
    }

    async fn execute_keystroke(&self, _byte: u8, _line_buffer: &str) -> Response {
        Response::output(self.render())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::super::test_context;
    use super::*;

    fn help_with_index(commands: &[&str]) -> Help {
        let ctx = test_context(PathBuf::from("."));
        {
            let mut index = ctx.command_index.write().expect("index lock");
            *index = commands.iter().map(|s| s.to_string()).collect();
        }
        Help::new(&ctx)
    }

    #[tokio::test]
    async fn help_lists_other_literal_commands_in_sorted_order() {
        let plugin = help_with_index(&["help", "show version", "show run"]);
        let response = plugin.execute_command("help").await;

        assert!(response.output.starts_with("\r\n\r\nGENERAL COMMANDS"));
        assert!(response.output.contains("OTHER AVAILABLE COMMANDS"));
        assert!(response.output.contains("show run"));
        assert!(response.output.contains("show version"));
        assert!(response.prompt);

        let listing_start = response
            .output
            .find("OTHER AVAILABLE COMMANDS")
            .expect("listing section");
        let listing = &response.output[listing_start..];
        assert!(
            !listing.contains("\r\nhelp\r\n"),
            "help should not list itself"
        );
    }

    #[tokio::test]
    async fn question_mark_keystroke_renders_the_same_listing() {
        let plugin = help_with_index(&["show version"]);
        let from_command = plugin.execute_command("help").await;
        let from_keystroke = plugin.execute_keystroke(b'?', "sh").await;
        assert_eq!(from_command.output, from_keystroke.output);
        assert!(from_keystroke.prompt);
    }
}
