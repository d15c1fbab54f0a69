//! Keystroke plugin for destructive backspace.

use async_trait::async_trait;

use super::{CommandKey, CommandPlugin, Response};

/// DEL, as sent by remote terminals for backspace.
const ERASE: u8 = 0x7f;

/// Intercepts the erase keystroke and echoes a destructive backspace.
///
/// The assembler owns the line buffer and performs the actual truncation;
/// this plugin only produces the terminal echo sequence.
pub struct Navigation;

impl Navigation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Navigation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandPlugin for Navigation {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn commands(&self) -> Vec<CommandKey> {
        Vec::new()
    }

    fn keystrokes(&self) -> Vec<u8> {
        vec![ERASE]
    }

    async fn execute_command(&self, _line: &str) -> Response {
        Response::silent()
    }

    async fn execute_keystroke(&self, byte: u8, line_buffer: &str) -> Response {
        if byte == ERASE && !line_buffer.is_empty() {
            return Response {
                output: "\u{8} \u{8}".to_string(),
                prompt: false,
                ..Response::default()
            };
        }
        Response::silent()
    }
}
