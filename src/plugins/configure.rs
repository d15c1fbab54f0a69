//! The configure-mode modal context.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use super::{CommandKey, CommandPlugin, ContextSwitch, PluginContext, Response};

static CONF: Lazy<Regex> = Lazy::new(|| match Regex::new(r"^conf.*") {
    Ok(re) => re,
    Err(err) => panic!("invalid CONF regex: {err}"),
});

/// Owns the session's input while configure mode is active.
///
/// Any line starting with `conf` enters the context; `exit` or `end`
/// inside it returns the session to normal dispatch. Configuration lines
/// themselves are accepted and logged but not interpreted.
pub struct Configure {
    hostname: String,
    in_context: Mutex<bool>,
}

impl Configure {
    pub fn new(ctx: &PluginContext) -> Self {
        Self {
            hostname: ctx.hostname.clone(),
            in_context: Mutex::new(false),
        }
    }

    fn configure_prompt(&self) -> String {
        format!("{}(configure)#", self.hostname)
    }
}

#[async_trait]
impl CommandPlugin for Configure {
    fn name(&self) -> &'static str {
        "confmode"
    }

    fn commands(&self) -> Vec<CommandKey> {
        vec![CommandKey::Pattern(CONF.clone())]
    }

    async fn execute_command(&self, line: &str) -> Response {
        let mut in_context = self
            .in_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*in_context {
            info!(
                "{}: User entered configure mode with '{}'",
                self.hostname, line
            );
            *in_context = true;
        } else if line == "exit" || line == "end" {
            info!("{}: User exited configure mode", self.hostname);
            *in_context = false;
            return Response {
                context: ContextSwitch::Clear,
                new_prompt: Some(format!("{}#", self.hostname)),
                ..Response::default()
            };
        } else {
            info!("{}: {}", self.hostname, line);
        }

        Response {
            context: ContextSwitch::Retain,
            new_prompt: Some(self.configure_prompt()),
            ..Response::default()
        }
    }
}
