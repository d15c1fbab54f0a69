//! Per-connection session engine.
//!
//! One session exists per authenticated SSH channel. The driver pulls raw
//! bytes from the transport, the assembler turns them into completed
//! lines, and the dispatcher routes each line to a command plugin and
//! applies the resulting response envelope.
//!
//! # Main Components
//!
//! - [`SessionDriver`] - outer loop binding transport I/O to the engine
//! - [`LineAssembler`] - byte-at-a-time line assembly with intercepts
//! - [`Dispatcher`] - the `Normal`/`InContext` dispatch state machine
//! - [`CommandRegistry`] - exact/pattern/keystroke lookup tables
//! - [`Principal`] - the authenticated identity a session impersonates

mod assembler;
mod dispatcher;
mod driver;
mod registry;

pub use assembler::{InputEvent, LineAssembler};
pub use dispatcher::{DispatchState, Dispatcher};
pub use driver::{SessionDriver, Transport};
pub use registry::CommandRegistry;

/// Hostname emulated when the login does not carry one.
pub const DEFAULT_HOSTNAME: &str = "router";

/// The authenticated identity behind a session.
///
/// The SSH username doubles as the transport for the target hostname:
/// `admin::core-sw1` authenticates as `admin` and impersonates
/// `core-sw1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Authenticated username.
    pub username: String,
    /// Hostname the session impersonates.
    pub hostname: String,
}

impl Principal {
    /// Splits a login name of the form `username::hostname`.
    ///
    /// A bare username (no `::`) falls back to [`DEFAULT_HOSTNAME`].
    pub fn from_login(login: &str) -> Self {
        match login.split_once("::") {
            Some((username, hostname)) if !hostname.is_empty() => Self {
                username: username.to_string(),
                hostname: hostname.to_string(),
            },
            _ => Self {
                username: login.to_string(),
                hostname: DEFAULT_HOSTNAME.to_string(),
            },
        }
    }
}

/// Aggregated effect of dispatching one completed line or keystroke.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Accumulated output text to send to the client.
    pub output: String,
    /// Whether the prompt is redrawn after the output.
    pub redraw_prompt: bool,
    /// Whether the session terminates.
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_with_hostname_is_split() {
        let principal = Principal::from_login("admin::core-sw1");
        assert_eq!(principal.username, "admin");
        assert_eq!(principal.hostname, "core-sw1");
    }

    #[test]
    fn bare_login_falls_back_to_the_default_hostname() {
        let principal = Principal::from_login("admin");
        assert_eq!(principal.username, "admin");
        assert_eq!(principal.hostname, DEFAULT_HOSTNAME);
    }

    #[test]
    fn empty_hostname_part_also_falls_back() {
        let principal = Principal::from_login("admin::");
        assert_eq!(principal.hostname, DEFAULT_HOSTNAME);
    }
}
