//! Session-scoped command and keystroke lookup.
//!
//! Built once per session after authentication, from the configured
//! plugin list in configuration order. Later registrations shadow earlier
//! ones for the same literal key or keystroke (a configuration smell,
//! logged as a warning, not a runtime fault). Pattern keys keep their
//! registration order, which is also their match priority.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use regex::Regex;
use tracing::{info, warn};

use crate::plugins::{CommandKey, CommandPlugin, SharedCommandIndex};

/// Lookup tables from command keys and keystrokes to plugin instances.
pub struct CommandRegistry {
    exact: HashMap<String, Arc<dyn CommandPlugin>>,
    patterns: Vec<(Regex, Arc<dyn CommandPlugin>)>,
    keystrokes: HashMap<u8, Arc<dyn CommandPlugin>>,
}

impl CommandRegistry {
    /// Builds the registry and publishes the sorted literal key index.
    ///
    /// `plugins` must be in configuration order; that order fixes both
    /// shadowing (last write wins) and pattern priority (first registered
    /// wins).
    pub fn build(plugins: &[Arc<dyn CommandPlugin>], index: &SharedCommandIndex) -> Self {
        let mut exact: HashMap<String, Arc<dyn CommandPlugin>> = HashMap::new();
        let mut patterns: Vec<(Regex, Arc<dyn CommandPlugin>)> = Vec::new();
        let mut keystrokes: HashMap<u8, Arc<dyn CommandPlugin>> = HashMap::new();

        for plugin in plugins {
            for key in plugin.commands() {
                match key {
                    CommandKey::Exact(command) => {
                        if exact.insert(command.clone(), plugin.clone()).is_some() {
                            warn!(
                                "command '{}' re-registered by plugin '{}', earlier handler shadowed",
                                command,
                                plugin.name()
                            );
                        }
                    }
                    CommandKey::Pattern(pattern) => {
                        patterns.push((pattern, plugin.clone()));
                    }
                }
            }
            for keystroke in plugin.keystrokes() {
                if keystrokes.insert(keystroke, plugin.clone()).is_some() {
                    warn!(
                        "keystroke {:#04x} re-registered by plugin '{}', earlier handler shadowed",
                        keystroke,
                        plugin.name()
                    );
                }
            }
            info!("Enabled plugin: {}", plugin.name());
        }

        let mut literals: Vec<String> = exact.keys().cloned().collect();
        literals.sort();
        *index.write().unwrap_or_else(PoisonError::into_inner) = literals;

        Self {
            exact,
            patterns,
            keystrokes,
        }
    }

    /// Resolves a completed line: exact match first, then the first
    /// matching pattern in registration order.
    pub fn resolve(&self, line: &str) -> Option<Arc<dyn CommandPlugin>> {
        if let Some(plugin) = self.exact.get(line) {
            return Some(plugin.clone());
        }
        self.patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(line))
            .map(|(_, plugin)| plugin.clone())
    }

    /// The plugin intercepting a raw keystroke, if any.
    pub fn keystroke_handler(&self, byte: u8) -> Option<Arc<dyn CommandPlugin>> {
        self.keystrokes.get(&byte).cloned()
    }

    /// All intercepted keystroke bytes, for assembler setup.
    pub fn keystroke_intercepts(&self) -> HashSet<u8> {
        self.keystrokes.keys().copied().collect()
    }
}
