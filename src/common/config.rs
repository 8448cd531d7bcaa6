//! Runtime configuration loaded from the environment.

use std::env;

use crate::common::log::DEFAULT_MAX_LINE_LEN;

/// Snapshot of configuration values consumed by the session.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolboxCfg {
    /// Suppress start and exit banners regardless of the caller's flag.
    pub quiet: bool,
    /// Diagnostic line length limit, terminator included.
    pub max_line_len: usize,
}

impl Default for ToolboxCfg {
    fn default() -> Self {
        Self {
            quiet: false,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl ToolboxCfg {
    /// Create a configuration snapshot from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let quiet = lookup("BFT_QUIET")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.quiet);
        let max_line_len = lookup("BFT_MSG_MAX_LEN")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|len| *len >= 2)
            .unwrap_or(defaults.max_line_len);

        Self {
            quiet,
            max_line_len,
        }
    }
}
