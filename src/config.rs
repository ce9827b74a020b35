// Runtime settings. There is no config file: everything comes from the
// environment with sensible defaults, read once when the program starts.

use std::time::Duration;

use tracing::warn;

pub const ENV_TOOL: &str = "AMPY_MANAGER_TOOL";
pub const ENV_REMOTE_ROOT: &str = "AMPY_MANAGER_REMOTE_ROOT";
pub const ENV_SCAN_DELAY_MS: &str = "AMPY_MANAGER_SCAN_DELAY_MS";
pub const ENV_RESERVED_PORT: &str = "AMPY_MANAGER_RESERVED_PORT";
pub const ENV_NO_CLEAR: &str = "AMPY_MANAGER_NO_CLEAR";

const DEFAULT_TOOL: &str = "ampy";
const DEFAULT_REMOTE_ROOT: &str = "/";
const DEFAULT_SCAN_DELAY_MS: u64 = 1000;

/// Port that is always present on the host and never a microcontroller.
#[cfg(windows)]
pub const DEFAULT_RESERVED_PORT: &str = "1";
#[cfg(not(windows))]
pub const DEFAULT_RESERVED_PORT: &str = "ttyS0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Program name or path of the device tool.
    pub tool: String,
    /// Remote directory that directory uploads land in.
    pub remote_root: String,
    /// Wait between two port scans that found nothing.
    pub scan_delay: Duration,
    /// Port token excluded from discovery, if any.
    pub reserved_port: Option<String>,
    pub clear_screen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.into(),
            remote_root: DEFAULT_REMOTE_ROOT.into(),
            scan_delay: Duration::from_millis(DEFAULT_SCAN_DELAY_MS),
            reserved_port: Some(DEFAULT_RESERVED_PORT.into()),
            clear_screen: true,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unset keys keep their
    /// default; a malformed delay is ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(tool) = lookup(ENV_TOOL).filter(|t| !t.trim().is_empty()) {
            settings.tool = tool.trim().to_string();
        }

        if let Some(root) = lookup(ENV_REMOTE_ROOT).filter(|r| !r.trim().is_empty()) {
            settings.remote_root = root.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_SCAN_DELAY_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => settings.scan_delay = Duration::from_millis(ms),
                Err(_) => warn!(
                    value = %raw,
                    "ignoring {ENV_SCAN_DELAY_MS}, expected milliseconds"
                ),
            }
        }

        if let Some(reserved) = lookup(ENV_RESERVED_PORT) {
            let reserved = reserved.trim();
            settings.reserved_port = if reserved.is_empty() {
                None
            } else {
                Some(reserved.to_string())
            };
        }

        if lookup(ENV_NO_CLEAR).is_some() {
            settings.clear_screen = false;
        }

        settings
    }
}
