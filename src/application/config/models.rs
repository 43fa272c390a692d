use crate::common::constants::{DEFAULT_LOG_LEVEL, DEFAULT_MAX_FDS, DEFAULT_POLL_TIMEOUT_MS};
use crate::common::error::{EventError, Result};
use crate::core::event::poller::BackendPreference;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Event list configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventConfig {
    /// Highest descriptor number + 1 the event list accepts
    #[serde(default = "default_max_fds")]
    pub max_fds: usize,

    /// `auto` or a named event handler, e.g. `linux-sysepoll`
    #[serde(default)]
    pub backend: BackendPreference,

    /// Wait bound per main-loop iteration; negative blocks
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: i32,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_fds() -> usize {
    DEFAULT_MAX_FDS
}

fn default_poll_timeout() -> i32 {
    DEFAULT_POLL_TIMEOUT_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl EventConfig {
    pub fn log_level_filter(&self) -> Result<LevelFilter> {
        self.log_level.parse::<LevelFilter>().map_err(|_| {
            EventError::Config(format!("Invalid log_level '{}'", self.log_level))
        })
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            max_fds: default_max_fds(),
            backend: BackendPreference::default(),
            poll_timeout_ms: default_poll_timeout(),
            log_level: default_log_level(),
        }
    }
}
