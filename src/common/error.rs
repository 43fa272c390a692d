use std::io;
use std::os::unix::io::RawFd;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("fd {fd} is outside the event list capacity of {capacity}")]
    OutOfRange { fd: RawFd, capacity: usize },

    #[error("fd {0} is already registered")]
    AlreadyRegistered(RawFd),

    #[error("fd {0} is not registered")]
    NotRegistered(RawFd),

    #[error("fd {0} already has a live event trigger")]
    TriggerActive(RawFd),

    #[error("stale trigger {index} for fd {fd}")]
    StaleTrigger { fd: RawFd, index: usize },

    #[error("Event handler unavailable: {0}")]
    Unavailable(String),

    #[error("{backend}: {op} failed: {source}")]
    Backend {
        backend: &'static str,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Out of resources: {0}")]
    Exhausted(String),
}

impl EventError {
    /// Wraps `errno` of the syscall that just failed.
    pub fn last_os(backend: &'static str, op: &'static str) -> Self {
        EventError::Backend {
            backend,
            op,
            source: io::Error::last_os_error(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EventError>;
