pub const DEFAULT_MAX_FDS: usize = 4096;
pub const DEFAULT_POLL_TIMEOUT_MS: i32 = 1000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Growth step of the poll backend's pollfd array.
pub const POLL_GROW_STEP: usize = 16;

/// Width of a `fd_set`; select cannot watch descriptors at or above this.
pub const FD_SETSIZE: usize = libc::FD_SETSIZE as usize;

/// Upper bound accepted for `max_fds` in configuration.
pub const MAX_FDS_CEILING: usize = 1 << 20;
