pub mod fd;

pub use fd::{set_fd_flags, FileDescr, NetworkStatus};
