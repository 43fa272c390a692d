//! Readiness notification for single-threaded servers: register descriptors,
//! set the events to watch, poll, and walk what became ready, over whichever
//! of select, poll, epoll, kqueue, /dev/poll, event ports or an embedded
//! reactor the platform offers.

#[cfg(not(unix))]
compile_error!("fdevent supports unix targets only");

pub mod application;
pub mod common;
pub mod core;

pub use crate::common::error::{EventError, Result};
pub use crate::core::event::{
    BackendKind, BackendPreference, Cursor, EventList, Events, HandlerStatus, Trigger,
};
