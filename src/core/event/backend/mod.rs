//! Readiness-notification mechanisms. Each one is compiled only where the
//! target OS provides it and its cargo feature is enabled.

use crate::common::error::Result;
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use std::os::unix::io::RawFd;

#[cfg(all(feature = "select", unix))]
pub mod select;

#[cfg(all(feature = "poll", unix))]
pub mod poll;

#[cfg(all(feature = "epoll", any(target_os = "linux", target_os = "android")))]
pub mod epoll;

#[cfg(all(
    feature = "kqueue",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )
))]
pub mod kqueue;

#[cfg(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))]
pub mod devpoll;

#[cfg(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))]
pub mod port;

#[cfg(feature = "external")]
pub mod external;

/// Position in the ready set of the last `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Begin,
    At(usize),
    End,
}

impl Cursor {
    pub fn index(self) -> Option<usize> {
        match self {
            Cursor::At(index) => Some(index),
            _ => None,
        }
    }

    /// First slot to inspect for a linear scan, `None` once exhausted.
    pub(crate) fn scan_start(self) -> Option<usize> {
        match self {
            Cursor::Begin => Some(0),
            Cursor::At(index) => index.checked_add(1),
            Cursor::End => None,
        }
    }
}

/// Cursor step for backends whose results are packed at the front of a buffer.
pub(crate) fn dense_next(cursor: Cursor, ready: usize) -> Cursor {
    match cursor.scan_start() {
        Some(next) if next < ready => Cursor::At(next),
        _ => Cursor::End,
    }
}

/// Operations every mechanism provides.
///
/// `index` values are backend-private slot numbers; the event list wraps them
/// in a [`Trigger`](crate::core::event::event_list::Trigger) before handing
/// them out. `old` is the mask currently recorded for `fd`, needed by the
/// mechanisms that only accept incremental changes.
pub trait EventBackend {
    fn kind(&self) -> BackendKind;

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        old: Events,
        events: Events,
    ) -> Result<usize>;

    fn event_del(&mut self, index: usize, fd: RawFd, old: Events) -> Result<()>;

    /// Waits up to `timeout_ms` (negative blocks forever). An interrupted
    /// wait reports zero ready triggers.
    fn poll(&mut self, timeout_ms: i32) -> Result<usize>;

    fn next_ready(&self, cursor: Cursor) -> Cursor;

    fn ready_fd(&self, index: usize) -> Option<RawFd>;

    fn ready_revents(&self, index: usize) -> Events;

    /// Rebuilds kernel state that does not survive `fork`, re-arming `live`.
    fn reset(&mut self, _live: &[(RawFd, Events)]) -> Result<()> {
        Ok(())
    }
}

#[cfg(any(
    all(
        feature = "kqueue",
        any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )
    ),
    all(feature = "port", any(target_os = "solaris", target_os = "illumos"))
))]
pub(crate) fn timespec_from_ms(timeout_ms: i32) -> Option<libc::timespec> {
    if timeout_ms < 0 {
        return None;
    }
    Some(libc::timespec {
        tv_sec: (timeout_ms / 1000) as libc::time_t,
        tv_nsec: ((timeout_ms % 1000) as libc::c_long) * 1_000_000,
    })
}

pub(crate) fn is_interrupted(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::Interrupted
}
