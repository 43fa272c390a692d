use crate::common::error::{EventError, Result};
use crate::core::event::backend::{dense_next, is_interrupted, Cursor, EventBackend};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::debug;
use std::io;
use std::os::unix::io::RawFd;

const NAME: &str = "libev";

/// Native flags of the embedded loop (libev's `EV_READ`/`EV_WRITE`/`EV_ERROR`).
pub const EV_READ: u32 = 0x01;
pub const EV_WRITE: u32 = 0x02;
pub const EV_ERROR: u32 = 0x8000_0000;

/// An embeddable event loop that watches descriptors on our behalf.
pub trait ExternalReactor {
    fn add(&mut self, fd: RawFd, flags: u32) -> io::Result<()>;

    fn modify(&mut self, fd: RawFd, flags: u32) -> io::Result<()>;

    fn remove(&mut self, fd: RawFd) -> io::Result<()>;

    /// Runs one loop iteration, appending `(fd, flags)` for every watcher
    /// that fired. Negative `timeout_ms` blocks until something fires.
    fn run_once(&mut self, timeout_ms: i32, ready: &mut Vec<(RawFd, u32)>) -> io::Result<()>;
}

pub fn to_native(events: Events) -> u32 {
    let mut flags = 0;
    if events.intersects(Events::IN | Events::PRI) {
        flags |= EV_READ;
    }
    if events.contains(Events::OUT) {
        flags |= EV_WRITE;
    }
    flags
}

pub fn from_native(flags: u32) -> Events {
    let mut events = Events::NONE;
    if flags & EV_READ != 0 {
        events |= Events::IN;
    }
    if flags & EV_WRITE != 0 {
        events |= Events::OUT;
    }
    if flags & EV_ERROR != 0 {
        events |= Events::ERR;
    }
    events
}

/// Routes interest to an [`ExternalReactor`] and keeps what it reported from
/// the last iteration as a dense result list.
pub struct ExternalBackend {
    reactor: Box<dyn ExternalReactor>,
    ready: Vec<(RawFd, u32)>,
}

impl ExternalBackend {
    pub fn new(reactor: Box<dyn ExternalReactor>, max_fds: usize) -> Self {
        Self {
            reactor,
            ready: Vec::with_capacity(max_fds),
        }
    }

    fn wrap(op: &'static str, source: io::Error) -> EventError {
        EventError::Backend {
            backend: NAME,
            op,
            source,
        }
    }
}

impl EventBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Libev
    }

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        _old: Events,
        events: Events,
    ) -> Result<usize> {
        let flags = to_native(events);
        match index {
            None => self.reactor.add(fd, flags).map_err(|e| Self::wrap("add", e))?,
            Some(_) => self
                .reactor
                .modify(fd, flags)
                .map_err(|e| Self::wrap("modify", e))?,
        }
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, _old: Events) -> Result<()> {
        self.reactor.remove(fd).map_err(|e| Self::wrap("remove", e))
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        self.ready.clear();
        match self.reactor.run_once(timeout_ms, &mut self.ready) {
            Ok(()) => Ok(self.ready.len()),
            Err(e) if is_interrupted(&e) => {
                debug!("external reactor interrupted, reporting no events");
                self.ready.clear();
                Ok(0)
            }
            Err(e) => {
                self.ready.clear();
                Err(Self::wrap("run_once", e))
            }
        }
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        dense_next(cursor, self.ready.len())
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        self.ready.get(index).map(|&(fd, _)| fd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        self.ready
            .get(index)
            .map_or(Events::NONE, |&(_, flags)| from_native(flags))
    }
}
