use crate::common::constants::POLL_GROW_STEP;
use crate::common::error::{EventError, Result};
use crate::core::event::backend::{is_interrupted, Cursor, EventBackend};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::{debug, warn};
use std::os::unix::io::RawFd;

const NAME: &str = "poll";

/// `poll(2)` over a packed `pollfd` array.
///
/// Freed slots keep `fd = -1` (ignored by the kernel) and their index goes on
/// a free stack, so the next `event_set` reuses it without touching the rest
/// of the array. Trigger indices are slot numbers.
pub struct PollBackend {
    pollfds: Vec<libc::pollfd>,
    unused: Vec<usize>,
    max_fds: usize,
}

impl PollBackend {
    pub fn new(max_fds: usize) -> Self {
        Self {
            pollfds: Vec::new(),
            unused: Vec::new(),
            max_fds,
        }
    }

    /// Slots in use or on the free stack.
    pub fn slots(&self) -> usize {
        self.pollfds.len()
    }

    /// Slot indices waiting for reuse.
    pub fn free_slots(&self) -> usize {
        self.unused.len()
    }

    /// Allocated pollfd capacity.
    pub fn allocated(&self) -> usize {
        self.pollfds.capacity()
    }

    fn slot_for(&self, index: usize, fd: RawFd) -> Result<usize> {
        match self.pollfds.get(index) {
            Some(pfd) if pfd.fd == fd => Ok(index),
            _ => {
                warn!("poll: trigger {} does not belong to fd {}", index, fd);
                Err(EventError::StaleTrigger { fd, index })
            }
        }
    }

    fn grow(&mut self) -> Result<()> {
        if self.pollfds.len() >= self.max_fds {
            return Err(EventError::Exhausted(format!(
                "poll: all {} slots in use",
                self.max_fds
            )));
        }
        if self.pollfds.len() == self.pollfds.capacity() {
            let step = POLL_GROW_STEP.min(self.max_fds - self.pollfds.len());
            self.pollfds.try_reserve_exact(step).map_err(|e| {
                EventError::Exhausted(format!("poll: cannot grow pollfd array: {}", e))
            })?;
        }
        Ok(())
    }
}

impl EventBackend for PollBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Poll
    }

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        _old: Events,
        events: Events,
    ) -> Result<usize> {
        if let Some(index) = index {
            let k = self.slot_for(index, fd)?;
            self.pollfds[k].events = events.to_poll();
            return Ok(k);
        }

        let entry = libc::pollfd {
            fd,
            events: events.to_poll(),
            revents: 0,
        };

        if let Some(k) = self.unused.pop() {
            self.pollfds[k] = entry;
            return Ok(k);
        }

        self.grow()?;
        self.pollfds.push(entry);
        Ok(self.pollfds.len() - 1)
    }

    fn event_del(&mut self, index: usize, fd: RawFd, _old: Events) -> Result<()> {
        let k = self.slot_for(index, fd)?;
        self.pollfds[k] = libc::pollfd {
            fd: -1,
            events: 0,
            revents: 0,
        };
        self.unused.push(k);
        Ok(())
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        let n = unsafe {
            libc::poll(
                self.pollfds.as_mut_ptr(),
                self.pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            for pfd in &mut self.pollfds {
                pfd.revents = 0;
            }
            if is_interrupted(&err) {
                debug!("poll interrupted, reporting no events");
                return Ok(0);
            }
            return Err(EventError::Backend {
                backend: NAME,
                op: "poll",
                source: err,
            });
        }
        Ok(n as usize)
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        let Some(start) = cursor.scan_start() else {
            return Cursor::End;
        };
        (start..self.pollfds.len())
            .find(|&i| self.pollfds[i].revents != 0)
            .map_or(Cursor::End, Cursor::At)
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        self.pollfds.get(index).map(|pfd| pfd.fd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        let Some(pfd) = self.pollfds.get(index) else {
            return Events::NONE;
        };
        let revents = Events::from_poll(pfd.revents);
        if revents.contains(Events::NVAL) {
            warn!("poll: fd {} reported POLLNVAL, was it closed while watched?", pfd.fd);
        }
        revents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::net::fd::tests::{pipe_pair, write_bytes};

    #[test]
    fn test_freed_slot_is_reused() {
        let (r, w) = pipe_pair();
        let mut poll = PollBackend::new(8);

        let a = poll.event_set(None, r, Events::NONE, Events::IN).unwrap();
        let b = poll.event_set(None, w, Events::NONE, Events::OUT).unwrap();
        assert_eq!((a, b), (0, 1));
        let allocated = poll.allocated();

        poll.event_del(a, r, Events::IN).unwrap();
        assert_eq!(poll.free_slots(), 1);
        assert_eq!(poll.slots(), 2);

        let again = poll.event_set(None, r, Events::NONE, Events::IN).unwrap();
        assert_eq!(again, a);
        assert_eq!(poll.free_slots(), 0);
        assert_eq!(poll.slots(), 2);
        assert_eq!(poll.allocated(), allocated);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_update_keeps_slot() {
        let (r, w) = pipe_pair();
        let mut poll = PollBackend::new(8);
        let k = poll.event_set(None, w, Events::NONE, Events::IN).unwrap();
        let same = poll.event_set(Some(k), w, Events::IN, Events::OUT).unwrap();
        assert_eq!(k, same);
        assert_eq!(poll.pollfds[k].events, libc::POLLOUT);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_stale_trigger_rejected() {
        let mut poll = PollBackend::new(8);
        let k = poll.event_set(None, 5, Events::NONE, Events::IN).unwrap();
        assert!(matches!(
            poll.event_set(Some(k), 6, Events::IN, Events::IN),
            Err(EventError::StaleTrigger { fd: 6, .. })
        ));
        poll.event_del(k, 5, Events::IN).unwrap();
        assert!(poll.event_del(k, 5, Events::NONE).is_err());
        assert!(poll.event_del(42, 5, Events::NONE).is_err());
    }

    #[test]
    fn test_slot_limit() {
        let mut poll = PollBackend::new(2);
        poll.event_set(None, 3, Events::NONE, Events::IN).unwrap();
        poll.event_set(None, 4, Events::NONE, Events::IN).unwrap();
        assert!(matches!(
            poll.event_set(None, 5, Events::NONE, Events::IN),
            Err(EventError::Exhausted(_))
        ));
        assert_eq!(poll.slots(), 2);
    }

    #[test]
    fn test_scan_skips_idle_slots() {
        let (r1, w1) = pipe_pair();
        let (r2, w2) = pipe_pair();
        let mut poll = PollBackend::new(8);
        poll.event_set(None, r1, Events::NONE, Events::IN).unwrap();
        let second = poll.event_set(None, r2, Events::NONE, Events::IN).unwrap();

        write_bytes(w2, b"x");
        assert_eq!(poll.poll(100).unwrap(), 1);
        let cursor = poll.next_ready(Cursor::Begin);
        assert_eq!(cursor, Cursor::At(second));
        assert_eq!(poll.ready_fd(second), Some(r2));
        assert_eq!(poll.next_ready(cursor), Cursor::End);
        assert_eq!(poll.next_ready(Cursor::End), Cursor::End);

        unsafe {
            for fd in [r1, w1, r2, w2] {
                libc::close(fd);
            }
        }
    }
}
