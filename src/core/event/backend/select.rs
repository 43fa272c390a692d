use crate::common::constants::FD_SETSIZE;
use crate::common::error::{EventError, Result};
use crate::core::event::backend::{is_interrupted, Cursor, EventBackend};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::debug;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

const NAME: &str = "select";

fn empty_set() -> libc::fd_set {
    unsafe {
        let mut set: libc::fd_set = mem::zeroed();
        libc::FD_ZERO(&mut set);
        set
    }
}

fn set_contains(set: &libc::fd_set, fd: RawFd) -> bool {
    unsafe { libc::FD_ISSET(fd, set) }
}

fn set_insert(set: &mut libc::fd_set, fd: RawFd) {
    unsafe { libc::FD_SET(fd, set) }
}

fn set_remove(set: &mut libc::fd_set, fd: RawFd) {
    unsafe { libc::FD_CLR(fd, set) }
}

/// `select(2)`: interest masks are copied into fresh result masks before
/// every wait. Trigger indices are the descriptors themselves.
pub struct SelectBackend {
    watch_read: libc::fd_set,
    watch_write: libc::fd_set,
    watch_error: libc::fd_set,

    ready_read: libc::fd_set,
    ready_write: libc::fd_set,
    ready_error: libc::fd_set,

    max_fd: RawFd,
    /// `max_fd` as it was when the result masks were filled.
    scanned_max_fd: RawFd,
}

impl SelectBackend {
    pub fn new(max_fds: usize) -> Result<Self> {
        if max_fds > FD_SETSIZE {
            return Err(EventError::Unavailable(format!(
                "select supports at most {} descriptors, {} requested",
                FD_SETSIZE, max_fds
            )));
        }
        Ok(Self {
            watch_read: empty_set(),
            watch_write: empty_set(),
            watch_error: empty_set(),
            ready_read: empty_set(),
            ready_write: empty_set(),
            ready_error: empty_set(),
            max_fd: -1,
            scanned_max_fd: -1,
        })
    }

    fn check_fd(fd: RawFd) -> Result<()> {
        if fd < 0 || fd as usize >= FD_SETSIZE {
            return Err(EventError::OutOfRange {
                fd,
                capacity: FD_SETSIZE,
            });
        }
        Ok(())
    }

    fn is_watched(&self, fd: RawFd) -> bool {
        set_contains(&self.watch_read, fd)
            || set_contains(&self.watch_write, fd)
            || set_contains(&self.watch_error, fd)
    }

    fn is_ready(&self, fd: RawFd) -> bool {
        set_contains(&self.ready_read, fd)
            || set_contains(&self.ready_write, fd)
            || set_contains(&self.ready_error, fd)
    }

    fn clear_results(&mut self) {
        self.ready_read = empty_set();
        self.ready_write = empty_set();
        self.ready_error = empty_set();
        self.scanned_max_fd = -1;
    }
}

impl EventBackend for SelectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Select
    }

    fn event_set(
        &mut self,
        _index: Option<usize>,
        fd: RawFd,
        _old: Events,
        events: Events,
    ) -> Result<usize> {
        Self::check_fd(fd)?;

        if events.intersects(Events::IN | Events::PRI) {
            set_insert(&mut self.watch_read, fd);
        } else {
            set_remove(&mut self.watch_read, fd);
        }
        if events.contains(Events::OUT) {
            set_insert(&mut self.watch_write, fd);
        } else {
            set_remove(&mut self.watch_write, fd);
        }
        set_insert(&mut self.watch_error, fd);

        self.max_fd = self.max_fd.max(fd);
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, _old: Events) -> Result<()> {
        Self::check_fd(fd)?;

        set_remove(&mut self.watch_read, fd);
        set_remove(&mut self.watch_write, fd);
        set_remove(&mut self.watch_error, fd);

        if fd == self.max_fd {
            while self.max_fd >= 0 && !self.is_watched(self.max_fd) {
                self.max_fd -= 1;
            }
        }
        Ok(())
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        self.ready_read = self.watch_read;
        self.ready_write = self.watch_write;
        self.ready_error = self.watch_error;

        let mut tv = libc::timeval {
            tv_sec: (timeout_ms.max(0) / 1000) as libc::time_t,
            tv_usec: ((timeout_ms.max(0) % 1000) * 1000) as libc::suseconds_t,
        };
        let tv_ptr = if timeout_ms < 0 {
            ptr::null_mut()
        } else {
            &mut tv as *mut libc::timeval
        };

        let n = unsafe {
            libc::select(
                self.max_fd + 1,
                &mut self.ready_read,
                &mut self.ready_write,
                &mut self.ready_error,
                tv_ptr,
            )
        };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            self.clear_results();
            if is_interrupted(&err) {
                debug!("select interrupted, reporting no events");
                return Ok(0);
            }
            return Err(EventError::Backend {
                backend: NAME,
                op: "select",
                source: err,
            });
        }

        self.scanned_max_fd = self.max_fd;
        Ok(n as usize)
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        let Some(start) = cursor.scan_start() else {
            return Cursor::End;
        };
        if self.scanned_max_fd < 0 {
            return Cursor::End;
        }
        (start..=self.scanned_max_fd as usize)
            .find(|&fd| self.is_ready(fd as RawFd))
            .map_or(Cursor::End, Cursor::At)
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        RawFd::try_from(index)
            .ok()
            .filter(|&fd| fd <= self.scanned_max_fd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        let fd = match self.ready_fd(index) {
            Some(fd) => fd,
            None => return Events::NONE,
        };
        let mut revents = Events::NONE;
        if set_contains(&self.ready_read, fd) {
            revents |= Events::IN;
        }
        if set_contains(&self.ready_write, fd) {
            revents |= Events::OUT;
        }
        if set_contains(&self.ready_error, fd) {
            revents |= Events::ERR;
        }
        revents
    }
}
