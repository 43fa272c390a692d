use crate::common::error::{EventError, Result};
use crate::core::event::backend::{
    dense_next, is_interrupted, timespec_from_ms, Cursor, EventBackend,
};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::{debug, warn};
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

const NAME: &str = "freebsd-kqueue";

fn change(fd: RawFd, filter: i32, add: bool) -> libc::kevent {
    let mut kev: libc::kevent = unsafe { mem::zeroed() };
    kev.ident = fd as _;
    kev.filter = filter as _;
    kev.flags = if add { libc::EV_ADD } else { libc::EV_DELETE };
    kev
}

fn open_kqueue() -> Result<RawFd> {
    let kq = unsafe { libc::kqueue() };
    if kq < 0 {
        return Err(EventError::last_os(NAME, "kqueue"));
    }
    unsafe {
        libc::fcntl(kq, libc::F_SETFD, libc::FD_CLOEXEC);
    }
    Ok(kq)
}

/// BSD `kqueue(2)`. Read and write interest are separate kernel filters, so
/// mask updates submit only the filters that changed. One fd may show up
/// twice in a result set, once per filter.
pub struct KqueueBackend {
    kq: RawFd,
    results: Vec<libc::kevent>,
    ready: usize,
}

impl KqueueBackend {
    pub fn new(max_fds: usize) -> Result<Self> {
        let kq = open_kqueue()?;
        let results = (0..max_fds.max(1))
            .map(|_| unsafe { mem::zeroed::<libc::kevent>() })
            .collect();
        Ok(Self {
            kq,
            results,
            ready: 0,
        })
    }

    fn submit(&self, changes: &[libc::kevent]) -> std::io::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let zero = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let ret = unsafe {
            libc::kevent(
                self.kq,
                changes.as_ptr(),
                changes.len() as _,
                ptr::null_mut(),
                0,
                &zero,
            )
        };
        if ret < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn diff(fd: RawFd, old: Events, events: Events) -> Vec<libc::kevent> {
        let added = events & !old;
        let dropped = old & !events;
        let mut changes = Vec::with_capacity(2);

        if added.intersects(Events::IN | Events::PRI) && !old.intersects(Events::IN | Events::PRI) {
            changes.push(change(fd, libc::EVFILT_READ as i32, true));
        } else if dropped.intersects(Events::IN | Events::PRI)
            && !events.intersects(Events::IN | Events::PRI)
        {
            changes.push(change(fd, libc::EVFILT_READ as i32, false));
        }

        if added.contains(Events::OUT) {
            changes.push(change(fd, libc::EVFILT_WRITE as i32, true));
        } else if dropped.contains(Events::OUT) {
            changes.push(change(fd, libc::EVFILT_WRITE as i32, false));
        }
        changes
    }
}

impl EventBackend for KqueueBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FreebsdKqueue
    }

    fn event_set(
        &mut self,
        _index: Option<usize>,
        fd: RawFd,
        old: Events,
        events: Events,
    ) -> Result<usize> {
        let changes = Self::diff(fd, old, events);
        self.submit(&changes).map_err(|source| EventError::Backend {
            backend: NAME,
            op: "kevent(change)",
            source,
        })?;
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, old: Events) -> Result<()> {
        let changes = Self::diff(fd, old, Events::NONE);
        // The kernel drops filters of closed descriptors on its own.
        if let Err(e) = self.submit(&changes) {
            warn!("kqueue: removing filters of fd {} failed: {}", fd, e);
        }
        Ok(())
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        let ts = timespec_from_ms(timeout_ms);
        let ts_ptr = ts
            .as_ref()
            .map_or(ptr::null(), |ts| ts as *const libc::timespec);

        let n = unsafe {
            libc::kevent(
                self.kq,
                ptr::null(),
                0,
                self.results.as_mut_ptr(),
                self.results.len() as _,
                ts_ptr,
            )
        };
        if n < 0 {
            self.ready = 0;
            let err = std::io::Error::last_os_error();
            if is_interrupted(&err) {
                debug!("kevent interrupted, reporting no events");
                return Ok(0);
            }
            return Err(EventError::Backend {
                backend: NAME,
                op: "kevent(wait)",
                source: err,
            });
        }
        self.ready = n as usize;
        Ok(self.ready)
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        dense_next(cursor, self.ready)
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        (index < self.ready).then(|| self.results[index].ident as RawFd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        if index >= self.ready {
            return Events::NONE;
        }
        let kev = &self.results[index];
        let mut revents = Events::NONE;
        if kev.filter == libc::EVFILT_READ {
            revents |= Events::IN;
        } else if kev.filter == libc::EVFILT_WRITE {
            revents |= Events::OUT;
        }
        if kev.flags & libc::EV_EOF != 0 {
            revents |= Events::HUP;
        }
        if kev.flags & libc::EV_ERROR != 0 {
            revents |= Events::ERR;
        }
        revents
    }

    fn reset(&mut self, live: &[(RawFd, Events)]) -> Result<()> {
        let kq = open_kqueue()?;
        unsafe {
            libc::close(self.kq);
        }
        self.kq = kq;
        self.ready = 0;

        for &(fd, events) in live {
            self.event_set(None, fd, Events::NONE, events)?;
        }
        Ok(())
    }
}

impl Drop for KqueueBackend {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.kq);
        }
    }
}
