use crate::common::error::{EventError, Result};
use crate::core::event::backend::{dense_next, is_interrupted, Cursor, EventBackend};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::debug;
use std::os::unix::io::RawFd;

const NAME: &str = "linux-sysepoll";

fn to_epoll(events: Events) -> u32 {
    let mut flags = 0;
    if events.contains(Events::IN) {
        flags |= libc::EPOLLIN as u32;
    }
    if events.contains(Events::PRI) {
        flags |= libc::EPOLLPRI as u32;
    }
    if events.contains(Events::OUT) {
        flags |= libc::EPOLLOUT as u32;
    }
    // HUP/ERR are always reported by the kernel; asking keeps the intent visible.
    flags | libc::EPOLLERR as u32 | libc::EPOLLHUP as u32
}

fn from_epoll(flags: u32) -> Events {
    let mut events = Events::NONE;
    if flags & libc::EPOLLIN as u32 != 0 {
        events |= Events::IN;
    }
    if flags & libc::EPOLLPRI as u32 != 0 {
        events |= Events::PRI;
    }
    if flags & libc::EPOLLOUT as u32 != 0 {
        events |= Events::OUT;
    }
    if flags & libc::EPOLLERR as u32 != 0 {
        events |= Events::ERR;
    }
    if flags & libc::EPOLLHUP as u32 != 0 {
        events |= Events::HUP;
    }
    events
}

/// Linux `epoll(7)`, level-triggered. Interest lives in the kernel keyed by
/// fd, so the trigger index is the fd; results land in a buffer sized to the
/// event list capacity.
pub struct EpollBackend {
    epfd: RawFd,
    events: Vec<libc::epoll_event>,
    ready: usize,
}

impl EpollBackend {
    pub fn new(max_fds: usize) -> Result<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(EventError::last_os(NAME, "epoll_create1"));
        }
        Ok(Self {
            epfd,
            events: vec![libc::epoll_event { events: 0, u64: 0 }; max_fds.max(1)],
            ready: 0,
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: Events) -> Result<()> {
        let mut ev = libc::epoll_event {
            events: to_epoll(events),
            u64: fd as u64,
        };
        if unsafe { libc::epoll_ctl(self.epfd, op, fd, &mut ev) } < 0 {
            let opname = match op {
                libc::EPOLL_CTL_ADD => "epoll_ctl(ADD)",
                libc::EPOLL_CTL_MOD => "epoll_ctl(MOD)",
                _ => "epoll_ctl(DEL)",
            };
            return Err(EventError::last_os(NAME, opname));
        }
        Ok(())
    }
}

impl EventBackend for EpollBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LinuxSysepoll
    }

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        _old: Events,
        events: Events,
    ) -> Result<usize> {
        let op = if index.is_none() {
            libc::EPOLL_CTL_ADD
        } else {
            libc::EPOLL_CTL_MOD
        };
        self.ctl(op, fd, events)?;
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, _old: Events) -> Result<()> {
        self.ctl(libc::EPOLL_CTL_DEL, fd, Events::NONE)
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        let n = unsafe {
            libc::epoll_wait(
                self.epfd,
                self.events.as_mut_ptr(),
                self.events.len() as libc::c_int,
                timeout_ms,
            )
        };
        if n < 0 {
            self.ready = 0;
            let err = std::io::Error::last_os_error();
            if is_interrupted(&err) {
                debug!("epoll_wait interrupted, reporting no events");
                return Ok(0);
            }
            return Err(EventError::Backend {
                backend: NAME,
                op: "epoll_wait",
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
        if index < self.ready {
            let data = self.events[index].u64;
            Some(data as RawFd)
        } else {
            None
        }
    }

    fn ready_revents(&self, index: usize) -> Events {
        if index < self.ready {
            let flags = self.events[index].events;
            from_epoll(flags)
        } else {
            Events::NONE
        }
    }
}

impl Drop for EpollBackend {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::net::fd::tests::{pipe_pair, write_bytes};

    #[test]
    fn test_flag_translation() {
        let flags = to_epoll(Events::IN | Events::OUT);
        assert_ne!(flags & libc::EPOLLIN as u32, 0);
        assert_ne!(flags & libc::EPOLLHUP as u32, 0);
        assert_eq!(
            from_epoll(libc::EPOLLIN as u32 | libc::EPOLLHUP as u32),
            Events::IN | Events::HUP
        );
    }

    #[test]
    fn test_add_modify_delete() {
        let (r, w) = pipe_pair();
        let mut epoll = EpollBackend::new(8).unwrap();

        let index = epoll.event_set(None, w, Events::NONE, Events::IN).unwrap();
        assert_eq!(index, w as usize);
        assert_eq!(epoll.poll(0).unwrap(), 0);

        epoll.event_set(Some(index), w, Events::IN, Events::OUT).unwrap();
        assert_eq!(epoll.poll(0).unwrap(), 1);
        assert_eq!(epoll.ready_fd(0), Some(w));
        assert!(epoll.ready_revents(0).contains(Events::OUT));

        epoll.event_del(index, w, Events::OUT).unwrap();
        assert_eq!(epoll.poll(0).unwrap(), 0);
        assert_eq!(epoll.next_ready(Cursor::Begin), Cursor::End);

        // adding twice is a kernel error, surfaced as such
        epoll.event_set(None, r, Events::NONE, Events::IN).unwrap();
        assert!(matches!(
            epoll.event_set(None, r, Events::NONE, Events::IN),
            Err(EventError::Backend { .. })
        ));

        write_bytes(w, b"data");
        assert_eq!(epoll.poll(100).unwrap(), 1);
        assert_eq!(epoll.ready_fd(0), Some(r));
        assert_eq!(epoll.ready_fd(1), None);

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }
}
