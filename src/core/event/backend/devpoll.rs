use crate::common::error::{EventError, Result};
use crate::core::event::backend::{dense_next, is_interrupted, Cursor, EventBackend};
use crate::core::event::event::Events;
use crate::core::event::poller::BackendKind;
use log::debug;
use std::mem;
use std::os::unix::io::RawFd;

const NAME: &str = "solaris-devpoll";

// <sys/devpoll.h>
const DP_POLL: libc::c_int = (0xD0 << 8) | 1;
const POLLREMOVE: libc::c_short = 0x0800;

#[repr(C)]
struct DvPoll {
    dp_fds: *mut libc::pollfd,
    dp_nfds: libc::nfds_t,
    dp_timeout: libc::c_int,
}

fn open_devpoll() -> Result<RawFd> {
    let path = b"/dev/poll\0";
    let fd = unsafe {
        libc::open(
            path.as_ptr() as *const libc::c_char,
            libc::O_RDWR | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(EventError::last_os(NAME, "open(/dev/poll)"));
    }
    Ok(fd)
}

/// Solaris `/dev/poll`: interest is written to the device as `pollfd`
/// records and collected with the `DP_POLL` ioctl. Writes OR into the
/// existing mask, so dropping bits removes the fd first.
pub struct DevpollBackend {
    devpoll: RawFd,
    results: Vec<libc::pollfd>,
    ready: usize,
}

impl DevpollBackend {
    pub fn new(max_fds: usize) -> Result<Self> {
        let devpoll = open_devpoll()?;
        Ok(Self {
            devpoll,
            results: vec![
                libc::pollfd {
                    fd: -1,
                    events: 0,
                    revents: 0,
                };
                max_fds.max(1)
            ],
            ready: 0,
        })
    }

    fn write_entry(&self, fd: RawFd, events: libc::c_short) -> Result<()> {
        let pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let len = mem::size_of::<libc::pollfd>();
        let written = unsafe {
            libc::pwrite(
                self.devpoll,
                &pfd as *const libc::pollfd as *const libc::c_void,
                len,
                0,
            )
        };
        if written != len as isize {
            return Err(EventError::last_os(NAME, "pwrite(/dev/poll)"));
        }
        Ok(())
    }
}

impl EventBackend for DevpollBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SolarisDevpoll
    }

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        old: Events,
        events: Events,
    ) -> Result<usize> {
        if index.is_some() && !(old & !events).is_empty() {
            self.write_entry(fd, POLLREMOVE)?;
        }
        self.write_entry(fd, events.to_poll())?;
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, _old: Events) -> Result<()> {
        self.write_entry(fd, POLLREMOVE)
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        let mut dvp = DvPoll {
            dp_fds: self.results.as_mut_ptr(),
            dp_nfds: self.results.len() as libc::nfds_t,
            dp_timeout: timeout_ms,
        };
        let n = unsafe { libc::ioctl(self.devpoll, DP_POLL as _, &mut dvp as *mut DvPoll) };
        if n < 0 {
            self.ready = 0;
            let err = std::io::Error::last_os_error();
            if is_interrupted(&err) {
                debug!("DP_POLL interrupted, reporting no events");
                return Ok(0);
            }
            return Err(EventError::Backend {
                backend: NAME,
                op: "ioctl(DP_POLL)",
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
        (index < self.ready).then(|| self.results[index].fd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        if index < self.ready {
            Events::from_poll(self.results[index].revents)
        } else {
            Events::NONE
        }
    }

    fn reset(&mut self, live: &[(RawFd, Events)]) -> Result<()> {
        let devpoll = open_devpoll()?;
        unsafe {
            libc::close(self.devpoll);
        }
        self.devpoll = devpoll;
        self.ready = 0;

        for &(fd, events) in live {
            self.write_entry(fd, events.to_poll())?;
        }
        Ok(())
    }
}

impl Drop for DevpollBackend {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.devpoll);
        }
    }
}
