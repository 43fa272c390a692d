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

const NAME: &str = "solaris-eventports";

/// Solaris event ports. An association fires once and is then dropped by
/// the kernel, so every reported fd is re-associated right after the wait
/// with the mask kept in the association's user word.
pub struct PortBackend {
    port: RawFd,
    results: Vec<libc::port_event>,
    ready: usize,
}

impl PortBackend {
    pub fn new(max_fds: usize) -> Result<Self> {
        let port = unsafe { libc::port_create() };
        if port < 0 {
            return Err(EventError::last_os(NAME, "port_create"));
        }
        unsafe {
            libc::fcntl(port, libc::F_SETFD, libc::FD_CLOEXEC);
        }
        let results = (0..max_fds.max(1))
            .map(|_| unsafe { mem::zeroed::<libc::port_event>() })
            .collect();
        Ok(Self {
            port,
            results,
            ready: 0,
        })
    }

    fn associate(&self, fd: RawFd, events: Events) -> Result<()> {
        let ret = unsafe {
            libc::port_associate(
                self.port,
                libc::PORT_SOURCE_FD,
                fd as libc::uintptr_t,
                events.to_poll() as libc::c_int,
                events.bits() as usize as *mut libc::c_void,
            )
        };
        if ret < 0 {
            return Err(EventError::last_os(NAME, "port_associate"));
        }
        Ok(())
    }
}

impl EventBackend for PortBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SolarisEventports
    }

    fn event_set(
        &mut self,
        _index: Option<usize>,
        fd: RawFd,
        _old: Events,
        events: Events,
    ) -> Result<usize> {
        self.associate(fd, events)?;
        Ok(fd as usize)
    }

    fn event_del(&mut self, _index: usize, fd: RawFd, _old: Events) -> Result<()> {
        let ret = unsafe {
            libc::port_dissociate(self.port, libc::PORT_SOURCE_FD, fd as libc::uintptr_t)
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                return Err(EventError::Backend {
                    backend: NAME,
                    op: "port_dissociate",
                    source: err,
                });
            }
        }
        Ok(())
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        let mut ts = timespec_from_ms(timeout_ms);
        let ts_ptr = ts
            .as_mut()
            .map_or(ptr::null_mut(), |ts| ts as *mut libc::timespec);
        let mut nget: libc::c_uint = 1;

        let ret = unsafe {
            libc::port_getn(
                self.port,
                self.results.as_mut_ptr(),
                self.results.len() as libc::c_uint,
                &mut nget,
                ts_ptr,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                // timeout: `nget` still holds whatever was collected
                Some(libc::ETIME) => {}
                _ if is_interrupted(&err) => {
                    debug!("port_getn interrupted, reporting no events");
                    self.ready = 0;
                    return Ok(0);
                }
                _ => {
                    self.ready = 0;
                    return Err(EventError::Backend {
                        backend: NAME,
                        op: "port_getn",
                        source: err,
                    });
                }
            }
        }
        self.ready = (nget as usize).min(self.results.len());

        for i in 0..self.ready {
            let fd = self.results[i].portev_object as RawFd;
            let mask = Events::from_bits_truncate(self.results[i].portev_user as usize as u8);
            if let Err(e) = self.associate(fd, mask) {
                warn!("event ports: re-associating fd {} failed: {}", fd, e);
            }
        }
        Ok(self.ready)
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        dense_next(cursor, self.ready)
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        (index < self.ready).then(|| self.results[index].portev_object as RawFd)
    }

    fn ready_revents(&self, index: usize) -> Events {
        if index < self.ready {
            Events::from_poll(self.results[index].portev_events as libc::c_short)
        } else {
            Events::NONE
        }
    }
}

impl Drop for PortBackend {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.port);
        }
    }
}
