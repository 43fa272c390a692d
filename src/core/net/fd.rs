use crate::common::error::{EventError, Result};
use crate::core::event::event::Events;
use crate::core::event::event_list::Trigger;
use log::warn;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// Makes `fd` non-blocking and close-on-exec. Safe to call repeatedly.
pub fn set_fd_flags(fd: RawFd) -> Result<()> {
    unsafe {
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags < 0 {
            return Err(EventError::Io(io::Error::last_os_error()));
        }
        if fd_flags & libc::FD_CLOEXEC == 0
            && libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0
        {
            return Err(EventError::Io(io::Error::last_os_error()));
        }

        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(EventError::Io(io::Error::last_os_error()));
        }
        if flags & libc::O_NONBLOCK == 0
            && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0
        {
            return Err(EventError::Io(io::Error::last_os_error()));
        }
    }
    Ok(())
}

/// Outcome of a byte-level transfer. Independent of [`Events`]: readiness
/// says a transfer may proceed, this says what the transfer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Ok,
    WouldBlock,
    Error,
    RemoteClose,
    /// Nothing was queued to write.
    QueueEmpty,
}

/// A descriptor as the server layer sees it: the raw fd, its trigger in the
/// event list and transfer bookkeeping.
pub struct FileDescr {
    fd: RawFd,
    owned: bool,
    trigger: Option<Trigger>,

    bytes_read: usize,
    bytes_written: usize,

    is_readable: bool,
    is_writable: bool,
    is_socket: bool,
}

impl FileDescr {
    fn build(fd: RawFd, owned: bool, is_socket: bool) -> Self {
        Self {
            fd,
            owned,
            trigger: None,
            bytes_read: 0,
            bytes_written: 0,
            is_readable: false,
            is_writable: false,
            is_socket,
        }
    }

    /// Borrowed descriptor; not closed on drop.
    pub fn new(fd: RawFd) -> Self {
        Self::build(fd, false, false)
    }

    /// Takes ownership; the descriptor is closed on drop.
    pub fn from_raw(fd: RawFd) -> Self {
        Self::build(fd, true, false)
    }

    pub fn socket(fd: RawFd) -> Self {
        Self::build(fd, true, true)
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn set_fd_flags(&self) -> Result<()> {
        set_fd_flags(self.fd)
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        self.trigger.as_ref()
    }

    /// Slot passed to `event_set`/`event_del`.
    pub fn trigger_mut(&mut self) -> &mut Option<Trigger> {
        &mut self.trigger
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn is_writable(&self) -> bool {
        self.is_writable
    }

    pub fn is_socket(&self) -> bool {
        self.is_socket
    }

    /// Records what the event list reported for this descriptor.
    pub fn update_readiness(&mut self, revents: Events) {
        if revents.intersects(Events::IN | Events::PRI | Events::HUP) {
            self.is_readable = true;
        }
        if revents.contains(Events::OUT) {
            self.is_writable = true;
        }
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> (NetworkStatus, usize) {
        loop {
            let n = unsafe {
                libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            };
            if n > 0 {
                self.bytes_read += n as usize;
                return (NetworkStatus::Ok, n as usize);
            }
            if n == 0 {
                self.is_readable = false;
                if buf.is_empty() {
                    return (NetworkStatus::Ok, 0);
                }
                return (NetworkStatus::RemoteClose, 0);
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => {
                    self.is_readable = false;
                    return (NetworkStatus::WouldBlock, 0);
                }
                io::ErrorKind::ConnectionReset => return (NetworkStatus::RemoteClose, 0),
                _ => return (NetworkStatus::Error, 0),
            }
        }
    }

    pub fn write_from(&mut self, buf: &[u8]) -> (NetworkStatus, usize) {
        if buf.is_empty() {
            return (NetworkStatus::QueueEmpty, 0);
        }
        loop {
            let n = unsafe {
                libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len())
            };
            if n >= 0 {
                self.bytes_written += n as usize;
                return (NetworkStatus::Ok, n as usize);
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => {
                    self.is_writable = false;
                    return (NetworkStatus::WouldBlock, 0);
                }
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                    return (NetworkStatus::RemoteClose, 0)
                }
                _ => return (NetworkStatus::Error, 0),
            }
        }
    }
}

impl AsRawFd for FileDescr {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for FileDescr {
    fn drop(&mut self) {
        if self.trigger.is_some() {
            warn!("fd {} dropped with a live event trigger", self.fd);
        }
        if self.owned && self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}
