// Common test utilities to reduce code duplication

use fdevent::core::event::{BackendKind, EventList, Events, HandlerStatus};
use std::os::unix::io::RawFd;

/// Server context used by the tests; handlers record what fired.
pub struct TestServer {
    pub fired: Vec<(RawFd, Events)>,
}

pub type TestList = EventList<TestServer, usize>;

#[allow(dead_code)]
pub fn record(srv: &mut TestServer, ctx: usize, revents: Events) -> HandlerStatus {
    srv.fired.push((ctx as RawFd, revents));
    HandlerStatus::GoOn
}

/// One event list per backend usable on this machine
#[allow(dead_code)]
pub fn every_backend(max_fds: usize) -> Vec<TestList> {
    let _ = env_logger::builder().is_test(true).try_init();
    BackendKind::available()
        .into_iter()
        .filter(|kind| *kind != BackendKind::Libev)
        .map(|kind| EventList::new(max_fds, kind.into()).unwrap())
        .collect()
}

/// Non-blocking pipe: (read end, write end)
#[allow(dead_code)]
pub fn pipe_pair() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    fdevent::core::net::set_fd_flags(fds[0]).unwrap();
    fdevent::core::net::set_fd_flags(fds[1]).unwrap();
    (fds[0], fds[1])
}

/// Non-blocking unix stream socket pair
#[allow(dead_code)]
pub fn socket_pair() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(ret, 0);
    fdevent::core::net::set_fd_flags(fds[0]).unwrap();
    fdevent::core::net::set_fd_flags(fds[1]).unwrap();
    (fds[0], fds[1])
}

#[allow(dead_code)]
pub fn write_all(fd: RawFd, data: &[u8]) {
    let n = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
    assert_eq!(n, data.len() as isize);
}

/// Read until the descriptor would block
#[allow(dead_code)]
pub fn drain(fd: RawFd) -> usize {
    let mut total = 0;
    let mut buf = [0u8; 4096];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            return total;
        }
        total += n as usize;
    }
}

#[allow(dead_code)]
pub fn close_all(fds: &[RawFd]) {
    for &fd in fds {
        unsafe {
            libc::close(fd);
        }
    }
}
