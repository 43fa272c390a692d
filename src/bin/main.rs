use fdevent::application::config::loader::ConfigLoader;
use fdevent::application::config::models::EventConfig;
use fdevent::common::logger::Logger;
use fdevent::core::event::event_loop::{run, EventSource};
use fdevent::core::event::{BackendKind, EventList, Events, HandlerStatus};
use fdevent::core::net::fd::{FileDescr, NetworkStatus};
use log::{error, info};
use std::env;
use std::os::unix::io::RawFd;

const STDIN_FD: RawFd = 0;

/// Echoes stdin to stdout through the event list.
struct Echo {
    events: EventList<Echo, RawFd>,
    stdin: FileDescr,
    stdout: FileDescr,
    done: bool,
}

impl EventSource<RawFd> for Echo {
    fn event_list(&mut self) -> &mut EventList<Echo, RawFd> {
        &mut self.events
    }
}

impl Echo {
    fn close(&mut self, fd: RawFd) {
        if let Err(e) = self.events.event_del(self.stdin.trigger_mut(), fd) {
            error!("removing interest in fd {} failed: {}", fd, e);
        }
        if let Err(e) = self.events.unregister(fd) {
            error!("unregistering fd {} failed: {}", fd, e);
        }
        self.done = true;
    }
}

/// Writes all of `chunk`. Stdout stays blocking, so anything short of a
/// full transfer is a failure.
fn write_chunk(out: &mut FileDescr, mut chunk: &[u8]) -> bool {
    while !chunk.is_empty() {
        match out.write_from(chunk) {
            (NetworkStatus::Ok, n) if n > 0 => chunk = &chunk[n..],
            (status, _) => {
                error!("writing to stdout failed: {:?}", status);
                return false;
            }
        }
    }
    true
}

fn on_stdin(srv: &mut Echo, fd: RawFd, revents: Events) -> HandlerStatus {
    srv.stdin.update_readiness(revents);
    let mut buf = [0u8; 4096];

    while srv.stdin.is_readable() {
        match srv.stdin.read_into(&mut buf) {
            (NetworkStatus::Ok, n) => {
                if !write_chunk(&mut srv.stdout, &buf[..n]) {
                    srv.close(fd);
                    return HandlerStatus::Error;
                }
            }
            (NetworkStatus::WouldBlock, _) => break,
            (NetworkStatus::RemoteClose, _) => {
                srv.close(fd);
                return HandlerStatus::Finished;
            }
            _ => {
                srv.close(fd);
                return HandlerStatus::Error;
            }
        }
    }
    HandlerStatus::GoOn
}

fn load_config(args: &[String]) -> EventConfig {
    match ConfigLoader::load_optional(args.get(1).map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error parsing config file: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = load_config(&args);

    match config.log_level_filter() {
        Ok(level) => Logger::init(level),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let available: Vec<&str> = BackendKind::available().iter().map(|k| k.name()).collect();
    info!("event handlers compiled in: {}", available.join(", "));

    let events = match EventList::from_config(&config) {
        Ok(list) => list,
        Err(e) => {
            eprintln!("Error creating event list: {}", e);
            std::process::exit(1);
        }
    };
    info!("using event handler {}", events.backend_kind());

    let mut echo = Echo {
        events,
        stdin: FileDescr::new(STDIN_FD),
        stdout: FileDescr::new(1),
        done: false,
    };

    let watched = echo
        .stdin
        .set_fd_flags()
        .and_then(|_| echo.events.register(STDIN_FD, on_stdin, STDIN_FD))
        .and_then(|_| {
            echo.events
                .event_set(echo.stdin.trigger_mut(), STDIN_FD, Events::IN)
        });
    if let Err(e) = watched {
        eprintln!("Cannot watch stdin: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&mut echo, config.poll_timeout_ms, |s| !s.done) {
        eprintln!("Event loop error: {}", e);
        std::process::exit(1);
    }
    info!("stdin closed after {} bytes", echo.stdin.bytes_read());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (FileDescr, FileDescr) {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (r, w) = (FileDescr::from_raw(fds[0]), FileDescr::from_raw(fds[1]));
        r.set_fd_flags().unwrap();
        w.set_fd_flags().unwrap();
        (r, w)
    }

    #[test]
    fn test_write_chunk_writes_everything() {
        let (mut r, mut w) = pipe();
        assert!(write_chunk(&mut w, b"hello world"));
        assert_eq!(w.bytes_written(), 11);

        let mut buf = [0u8; 32];
        assert_eq!(r.read_into(&mut buf), (NetworkStatus::Ok, 11));
    }

    #[test]
    fn test_write_chunk_reports_short_write() {
        // larger than any default pipe buffer
        let (_r, mut w) = pipe();
        let big = vec![b'x'; 1 << 20];
        assert!(!write_chunk(&mut w, &big));
        assert!(w.bytes_written() < big.len());
    }

    #[test]
    fn test_write_chunk_reports_closed_reader() {
        let (r, mut w) = pipe();
        drop(r);
        assert!(!write_chunk(&mut w, b"lost"));
    }
}
