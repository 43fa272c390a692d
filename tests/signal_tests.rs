// Signal tests - a wait cut short by a signal reports nothing ready

use fdevent::core::event::Events;
use std::mem;
use std::thread;
use std::time::{Duration, Instant};

mod common;
use common::{close_all, every_backend, pipe_pair, record};

extern "C" fn on_signal(_: libc::c_int) {}

/// Handler without SA_RESTART so blocking waits fail with EINTR.
fn install_handler() {
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()), 0);
    }
}

/// Signals the calling thread after `delay`.
fn interrupt_after(delay: Duration) -> thread::JoinHandle<()> {
    let target = unsafe { libc::pthread_self() } as usize;
    thread::spawn(move || {
        thread::sleep(delay);
        unsafe {
            libc::pthread_kill(target as libc::pthread_t, libc::SIGUSR1);
        }
    })
}

#[test]
fn test_interrupted_wait_reports_zero_ready() {
    install_handler();

    for mut list in every_backend(256) {
        let (r, w) = pipe_pair();
        list.register(r, record, r as usize).unwrap();
        let mut trigger = None;
        list.event_set(&mut trigger, r, Events::IN).unwrap();

        let signaller = interrupt_after(Duration::from_millis(100));
        let started = Instant::now();
        assert_eq!(list.poll(5000).unwrap(), 0, "{}", list.backend_kind());
        assert!(
            started.elapsed() < Duration::from_millis(4000),
            "{} waited out the full timeout",
            list.backend_kind()
        );
        signaller.join().unwrap();

        assert_eq!(list.ready().count(), 0);

        // the list is still usable afterwards
        common::write_all(w, b"x");
        assert_eq!(list.poll(1000).unwrap(), 1, "{}", list.backend_kind());

        list.event_del(&mut trigger, r).unwrap();
        list.unregister(r).unwrap();
        close_all(&[r, w]);
    }
}
