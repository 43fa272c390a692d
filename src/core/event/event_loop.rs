// Main loop driver: poll, walk the ready set, call handlers.
use crate::common::error::Result;
use crate::core::event::event::HandlerStatus;
use crate::core::event::event_list::EventList;
use log::{debug, error};

/// A server context that owns its event list.
pub trait EventSource<C>: Sized {
    fn event_list(&mut self) -> &mut EventList<Self, C>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Ready triggers reported by the backend.
    pub ready: usize,
    pub dispatched: usize,
    /// Ready descriptors unregistered before their turn came.
    pub skipped: usize,
    pub failed: usize,
}

/// One loop iteration. Handlers run synchronously in ready-set order and may
/// change interest or unregister descriptors, including ones still pending
/// in this round.
pub fn poll_and_dispatch<S, C>(srv: &mut S, timeout_ms: i32) -> Result<DispatchStats>
where
    S: EventSource<C>,
    C: Copy,
{
    let ready = srv.event_list().poll(timeout_ms)?;
    let mut stats = DispatchStats {
        ready,
        ..DispatchStats::default()
    };
    if ready == 0 {
        return Ok(stats);
    }

    // Collect first so handlers can borrow the server mutably
    let fired: Vec<_> = srv.event_list().ready().collect();

    for (fd, revents) in fired {
        let Some((handler, ctx)) = srv.event_list().lookup(fd) else {
            debug!("fd {} unregistered before dispatch, skipping", fd);
            stats.skipped += 1;
            continue;
        };

        stats.dispatched += 1;
        if handler(srv, ctx, revents) == HandlerStatus::Error {
            error!("event handler for fd {} failed (revents {:?})", fd, revents);
            stats.failed += 1;
        }
    }
    Ok(stats)
}

/// Runs `poll_and_dispatch` until `keep_running` returns false.
pub fn run<S, C, F>(srv: &mut S, timeout_ms: i32, mut keep_running: F) -> Result<()>
where
    S: EventSource<C>,
    C: Copy,
    F: FnMut(&S) -> bool,
{
    while keep_running(srv) {
        poll_and_dispatch(srv, timeout_ms)?;
    }
    Ok(())
}
