use crate::application::config::models::EventConfig;
use crate::common::error::{EventError, Result};
use crate::core::event::backend::{Cursor, EventBackend};
use crate::core::event::event::{Events, Handler};
use crate::core::event::poller::{Backend, BackendKind, BackendPreference};
use crate::core::event::registry::{FdNode, Registry};
use crate::core::net::fd;
use log::{debug, info};
use std::os::unix::io::RawFd;

#[cfg(feature = "external")]
use crate::core::event::backend::external::{ExternalBackend, ExternalReactor};

/// Handle to a descriptor's interest inside the active backend.
///
/// Deliberately not `Clone`: `event_del` takes it back, so a removed trigger
/// cannot be used again by accident.
#[derive(Debug, PartialEq, Eq)]
pub struct Trigger {
    fd: RawFd,
    index: usize,
}

impl Trigger {
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Backend-specific slot. Equal to the fd for kernel-resident backends
    /// and select, a pollfd slot number for poll.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A readiness-notification list: the registration table plus exactly one
/// backend, chosen at construction.
///
/// `S` is the server context handed to handlers and `C` the per-descriptor
/// context stored at registration.
pub struct EventList<S, C = usize> {
    registry: Registry<S, C>,
    backend: Backend,
}

impl<S, C> EventList<S, C> {
    pub fn new(max_fds: usize, preference: BackendPreference) -> Result<Self> {
        if max_fds == 0 {
            return Err(EventError::Config(
                "max_fds must be greater than 0".to_string(),
            ));
        }
        let backend = match preference.kind() {
            None => Backend::probe(max_fds)?,
            Some(kind) => Backend::open(kind, max_fds)?,
        };
        info!(
            "event handler {} ready for {} descriptors",
            backend.name(),
            max_fds
        );
        Ok(Self {
            registry: Registry::new(max_fds),
            backend,
        })
    }

    pub fn from_config(config: &EventConfig) -> Result<Self> {
        Self::new(config.max_fds, config.backend)
    }

    /// Event list backed by a caller-supplied embeddable loop.
    #[cfg(feature = "external")]
    pub fn with_reactor(max_fds: usize, reactor: Box<dyn ExternalReactor>) -> Result<Self> {
        if max_fds == 0 {
            return Err(EventError::Config(
                "max_fds must be greater than 0".to_string(),
            ));
        }
        info!("event handler libev ready for {} descriptors", max_fds);
        Ok(Self {
            registry: Registry::new(max_fds),
            backend: Backend::External(ExternalBackend::new(reactor, max_fds)),
        })
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    pub fn register(&mut self, fd: RawFd, handler: Handler<S, C>, ctx: C) -> Result<()> {
        self.registry.register(fd, handler, ctx)?;
        debug!("fd {} registered", fd);
        Ok(())
    }

    /// Interest must already be removed with [`EventList::event_del`].
    pub fn unregister(&mut self, fd: RawFd) -> Result<()> {
        self.registry.unregister(fd)?;
        debug!("fd {} unregistered", fd);
        Ok(())
    }

    pub fn node(&self, fd: RawFd) -> Option<&FdNode<S, C>> {
        self.registry.get(fd)
    }

    pub fn handler(&self, fd: RawFd) -> Option<Handler<S, C>> {
        self.registry.get(fd).map(FdNode::handler)
    }

    pub fn context(&self, fd: RawFd) -> Option<&C> {
        self.registry.get(fd).map(FdNode::context)
    }

    pub fn events(&self, fd: RawFd) -> Option<Events> {
        self.registry.get(fd).map(FdNode::events)
    }

    /// Non-blocking, close-on-exec. Call once on every descriptor before
    /// registering it.
    pub fn set_fd_flags(&self, fd: RawFd) -> Result<()> {
        fd::set_fd_flags(fd)
    }

    /// Sets the watched events of `fd`. With `*trigger == None` a new trigger
    /// is created and stored there; otherwise the existing one is updated in
    /// place. On error `trigger` is left as it was.
    pub fn event_set(
        &mut self,
        trigger: &mut Option<Trigger>,
        fd: RawFd,
        events: Events,
    ) -> Result<()> {
        let node = self.registry.node(fd)?;
        let old = node.events();
        let index = match (trigger.as_ref(), node.trigger()) {
            (None, None) => None,
            (None, Some(_)) => return Err(EventError::TriggerActive(fd)),
            (Some(t), Some(live)) if t.fd == fd && t.index == live => Some(live),
            (Some(t), _) => return Err(EventError::StaleTrigger { fd, index: t.index }),
        };

        if index.is_some() && old == events {
            return Ok(());
        }

        let index = self.backend.event_set(index, fd, old, events)?;
        self.registry.node_mut(fd)?.arm(index, events);
        *trigger = Some(Trigger { fd, index });
        Ok(())
    }

    /// Removes the interest behind `trigger` and clears it. A `None`
    /// trigger is a no-op.
    pub fn event_del(&mut self, trigger: &mut Option<Trigger>, fd: RawFd) -> Result<()> {
        let Some(t) = trigger.as_ref() else {
            return Ok(());
        };
        let node = self.registry.node(fd)?;
        if t.fd != fd || node.trigger() != Some(t.index) {
            return Err(EventError::StaleTrigger { fd, index: t.index });
        }

        self.backend.event_del(t.index, fd, node.events())?;
        self.registry.node_mut(fd)?.disarm();
        *trigger = None;
        Ok(())
    }

    /// Waits for readiness; see [`EventBackend::poll`].
    pub fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        self.backend.poll(timeout_ms)
    }

    /// Steps through the ready set of the last `poll`. Start with
    /// `Cursor::Begin`; `Cursor::End` is returned once exhausted and for
    /// every call after that.
    pub fn next_ready_index(&self, cursor: Cursor) -> Cursor {
        self.backend.next_ready(cursor)
    }

    pub fn ready_fd(&self, index: usize) -> Option<RawFd> {
        self.backend.ready_fd(index)
    }

    pub fn ready_revents(&self, index: usize) -> Events {
        self.backend.ready_revents(index)
    }

    /// `(fd, revents)` of every ready trigger from the last `poll`.
    pub fn ready(&self) -> Ready<'_> {
        Ready {
            backend: &self.backend,
            cursor: Cursor::Begin,
        }
    }

    /// Rebuilds backend kernel state (after `fork`), keeping all interest.
    pub fn reset(&mut self) -> Result<()> {
        let live = self.registry.live_interests();
        self.backend.reset(&live)
    }
}

impl<S, C: Copy> EventList<S, C> {
    pub fn lookup(&self, fd: RawFd) -> Option<(Handler<S, C>, C)> {
        self.registry
            .get(fd)
            .map(|node| (node.handler(), *node.context()))
    }
}

pub struct Ready<'a> {
    backend: &'a Backend,
    cursor: Cursor,
}

impl Iterator for Ready<'_> {
    type Item = (RawFd, Events);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.cursor = self.backend.next_ready(self.cursor);
            let index = self.cursor.index()?;
            if let Some(fd) = self.backend.ready_fd(index) {
                return Some((fd, self.backend.ready_revents(index)));
            }
        }
    }
}
