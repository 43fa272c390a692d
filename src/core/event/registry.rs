use crate::common::error::{EventError, Result};
use crate::core::event::event::{Events, Handler};
use std::os::unix::io::RawFd;

/// One registered descriptor.
pub struct FdNode<S, C> {
    handler: Handler<S, C>,
    ctx: C,
    fd: RawFd,
    events: Events,
    trigger: Option<usize>,
}

impl<S, C> FdNode<S, C> {
    pub fn handler(&self) -> Handler<S, C> {
        self.handler
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Mask currently subscribed through the backend.
    pub fn events(&self) -> Events {
        self.events
    }

    /// Backend slot of the live trigger, if any.
    pub fn trigger(&self) -> Option<usize> {
        self.trigger
    }

    pub(crate) fn arm(&mut self, index: usize, events: Events) {
        self.trigger = Some(index);
        self.events = events;
    }

    pub(crate) fn disarm(&mut self) {
        self.trigger = None;
        self.events = Events::NONE;
    }
}

/// Fixed-capacity table of registrations, indexed by descriptor number.
pub struct Registry<S, C> {
    nodes: Vec<Option<FdNode<S, C>>>,
    len: usize,
}

impl<S, C> Registry<S, C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: (0..capacity).map(|_| None).collect(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, fd: RawFd) -> Result<usize> {
        if fd < 0 || fd as usize >= self.nodes.len() {
            return Err(EventError::OutOfRange {
                fd,
                capacity: self.nodes.len(),
            });
        }
        Ok(fd as usize)
    }

    pub fn register(&mut self, fd: RawFd, handler: Handler<S, C>, ctx: C) -> Result<()> {
        let slot = self.slot(fd)?;
        if self.nodes[slot].is_some() {
            return Err(EventError::AlreadyRegistered(fd));
        }
        self.nodes[slot] = Some(FdNode {
            handler,
            ctx,
            fd,
            events: Events::NONE,
            trigger: None,
        });
        self.len += 1;
        Ok(())
    }

    /// Fails while the descriptor still has a live trigger.
    pub fn unregister(&mut self, fd: RawFd) -> Result<FdNode<S, C>> {
        let slot = self.slot(fd)?;
        match &self.nodes[slot] {
            None => return Err(EventError::NotRegistered(fd)),
            Some(node) if node.trigger.is_some() => return Err(EventError::TriggerActive(fd)),
            Some(_) => {}
        }
        self.len -= 1;
        self.nodes[slot]
            .take()
            .ok_or(EventError::NotRegistered(fd))
    }

    pub fn get(&self, fd: RawFd) -> Option<&FdNode<S, C>> {
        let slot = self.slot(fd).ok()?;
        self.nodes[slot].as_ref()
    }

    /// Like `get`, but says why nothing was found.
    pub fn node(&self, fd: RawFd) -> Result<&FdNode<S, C>> {
        let slot = self.slot(fd)?;
        self.nodes[slot]
            .as_ref()
            .ok_or(EventError::NotRegistered(fd))
    }

    pub(crate) fn node_mut(&mut self, fd: RawFd) -> Result<&mut FdNode<S, C>> {
        let slot = self.slot(fd)?;
        self.nodes[slot]
            .as_mut()
            .ok_or(EventError::NotRegistered(fd))
    }

    /// `(fd, mask)` of every descriptor with a live trigger.
    pub fn live_interests(&self) -> Vec<(RawFd, Events)> {
        self.nodes
            .iter()
            .flatten()
            .filter(|node| node.trigger.is_some())
            .map(|node| (node.fd, node.events))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::event::HandlerStatus;

    fn noop(_: &mut (), _: u32, _: Events) -> HandlerStatus {
        HandlerStatus::GoOn
    }

    fn other(_: &mut (), _: u32, _: Events) -> HandlerStatus {
        HandlerStatus::Finished
    }

    #[test]
    fn test_register_lookup() {
        let mut registry: Registry<(), u32> = Registry::new(4);
        for fd in 0..4 {
            registry.register(fd, noop, fd as u32 * 10).unwrap();
        }
        assert_eq!(registry.len(), 4);
        for fd in 0..4 {
            let node = registry.get(fd).unwrap();
            assert_eq!(node.fd(), fd);
            assert_eq!(*node.context(), fd as u32 * 10);
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut registry: Registry<(), u32> = Registry::new(4);
        assert!(matches!(
            registry.register(4, noop, 0),
            Err(EventError::OutOfRange { fd: 4, capacity: 4 })
        ));
        assert!(matches!(
            registry.register(-1, noop, 0),
            Err(EventError::OutOfRange { .. })
        ));
        assert!(registry.get(-1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_double_register_keeps_first() {
        let mut registry: Registry<(), u32> = Registry::new(4);
        registry.register(2, noop, 1).unwrap();
        assert!(matches!(
            registry.register(2, other, 2),
            Err(EventError::AlreadyRegistered(2))
        ));
        let node = registry.get(2).unwrap();
        assert_eq!(*node.context(), 1);
        assert_eq!(node.handler()(&mut (), 0, Events::IN), HandlerStatus::GoOn);
    }

    #[test]
    fn test_unregister_requires_disarmed() {
        let mut registry: Registry<(), u32> = Registry::new(4);
        assert!(matches!(
            registry.unregister(1),
            Err(EventError::NotRegistered(1))
        ));

        registry.register(1, noop, 0).unwrap();
        registry.node_mut(1).unwrap().arm(0, Events::IN);
        assert_eq!(registry.live_interests(), vec![(1, Events::IN)]);
        assert!(matches!(
            registry.unregister(1),
            Err(EventError::TriggerActive(1))
        ));

        registry.node_mut(1).unwrap().disarm();
        let node = registry.unregister(1).unwrap();
        assert_eq!(node.fd(), 1);
        assert!(registry.get(1).is_none());
        assert!(registry.is_empty());
    }
}
