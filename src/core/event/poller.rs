use crate::common::error::{EventError, Result};
use crate::core::event::backend::{Cursor, EventBackend};
use crate::core::event::event::Events;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::unix::io::RawFd;
use std::str::FromStr;

#[cfg(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))]
use crate::core::event::backend::devpoll::DevpollBackend;
#[cfg(all(feature = "epoll", any(target_os = "linux", target_os = "android")))]
use crate::core::event::backend::epoll::EpollBackend;
#[cfg(feature = "external")]
use crate::core::event::backend::external::ExternalBackend;
#[cfg(all(
    feature = "kqueue",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )
))]
use crate::core::event::backend::kqueue::KqueueBackend;
#[cfg(all(feature = "poll", unix))]
use crate::core::event::backend::poll::PollBackend;
#[cfg(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))]
use crate::core::event::backend::port::PortBackend;
#[cfg(all(feature = "select", unix))]
use crate::core::event::backend::select::SelectBackend;

/// Readiness-notification mechanisms, in auto-detect priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    LinuxSysepoll,
    FreebsdKqueue,
    SolarisEventports,
    SolarisDevpoll,
    Poll,
    Select,
    Libev,
}

impl BackendKind {
    const PRIORITY: [BackendKind; 7] = [
        BackendKind::LinuxSysepoll,
        BackendKind::FreebsdKqueue,
        BackendKind::SolarisEventports,
        BackendKind::SolarisDevpoll,
        BackendKind::Poll,
        BackendKind::Select,
        BackendKind::Libev,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::LinuxSysepoll => "linux-sysepoll",
            BackendKind::FreebsdKqueue => "freebsd-kqueue",
            BackendKind::SolarisEventports => "solaris-eventports",
            BackendKind::SolarisDevpoll => "solaris-devpoll",
            BackendKind::Poll => "poll",
            BackendKind::Select => "select",
            BackendKind::Libev => "libev",
        }
    }

    pub fn is_compiled(self) -> bool {
        match self {
            BackendKind::LinuxSysepoll => {
                cfg!(all(feature = "epoll", any(target_os = "linux", target_os = "android")))
            }
            BackendKind::FreebsdKqueue => cfg!(all(
                feature = "kqueue",
                any(
                    target_os = "macos",
                    target_os = "ios",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                )
            )),
            BackendKind::SolarisEventports => {
                cfg!(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))
            }
            BackendKind::SolarisDevpoll => {
                cfg!(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))
            }
            BackendKind::Poll => cfg!(all(feature = "poll", unix)),
            BackendKind::Select => cfg!(all(feature = "select", unix)),
            BackendKind::Libev => cfg!(feature = "external"),
        }
    }

    /// Every mechanism compiled into this build, best first.
    pub fn available() -> Vec<BackendKind> {
        Self::PRIORITY
            .into_iter()
            .filter(|kind| kind.is_compiled())
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which mechanism an event list should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    #[default]
    Auto,
    Select,
    Poll,
    LinuxSysepoll,
    SolarisDevpoll,
    FreebsdKqueue,
    SolarisEventports,
    Libev,
}

impl BackendPreference {
    pub fn kind(self) -> Option<BackendKind> {
        match self {
            BackendPreference::Auto => None,
            BackendPreference::Select => Some(BackendKind::Select),
            BackendPreference::Poll => Some(BackendKind::Poll),
            BackendPreference::LinuxSysepoll => Some(BackendKind::LinuxSysepoll),
            BackendPreference::SolarisDevpoll => Some(BackendKind::SolarisDevpoll),
            BackendPreference::FreebsdKqueue => Some(BackendKind::FreebsdKqueue),
            BackendPreference::SolarisEventports => Some(BackendKind::SolarisEventports),
            BackendPreference::Libev => Some(BackendKind::Libev),
        }
    }
}

impl From<BackendKind> for BackendPreference {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Select => BackendPreference::Select,
            BackendKind::Poll => BackendPreference::Poll,
            BackendKind::LinuxSysepoll => BackendPreference::LinuxSysepoll,
            BackendKind::SolarisDevpoll => BackendPreference::SolarisDevpoll,
            BackendKind::FreebsdKqueue => BackendPreference::FreebsdKqueue,
            BackendKind::SolarisEventports => BackendPreference::SolarisEventports,
            BackendKind::Libev => BackendPreference::Libev,
        }
    }
}

impl FromStr for BackendPreference {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "auto" {
            return Ok(BackendPreference::Auto);
        }
        BackendKind::PRIORITY
            .into_iter()
            .find(|kind| kind.name() == s)
            .map(BackendPreference::from)
            .ok_or_else(|| {
                let names: Vec<&str> = BackendKind::PRIORITY.iter().map(|k| k.name()).collect();
                EventError::Config(format!(
                    "unknown event handler '{}', expected auto or one of {:?}",
                    s, names
                ))
            })
    }
}

/// The one live mechanism of an event list.
pub enum Backend {
    #[cfg(all(feature = "select", unix))]
    Select(SelectBackend),
    #[cfg(all(feature = "poll", unix))]
    Poll(PollBackend),
    #[cfg(all(feature = "epoll", any(target_os = "linux", target_os = "android")))]
    Epoll(EpollBackend),
    #[cfg(all(
        feature = "kqueue",
        any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )
    ))]
    Kqueue(KqueueBackend),
    #[cfg(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))]
    Devpoll(DevpollBackend),
    #[cfg(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))]
    Port(PortBackend),
    #[cfg(feature = "external")]
    External(ExternalBackend),
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            #[cfg(all(feature = "select", unix))]
            Backend::Select($b) => $body,
            #[cfg(all(feature = "poll", unix))]
            Backend::Poll($b) => $body,
            #[cfg(all(feature = "epoll", any(target_os = "linux", target_os = "android")))]
            Backend::Epoll($b) => $body,
            #[cfg(all(
                feature = "kqueue",
                any(
                    target_os = "macos",
                    target_os = "ios",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                )
            ))]
            Backend::Kqueue($b) => $body,
            #[cfg(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))]
            Backend::Devpoll($b) => $body,
            #[cfg(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))]
            Backend::Port($b) => $body,
            #[cfg(feature = "external")]
            Backend::External($b) => $body,
        }
    };
}

impl Backend {
    /// Opens one specific mechanism. The external reactor cannot be opened
    /// this way since it needs a caller-supplied loop.
    pub fn open(kind: BackendKind, max_fds: usize) -> Result<Self> {
        if !kind.is_compiled() {
            return Err(EventError::Unavailable(format!(
                "{} is not supported on this platform or build",
                kind
            )));
        }
        match kind {
            #[cfg(all(feature = "select", unix))]
            BackendKind::Select => Ok(Backend::Select(SelectBackend::new(max_fds)?)),
            #[cfg(all(feature = "poll", unix))]
            BackendKind::Poll => Ok(Backend::Poll(PollBackend::new(max_fds))),
            #[cfg(all(feature = "epoll", any(target_os = "linux", target_os = "android")))]
            BackendKind::LinuxSysepoll => Ok(Backend::Epoll(EpollBackend::new(max_fds)?)),
            #[cfg(all(
                feature = "kqueue",
                any(
                    target_os = "macos",
                    target_os = "ios",
                    target_os = "freebsd",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "dragonfly"
                )
            ))]
            BackendKind::FreebsdKqueue => Ok(Backend::Kqueue(KqueueBackend::new(max_fds)?)),
            #[cfg(all(feature = "devpoll", any(target_os = "solaris", target_os = "illumos")))]
            BackendKind::SolarisDevpoll => Ok(Backend::Devpoll(DevpollBackend::new(max_fds)?)),
            #[cfg(all(feature = "port", any(target_os = "solaris", target_os = "illumos")))]
            BackendKind::SolarisEventports => Ok(Backend::Port(PortBackend::new(max_fds)?)),
            BackendKind::Libev => Err(EventError::Unavailable(
                "libev needs an external reactor, use EventList::with_reactor".to_string(),
            )),
            #[allow(unreachable_patterns)]
            _ => Err(EventError::Unavailable(kind.to_string())),
        }
    }

    /// Tries every compiled-in mechanism in priority order.
    pub fn probe(max_fds: usize) -> Result<Self> {
        for kind in BackendKind::available() {
            if kind == BackendKind::Libev {
                continue;
            }
            match Self::open(kind, max_fds) {
                Ok(backend) => return Ok(backend),
                Err(e) => debug!("event handler {} unusable, trying next: {}", kind, e),
            }
        }
        Err(EventError::Unavailable(
            "no usable event handler for this platform".to_string(),
        ))
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// The poll backend's slot table, for inspecting slot reuse.
    #[cfg(all(feature = "poll", unix))]
    pub fn as_poll(&self) -> Option<&PollBackend> {
        match self {
            Backend::Poll(b) => Some(b),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl EventBackend for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn event_set(
        &mut self,
        index: Option<usize>,
        fd: RawFd,
        old: Events,
        events: Events,
    ) -> Result<usize> {
        dispatch!(self, b => b.event_set(index, fd, old, events))
    }

    fn event_del(&mut self, index: usize, fd: RawFd, old: Events) -> Result<()> {
        dispatch!(self, b => b.event_del(index, fd, old))
    }

    fn poll(&mut self, timeout_ms: i32) -> Result<usize> {
        dispatch!(self, b => b.poll(timeout_ms))
    }

    fn next_ready(&self, cursor: Cursor) -> Cursor {
        dispatch!(self, b => b.next_ready(cursor))
    }

    fn ready_fd(&self, index: usize) -> Option<RawFd> {
        dispatch!(self, b => b.ready_fd(index))
    }

    fn ready_revents(&self, index: usize) -> Events {
        dispatch!(self, b => b.ready_revents(index))
    }

    fn reset(&mut self, live: &[(RawFd, Events)]) -> Result<()> {
        dispatch!(self, b => b.reset(live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_names() {
        assert_eq!("auto".parse::<BackendPreference>().unwrap(), BackendPreference::Auto);
        assert_eq!(
            "linux-sysepoll".parse::<BackendPreference>().unwrap(),
            BackendPreference::LinuxSysepoll
        );
        assert_eq!(
            "poll".parse::<BackendPreference>().unwrap().kind(),
            Some(BackendKind::Poll)
        );
        assert!("rtsig".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn test_available_in_priority_order() {
        let kinds = BackendKind::available();
        assert!(!kinds.is_empty());
        let positions: Vec<usize> = kinds
            .iter()
            .map(|k| BackendKind::PRIORITY.iter().position(|p| p == k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        #[cfg(target_os = "linux")]
        assert_eq!(kinds[0], BackendKind::LinuxSysepoll);
    }

    #[test]
    fn test_probe_picks_best() {
        let backend = Backend::probe(64).unwrap();
        let expected = BackendKind::available()
            .into_iter()
            .find(|k| *k != BackendKind::Libev)
            .unwrap();
        assert_eq!(backend.kind(), expected);
    }

    #[test]
    fn test_open_unavailable() {
        let err = Backend::open(BackendKind::Libev, 16).err().unwrap();
        assert!(matches!(err, EventError::Unavailable(_)));

        #[cfg(target_os = "linux")]
        {
            let err = Backend::open(BackendKind::FreebsdKqueue, 16).err().unwrap();
            assert!(matches!(err, EventError::Unavailable(_)));
        }
    }
}
