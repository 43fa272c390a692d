use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Readiness conditions a descriptor can be watched for or reported with.
///
/// Bit values follow the `FDEVENT_*` layout: IN, PRI, OUT, ERR, HUP, NVAL.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Events(u8);

impl Events {
    pub const NONE: Events = Events(0);
    pub const IN: Events = Events(1 << 0);
    pub const PRI: Events = Events(1 << 1);
    pub const OUT: Events = Events(1 << 2);
    pub const ERR: Events = Events(1 << 3);
    pub const HUP: Events = Events(1 << 4);
    pub const NVAL: Events = Events(1 << 5);

    const ALL: u8 = 0x3f;

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Events {
        Events(bits & Self::ALL)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_readable(self) -> bool {
        self.intersects(Events::IN | Events::PRI)
    }

    pub fn is_writable(self) -> bool {
        self.contains(Events::OUT)
    }

    pub fn is_error(self) -> bool {
        self.intersects(Events::ERR | Events::NVAL)
    }

    pub fn is_hangup(self) -> bool {
        self.contains(Events::HUP)
    }

    /// Translates to `poll(2)` flags (shared by poll and /dev/poll).
    pub fn to_poll(self) -> libc::c_short {
        let mut flags = 0;
        if self.contains(Events::IN) {
            flags |= libc::POLLIN;
        }
        if self.contains(Events::PRI) {
            flags |= libc::POLLPRI;
        }
        if self.contains(Events::OUT) {
            flags |= libc::POLLOUT;
        }
        flags
    }

    pub fn from_poll(revents: libc::c_short) -> Events {
        let mut events = Events::NONE;
        if revents & libc::POLLIN != 0 {
            events |= Events::IN;
        }
        if revents & libc::POLLPRI != 0 {
            events |= Events::PRI;
        }
        if revents & libc::POLLOUT != 0 {
            events |= Events::OUT;
        }
        if revents & libc::POLLERR != 0 {
            events |= Events::ERR;
        }
        if revents & libc::POLLHUP != 0 {
            events |= Events::HUP;
        }
        if revents & libc::POLLNVAL != 0 {
            events |= Events::NVAL;
        }
        events
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Events {
    type Output = Events;

    fn bitand(self, rhs: Events) -> Events {
        Events(self.0 & rhs.0)
    }
}

impl Not for Events {
    type Output = Events;

    fn not(self) -> Events {
        Events(!self.0 & Self::ALL)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Events, &str); 6] = [
            (Events::IN, "IN"),
            (Events::PRI, "PRI"),
            (Events::OUT, "OUT"),
            (Events::ERR, "ERR"),
            (Events::HUP, "HUP"),
            (Events::NVAL, "NVAL"),
        ];
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// What a handler wants the loop to know after processing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// Nothing more to do for this round.
    GoOn,
    /// The descriptor's work is complete.
    Finished,
    /// Interest must change; the handler (or its owner) calls `event_set`.
    WaitForEvent,
    Error,
}

/// Called with the server context, the per-fd context given at registration,
/// and the triggered events.
pub type Handler<S, C> = fn(&mut S, C, Events) -> HandlerStatus;
