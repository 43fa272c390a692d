pub mod backend;
pub mod event;
pub mod event_list;
pub mod event_loop;
pub mod poller;
pub mod registry;

pub use backend::Cursor;
pub use event::{Events, Handler, HandlerStatus};
pub use event_list::{EventList, Trigger};
pub use event_loop::{poll_and_dispatch, DispatchStats, EventSource};
pub use poller::{BackendKind, BackendPreference};
