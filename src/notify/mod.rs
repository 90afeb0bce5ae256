//! Change notification fan-out
//!
//! Observers learn that new data landed (or that settings were reset)
//! without polling the store. Each pipeline owns its own hub; there is no
//! process-wide instance.

mod events;
mod hub;

pub use events::{Notification, NotificationKind};
pub use hub::{NotificationHub, RecvError, Subscription};
