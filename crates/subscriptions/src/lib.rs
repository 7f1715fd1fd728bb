//! Event subscription manager.
//!
//! Maintains at most one live Core event stream per submitted item and fans
//! typed events out to registered handlers. Terminal events tear the stream
//! down from the inside; a grace window keeps just-closed items around long
//! enough to suppress transport errors racing the close.

mod event;
mod manager;

pub use {
    event::{EventKind, EventPayload, ItemEvent},
    manager::{EventHandler, SubscriptionManager},
};
