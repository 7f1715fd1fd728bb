//! Channel capability contract.
//!
//! Each supported chat platform (Telegram, Lark, WeWork) is driven through
//! the [`Channel`] trait. The bridge never branches on transport kind except
//! to select a registered instance, so adding a platform means implementing
//! the contract, not touching routing logic.

pub mod contract;
pub mod error;
pub mod kind;
pub mod message;

pub use {
    contract::{Channel, InboundSink},
    error::{Error, Result},
    kind::ChannelKind,
    message::{Attachment, AttachmentKind, ContentType, InboundMessage},
};
