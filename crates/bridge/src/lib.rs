//! Channel orchestrator.
//!
//! [`ChannelBridge`] owns the channel registry, the inbound-message pipeline
//! (command dispatch, attachment validation, item submission), the transient
//! item↔chat mapping, and the wiring that turns asynchronous Core events
//! back into chat notifications. Everything inside the pipeline and the
//! event-dispatch path is a fault-isolation cell: errors are logged and
//! answered with a localized message, never propagated into a transport.

mod bridge;
mod commands;
mod config;
mod error;
mod events;
mod pipeline;
mod validation;

pub use {
    bridge::{ChannelBridge, ChannelStatusReport, ChatRef, DeliveryReport, HealthState},
    config::BridgeConfig,
    error::{Error, Result},
};
