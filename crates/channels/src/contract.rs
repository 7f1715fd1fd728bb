use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::Result, kind::ChannelKind, message::InboundMessage};

/// Receives every normalized inbound message from a channel.
///
/// The bridge registers exactly one sink per channel; transports invoke it
/// once per message with no ordering guarantee relative to other channels.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn handle(&self, message: InboundMessage);
}

/// One platform transport (polling loop or webhook receiver).
///
/// Implementations live outside this workspace; the bridge drives them
/// purely through this contract.
#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Begin receiving messages. Calling `start` while already running must
    /// not spawn a second receive loop; failure surfaces as an error, never
    /// a panic.
    async fn start(&self) -> Result<()>;

    /// Cease receiving and release transport resources. Best-effort: the
    /// caller logs failures instead of escalating them.
    async fn stop(&self) -> Result<()>;

    /// Register the single inbound sink, replacing any previous one.
    fn on_message(&self, sink: Arc<dyn InboundSink>);

    /// Deliver a plain-text message to a platform chat.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Cheap liveness probe. `Err` means the probe itself failed, which
    /// callers treat as unhealthy.
    async fn health_check(&self) -> Result<bool>;
}
