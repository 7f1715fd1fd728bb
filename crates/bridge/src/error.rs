use courier_channels::ChannelKind;

/// Result type for the bridge management API.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the management API (register/unregister/restart).
///
/// These are programmer-facing; user-facing failures never leave the
/// pipeline as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("channel already registered: {kind}")]
    DuplicateChannel { kind: ChannelKind },

    #[error("channel not registered: {kind}")]
    ChannelNotFound { kind: ChannelKind },

    #[error("channel start failed")]
    Start {
        #[source]
        source: courier_channels::Error,
    },
}
