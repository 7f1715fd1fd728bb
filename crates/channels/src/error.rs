/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel implementations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A string did not name a supported channel kind.
    #[error("unknown channel kind: {value}")]
    UnknownKind { value: String },

    /// The underlying transport rejected an operation.
    #[error("channel transport failed: {message}")]
    Transport { message: String },

    /// The channel is not in a state to perform the operation.
    #[error("channel unavailable: {message}")]
    Unavailable { message: String },
}

impl Error {
    #[must_use]
    pub fn unknown_kind(value: impl std::fmt::Display) -> Self {
        Self::UnknownKind {
            value: value.to_string(),
        }
    }

    #[must_use]
    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }
}
