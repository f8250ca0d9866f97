/// Shared error type used across all voicegate crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// A turn was superseded or the session closed.
    #[error("cancelled")]
    Cancelled,

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Failure writing to the session transport.
    #[error("transport: {0}")]
    Transport(String),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// `Cancelled` and `Timeout` are handled identically at the session
    /// boundary: roll back, stay silent, let the transport re-request.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
