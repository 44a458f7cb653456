use thiserror::Error;

/// Why a list server operation did not succeed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rejected locally before any I/O because a required setting is missing
    #[error("misconfigured: {0}")]
    Configuration(&'static str),
    /// Rejected locally because another request for the same instance is outstanding
    #[error("another list server request is still in flight")]
    Busy,
    /// The request never produced an HTTP response
    #[error("transport failure: {0}")]
    Transport(String),
    /// The list server answered with something other than 200
    #[error("list server rejected request with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// A list response could not be parsed
    #[error("malformed server list: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match *self {
            Error::Status { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Whether the failure happened on the network or at the list server, as opposed to being a
    /// local rejection
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Status { .. })
    }
}
