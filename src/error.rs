//! Error taxonomy shared by list state, the socket lifecycle and the HTTP layer
//!
//! Every variant is `Clone` so that the most recent failure can be stored in list state and
//! surfaced to the caller without consuming it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A paginated fetch failed; the same page can be retried
    #[error("failed to fetch page {page}: {message}")]
    Fetch { page: u32, message: String },
    /// A single-item action (like, edit, delete, reply) failed
    #[error("failed to update item {id}: {message}")]
    Mutation { id: String, message: String },
    /// The bearer token expired mid-session
    #[error("access token expired: {0}")]
    AuthExpired(String),
    /// Token refresh failed; a full re-authentication is required
    #[error("session lost: {0}")]
    SessionLost(String),
    /// Socket connection or reauthentication failure
    #[error("socket error: {0}")]
    Socket(String),
    /// A response arrived after its epoch or owner was gone
    #[error("stale response discarded")]
    StaleResponse,
}

impl Error {
    /// Whether the failure is retryable by re-issuing the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Socket(_))
    }

    /// Whether the failure must be handed to the enclosing application shell
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Error::SessionLost(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
