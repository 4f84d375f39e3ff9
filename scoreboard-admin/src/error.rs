use crate::channel::ChannelError;
use scoreboard_common::time_format::ClockTextError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Connection problem: {0}")]
    Connection(#[from] ChannelError),
    #[error("The server rejected a commit made against a stale revision")]
    Conflict,
    #[error("Invalid input: {0}")]
    Validation(#[from] ClockTextError),
    #[error("The server replied with status {status}")]
    Protocol { status: u16 },
    #[error("Malformed payload from the server: {0}")]
    Contract(#[from] serde_json::Error),
}

impl SyncError {
    /// Errors that go away on their own once the connection or the server recovers
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Conflict | Self::Protocol { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
