use scoreboard_common::protocol::Request;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tokio::{io, time::Duration};

pub mod tcp;

#[cfg(test)]
pub mod mock;

/// A bidirectional connection to the scoreboard server.
///
/// Replies to requests come back through the returned future. Unsolicited messages from the
/// server are delivered separately as [`ChannelEvent`]s.
pub trait Channel {
    /// Sends `request` and resolves to the `data` of the server's reply
    fn request(&self, request: Request) -> impl Future<Output = Result<Value, ChannelError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connection was (re-)established. The server's record must be fetched again.
    Connected,
    Disconnected,
    /// A commit from any client, this one included, was accepted
    Update(Value),
    Ping,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Not connected to the server")]
    Disconnected,
    #[error("No reply received within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
    #[error("The connection task has stopped")]
    Closed,
}
