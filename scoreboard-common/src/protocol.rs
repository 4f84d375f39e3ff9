//! Messages exchanged between a scoreboard client and the server.
//!
//! There are two request/response exchanges, `sync` and `update`, and two unsolicited
//! broadcasts from the server, `update` and `ping`.

use crate::state::{Revision, ScoreboardState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CONFLICT: u16 = 409;

/// The two connection parameters handed to a client out-of-band
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub uuid: String,
}

pub type SyncRequest = Credentials;

/// Reply to a `sync` request. `resp` is a [`Snapshot`] when `status` is 200, and is free-form
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: u16,
    #[serde(default)]
    pub resp: Value,
}

/// The authoritative record as the server sends it, both in `sync` replies and in `update`
/// broadcasts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub rev: Revision,
    pub home: u32,
    pub away: u32,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_team: Option<String>,
}

impl From<&ScoreboardState> for Snapshot {
    fn from(state: &ScoreboardState) -> Self {
        Self {
            rev: state.revision.clone(),
            home: state.scores.home,
            away: state.scores.away,
            paused: state.paused,
            remaining: Some(state.remaining.into()),
            home_team: Some(state.team_names.home.clone()),
            away_team: Some(state.team_names.away.clone()),
        }
    }
}

/// The cheap commit sent for score taps: only the scores and the pause flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalUpdate {
    pub home: u32,
    pub away: u32,
    pub paused: bool,
    pub signage: bool,
}

/// A commit carrying everything another client needs to redraw the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullUpdate {
    #[serde(flatten)]
    pub base: MinimalUpdate,
    pub remaining: u32,
    pub home_team: String,
    pub away_team: String,
    pub slides: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Update {
    // `Full` must be tried first, a full payload is also a valid minimal one
    Full(FullUpdate),
    Minimal(MinimalUpdate),
}

impl Update {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn base(&self) -> &MinimalUpdate {
        match self {
            Self::Full(full) => &full.base,
            Self::Minimal(minimal) => minimal,
        }
    }
}

/// An `update` request. `rev` is the last revision the client saw, the server rejects the
/// commit with a 409 if it no longer matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub rev: Revision,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(flatten)]
    pub update: Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Sync(SyncRequest),
    Commit(CommitRequest),
}

/// A line sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientFrame {
    Sync { id: u64, data: SyncRequest },
    Update { id: u64, data: CommitRequest },
}

impl ClientFrame {
    pub fn new(id: u64, request: Request) -> Self {
        match request {
            Request::Sync(data) => Self::Sync { id, data },
            Request::Commit(data) => Self::Update { id, data },
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Sync { id, .. } | Self::Update { id, .. } => *id,
        }
    }
}

/// A line sent from server to client: either the reply to request `id`, or a broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerFrame {
    Ack {
        id: u64,
        #[serde(default)]
        data: Value,
    },
    Update {
        data: Value,
    },
    Ping {
        #[serde(default)]
        data: Value,
    },
}
