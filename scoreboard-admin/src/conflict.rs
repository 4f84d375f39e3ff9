use crate::{
    error::{Result, SyncError},
    state_store::LocalStateStore,
};
use log::*;
use scoreboard_common::protocol::{
    CommitResponse, STATUS_CONFLICT, STATUS_OK, Snapshot, SyncResponse,
};
use serde_json::Value;

/// What to do after the server answered a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The optimistic values are final, no echo is awaited
    Accepted,
    /// The commit was made against a stale revision and was dropped. Fetch the full record.
    Resync,
    /// The server refused the commit for another reason. Nothing more is attempted.
    Rejected { status: u16 },
}

/// What to do with the reply to a `sync` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    /// Overwrite the local board with the record
    Apply(Snapshot),
    /// The server's record has never had a clock set. Overwrite the local board with what
    /// there is, then push the whole local board to initialise it.
    ApplyAndSeed(Snapshot),
}

/// Decides how the client converges on the server's record after commits and syncs.
///
/// Nothing is merged: a conflict always ends with the local board replaced by a fresh copy of
/// the server's.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    conflicts: u64,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits rejected as conflicts so far
    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    pub fn on_commit_response(
        &mut self,
        response: CommitResponse,
        store: &mut LocalStateStore,
    ) -> Resolution {
        match response.status {
            STATUS_OK => {
                trace!("Commit accepted");
                store.settle_pending();
                Resolution::Accepted
            }
            STATUS_CONFLICT => {
                self.conflicts += 1;
                let dropped = store.discard_pending();
                warn!(
                    "Commit against revision {} conflicted, resyncing. Dropped {dropped:?}",
                    store.revision()
                );
                Resolution::Resync
            }
            status => {
                warn!("Commit rejected with status {status}");
                store.discard_pending();
                Resolution::Rejected { status }
            }
        }
    }

    pub fn on_sync_response(&mut self, response: SyncResponse) -> Result<SyncDecision> {
        if response.status != STATUS_OK {
            warn!("Cannot sync {}: {}", response.status, response.resp);
            return Err(SyncError::Protocol {
                status: response.status,
            });
        }

        let snapshot = parse_snapshot(response.resp)?;
        if snapshot.remaining.is_none() {
            info!("Server has no clock for this board yet, it will be seeded");
            Ok(SyncDecision::ApplyAndSeed(snapshot))
        } else {
            Ok(SyncDecision::Apply(snapshot))
        }
    }

    /// Broadcasts are always applied in arrival order, whoever sent the commit behind them
    pub fn on_broadcast(&mut self, data: Value) -> Result<Snapshot> {
        parse_snapshot(data)
    }
}

fn parse_snapshot(data: Value) -> Result<Snapshot> {
    serde_json::from_value(data.clone()).map_err(|e| {
        warn!("Discarding malformed snapshot {data}: {e}");
        SyncError::Contract(e)
    })
}
