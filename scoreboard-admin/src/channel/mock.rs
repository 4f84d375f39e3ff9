use super::{Channel, ChannelError};
use scoreboard_common::{
    protocol::{
        CommitRequest, Credentials, Request, STATUS_CONFLICT, STATUS_OK, Snapshot, Update,
    },
    state::Revision,
};
use serde_json::{Value, json};
use std::{collections::VecDeque, future::Future, sync::Mutex};

/// An in-memory stand-in for the scoreboard server.
///
/// Accepts a commit only if it was made against the current revision, and queues a broadcast
/// for every accepted commit. Replies can also be scripted, those take priority.
#[derive(Debug)]
pub struct FakeServer {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    credentials: Credentials,
    record: Snapshot,
    next_rev: u32,
    connected: bool,
    scripted: VecDeque<Result<Value, ChannelError>>,
    sent: Vec<Request>,
    broadcasts: Vec<Value>,
}

impl FakeServer {
    pub fn new(credentials: Credentials, record: Snapshot) -> Self {
        Self {
            inner: Mutex::new(Inner {
                credentials,
                record,
                next_rev: 1,
                connected: true,
                scripted: VecDeque::new(),
                sent: Vec::new(),
                broadcasts: Vec::new(),
            }),
        }
    }

    pub fn record(&self) -> Snapshot {
        self.inner.lock().unwrap().record.clone()
    }

    pub fn revision(&self) -> Revision {
        self.record().rev
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().unwrap().connected = connected;
    }

    /// The next request gets `reply` instead of the normal handling
    pub fn script_reply(&self, reply: Value) {
        self.inner.lock().unwrap().scripted.push_back(Ok(reply));
    }

    /// The next request fails with `error`, as if the link had
    pub fn script_error(&self, error: ChannelError) {
        self.inner.lock().unwrap().scripted.push_back(Err(error));
    }

    /// Simulates another client committing successfully
    pub fn commit_elsewhere(&self, change: impl FnOnce(&mut Snapshot)) -> Value {
        let mut inner = self.inner.lock().unwrap();
        change(&mut inner.record);
        inner.bump_revision();
        let broadcast = serde_json::to_value(&inner.record).unwrap();
        inner.broadcasts.push(broadcast.clone());
        broadcast
    }

    pub fn sent(&self) -> Vec<Request> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn sent_commits(&self) -> Vec<CommitRequest> {
        self.sent()
            .into_iter()
            .filter_map(|r| match r {
                Request::Commit(c) => Some(c),
                Request::Sync(_) => None,
            })
            .collect()
    }

    pub fn sync_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|r| matches!(r, Request::Sync(_)))
            .count()
    }

    pub fn take_broadcasts(&self) -> Vec<Value> {
        std::mem::take(&mut self.inner.lock().unwrap().broadcasts)
    }
}

impl Inner {
    fn bump_revision(&mut self) {
        self.record.rev = Revision::from(format!("r{}", self.next_rev));
        self.next_rev += 1;
    }

    fn handle(&mut self, request: Request) -> Result<Value, ChannelError> {
        self.sent.push(request.clone());
        if let Some(reply) = self.scripted.pop_front() {
            return reply;
        }

        Ok(match request {
            Request::Sync(credentials) => {
                if credentials != self.credentials {
                    return Ok(json!({"status": 401, "resp": "unknown board"}));
                }
                json!({"status": STATUS_OK, "resp": self.record})
            }
            Request::Commit(commit) => {
                if commit.credentials != self.credentials {
                    return Ok(json!({"status": 401}));
                }
                if commit.rev != self.record.rev {
                    return Ok(json!({"status": STATUS_CONFLICT}));
                }

                let base = commit.update.base();
                self.record.home = base.home;
                self.record.away = base.away;
                self.record.paused = base.paused;
                if let Update::Full(full) = &commit.update {
                    self.record.remaining = Some(full.remaining.into());
                    self.record.home_team = Some(full.home_team.clone());
                    self.record.away_team = Some(full.away_team.clone());
                }
                self.bump_revision();
                let broadcast = serde_json::to_value(&self.record).unwrap();
                self.broadcasts.push(broadcast);
                json!({"status": STATUS_OK})
            }
        })
    }
}

impl Channel for FakeServer {
    fn request(&self, request: Request) -> impl Future<Output = Result<Value, ChannelError>> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if inner.connected {
                inner.handle(request)
            } else {
                Err(ChannelError::Disconnected)
            }
        };
        async move { result }
    }
}
