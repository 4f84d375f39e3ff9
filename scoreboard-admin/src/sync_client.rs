use crate::{
    channel::{Channel, ChannelError, ChannelEvent},
    conflict::{ConflictResolver, Resolution, SyncDecision},
    error::{Result, SyncError},
    message::Command,
    state_store::{CommitKind, LocalStateStore, ViewData},
};
use log::*;
use scoreboard_common::protocol::{
    CommitRequest, CommitResponse, Credentials, Request, SyncResponse,
};
use std::collections::VecDeque;
use tokio::{sync::watch, time::Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Sync,
    Commit(CommitKind),
}

/// The only part of the client that talks to the server.
///
/// Every exchange runs to completion before the next one starts, including any follow-up it
/// causes: a resync after a conflict or a timed out commit, or a commit after a sync that
/// found an expired clock.
#[derive(Debug)]
pub struct SyncClient<C> {
    channel: C,
    credentials: Credentials,
    store: LocalStateStore,
    resolver: ConflictResolver,
    slides: Vec<String>,
}

impl<C: Channel> SyncClient<C> {
    pub fn new(
        channel: C,
        credentials: Credentials,
        store: LocalStateStore,
        slides: Vec<String>,
    ) -> Self {
        Self {
            channel,
            credentials,
            store,
            resolver: ConflictResolver::new(),
            slides,
        }
    }

    pub fn store(&self) -> &LocalStateStore {
        &self.store
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    #[cfg(test)]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn view(&self) -> ViewData {
        self.store.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewData> {
        self.store.subscribe()
    }

    /// Fetches the server's record and overwrites the local board with it
    pub async fn sync(&mut self) -> Result<()> {
        self.run(Action::Sync).await
    }

    /// Sends the local board to the server against the last revision seen
    pub async fn commit(&mut self, kind: CommitKind) -> Result<()> {
        self.run(Action::Commit(kind)).await
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::Connected => {
                info!("Connected, fetching the board");
                self.sync().await
            }
            ChannelEvent::Disconnected => {
                warn!("Disconnected, the clock keeps running locally");
                Ok(())
            }
            ChannelEvent::Update(data) => {
                let snapshot = self.resolver.on_broadcast(data)?;
                match self.store.apply_authoritative(&snapshot, Instant::now()) {
                    Some(kind) => self.commit(kind).await,
                    None => Ok(()),
                }
            }
            ChannelEvent::Ping => {
                trace!("Ping");
                Ok(())
            }
        }
    }

    /// Advances the clock by one tick, committing if it just expired
    pub async fn tick(&mut self) -> Result<()> {
        match self.store.tick(Instant::now()) {
            Some(kind) => {
                debug!("Sharing the clock expiry");
                self.commit(kind).await
            }
            None => Ok(()),
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<()> {
        debug!("Executing {command:?}");
        let now = Instant::now();
        let kind = match command {
            Command::AdjustScore { side, delta } => Some(self.store.adjust_score(side, delta)),
            Command::SetScore { side, score } => Some(self.store.set_score(side, score)),
            Command::EditTeamName(side) => {
                self.store.begin_team_edit(side);
                None
            }
            Command::TeamNameEditComplete { side, name } => {
                Some(self.store.set_team_name(side, &name))
            }
            Command::EditTime => {
                self.store.begin_time_edit();
                None
            }
            Command::TimeEditComplete(text) => self.store.finish_time_edit(&text, now)?,
            Command::SetRemaining(secs) => Some(self.store.set_remaining(secs, now)),
            Command::ToggleRun => {
                let kind = self.store.toggle_run(now);
                if kind.is_none() {
                    info!("The clock has expired, set a time before starting it");
                }
                kind
            }
            Command::ToggleSignage => Some(self.store.toggle_signage()),
        };

        match kind {
            Some(kind) => self.commit(kind).await,
            None => Ok(()),
        }
    }

    async fn run(&mut self, first: Action) -> Result<()> {
        let mut queue = VecDeque::from([first]);
        let mut timed_out = None;

        while let Some(action) = queue.pop_front() {
            match action {
                Action::Sync => {
                    if let Some(kind) = self.sync_once().await? {
                        queue.push_back(Action::Commit(kind));
                    }
                }
                Action::Commit(kind) => match self.commit_once(kind).await {
                    Ok(()) => {}
                    Err(SyncError::Conflict) => queue.push_back(Action::Sync),
                    // The link is still up, but the commit may or may not have landed
                    Err(e @ SyncError::Connection(ChannelError::Timeout(_)))
                        if timed_out.is_none() =>
                    {
                        warn!("Commit timed out, fetching the board again");
                        timed_out = Some(e);
                        queue.push_back(Action::Sync);
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        match timed_out {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns the commit the applied record calls for, if any
    async fn sync_once(&mut self) -> Result<Option<CommitKind>> {
        debug!("Syncing board {}", self.credentials.uuid);
        let reply = self
            .channel
            .request(Request::Sync(self.credentials.clone()))
            .await?;
        let response: SyncResponse = serde_json::from_value(reply).map_err(|e| {
            warn!("Malformed sync reply: {e}");
            SyncError::Contract(e)
        })?;

        let now = Instant::now();
        Ok(match self.resolver.on_sync_response(response)? {
            SyncDecision::Apply(snapshot) => self.store.apply_authoritative(&snapshot, now),
            SyncDecision::ApplyAndSeed(snapshot) => {
                self.store.apply_authoritative(&snapshot, now);
                Some(CommitKind::Full)
            }
        })
    }

    async fn commit_once(&mut self, kind: CommitKind) -> Result<()> {
        let update = self.store.prepare_update(kind, &self.slides);
        let request = CommitRequest {
            rev: self.store.revision().clone(),
            credentials: self.credentials.clone(),
            update,
        };
        debug!("Committing {kind} update against revision {}", request.rev);

        let reply = match self.channel.request(Request::Commit(request)).await {
            Ok(reply) => reply,
            Err(e) => {
                // Never retried, the record is fetched again instead
                self.store.discard_pending();
                return Err(e.into());
            }
        };
        let response: CommitResponse = match serde_json::from_value(reply) {
            Ok(response) => response,
            Err(e) => {
                warn!("Malformed commit reply: {e}");
                self.store.discard_pending();
                return Err(SyncError::Contract(e));
            }
        };

        match self.resolver.on_commit_response(response, &mut self.store) {
            Resolution::Accepted => {
                info!("Committed {kind} update");
                Ok(())
            }
            Resolution::Resync => Err(SyncError::Conflict),
            Resolution::Rejected { status } => Err(SyncError::Protocol { status }),
        }
    }
}
