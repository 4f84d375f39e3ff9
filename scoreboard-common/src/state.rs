use crate::{
    bundles::{HomeAwayBundle, Side},
    protocol::Snapshot,
};
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Opaque version token assigned by the server each time it accepts a change.
///
/// Clients only ever store a revision they received; they never derive a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// `true` until the first revision is received from the server
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            write!(f, "<none>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The shared record every connected client converges on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardState {
    pub revision: Revision,
    pub scores: HomeAwayBundle<u32>,
    pub paused: bool,
    pub remaining: u32,
    pub team_names: HomeAwayBundle<String>,
}

impl ScoreboardState {
    pub fn new(home_team: &str, away_team: &str, remaining: u32) -> Self {
        Self {
            revision: Revision::default(),
            scores: Default::default(),
            paused: true,
            remaining,
            team_names: HomeAwayBundle::new(home_team.to_string(), away_team.to_string()),
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        self.scores[side]
    }

    pub fn team_name(&self, side: Side) -> &str {
        &self.team_names[side]
    }

    /// Overwrites every field present in `snapshot`.
    ///
    /// Absent or empty team names and an absent `remaining` leave the local value alone. A
    /// negative `remaining` is stored as zero. Returns `true` if `remaining` was replaced.
    pub fn overwrite_from(&mut self, snapshot: &Snapshot) -> bool {
        self.revision = snapshot.rev.clone();
        self.scores = HomeAwayBundle::new(snapshot.home, snapshot.away);
        self.paused = snapshot.paused;

        for (side, name) in [
            (Side::Home, &snapshot.home_team),
            (Side::Away, &snapshot.away_team),
        ] {
            if let Some(name) = name.as_ref().filter(|n| !n.is_empty()) {
                self.team_names[side] = name.clone();
            }
        }

        if let Some(remaining) = snapshot.remaining {
            if remaining < 0 {
                warn!("Received negative remaining time {remaining}, using 0");
            }
            self.remaining = remaining.clamp(0, u32::MAX.into()) as u32;
            true
        } else {
            false
        }
    }
}

impl Display for ScoreboardState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[rev {}] {} {} - {} {}, {}s {}",
            self.revision,
            self.team_names.home,
            self.scores.home,
            self.scores.away,
            self.team_names.away,
            self.remaining,
            if self.paused { "paused" } else { "running" }
        )
    }
}
