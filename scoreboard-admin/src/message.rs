use scoreboard_common::bundles::Side;

/// An edit made by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AdjustScore {
        side: Side,
        delta: i32,
    },
    SetScore {
        side: Side,
        score: u32,
    },
    EditTeamName(Side),
    TeamNameEditComplete {
        side: Side,
        name: String,
    },
    EditTime,
    TimeEditComplete(String),
    /// A preset button, in seconds
    SetRemaining(u32),
    ToggleRun,
    ToggleSignage,
}
