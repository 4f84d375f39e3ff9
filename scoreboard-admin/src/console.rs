//! A line based stand-in for the editing GUI.
//!
//! Each line typed is turned into the commands a GUI would have sent for the same edit,
//! including the focus and defocus of text fields.

use crate::{message::Command, state_store::ViewData};
use scoreboard_common::bundles::Side;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  home|away +|-          add or remove a goal
  home|away <n>          set the score
  name home|away <name>  rename a team
  time <mm:ss>           set the clock
  preset <n>             set the clock to preset n
  toggle                 start or stop the clock
  signage                show or hide the slides
  help                   show this message";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("Unknown command {0:?}, try \"help\"")]
    UnknownCommand(String),
    #[error("Missing {0}")]
    MissingArgument(&'static str),
    #[error("Expected \"home\" or \"away\", got {0:?}")]
    UnknownSide(String),
    #[error("Expected +, - or a number, got {0:?}")]
    BadScore(String),
    #[error("There is no preset {0}")]
    UnknownPreset(String),
}

/// What a typed line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Commands(Vec<Command>),
    Help,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct Console {
    presets: Vec<u32>,
}

impl Console {
    pub fn new(presets: Vec<u32>) -> Self {
        Self { presets }
    }

    pub fn parse(&self, line: &str) -> Result<Input, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(Input::Nothing);
        };

        let commands = match first {
            "home" | "away" => {
                let side = parse_side(first)?;
                let arg = words.next().ok_or(ConsoleError::MissingArgument("score"))?;
                vec![match arg {
                    "+" => Command::AdjustScore { side, delta: 1 },
                    "-" => Command::AdjustScore { side, delta: -1 },
                    n => Command::SetScore {
                        side,
                        score: n.parse().map_err(|_| ConsoleError::BadScore(n.to_string()))?,
                    },
                }]
            }
            "name" => {
                let side = parse_side(words.next().ok_or(ConsoleError::MissingArgument("side"))?)?;
                let name = words.collect::<Vec<_>>().join(" ");
                vec![
                    Command::EditTeamName(side),
                    Command::TeamNameEditComplete { side, name },
                ]
            }
            "time" => {
                let text = words.next().ok_or(ConsoleError::MissingArgument("time"))?;
                vec![Command::EditTime, Command::TimeEditComplete(text.to_string())]
            }
            "preset" => {
                let arg = words.next().ok_or(ConsoleError::MissingArgument("preset"))?;
                let secs = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| self.presets.get(i))
                    .ok_or_else(|| ConsoleError::UnknownPreset(arg.to_string()))?;
                vec![Command::SetRemaining(*secs)]
            }
            "toggle" => vec![Command::ToggleRun],
            "signage" => vec![Command::ToggleSignage],
            "help" => return Ok(Input::Help),
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };

        Ok(Input::Commands(commands))
    }
}

fn parse_side(word: &str) -> Result<Side, ConsoleError> {
    match word {
        "home" => Ok(Side::Home),
        "away" => Ok(Side::Away),
        _ => Err(ConsoleError::UnknownSide(word.to_string())),
    }
}

/// One line showing the board, followed by any team name still being typed
pub fn render(view: &ViewData) -> String {
    let mut line = format!(
        "{} {} - {} {}  {}  [{}]{}  (rev {})",
        view.team_names.home,
        view.scores.home,
        view.scores.away,
        view.team_names.away,
        view.clock_field,
        view.run_label,
        if view.signage { "  signage" } else { "" },
        view.revision,
    );
    if view.team_fields != view.team_names {
        line.push_str(&format!(
            "  editing: {} / {}",
            view.team_fields.home, view.team_fields.away
        ));
    }
    line
}
