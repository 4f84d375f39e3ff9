use regex::Regex;
use thiserror::Error;

lazy_static::lazy_static! {
    static ref CLOCK_TEXT_PATTERN: Regex =
        Regex::new(r"^\s*([0-9]{1,2}):([0-9]{1,2})\s*$").unwrap();
}

/// Formats a number of seconds as `mm:ss`
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Parses text typed into the clock field. Accepts one or two digits on each side of the colon.
pub fn parse_clock_text(text: &str) -> Result<u32, ClockTextError> {
    let caps = CLOCK_TEXT_PATTERN
        .captures(text)
        .ok_or_else(|| ClockTextError::Malformed(text.to_string()))?;

    // The pattern guarantees at most two digits in each group
    let mins: u32 = caps[1]
        .parse()
        .map_err(|_| ClockTextError::Malformed(text.to_string()))?;
    let secs: u32 = caps[2]
        .parse()
        .map_err(|_| ClockTextError::Malformed(text.to_string()))?;

    if secs >= 60 {
        return Err(ClockTextError::SecondsOutOfRange(secs));
    }

    Ok(mins * 60 + secs)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockTextError {
    #[error("{0:?} is not a clock time of the form mm:ss")]
    Malformed(String),
    #[error("{0} is not a valid number of seconds in a minute")]
    SecondsOutOfRange(u32),
}
