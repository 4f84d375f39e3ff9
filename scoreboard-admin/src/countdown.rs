use log::*;
use tokio::time::{Duration, Instant};

/// How often the displayed clock is recomputed
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Paused,
    Running,
}

/// The local projection of the game clock.
///
/// `end_date` is the instant at which `remaining` reaches zero if the clock runs. It never
/// leaves this client. While paused it is kept equal to `now + remaining` so that starting the
/// clock projects from the moment it was started, not from whenever it was last stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub remaining: u32,
    pub paused: bool,
    pub end_date: Instant,
}

/// Outcome of one tick of [`advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub countdown: Countdown,
    /// The clock reached zero during this tick and was paused. Never set twice for one expiry.
    pub expired: bool,
}

impl Countdown {
    pub fn new(remaining: u32, paused: bool, now: Instant) -> Self {
        Self {
            remaining,
            paused,
            end_date: end_date_from(remaining, now),
        }
    }

    pub fn state(&self) -> ClockState {
        if self.paused {
            ClockState::Paused
        } else {
            ClockState::Running
        }
    }

    /// Replaces the remaining time, keeping the current run state. A clock set to zero is
    /// stopped.
    pub fn with_remaining(self, remaining: u32, now: Instant) -> Self {
        Self::new(remaining, self.paused || remaining == 0, now)
    }

    /// Flips between running and paused. Returns `None` when asked to start an expired clock.
    pub fn toggled(self, now: Instant) -> Option<Self> {
        match self.state() {
            ClockState::Paused if self.remaining == 0 => {
                debug!("Refusing to start a clock with no time remaining");
                None
            }
            ClockState::Paused => Some(Self::new(self.remaining, false, now)),
            ClockState::Running => {
                let remaining = secs_until(self.end_date, now);
                Some(Self::new(remaining, true, now))
            }
        }
    }
}

/// Projects `countdown` forward to `now`.
///
/// A paused clock keeps its `remaining` and only has its `end_date` moved. A running clock has
/// `remaining` recomputed from `end_date`, and is paused once that reaches zero.
pub fn advance(countdown: Countdown, now: Instant) -> Advance {
    match countdown.state() {
        ClockState::Paused => Advance {
            countdown: Countdown {
                end_date: end_date_from(countdown.remaining, now),
                ..countdown
            },
            expired: false,
        },
        ClockState::Running => {
            let remaining = secs_until(countdown.end_date, now);
            trace!("Clock running, {remaining}s remaining");
            if remaining == 0 {
                info!("Clock expired");
                Advance {
                    countdown: Countdown::new(0, true, now),
                    expired: true,
                }
            } else {
                Advance {
                    countdown: Countdown {
                        remaining,
                        ..countdown
                    },
                    expired: false,
                }
            }
        }
    }
}

fn end_date_from(remaining: u32, now: Instant) -> Instant {
    now + Duration::from_secs(remaining.into())
}

/// Whole seconds from `now` until `end`, zero if `end` has passed
fn secs_until(end: Instant, now: Instant) -> u32 {
    end.checked_duration_since(now)
        .map(|d| d.as_secs().try_into().unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use more_asserts::*;

    #[test]
    fn test_paused_clock_does_not_move() {
        let start = Instant::now();
        let mut countdown = Countdown::new(90, true, start);

        for i in 1..=10 {
            let now = start + TICK * i;
            let Advance {
                countdown: next,
                expired,
            } = advance(countdown, now);
            assert!(!expired);
            assert_eq!(next.remaining, 90);
            assert!(next.paused);
            assert_eq!(next.end_date, now + Duration::from_secs(90));
            countdown = next;
        }
    }

    #[test]
    fn test_running_clock_counts_down() {
        let start = Instant::now();
        let countdown = Countdown::new(500, false, start);

        let after = advance(countdown, start + Duration::from_secs(5));
        assert_eq!(after.countdown.remaining, 495);
        assert!(!after.countdown.paused);
        assert_eq!(after.countdown.end_date, countdown.end_date);
        assert!(!after.expired);

        // Partial seconds round down
        let after = advance(countdown, start + Duration::from_millis(5_400));
        assert_eq!(after.countdown.remaining, 494);
    }

    #[test]
    fn test_late_tick_catches_up() {
        let start = Instant::now();
        let countdown = Countdown::new(500, false, start);

        // A suspended process may not tick for a long time
        let after = advance(countdown, start + Duration::from_secs(120));
        assert_eq!(after.countdown.remaining, 380);
    }

    #[test]
    fn test_expiry_fires_once() {
        let start = Instant::now();
        let mut countdown = Countdown::new(2, false, start);
        let mut expiries = 0;

        for i in 1..=5 {
            let result = advance(countdown, start + TICK * i);
            if result.expired {
                expiries += 1;
            }
            countdown = result.countdown;
            assert_le!(countdown.remaining, 2);
        }

        assert_eq!(expiries, 1);
        assert_eq!(countdown.remaining, 0);
        assert!(countdown.paused);
    }

    #[test]
    fn test_expiry_after_long_suspension() {
        let start = Instant::now();
        let countdown = Countdown::new(30, false, start);

        let result = advance(countdown, start + Duration::from_secs(3600));
        assert!(result.expired);
        assert_eq!(result.countdown.remaining, 0);
        assert_eq!(result.countdown.state(), ClockState::Paused);
    }

    #[test]
    fn test_toggle() {
        let start = Instant::now();
        let countdown = Countdown::new(60, true, start);

        // Starting projects from the moment of the start
        let later = start + Duration::from_secs(30);
        let running = countdown.toggled(later).unwrap();
        assert_eq!(running.state(), ClockState::Running);
        assert_eq!(running.end_date, later + Duration::from_secs(60));

        let stopped = running.toggled(later + Duration::from_secs(10)).unwrap();
        assert_eq!(stopped.state(), ClockState::Paused);
        assert_eq!(stopped.remaining, 50);

        let expired = Countdown::new(0, true, start);
        assert_eq!(expired.toggled(later), None);
    }

    #[test]
    fn test_with_remaining() {
        let start = Instant::now();
        let running = Countdown::new(60, false, start);
        let later = start + Duration::from_secs(3);

        let set = running.with_remaining(754, later);
        assert_eq!(set.remaining, 754);
        assert!(!set.paused);
        assert_eq!(set.end_date, later + Duration::from_secs(754));

        let zeroed = running.with_remaining(0, later);
        assert_eq!(zeroed.remaining, 0);
        assert_eq!(zeroed.state(), ClockState::Paused);
        assert!(!advance(zeroed, later + TICK).expired);
    }
}
