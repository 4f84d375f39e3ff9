use crate::countdown::{self, Countdown};
use log::*;
use scoreboard_common::{
    bundles::{HomeAwayBundle, Side},
    protocol::{FullUpdate, MinimalUpdate, Snapshot, Update},
    state::{Revision, ScoreboardState},
    time_format::{ClockTextError, format_time, parse_clock_text},
};
use std::fmt::{Display, Formatter};
use tokio::{sync::watch, time::Instant};

/// Which payload a mutation needs to send to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Scores, pause flag and signage only
    Minimal,
    /// Everything, including the clock and team names
    Full,
}

impl Display for CommitKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Everything a GUI needs to draw the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewData {
    pub revision: Revision,
    pub scores: HomeAwayBundle<u32>,
    pub signage: bool,
    /// Team names for the board's headings
    pub team_names: HomeAwayBundle<String>,
    /// Text of the team name inputs. Frozen while the input is being edited.
    pub team_fields: HomeAwayBundle<String>,
    /// Text of the clock input, `mm:ss`. Frozen while the input is being edited.
    pub clock_field: String,
    pub run_label: &'static str,
}

/// The client's copy of the scoreboard, mutated optimistically by local edits and
/// overwritten by authoritative messages.
#[derive(Debug)]
pub struct LocalStateStore {
    state: ScoreboardState,
    end_date: Instant,
    signage: bool,
    editing_time: bool,
    editing_team: HomeAwayBundle<bool>,
    clock_field: String,
    team_fields: HomeAwayBundle<String>,
    pending: Option<Update>,
    view_tx: watch::Sender<ViewData>,
}

impl LocalStateStore {
    pub fn new(initial: ScoreboardState, now: Instant) -> Self {
        let end_date = Countdown::new(initial.remaining, initial.paused, now).end_date;
        let clock_field = format_time(initial.remaining);
        let team_fields = initial.team_names.clone();
        let view = ViewData {
            revision: initial.revision.clone(),
            scores: initial.scores,
            signage: false,
            team_names: initial.team_names.clone(),
            team_fields: team_fields.clone(),
            clock_field: clock_field.clone(),
            run_label: run_label(initial.paused),
        };
        let (view_tx, _) = watch::channel(view);

        Self {
            state: initial,
            end_date,
            signage: false,
            editing_time: false,
            editing_team: Default::default(),
            clock_field,
            team_fields,
            pending: None,
            view_tx,
        }
    }

    pub fn state(&self) -> &ScoreboardState {
        &self.state
    }

    pub fn revision(&self) -> &Revision {
        &self.state.revision
    }

    pub fn countdown(&self) -> Countdown {
        Countdown {
            remaining: self.state.remaining,
            paused: self.state.paused,
            end_date: self.end_date,
        }
    }

    pub fn view(&self) -> ViewData {
        self.view_tx.borrow().clone()
    }

    /// A receiver that is notified after every change to the board
    pub fn subscribe(&self) -> watch::Receiver<ViewData> {
        self.view_tx.subscribe()
    }

    pub fn adjust_score(&mut self, side: Side, delta: i32) -> CommitKind {
        let score = (i64::from(self.state.scores[side]) + i64::from(delta)).max(0);
        self.state.scores[side] = score.try_into().unwrap_or(u32::MAX);
        info!("{side} score adjusted by {delta} to {}", self.state.scores[side]);
        self.publish();
        CommitKind::Minimal
    }

    /// Sets a score typed directly into the score field
    pub fn set_score(&mut self, side: Side, score: u32) -> CommitKind {
        info!("{side} score set to {score}");
        self.state.scores[side] = score;
        self.publish();
        CommitKind::Minimal
    }

    pub fn begin_team_edit(&mut self, side: Side) {
        debug!("Editing {side} team name");
        self.editing_team[side] = true;
    }

    /// Called when the team name input loses focus
    pub fn set_team_name(&mut self, side: Side, name: &str) -> CommitKind {
        info!("{side} team name set to {name:?}");
        self.editing_team[side] = false;
        self.state.team_names[side] = name.to_string();
        self.publish();
        CommitKind::Full
    }

    pub fn begin_time_edit(&mut self) {
        debug!("Editing clock time");
        self.editing_time = true;
    }

    /// Called when the clock input loses focus.
    ///
    /// Text that isn't a clock time is rejected, and the input reverts to the current clock.
    /// A valid time equal to the current one needs no commit.
    pub fn finish_time_edit(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<Option<CommitKind>, ClockTextError> {
        self.editing_time = false;

        let remaining = match parse_clock_text(text) {
            Ok(r) => r,
            Err(e) => {
                warn!("Rejected clock text: {e}");
                self.publish();
                return Err(e);
            }
        };

        if remaining == self.state.remaining {
            self.publish();
            return Ok(None);
        }

        Ok(Some(self.set_remaining(remaining, now)))
    }

    /// Sets the clock, either from text entry or from a preset
    pub fn set_remaining(&mut self, remaining: u32, now: Instant) -> CommitKind {
        info!("Clock set to {}", format_time(remaining));
        self.editing_time = false;
        self.store_countdown(self.countdown().with_remaining(remaining, now));
        self.publish();
        CommitKind::Full
    }

    /// Starts or stops the clock. An expired clock can't be started.
    pub fn toggle_run(&mut self, now: Instant) -> Option<CommitKind> {
        let countdown = self.countdown().toggled(now)?;
        info!(
            "Clock {} at {}",
            if countdown.paused {
                "stopped"
            } else {
                "started"
            },
            format_time(countdown.remaining)
        );
        self.store_countdown(countdown);
        self.publish();
        Some(CommitKind::Full)
    }

    pub fn toggle_signage(&mut self) -> CommitKind {
        self.signage = !self.signage;
        info!("Signage turned {}", if self.signage { "on" } else { "off" });
        self.publish();
        CommitKind::Minimal
    }

    /// Advances the local clock. Returns a commit to send when the clock has just expired.
    pub fn tick(&mut self, now: Instant) -> Option<CommitKind> {
        let advance = countdown::advance(self.countdown(), now);
        let changed = advance.countdown.remaining != self.state.remaining
            || advance.countdown.paused != self.state.paused;
        self.store_countdown(advance.countdown);
        if changed {
            self.publish();
        }
        advance.expired.then_some(CommitKind::Full)
    }

    /// Overwrites the board with a record from the server, whatever was edited locally.
    ///
    /// Returns a commit to send if the record describes a running clock with no time left, in
    /// which case the clock is paused here and the other clients need to hear about it.
    pub fn apply_authoritative(&mut self, snapshot: &Snapshot, now: Instant) -> Option<CommitKind> {
        debug!("Applying authoritative snapshot {snapshot:?}");
        if let Some(pending) = self.pending.take() {
            debug!("Authoritative snapshot supersedes pending {pending:?}");
        }

        if self.state.overwrite_from(snapshot) {
            self.end_date = Countdown::new(self.state.remaining, self.state.paused, now).end_date;
        }

        let expired = self.state.remaining == 0 && !self.state.paused;
        if expired {
            info!("Received a running clock with no time remaining, pausing it");
            self.state.paused = true;
        }

        info!("Board is now {}", self.state);
        self.publish();
        expired.then_some(CommitKind::Full)
    }

    /// Builds the payload for a commit and records it as in flight
    pub fn prepare_update(&mut self, kind: CommitKind, slides: &[String]) -> Update {
        let base = MinimalUpdate {
            home: self.state.scores.home,
            away: self.state.scores.away,
            paused: self.state.paused,
            signage: self.signage,
        };
        let update = match kind {
            CommitKind::Minimal => Update::Minimal(base),
            CommitKind::Full => Update::Full(FullUpdate {
                base,
                remaining: self.state.remaining,
                home_team: self.state.team_names.home.clone(),
                away_team: self.state.team_names.away.clone(),
                slides: slides.to_vec(),
            }),
        };
        self.pending = Some(update.clone());
        update
    }

    /// The server accepted the in-flight commit, the local values are now final
    pub fn settle_pending(&mut self) {
        self.pending = None;
    }

    /// Drops the in-flight commit after the server rejected it. Returns what was dropped.
    pub fn discard_pending(&mut self) -> Option<Update> {
        self.pending.take()
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn store_countdown(&mut self, countdown: Countdown) {
        self.state.remaining = countdown.remaining;
        self.state.paused = countdown.paused;
        self.end_date = countdown.end_date;
    }

    fn publish(&mut self) {
        if !self.editing_time {
            self.clock_field = format_time(self.state.remaining);
        }
        for side in [Side::Home, Side::Away] {
            if !self.editing_team[side] {
                self.team_fields[side] = self.state.team_names[side].clone();
            }
        }

        let view = ViewData {
            revision: self.state.revision.clone(),
            scores: self.state.scores,
            signage: self.signage,
            team_names: self.state.team_names.clone(),
            team_fields: self.team_fields.clone(),
            clock_field: self.clock_field.clone(),
            run_label: run_label(self.state.paused),
        };
        self.view_tx.send_replace(view);
    }
}

fn run_label(paused: bool) -> &'static str {
    if paused { "Start" } else { "Pause" }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Once;
    use tokio::time::Duration;

    static INIT: Once = Once::new();

    pub fn initialize() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    fn new_store(now: Instant) -> LocalStateStore {
        LocalStateStore::new(ScoreboardState::new("Uccle Sport", "Visiteurs", 2100), now)
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            rev: "r1".into(),
            home: 2,
            away: 1,
            paused: false,
            remaining: Some(500),
            home_team: None,
            away_team: None,
        }
    }

    #[test]
    fn test_defaults() {
        initialize();
        let store = new_store(Instant::now());
        let view = store.view();
        assert_eq!(view.clock_field, "35:00");
        assert_eq!(view.run_label, "Start");
        assert_eq!(
            view.team_names,
            HomeAwayBundle::new("Uccle Sport".to_string(), "Visiteurs".to_string())
        );
        assert!(store.revision().is_unknown());
    }

    #[test]
    fn test_score_bounds() {
        initialize();
        let mut store = new_store(Instant::now());

        assert_eq!(store.adjust_score(Side::Home, -1), CommitKind::Minimal);
        assert_eq!(store.state().score(Side::Home), 0);

        for _ in 0..1000 {
            store.adjust_score(Side::Away, 1);
        }
        assert_eq!(store.state().score(Side::Away), 1000);
        store.adjust_score(Side::Away, -1);
        assert_eq!(store.state().score(Side::Away), 999);

        assert_eq!(store.set_score(Side::Home, 7), CommitKind::Minimal);
        assert_eq!(store.view().scores, HomeAwayBundle::new(7, 999));
    }

    #[test]
    fn test_clock_text_entry() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.begin_time_edit();
        assert!(store.editing_time);
        assert_eq!(store.finish_time_edit("12:34", now), Ok(Some(CommitKind::Full)));
        assert!(!store.editing_time);
        assert_eq!(store.state().remaining, 754);
        assert_eq!(store.view().clock_field, "12:34");
        assert_eq!(store.countdown().end_date, now + Duration::from_secs(754));

        // Unchanged value, nothing to commit
        store.begin_time_edit();
        assert_eq!(store.finish_time_edit("12:34", now), Ok(None));
    }

    #[test]
    fn test_bad_clock_text_reverts() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.begin_time_edit();
        assert!(store.finish_time_edit("abc", now).is_err());
        assert_eq!(store.state().remaining, 2100);
        assert_eq!(store.view().clock_field, "35:00");
        assert!(!store.editing_time);
        assert!(!store.has_pending());
    }

    #[test]
    fn test_editing_guard_holds_clock_field() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.begin_time_edit();
        store.apply_authoritative(&snapshot(), now);

        // Stored, but not drawn over the field being typed in
        assert_eq!(store.state().remaining, 500);
        assert_eq!(store.view().clock_field, "35:00");
        assert_eq!(store.view().scores, HomeAwayBundle::new(2, 1));

        store.begin_time_edit();
        store.finish_time_edit("not a time", now).unwrap_err();
        assert_eq!(store.view().clock_field, "08:20");
    }

    #[test]
    fn test_editing_guard_holds_team_field() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.begin_team_edit(Side::Home);
        store.apply_authoritative(
            &Snapshot {
                home_team: Some("Lions".to_string()),
                away_team: Some("Tigers".to_string()),
                ..snapshot()
            },
            now,
        );

        let view = store.view();
        assert_eq!(view.team_names.home, "Lions");
        assert_eq!(view.team_fields.home, "Uccle Sport");
        assert_eq!(view.team_fields.away, "Tigers");

        assert_eq!(store.set_team_name(Side::Home, "Uccle"), CommitKind::Full);
        let view = store.view();
        assert_eq!(view.team_names.home, "Uccle");
        assert_eq!(view.team_fields.home, "Uccle");
    }

    #[test]
    fn test_toggle_run() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        assert_eq!(store.toggle_run(now), Some(CommitKind::Full));
        assert!(!store.state().paused);
        assert_eq!(store.view().run_label, "Pause");

        assert_eq!(store.toggle_run(now + Duration::from_secs(4)), Some(CommitKind::Full));
        assert!(store.state().paused);
        assert_eq!(store.state().remaining, 2096);

        store.set_remaining(0, now);
        assert_eq!(store.toggle_run(now), None);
        assert!(store.state().paused);
    }

    #[test]
    fn test_set_zero_while_running() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);
        store.toggle_run(now);

        assert_eq!(store.set_remaining(0, now), CommitKind::Full);
        assert_eq!(store.state().remaining, 0);
        assert!(store.state().paused);
        assert_eq!(store.view().run_label, "Start");
        match store.prepare_update(CommitKind::Full, &[]) {
            Update::Full(full) => {
                assert_eq!(full.remaining, 0);
                assert!(full.base.paused);
            }
            Update::Minimal(_) => panic!("Expected a full update"),
        }

        // Already stopped, so the clock doesn't expire again
        for i in 1..=3 {
            assert_eq!(store.tick(now + Duration::from_secs(i)), None);
        }
    }

    #[test]
    fn test_tick_while_paused() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        for i in 1..=30 {
            assert_eq!(store.tick(now + Duration::from_secs(i)), None);
        }
        assert_eq!(store.state().remaining, 2100);
        assert_eq!(
            store.countdown().end_date,
            now + Duration::from_secs(30 + 2100)
        );
    }

    #[test]
    fn test_expiry_commits_once() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);
        store.set_remaining(2, now);
        store.toggle_run(now);

        let commits: Vec<_> = (1..=4)
            .filter_map(|i| store.tick(now + Duration::from_secs(i)))
            .collect();
        assert_eq!(commits, vec![CommitKind::Full]);
        assert_eq!(store.state().remaining, 0);
        assert!(store.state().paused);
        assert_eq!(store.view().clock_field, "00:00");
    }

    #[test]
    fn test_apply_authoritative() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        assert_eq!(store.apply_authoritative(&snapshot(), now), None);
        let view = store.view();
        assert_eq!(view.clock_field, "08:20");
        assert_eq!(view.revision, Revision::from("r1"));
        assert_eq!(view.run_label, "Pause");

        for i in 1..=5 {
            store.tick(now + Duration::from_secs(i));
        }
        assert_eq!(store.state().remaining, 495);
        assert!(!store.state().paused);
    }

    #[test]
    fn test_apply_is_idempotent() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.apply_authoritative(&snapshot(), now);
        let (first, first_countdown) = (store.state().clone(), store.countdown());
        store.apply_authoritative(&snapshot(), now);
        assert_eq!(store.state(), &first);
        assert_eq!(store.countdown(), first_countdown);
    }

    #[test]
    fn test_minimal_snapshot_keeps_projection() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);
        store.apply_authoritative(&snapshot(), now);
        let end_date = store.countdown().end_date;

        let later = now + Duration::from_millis(2_500);
        store.tick(later);
        store.apply_authoritative(
            &Snapshot {
                rev: "r2".into(),
                home: 3,
                remaining: None,
                ..snapshot()
            },
            later,
        );
        assert_eq!(store.countdown().end_date, end_date);
        assert_eq!(store.state().remaining, 497);
    }

    #[test]
    fn test_apply_expired_running_clock() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        let result = store.apply_authoritative(
            &Snapshot {
                remaining: Some(0),
                ..snapshot()
            },
            now,
        );
        assert_eq!(result, Some(CommitKind::Full));
        assert!(store.state().paused);
        assert_eq!(store.tick(now + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_apply_discards_local_edits() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);

        store.adjust_score(Side::Home, 5);
        let update = store.prepare_update(CommitKind::Minimal, &[]);
        assert_eq!(update.base().home, 5);
        assert!(store.has_pending());

        store.apply_authoritative(&snapshot(), now);
        assert!(!store.has_pending());
        assert_eq!(store.state().score(Side::Home), 2);
    }

    #[test]
    fn test_prepare_update() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);
        store.toggle_signage();
        let slides = vec!["/img/img1.png".to_string()];

        let minimal = store.prepare_update(CommitKind::Minimal, &slides);
        assert_eq!(
            minimal,
            Update::Minimal(MinimalUpdate {
                home: 0,
                away: 0,
                paused: true,
                signage: true,
            })
        );

        let full = store.prepare_update(CommitKind::Full, &slides);
        match full {
            Update::Full(full) => {
                assert_eq!(full.remaining, 2100);
                assert_eq!(full.home_team, "Uccle Sport");
                assert_eq!(full.away_team, "Visiteurs");
                assert_eq!(full.slides, slides);
            }
            Update::Minimal(_) => panic!("Expected a full update"),
        }

        assert!(store.discard_pending().is_some());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_subscription() {
        initialize();
        let now = Instant::now();
        let mut store = new_store(now);
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.adjust_score(Side::Away, 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().scores.away, 1);

        // Ticks of a paused clock don't change anything visible
        store.tick(now + Duration::from_secs(1));
        assert!(!rx.has_changed().unwrap());
    }
}
