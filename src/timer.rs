//! Per-phase countdowns.
//!
//! A [`Countdown`] publishes the whole seconds remaining (rounded up) on a
//! `watch` channel, ticking every [`TICK`]. It reaches zero exactly once and
//! stops. Dropping or cancelling it stops the background task immediately,
//! so a timer never fires into a phase that is no longer current.
//!
//! [`PhaseTimers`] ties a countdown to the active game's `(game, phase)` pair
//! and its `timeLimit`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::game::GameSession;
use crate::protocol::Phase;

/// Countdown refresh interval.
pub const TICK: Duration = Duration::from_millis(100);

fn whole_seconds_left(total: Duration, elapsed: Duration) -> u64 {
    let millis = total.saturating_sub(elapsed).as_millis();
    u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
}

/// A running countdown. Cancelled on drop.
#[derive(Debug)]
pub struct Countdown {
    duration: Duration,
    remaining: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Start counting down from `duration`.
    pub fn start(duration: Duration) -> Self {
        let (tx, rx) = watch::channel(whole_seconds_left(duration, Duration::ZERO));
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(TICK);
            loop {
                ticker.tick().await;
                let left = whole_seconds_left(duration, started.elapsed());
                tx.send_if_modified(|current| {
                    let changed = *current != left;
                    *current = left;
                    changed
                });
                if left == 0 {
                    break;
                }
            }
        });
        Self {
            duration,
            remaining: rx,
            task,
        }
    }

    /// Total duration this countdown started from.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whole seconds remaining, rounded up.
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Subscribe to remaining-seconds updates.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Wait until the countdown reaches zero and return `true`. Returns
    /// `false` only if the ticking task stopped early, as happens when the
    /// runtime shuts down. To stop waiting on a phase change, drop the
    /// future along with the countdown.
    pub async fn finished(&mut self) -> bool {
        self.remaining.wait_for(|left| *left == 0).await.is_ok()
    }

    /// Stop the countdown without reaching zero.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Keeps at most one countdown alive, bound to the active phase.
#[derive(Debug, Default)]
pub struct PhaseTimers {
    active: Option<(String, Phase, Countdown)>,
}

impl PhaseTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile with the current game. Starts a countdown when a timed phase
    /// begins, keeps it across unrelated updates, and cancels it when the
    /// phase changes, the game ends or no time limit applies. Returns `true`
    /// if a new countdown was started.
    pub fn sync(&mut self, game: Option<&GameSession>) -> bool {
        let wanted = game.and_then(|g| {
            let phase = g.phase.as_ref()?;
            let limit = g.data.time_limit?;
            Some((g.game_id.as_str(), phase, limit))
        });

        if let (Some((game_id, phase, _)), Some((id, current, _))) = (&wanted, &self.active) {
            if *game_id == id.as_str() && *phase == current {
                return false;
            }
        }

        if let Some((id, phase, _)) = self.active.take() {
            debug!(game_id = %id, phase = %phase, "phase countdown cancelled");
        }
        let Some((game_id, phase, limit)) = wanted else {
            return false;
        };
        debug!(game_id, phase = %phase, limit_ms = limit, "phase countdown started");
        self.active = Some((
            game_id.to_string(),
            phase.clone(),
            Countdown::start(Duration::from_millis(limit)),
        ));
        true
    }

    /// The countdown for the current phase, if any.
    pub fn countdown(&self) -> Option<&Countdown> {
        self.active.as_ref().map(|(_, _, c)| c)
    }

    /// Mutable access, e.g. to await [`Countdown::finished`].
    pub fn countdown_mut(&mut self) -> Option<&mut Countdown> {
        self.active.as_mut().map(|(_, _, c)| c)
    }

    /// Cancel any running countdown.
    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::game::GameMachine;
    use crate::protocol::{GameStartedPayload, PhasePayload, ServerEvent};

    #[test]
    fn rounds_up_to_whole_seconds() {
        let total = Duration::from_millis(3000);
        assert_eq!(whole_seconds_left(total, Duration::ZERO), 3);
        assert_eq!(whole_seconds_left(total, Duration::from_millis(1)), 3);
        assert_eq!(whole_seconds_left(total, Duration::from_millis(2001)), 1);
        assert_eq!(whole_seconds_left(total, Duration::from_millis(3000)), 0);
        assert_eq!(whole_seconds_left(total, Duration::from_secs(10)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_reaches_zero_once() {
        let started = Instant::now();
        let mut countdown = Countdown::start(Duration::from_secs(3));
        assert_eq!(countdown.remaining(), 3);
        assert!(countdown.finished().await);
        assert_eq!(countdown.remaining(), 0);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(3) + TICK * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stops_publishing() {
        let countdown = Countdown::start(Duration::from_secs(30));
        let mut updates = countdown.subscribe();
        countdown.cancel();
        tokio::task::yield_now().await;
        // The sender lives in the aborted task, so the channel closes.
        while updates.changed().await.is_ok() {}
        assert_ne!(*updates.borrow(), 0);
    }

    fn timed_game(game_id: &str, phase: &str, limit: Option<u64>) -> GameMachine {
        let mut game = GameMachine::default();
        game.apply(&ServerEvent::GameStarted(GameStartedPayload {
            game_id: game_id.into(),
            lobby: None,
        }));
        game.apply(&ServerEvent::Phase(PhasePayload {
            phase: Phase::from(phase),
            time_limit: limit,
            ..Default::default()
        }));
        game
    }

    #[tokio::test(start_paused = true)]
    async fn phase_timers_follow_phase_changes() {
        let mut timers = PhaseTimers::new();
        assert!(!timers.sync(None));

        let drawing = timed_game("drawing-game", "drawing", Some(60_000));
        assert!(timers.sync(drawing.session()));
        assert_eq!(timers.countdown().unwrap().remaining(), 60);
        // Same phase again: keep the running countdown.
        assert!(!timers.sync(drawing.session()));

        let voting = timed_game("drawing-game", "voting", Some(10_000));
        assert!(timers.sync(voting.session()));
        assert_eq!(timers.countdown().unwrap().duration(), Duration::from_secs(10));

        let untimed = timed_game("drawing-game", "results", None);
        assert!(!timers.sync(untimed.session()));
        assert!(timers.countdown().is_none());

        assert!(timers.sync(voting.session()));
        timers.sync(None);
        assert!(timers.countdown().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn phase_countdown_can_be_awaited() {
        let mut timers = PhaseTimers::new();
        let game = timed_game("queens", "playing", Some(1_500));
        timers.sync(game.session());
        assert_eq!(timers.countdown().unwrap().remaining(), 2);
        assert!(timers.countdown_mut().unwrap().finished().await);
        timers.clear();
        assert!(timers.countdown().is_none());
    }
}
