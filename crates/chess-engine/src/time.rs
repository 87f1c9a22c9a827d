//! Turning a game clock into a per-move time budget.

use std::time::Duration;

/// Time left on the side to move's clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    pub remaining: Duration,
    pub increment: Duration,
}

/// Budget for one move: a twentieth of the remaining time plus half the
/// increment, less `overhead`, and never more than `move_time` when given.
pub fn allocate(clock: Clock, move_time: Option<Duration>, overhead: Duration) -> Duration {
    let budget = clock.remaining / 20 + clock.increment / 2;
    let budget = budget
        .saturating_sub(overhead)
        .max(Duration::from_millis(1));
    match move_time {
        Some(cap) => budget.min(cap),
        None => budget,
    }
}
