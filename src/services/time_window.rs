//! Half-open interval arithmetic shared by slot generation and conflict checks.

use chrono::{DateTime, Duration, Utc};

/// `[a_start, a_end)` and `[b_start, b_end)` share at least one instant.
/// Touching intervals do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// `[inner_start, inner_end)` lies entirely within `[outer_start, outer_end)`.
pub fn contains(
    outer_start: DateTime<Utc>,
    outer_end: DateTime<Utc>,
    inner_start: DateTime<Utc>,
    inner_end: DateTime<Utc>,
) -> bool {
    outer_start <= inner_start && inner_end <= outer_end
}

/// Candidate slots of `slot_duration` starting at `window_start` and advancing
/// by `step`, as long as the slot still ends within the window.
pub fn step_slots(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    slot_duration: Duration,
    step: Duration,
) -> SlotSteps {
    SlotSteps {
        next: window_start,
        window_end,
        slot_duration,
        step,
    }
}

/// Iterator returned by [`step_slots`]. Cloning it restarts from the same
/// position; it holds no other state.
#[derive(Debug, Clone)]
pub struct SlotSteps {
    next: DateTime<Utc>,
    window_end: DateTime<Utc>,
    slot_duration: Duration,
    step: Duration,
}

impl Iterator for SlotSteps {
    type Item = (DateTime<Utc>, DateTime<Utc>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.step <= Duration::zero() || self.slot_duration <= Duration::zero() {
            return None;
        }
        let start = self.next;
        let end = start + self.slot_duration;
        if end > self.window_end {
            return None;
        }
        self.next = start + self.step;
        Some((start, end))
    }
}
