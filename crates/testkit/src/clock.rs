use std::cell::Cell;
use std::rc::Rc;

use chrono::{Duration, NaiveDateTime};
use kitting_core::Clock;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    /// Clock stopped at `now`.
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn clones_share_time() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let clock = ManualClock::at(start);
        let shared = clock.clone();
        clock.advance(Duration::days(2));
        assert_eq!(shared.now(), start + Duration::days(2));
    }
}
