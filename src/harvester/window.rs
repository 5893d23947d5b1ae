// Collection window: which [start, end) range each cycle asks for.

use chrono::{DateTime, TimeDelta, Utc};

/// Window used on the first cycle when no explicit window is configured.
pub const DEFAULT_WINDOW: TimeDelta = TimeDelta::minutes(1);

#[derive(Debug, Clone, Copy)]
pub struct WindowScheduler {
    delay: TimeDelta,
    window: Option<TimeDelta>,
}

impl WindowScheduler {
    /// `window` of `None` (or zero) follows the previous cycle's end instead.
    pub fn new(delay: TimeDelta, window: Option<TimeDelta>) -> Self {
        Self {
            delay,
            window: window.filter(|w| !w.is_zero()),
        }
    }

    /// Returns `(start, end)` for a cycle running at `now`.
    ///
    /// With an explicit window the range is always `window` long. Otherwise the
    /// range starts where the previous one ended, so consecutive cycles leave
    /// no gaps or overlaps; the very first cycle gets `DEFAULT_WINDOW`.
    pub fn next_window(
        &self,
        previous_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now - self.delay;
        let start = match (self.window, previous_end) {
            (Some(window), _) => end - window,
            (None, None) => end - DEFAULT_WINDOW,
            (None, Some(previous_end)) => previous_end,
        };
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn explicit_window_spans_exactly_window() {
        let scheduler = WindowScheduler::new(TimeDelta::minutes(5), Some(TimeDelta::minutes(3)));
        for previous in [None, Some(now() - TimeDelta::hours(2))] {
            let (start, end) = scheduler.next_window(previous, now());
            assert_eq!(end - start, TimeDelta::minutes(3));
            assert_eq!(end, now() - TimeDelta::minutes(5));
        }
    }

    #[test]
    fn first_cycle_uses_default_window() {
        let scheduler = WindowScheduler::new(TimeDelta::minutes(5), None);
        let (start, end) = scheduler.next_window(None, now());
        assert_eq!(end, now() - TimeDelta::minutes(5));
        assert_eq!(start, now() - TimeDelta::minutes(6));
    }

    #[test]
    fn dynamic_window_continues_from_previous_end() {
        let scheduler = WindowScheduler::new(TimeDelta::minutes(5), None);
        let (_, first_end) = scheduler.next_window(None, now());
        let later = now() + TimeDelta::seconds(90);
        let (start, end) = scheduler.next_window(Some(first_end), later);
        assert_eq!(start, first_end);
        assert_eq!(end - start, TimeDelta::seconds(90));
    }

    #[test]
    fn zero_window_is_treated_as_unset() {
        let scheduler = WindowScheduler::new(TimeDelta::zero(), Some(TimeDelta::zero()));
        let previous = now() - TimeDelta::seconds(42);
        let (start, _) = scheduler.next_window(Some(previous), now());
        assert_eq!(start, previous);
    }
}
