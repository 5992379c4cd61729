use std::time::Duration;

use crate::DebounceConfig;

/// Trailing-edge debounce with a device-dependent delay.
///
/// Timestamps are caller-supplied offsets from any fixed origin, so the same
/// state machine runs on a tokio clock or on `performance.now()`. Each
/// [`push`](Debouncer::push) replaces the pending item and re-arms the single
/// deadline; intermediate items are dropped, never queued.
#[derive(Debug)]
pub struct Debouncer<T> {
    config: DebounceConfig,
    touch_primary: bool,
    last_touch: Option<Duration>,
    pending: Option<T>,
    deadline: Option<Duration>,
}

impl<T> Debouncer<T> {
    pub fn new(config: DebounceConfig, touch_primary: bool) -> Self {
        Self {
            config,
            touch_primary,
            last_touch: None,
            pending: None,
            deadline: None,
        }
    }

    pub fn record_touch(&mut self, now: Duration) {
        self.last_touch = Some(now);
    }

    /// Delay a push at `now` would be armed with.
    pub fn delay_at(&self, now: Duration) -> Duration {
        if !self.touch_primary {
            return self.config.desktop;
        }
        let recently_touched = self
            .last_touch
            .is_some_and(|touched| now.saturating_sub(touched) < self.config.recent_touch_window);
        if recently_touched {
            self.config.touch_active
        } else {
            self.config.touch_idle
        }
    }

    /// Store `item` as the one to paint and return the new deadline.
    pub fn push(&mut self, item: T, now: Duration) -> Duration {
        let deadline = now + self.delay_at(now);
        self.pending = Some(item);
        self.deadline = Some(deadline);
        deadline
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending item if its deadline has passed.
    pub fn fire(&mut self, now: Duration) -> Option<T> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop whatever is pending and disarm.
    pub fn cancel(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn delay_depends_on_device_and_recent_touch() {
        let desktop: Debouncer<()> = Debouncer::new(DebounceConfig::default(), false);
        assert_eq!(desktop.delay_at(ms(0)), ms(16));

        let mut touch: Debouncer<()> = Debouncer::new(DebounceConfig::default(), true);
        assert_eq!(touch.delay_at(ms(5_000)), ms(100));

        touch.record_touch(ms(5_000));
        assert_eq!(touch.delay_at(ms(5_999)), ms(200));
        assert_eq!(touch.delay_at(ms(6_000)), ms(100));
    }

    #[test]
    fn burst_within_one_window_yields_only_the_last() {
        let mut debouncer = Debouncer::new(DebounceConfig::default(), false);
        for (i, at) in [0u64, 4, 8, 12].into_iter().enumerate() {
            debouncer.push(i, ms(at));
        }

        assert_eq!(debouncer.deadline(), Some(ms(28)));
        assert_eq!(debouncer.fire(ms(27)), None);
        assert_eq!(debouncer.fire(ms(28)), Some(3));
        assert_eq!(debouncer.fire(ms(100)), None);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn cancel_disarms() {
        let mut debouncer = Debouncer::new(DebounceConfig::default(), true);
        debouncer.push("a", ms(0));
        assert_eq!(debouncer.cancel(), Some("a"));
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.fire(ms(1_000)), None);
    }
}
