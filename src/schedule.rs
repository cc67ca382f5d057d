//! Time-of-day backlight control.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backlight::{BRIGHTNESS_OFF, BRIGHTNESS_ON, Backlight};

/// How often the wall clock is consulted.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hours (0-23, local time) between which the panel is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessSchedule {
    pub on_hour: u8,
    pub off_hour: u8,
}

impl BrightnessSchedule {
    #[must_use]
    pub const fn new(on_hour: u8, off_hour: u8) -> Self {
        Self { on_hour, off_hour }
    }

    /// Whether the panel should be lit during `hour`.
    ///
    /// The lit window is `[on_hour, off_hour)` and wraps past midnight when
    /// `on_hour > off_hour`. Equal hours keep the panel lit all day.
    #[must_use]
    pub fn should_be_on(&self, hour: u32) -> bool {
        let on = u32::from(self.on_hour);
        let off = u32::from(self.off_hour);
        if on < off {
            (on..off).contains(&hour)
        } else if on > off {
            hour >= on || hour < off
        } else {
            true
        }
    }
}

/// Applies a [`BrightnessSchedule`] to a [`Backlight`], writing only when the
/// hour crosses a boundary.
#[derive(Debug)]
pub struct BrightnessPoller<B> {
    schedule: BrightnessSchedule,
    backlight: B,
    interval: Duration,
    next_poll: Option<Instant>,
    failed_writes: u32,
}

impl<B: Backlight> BrightnessPoller<B> {
    pub fn new(schedule: BrightnessSchedule, backlight: B) -> Self {
        Self {
            schedule,
            backlight,
            interval: POLL_INTERVAL,
            next_poll: None,
            failed_writes: 0,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn backlight(&self) -> &B {
        &self.backlight
    }

    /// Consecutive failed writes since the last successful one.
    #[must_use]
    pub const fn failed_writes(&self) -> u32 {
        self.failed_writes
    }

    /// Instant the next poll is due. `None` until the first poll ran.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.next_poll
    }

    /// Check `hour` if the poll interval has elapsed. Returns the brightness
    /// level written, if any.
    pub fn poll(&mut self, now: Instant, hour: u32) -> Option<u8> {
        if self.next_poll.is_some_and(|due| now < due) {
            return None;
        }
        self.next_poll = Some(now + self.interval);
        self.apply(hour)
    }

    /// Bring the backlight in line with `hour`, ignoring the poll interval.
    ///
    /// A failing write is retried on every call but only reported once per
    /// run of failures.
    pub fn apply(&mut self, hour: u32) -> Option<u8> {
        let want_on = self.schedule.should_be_on(hour);
        if want_on == self.backlight.is_on() {
            return None;
        }
        let level = if want_on { BRIGHTNESS_ON } else { BRIGHTNESS_OFF };
        match self.backlight.change_brightness(level) {
            Ok(()) => {
                if self.failed_writes > 0 {
                    info!(failed_writes = self.failed_writes, "backlight writable again");
                    self.failed_writes = 0;
                }
                info!(
                    hour,
                    level,
                    on_hour = self.schedule.on_hour,
                    off_hour = self.schedule.off_hour,
                    "backlight boundary crossed"
                );
                Some(level)
            }
            Err(err) => {
                if self.failed_writes == 0 {
                    warn!(hour, level, error = ?err, "backlight change failed; retrying quietly");
                } else {
                    debug!(hour, level, error = ?err, "backlight change still failing");
                }
                self.failed_writes = self.failed_writes.saturating_add(1);
                None
            }
        }
    }
}
