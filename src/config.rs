use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};

use crate::schedule::BrightnessSchedule;

/// Runtime settings for one slideshow process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowConfig {
    /// Delay between successive images.
    pub period: Duration,
    /// Directory whose entries are cycled.
    pub store: PathBuf,
    /// Backlight hours; `None` leaves the panel alone.
    pub brightness: Option<BrightnessSchedule>,
}

impl SlideshowConfig {
    /// Build from the positional command-line values. A zero `backlight`
    /// flag disables brightness control and the hours are ignored.
    pub fn from_args(
        period_ms: u64,
        store: PathBuf,
        on_time: u8,
        off_time: u8,
        backlight: i64,
    ) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            store,
            brightness: (backlight != 0).then(|| BrightnessSchedule::new(on_time, off_time)),
        }
    }

    /// Validate runtime invariants the argument parser cannot express.
    ///
    /// # Errors
    /// Returns an error if the period is zero, the store is not a directory,
    /// or an enabled schedule names an hour outside 0-23.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.period.is_zero(), "period_ms must be greater than zero");
        ensure!(
            self.store.is_dir(),
            "store {} is not a readable directory",
            self.store.display()
        );
        if let Some(schedule) = self.brightness {
            ensure!(
                schedule.on_hour < 24,
                "on_time must be an hour between 0 and 23"
            );
            ensure!(
                schedule.off_hour < 24,
                "off_time must be an hour between 0 and 23"
            );
        }
        Ok(self)
    }
}
