use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Raspberry Pi official touchscreen backlight.
pub const DEFAULT_BRIGHTNESS_PATH: &str = "/sys/class/backlight/rpi_backlight/brightness";

pub const BRIGHTNESS_ON: u8 = 255;
pub const BRIGHTNESS_OFF: u8 = 0;

/// A dimmable display panel.
pub trait Backlight {
    fn is_on(&self) -> bool;

    /// Set the panel brightness; `0` turns the panel dark.
    fn change_brightness(&mut self, level: u8) -> Result<()>;
}

/// Backlight driven through a sysfs `brightness` attribute.
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    path: PathBuf,
    on: bool,
}

impl SysfsBacklight {
    /// Open the attribute at `path`. The initial on/off state is read from it;
    /// an unreadable attribute is assumed to be lit.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let on = match read_level(&path) {
            Ok(level) => level > 0,
            Err(err) => {
                warn!(path = %path.display(), error = ?err, "cannot read backlight; assuming on");
                true
            }
        };
        debug!(path = %path.display(), on, "backlight opened");
        Self { path, on }
    }
}

impl Default for SysfsBacklight {
    fn default() -> Self {
        Self::new(DEFAULT_BRIGHTNESS_PATH)
    }
}

impl Backlight for SysfsBacklight {
    fn is_on(&self) -> bool {
        self.on
    }

    fn change_brightness(&mut self, level: u8) -> Result<()> {
        fs::write(&self.path, level.to_string())
            .with_context(|| format!("failed to write '{level}' to {}", self.path.display()))?;
        self.on = level > 0;
        Ok(())
    }
}

fn read_level(path: &Path) -> Result<u16> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.trim()
        .parse()
        .with_context(|| format!("unexpected brightness value '{}' in {}", raw.trim(), path.display()))
}
