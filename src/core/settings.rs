use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::SystemTiming;

/// Settings that can't drive a console.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unable to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("The PPU must be clocked at least once per CPU cycle")]
    ZeroClockRatio,
    #[error("The refresh rate must be at least 1 frame per second")]
    ZeroRefreshRate,
    #[error("Invalid frame geometry: {0:?}")]
    InvalidTiming(SystemTiming),
}

/// Settings for how to run the console.
///
/// Threaded into the [Console][crate::core::Console] when it is created and never changed afterwards.
/// Every field has a default, so a settings file only has to mention the values it overrides.
/// ```
/// use nes_tandem::core::Settings;
/// let settings = Settings::from_yaml("debug: true\nlimit_speed: false").unwrap();
/// assert!(settings.debug);
/// assert_eq!(settings.refresh_rate, 60);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Verbose per-frame diagnostics.
    /// Also used by [init_logger][crate::core::init_logger] to pick the log level.
    pub debug: bool,
    /// Frames per second of the emulated display, vblank included.
    pub refresh_rate: u32,
    /// How many PPU clocks elapse for every CPU cycle.
    pub ppu_clocks_per_cpu_cycle: u32,
    /// Frame geometry handed to the PPU before the first step.
    pub timing: SystemTiming,
    /// Whether to sleep away the slack at the end of each frame.
    /// Turning this off runs the console as fast as the host allows.
    pub limit_speed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            refresh_rate: 60,
            ppu_clocks_per_cpu_cycle: 3,
            timing: SystemTiming::NTSC,
            limit_speed: true,
        }
    }
}

impl Settings {
    /// Parse settings from a YAML document and [validate](Settings::validate) them.
    pub fn from_yaml(yaml: &str) -> Result<Settings, SettingsError> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }
    /// Check that the settings describe a console that can run.
    ///
    /// The clock ratio and refresh rate must be non zero, and the frame must have
    /// at least one dot, more scanlines than visible ones, and fit in a `u32` of clocks.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ppu_clocks_per_cpu_cycle == 0 {
            return Err(SettingsError::ZeroClockRatio);
        }
        if self.refresh_rate == 0 {
            return Err(SettingsError::ZeroRefreshRate);
        }
        let t = self.timing;
        let frame = t.dots_per_scanline.checked_mul(t.scanlines);
        if t.dots_per_scanline == 0 || t.visible_scanlines >= t.scanlines || frame.is_none() {
            return Err(SettingsError::InvalidTiming(t));
        }
        Ok(())
    }
    /// Serialize the settings as a YAML document.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
