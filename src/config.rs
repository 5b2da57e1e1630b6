//! Every tunable constant of the rig lives in an [`ExperimentConfig`]. The
//! defaults match the physical setup in the lab; a RON file can override any
//! subset of them:
//!
//! ```text
//! (
//!     link: (baud_rate: 115200),
//!     physics: (mass_kg: 0.2),
//!     surface: (body_grit: 120, table_grit: 80),
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs::File, io::Read, path::Path, time::Duration};

/// Settings for the serial link and the deadlines of the capture protocol.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Baud rate of the serial port
    pub baud_rate: u32,
    /// Seconds to wait for the device to report ready
    pub handshake_timeout_s: f64,
    /// Seconds to wait for the ramp to reach the commanded angle
    pub positioning_timeout_s: f64,
    /// Seconds for the stream to start and finish once the ramp is positioned
    pub capture_timeout_s: f64,
    /// Milliseconds between polls of an idle transport
    pub poll_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            baud_rate: 9600,
            handshake_timeout_s: 15.0,
            positioning_timeout_s: 15.0,
            capture_timeout_s: 10.0,
            poll_interval_ms: 5,
        }
    }
}

impl LinkConfig {
    /// [`LinkConfig::handshake_timeout_s`] as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.handshake_timeout_s)
    }

    /// [`LinkConfig::positioning_timeout_s`] as a [`Duration`].
    pub fn positioning_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.positioning_timeout_s)
    }

    /// [`LinkConfig::capture_timeout_s`] as a [`Duration`].
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.capture_timeout_s)
    }

    /// [`LinkConfig::poll_interval_ms`] as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Parameters of the rigid-body-on-incline model and of the filters that
/// tame the sensor noise before differentiation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Mass of the sliding body in kilograms
    pub mass_kg: f64,
    /// Gravitational acceleration in m/s²
    pub gravity: f64,
    /// Width of the centered median filter over raw distances
    pub median_window: usize,
    /// Width of the centered moving average over velocity
    pub smoothing_window: usize,
    /// Velocity (m/s) above which the body counts as moving
    pub motion_threshold: f64,
    /// A trial needs strictly more samples than this
    pub min_samples: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            mass_kg: 0.04,
            gravity: 9.81,
            median_window: 9,
            smoothing_window: 5,
            motion_threshold: 0.05,
            min_samples: 10,
        }
    }
}

/// Sandpaper grits on the body and on the ramp. They do not enter the
/// physics, they only label the reports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Sandpaper grit on the sliding body
    pub body_grit: u32,
    /// Sandpaper grit on the ramp
    pub table_grit: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig {
            body_grit: 220,
            table_grit: 80,
        }
    }
}

/// The full configuration of an operator session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Serial link and timeouts
    pub link: LinkConfig,
    /// Constants and filters of the analysis
    pub physics: PhysicsConfig,
    /// Surfaces in contact
    pub surface: SurfaceConfig,
}

/// Returned when a configuration can not be read or makes no physical sense.
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when the configuration file can not be read.
    Io(std::io::Error),

    /// Returned when the file is not valid RON for an [`ExperimentConfig`].
    Ron(ron::de::SpannedError),

    /// Returned when a value is out of its allowed range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::Io(error) => Cow::from(format!("io error: {}", error)),
            ConfigError::Ron(error) => Cow::from(format!("ron error: {}", error)),
            ConfigError::Invalid(what) => Cow::from(format!("invalid config: {}", what)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl ExperimentConfig {
    /// Read a configuration from the RON file at `path` and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut handle = File::open(path).map_err(ConfigError::Io)?;
        let mut text = String::new();
        handle
            .read_to_string(&mut text)
            .map_err(ConfigError::Io)?;
        Self::from_ron(&text)
    }

    /// Parse a configuration from RON text and validate it.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: ExperimentConfig = ron::de::from_str(text).map_err(ConfigError::Ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the capture and physics code rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.physics;
        if !(p.mass_kg.is_finite() && p.mass_kg > 0.0) {
            return Err(ConfigError::Invalid("mass_kg must be positive"));
        }
        if !(p.gravity.is_finite() && p.gravity > 0.0) {
            return Err(ConfigError::Invalid("gravity must be positive"));
        }
        if p.median_window == 0 || p.median_window % 2 == 0 {
            return Err(ConfigError::Invalid("median_window must be odd"));
        }
        if p.smoothing_window == 0 || p.smoothing_window % 2 == 0 {
            return Err(ConfigError::Invalid("smoothing_window must be odd"));
        }
        if !p.motion_threshold.is_finite() {
            return Err(ConfigError::Invalid("motion_threshold must be finite"));
        }

        let l = &self.link;
        let timeouts = [
            l.handshake_timeout_s,
            l.positioning_timeout_s,
            l.capture_timeout_s,
        ];
        if timeouts.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(ConfigError::Invalid("timeouts must be non-negative seconds"));
        }
        if l.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive"));
        }
        Ok(())
    }
}
