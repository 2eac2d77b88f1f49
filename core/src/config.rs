//! Filter configuration files.
//!
//! A [`FilterConfig`] gathers everything a [`crate::filter::NavigationFilter`] needs before the
//! first IMU sample: the sensor error model, the covariance prior, the GNSS update gate and the
//! least-squares controls used for cold start. It reads and writes JSON, YAML or TOML, chosen
//! by file extension. Every field has a default, so partial files are accepted.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::earth::Ellipsoid;
use crate::filter::{ClockSpec, ImuSpec};
use crate::least_squares::LeastSquaresConfig;

/// One-sigma uncertainties of the error-state prior.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorSigmas {
    /// Position, meters per NED axis
    pub position: f64,
    /// Velocity, m/s per NED axis
    pub velocity: f64,
    /// Attitude, radians per axis
    pub attitude: f64,
    /// Accelerometer bias, m/s^2
    pub accel_bias: f64,
    /// Gyroscope bias, rad/s
    pub gyro_bias: f64,
    /// Clock bias, meters
    pub clock_bias: f64,
    /// Clock drift, m/s
    pub clock_drift: f64,
}
impl Default for PriorSigmas {
    fn default() -> Self {
        PriorSigmas {
            position: 5.0,
            velocity: 0.1,
            attitude: 1.0_f64.to_radians(),
            accel_bias: 0.01,
            gyro_bias: 1e-4,
            clock_bias: 10.0,
            clock_drift: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Fewest satellites a GNSS update accepts
    pub min_satellites: usize,
    pub imu: ImuSpec,
    pub clock: ClockSpec,
    pub prior: PriorSigmas,
    pub least_squares: LeastSquaresConfig,
    /// Earth model override; WGS84 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ellipsoid: Option<Ellipsoid>,
}
impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            min_satellites: 4,
            imu: ImuSpec::default(),
            clock: ClockSpec::default(),
            prior: PriorSigmas::default(),
            least_squares: LeastSquaresConfig::default(),
            ellipsoid: None,
        }
    }
}

/// Serialization format of a configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}
impl ConfigFormat {
    /// Format implied by a `.json`, `.yaml`/`.yml` or `.toml` extension, case-insensitive.
    pub fn from_path(path: &Path) -> io::Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml" | "yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported configuration file {}", path.display()),
            )),
        }
    }
}

impl FilterConfig {
    /// Render the configuration as text; JSON is pretty-printed.
    pub fn to_string_as(&self, format: ConfigFormat) -> io::Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(io::Error::other),
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(io::Error::other),
            ConfigFormat::Toml => toml::to_string(self).map_err(io::Error::other),
        }
    }
    /// Parse a configuration; fields missing from `text` take their defaults.
    pub fn from_str_as(text: &str, format: ConfigFormat) -> io::Result<FilterConfig> {
        let invalid = |e: String| io::Error::new(io::ErrorKind::InvalidData, e);
        match format {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| invalid(e.to_string())),
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| invalid(e.to_string())),
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| invalid(e.to_string())),
        }
    }
    /// Write to `path` in the format named by its extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        let text = self.to_string_as(ConfigFormat::from_path(path)?)?;
        fs::write(path, text)
    }
    /// Read from `path` in the format named by its extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<FilterConfig> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        FilterConfig::from_str_as(&fs::read_to_string(path)?, format)
    }
}
