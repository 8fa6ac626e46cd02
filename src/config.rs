//! Shadow engine settings with defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ShadowError};

/// Tuning knobs for one terrain shadow invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShadowConfig {
    /// Number of grid rows covering the rotated bounding box.
    pub rows: usize,
    /// Number of grid columns covering the rotated bounding box.
    pub cols: usize,
    /// Sun elevation (degrees) below which shadowing is skipped.
    pub min_sun_elevation_deg: f64,
    /// A face occludes another only if its rotated elevation exceeds the
    /// other's by more than this amount.
    pub height_tolerance: f64,
    /// Projected overlap at or below this value counts as touching only.
    pub contact_tolerance: f64,
    /// Bounding box padding, relative to the box extent.
    pub bounds_padding: f64,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 5,
            min_sun_elevation_deg: 5.0,
            height_tolerance: 0.0,
            contact_tolerance: 0.0,
            bounds_padding: 1e-6,
        }
    }
}

impl ShadowConfig {
    /// Config with the given grid resolution and defaults elsewhere.
    pub fn with_grid(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ShadowError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ShadowError::InvalidGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if !self.min_sun_elevation_deg.is_finite() {
            return Err(ShadowError::InvalidConfig(
                "min_sun_elevation_deg must be finite".into(),
            ));
        }
        for (name, value) in [
            ("height_tolerance", self.height_tolerance),
            ("contact_tolerance", self.contact_tolerance),
            ("bounds_padding", self.bounds_padding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ShadowError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(ConfigError::ParseError)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new().depth_limit(2);
        ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)
    }

    /// Load a config file. Fields absent from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config = Self::from_ron_str(&contents)?;
        log::debug!("Loaded shadow config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_ron_string()?;
        std::fs::write(path, contents).map_err(ConfigError::WriteError)?;
        log::debug!("Saved shadow config to {}", path.display());
        Ok(())
    }
}
