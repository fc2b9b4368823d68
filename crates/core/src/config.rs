//! Run configuration
//!
//! Loaded from JSON. Everything except the box size has a default, so a
//! minimal configuration is just `{ "box_size_mpc": 100.0 }`.
//!
//! ```
//! use halo_so_core::config::RunConfig;
//!
//! let config = RunConfig::from_json_str(r#"{
//!     "box_size_mpc": 67.77,
//!     "scale_factor": 0.5,
//!     "overdensities": [{ "multiple": 200, "type": "crit" }]
//! }"#).unwrap();
//! assert_eq!(config.overdensities.len(), 1);
//! ```

use crate::catalogue::search_radius::{SearchRadiusInitializer, DEFAULT_MINIMUM_READ_RADIUS_MPC};
use crate::core_types::cosmo::Cosmology;
use crate::core_types::units::{Quantity, Unit};
use crate::error::{SoError, SoResult};
use crate::pipeline::HaloProcessor;
use crate::properties::{OverdensityType, PropertyCalculator, SnapshotUnits, SoProperties};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One spherical overdensity definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverdensityConfig {
    pub multiple: f64,
    #[serde(rename = "type")]
    pub kind: OverdensityType,
}

impl OverdensityConfig {
    #[must_use]
    pub const fn new(multiple: f64, kind: OverdensityType) -> Self {
        OverdensityConfig { multiple, kind }
    }
}

fn default_minimum_read_radius() -> f64 {
    DEFAULT_MINIMUM_READ_RADIUS_MPC
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_nr_ranks() -> usize {
    1
}

fn default_comoving_densities() -> bool {
    true
}

fn default_overdensities() -> Vec<OverdensityConfig> {
    vec![
        OverdensityConfig::new(200.0, OverdensityType::Critical),
        OverdensityConfig::new(500.0, OverdensityType::Critical),
        OverdensityConfig::new(200.0, OverdensityType::Mean),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Periodic box size in comoving Mpc
    pub box_size_mpc: f64,
    /// Floor on the read radius in comoving Mpc
    #[serde(default = "default_minimum_read_radius")]
    pub minimum_read_radius_mpc: f64,
    /// Expansion factor of the snapshot
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default)]
    pub cosmology: Cosmology,
    /// Compare against comoving rather than physical densities, matching
    /// particle coordinates in comoving Mpc
    #[serde(default = "default_comoving_densities")]
    pub comoving_densities: bool,
    /// Worker ranks used to initialise the catalogue
    #[serde(default = "default_nr_ranks")]
    pub nr_ranks: usize,
    #[serde(default = "default_overdensities")]
    pub overdensities: Vec<OverdensityConfig>,
    /// Calculator names to run; empty runs all
    #[serde(default)]
    pub calculators: Vec<String>,
}

impl RunConfig {
    /// Parse and validate a JSON configuration
    ///
    /// # Errors
    /// Returns `SoError::Json` for malformed JSON, unknown keys or an
    /// unknown overdensity type, and `SoError::Config` for invalid values.
    pub fn from_json_str(json: &str) -> SoResult<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `SoError::Io` if the file cannot be read, otherwise as
    /// [`RunConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> SoResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    /// # Errors
    /// Returns `SoError::Config` describing the first invalid value.
    pub fn validate(&self) -> SoResult<()> {
        let positive = [
            ("box_size_mpc", self.box_size_mpc),
            ("scale_factor", self.scale_factor),
            ("cosmology.h", self.cosmology.h),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SoError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.minimum_read_radius_mpc.is_nan() || self.minimum_read_radius_mpc < 0.0 {
            return Err(SoError::Config(format!(
                "minimum_read_radius_mpc must be non-negative, got {}",
                self.minimum_read_radius_mpc
            )));
        }
        if self.nr_ranks == 0 {
            return Err(SoError::Config("nr_ranks must be at least 1".to_string()));
        }
        if self.overdensities.is_empty() {
            return Err(SoError::Config("no overdensities configured".to_string()));
        }
        if let Some(od) = self
            .overdensities
            .iter()
            .find(|od| !(od.multiple.is_finite() && od.multiple > 0.0))
        {
            return Err(SoError::Config(format!(
                "overdensity multiple must be positive, got {}",
                od.multiple
            )));
        }
        Ok(())
    }

    /// # Errors
    /// See [`SearchRadiusInitializer::new`].
    pub fn search_radius_initializer(&self) -> SoResult<SearchRadiusInitializer> {
        SearchRadiusInitializer::new(
            Quantity::new(self.box_size_mpc, Unit::MPC),
            Quantity::new(self.minimum_read_radius_mpc, Unit::MPC),
            self.scale_factor,
        )
    }

    /// Build every configured calculator, keeping only the selected names
    ///
    /// # Errors
    /// Returns `SoError::Config` if a selected name matches no calculator,
    /// and `SoError::DuplicateProperty` if two definitions share a name.
    pub fn calculators(&self, units: SnapshotUnits) -> SoResult<Vec<PropertyCalculator>> {
        let densities = self
            .cosmology
            .reference_densities(self.scale_factor, self.comoving_densities);
        let all = self
            .overdensities
            .iter()
            .map(|od| {
                SoProperties::new(od.multiple, od.kind.as_str(), &densities, units)
                    .map(PropertyCalculator::from)
            })
            .collect::<SoResult<Vec<_>>>()?;

        if self.calculators.is_empty() {
            return Ok(all);
        }
        if let Some(missing) = self
            .calculators
            .iter()
            .find(|name| !all.iter().any(|c| c.name() == name.as_str()))
        {
            return Err(SoError::Config(format!("unknown calculator '{missing}'")));
        }
        Ok(all
            .into_iter()
            .filter(|c| self.calculators.iter().any(|name| name == c.name()))
            .collect())
    }

    /// # Errors
    /// See [`RunConfig::calculators`] and [`HaloProcessor::new`].
    pub fn build_processor(&self, units: SnapshotUnits) -> SoResult<HaloProcessor> {
        HaloProcessor::new(self.calculators(units)?)
    }
}
