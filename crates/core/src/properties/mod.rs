//! Halo property calculators
//!
//! A calculator is a pure function of one halo's context and particle data.
//! Calculators never touch shared state: each returns an immutable
//! [`HaloResult`] that the caller merges into the halo's record.
//!
//! The set of calculators is closed. New property families are added as
//! variants of [`PropertyCalculator`], so selecting and running them needs no
//! registry.

pub mod aperture;
pub mod profile;
pub mod result;
pub mod so;
pub mod threshold;

pub use aperture::{ApertureAggregates, HOT_GAS_TEMPERATURE_K};
pub use profile::{DensityProfile, ParticleArrays};
pub use result::{HaloRecord, HaloResult, ResultEntry, ResultValue};
pub use so::{SoMeasurement, SoProperties};
pub use threshold::{find_crossing, solve_threshold, OverdensityType, SoRadius, ThresholdCrossing};

use crate::core_types::particles::{ParticleData, PartType};
use crate::core_types::units::Unit;
use crate::error::SoResult;
use crate::halo::HaloContext;
use serde::Serialize;

/// Units every particle array is converted into before use
///
/// Results are reported in these units whether or not a halo is degenerate,
/// so a field's dimension never depends on which branch produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotUnits {
    pub length: Unit,
    pub mass: Unit,
    pub velocity: Unit,
    pub temperature: Unit,
    pub luminosity: Unit,
    pub photon_luminosity: Unit,
    pub compton_y: Unit,
}

impl Default for SnapshotUnits {
    fn default() -> Self {
        SnapshotUnits {
            length: Unit::MPC,
            mass: Unit::MSUN,
            velocity: Unit::KM_PER_S,
            temperature: Unit::KELVIN,
            luminosity: Unit::ERG_PER_S,
            photon_luminosity: Unit::PER_SECOND,
            compton_y: Unit::MPC2,
        }
    }
}

impl SnapshotUnits {
    /// Unit of mass over length cubed
    #[must_use]
    pub fn density(&self) -> Unit {
        self.mass / self.length.powi(3)
    }

    /// Check every unit has the dimension its role implies
    ///
    /// # Errors
    /// Returns `SoError::Unit` naming the first unit of the wrong dimension.
    pub fn validate(&self) -> SoResult<()> {
        let checks = [
            (self.length, Unit::MPC),
            (self.mass, Unit::MSUN),
            (self.velocity, Unit::KM_PER_S),
            (self.temperature, Unit::KELVIN),
            (self.luminosity, Unit::ERG_PER_S),
            (self.photon_luminosity, Unit::PER_SECOND),
            (self.compton_y, Unit::MPC2),
        ];
        for (unit, reference) in checks {
            unit.conversion_factor(reference)?;
        }
        Ok(())
    }
}

/// Result of running one calculator on one halo
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyOutput {
    pub result: HaloResult,
    /// The loaded region was too small to find the property's radius
    pub radius_exhausted: bool,
}

/// Every property calculator the pipeline can run
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyCalculator {
    SphericalOverdensity(SoProperties),
}

impl PropertyCalculator {
    /// Name used to select the calculator in a run configuration
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            PropertyCalculator::SphericalOverdensity(so) => so.name(),
        }
    }

    /// Particle fields read for `part_type`
    #[must_use]
    pub fn required_fields(&self, part_type: PartType) -> &'static [&'static str] {
        match self {
            PropertyCalculator::SphericalOverdensity(_) => SoProperties::required_fields(part_type),
        }
    }

    /// # Errors
    /// Returns an error for malformed particle data; degenerate halos are
    /// not errors.
    pub fn compute(&self, halo: &HaloContext, data: &ParticleData) -> SoResult<PropertyOutput> {
        match self {
            PropertyCalculator::SphericalOverdensity(so) => so.calculate(halo, data),
        }
    }
}

impl From<SoProperties> for PropertyCalculator {
    fn from(so: SoProperties) -> Self {
        PropertyCalculator::SphericalOverdensity(so)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_units_are_consistent() {
        let units = SnapshotUnits::default();
        units.validate().unwrap();
        assert_eq!(units.density(), Unit::MSUN_PER_MPC3);
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let units = SnapshotUnits {
            temperature: Unit::MSUN,
            ..SnapshotUnits::default()
        };
        assert!(units.validate().is_err());
    }
}
