//! Locating the radius where the enclosed density drops below a threshold

use crate::core_types::cosmo::ReferenceDensities;
use crate::core_types::units::Quantity;
use crate::error::{SoError, SoResult};
use crate::properties::profile::DensityProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Reference density an overdensity is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OverdensityType {
    Critical,
    Mean,
}

impl OverdensityType {
    /// Short form used in property names
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OverdensityType::Critical => "crit",
            OverdensityType::Mean => "mean",
        }
    }

    /// Long form used in property descriptions
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            OverdensityType::Critical => "critical",
            OverdensityType::Mean => "mean",
        }
    }

    /// Pick the matching density from `densities`
    #[must_use]
    pub fn reference(self, densities: &ReferenceDensities) -> Quantity {
        match self {
            OverdensityType::Critical => densities.critical,
            OverdensityType::Mean => densities.mean,
        }
    }
}

impl FromStr for OverdensityType {
    type Err = SoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crit" => Ok(OverdensityType::Critical),
            "mean" => Ok(OverdensityType::Mean),
            other => Err(SoError::UnknownOverdensityType(other.to_string())),
        }
    }
}

impl TryFrom<String> for OverdensityType {
    type Error = SoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OverdensityType> for String {
    fn from(t: OverdensityType) -> String {
        t.as_str().to_string()
    }
}

impl fmt::Display for OverdensityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scanning a density profile outward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdCrossing {
    /// First entry whose density is below the reference
    Crossed { index: usize },
    /// Density exceeds the reference somewhere but never drops back below
    /// it within the profile
    NotCrossed,
    /// No entry exceeds the reference (includes the empty profile)
    NeverReached,
}

/// Scan `density` from the centre outward against `reference`
///
/// Returns the first crossing, not the last: a non-monotonic profile that
/// dips below the reference and rises again is cut at the first dip.
#[must_use]
pub fn find_crossing(density: &[f64], reference: f64) -> ThresholdCrossing {
    if !density.iter().any(|&d| d > reference) {
        return ThresholdCrossing::NeverReached;
    }
    match density.iter().position(|&d| d < reference) {
        Some(index) => ThresholdCrossing::Crossed { index },
        None => ThresholdCrossing::NotCrossed,
    }
}

/// SO radius and the mass it encloses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoRadius {
    pub radius: Quantity,
    pub mass: Quantity,
    pub crossing: ThresholdCrossing,
}

impl SoRadius {
    /// Whether the loaded region was too small to contain the SO radius
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.crossing == ThresholdCrossing::NotCrossed
    }
}

/// Solve for the SO radius of `profile` against `reference`
///
/// A halo that never reaches the reference density gets a radius and mass of
/// exactly zero in the profile's units. A halo whose density stays above the
/// reference out to the last particle has no crossing inside the loaded
/// region and is cut at the innermost entry, flagged as exhausted.
///
/// # Errors
/// Returns `SoError::Unit` if `reference` is not a density.
pub fn solve_threshold(profile: &DensityProfile, reference: Quantity) -> SoResult<SoRadius> {
    let reference = reference.value_in(profile.density_unit())?;
    let crossing = find_crossing(profile.density(), reference);
    let index = match crossing {
        ThresholdCrossing::Crossed { index } => Some(index),
        ThresholdCrossing::NotCrossed => {
            warn!(
                "Density stays above reference out to r = {} {}",
                profile.radius().last().copied().unwrap_or(0.0),
                profile.length_unit()
            );
            (!profile.is_empty()).then_some(0)
        }
        ThresholdCrossing::NeverReached => None,
    };

    let (radius, mass) = index
        .and_then(|i| Some((profile.radius_at(i)?, profile.mass_at(i)?)))
        .unwrap_or((
            Quantity::zero(profile.length_unit()),
            Quantity::zero(profile.mass_unit()),
        ));
    Ok(SoRadius {
        radius,
        mass,
        crossing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::particles::{fields, ParticleData, PartType, SpeciesData};
    use crate::core_types::units::{Quantities, Unit, VectorQuantity, Vectors};
    use crate::core_types::vec3::Vec3;
    use crate::properties::profile::ParticleArrays;
    use crate::properties::SnapshotUnits;

    fn profile(radii: &[f64]) -> DensityProfile {
        let n = radii.len();
        let dm = SpeciesData::new(PartType::DarkMatter)
            .with_vector(
                fields::COORDINATES,
                Vectors::new(radii.iter().map(|&r| Vec3::new(0.0, r, 0.0)).collect(), Unit::MPC),
            )
            .with_vector(fields::VELOCITIES, Vectors::new(vec![Vec3::zeros(); n], Unit::KM_PER_S))
            .with_scalar(fields::MASSES, Quantities::new(vec![1.0; n], Unit::MSUN));
        let arrays = ParticleArrays::gather(
            &ParticleData::new().with_species(dm),
            &VectorQuantity::zero(Unit::MPC),
            &SnapshotUnits::default(),
        )
        .unwrap();
        DensityProfile::build(&arrays)
    }

    #[test]
    fn test_parse_overdensity_type() {
        assert_eq!("crit".parse::<OverdensityType>().unwrap(), OverdensityType::Critical);
        assert_eq!("mean".parse::<OverdensityType>().unwrap(), OverdensityType::Mean);
        let err = "virial".parse::<OverdensityType>().unwrap_err();
        assert!(matches!(err, SoError::UnknownOverdensityType(ref t) if t == "virial"));
    }

    #[test]
    fn test_first_crossing_wins() {
        let density = [10.0, 4.0, 12.0, 3.0];
        assert_eq!(find_crossing(&density, 5.0), ThresholdCrossing::Crossed { index: 1 });
    }

    #[test]
    fn test_never_reached_and_not_crossed() {
        assert_eq!(find_crossing(&[], 1.0), ThresholdCrossing::NeverReached);
        assert_eq!(find_crossing(&[0.5, 0.2], 1.0), ThresholdCrossing::NeverReached);
        assert_eq!(find_crossing(&[5.0, 3.0], 1.0), ThresholdCrossing::NotCrossed);
    }

    #[test]
    fn test_never_reached_gives_zero_with_units() {
        let p = profile(&[1.0, 2.0]);
        let reference = Quantity::new(1.0e6, Unit::MSUN_PER_MPC3);
        let so = solve_threshold(&p, reference).unwrap();
        assert!(so.radius.is_zero());
        assert!(so.mass.is_zero());
        assert_eq!(so.radius.unit(), Unit::MPC);
        assert_eq!(so.mass.unit(), Unit::MSUN);
        assert!(!so.is_exhausted());
    }

    #[test]
    fn test_not_crossed_uses_innermost_entry() {
        // Density 1/(4/3 pi r^3) * n stays far above 2e-4 out to r = 5
        let p = profile(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let so = solve_threshold(&p, Quantity::new(200.0e-6, Unit::MSUN_PER_MPC3)).unwrap();
        assert_eq!(so.crossing, ThresholdCrossing::NotCrossed);
        assert_eq!(so.radius.value(), 1.0);
        assert_eq!(so.mass.value(), 1.0);
        assert_eq!(so.radius.unit(), Unit::MPC);
        assert!(so.is_exhausted());
    }

    #[test]
    fn test_reference_must_be_density() {
        let p = profile(&[1.0]);
        assert!(solve_threshold(&p, Quantity::new(1.0, Unit::MSUN)).is_err());
    }
}
