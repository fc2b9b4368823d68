//! Aggregates over the particles inside the SO radius

use crate::core_types::particles::{fields, ParticleData, PartType};
use crate::core_types::units::{Quantities, Quantity, Unit, VectorQuantity};
use crate::core_types::vec3::Vec3;
use crate::error::{SoError, SoResult};
use crate::properties::profile::ParticleArrays;
use crate::properties::SnapshotUnits;
use serde::Serialize;

/// Gas above this temperature counts as hot, in Kelvin
pub const HOT_GAS_TEMPERATURE_K: f64 = 1.0e5;

/// Totals over the particles strictly inside the SO radius
///
/// Every field always carries a unit from [`SnapshotUnits`], including the
/// all-zero aggregates of a halo with no SO radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ApertureAggregates {
    pub total_mass: Quantity,
    pub centre_of_mass: VectorQuantity,
    pub centre_of_mass_velocity: VectorQuantity,
    pub gas_mass: Quantity,
    pub dark_matter_mass: Quantity,
    pub stellar_mass: Quantity,
    pub black_hole_dynamical_mass: Quantity,
    pub initial_stellar_mass: Quantity,
    pub black_hole_subgrid_mass: Quantity,
    pub hot_gas_mass: Quantity,
    /// Mass-weighted, over hot gas only; zero when there is none
    pub hot_gas_temperature: Quantity,
    pub xray_luminosity: Quantity,
    pub xray_photon_luminosity: Quantity,
    pub compton_y: Quantity,
}

impl ApertureAggregates {
    #[must_use]
    pub fn zero(units: &SnapshotUnits) -> Self {
        let mass = Quantity::zero(units.mass);
        ApertureAggregates {
            total_mass: mass,
            centre_of_mass: VectorQuantity::zero(units.length),
            centre_of_mass_velocity: VectorQuantity::zero(units.velocity),
            gas_mass: mass,
            dark_matter_mass: mass,
            stellar_mass: mass,
            black_hole_dynamical_mass: mass,
            initial_stellar_mass: mass,
            black_hole_subgrid_mass: mass,
            hot_gas_mass: mass,
            hot_gas_temperature: Quantity::zero(units.temperature),
            xray_luminosity: Quantity::zero(units.luminosity),
            xray_photon_luminosity: Quantity::zero(units.photon_luminosity),
            compton_y: Quantity::zero(units.compton_y),
        }
    }

    /// Sum of the per-species masses that make up the profile
    ///
    /// # Errors
    /// Returns `SoError::Unit` if the species masses disagree in dimension.
    pub fn species_mass_sum(&self) -> SoResult<Quantity> {
        Ok(self
            .gas_mass
            .try_add(self.dark_matter_mass)?
            .try_add(self.stellar_mass)?
            .try_add(self.black_hole_dynamical_mass)?)
    }

    /// Recompute aggregates over particles with radius below `so_radius`
    ///
    /// Selection uses the unsorted concatenated arrays; species-only fields
    /// (temperatures, luminosities, initial and sub-grid masses) are read
    /// from `data` at the matching species rows.
    ///
    /// # Errors
    /// Returns an error if a required species field is missing or has the
    /// wrong dimension, or if `so_radius` or `centre` is not a length.
    pub fn compute(
        arrays: &ParticleArrays,
        data: &ParticleData,
        centre: &VectorQuantity,
        so_radius: Quantity,
        units: &SnapshotUnits,
    ) -> SoResult<Self> {
        let mut out = ApertureAggregates::zero(units);
        if so_radius.is_zero() {
            return Ok(out);
        }
        let r_so = so_radius.value_in(units.length)?;
        let centre = centre.to(units.length)?;
        let t_hot = Quantity::new(HOT_GAS_TEMPERATURE_K, Unit::KELVIN).value_in(units.temperature)?;

        let radius = arrays.radius();
        let mass = arrays.mass().values();
        let position = arrays.position().values();
        let velocity = arrays.velocity().values();

        let mut total = 0.0_f64;
        let mut mass_position = Vec3::zeros();
        let mut mass_velocity = Vec3::zeros();
        for (part_type, rows) in arrays.species_rows() {
            let species = data.get(*part_type);
            let extra = |name: &str, unit: Unit| -> SoResult<Quantities> {
                let values = match species {
                    Some(s) => s.scalar(name)?.to(unit)?,
                    None => Quantities::empty(unit),
                };
                if values.len() != rows.len() {
                    return Err(SoError::FieldLengthMismatch {
                        part_type: part_type.to_string(),
                        field: name.to_string(),
                        expected: rows.len(),
                        found: values.len(),
                    });
                }
                Ok(values)
            };

            let mut species_mass = 0.0_f64;
            match part_type {
                PartType::Gas => {
                    let temperature = extra(fields::TEMPERATURES, units.temperature)?;
                    let xray = extra(fields::XRAY_LUMINOSITIES, units.luminosity)?;
                    let xray_photon =
                        extra(fields::XRAY_PHOTON_LUMINOSITIES, units.photon_luminosity)?;
                    let compton_y = extra(fields::COMPTON_Y_PARAMETERS, units.compton_y)?;
                    let (mut hot_mass, mut hot_mass_temperature) = (0.0, 0.0);
                    let (mut lx, mut lx_photon, mut y) = (0.0, 0.0, 0.0);
                    for (local, i) in rows.clone().enumerate() {
                        if radius[i] >= r_so {
                            continue;
                        }
                        species_mass += mass[i];
                        let t = temperature.values()[local];
                        if t > t_hot {
                            hot_mass += mass[i];
                            hot_mass_temperature += mass[i] * t;
                        }
                        lx += xray.values()[local];
                        lx_photon += xray_photon.values()[local];
                        y += compton_y.values()[local];
                    }
                    out.gas_mass = Quantity::new(species_mass, units.mass);
                    out.hot_gas_mass = Quantity::new(hot_mass, units.mass);
                    if hot_mass > 0.0 {
                        out.hot_gas_temperature =
                            Quantity::new(hot_mass_temperature / hot_mass, units.temperature);
                    }
                    out.xray_luminosity = Quantity::new(lx, units.luminosity);
                    out.xray_photon_luminosity = Quantity::new(lx_photon, units.photon_luminosity);
                    out.compton_y = Quantity::new(y, units.compton_y);
                }
                PartType::DarkMatter => {
                    species_mass = rows
                        .clone()
                        .filter(|&i| radius[i] < r_so)
                        .map(|i| mass[i])
                        .sum();
                    out.dark_matter_mass = Quantity::new(species_mass, units.mass);
                }
                PartType::Stars => {
                    let initial = extra(fields::INITIAL_MASSES, units.mass)?;
                    let mut initial_mass = 0.0;
                    for (local, i) in rows.clone().enumerate() {
                        if radius[i] < r_so {
                            species_mass += mass[i];
                            initial_mass += initial.values()[local];
                        }
                    }
                    out.stellar_mass = Quantity::new(species_mass, units.mass);
                    out.initial_stellar_mass = Quantity::new(initial_mass, units.mass);
                }
                PartType::BlackHoles => {
                    let subgrid = extra(fields::SUBGRID_MASSES, units.mass)?;
                    let mut subgrid_mass = 0.0;
                    for (local, i) in rows.clone().enumerate() {
                        if radius[i] < r_so {
                            species_mass += mass[i];
                            subgrid_mass += subgrid.values()[local];
                        }
                    }
                    out.black_hole_dynamical_mass = Quantity::new(species_mass, units.mass);
                    out.black_hole_subgrid_mass = Quantity::new(subgrid_mass, units.mass);
                }
            }

            for i in rows.clone().filter(|&i| radius[i] < r_so) {
                mass_position += position[i] * mass[i];
                mass_velocity += velocity[i] * mass[i];
            }
            total += species_mass;
        }

        out.total_mass = Quantity::new(total, units.mass);
        if total > 0.0 {
            out.centre_of_mass =
                VectorQuantity::new(mass_position / total + centre.value(), units.length);
            out.centre_of_mass_velocity =
                VectorQuantity::new(mass_velocity / total, units.velocity);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::particles::SpeciesData;
    use crate::core_types::units::Vectors;
    use approx::assert_relative_eq;

    fn positions(xs: &[f64]) -> Vectors {
        Vectors::new(xs.iter().map(|&x| Vec3::new(x, 0.0, 0.0)).collect(), Unit::MPC)
    }

    fn velocities(n: usize, v: f64) -> Vectors {
        Vectors::new(vec![Vec3::new(0.0, v, 0.0); n], Unit::KM_PER_S)
    }

    fn scalars(values: &[f64], unit: Unit) -> Quantities {
        Quantities::new(values.to_vec(), unit)
    }

    fn gas(xs: &[f64], temperatures: &[f64]) -> SpeciesData {
        let n = xs.len();
        SpeciesData::new(PartType::Gas)
            .with_vector(fields::COORDINATES, positions(xs))
            .with_vector(fields::VELOCITIES, velocities(n, 0.0))
            .with_scalar(fields::MASSES, scalars(&vec![2.0; n], Unit::MSUN))
            .with_scalar(fields::TEMPERATURES, scalars(temperatures, Unit::KELVIN))
            .with_scalar(fields::XRAY_LUMINOSITIES, scalars(&vec![1.0; n], Unit::ERG_PER_S))
            .with_scalar(fields::XRAY_PHOTON_LUMINOSITIES, scalars(&vec![3.0; n], Unit::PER_SECOND))
            .with_scalar(fields::COMPTON_Y_PARAMETERS, scalars(&vec![0.5; n], Unit::MPC2))
    }

    fn dark_matter(xs: &[f64]) -> SpeciesData {
        let n = xs.len();
        SpeciesData::new(PartType::DarkMatter)
            .with_vector(fields::COORDINATES, positions(xs))
            .with_vector(fields::VELOCITIES, velocities(n, 10.0))
            .with_scalar(fields::MASSES, scalars(&vec![1.0; n], Unit::MSUN))
    }

    fn aggregate(data: &ParticleData, radius: f64) -> ApertureAggregates {
        let units = SnapshotUnits::default();
        let centre = VectorQuantity::new(Vec3::new(100.0, 0.0, 0.0), Unit::MPC);
        let arrays = ParticleArrays::gather(data, &centre, &units).unwrap();
        let radius = Quantity::new(radius, Unit::MPC);
        ApertureAggregates::compute(&arrays, data, &centre, radius, &units).unwrap()
    }

    #[test]
    fn test_selection_is_strict() {
        let data = ParticleData::new().with_species(dark_matter(&[101.0, 102.0, 103.0]));
        let agg = aggregate(&data, 2.0);
        assert_eq!(agg.dark_matter_mass.value(), 1.0);
        assert_eq!(agg.total_mass.value(), 1.0);
    }

    #[test]
    fn test_centre_of_mass_reoffset() {
        let data = ParticleData::new().with_species(dark_matter(&[101.0, 99.0, 102.0]));
        let agg = aggregate(&data, 1.5);
        assert_relative_eq!(agg.centre_of_mass.value().x, 100.0, epsilon = 1e-12);
        assert_relative_eq!(agg.centre_of_mass_velocity.value().y, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cold_gas_only_gives_zero_temperature() {
        let data = ParticleData::new().with_species(gas(&[100.5, 101.0], &[1.0e4, 9.0e4]));
        let agg = aggregate(&data, 5.0);
        assert_eq!(agg.gas_mass.value(), 4.0);
        assert_eq!(agg.hot_gas_mass.value(), 0.0);
        assert_eq!(agg.hot_gas_temperature.value(), 0.0);
        assert!(!agg.hot_gas_temperature.value().is_nan());
        assert_eq!(agg.hot_gas_temperature.unit(), Unit::KELVIN);
        // Luminosities cover all gas, hot or not
        assert_eq!(agg.xray_luminosity.value(), 2.0);
        assert_eq!(agg.xray_photon_luminosity.value(), 6.0);
        assert_eq!(agg.compton_y.value(), 1.0);
    }

    #[test]
    fn test_hot_gas_mass_weighted_temperature() {
        let data = ParticleData::new()
            .with_species(gas(&[100.5, 101.0, 101.5], &[2.0e5, 4.0e5, 1.0e3]));
        let agg = aggregate(&data, 5.0);
        assert_eq!(agg.hot_gas_mass.value(), 4.0);
        assert_relative_eq!(agg.hot_gas_temperature.value(), 3.0e5);
    }

    #[test]
    fn test_zero_radius_gives_unit_tagged_zeros() {
        let data = ParticleData::new().with_species(dark_matter(&[101.0]));
        let agg = aggregate(&data, 0.0);
        assert_eq!(agg, ApertureAggregates::zero(&SnapshotUnits::default()));
        assert_eq!(agg.compton_y.unit(), Unit::MPC2);
        assert_eq!(agg.centre_of_mass_velocity.unit(), Unit::KM_PER_S);
    }

    #[test]
    fn test_missing_gas_field_is_an_error() {
        let units = SnapshotUnits::default();
        let centre = VectorQuantity::zero(Unit::MPC);
        let bare_gas = SpeciesData::new(PartType::Gas)
            .with_vector(fields::COORDINATES, positions(&[0.5]))
            .with_vector(fields::VELOCITIES, velocities(1, 0.0))
            .with_scalar(fields::MASSES, scalars(&[1.0], Unit::MSUN));
        let data = ParticleData::new().with_species(bare_gas);
        let arrays = ParticleArrays::gather(&data, &centre, &units).unwrap();
        let result = ApertureAggregates::compute(
            &arrays,
            &data,
            &centre,
            Quantity::new(1.0, Unit::MPC),
            &units,
        );
        assert!(result.is_err());
    }
}
