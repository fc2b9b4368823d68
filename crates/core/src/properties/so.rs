//! Spherical overdensity properties
//!
//! For each halo: build the enclosed density profile about the potential
//! minimum, find the first radius where it drops below `multiple` times the
//! mean or critical density, then aggregate masses, kinematics, hot gas and
//! X-ray quantities inside that radius.

use crate::core_types::cosmo::ReferenceDensities;
use crate::core_types::particles::{fields, ParticleData, PartType};
use crate::core_types::units::Quantity;
use crate::error::{SoError, SoResult};
use crate::halo::HaloContext;
use crate::properties::aperture::ApertureAggregates;
use crate::properties::profile::{DensityProfile, ParticleArrays};
use crate::properties::result::{HaloResult, ResultValue};
use crate::properties::threshold::{solve_threshold, OverdensityType, SoRadius};
use crate::properties::{PropertyOutput, SnapshotUnits};
use tracing::debug;

const GAS_FIELDS: &[&str] = &[
    fields::COORDINATES,
    fields::MASSES,
    fields::VELOCITIES,
    fields::TEMPERATURES,
    fields::XRAY_LUMINOSITIES,
    fields::XRAY_PHOTON_LUMINOSITIES,
    fields::COMPTON_Y_PARAMETERS,
];
const DARK_MATTER_FIELDS: &[&str] = &[fields::COORDINATES, fields::MASSES, fields::VELOCITIES];
const STAR_FIELDS: &[&str] = &[
    fields::COORDINATES,
    fields::MASSES,
    fields::INITIAL_MASSES,
    fields::VELOCITIES,
];
const BLACK_HOLE_FIELDS: &[&str] = &[
    fields::COORDINATES,
    fields::DYNAMICAL_MASSES,
    fields::SUBGRID_MASSES,
    fields::VELOCITIES,
];

/// SO radius together with the aggregates inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoMeasurement {
    pub so: SoRadius,
    pub aggregates: ApertureAggregates,
}

/// One overdensity definition, e.g. 200 times critical
#[derive(Debug, Clone, PartialEq)]
pub struct SoProperties {
    multiple: f64,
    kind: OverdensityType,
    reference_density: Quantity,
    units: SnapshotUnits,
    name: String,
}

impl SoProperties {
    /// # Errors
    /// Returns `SoError::UnknownOverdensityType` unless `kind` is `"mean"` or
    /// `"crit"`, and `SoError::Config` for a non-positive multiple.
    pub fn new(
        multiple: f64,
        kind: &str,
        densities: &ReferenceDensities,
        units: SnapshotUnits,
    ) -> SoResult<Self> {
        let kind: OverdensityType = kind.parse()?;
        if !(multiple.is_finite() && multiple > 0.0) {
            return Err(SoError::Config(format!(
                "overdensity multiple must be positive, got {multiple}"
            )));
        }
        units.validate()?;
        let reference_density = kind.reference(densities) * multiple;
        reference_density.to(units.density())?;
        Ok(SoProperties {
            multiple,
            kind,
            reference_density,
            units,
            name: format!("SO_{}_{}", multiple.trunc() as i64, kind),
        })
    }

    /// Selection name, `SO_<multiple>_<type>`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn multiple(&self) -> f64 {
        self.multiple
    }

    #[must_use]
    pub fn kind(&self) -> OverdensityType {
        self.kind
    }

    /// `multiple` times the chosen background density
    #[must_use]
    pub fn reference_density(&self) -> Quantity {
        self.reference_density
    }

    #[must_use]
    pub fn units(&self) -> &SnapshotUnits {
        &self.units
    }

    /// Particle fields this calculation reads for `part_type`
    #[must_use]
    pub fn required_fields(part_type: PartType) -> &'static [&'static str] {
        match part_type {
            PartType::Gas => GAS_FIELDS,
            PartType::DarkMatter => DARK_MATTER_FIELDS,
            PartType::Stars => STAR_FIELDS,
            PartType::BlackHoles => BLACK_HOLE_FIELDS,
        }
    }

    /// Suffix shared by every property name, e.g. `200_crit`
    fn suffix(&self) -> String {
        format!("{:.0}_{}", self.multiple, self.kind)
    }

    fn label(&self) -> String {
        format!(
            "within which the density is {:.0} times the {} value",
            self.multiple,
            self.kind.description()
        )
    }

    /// Solve for the SO radius and aggregate inside it
    ///
    /// # Errors
    /// Returns an error if a species present in `data` lacks a required
    /// field, has fields of unequal length, or carries the wrong units.
    pub fn measure(&self, halo: &HaloContext, data: &ParticleData) -> SoResult<SoMeasurement> {
        for species in data.iter() {
            species.validate(Self::required_fields(species.part_type()))?;
        }
        let arrays = ParticleArrays::gather(data, &halo.centre, &self.units)?;
        let profile = DensityProfile::build(&arrays);
        let so = solve_threshold(&profile, self.reference_density)?;
        let aggregates =
            ApertureAggregates::compute(&arrays, data, &halo.centre, so.radius, &self.units)?;
        debug!(
            "Halo {}: {} r = {} m = {} from {} particles",
            halo.index,
            self.name,
            so.radius,
            so.mass,
            arrays.len()
        );
        Ok(SoMeasurement { so, aggregates })
    }

    /// Named results for one halo
    ///
    /// # Errors
    /// See [`SoProperties::measure`].
    pub fn calculate(&self, halo: &HaloContext, data: &ParticleData) -> SoResult<PropertyOutput> {
        let SoMeasurement { so, aggregates: a } = self.measure(halo, data)?;
        let name = self.suffix();
        let label = self.label();

        let entries: [(&str, ResultValue, String); 15] = [
            ("r", so.radius.into(), format!("Radius {label}")),
            ("m", so.mass.into(), format!("Mass within a sphere {label}")),
            (
                "com",
                a.centre_of_mass.into(),
                format!("Centre of mass within a sphere {label}"),
            ),
            (
                "vcom",
                a.centre_of_mass_velocity.into(),
                format!("Centre of mass velocity within a sphere {label}"),
            ),
            (
                "Mgas",
                a.gas_mass.into(),
                format!("Total gas mass within a sphere {label}"),
            ),
            (
                "Mdm",
                a.dark_matter_mass.into(),
                format!("Total DM mass within a sphere {label}"),
            ),
            (
                "Mstar",
                a.stellar_mass.into(),
                format!("Total stellar mass within a sphere {label}"),
            ),
            (
                "MBHdyn",
                a.black_hole_dynamical_mass.into(),
                format!("Total dynamical BH mass within a sphere {label}"),
            ),
            (
                "Mstarinit",
                a.initial_stellar_mass.into(),
                format!("Total initial stellar mass within a sphere {label}"),
            ),
            (
                "MBHsub",
                a.black_hole_subgrid_mass.into(),
                format!("Total sub-grid BH mass within a sphere {label}"),
            ),
            (
                "Mhotgas",
                a.hot_gas_mass.into(),
                format!("Total mass of gas with T > 1e5 K within a sphere {label}"),
            ),
            (
                "Tgas",
                a.hot_gas_temperature.into(),
                format!(
                    "Mass-weighted average temperature of gas with T > 1e5 K within a sphere {label}"
                ),
            ),
            (
                "Xraylum",
                a.xray_luminosity.into(),
                format!("Total Xray luminosity within a sphere {label}"),
            ),
            (
                "Xrayphlum",
                a.xray_photon_luminosity.into(),
                format!("Total Xray photon luminosity within a sphere {label}"),
            ),
            (
                "compY",
                a.compton_y.into(),
                format!("Total Compton y within a sphere {label}"),
            ),
        ];

        let result = HaloResult::from_entries(
            entries
                .into_iter()
                .map(|(quantity, value, description)| {
                    (format!("{quantity}_{name}"), value, description)
                }),
        )?;
        Ok(PropertyOutput {
            result,
            radius_exhausted: so.is_exhausted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::units::{Unit, VectorQuantity};

    fn densities() -> ReferenceDensities {
        ReferenceDensities {
            critical: Quantity::new(100.0, Unit::MSUN_PER_MPC3),
            mean: Quantity::new(30.0, Unit::MSUN_PER_MPC3),
        }
    }

    fn halo() -> HaloContext {
        HaloContext {
            index: 0,
            centre: VectorQuantity::zero(Unit::MPC),
            search_radius: Quantity::new(1.0, Unit::MPC),
            read_radius: Quantity::new(5.0, Unit::MPC),
        }
    }

    #[test]
    fn test_name_and_reference() {
        let so = SoProperties::new(200.0, "crit", &densities(), SnapshotUnits::default()).unwrap();
        assert_eq!(so.name(), "SO_200_crit");
        assert_eq!(so.reference_density().value(), 2.0e4);
        let so = SoProperties::new(500.0, "mean", &densities(), SnapshotUnits::default()).unwrap();
        assert_eq!(so.name(), "SO_500_mean");
        assert_eq!(so.reference_density().value(), 1.5e4);
    }

    #[test]
    fn test_invalid_type_rejected_at_construction() {
        let err = SoProperties::new(200.0, "virial", &densities(), SnapshotUnits::default())
            .unwrap_err();
        assert!(matches!(err, SoError::UnknownOverdensityType(_)));
        assert!(SoProperties::new(-1.0, "mean", &densities(), SnapshotUnits::default()).is_err());
    }

    #[test]
    fn test_empty_halo_produces_full_record() {
        let so = SoProperties::new(200.0, "mean", &densities(), SnapshotUnits::default()).unwrap();
        let out = so.calculate(&halo(), &ParticleData::new()).unwrap();
        assert_eq!(out.result.len(), 15);
        assert!(!out.radius_exhausted);
        for (name, entry) in out.result.iter() {
            assert!(name.ends_with("_200_mean"), "{name}");
            match entry.value {
                ResultValue::Scalar(q) => assert!(q.is_zero(), "{name}"),
                ResultValue::Vector(v) => assert_eq!(v.value().norm(), 0.0, "{name}"),
            }
        }
        let r = out.result.get("r_200_mean").unwrap();
        assert_eq!(
            r.description,
            "Radius within which the density is 200 times the mean value"
        );
        assert_eq!(out.result.scalar("Tgas_200_mean").unwrap().unit(), Unit::KELVIN);
    }

    #[test]
    fn test_required_fields_per_species() {
        assert!(SoProperties::required_fields(PartType::BlackHoles).contains(&"SubgridMasses"));
        assert!(!SoProperties::required_fields(PartType::BlackHoles).contains(&"Masses"));
        assert_eq!(SoProperties::required_fields(PartType::DarkMatter).len(), 3);
    }
}
