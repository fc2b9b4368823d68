//! Cumulative mass and density profiles about the halo centre

use crate::core_types::particles::{fields, ParticleData, PartType};
use crate::core_types::units::{f64_total_cmp, Quantities, Quantity, Unit, VectorQuantity, Vectors};
use crate::core_types::vec3::Vec3;
use crate::error::SoResult;
use crate::properties::SnapshotUnits;
use std::f64::consts::PI;
use std::ops::Range;

/// All species concatenated into flat arrays, in input order
///
/// Positions are relative to the halo centre. Rows of one species are
/// contiguous; [`ParticleArrays::species_rows`] gives the range for each.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleArrays {
    mass: Quantities,
    position: Vectors,
    velocity: Vectors,
    radius: Vec<f64>,
    types: Vec<PartType>,
    ranges: Vec<(PartType, Range<usize>)>,
}

impl ParticleArrays {
    /// Concatenate every species present in `data`
    ///
    /// # Errors
    /// Returns an error if a species lacks coordinates, velocities or its
    /// mass field, if their lengths differ, or if any array (or the centre)
    /// has the wrong dimension.
    pub fn gather(
        data: &ParticleData,
        centre: &VectorQuantity,
        units: &SnapshotUnits,
    ) -> SoResult<Self> {
        let centre = centre.to(units.length)?;

        let mut masses = Vec::new();
        let mut positions = Vec::new();
        let mut velocities = Vec::new();
        let mut types = Vec::new();
        let mut ranges = Vec::new();
        for species in data.iter() {
            let part_type = species.part_type();
            let mass_field = part_type.mass_dataset();
            let n = species.validate(&[fields::VELOCITIES, mass_field])?;
            masses.push(species.scalar(mass_field)?);
            positions.push(species.vector(fields::COORDINATES)?);
            velocities.push(species.vector(fields::VELOCITIES)?);
            ranges.push((part_type, types.len()..types.len() + n));
            types.extend(std::iter::repeat(part_type).take(n));
        }

        let mass = Quantities::concatenate(&masses, units.mass)?;
        let velocity = Vectors::concatenate(&velocities, units.velocity)?;
        let absolute = Vectors::concatenate(&positions, units.length)?;
        let centred: Vec<Vec3> = absolute
            .values()
            .iter()
            .map(|p| p - centre.value())
            .collect();
        let radius = centred.iter().map(|p| p.norm()).collect();

        Ok(ParticleArrays {
            mass,
            position: Vectors::new(centred, units.length),
            velocity,
            radius,
            types,
            ranges,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.radius.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    #[must_use]
    pub fn mass(&self) -> &Quantities {
        &self.mass
    }

    /// Positions relative to the centre
    #[must_use]
    pub fn position(&self) -> &Vectors {
        &self.position
    }

    #[must_use]
    pub fn velocity(&self) -> &Vectors {
        &self.velocity
    }

    /// Distance of each particle from the centre, in the position unit
    #[must_use]
    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    #[must_use]
    pub fn types(&self) -> &[PartType] {
        &self.types
    }

    /// Species present, each with its rows in the concatenated arrays
    #[must_use]
    pub fn species_rows(&self) -> &[(PartType, Range<usize>)] {
        &self.ranges
    }
}

/// Radius-sorted cumulative mass profile with zero radii removed
#[derive(Debug, Clone, PartialEq)]
pub struct DensityProfile {
    radius: Vec<f64>,
    cumulative_mass: Vec<f64>,
    density: Vec<f64>,
    length_unit: Unit,
    mass_unit: Unit,
}

impl DensityProfile {
    /// Sort by radius and accumulate mass outward
    ///
    /// Particles exactly at the centre still contribute to the enclosed mass
    /// but get no profile entry of their own, since their density is
    /// undefined.
    #[must_use]
    pub fn build(arrays: &ParticleArrays) -> Self {
        let radius = arrays.radius();
        let mass = arrays.mass().values();

        let mut order: Vec<usize> = (0..radius.len()).collect();
        order.sort_by(|&a, &b| f64_total_cmp(radius[a], radius[b]));

        let mut total = 0.0_f64;
        let cumulative: Vec<f64> = order
            .iter()
            .map(|&i| {
                total += mass[i];
                total
            })
            .collect();

        let nskip = order.iter().take_while(|&&i| radius[i] == 0.0).count();
        let sorted_radius: Vec<f64> = order[nskip..].iter().map(|&i| radius[i]).collect();
        let cumulative_mass = cumulative[nskip..].to_vec();
        let density = sorted_radius
            .iter()
            .zip(&cumulative_mass)
            .map(|(r, m)| m / (4.0 / 3.0 * PI * r.powi(3)))
            .collect();

        DensityProfile {
            radius: sorted_radius,
            cumulative_mass,
            density,
            length_unit: arrays.position().unit(),
            mass_unit: arrays.mass().unit(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.radius.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }

    #[must_use]
    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    #[must_use]
    pub fn cumulative_mass(&self) -> &[f64] {
        &self.cumulative_mass
    }

    #[must_use]
    pub fn density(&self) -> &[f64] {
        &self.density
    }

    #[must_use]
    pub fn length_unit(&self) -> Unit {
        self.length_unit
    }

    #[must_use]
    pub fn mass_unit(&self) -> Unit {
        self.mass_unit
    }

    #[must_use]
    pub fn density_unit(&self) -> Unit {
        self.mass_unit / self.length_unit.powi(3)
    }

    #[must_use]
    pub fn radius_at(&self, index: usize) -> Option<Quantity> {
        self.radius
            .get(index)
            .map(|&r| Quantity::new(r, self.length_unit))
    }

    #[must_use]
    pub fn mass_at(&self, index: usize) -> Option<Quantity> {
        self.cumulative_mass
            .get(index)
            .map(|&m| Quantity::new(m, self.mass_unit))
    }
}
