//! Per-halo particle data as handed over by the snapshot reader
//!
//! Particle data is a map from species to a map from field name to a
//! unit-tagged array. A species that is absent from the snapshot (e.g. gas
//! in a dark-matter-only run) simply has no entry and contributes no rows.

use crate::core_types::units::{Quantities, Vectors};
use crate::error::{SoError, SoResult};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot field names
pub mod fields {
    pub const COORDINATES: &str = "Coordinates";
    pub const VELOCITIES: &str = "Velocities";
    pub const MASSES: &str = "Masses";
    pub const TEMPERATURES: &str = "Temperatures";
    pub const XRAY_LUMINOSITIES: &str = "XrayLuminosities";
    pub const XRAY_PHOTON_LUMINOSITIES: &str = "XrayPhotonLuminosities";
    pub const COMPTON_Y_PARAMETERS: &str = "ComptonYParameters";
    pub const INITIAL_MASSES: &str = "InitialMasses";
    pub const DYNAMICAL_MASSES: &str = "DynamicalMasses";
    pub const SUBGRID_MASSES: &str = "SubgridMasses";
}

/// Particle species, named after their snapshot groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartType {
    /// `PartType0`
    Gas,
    /// `PartType1`
    DarkMatter,
    /// `PartType4`
    Stars,
    /// `PartType5`
    BlackHoles,
}

impl PartType {
    pub const ALL: [PartType; 4] = [
        PartType::Gas,
        PartType::DarkMatter,
        PartType::Stars,
        PartType::BlackHoles,
    ];

    #[must_use]
    pub const fn group_name(self) -> &'static str {
        match self {
            PartType::Gas => "PartType0",
            PartType::DarkMatter => "PartType1",
            PartType::Stars => "PartType4",
            PartType::BlackHoles => "PartType5",
        }
    }

    #[must_use]
    pub fn from_group_name(name: &str) -> Option<PartType> {
        PartType::ALL.into_iter().find(|p| p.group_name() == name)
    }

    /// Field holding the mass used for the density profile
    ///
    /// Black holes carry a dynamical (gravitational) mass distinct from the
    /// sub-grid mass of the accreting object; the profile uses the former.
    #[must_use]
    pub const fn mass_dataset(self) -> &'static str {
        match self {
            PartType::BlackHoles => fields::DYNAMICAL_MASSES,
            _ => fields::MASSES,
        }
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_name())
    }
}

/// A unit-tagged array of either scalars or 3-vectors
#[derive(Debug, Clone, PartialEq)]
pub enum FieldArray {
    Scalar(Quantities),
    Vector(Vectors),
}

impl FieldArray {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            FieldArray::Scalar(q) => q.len(),
            FieldArray::Vector(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All fields loaded for one species
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesData {
    part_type: PartType,
    fields: FxHashMap<String, FieldArray>,
}

impl SpeciesData {
    #[must_use]
    pub fn new(part_type: PartType) -> Self {
        Self {
            part_type,
            fields: FxHashMap::default(),
        }
    }

    /// Builder-style insert of a scalar field
    #[must_use]
    pub fn with_scalar(mut self, name: &str, values: Quantities) -> Self {
        self.fields
            .insert(name.to_string(), FieldArray::Scalar(values));
        self
    }

    /// Builder-style insert of a vector field
    #[must_use]
    pub fn with_vector(mut self, name: &str, values: Vectors) -> Self {
        self.fields
            .insert(name.to_string(), FieldArray::Vector(values));
        self
    }

    pub fn insert(&mut self, name: &str, array: FieldArray) {
        self.fields.insert(name.to_string(), array);
    }

    #[must_use]
    pub fn part_type(&self) -> PartType {
        self.part_type
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of particles, taken from the coordinates
    ///
    /// # Errors
    /// Returns an error if the species has no `Coordinates` field.
    pub fn len(&self) -> SoResult<usize> {
        Ok(self.vector(fields::COORDINATES)?.len())
    }

    /// # Errors
    /// Returns an error if the field is missing or holds vectors.
    pub fn scalar(&self, name: &str) -> SoResult<&Quantities> {
        match self.field(name)? {
            FieldArray::Scalar(q) => Ok(q),
            FieldArray::Vector(_) => Err(SoError::FieldKindMismatch {
                part_type: self.part_type.to_string(),
                field: name.to_string(),
                expected: "scalar",
            }),
        }
    }

    /// # Errors
    /// Returns an error if the field is missing or holds scalars.
    pub fn vector(&self, name: &str) -> SoResult<&Vectors> {
        match self.field(name)? {
            FieldArray::Vector(v) => Ok(v),
            FieldArray::Scalar(_) => Err(SoError::FieldKindMismatch {
                part_type: self.part_type.to_string(),
                field: name.to_string(),
                expected: "vector",
            }),
        }
    }

    fn field(&self, name: &str) -> SoResult<&FieldArray> {
        self.fields
            .get(name)
            .ok_or_else(|| SoError::MissingParticleField {
                part_type: self.part_type.to_string(),
                field: name.to_string(),
            })
    }

    /// Check that the listed fields exist and all have the same length
    ///
    /// # Errors
    /// Returns the first missing field or length mismatch found.
    pub fn validate(&self, required: &[&str]) -> SoResult<usize> {
        let expected = self.len()?;
        for name in required {
            let found = self.field(name)?.len();
            if found != expected {
                return Err(SoError::FieldLengthMismatch {
                    part_type: self.part_type.to_string(),
                    field: (*name).to_string(),
                    expected,
                    found,
                });
            }
        }
        Ok(expected)
    }
}

/// Particle data for one halo, keyed by species
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleData {
    species: BTreeMap<PartType, SpeciesData>,
}

impl ParticleData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing any previous data for the species
    #[must_use]
    pub fn with_species(mut self, data: SpeciesData) -> Self {
        self.insert(data);
        self
    }

    pub fn insert(&mut self, data: SpeciesData) {
        self.species.insert(data.part_type(), data);
    }

    #[must_use]
    pub fn get(&self, part_type: PartType) -> Option<&SpeciesData> {
        self.species.get(&part_type)
    }

    /// Species present, in snapshot group order
    pub fn iter(&self) -> impl Iterator<Item = &SpeciesData> {
        self.species.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Total particle count over all species
    ///
    /// # Errors
    /// Returns an error if a species lacks coordinates.
    pub fn total_len(&self) -> SoResult<usize> {
        self.species.values().map(SpeciesData::len).sum()
    }
}
