//! Core types and utilities

pub mod cosmo;
pub mod particles;
pub mod units;
pub mod vec3;

pub use cosmo::{CosmoFactor, CosmoQuantities, CosmoVectors, Cosmology, ReferenceDensities};
pub use particles::{fields, FieldArray, ParticleData, PartType, SpeciesData};
pub use units::*;
pub use vec3::Vec3;
