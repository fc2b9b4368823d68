//! Spherical Overdensity Halo Properties
//!
//! Measures spherical overdensity (SO) properties of halos found in a
//! cosmological simulation. For each halo the enclosed density profile about
//! the potential minimum is built, the first radius where it falls below a
//! multiple of the mean or critical density is located, and masses,
//! kinematics, hot gas and X-ray quantities are aggregated inside it.
//!
//! ## Pipeline
//!
//! - [`catalogue`]: search and read radii per halo, computed on several
//!   worker ranks and gathered onto a coordinator
//! - [`properties`]: density profile, threshold crossing and aperture sums
//! - [`pipeline`]: loads particles per halo (through [`ParticleLoader`]) and
//!   runs every calculator in parallel
//! - [`config`]: JSON run configuration
//!
//! Every number carries a unit (see [`core_types::units`]); degenerate halos
//! produce zero-valued results in the same units as populated ones.

// Core types and utilities
pub mod core_types;
pub mod error;

pub mod catalogue;
pub mod config;
pub mod halo;
pub mod pipeline;
pub mod properties;

// Re-export core types
pub use core_types::{
    Cosmology, ParticleData, PartType, Quantities, Quantity, SpeciesData, Unit, VectorQuantity,
    Vec3, Vectors,
};
pub use error::{SoError, SoResult};

// Re-export pipeline types
pub use catalogue::{CatalogueSource, HaloCatalogue, InMemoryCatalogue, SearchRadiusInitializer};
pub use config::{OverdensityConfig, RunConfig};
pub use halo::HaloContext;
pub use pipeline::{HaloProcessor, ParticleLoader};
pub use properties::{
    HaloRecord, HaloResult, OverdensityType, PropertyCalculator, SnapshotUnits, SoProperties,
};
