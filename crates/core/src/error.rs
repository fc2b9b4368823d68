//! Crate-wide error type
//!
//! Every error here is fatal for the run: it signals a misconfigured
//! catalogue, particle input or calculator definition. Per-halo numerical
//! degeneracies are never errors, they produce zero-valued results instead.

use crate::core_types::units::UnitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoError {
    #[error("Unknown SO type: {0} (expected \"mean\" or \"crit\")")]
    UnknownOverdensityType(String),

    #[error("Catalogue is missing required field '{0}'")]
    MissingCatalogueField(String),

    #[error("Catalogue attribute group '{group}' is missing '{name}'")]
    MissingCatalogueAttribute { group: String, name: String },

    #[error("Catalogue field '{field}' has {found} rows, expected {expected}")]
    CatalogueRowMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Inconsistent catalogue: {0}")]
    InconsistentCatalogue(String),

    #[error("{part_type} is missing required field '{field}'")]
    MissingParticleField { part_type: String, field: String },

    #[error("{part_type} field '{field}' has {found} entries, expected {expected}")]
    FieldLengthMismatch {
        part_type: String,
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("{part_type} field '{field}' is not a {expected} array")]
    FieldKindMismatch {
        part_type: String,
        field: String,
        expected: &'static str,
    },

    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    #[error("Duplicate halo property '{0}'")]
    DuplicateProperty(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Communication error on rank {rank}: {message}")]
    Communication { rank: usize, message: String },

    #[error("Particle loading failed for halo {index}: {message}")]
    ParticleLoad { index: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SoResult<T> = Result<T, SoError>;
