//! Per-halo input handed to property calculators

use crate::core_types::units::{Quantity, VectorQuantity};
use serde::Serialize;

/// Catalogue-derived description of one halo
///
/// `centre` is the potential minimum; particle coordinates are re-centred on
/// it before any profile is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HaloContext {
    pub index: usize,
    pub centre: VectorQuantity,
    pub search_radius: Quantity,
    pub read_radius: Quantity,
}
