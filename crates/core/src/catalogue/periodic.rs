//! Minimum-image distances in a periodic simulation box

use crate::core_types::units::{Quantity, UnitError, VectorQuantity};
use crate::core_types::vec3::Vec3;

/// Separation along one axis, wrapped across the box boundary
///
/// Assumes both coordinates lie inside `[0, box_size)`, so a single wrap is
/// enough: a raw separation above half the box becomes `box_size - d`.
#[inline]
#[must_use]
pub fn wrapped_delta(a: f64, b: f64, box_size: f64) -> f64 {
    let d = (a - b).abs();
    if d > 0.5 * box_size {
        box_size - d
    } else {
        d
    }
}

/// Euclidean distance between two points under periodic wrap on every axis
#[must_use]
pub fn periodic_distance(a: &Vec3, b: &Vec3, box_size: f64) -> f64 {
    let dx = wrapped_delta(a.x, b.x, box_size);
    let dy = wrapped_delta(a.y, b.y, box_size);
    let dz = wrapped_delta(a.z, b.z, box_size);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Unit-aware [`periodic_distance`], returned in the unit of `a`
///
/// # Errors
/// Returns `UnitError::DimensionMismatch` if `b` or `box_size` is not a length
/// compatible with `a`.
pub fn periodic_distance_quantity(
    a: &VectorQuantity,
    b: &VectorQuantity,
    box_size: Quantity,
) -> Result<Quantity, UnitError> {
    let unit = a.unit();
    let b = b.to(unit)?;
    let box_size = box_size.value_in(unit)?;
    Ok(Quantity::new(
        periodic_distance(a.value(), b.value(), box_size),
        unit,
    ))
}
