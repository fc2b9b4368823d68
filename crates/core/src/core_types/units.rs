//! Dimension-tracked physical quantities
//!
//! Every numeric value that flows through the halo calculations carries a
//! [`Unit`], which in turn carries a [`Dimension`] (integer exponents of
//! length, mass, time and temperature) and a scale relative to the base
//! system. Combining values with different dimensions is rejected with a
//! [`UnitError`]; combining values with the same dimension but different
//! scales converts to the target unit first.
//!
//! # Design Philosophy
//! - Base system is Mpc, Msun, s, K (the catalogue and snapshot convention)
//! - Multiplication and division always succeed and combine dimensions
//! - Addition, subtraction, comparison and concatenation are fallible
//! - Arrays ([`Quantities`], [`Vectors`]) carry one unit for all elements
//! - Sums over empty arrays are zero in the array's unit, never unit-less
//!
//! # Usage
//! ```
//! use halo_so_core::core_types::units::{Quantity, Unit};
//!
//! let r = Quantity::new(250.0, Unit::KPC);
//! let r_mpc = r.to(Unit::MPC).unwrap();
//! assert!((r_mpc.value() - 0.25).abs() < 1e-12);
//!
//! // Mass plus length is rejected
//! let m = Quantity::new(1.0e12, Unit::MSUN);
//! assert!(m.try_add(r).is_err());
//! ```

use crate::core_types::vec3::Vec3;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Div, Mul, Neg};
use thiserror::Error;

/// Centimetres in one megaparsec
pub const MPC_IN_CM: f64 = 3.085_677_581_491_367e24;

/// Grams in one solar mass
pub const MSUN_IN_G: f64 = 1.988_41e33;

// ============================================================================
// HELPER FUNCTIONS FOR TOTAL ORDERING
// ============================================================================

/// Compare f64 values with total ordering using Rust's built-in `total_cmp`
#[inline]
pub(crate) fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

// ============================================================================
// ERRORS
// ============================================================================

/// Failure when combining values of incompatible physical dimension
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum UnitError {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: Dimension,
        found: Dimension,
    },
}

// ============================================================================
// DIMENSION
// ============================================================================

/// Physical dimension as integer exponents of the base quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub temperature: i8,
}

impl Dimension {
    pub const DIMENSIONLESS: Dimension = Dimension::new(0, 0, 0, 0);
    pub const LENGTH: Dimension = Dimension::new(1, 0, 0, 0);
    pub const MASS: Dimension = Dimension::new(0, 1, 0, 0);
    pub const TIME: Dimension = Dimension::new(0, 0, 1, 0);
    pub const TEMPERATURE: Dimension = Dimension::new(0, 0, 0, 1);
    pub const AREA: Dimension = Dimension::new(2, 0, 0, 0);
    pub const VELOCITY: Dimension = Dimension::new(1, 0, -1, 0);
    pub const DENSITY: Dimension = Dimension::new(-3, 1, 0, 0);
    /// Energy per unit time (M L^2 T^-3)
    pub const LUMINOSITY: Dimension = Dimension::new(2, 1, -3, 0);
    /// Counts per unit time, e.g. photons per second
    pub const RATE: Dimension = Dimension::new(0, 0, -1, 0);

    #[inline]
    #[must_use]
    pub const fn new(length: i8, mass: i8, time: i8, temperature: i8) -> Self {
        Dimension {
            length,
            mass,
            time,
            temperature,
        }
    }

    /// Raise every exponent by an integer power
    #[inline]
    #[must_use]
    pub const fn powi(self, n: i8) -> Self {
        Dimension::new(
            self.length * n,
            self.mass * n,
            self.time * n,
            self.temperature * n,
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_dimensionless(self) -> bool {
        self.length == 0 && self.mass == 0 && self.time == 0 && self.temperature == 0
    }
}

impl Mul for Dimension {
    type Output = Dimension;
    fn mul(self, rhs: Dimension) -> Dimension {
        Dimension::new(
            self.length + rhs.length,
            self.mass + rhs.mass,
            self.time + rhs.time,
            self.temperature + rhs.temperature,
        )
    }
}

impl Div for Dimension {
    type Output = Dimension;
    fn div(self, rhs: Dimension) -> Dimension {
        Dimension::new(
            self.length - rhs.length,
            self.mass - rhs.mass,
            self.time - rhs.time,
            self.temperature - rhs.temperature,
        )
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "[1]");
        }
        let parts: Vec<String> = [
            ("L", self.length),
            ("M", self.mass),
            ("T", self.time),
            ("K", self.temperature),
        ]
        .iter()
        .filter(|(_, exp)| *exp != 0)
        .map(|(sym, exp)| {
            if *exp == 1 {
                (*sym).to_string()
            } else {
                format!("{sym}^{exp}")
            }
        })
        .collect();
        write!(f, "[{}]", parts.join(" "))
    }
}

// ============================================================================
// UNIT
// ============================================================================

/// A physical unit: a dimension plus the size of one unit in base units
///
/// Equality ignores the display symbol, so `Unit::MSUN * Unit::MPC` equals a
/// named unit with the same dimension and scale.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Unit {
    dimension: Dimension,
    scale: f64,
    symbol: Option<&'static str>,
}

impl Unit {
    pub const DIMENSIONLESS: Unit = Unit::new(Dimension::DIMENSIONLESS, 1.0, "");
    pub const MPC: Unit = Unit::new(Dimension::LENGTH, 1.0, "Mpc");
    pub const KPC: Unit = Unit::new(Dimension::LENGTH, 1.0e-3, "kpc");
    pub const MSUN: Unit = Unit::new(Dimension::MASS, 1.0, "Msun");
    pub const SECOND: Unit = Unit::new(Dimension::TIME, 1.0, "s");
    pub const KELVIN: Unit = Unit::new(Dimension::TEMPERATURE, 1.0, "K");
    pub const KM_PER_S: Unit = Unit::new(Dimension::VELOCITY, 1.0e5 / MPC_IN_CM, "km/s");
    pub const MPC2: Unit = Unit::new(Dimension::AREA, 1.0, "Mpc**2");
    pub const MSUN_PER_MPC3: Unit = Unit::new(Dimension::DENSITY, 1.0, "Msun/Mpc**3");
    pub const ERG_PER_S: Unit = Unit::new(
        Dimension::LUMINOSITY,
        1.0 / (MSUN_IN_G * MPC_IN_CM * MPC_IN_CM),
        "erg/s",
    );
    pub const PER_SECOND: Unit = Unit::new(Dimension::RATE, 1.0, "1/s");

    /// Create a named unit
    #[inline]
    #[must_use]
    pub const fn new(dimension: Dimension, scale: f64, symbol: &'static str) -> Self {
        Unit {
            dimension,
            scale,
            symbol: Some(symbol),
        }
    }

    /// Create an anonymous unit, as produced by unit arithmetic
    #[inline]
    #[must_use]
    pub const fn derived(dimension: Dimension, scale: f64) -> Self {
        Unit {
            dimension,
            scale,
            symbol: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn dimension(self) -> Dimension {
        self.dimension
    }

    /// Size of one of this unit in base units (Mpc, Msun, s, K)
    #[inline]
    #[must_use]
    pub const fn scale(self) -> f64 {
        self.scale
    }

    #[inline]
    #[must_use]
    pub fn is_compatible(self, other: Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Factor converting a value in `self` to a value in `target`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn conversion_factor(self, target: Unit) -> Result<f64, UnitError> {
        if self.dimension != target.dimension {
            return Err(UnitError::DimensionMismatch {
                expected: target.dimension,
                found: self.dimension,
            });
        }
        if self.scale == target.scale {
            return Ok(1.0);
        }
        Ok(self.scale / target.scale)
    }

    #[must_use]
    pub fn powi(self, n: i8) -> Unit {
        Unit::derived(self.dimension.powi(n), self.scale.powi(i32::from(n)))
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Unit) -> bool {
        self.dimension == other.dimension && self.scale == other.scale
    }
}

impl Mul for Unit {
    type Output = Unit;
    fn mul(self, rhs: Unit) -> Unit {
        Unit::derived(self.dimension * rhs.dimension, self.scale * rhs.scale)
    }
}

impl Div for Unit {
    type Output = Unit;
    fn div(self, rhs: Unit) -> Unit {
        Unit::derived(self.dimension / rhs.dimension, self.scale / rhs.scale)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol {
            Some(symbol) => write!(f, "{symbol}"),
            None if self.scale == 1.0 => write!(f, "{}", self.dimension),
            None => write!(f, "{:e} {}", self.scale, self.dimension),
        }
    }
}

// ============================================================================
// SCALAR QUANTITY
// ============================================================================

/// A single value with a unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    #[inline]
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    /// Zero carrying the given unit
    #[inline]
    #[must_use]
    pub const fn zero(unit: Unit) -> Self {
        Quantity { value: 0.0, unit }
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> f64 {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn unit(self) -> Unit {
        self.unit
    }

    #[inline]
    #[must_use]
    pub const fn dimension(self) -> Dimension {
        self.unit.dimension
    }

    /// Convert to another unit of the same dimension
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn to(self, unit: Unit) -> Result<Quantity, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(Quantity::new(self.value * factor, unit))
    }

    /// Numeric value expressed in `unit`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn value_in(self, unit: Unit) -> Result<f64, UnitError> {
        Ok(self.to(unit)?.value)
    }

    /// Sum in the unit of `self`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn try_add(self, other: Quantity) -> Result<Quantity, UnitError> {
        let rhs = other.value_in(self.unit)?;
        Ok(Quantity::new(self.value + rhs, self.unit))
    }

    /// Difference in the unit of `self`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn try_sub(self, other: Quantity) -> Result<Quantity, UnitError> {
        let rhs = other.value_in(self.unit)?;
        Ok(Quantity::new(self.value - rhs, self.unit))
    }

    /// Total ordering after converting `other` into the unit of `self`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn try_cmp(self, other: Quantity) -> Result<Ordering, UnitError> {
        let rhs = other.value_in(self.unit)?;
        Ok(f64_total_cmp(self.value, rhs))
    }

    /// Larger of the two, expressed in the unit of `self`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn try_max(self, other: Quantity) -> Result<Quantity, UnitError> {
        let rhs = other.to(self.unit)?;
        Ok(if rhs.value > self.value { rhs } else { self })
    }

    #[must_use]
    pub fn powi(self, n: i8) -> Quantity {
        Quantity::new(self.value.powi(i32::from(n)), self.unit.powi(n))
    }

    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.value == 0.0
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.value * rhs, self.unit)
    }
}

impl Div<f64> for Quantity {
    type Output = Quantity;
    fn div(self, rhs: f64) -> Quantity {
        Quantity::new(self.value / rhs, self.unit)
    }
}

impl Mul for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.value * rhs.value, self.unit * rhs.unit)
    }
}

impl Div for Quantity {
    type Output = Quantity;
    fn div(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.value / rhs.value, self.unit / rhs.unit)
    }
}

impl Neg for Quantity {
    type Output = Quantity;
    fn neg(self) -> Quantity {
        Quantity::new(-self.value, self.unit)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

// ============================================================================
// VECTOR QUANTITY
// ============================================================================

/// A 3-vector with a single unit for all components
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VectorQuantity {
    value: Vec3,
    unit: Unit,
}

impl VectorQuantity {
    #[inline]
    #[must_use]
    pub const fn new(value: Vec3, unit: Unit) -> Self {
        VectorQuantity { value, unit }
    }

    #[inline]
    #[must_use]
    pub fn zero(unit: Unit) -> Self {
        VectorQuantity::new(Vec3::zeros(), unit)
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> &Vec3 {
        &self.value
    }

    #[inline]
    #[must_use]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn to(self, unit: Unit) -> Result<VectorQuantity, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(VectorQuantity::new(self.value * factor, unit))
    }

    /// Euclidean norm with the vector's unit
    #[must_use]
    pub fn norm(&self) -> Quantity {
        Quantity::new(self.value.norm(), self.unit)
    }
}

impl fmt::Display for VectorQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}] {}",
            self.value.x, self.value.y, self.value.z, self.unit
        )
    }
}

// ============================================================================
// ARRAYS
// ============================================================================

/// A one-dimensional array of values sharing one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantities {
    values: Vec<f64>,
    unit: Unit,
}

impl Quantities {
    #[must_use]
    pub fn new(values: Vec<f64>, unit: Unit) -> Self {
        Quantities { values, unit }
    }

    /// Zero-length array that still carries a unit
    #[must_use]
    pub fn empty(unit: Unit) -> Self {
        Quantities::new(Vec::new(), unit)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Quantity> {
        self.values
            .get(index)
            .map(|&value| Quantity::new(value, self.unit))
    }

    /// Copy converted into `unit`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn to(&self, unit: Unit) -> Result<Quantities, UnitError> {
        self.clone().into_unit(unit)
    }

    /// Convert in place, consuming the array
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn into_unit(mut self, unit: Unit) -> Result<Quantities, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        if factor != 1.0 {
            for v in &mut self.values {
                *v *= factor;
            }
        }
        self.unit = unit;
        Ok(self)
    }

    /// Sum of all elements, zero in this unit when empty
    #[must_use]
    pub fn sum(&self) -> Quantity {
        Quantity::new(self.values.iter().sum(), self.unit)
    }

    /// Concatenate arrays, converting each part into `unit`
    ///
    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if any part has a different
    /// dimension from `unit`.
    pub fn concatenate(parts: &[&Quantities], unit: Unit) -> Result<Quantities, UnitError> {
        let total = parts.iter().map(|p| p.len()).sum();
        let mut values = Vec::with_capacity(total);
        for part in parts {
            let factor = part.unit.conversion_factor(unit)?;
            values.extend(part.values.iter().map(|v| v * factor));
        }
        Ok(Quantities::new(values, unit))
    }
}

/// An array of 3-vectors sharing one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vectors {
    values: Vec<Vec3>,
    unit: Unit,
}

impl Vectors {
    #[must_use]
    pub fn new(values: Vec<Vec3>, unit: Unit) -> Self {
        Vectors { values, unit }
    }

    #[must_use]
    pub fn empty(unit: Unit) -> Self {
        Vectors::new(Vec::new(), unit)
    }

    /// Build from a flat `[x0, y0, z0, x1, ...]` buffer
    ///
    /// Trailing values that do not form a full triple are ignored.
    #[must_use]
    pub fn from_flat(flat: &[f64], unit: Unit) -> Self {
        let values = flat
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();
        Vectors::new(values, unit)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Vec3] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn unit(&self) -> Unit {
        self.unit
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<VectorQuantity> {
        self.values
            .get(index)
            .map(|&value| VectorQuantity::new(value, self.unit))
    }

    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn to(&self, unit: Unit) -> Result<Vectors, UnitError> {
        self.clone().into_unit(unit)
    }

    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if the dimensions differ.
    pub fn into_unit(mut self, unit: Unit) -> Result<Vectors, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        if factor != 1.0 {
            for v in &mut self.values {
                *v *= factor;
            }
        }
        self.unit = unit;
        Ok(self)
    }

    /// Component-wise flattening, the inverse of [`Vectors::from_flat`]
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.values.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
    }

    /// # Errors
    /// Returns `UnitError::DimensionMismatch` if any part has a different
    /// dimension from `unit`.
    pub fn concatenate(parts: &[&Vectors], unit: Unit) -> Result<Vectors, UnitError> {
        let total = parts.iter().map(|p| p.len()).sum();
        let mut values = Vec::with_capacity(total);
        for part in parts {
            let factor = part.unit.conversion_factor(unit)?;
            values.extend(part.values.iter().map(|v| v * factor));
        }
        Ok(Vectors::new(values, unit))
    }
}
