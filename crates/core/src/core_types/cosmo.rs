//! Cosmological bookkeeping: comoving/physical tagging and reference densities
//!
//! Catalogue-derived radii and centres are stored in comoving coordinates
//! together with the scale-factor exponent needed to convert them to
//! physical units. The [`Cosmology`] type provides the critical and mean
//! matter densities that spherical overdensities are measured against.

use crate::core_types::units::{Quantities, Quantity, Unit, Vectors};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Newton's constant in Mpc (km/s)^2 / Msun
pub const GRAVITATIONAL_CONSTANT: f64 = 4.300_917_270e-9;

/// Hubble constant for h = 1, in km/s/Mpc
pub const HUBBLE_100: f64 = 100.0;

/// Scale-factor dependence of a quantity: physical = comoving × a^exponent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CosmoFactor {
    a_exponent: f64,
    scale_factor: f64,
}

impl CosmoFactor {
    #[must_use]
    pub const fn new(a_exponent: f64, scale_factor: f64) -> Self {
        CosmoFactor {
            a_exponent,
            scale_factor,
        }
    }

    /// Factor for comoving lengths (exponent 1)
    #[must_use]
    pub const fn length(scale_factor: f64) -> Self {
        CosmoFactor::new(1.0, scale_factor)
    }

    #[must_use]
    pub const fn a_exponent(&self) -> f64 {
        self.a_exponent
    }

    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Multiplier taking a comoving value to a physical one
    #[must_use]
    pub fn comoving_to_physical(&self) -> f64 {
        self.scale_factor.powf(self.a_exponent)
    }
}

/// Scalar array tagged with its cosmological frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CosmoQuantities {
    quantities: Quantities,
    cosmo_factor: CosmoFactor,
    comoving: bool,
}

impl CosmoQuantities {
    #[must_use]
    pub fn new(quantities: Quantities, cosmo_factor: CosmoFactor, comoving: bool) -> Self {
        Self {
            quantities,
            cosmo_factor,
            comoving,
        }
    }

    #[must_use]
    pub fn quantities(&self) -> &Quantities {
        &self.quantities
    }

    #[must_use]
    pub fn cosmo_factor(&self) -> CosmoFactor {
        self.cosmo_factor
    }

    #[must_use]
    pub fn is_comoving(&self) -> bool {
        self.comoving
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Quantity> {
        self.quantities.get(index)
    }

    /// Copy expressed in physical units
    #[must_use]
    pub fn to_physical(&self) -> CosmoQuantities {
        if !self.comoving {
            return self.clone();
        }
        let factor = self.cosmo_factor.comoving_to_physical();
        let values = self.quantities.values().iter().map(|v| v * factor).collect();
        CosmoQuantities::new(
            Quantities::new(values, self.quantities.unit()),
            self.cosmo_factor,
            false,
        )
    }
}

/// Vector array tagged with its cosmological frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CosmoVectors {
    vectors: Vectors,
    cosmo_factor: CosmoFactor,
    comoving: bool,
}

impl CosmoVectors {
    #[must_use]
    pub fn new(vectors: Vectors, cosmo_factor: CosmoFactor, comoving: bool) -> Self {
        Self {
            vectors,
            cosmo_factor,
            comoving,
        }
    }

    #[must_use]
    pub fn vectors(&self) -> &Vectors {
        &self.vectors
    }

    #[must_use]
    pub fn cosmo_factor(&self) -> CosmoFactor {
        self.cosmo_factor
    }

    #[must_use]
    pub fn is_comoving(&self) -> bool {
        self.comoving
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn to_physical(&self) -> CosmoVectors {
        if !self.comoving {
            return self.clone();
        }
        let factor = self.cosmo_factor.comoving_to_physical();
        let values = self.vectors.values().iter().map(|v| v * factor).collect();
        CosmoVectors::new(
            Vectors::new(values, self.vectors.unit()),
            self.cosmo_factor,
            false,
        )
    }
}

/// Background cosmology used to derive reference densities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    /// Dimensionless Hubble parameter, H0 = 100 h km/s/Mpc
    pub h: f64,
    /// Matter density parameter at z = 0
    pub omega_m: f64,
    /// Dark energy density parameter at z = 0
    pub omega_lambda: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        // Planck 2013 parameters as used by the EAGLE runs
        Cosmology {
            h: 0.6777,
            omega_m: 0.307,
            omega_lambda: 0.693,
        }
    }
}

/// Critical and mean matter density at one epoch, same frame for both
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceDensities {
    pub critical: Quantity,
    pub mean: Quantity,
}

impl Cosmology {
    /// Curvature density parameter implied by the other two
    #[must_use]
    pub fn omega_k(&self) -> f64 {
        1.0 - self.omega_m - self.omega_lambda
    }

    /// Hubble parameter H(a) in km/s/Mpc
    #[must_use]
    pub fn hubble_parameter(&self, scale_factor: f64) -> Quantity {
        let a = scale_factor;
        let e2 = self.omega_m / (a * a * a) + self.omega_k() / (a * a) + self.omega_lambda;
        Quantity::new(
            HUBBLE_100 * self.h * e2.sqrt(),
            Unit::KM_PER_S / Unit::MPC,
        )
    }

    /// Physical critical density 3 H(a)^2 / (8 π G) in Msun/Mpc^3
    #[must_use]
    pub fn critical_density(&self, scale_factor: f64) -> Quantity {
        // H in km/s/Mpc and G in Mpc (km/s)^2 / Msun leave Msun/Mpc^3
        let hubble = self.hubble_parameter(scale_factor).value();
        Quantity::new(
            3.0 * hubble * hubble / (8.0 * PI * GRAVITATIONAL_CONSTANT),
            Unit::MSUN_PER_MPC3,
        )
    }

    /// Physical mean matter density Ω_m ρ_crit(a=1) / a^3 in Msun/Mpc^3
    #[must_use]
    pub fn mean_density(&self, scale_factor: f64) -> Quantity {
        let rho_crit_0 = self.critical_density(1.0);
        rho_crit_0 * (self.omega_m / scale_factor.powi(3))
    }

    /// Both reference densities, in comoving units if `comoving` is set
    ///
    /// Comoving densities are physical densities times a^3, matching particle
    /// coordinates stored in comoving Mpc.
    #[must_use]
    pub fn reference_densities(&self, scale_factor: f64, comoving: bool) -> ReferenceDensities {
        let factor = if comoving { scale_factor.powi(3) } else { 1.0 };
        ReferenceDensities {
            critical: self.critical_density(scale_factor) * factor,
            mean: self.mean_density(scale_factor) * factor,
        }
    }
}
