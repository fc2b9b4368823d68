//! Vector type alias for 3D positions and velocities.

use nalgebra::Vector3;

/// 3D vector type for positions, velocities, and centres.
///
/// Double precision: cosmological boxes span hundreds of Mpc while halo
/// structure is resolved at the kpc level.
pub type Vec3 = Vector3<f64>;
