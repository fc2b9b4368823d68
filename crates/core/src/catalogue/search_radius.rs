//! Search and read radii for every halo in the catalogue
//!
//! The halo finder assigns particles to a halo within `R_size` of the centre
//! of mass, but properties are measured about the potential minimum. A
//! sphere about the potential minimum with radius
//!
//! ```text
//! search = 1.01 * R_size + |cofm - cofp|   (periodic)
//! ```
//!
//! therefore encloses every member particle. The read radius is the region
//! actually loaded from the snapshot and never drops below a fixed floor.
//!
//! Rows are spread over worker ranks; the coordinator reads the unit
//! metadata once, broadcasts it, and gathers the finished arrays back in
//! halo order.

use crate::catalogue::comm::{partition, run_ranks, Communicator, ROOT};
use crate::catalogue::periodic::periodic_distance;
use crate::catalogue::source::{datasets, CatalogueMetadata, CatalogueSource, UnitConversion};
use crate::core_types::cosmo::{CosmoFactor, CosmoQuantities, CosmoVectors};
use crate::core_types::units::{Quantities, Quantity, Unit, Vectors};
use crate::core_types::vec3::Vec3;
use crate::error::{SoError, SoResult};
use crate::halo::HaloContext;
use std::ops::Range;
use tracing::{debug, info};

/// Safety margin applied to the catalogue size radius
pub const SEARCH_RADIUS_FACTOR: f64 = 1.01;

/// Default floor on the read radius, in comoving Mpc
pub const DEFAULT_MINIMUM_READ_RADIUS_MPC: f64 = 5.0;

/// Radius about `cofp` that encloses a sphere of `size` about `cofm`
#[inline]
#[must_use]
pub fn search_radius(cofm: &Vec3, cofp: &Vec3, size: f64, box_size: f64) -> f64 {
    SEARCH_RADIUS_FACTOR * size + periodic_distance(cofm, cofp, box_size)
}

#[inline]
#[must_use]
pub fn read_radius(search_radius: f64, minimum: f64) -> f64 {
    search_radius.max(minimum)
}

/// Catalogue-derived arrays, owned by the coordinator after initialisation
///
/// All arrays are comoving Mpc with an a^1 cosmological factor.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloCatalogue {
    search_radius: CosmoQuantities,
    read_radius: CosmoQuantities,
    centre: CosmoVectors,
}

impl HaloCatalogue {
    /// # Errors
    /// Returns `SoError::InconsistentCatalogue` if the arrays differ in length.
    pub fn new(
        search_radius: CosmoQuantities,
        read_radius: CosmoQuantities,
        centre: CosmoVectors,
    ) -> SoResult<Self> {
        let n = search_radius.len();
        if read_radius.len() != n || centre.len() != n {
            return Err(SoError::InconsistentCatalogue(format!(
                "{n} search radii, {} read radii, {} centres",
                read_radius.len(),
                centre.len()
            )));
        }
        Ok(HaloCatalogue {
            search_radius,
            read_radius,
            centre,
        })
    }

    #[must_use]
    pub fn nr_halos(&self) -> usize {
        self.search_radius.len()
    }

    #[must_use]
    pub fn search_radius(&self) -> &CosmoQuantities {
        &self.search_radius
    }

    #[must_use]
    pub fn read_radius(&self) -> &CosmoQuantities {
        &self.read_radius
    }

    /// Potential-minimum centres
    #[must_use]
    pub fn centre(&self) -> &CosmoVectors {
        &self.centre
    }

    #[must_use]
    pub fn halo(&self, index: usize) -> Option<HaloContext> {
        Some(HaloContext {
            index,
            centre: self.centre.vectors().get(index)?,
            search_radius: self.search_radius.get(index)?,
            read_radius: self.read_radius.get(index)?,
        })
    }

    /// Every halo in catalogue order
    pub fn halos(&self) -> impl Iterator<Item = HaloContext> + '_ {
        (0..self.nr_halos()).filter_map(|i| self.halo(i))
    }
}

/// One rank's share of the catalogue, in comoving Mpc
struct LocalRadii {
    search: Vec<f64>,
    read: Vec<f64>,
    /// Flattened xyz of the potential minimum
    centres: Vec<f64>,
}

/// Computes [`HaloCatalogue`] arrays from a catalogue source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRadiusInitializer {
    /// Comoving Mpc
    box_size: f64,
    /// Comoving Mpc
    minimum_read_radius: f64,
    scale_factor: f64,
}

impl SearchRadiusInitializer {
    /// # Errors
    /// Returns `SoError::Config` for a non-positive box size or scale factor
    /// or a negative minimum radius, and `SoError::Unit` if either length is
    /// not a length.
    pub fn new(
        box_size: Quantity,
        minimum_read_radius: Quantity,
        scale_factor: f64,
    ) -> SoResult<Self> {
        let box_size = box_size.value_in(Unit::MPC)?;
        let minimum_read_radius = minimum_read_radius.value_in(Unit::MPC)?;
        if box_size <= 0.0 || !box_size.is_finite() {
            return Err(SoError::Config(format!(
                "box size must be positive, got {box_size} Mpc"
            )));
        }
        if minimum_read_radius < 0.0 {
            return Err(SoError::Config(format!(
                "minimum read radius must be non-negative, got {minimum_read_radius} Mpc"
            )));
        }
        if scale_factor <= 0.0 {
            return Err(SoError::Config(format!(
                "scale factor must be positive, got {scale_factor}"
            )));
        }
        Ok(SearchRadiusInitializer {
            box_size,
            minimum_read_radius,
            scale_factor,
        })
    }

    #[must_use]
    pub fn box_size(&self) -> Quantity {
        Quantity::new(self.box_size, Unit::MPC)
    }

    #[must_use]
    pub fn minimum_read_radius(&self) -> Quantity {
        Quantity::new(self.minimum_read_radius, Unit::MPC)
    }

    /// Run the initialisation on `nr_ranks` workers and return the
    /// coordinator's catalogue
    ///
    /// # Errors
    /// Returns the first error raised on any rank; a missing dataset or
    /// attribute aborts the whole run.
    pub fn initialize(
        &self,
        source: &dyn CatalogueSource,
        nr_ranks: usize,
    ) -> SoResult<HaloCatalogue> {
        let outputs = run_ranks(nr_ranks, |comm| self.initialize_rank(comm, source))?;
        outputs
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| SoError::Communication {
                rank: ROOT,
                message: "coordinator produced no catalogue".to_string(),
            })
    }

    /// This rank's part of the collective initialisation
    ///
    /// Every rank must call this with the same source. Only the coordinator
    /// returns the catalogue; other ranks hand their rows over and get
    /// `None`.
    ///
    /// # Errors
    /// Returns the local error if this rank failed, otherwise (on the
    /// coordinator) the first failure reported by another rank.
    pub fn initialize_rank(
        &self,
        comm: &mut Communicator,
        source: &dyn CatalogueSource,
    ) -> SoResult<Option<HaloCatalogue>> {
        let read = comm.is_root().then(|| CatalogueMetadata::read(source));
        let shared = comm.broadcast(ROOT, read.as_ref().and_then(|r| r.as_ref().ok()).copied());
        if let Some(Err(e)) = read {
            return Err(e);
        }
        let metadata = shared?;
        let conversion = metadata.conversion(self.scale_factor);
        if comm.is_root() {
            info!(
                "Catalogue units: comoving={} length factor {} Mpc, mass factor {} Msun",
                metadata.units.comoving, conversion.length_to_comoving_mpc, conversion.mass_to_msun
            );
        }

        let rows = partition(source.nr_halos(), comm.size())
            .swap_remove(comm.rank());
        debug!(rank = comm.rank(), "computing radii for halos {:?}", rows);

        let (search, read, centres, local_error) =
            match self.local_radii(source, rows, conversion) {
                Ok(LocalRadii {
                    search,
                    read,
                    centres,
                }) => (Ok(search), Ok(read), Ok(centres), None),
                Err(e) => {
                    let message = e.to_string();
                    (Err(message.clone()), Err(message.clone()), Err(message), Some(e))
                }
            };

        // Gather all three before reporting anything so no rank is left
        // waiting on a collective.
        let search = comm.gather(ROOT, search);
        let read = comm.gather(ROOT, read);
        let centres = comm.gather(ROOT, centres);
        if let Some(e) = local_error {
            return Err(e);
        }
        let (Some(search), Some(read), Some(centres)) = (search?, read?, centres?) else {
            return Ok(None);
        };

        let factor = CosmoFactor::length(self.scale_factor);
        let catalogue = HaloCatalogue::new(
            CosmoQuantities::new(Quantities::new(search, Unit::MPC), factor, true),
            CosmoQuantities::new(Quantities::new(read, Unit::MPC), factor, true),
            CosmoVectors::new(Vectors::from_flat(&centres, Unit::MPC), factor, true),
        )?;
        info!(
            "Initialised search radii for {} halos on {} ranks",
            catalogue.nr_halos(),
            comm.size()
        );
        Ok(Some(catalogue))
    }

    fn local_radii(
        &self,
        source: &dyn CatalogueSource,
        rows: Range<usize>,
        conversion: UnitConversion,
    ) -> SoResult<LocalRadii> {
        let column = |name: &str| -> SoResult<Vec<f64>> {
            let values = source.read(name, rows.clone())?;
            if values.len() != rows.len() {
                return Err(SoError::CatalogueRowMismatch {
                    field: name.to_string(),
                    expected: rows.len(),
                    found: values.len(),
                });
            }
            Ok(values
                .into_iter()
                .map(|v| v * conversion.length_to_comoving_mpc)
                .collect())
        };

        let [xp, yp, zp, xm, ym, zm, size] = datasets::HALO_DATASETS;
        let (xp, yp, zp) = (column(xp)?, column(yp)?, column(zp)?);
        let (xm, ym, zm) = (column(xm)?, column(ym)?, column(zm)?);
        let size = column(size)?;

        let n = rows.len();
        let mut local = LocalRadii {
            search: Vec::with_capacity(n),
            read: Vec::with_capacity(n),
            centres: Vec::with_capacity(3 * n),
        };
        for i in 0..n {
            let cofp = Vec3::new(xp[i], yp[i], zp[i]);
            let cofm = Vec3::new(xm[i], ym[i], zm[i]);
            let search = search_radius(&cofm, &cofp, size[i], self.box_size);
            local.search.push(search);
            local.read.push(read_radius(search, self.minimum_read_radius));
            local.centres.extend_from_slice(&[cofp.x, cofp.y, cofp.z]);
        }
        Ok(local)
    }
}
