//! Running property calculators over a halo catalogue
//!
//! Halos are independent: each one is loaded, measured and merged on its own
//! rayon task, and the per-halo records come back in catalogue order.

use crate::catalogue::HaloCatalogue;
use crate::core_types::particles::ParticleData;
use crate::error::{SoError, SoResult};
use crate::halo::HaloContext;
use crate::properties::{HaloRecord, PropertyCalculator};
use rayon::prelude::*;
use tracing::{info, warn};

/// Source of particle data around a halo
///
/// Implementations return every particle within `halo.read_radius` of
/// `halo.centre`. A species with no particles in the snapshot is simply
/// left out of the returned data.
pub trait ParticleLoader: Sync {
    /// # Errors
    /// Implementations report read failures as `SoError::ParticleLoad`.
    fn load(&self, halo: &HaloContext) -> SoResult<ParticleData>;
}

impl<F> ParticleLoader for F
where
    F: Fn(&HaloContext) -> SoResult<ParticleData> + Sync,
{
    fn load(&self, halo: &HaloContext) -> SoResult<ParticleData> {
        self(halo)
    }
}

/// Runs a fixed set of calculators on every halo
#[derive(Debug, Clone, PartialEq)]
pub struct HaloProcessor {
    calculators: Vec<PropertyCalculator>,
}

impl HaloProcessor {
    /// # Errors
    /// Returns `SoError::DuplicateProperty` if two calculators share a name.
    pub fn new(calculators: Vec<PropertyCalculator>) -> SoResult<Self> {
        for (i, calc) in calculators.iter().enumerate() {
            if calculators[..i].iter().any(|c| c.name() == calc.name()) {
                return Err(SoError::DuplicateProperty(calc.name().to_string()));
            }
        }
        info!(
            "Halo processor: {} calculators [{}]",
            calculators.len(),
            calculators
                .iter()
                .map(PropertyCalculator::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(HaloProcessor { calculators })
    }

    #[must_use]
    pub fn calculators(&self) -> &[PropertyCalculator] {
        &self.calculators
    }

    /// Run every calculator on one halo
    ///
    /// The halo is loaded once. A calculator whose density never drops below
    /// its reference inside the read radius is logged as a warning.
    ///
    /// # Errors
    /// Returns loader failures, malformed particle data and property name
    /// collisions.
    pub fn process_halo(
        &self,
        halo: &HaloContext,
        loader: &dyn ParticleLoader,
    ) -> SoResult<HaloRecord> {
        let data = loader.load(halo)?;

        let mut record = HaloRecord::new(halo.index);
        for calc in &self.calculators {
            let output = calc.compute(halo, &data)?;
            if output.radius_exhausted {
                warn!(
                    "Halo {}: {} radius not enclosed within read radius {}",
                    halo.index,
                    calc.name(),
                    halo.read_radius
                );
            }
            record.merge(output.result)?;
        }
        Ok(record)
    }

    /// Process `halos` in parallel, returning records in input order
    ///
    /// # Errors
    /// Returns the error of the first failing halo; the run is aborted.
    pub fn process_halos(
        &self,
        halos: &[HaloContext],
        loader: &dyn ParticleLoader,
    ) -> SoResult<Vec<HaloRecord>> {
        halos
            .par_iter()
            .map(|halo| self.process_halo(halo, loader))
            .collect()
    }

    /// # Errors
    /// See [`HaloProcessor::process_halos`].
    pub fn process_catalogue(
        &self,
        catalogue: &HaloCatalogue,
        loader: &dyn ParticleLoader,
    ) -> SoResult<Vec<HaloRecord>> {
        let halos: Vec<HaloContext> = catalogue.halos().collect();
        info!("Processing {} halos", halos.len());
        let records = self.process_halos(&halos, loader)?;
        info!("Finished {} halos", records.len());
        Ok(records)
    }
}
