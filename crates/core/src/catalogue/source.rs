//! Halo catalogue input
//!
//! The catalogue reader itself lives outside this crate; it is consumed
//! through the [`CatalogueSource`] trait. [`InMemoryCatalogue`] provides a
//! multi-file implementation backed by plain vectors, which is what the
//! tests and any pre-loaded catalogue use.

use crate::error::{SoError, SoResult};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Catalogue dataset names
pub mod datasets {
    pub const XC: &str = "Xc";
    pub const YC: &str = "Yc";
    pub const ZC: &str = "Zc";
    pub const XC_MINPOT: &str = "Xcminpot";
    pub const YC_MINPOT: &str = "Ycminpot";
    pub const ZC_MINPOT: &str = "Zcminpot";
    pub const R_SIZE: &str = "R_size";
    pub const NUM_OF_FILES: &str = "Num_of_files";

    /// Datasets read for every halo by the search radius initializer
    pub const HALO_DATASETS: [&str; 7] = [XC_MINPOT, YC_MINPOT, ZC_MINPOT, XC, YC, ZC, R_SIZE];
}

pub const UNIT_INFO_GROUP: &str = "UnitInfo";
pub const SIMULATION_INFO_GROUP: &str = "SimulationInfo";

/// Attribute group: attribute name to value
pub type Attributes = FxHashMap<String, f64>;

/// Read access to a (possibly multi-file) halo catalogue
///
/// Rows are addressed by global halo index, concatenated across files in
/// file order.
pub trait CatalogueSource: Sync {
    /// Total number of halos across all files
    fn nr_halos(&self) -> usize;

    /// Read `rows` of one dataset
    ///
    /// # Errors
    /// Returns `SoError::MissingCatalogueField` if the dataset does not exist.
    fn read(&self, dataset: &str, rows: Range<usize>) -> SoResult<Vec<f64>>;

    /// Attribute group from the first catalogue file
    ///
    /// # Errors
    /// Returns `SoError::MissingCatalogueAttribute` if the group is absent.
    fn attributes(&self, group: &str) -> SoResult<Attributes>;
}

fn required_attribute(attrs: &Attributes, group: &str, name: &str) -> SoResult<f64> {
    attrs
        .get(name)
        .copied()
        .ok_or_else(|| SoError::MissingCatalogueAttribute {
            group: group.to_string(),
            name: name.to_string(),
        })
}

/// Unit conventions of the catalogue (`UnitInfo` attributes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Lengths and masses are in comoving 1/h units
    pub comoving: bool,
    pub length_unit_to_kpc: f64,
    pub mass_unit_to_solarmass: f64,
}

impl UnitInfo {
    /// # Errors
    /// Returns an error naming the first missing attribute.
    pub fn from_attributes(attrs: &Attributes) -> SoResult<Self> {
        let flag = required_attribute(attrs, UNIT_INFO_GROUP, "Comoving_or_Physical")?;
        Ok(UnitInfo {
            comoving: flag as i64 != 0,
            length_unit_to_kpc: required_attribute(attrs, UNIT_INFO_GROUP, "Length_unit_to_kpc")?,
            mass_unit_to_solarmass: required_attribute(
                attrs,
                UNIT_INFO_GROUP,
                "Mass_unit_to_solarmass",
            )?,
        })
    }
}

/// Cosmological parameters stored with the catalogue (`SimulationInfo`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    pub h: f64,
}

impl SimulationInfo {
    /// # Errors
    /// Returns an error if `h_val` is missing.
    pub fn from_attributes(attrs: &Attributes) -> SoResult<Self> {
        Ok(SimulationInfo {
            h: required_attribute(attrs, SIMULATION_INFO_GROUP, "h_val")?,
        })
    }
}

/// Factors taking raw catalogue values to comoving Mpc and Msun
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConversion {
    pub length_to_comoving_mpc: f64,
    pub mass_to_msun: f64,
}

/// Everything read once by the coordinator and shared with all workers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogueMetadata {
    pub units: UnitInfo,
    pub simulation: SimulationInfo,
}

impl CatalogueMetadata {
    /// # Errors
    /// Returns an error if either attribute group or any attribute is missing.
    pub fn read(source: &dyn CatalogueSource) -> SoResult<Self> {
        let units = UnitInfo::from_attributes(&source.attributes(UNIT_INFO_GROUP)?)?;
        let simulation =
            SimulationInfo::from_attributes(&source.attributes(SIMULATION_INFO_GROUP)?)?;
        Ok(CatalogueMetadata { units, simulation })
    }

    /// Conversion factors at expansion factor `scale_factor`
    ///
    /// Physical catalogues are divided by `a` to become comoving; comoving
    /// catalogues are scaled by `h`.
    #[must_use]
    pub fn conversion(&self, scale_factor: f64) -> UnitConversion {
        let kpc_to_mpc = self.units.length_unit_to_kpc / 1000.0;
        if self.units.comoving {
            let h = self.simulation.h;
            UnitConversion {
                length_to_comoving_mpc: h * kpc_to_mpc,
                mass_to_msun: h * self.units.mass_unit_to_solarmass,
            }
        } else {
            UnitConversion {
                length_to_comoving_mpc: kpc_to_mpc / scale_factor,
                mass_to_msun: self.units.mass_unit_to_solarmass,
            }
        }
    }
}

/// On-disk layout of a catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CataloguePath {
    /// `<base>.properties`
    SingleFile(PathBuf),
    /// `<base>.properties.<file_nr>`
    MultiFile(String),
}

impl CataloguePath {
    /// Resolve the catalogue layout, preferring the single-file form
    pub fn resolve(basename: &str, exists: impl Fn(&Path) -> bool) -> CataloguePath {
        let single = PathBuf::from(format!("{basename}.properties"));
        if exists(&single) {
            CataloguePath::SingleFile(single)
        } else {
            CataloguePath::MultiFile(format!("{basename}.properties"))
        }
    }

    /// Path of file `file_nr`; the single-file layout ignores the number
    #[must_use]
    pub fn file_name(&self, file_nr: usize) -> PathBuf {
        match self {
            CataloguePath::SingleFile(path) => path.clone(),
            CataloguePath::MultiFile(prefix) => PathBuf::from(format!("{prefix}.{file_nr}")),
        }
    }
}

/// One catalogue file: per-halo datasets and attribute groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogueFile {
    nr_rows: usize,
    /// `Num_of_files` as stored in this file
    file_count: Option<usize>,
    datasets: FxHashMap<String, Vec<f64>>,
    attributes: FxHashMap<String, Attributes>,
}

impl CatalogueFile {
    #[must_use]
    pub fn new(nr_rows: usize) -> Self {
        CatalogueFile {
            nr_rows,
            ..Self::default()
        }
    }

    /// Add a per-halo dataset
    ///
    /// # Errors
    /// Returns `SoError::CatalogueRowMismatch` if the length differs from the
    /// file's row count.
    pub fn with_dataset(mut self, name: &str, values: Vec<f64>) -> SoResult<Self> {
        if values.len() != self.nr_rows {
            return Err(SoError::CatalogueRowMismatch {
                field: name.to_string(),
                expected: self.nr_rows,
                found: values.len(),
            });
        }
        self.datasets.insert(name.to_string(), values);
        Ok(self)
    }

    /// Add an attribute group
    #[must_use]
    pub fn with_attributes(mut self, group: &str, attrs: Attributes) -> Self {
        self.attributes.insert(group.to_string(), attrs);
        self
    }

    /// Set the file-count hint
    #[must_use]
    pub fn with_file_count(mut self, nr_files: usize) -> Self {
        self.file_count = Some(nr_files);
        self
    }

    #[must_use]
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }
}

/// Catalogue held in memory, split over one or more files
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryCatalogue {
    files: Vec<CatalogueFile>,
    /// Global index of the first row of each file, plus the total
    offsets: Vec<usize>,
}

impl InMemoryCatalogue {
    /// # Errors
    /// Returns `SoError::InconsistentCatalogue` if there are no files or any
    /// file's `Num_of_files` hint disagrees with the number of files.
    pub fn new(files: Vec<CatalogueFile>) -> SoResult<Self> {
        if files.is_empty() {
            return Err(SoError::InconsistentCatalogue(
                "catalogue has no files".to_string(),
            ));
        }
        for (file_nr, file) in files.iter().enumerate() {
            match file.file_count {
                Some(n) if n == files.len() => {}
                Some(n) => {
                    return Err(SoError::InconsistentCatalogue(format!(
                        "file {file_nr} reports {n} files, found {}",
                        files.len()
                    )))
                }
                None => {
                    return Err(SoError::InconsistentCatalogue(format!(
                        "file {file_nr} has no {} hint",
                        datasets::NUM_OF_FILES
                    )))
                }
            }
        }
        let mut offsets = Vec::with_capacity(files.len() + 1);
        let mut total = 0;
        for file in &files {
            offsets.push(total);
            total += file.nr_rows;
        }
        offsets.push(total);
        Ok(InMemoryCatalogue { files, offsets })
    }
}

impl CatalogueSource for InMemoryCatalogue {
    fn nr_halos(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    fn read(&self, dataset: &str, rows: Range<usize>) -> SoResult<Vec<f64>> {
        if rows.end > self.nr_halos() {
            return Err(SoError::InconsistentCatalogue(format!(
                "requested rows {}..{} of {} halos",
                rows.start,
                rows.end,
                self.nr_halos()
            )));
        }
        let mut out = Vec::with_capacity(rows.len());
        for (file, window) in self.files.iter().zip(self.offsets.windows(2)) {
            // Every file must carry the dataset, even when it holds no rows
            let values = file
                .datasets
                .get(dataset)
                .ok_or_else(|| SoError::MissingCatalogueField(dataset.to_string()))?;
            let (first, last) = (window[0], window[1]);
            let start = rows.start.max(first);
            let end = rows.end.min(last);
            if start < end {
                out.extend_from_slice(&values[start - first..end - first]);
            }
        }
        Ok(out)
    }

    fn attributes(&self, group: &str) -> SoResult<Attributes> {
        self.files[0]
            .attributes
            .get(group)
            .cloned()
            .ok_or_else(|| SoError::MissingCatalogueAttribute {
                group: group.to_string(),
                name: "*".to_string(),
            })
    }
}
