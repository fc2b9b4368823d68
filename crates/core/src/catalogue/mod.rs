//! Halo catalogue ingestion and per-halo search radii

pub mod comm;
pub mod periodic;
pub mod search_radius;
pub mod source;

pub use comm::{partition, run_ranks, Communicator, ROOT};
pub use periodic::{periodic_distance, periodic_distance_quantity, wrapped_delta};
pub use search_radius::{
    read_radius, search_radius, HaloCatalogue, SearchRadiusInitializer,
    DEFAULT_MINIMUM_READ_RADIUS_MPC, SEARCH_RADIUS_FACTOR,
};
pub use source::{
    datasets, Attributes, CatalogueFile, CatalogueMetadata, CataloguePath, CatalogueSource,
    InMemoryCatalogue, SimulationInfo, UnitConversion, UnitInfo, SIMULATION_INFO_GROUP,
    UNIT_INFO_GROUP,
};
