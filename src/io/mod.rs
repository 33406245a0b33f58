//! I/O modules for simulation cubes, acquisition grids and binned glacier tables

pub mod cube;
pub mod acquisition;
pub mod binned;
pub mod stats_table;

pub use cube::{CubeReader, ProductStore, SimulationCube, TsCurveProduct};
pub use acquisition::AcquisitionGrid;
pub use binned::{read_binned_table, BinnedColumnNames, BinnedSchema, BinnedTable};
pub use stats_table::{write_histogram, write_region_stats};
