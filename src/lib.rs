//! debris-ts: surface-temperature curves and regional debris statistics
//!
//! This library co-registers hourly energy-balance simulations of
//! debris-covered glacier surfaces with satellite surface-temperature
//! acquisitions, and aggregates per-glacier debris thickness and melt factor
//! estimates into regional robust statistics.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{AcquisitionEvent, DebrisCube, DebrisError, DebrisResult, GridCell};
pub use config::PipelineConfig;
pub use io::{AcquisitionGrid, CubeReader, ProductStore, SimulationCube, TsCurveProduct};
pub use core::{RegionalAggregator, TsCurveProcessor, TsCurveRunOptions};
