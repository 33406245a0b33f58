//! Core processing modules

pub mod coregister;
pub mod parallel;
pub mod regional;
pub mod statistics;
pub mod tscurve;

// Re-export main types
pub use coregister::{coregistration_window, interpolate_window, interpolated_times, lerp, locate_timestamp};
pub use parallel::{run_worker_slices, select_batch, split_list};
pub use regional::{
    quantize_area, summarize_regions, AreaHistogram, RegionStats, RegionalAggregator, RegionalSummary,
    SamplePopulation, ALL_REGIONS,
};
pub use statistics::{RobustStats, MAD_NORMAL_SCALE};
pub use tscurve::{
    build_product, plan_cell, summarize_thickness, CellOutcome, CellPlan, ThicknessTsStats, TsCurveProcessor,
    TsCurveRun, TsCurveRunOptions, WorkerReport,
};
