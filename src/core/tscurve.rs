//! Surface-temperature curves co-registered with satellite acquisitions
//!
//! For every grid cell the hourly energy-balance output is sampled at the
//! satellite acquisition hour on each day of a window centred on the
//! acquisition date, and linearly interpolated to the acquisition minute.

use crate::config::{PipelineConfig, TsCurveParams};
use crate::core::coregister::{coregistration_window, interpolate_window, interpolated_times, locate_timestamp};
use crate::core::parallel::{run_worker_slices, split_list};
use crate::core::statistics::RobustStats;
use crate::io::acquisition::AcquisitionGrid;
use crate::io::cube::{CubeReader, ProductStore, SimulationCube, TsCurveProduct};
use crate::types::{AcquisitionEvent, DebrisError, DebrisResult, GridCell, KELVIN_OFFSET};
use ndarray::{s, Axis};
use std::path::PathBuf;

/// What to do with a cell given the state of its input and output files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPlan {
    Process,
    /// Product already written by an earlier run
    SkipExisting,
    /// Simulation has not been run for this cell yet
    SkipMissingCube,
}

/// Decide whether a cell needs processing. Existing products take precedence
/// so reruns never touch finished cells.
pub fn plan_cell(product_exists: bool, cube_exists: bool) -> CellPlan {
    if product_exists {
        CellPlan::SkipExisting
    } else if !cube_exists {
        CellPlan::SkipMissingCube
    } else {
        CellPlan::Process
    }
}

/// Result of handling one cell
#[derive(Debug)]
pub enum CellOutcome {
    Written {
        path: PathBuf,
        product: Box<TsCurveProduct>,
    },
    SkippedExisting,
    SkippedMissingCube,
    SkippedNoAcquisition,
}

impl CellOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, CellOutcome::Written { .. })
    }
}

/// Build the interpolated product for a cube and its acquisition
pub fn build_product(
    cube: &SimulationCube,
    event: &AcquisitionEvent,
    params: &TsCurveParams,
) -> DebrisResult<TsCurveProduct> {
    let acquisition_hour = event.hour_timestamp()?;
    let match_idx = locate_timestamp(&cube.time, acquisition_hour)?;
    let window = coregistration_window(
        match_idx,
        cube.time.len(),
        params.window_half_days,
        params.hours_per_day,
    )?;
    log::debug!(
        "Acquisition {} matched time index {}, window {}..={}",
        acquisition_hour,
        match_idx,
        window[0],
        window[window.len() - 1]
    );

    let weight = event.hour_fraction();
    Ok(TsCurveProduct {
        latitude: cube.latitude,
        longitude: cube.longitude,
        hd_cm: cube.hd_cm.clone(),
        time: interpolated_times(&cube.time, &window, event.minute_offset()),
        elev: cube.elev.clone(),
        ts: interpolate_window(&cube.ts, &window, weight)?,
        dsnow: interpolate_window(&cube.snow_depth, &window, weight)?,
        attrs: cube.attrs.clone(),
    })
}

/// Surface-temperature statistics for one debris thickness
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessTsStats {
    pub debris_thickness_m: f64,
    /// Snow-free samples used
    pub n_samples: usize,
    /// Statistics of surface temperature in degrees Celsius
    pub ts_degc: RobustStats,
}

/// Summarise the interpolated surface temperature of one elevation band per
/// debris thickness, excluding snow-covered samples and thin debris.
/// `mad_scale` multiplies the median absolute deviation.
pub fn summarize_thickness(
    product: &TsCurveProduct,
    elev_idx: usize,
    min_hd_cm: f64,
    mad_scale: f64,
) -> DebrisResult<Vec<ThicknessTsStats>> {
    if elev_idx >= product.elev.len() {
        return Err(DebrisError::Processing(format!(
            "elevation index {} out of range for {} bands",
            elev_idx,
            product.elev.len()
        )));
    }

    let ts = product.ts.slice(s![.., .., elev_idx]);
    let dsnow = product.dsnow.slice(s![.., .., elev_idx]);
    let mut summary = Vec::new();

    for (h, (ts_row, snow_row)) in ts.axis_iter(Axis(0)).zip(dsnow.axis_iter(Axis(0))).enumerate() {
        let hd_cm = product.hd_cm[h];
        if hd_cm < min_hd_cm {
            continue;
        }
        let samples: Vec<f64> = ts_row
            .iter()
            .zip(snow_row.iter())
            .filter(|(t, snow)| !(**snow > 0.0) && !t.is_nan())
            .map(|(&t, _)| t - KELVIN_OFFSET)
            .collect();

        summary.push(ThicknessTsStats {
            debris_thickness_m: hd_cm / 100.0,
            n_samples: samples.len(),
            ts_degc: RobustStats::from_samples(&samples, mad_scale),
        });
    }
    Ok(summary)
}

/// Summary of one worker's slice of cells
#[derive(Debug)]
pub struct WorkerReport {
    pub worker: usize,
    pub assigned: usize,
    pub written: usize,
    pub skipped: usize,
    /// Fatal error that stopped the slice, with the cell that raised it
    pub error: Option<(GridCell, DebrisError)>,
    pub last_product: Option<Box<TsCurveProduct>>,
}

impl WorkerReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Options for a surface-temperature curve run
#[derive(Debug, Clone)]
pub struct TsCurveRunOptions {
    pub num_workers: usize,
    pub parallel: bool,
    /// Keep cells in their original order when splitting across workers
    pub ordered: bool,
    /// Verbose per-cell logging; workers keep their last product
    pub debug: bool,
}

impl Default for TsCurveRunOptions {
    fn default() -> Self {
        Self {
            num_workers: 4,
            parallel: true,
            ordered: true,
            debug: false,
        }
    }
}

/// Outcome of a run across all workers
#[derive(Debug)]
pub struct TsCurveRun {
    pub reports: Vec<WorkerReport>,
}

impl TsCurveRun {
    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &WorkerReport> {
        self.reports.iter().filter(|r| r.failed())
    }

    /// Most recent product of the last worker that built one
    pub fn last_product(&self) -> Option<&TsCurveProduct> {
        self.reports
            .iter()
            .rev()
            .find_map(|r| r.last_product.as_deref())
    }
}

/// Surface-temperature curve processor for grid cells
pub struct TsCurveProcessor<'a> {
    config: &'a PipelineConfig,
    grid: &'a AcquisitionGrid,
}

impl<'a> TsCurveProcessor<'a> {
    pub fn new(config: &'a PipelineConfig, grid: &'a AcquisitionGrid) -> Self {
        Self { config, grid }
    }

    pub fn plan(&self, cell: &GridCell) -> CellPlan {
        plan_cell(
            self.config.product_path(cell).exists(),
            self.config.cube_path(cell).exists(),
        )
    }

    /// Process one cell: skip it, or build and persist its product
    pub fn process_cell(&self, cell: &GridCell) -> DebrisResult<CellOutcome> {
        match self.plan(cell) {
            CellPlan::SkipExisting => {
                log::debug!("{}: product exists, skipping", cell);
                return Ok(CellOutcome::SkippedExisting);
            }
            CellPlan::SkipMissingCube => {
                log::debug!("{}: no simulation output, skipping", cell);
                return Ok(CellOutcome::SkippedMissingCube);
            }
            CellPlan::Process => {}
        }

        let event = match self.grid.event_for(cell) {
            Some(event) => event,
            None => {
                log::debug!("{}: no satellite acquisition, skipping", cell);
                return Ok(CellOutcome::SkippedNoAcquisition);
            }
        };
        log::debug!(
            "{}: acquisition year {} day {} hour {:.3}",
            cell,
            event.year,
            event.doy,
            event.hour
        );

        let cube = CubeReader::read_cube(self.config.cube_path(cell))?;
        let product = build_product(&cube, &event, &self.config.ts_curve)?;

        let path = self.config.product_path(cell);
        ProductStore::write_product(&product, &path)?;
        Ok(CellOutcome::Written {
            path,
            product: Box::new(product),
        })
    }

    /// Process a slice of cells in order, stopping at the first fatal error
    pub fn run_slice(&self, worker: usize, cells: &[GridCell], keep_last: bool) -> WorkerReport {
        let mut report = WorkerReport {
            worker,
            assigned: cells.len(),
            written: 0,
            skipped: 0,
            error: None,
            last_product: None,
        };

        for (n, cell) in cells.iter().enumerate() {
            log::info!("worker {}: {} {}", worker, n, cell);
            match self.process_cell(cell) {
                Ok(CellOutcome::Written { path, product }) => {
                    log::debug!("worker {}: wrote {}", worker, path.display());
                    report.written += 1;
                    if keep_last {
                        report.last_product = Some(product);
                    }
                }
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    log::error!("worker {}: cell {} failed: {}", worker, cell, e);
                    report.error = Some((*cell, e));
                    break;
                }
            }
        }
        report
    }

    /// Split cells across workers and process every slice
    pub fn run(&self, cells: &[GridCell], options: &TsCurveRunOptions) -> DebrisResult<TsCurveRun> {
        let num_workers = if options.parallel {
            options.num_workers.min(cells.len()).max(1)
        } else {
            1
        };
        let slices = split_list(cells, num_workers, options.ordered);
        log::info!(
            "Processing {} cells with {} worker(s){}",
            cells.len(),
            num_workers,
            if options.parallel { " in parallel" } else { "" }
        );

        let keep_last = options.debug;
        let reports = run_worker_slices(&slices, num_workers, options.parallel, |worker, slice| {
            self.run_slice(worker, slice, keep_last)
        })?;
        Ok(TsCurveRun { reports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::statistics::MAD_NORMAL_SCALE;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array3;
    use std::collections::BTreeMap;

    fn cube_starting(year: i32, month: u32, day: u32, n_time: usize) -> SimulationCube {
        let start = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SimulationCube {
            latitude: 28.0,
            longitude: 86.5,
            hd_cm: vec![2.0, 10.0, 50.0],
            time: (0..n_time).map(|i| start + Duration::hours(i as i64)).collect(),
            elev: vec![4800.0, 5200.0],
            ts: Array3::from_shape_fn((3, n_time, 2), |(h, t, e)| 250.0 + h as f64 + t as f64 * 0.01 + e as f64),
            snow_depth: Array3::from_shape_fn((3, n_time, 2), |(_, t, _)| if t % 48 < 24 { 0.1 } else { 0.0 }),
            attrs: BTreeMap::from([("roi".to_string(), "HMA".to_string())]),
        }
    }

    #[test]
    fn test_plan_cell() {
        assert_eq!(plan_cell(true, true), CellPlan::SkipExisting);
        assert_eq!(plan_cell(true, false), CellPlan::SkipExisting);
        assert_eq!(plan_cell(false, false), CellPlan::SkipMissingCube);
        assert_eq!(plan_cell(false, true), CellPlan::Process);
    }

    #[test]
    fn test_build_product() {
        let cube = cube_starting(2015, 7, 1, 24 * 120);
        let event = AcquisitionEvent { year: 2015, doy: 240, hour: 6.5 };
        let product = build_product(&cube, &event, &TsCurveParams::default()).unwrap();

        assert_eq!(product.ts.dim(), (3, 61, 2));
        assert_eq!(product.dsnow.dim(), (3, 61, 2));
        assert_eq!(product.hd_cm, cube.hd_cm);
        assert_eq!(product.elev, cube.elev);
        assert_eq!(product.attrs.get("roi").map(String::as_str), Some("HMA"));

        // Day 240 of 2015 is 28 August; centre sample at 06:30
        let centre = NaiveDate::from_ymd_opt(2015, 8, 28).unwrap().and_hms_opt(6, 30, 0).unwrap();
        assert_eq!(product.time[30], centre);
        assert_eq!(product.time[0], centre - Duration::days(30));
        assert_eq!(product.time[60], centre + Duration::days(30));

        let match_idx = cube.time.iter().position(|&t| t == centre - Duration::minutes(30)).unwrap();
        let expected = (cube.ts[[1, match_idx, 0]] + cube.ts[[1, match_idx + 1, 0]]) / 2.0;
        assert_abs_diff_eq!(product.ts[[1, 30, 0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_acquisition_outside_axis() {
        let cube = cube_starting(2015, 7, 1, 24 * 120);
        let event = AcquisitionEvent { year: 2016, doy: 100, hour: 3.0 };
        assert!(matches!(
            build_product(&cube, &event, &TsCurveParams::default()),
            Err(DebrisError::TimestampNotFound(_))
        ));

        // 10 days after the start of the axis
        let early = AcquisitionEvent { year: 2015, doy: 192, hour: 3.0 };
        assert!(matches!(
            build_product(&cube, &early, &TsCurveParams::default()),
            Err(DebrisError::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn test_summarize_thickness_excludes_snow() {
        let cube = cube_starting(2015, 7, 1, 24 * 120);
        let event = AcquisitionEvent { year: 2015, doy: 240, hour: 6.0 };
        let product = build_product(&cube, &event, &TsCurveParams::default()).unwrap();

        let summary = summarize_thickness(&product, 0, 5.0, MAD_NORMAL_SCALE).unwrap();
        assert_eq!(summary.len(), 2);
        assert_abs_diff_eq!(summary[0].debris_thickness_m, 0.1, epsilon = 1e-12);
        // Snow lies on alternate days
        assert!(summary[0].n_samples > 0 && summary[0].n_samples < 61);
        assert!(summary[0].ts_degc.median < 0.0);

        assert!(summarize_thickness(&product, 5, 5.0, MAD_NORMAL_SCALE).is_err());
    }

    #[test]
    fn test_summary_uses_configured_mad_scale() {
        let cube = cube_starting(2015, 7, 1, 24 * 120);
        let event = AcquisitionEvent { year: 2015, doy: 240, hour: 6.0 };
        let product = build_product(&cube, &event, &TsCurveParams::default()).unwrap();

        let scaled = summarize_thickness(&product, 0, 5.0, MAD_NORMAL_SCALE).unwrap();
        let raw = summarize_thickness(&product, 0, 5.0, 1.0).unwrap();
        assert!(raw[0].ts_degc.mad > 0.0);
        assert_abs_diff_eq!(scaled[0].ts_degc.mad, raw[0].ts_degc.mad * MAD_NORMAL_SCALE, epsilon = 1e-9);
        assert_eq!(scaled[0].ts_degc.median, raw[0].ts_degc.median);
    }
}
