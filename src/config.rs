//! Run configuration passed explicitly to every pipeline component

use crate::types::{DebrisError, DebrisResult, GridCell};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the encoded lat/lon string in filename templates
pub const LATLON_PLACEHOLDER: &str = "XXXX";

/// Directory layout of inputs and outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Raw energy-balance simulation cubes
    pub eb_dir: PathBuf,
    /// Interpolated surface-temperature curve products
    pub tscurve_dir: PathBuf,
    /// Gridded acquisition statistics (year, day of year, hour)
    pub ts_info_path: PathBuf,
    /// Per-glacier binned debris thickness tables
    pub hdts_bin_dir: PathBuf,
    /// Per-glacier binned tables for extrapolated glaciers
    pub hdts_bin_extrap_dir: PathBuf,
    /// Regional statistics table and histograms
    pub output_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            eb_dir: PathBuf::from("output/exp3"),
            tscurve_dir: PathBuf::from("output/ts_tif/ts_curves"),
            ts_info_path: PathBuf::from("output/ts_tif/01_debris_tsinfo.json"),
            hdts_bin_dir: PathBuf::from("mb_data/mb_bins/_wdebris_hdts"),
            hdts_bin_extrap_dir: PathBuf::from("mb_data/mb_bins/_wdebris_hdts_extrap"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Filename conventions for simulation cubes and products
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Cube filename prefix; defaults to `Rounce2015_<roi>-`
    pub fn_prefix: Option<String>,
    /// Run-date string appended to cube filenames
    pub date_start: String,
    pub experiment_no: u32,
    pub mc_simulations: u32,
    pub cube_extension: String,
    /// Product filename template containing [`LATLON_PLACEHOLDER`]
    pub output_ts_fn_sample: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            fn_prefix: None,
            date_start: "20191227".to_string(),
            experiment_no: 3,
            mc_simulations: 100,
            cube_extension: ".json".to_string(),
            output_ts_fn_sample: format!("{}_debris_ts_curve.json", LATLON_PLACEHOLDER),
        }
    }
}

/// Surface-temperature curve extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TsCurveParams {
    /// Days sampled on each side of the acquisition day
    pub window_half_days: usize,
    /// Time steps per day on the simulation axis
    pub hours_per_day: usize,
    /// Thinnest debris (cm) included in surface-temperature summaries
    pub summary_min_hd_cm: f64,
}

impl Default for TsCurveParams {
    fn default() -> Self {
        Self {
            window_half_days: 30,
            hours_per_day: 24,
            summary_min_hd_cm: 5.0,
        }
    }
}

impl TsCurveParams {
    /// Number of samples in a co-registration window
    pub fn window_len(&self) -> usize {
        2 * self.window_half_days + 1
    }
}

/// Half-open histogram bin layout, equivalent to `arange(start, stop, step)` edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl BinSpec {
    /// Bin edges from `start` up to and including `stop`
    pub fn edges(&self) -> Vec<f64> {
        let n = ((self.stop - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..n).map(|i| self.start + i as f64 * self.step).collect()
    }
}

/// Regional debris thickness and melt factor statistics parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalStatsParams {
    /// Two-digit region codes, in output order
    pub rois: Vec<String>,
    /// Area quantization: samples per km2 (1e4 is one sample per 100 m2)
    pub area_factor: f64,
    pub area_column: String,
    pub hd_column: String,
    pub mf_column: String,
    /// Consistency constant applied to the median absolute deviation
    pub mad_scale: f64,
    pub hd_hist_bins: BinSpec,
    pub mf_hist_bins: BinSpec,
    pub stats_filename: String,
}

impl Default for RegionalStatsParams {
    fn default() -> Self {
        let rois = [
            "01", "02", "03", "04", "05", "06", "07", "08", "09", "11", "12", "13", "14", "15",
            "16", "17", "18",
        ];
        Self {
            rois: rois.iter().map(|r| r.to_string()).collect(),
            area_factor: 1e4,
            area_column: "dc_bin_area_valid_km2".to_string(),
            hd_column: "hd_ts_mean_m".to_string(),
            mf_column: "mf_ts_mean".to_string(),
            mad_scale: crate::core::statistics::MAD_NORMAL_SCALE,
            hd_hist_bins: BinSpec { start: 0.0, stop: 2.0, step: 0.05 },
            mf_hist_bins: BinSpec { start: 0.0, stop: 1.5, step: 0.05 },
            stats_filename: "reg_stats_hd_mf.csv".to_string(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Region of interest of the surface-temperature run
    pub roi: String,
    pub paths: PathConfig,
    pub naming: NamingConfig,
    pub ts_curve: TsCurveParams,
    pub regional: RegionalStatsParams,
    /// Cells to process when no lat/lon file is supplied
    pub latlon_list: Vec<(f64, f64)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roi: "01".to_string(),
            paths: PathConfig::default(),
            naming: NamingConfig::default(),
            ts_curve: TsCurveParams::default(),
            regional: RegionalStatsParams::default(),
            latlon_list: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> DebrisResult<Self> {
        log::info!("Loading configuration: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> DebrisResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| DebrisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> DebrisResult<()> {
        if !self.naming.output_ts_fn_sample.contains(LATLON_PLACEHOLDER) {
            return Err(DebrisError::Config(format!(
                "output_ts_fn_sample '{}' must contain '{}'",
                self.naming.output_ts_fn_sample, LATLON_PLACEHOLDER
            )));
        }
        if self.ts_curve.window_half_days == 0 || self.ts_curve.hours_per_day == 0 {
            return Err(DebrisError::Config(
                "co-registration window and hours per day must be positive".to_string(),
            ));
        }
        if !(self.regional.area_factor > 0.0) {
            return Err(DebrisError::Config(format!(
                "area_factor must be positive, got {}",
                self.regional.area_factor
            )));
        }
        if self.regional.rois.is_empty() {
            return Err(DebrisError::Config("region list is empty".to_string()));
        }
        for bins in [&self.regional.hd_hist_bins, &self.regional.mf_hist_bins] {
            if !(bins.step > 0.0) || bins.stop <= bins.start {
                return Err(DebrisError::Config(format!("invalid histogram bins: {:?}", bins)));
            }
        }
        Ok(())
    }

    pub fn fn_prefix(&self) -> String {
        self.naming
            .fn_prefix
            .clone()
            .unwrap_or_else(|| format!("Rounce2015_{}-", self.roi))
    }

    /// Raw simulation cube filename for a grid cell
    pub fn cube_filename(&self, cell: &GridCell) -> String {
        let mc_str = if self.naming.experiment_no == 3 {
            String::new()
        } else {
            format!("{}MC_", self.naming.mc_simulations)
        };
        format!(
            "{}{}{}{}{}",
            self.fn_prefix(),
            cell.latlon_str(),
            mc_str,
            self.naming.date_start,
            self.naming.cube_extension
        )
    }

    pub fn cube_path(&self, cell: &GridCell) -> PathBuf {
        self.paths.eb_dir.join(self.cube_filename(cell))
    }

    /// Interpolated surface-temperature curve filename for a grid cell
    pub fn product_filename(&self, cell: &GridCell) -> String {
        self.naming
            .output_ts_fn_sample
            .replace(LATLON_PLACEHOLDER, &cell.latlon_str())
    }

    pub fn product_path(&self, cell: &GridCell) -> PathBuf {
        self.paths.tscurve_dir.join(self.product_filename(cell))
    }

    /// Configured cells with longitudes normalised
    pub fn cells(&self) -> Vec<GridCell> {
        self.latlon_list
            .iter()
            .map(|&(lat, lon)| GridCell::new(lat, lon))
            .collect()
    }
}
