//! Regional debris thickness and melt factor statistics
//!
//! Per-bin mean values are expanded into equal-weight sample populations by
//! repeating each value once per unit of valid debris-covered area, so that
//! order statistics over the population are area-weighted statistics over the
//! glaciers.

use crate::config::{PathConfig, RegionalStatsParams};
use crate::core::statistics::{histogram_counts, RobustStats};
use crate::io::binned::{discover_region_files, read_binned_table, BinnedColumnNames, BinnedTable};
use crate::io::stats_table::{write_histogram, write_region_stats};
use crate::types::DebrisResult;
use std::path::{Path, PathBuf};

/// Region code of the combined row
pub const ALL_REGIONS: &str = "all";

const DIRECT_SUFFIX: &str = "hdts.csv";
const EXTRAP_SUFFIX: &str = "hdts_extrap.csv";

/// Area quantized to an integer sample count; undefined areas count as zero
pub fn quantize_area(area_km2: f64, area_factor: f64) -> i64 {
    let count = (area_km2 * area_factor).round();
    if count.is_finite() {
        count as i64
    } else {
        0
    }
}

/// Area-weighted debris thickness and melt factor samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplePopulation {
    pub hd: Vec<f64>,
    pub mf: Vec<f64>,
    /// Debris-covered area (km2) accumulated from the quantized counts
    pub area_km2: f64,
}

impl SamplePopulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one glacier's bins. Bins with a non-positive count or an undefined
    /// thickness contribute no samples.
    pub fn add_table(&mut self, table: &BinnedTable, area_factor: f64) {
        let counts: Vec<i64> = table
            .area_km2
            .iter()
            .map(|&area| quantize_area(area, area_factor))
            .collect();
        self.area_km2 += counts.iter().sum::<i64>() as f64 / area_factor;

        for ((&count, &hd), &mf) in counts.iter().zip(&table.hd).zip(&table.mf) {
            if count > 0 && !hd.is_nan() {
                let n = count as usize;
                self.hd.extend(std::iter::repeat(hd).take(n));
                self.mf.extend(std::iter::repeat(mf).take(n));
            }
        }
    }

    pub fn extend(&mut self, other: &SamplePopulation) {
        self.hd.extend_from_slice(&other.hd);
        self.mf.extend_from_slice(&other.mf);
        self.area_km2 += other.area_km2;
    }

    pub fn len(&self) -> usize {
        self.hd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hd.is_empty()
    }
}

/// Statistics record for one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStats {
    pub roi: String,
    pub n_samples: usize,
    pub area_km2: f64,
    pub hd: RobustStats,
    pub mf: RobustStats,
}

impl RegionStats {
    pub fn from_population(roi: &str, population: &SamplePopulation, mad_scale: f64) -> Self {
        Self {
            roi: roi.to_string(),
            n_samples: population.len(),
            area_km2: population.area_km2,
            hd: RobustStats::from_samples(&population.hd, mad_scale),
            mf: RobustStats::from_samples(&population.mf, mad_scale),
        }
    }
}

/// Histogram normalised to fraction of the regional debris-covered area
#[derive(Debug, Clone, PartialEq)]
pub struct AreaHistogram {
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub area_fraction: Vec<f64>,
}

impl AreaHistogram {
    pub fn new(values: &[f64], edges: Vec<f64>, area_km2: f64, area_factor: f64) -> Self {
        let counts = histogram_counts(values, &edges);
        let area_fraction = counts
            .iter()
            .map(|&c| c as f64 / area_factor / area_km2)
            .collect();
        Self { edges, counts, area_fraction }
    }
}

/// Thickness and melt factor histograms of one region
#[derive(Debug, Clone)]
pub struct RegionHistograms {
    pub roi: String,
    pub hd: AreaHistogram,
    pub mf: AreaHistogram,
}

/// Output of a regional statistics run
#[derive(Debug, Clone)]
pub struct RegionalSummary {
    /// One row per region in input order, then the combined row
    pub rows: Vec<RegionStats>,
    pub histograms: Vec<RegionHistograms>,
}

impl RegionalSummary {
    pub fn combined(&self) -> Option<&RegionStats> {
        self.rows.last().filter(|row| row.roi == ALL_REGIONS)
    }
}

/// Per-region rows in input order followed by the combined row over all samples
pub fn summarize_regions(populations: &[(String, SamplePopulation)], mad_scale: f64) -> Vec<RegionStats> {
    let mut all = SamplePopulation::new();
    let mut rows = Vec::with_capacity(populations.len() + 1);
    for (roi, population) in populations {
        rows.push(RegionStats::from_population(roi, population, mad_scale));
        all.extend(population);
    }
    rows.push(RegionStats::from_population(ALL_REGIONS, &all, mad_scale));
    rows
}

/// Builds regional sample populations from per-glacier binned tables
pub struct RegionalAggregator {
    params: RegionalStatsParams,
    direct_dir: PathBuf,
    extrap_dir: PathBuf,
}

impl RegionalAggregator {
    pub fn new(params: RegionalStatsParams, direct_dir: PathBuf, extrap_dir: PathBuf) -> Self {
        Self { params, direct_dir, extrap_dir }
    }

    pub fn from_config(params: &RegionalStatsParams, paths: &PathConfig) -> Self {
        Self::new(
            params.clone(),
            paths.hdts_bin_dir.clone(),
            paths.hdts_bin_extrap_dir.clone(),
        )
    }

    fn column_names(&self) -> BinnedColumnNames<'_> {
        BinnedColumnNames {
            area: &self.params.area_column,
            hd: &self.params.hd_column,
            mf: &self.params.mf_column,
        }
    }

    /// Directly computed and extrapolated glacier files of a region, sorted
    pub fn region_files(&self, roi: &str) -> DebrisResult<Vec<PathBuf>> {
        let mut files = discover_region_files(&self.direct_dir, DIRECT_SUFFIX, roi)?;
        files.extend(discover_region_files(&self.extrap_dir, EXTRAP_SUFFIX, roi)?);
        files.sort();
        Ok(files)
    }

    pub fn aggregate_files(&self, files: &[PathBuf]) -> DebrisResult<SamplePopulation> {
        let columns = self.column_names();
        let mut population = SamplePopulation::new();
        let mut skipped = 0;

        for (i, path) in files.iter().enumerate() {
            if i % 500 == 0 {
                log::debug!("  file {} of {}", i, files.len());
            }
            match read_binned_table(path, &columns)? {
                Some(table) => population.add_table(&table, self.params.area_factor),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::info!("Skipped {} tables without '{}'", skipped, self.params.hd_column);
        }
        Ok(population)
    }

    pub fn aggregate_region(&self, roi: &str) -> DebrisResult<SamplePopulation> {
        let files = self.region_files(roi)?;
        log::info!("Region {}: {} glacier tables", roi, files.len());
        self.aggregate_files(&files)
    }

    pub fn histograms(&self, roi: &str, population: &SamplePopulation) -> RegionHistograms {
        RegionHistograms {
            roi: roi.to_string(),
            hd: AreaHistogram::new(
                &population.hd,
                self.params.hd_hist_bins.edges(),
                population.area_km2,
                self.params.area_factor,
            ),
            mf: AreaHistogram::new(
                &population.mf,
                self.params.mf_hist_bins.edges(),
                population.area_km2,
                self.params.area_factor,
            ),
        }
    }

    /// Aggregate every configured region, sequentially, then all regions combined
    pub fn run(&self) -> DebrisResult<RegionalSummary> {
        let mut populations = Vec::with_capacity(self.params.rois.len());
        let mut histograms = Vec::with_capacity(self.params.rois.len());

        for roi in &self.params.rois {
            let population = self.aggregate_region(roi)?;
            let stats = RegionStats::from_population(roi, &population, self.params.mad_scale);
            log::info!(
                "{} hd: {:.2} ({:.2} - {:.2})  mf: {:.2} ({:.2} - {:.2})  area: {:.1} km2",
                roi,
                stats.hd.median,
                stats.hd.q25,
                stats.hd.q75,
                stats.mf.median,
                stats.mf.q25,
                stats.mf.q75,
                population.area_km2
            );
            if population.is_empty() {
                log::warn!("Region {} has no valid debris samples", roi);
            }

            histograms.push(self.histograms(roi, &population));
            populations.push((roi.clone(), population));
        }

        let rows = summarize_regions(&populations, self.params.mad_scale);
        Ok(RegionalSummary { rows, histograms })
    }

    /// Write the statistics table and per-region histograms under `output_dir`
    pub fn write_summary(&self, summary: &RegionalSummary, output_dir: &Path) -> DebrisResult<PathBuf> {
        let stats_path = output_dir.join(&self.params.stats_filename);
        write_region_stats(&stats_path, &summary.rows)?;

        let hist_dir = output_dir.join("histograms");
        for hist in &summary.histograms {
            write_histogram(hist_dir.join(format!("{}_hd_hist.csv", hist.roi)), &hist.hd)?;
            write_histogram(hist_dir.join(format!("{}_mf_hist.csv", hist.roi)), &hist.mf)?;
        }
        Ok(stats_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::statistics::MAD_NORMAL_SCALE;
    use approx::assert_abs_diff_eq;

    fn table(area_km2: &[f64], hd: &[f64], mf: &[f64]) -> BinnedTable {
        BinnedTable {
            area_km2: area_km2.to_vec(),
            hd: hd.to_vec(),
            mf: mf.to_vec(),
        }
    }

    #[test]
    fn test_area_quantization() {
        assert_eq!(quantize_area(0.0123, 1e4), 123);
        assert_eq!(quantize_area(0.00004, 1e4), 0);
        assert_eq!(quantize_area(0.00006, 1e4), 1);
        assert_eq!(quantize_area(f64::NAN, 1e4), 0);
    }

    #[test]
    fn test_area_weighted_sampling() {
        let mut population = SamplePopulation::new();
        population.add_table(&table(&[0.0003, 0.0001, 0.0002], &[0.5, 1.0, 0.1], &[0.6, 0.3, 1.2]), 1e4);

        assert_eq!(population.len(), 6);
        assert_eq!(population.hd.iter().filter(|&&v| v == 0.5).count(), 3);
        assert_eq!(population.hd.iter().filter(|&&v| v == 1.0).count(), 1);
        assert_eq!(population.hd.iter().filter(|&&v| v == 0.1).count(), 2);
        assert_eq!(population.mf.iter().filter(|&&v| v == 1.2).count(), 2);
        assert_abs_diff_eq!(population.area_km2, 0.0006, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_bins_contribute_nothing() {
        let mut population = SamplePopulation::new();
        population.add_table(
            &table(&[0.0, -0.001, 0.0005, 0.0002], &[0.5, 0.7, f64::NAN, 0.2], &[0.9, 0.9, 0.9, f64::NAN]),
            1e4,
        );
        // Only the last bin has a positive count and a defined thickness
        assert_eq!(population.hd, vec![0.2, 0.2]);
        assert_eq!(population.mf.len(), 2);
        assert!(population.mf.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_region_order_and_combined_row() {
        let mut small = SamplePopulation::new();
        small.add_table(&table(&[0.0002], &[0.3], &[0.5]), 1e4);
        let mut large = SamplePopulation::new();
        large.add_table(&table(&[0.01], &[0.8], &[0.4]), 1e4);

        let populations = vec![
            ("13".to_string(), small),
            ("01".to_string(), SamplePopulation::new()),
            ("02".to_string(), large),
        ];
        let rows = summarize_regions(&populations, MAD_NORMAL_SCALE);

        let order: Vec<&str> = rows.iter().map(|r| r.roi.as_str()).collect();
        assert_eq!(order, vec!["13", "01", "02", ALL_REGIONS]);
        assert!(!rows[1].hd.is_defined());
        assert_eq!(rows[3].n_samples, 102);
        assert_abs_diff_eq!(rows[3].hd.median, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_area_histogram() {
        let hist = AreaHistogram::new(&[0.02, 0.02, 0.07, 0.5], vec![0.0, 0.05, 0.1], 0.0004, 1e4);
        assert_eq!(hist.counts, vec![2, 1]);
        assert_abs_diff_eq!(hist.area_fraction[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(hist.area_fraction[1], 0.25, epsilon = 1e-12);
    }
}
