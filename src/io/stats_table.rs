use crate::core::regional::{AreaHistogram, RegionStats};
use crate::types::DebrisResult;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct RegionStatsRow<'a> {
    roi: &'a str,
    hd_mean: f64,
    hd_std: f64,
    hd_med: f64,
    hd_mad: f64,
    hd_25: f64,
    hd_75: f64,
    mf_mean: f64,
    mf_std: f64,
    mf_med: f64,
    mf_mad: f64,
    mf_25: f64,
    mf_75: f64,
}

impl<'a> From<&'a RegionStats> for RegionStatsRow<'a> {
    fn from(stats: &'a RegionStats) -> Self {
        Self {
            roi: &stats.roi,
            hd_mean: stats.hd.mean,
            hd_std: stats.hd.std,
            hd_med: stats.hd.median,
            hd_mad: stats.hd.mad,
            hd_25: stats.hd.q25,
            hd_75: stats.hd.q75,
            mf_mean: stats.mf.mean,
            mf_std: stats.mf.std,
            mf_med: stats.mf.median,
            mf_mad: stats.mf.mad,
            mf_25: stats.mf.q25,
            mf_75: stats.mf.q75,
        }
    }
}

/// Write one row per region, in the given order
pub fn write_region_stats<P: AsRef<Path>>(path: P, rows: &[RegionStats]) -> DebrisResult<()> {
    log::info!("Writing regional statistics: {}", path.as_ref().display());
    create_parent(path.as_ref())?;

    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for stats in rows {
        writer.serialize(RegionStatsRow::from(stats))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HistogramRow {
    bin_start: f64,
    bin_end: f64,
    count: u64,
    area_fraction: f64,
}

/// Write a histogram as one row per bin
pub fn write_histogram<P: AsRef<Path>>(path: P, histogram: &AreaHistogram) -> DebrisResult<()> {
    create_parent(path.as_ref())?;

    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for (i, (&count, &fraction)) in histogram
        .counts
        .iter()
        .zip(&histogram.area_fraction)
        .enumerate()
    {
        writer.serialize(HistogramRow {
            bin_start: histogram.edges[i],
            bin_end: histogram.edges[i + 1],
            count,
            area_fraction: fraction,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> DebrisResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
