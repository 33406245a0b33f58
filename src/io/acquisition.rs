use crate::types::{AcquisitionEvent, DebrisError, DebrisResult, GridCell};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Gridded satellite acquisition statistics for a region.
///
/// Values are indexed by (latitude index, longitude index); missing values
/// mark grid cells without satellite coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionGrid {
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    /// Mean acquisition year
    pub year_mean: Array2<Option<f64>>,
    /// Median acquisition day of year
    pub doy_med: Array2<Option<f64>>,
    /// Mean acquisition hour of day (fractional)
    pub dayfrac_mean: Array2<Option<f64>>,
}

impl AcquisitionGrid {
    pub fn open<P: AsRef<Path>>(path: P) -> DebrisResult<Self> {
        log::info!("Reading acquisition grid: {}", path.as_ref().display());
        let reader = BufReader::new(File::open(path.as_ref())?);
        let grid: Self = serde_json::from_reader(reader)?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> DebrisResult<()> {
        let expected = (self.latitude.len(), self.longitude.len());
        if expected.0 == 0 || expected.1 == 0 {
            return Err(DebrisError::InvalidFormat(
                "acquisition grid has empty coordinates".to_string(),
            ));
        }
        for (name, var) in [
            ("year_mean", &self.year_mean),
            ("doy_med", &self.doy_med),
            ("dayfrac_mean", &self.dayfrac_mean),
        ] {
            if var.dim() != expected {
                return Err(DebrisError::ShapeMismatch(format!(
                    "{} has shape {:?}, coordinates give {:?}",
                    name,
                    var.dim(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Nearest (latitude, longitude) indices for a cell
    pub fn nearest_index(&self, cell: &GridCell) -> (usize, usize) {
        (nearest(&self.latitude, cell.lat), nearest(&self.longitude, cell.lon))
    }

    /// Acquisition event nearest to a cell, or `None` when undefined there
    pub fn event_for(&self, cell: &GridCell) -> Option<AcquisitionEvent> {
        let idx = self.nearest_index(cell);
        AcquisitionEvent::from_grid_values(
            self.year_mean[idx]?,
            self.doy_med[idx]?,
            self.dayfrac_mean[idx]?,
        )
    }
}

/// Index of the coordinate closest to `value`; the first wins ties
fn nearest(coords: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &c) in coords.iter().enumerate() {
        let dist = (value - c).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> AcquisitionGrid {
        let latitude = vec![28.0, 28.25, 28.5];
        let longitude = vec![86.0, 86.25];
        let shape = (3, 2);
        let mut year_mean = Array2::from_elem(shape, Some(2015.3));
        let doy_med = Array2::from_elem(shape, Some(272.6));
        let dayfrac_mean = Array2::from_elem(shape, Some(6.5));
        year_mean[[2, 1]] = None;
        year_mean[[0, 1]] = Some(0.0);
        AcquisitionGrid { latitude, longitude, year_mean, doy_med, dayfrac_mean }
    }

    #[test]
    fn test_nearest_index() {
        let grid = grid();
        assert_eq!(grid.nearest_index(&GridCell::new(28.3, 86.1)), (1, 0));
        assert_eq!(grid.nearest_index(&GridCell::new(40.0, 90.0)), (2, 1));
        // Midway between two coordinates resolves to the first
        assert_eq!(grid.nearest_index(&GridCell::new(28.125, 86.0)).0, 0);
    }

    #[test]
    fn test_event_lookup() {
        let grid = grid();
        let event = grid.event_for(&GridCell::new(28.25, 86.0)).unwrap();
        assert_eq!(event.year, 2015);
        assert_eq!(event.doy, 273);
        assert_eq!(event.hour, 6.5);

        // Missing value and zero sentinel are both undefined
        assert!(grid.event_for(&GridCell::new(28.5, 86.25)).is_none());
        assert!(grid.event_for(&GridCell::new(28.0, 86.25)).is_none());
    }

    #[test]
    fn test_json_nulls_are_missing() {
        let json = r#"{
            "latitude": [28.0], "longitude": [86.0],
            "year_mean": {"v": 1, "dim": [1, 1], "data": [null]},
            "doy_med": {"v": 1, "dim": [1, 1], "data": [273.0]},
            "dayfrac_mean": {"v": 1, "dim": [1, 1], "data": [6.5]}
        }"#;
        let grid: AcquisitionGrid = serde_json::from_str(json).unwrap();
        grid.validate().unwrap();
        assert!(grid.event_for(&GridCell::new(28.0, 86.0)).is_none());
    }
}
