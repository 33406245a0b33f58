use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Simulation variable cube (debris thickness x time x elevation band)
pub type DebrisCube = Array3<f64>;

/// Offset from Celsius to Kelvin
pub const KELVIN_OFFSET: f64 = 273.15;

/// Grid cell at which the energy-balance model was run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Latitude in degrees north
    pub lat: f64,
    /// Longitude in degrees east, normalised to [0, 360)
    pub lon: f64,
}

impl GridCell {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon: lon.rem_euclid(360.0),
        }
    }

    /// Encoded lat/lon string used in simulation and product filenames,
    /// e.g. `2810N-8670E-` for (28.1, 86.7)
    pub fn latlon_str(&self) -> String {
        let hemisphere = if self.lat < 0.0 { "S-" } else { "N-" };
        format!(
            "{}{}{}E-",
            (self.lat * 100.0).abs() as i64,
            hemisphere,
            (self.lon * 100.0) as i64
        )
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Satellite surface-temperature acquisition for one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionEvent {
    pub year: i32,
    /// 1-based day of year
    pub doy: u32,
    /// Fractional hour of day (e.g. 6.5 is 06:30)
    pub hour: f64,
}

impl AcquisitionEvent {
    /// Build an event from the gridded acquisition statistics.
    ///
    /// Year and day of year are rounded to the nearest integer. Returns `None`
    /// when either is not strictly positive or any value is undefined, which
    /// marks cells without usable satellite coverage.
    pub fn from_grid_values(year_mean: f64, doy_med: f64, hour_mean: f64) -> Option<Self> {
        if !year_mean.is_finite() || !doy_med.is_finite() || !hour_mean.is_finite() {
            return None;
        }
        let year = year_mean.round();
        let doy = doy_med.round();
        if year <= 0.0 || doy <= 0.0 {
            return None;
        }
        Some(Self {
            year: year as i32,
            doy: doy as u32,
            hour: hour_mean,
        })
    }

    /// Calendar date of the acquisition
    pub fn date(&self) -> DebrisResult<NaiveDate> {
        NaiveDate::from_yo_opt(self.year, self.doy).ok_or(DebrisError::InvalidAcquisition {
            year: self.year,
            doy: self.doy,
        })
    }

    /// Acquisition timestamp truncated to the whole hour
    pub fn hour_timestamp(&self) -> DebrisResult<NaiveDateTime> {
        let midnight = self
            .date()?
            .and_hms_opt(0, 0, 0)
            .ok_or(DebrisError::InvalidAcquisition {
                year: self.year,
                doy: self.doy,
            })?;
        Ok(midnight + Duration::hours(self.hour.trunc() as i64))
    }

    /// Fraction of the hour elapsed at acquisition, in [0, 1)
    pub fn hour_fraction(&self) -> f64 {
        self.hour.rem_euclid(1.0)
    }

    /// Whole minutes past the hour at acquisition
    pub fn minute_offset(&self) -> i64 {
        (self.hour_fraction() * 60.0).floor() as i64
    }
}

/// Error types for debris processing
#[derive(Debug, thiserror::Error)]
pub enum DebrisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid acquisition date: year {year}, day of year {doy}")]
    InvalidAcquisition { year: i32, doy: u32 },

    #[error("Acquisition time {0} not found in simulation time axis")]
    TimestampNotFound(NaiveDateTime),

    #[error("Co-registration window around index {match_idx} exceeds time axis of length {len}")]
    WindowOutOfRange { match_idx: usize, len: usize },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for debris operations
pub type DebrisResult<T> = Result<T, DebrisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlon_str_encoding() {
        assert_eq!(GridCell::new(28.1, 86.7).latlon_str(), "2810N-8670E-");
        assert_eq!(GridCell::new(-45.25, 170.5).latlon_str(), "4525S-17050E-");
    }

    #[test]
    fn test_longitude_normalisation() {
        let cell = GridCell::new(61.0, -147.5);
        assert_eq!(cell.lon, 212.5);
        assert_eq!(GridCell::new(61.0, 360.0).lon, 0.0);
    }

    #[test]
    fn test_undefined_acquisition() {
        assert!(AcquisitionEvent::from_grid_values(0.0, 273.0, 6.5).is_none());
        assert!(AcquisitionEvent::from_grid_values(2015.0, -1.0, 6.5).is_none());
        assert!(AcquisitionEvent::from_grid_values(f64::NAN, 273.0, 6.5).is_none());
        assert!(AcquisitionEvent::from_grid_values(2015.2, 272.6, 6.5).is_some());
    }

    #[test]
    fn test_acquisition_timestamp() {
        let event = AcquisitionEvent::from_grid_values(2015.0, 273.0, 6.75).unwrap();
        let expected = NaiveDate::from_ymd_opt(2015, 9, 30)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(event.hour_timestamp().unwrap(), expected);
        assert_eq!(event.minute_offset(), 45);
        assert!((event.hour_fraction() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_day_of_year() {
        let event = AcquisitionEvent { year: 2015, doy: 366, hour: 1.0 };
        assert!(matches!(
            event.hour_timestamp(),
            Err(DebrisError::InvalidAcquisition { year: 2015, doy: 366 })
        ));
    }
}
