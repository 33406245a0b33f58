use crate::types::{DebrisCube, DebrisError, DebrisResult};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Energy-balance model output for one grid cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationCube {
    pub latitude: f64,
    pub longitude: f64,
    /// Debris thickness coordinate (cm)
    pub hd_cm: Vec<f64>,
    /// Hourly simulation time axis
    pub time: Vec<NaiveDateTime>,
    /// Elevation band coordinate (m a.s.l.)
    pub elev: Vec<f64>,
    /// Surface temperature (K)
    pub ts: DebrisCube,
    /// Snow depth (m)
    pub snow_depth: DebrisCube,
    /// Cell-level metadata such as the region of interest
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl SimulationCube {
    /// Check variable shapes against the coordinates and that the time axis
    /// is strictly hourly without gaps
    pub fn validate(&self) -> DebrisResult<()> {
        let expected = (self.hd_cm.len(), self.time.len(), self.elev.len());
        for (name, var) in [("ts", &self.ts), ("snow_depth", &self.snow_depth)] {
            if var.dim() != expected {
                return Err(DebrisError::ShapeMismatch(format!(
                    "{} has shape {:?}, coordinates give {:?}",
                    name,
                    var.dim(),
                    expected
                )));
            }
        }

        let hour = Duration::hours(1);
        if let Some(i) = self.time.windows(2).position(|w| w[1] - w[0] != hour) {
            return Err(DebrisError::InvalidFormat(format!(
                "time axis is not hourly between {} and {}",
                self.time[i],
                self.time[i + 1]
            )));
        }
        Ok(())
    }

    pub fn roi(&self) -> Option<&str> {
        self.attrs.get("roi").map(String::as_str)
    }
}

/// Interpolated surface-temperature curve around the satellite acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsCurveProduct {
    pub latitude: f64,
    pub longitude: f64,
    /// Debris thickness coordinate (cm)
    pub hd_cm: Vec<f64>,
    /// Interpolated acquisition times, one per day of the window
    pub time: Vec<NaiveDateTime>,
    /// Elevation band coordinate (m a.s.l.)
    pub elev: Vec<f64>,
    /// Surface temperature (K), debris thickness x time x elevation
    pub ts: DebrisCube,
    /// Snow depth (m), debris thickness x time x elevation
    pub dsnow: DebrisCube,
    pub attrs: BTreeMap<String, String>,
}

/// Reader for raw simulation cubes
pub struct CubeReader;

impl CubeReader {
    pub fn read_cube<P: AsRef<Path>>(path: P) -> DebrisResult<SimulationCube> {
        log::debug!("Reading simulation cube: {}", path.as_ref().display());
        let reader = BufReader::new(File::open(path.as_ref())?);
        let cube: SimulationCube = serde_json::from_reader(reader)?;
        cube.validate()?;

        log::debug!(
            "Cube dimensions: {} thicknesses x {} hours x {} elevations",
            cube.hd_cm.len(),
            cube.time.len(),
            cube.elev.len()
        );
        Ok(cube)
    }

    pub fn write_cube<P: AsRef<Path>>(cube: &SimulationCube, path: P) -> DebrisResult<()> {
        write_json(cube, path.as_ref())
    }
}

/// Persistence of interpolated surface-temperature products
pub struct ProductStore;

impl ProductStore {
    /// Write a product, creating the destination directory if needed
    pub fn write_product<P: AsRef<Path>>(product: &TsCurveProduct, path: P) -> DebrisResult<()> {
        log::debug!("Writing surface temperature curve: {}", path.as_ref().display());
        write_json(product, path.as_ref())
    }

    pub fn read_product<P: AsRef<Path>>(path: P) -> DebrisResult<TsCurveProduct> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Write JSON to a temporary file beside `path`, then rename it into place.
///
/// `path` only ever holds a complete document; an interrupted or failed
/// write leaves nothing at `path`.
fn write_json<T: Serialize>(value: &T, path: &Path) -> DebrisResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array3;

    fn small_cube(n_time: usize) -> SimulationCube {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SimulationCube {
            latitude: 28.1,
            longitude: 86.7,
            hd_cm: vec![2.0, 10.0],
            time: (0..n_time).map(|i| start + Duration::hours(i as i64)).collect(),
            elev: vec![5000.0],
            ts: Array3::from_elem((2, n_time, 1), 270.0),
            snow_depth: Array3::zeros((2, n_time, 1)),
            attrs: BTreeMap::from([("roi".to_string(), "HMA".to_string())]),
        }
    }

    #[test]
    fn test_cube_round_trip_with_directory_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cube.json");
        let cube = small_cube(48);

        CubeReader::write_cube(&cube, &path).unwrap();
        let restored = CubeReader::read_cube(&path).unwrap();
        assert_eq!(restored.time, cube.time);
        assert_eq!(restored.roi(), Some("HMA"));
    }

    /// Serializes its first element, then fails
    struct FailsAfterFirst;

    impl Serialize for FailsAfterFirst {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::{Error, SerializeSeq};
            let mut seq = serializer.serialize_seq(Some(2))?;
            seq.serialize_element(&1.0)?;
            Err(S::Error::custom("interrupted"))
        }
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products").join("2810N-8670E-_debris_ts_curve.json");

        assert!(write_json(&FailsAfterFirst, &path).is_err());
        assert!(!path.exists());
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.json");
        fs::write(&path, "{\"latitude\": 28.0, \"longi").unwrap();

        let cube = small_cube(24);
        CubeReader::write_cube(&cube, &path).unwrap();
        assert_eq!(CubeReader::read_cube(&path).unwrap().time, cube.time);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_shape_mismatch_detected() {
        let mut cube = small_cube(10);
        cube.ts = Array3::zeros((2, 9, 1));
        assert!(matches!(cube.validate(), Err(DebrisError::ShapeMismatch(_))));
    }

    #[test]
    fn test_gap_in_time_axis_detected() {
        let mut cube = small_cube(10);
        cube.time[5] = cube.time[5] + Duration::minutes(30);
        assert!(matches!(cube.validate(), Err(DebrisError::InvalidFormat(_))));
    }
}
