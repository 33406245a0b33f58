//! Per-glacier elevation-binned debris tables

use crate::types::{DebrisError, DebrisResult};
use regex::Regex;
use std::sync::OnceLock;
use std::path::{Path, PathBuf};

/// Column positions of the fields used for regional statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinnedColumns {
    pub area: usize,
    pub hd: usize,
    pub mf: usize,
}

/// Result of checking a table header against the expected layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinnedSchema {
    Recognized(BinnedColumns),
    /// No debris thickness column: an older, incompatible table
    Unrecognized,
}

/// Column names identifying the binned fields
#[derive(Debug, Clone)]
pub struct BinnedColumnNames<'a> {
    pub area: &'a str,
    pub hd: &'a str,
    pub mf: &'a str,
}

impl<'a> BinnedColumnNames<'a> {
    /// Classify a header row. Headers are compared after trimming whitespace.
    pub fn classify(&self, headers: &[&str]) -> DebrisResult<BinnedSchema> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let hd = match find(self.hd) {
            Some(idx) => idx,
            None => return Ok(BinnedSchema::Unrecognized),
        };
        let area = find(self.area).ok_or_else(|| {
            DebrisError::InvalidFormat(format!("missing column '{}'", self.area))
        })?;
        let mf = find(self.mf).ok_or_else(|| {
            DebrisError::InvalidFormat(format!("missing column '{}'", self.mf))
        })?;
        Ok(BinnedSchema::Recognized(BinnedColumns { area, hd, mf }))
    }
}

/// Valid debris-covered area and mean values per elevation bin
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinnedTable {
    pub area_km2: Vec<f64>,
    pub hd: Vec<f64>,
    pub mf: Vec<f64>,
}

impl BinnedTable {
    pub fn len(&self) -> usize {
        self.hd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hd.is_empty()
    }
}

/// Read a binned table, or `None` when its schema is not recognized
pub fn read_binned_table<P: AsRef<Path>>(
    path: P,
    columns: &BinnedColumnNames,
) -> DebrisResult<Option<BinnedTable>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    let header_names: Vec<&str> = headers.iter().collect();
    let cols = match columns.classify(&header_names)? {
        BinnedSchema::Recognized(cols) => cols,
        BinnedSchema::Unrecognized => {
            log::debug!(
                "Skipping {}: no '{}' column",
                path.as_ref().display(),
                columns.hd
            );
            return Ok(None);
        }
    };

    let mut table = BinnedTable::default();
    for record in reader.records() {
        let record = record?;
        table.area_km2.push(parse_value(record.get(cols.area))?);
        table.hd.push(parse_value(record.get(cols.hd))?);
        table.mf.push(parse_value(record.get(cols.mf))?);
    }
    Ok(Some(table))
}

/// Parse a numeric cell; empty cells are NaN
fn parse_value(field: Option<&str>) -> DebrisResult<f64> {
    let text = field.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Ok(f64::NAN);
    }
    text.parse::<f64>()
        .map_err(|_| DebrisError::InvalidFormat(format!("not a number: '{}'", text)))
}

/// Two-digit region code from a glacier filename such as `15.03473_hdts.csv`
pub fn region_code(filename: &str) -> Option<String> {
    static REGION_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let re = REGION_PREFIX
        .get_or_init(|| Regex::new(r"^(\d+)\.").ok())
        .as_ref()?;
    let caps = re.captures(filename)?;
    let region: u32 = caps[1].parse().ok()?;
    Some(format!("{:02}", region))
}

/// Binned table files in `dir` ending in `suffix` that belong to region `roi`.
///
/// A missing directory yields no files.
pub fn discover_region_files<P: AsRef<Path>>(
    dir: P,
    suffix: &str,
    roi: &str,
) -> DebrisResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        log::warn!("Binned table directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.ends_with(suffix) && region_code(name).as_deref() == Some(roi) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
