//! Extraction coordinates of the flat plate campaign
//!
//! Probe points are `[x, y, z]` locations and line cuts are
//! `[x1, y1, z1, x2, y2, z2]` segments, both in meters. The tables double as
//! the dataset catalog: their keys name the extract files.

use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env,
    fs::File,
    ops::Deref,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error(r#""PROBE_REPO" env var is not set"#)]
    Env(#[from] env::VarError),
    #[error("Failed to read/write the locations file")]
    Io(#[from] std::io::Error),
    #[error("Failed to read/write the locations pickle")]
    Pickle(#[from] serde_pickle::Error),
}
type Result<T> = std::result::Result<T, LocationError>;

/// Returns the data repository root from the `PROBE_REPO` environment
/// variable
pub fn repo_path() -> Result<PathBuf> {
    Ok(env::var("PROBE_REPO").map(|p| Path::new(&p).to_path_buf())?)
}

/// Probe point locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbePoints(BTreeMap<String, [f64; 3]>);
impl Deref for ProbePoints {
    type Target = BTreeMap<String, [f64; 3]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl Default for ProbePoints {
    fn default() -> Self {
        let mut points = BTreeMap::new();
        let stations = [0.09, 0.10, 0.11, 0.12, 0.13, 0.14, 0.15];
        let heights = [0.00025, 0.0005, 0.00075, 0.001, 0.002, 0.003, 0.004, 0.005];
        for ((row, x), (col, y)) in
            iproduct!(stations.iter().enumerate(), heights.iter().enumerate())
        {
            points.insert(format!("p{}{}", row, col), [*x, *y, 0.0085]);
        }
        Self(points)
    }
}
impl ProbePoints {
    pub fn to_pickle<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_pickle::from_reader(&mut file, Default::default())?)
    }
}

/// Wall-normal line cut segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineCuts(BTreeMap<String, [f64; 6]>);
impl Deref for LineCuts {
    type Target = BTreeMap<String, [f64; 6]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl Default for LineCuts {
    fn default() -> Self {
        let mut cuts = BTreeMap::new();
        for (n, x) in [0.09, 0.10, 0.11, 0.12, 0.13, 0.14, 0.15].iter().enumerate() {
            cuts.insert(format!("l{}", n), [*x, 0.0, -0.015, *x, 0.05, -0.015]);
        }
        Self(cuts)
    }
}
impl LineCuts {
    pub fn to_pickle<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_pickle::from_reader(&mut file, Default::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn campaign_tables() {
        let probes = ProbePoints::default();
        assert_eq!(probes.len(), 56);
        assert_eq!(probes["p00"], [0.09, 0.00025, 0.0085]);
        assert_eq!(probes["p67"], [0.15, 0.005, 0.0085]);
        let lines = LineCuts::default();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines["l3"], [0.12, 0.0, -0.015, 0.12, 0.05, -0.015]);
    }

    #[test]
    fn pickle_round_trip() {
        let tmp = TempDir::new("locations").unwrap();
        let path = tmp.path().join("line_points.pkl");
        let lines = LineCuts::default();
        lines.to_pickle(&path).unwrap();
        let restored = LineCuts::from_pickle(&path).unwrap();
        assert_eq!(restored.len(), lines.len());
        assert_eq!(restored["l0"], lines["l0"]);
    }
}
