//! Wall-normal line extractions
//!
//! A line extract samples every flow variable along a segment of stations
//! over time, giving one time x station matrix per variable. Temporal series
//! (one station, all times) resolve the convected scales and spatial series
//! (one snapshot, all stations) the wall-normal ones; both are ensemble
//! averaged before the boundary-layer properties are derived.

use crate::{
    filters::{Boxcar, FilterError, Legendre},
    scales::{linspace, ScalesError, Series},
    sutherland,
};
use ndarray::{Array2, Axis};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs::File, path::PathBuf, time::Instant};

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("Failed to read the line extract")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the CSV extract")]
    Csv(#[from] csv::Error),
    #[error("Invalid header filter")]
    Regex(#[from] regex::Error),
    #[error("Failed to parse a sample")]
    Parse(#[from] std::num::ParseFloatError),
    #[error("Line variable {0} is missing")]
    MissingVariable(String),
    #[error("Station {station} of variable {name} is incomplete")]
    Station { name: String, station: usize },
    #[error("Line extract is empty")]
    Empty,
    #[error("Line endpoints are degenerate along the {0} axis")]
    DegenerateAxis(LineAxis),
    #[error("Profile of {0} stations is too short")]
    ProfileTooShort(usize),
    #[error(transparent)]
    Scales(#[from] ScalesError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("Failed to read/write the pickle cache")]
    Pickle(#[from] serde_pickle::Error),
}
type Result<T> = std::result::Result<T, LineError>;

/// Spatial axis of a line extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAxis {
    X,
    Y,
    Z,
}
impl fmt::Display for LineAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineAxis::X => write!(f, "x"),
            LineAxis::Y => write!(f, "y"),
            LineAxis::Z => write!(f, "z"),
        }
    }
}

/// Line extract loader
pub struct LineLoader {
    path: PathBuf,
    id: String,
    endpoints: [f64; 6],
    time_range: (f64, f64),
    header_regex: String,
    sampling_rate: usize,
}
impl Default for LineLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            id: String::from("l0"),
            endpoints: [0f64; 6],
            time_range: (0f64, f64::INFINITY),
            header_regex: String::from(r"\w+"),
            sampling_rate: 1,
        }
    }
}
impl LineLoader {
    pub fn data_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }
    pub fn line<S: Into<String>>(self, id: S) -> Self {
        Self {
            id: id.into(),
            ..self
        }
    }
    /// The segment end points `[x1, y1, z1, x2, y2, z2]`
    pub fn endpoints(self, endpoints: [f64; 6]) -> Self {
        Self { endpoints, ..self }
    }
    pub fn start_time(self, time: f64) -> Self {
        Self {
            time_range: (time, self.time_range.1),
            ..self
        }
    }
    pub fn end_time(self, time: f64) -> Self {
        Self {
            time_range: (self.time_range.0, time),
            ..self
        }
    }
    pub fn header_filter<S: Into<String>>(self, header_regex: S) -> Self {
        Self {
            header_regex: header_regex.into(),
            ..self
        }
    }
    pub fn sampling_rate(self, rate: usize) -> Self {
        Self {
            sampling_rate: rate.max(1),
            ..self
        }
    }
    pub fn load(self) -> Result<LineData> {
        let stem = self.path.join(&self.id);
        log::info!("Loading {:?}...", stem);
        let now = Instant::now();
        let contents = crate::csv_contents(&stem)?;
        let mut rdr = csv::Reader::from_reader(contents.as_bytes());

        let headers: Vec<String> = rdr.headers()?.into_iter().map(|h| h.to_string()).collect();
        let re_station = Regex::new(r"^([A-Z][A-Z0-9-]*)\[(\d+)\]")?;
        let re_header = Regex::new(&self.header_regex)?;
        // column -> (variable, station)
        let columns: Vec<Option<(String, usize)>> = headers
            .iter()
            .skip(1)
            .map(|header| {
                if !re_header.is_match(header) {
                    return None;
                }
                re_station.captures(header).map(|capts| {
                    (
                        capts.get(1).unwrap().as_str().to_owned(),
                        capts.get(2).unwrap().as_str().parse::<usize>().unwrap(),
                    )
                })
            })
            .collect();

        let mut time = vec![];
        // variable -> station -> time series
        let mut store: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
        let mut kept = 0usize;
        for result in rdr.records() {
            let record = result?;
            let t = record
                .iter()
                .next()
                .ok_or(LineError::Empty)?
                .parse::<f64>()?;
            if t < self.time_range.0 || t > self.time_range.1 {
                continue;
            }
            kept += 1;
            if (kept - 1) % self.sampling_rate != 0 {
                continue;
            }
            time.push(t);
            for (data, column) in record.iter().skip(1).zip(columns.iter()) {
                if let Some((name, station)) = column {
                    let stations = store.entry(name.clone()).or_insert_with(Vec::new);
                    if stations.len() <= *station {
                        stations.resize(*station + 1, vec![]);
                    }
                    stations[*station].push(data.parse::<f64>()?);
                }
            }
        }
        if time.is_empty() {
            return Err(LineError::Empty);
        }
        let n_times = time.len();
        let mut variables = BTreeMap::new();
        for (name, stations) in store {
            if let Some(station) = stations.iter().position(|s| s.len() != n_times) {
                return Err(LineError::Station { name, station });
            }
            let n_stations = stations.len();
            let matrix =
                Array2::from_shape_fn((n_times, n_stations), |(i, j)| stations[j][i]);
            variables.insert(name, matrix);
        }
        log::info!("... loaded in {}ms", now.elapsed().as_millis());
        Ok(LineData {
            time,
            endpoints: self.endpoints,
            variables,
        })
    }
}

/// Line extract: one time x station matrix per variable
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LineData {
    pub time: Vec<f64>,
    pub endpoints: [f64; 6],
    pub variables: BTreeMap<String, Array2<f64>>,
}
impl LineData {
    pub fn loader() -> LineLoader {
        LineLoader::default()
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn stations(&self) -> usize {
        self.variables
            .values()
            .next()
            .map(|matrix| matrix.ncols())
            .unwrap_or(0)
    }
    pub fn var(&self, name: &str) -> Result<&Array2<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| LineError::MissingVariable(name.to_string()))
    }
    /// Adds the derived variables: Sutherland viscosity `MU`, kinematic
    /// viscosity `NU` and pressure-dilatation `P-DIL`
    pub fn derive_variables(&mut self) -> &mut Self {
        if let Ok(temperature) = self.var("T") {
            let mu = temperature.mapv(sutherland);
            self.variables.insert("MU".to_string(), mu);
        }
        if let (Ok(mu), Ok(rho)) = (self.var("MU"), self.var("RHO")) {
            self.variables.insert("NU".to_string(), mu / rho);
        }
        if let (Ok(p), Ok(dil)) = (self.var("P"), self.var("DIL")) {
            self.variables.insert("P-DIL".to_string(), p * dil);
        }
        self
    }
    /// Spatial abscissa along the given axis from the segment end points,
    /// shifted to start at zero
    pub fn station_radius(&self, axis: LineAxis) -> Result<Vec<f64>> {
        let (start, end) = match axis {
            LineAxis::X => (self.endpoints[0], self.endpoints[3]),
            LineAxis::Y => (self.endpoints[1], self.endpoints[4]),
            LineAxis::Z => (self.endpoints[2], self.endpoints[5]),
        };
        if (end - start).abs() < f64::EPSILON {
            return Err(LineError::DegenerateAxis(axis));
        }
        let radius = linspace(start, end, self.stations());
        let r_min = radius.iter().cloned().fold(f64::INFINITY, f64::min);
        Ok(radius.iter().map(|r| r - r_min).collect())
    }
    /// One series per sampled station (every `n_points`-th), along the
    /// frozen-flow abscissa of that station
    pub fn temporal_series(
        &self,
        name: &str,
        n_points: usize,
        n_lags: usize,
    ) -> Result<BTreeMap<usize, Series>> {
        let matrix = self.var(name)?;
        let velocity = self.var("U-X")?;
        let n_points = n_points.max(1);
        let mut series = BTreeMap::new();
        for station in (0..self.stations()).step_by(n_points) {
            let u = velocity.index_axis(Axis(1), station);
            let u_mean = u.sum() / u.len() as f64;
            let radius: Vec<f64> = self.time.iter().map(|t| t * u_mean).collect();
            let r_min = radius.iter().cloned().fold(f64::INFINITY, f64::min);
            let radius: Vec<f64> = radius.iter().map(|r| r - r_min).collect();
            let variable = matrix.index_axis(Axis(1), station).to_vec();
            series.insert(station, Series::process(&radius, &variable, n_lags)?);
        }
        Ok(series)
    }
    /// One series per sampled time snapshot (every `n_points`-th), over the
    /// station abscissa
    pub fn spatial_series(
        &self,
        name: &str,
        n_points: usize,
        axis: LineAxis,
        n_lags: usize,
    ) -> Result<BTreeMap<usize, Series>> {
        let matrix = self.var(name)?;
        let radius = self.station_radius(axis)?;
        let n_points = n_points.max(1);
        let mut series = BTreeMap::new();
        for snapshot in (0..self.len()).step_by(n_points) {
            let variable = matrix.index_axis(Axis(0), snapshot).to_vec();
            series.insert(snapshot, Series::process(&radius, &variable, n_lags)?);
        }
        Ok(series)
    }
    /// Element-wise average of a set of series, the "crunched" data
    pub fn ensemble(series: &BTreeMap<usize, Series>) -> Result<Series> {
        Ok(Series::ensemble(series.values())?)
    }
    /// Boxcar and Legendre filters applied to every member, then averaged
    pub fn ensemble_filters(
        series: &BTreeMap<usize, Series>,
        window: usize,
    ) -> Result<(Boxcar, Legendre)> {
        let mut boxcars = vec![];
        let mut legendres = vec![];
        for member in series.values() {
            let boxcar = Boxcar::new(&member.radius, &member.variable, window)?;
            legendres.push(Legendre::fit(&boxcar, None)?);
            boxcars.push(boxcar);
        }
        let average = |fields: Vec<&Vec<f64>>| -> Vec<f64> {
            let n = fields.len() as f64;
            let mut out = vec![0f64; fields[0].len()];
            for field in fields {
                out.iter_mut().zip(field.iter()).for_each(|(o, x)| *o += x);
            }
            out.iter_mut().for_each(|o| *o /= n);
            out
        };
        let boxcar = Boxcar {
            radius: average(boxcars.iter().map(|b| &b.radius).collect()),
            variable: average(boxcars.iter().map(|b| &b.variable).collect()),
            fluctuation: average(boxcars.iter().map(|b| &b.fluctuation).collect()),
            window,
        };
        let legendre = Legendre {
            radius: average(legendres.iter().map(|l| &l.radius).collect()),
            variable: average(legendres.iter().map(|l| &l.variable).collect()),
            degree: legendres[0].degree,
        };
        Ok((boxcar, legendre))
    }
    /// Caches the line to a pickle file
    pub fn to_pickle<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
    /// Restores a line from its pickle cache
    pub fn from_pickle<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_pickle::from_reader(&mut file, Default::default())?)
    }
}

/// Boundary-layer properties of an ensemble-averaged wall-normal profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryLayer {
    /// 99% thickness [m]
    pub thickness: f64,
    /// Profile value at the edge
    pub edge_value: f64,
    /// Wall shear stress [Pa]
    pub wall_shear: f64,
    /// In-layer abscissa
    pub radius: Vec<f64>,
    /// In-layer profile
    pub variable: Vec<f64>,
}

/// Boundary-layer thickness at 99% of the freestream value
///
/// The wall shear comes from a one-sided velocity gradient and the
/// viscosity at the wall station.
pub fn boundary_layer(
    radius: &[f64],
    profile: &[f64],
    viscosity: &[f64],
    freestream: f64,
) -> Result<BoundaryLayer> {
    if profile.len() < 2 || radius.len() != profile.len() || viscosity.is_empty() {
        return Err(LineError::ProfileTooShort(profile.len()));
    }
    let cut = 0.99 * freestream;
    let edge = profile
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - cut).abs().partial_cmp(&(*b - cut).abs()).unwrap()
        })
        .map(|(i, _)| i)
        .unwrap();
    let wall_shear = viscosity[0] * (profile[1] - profile[0]) / (radius[1] - radius[0]);
    Ok(BoundaryLayer {
        thickness: radius[edge],
        edge_value: profile[edge],
        wall_shear,
        radius: radius[..=edge].to_vec(),
        variable: profile[..=edge].to_vec(),
    })
}

/// Wall units `(y+, u+)` of an in-layer velocity profile
pub fn wall_units(bl: &BoundaryLayer, rho: &[f64], mu: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let tau = bl.wall_shear.abs();
    let y_plus = bl
        .radius
        .iter()
        .zip(rho.iter().zip(mu.iter()))
        .map(|(y, (rho, mu))| y * (rho * tau).sqrt() / mu)
        .collect();
    let u_plus = bl
        .variable
        .iter()
        .zip(rho.iter())
        .map(|(u, rho)| u * (rho / tau).sqrt())
        .collect();
    (y_plus, u_plus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use tempdir::TempDir;

    const N_STATIONS: usize = 12;
    const N_TIMES: usize = 64;

    fn sample_line(dir: &std::path::Path) {
        let mut file = File::create(dir.join("l0.csv")).unwrap();
        let mut headers = vec!["Time [s]".to_string()];
        for name in ["U-X", "T"] {
            for station in 0..N_STATIONS {
                headers.push(format!("{}[{}]", name, station));
            }
        }
        writeln!(file, "{}", headers.join(",")).unwrap();
        for i in 0..N_TIMES {
            let mut row = vec![format!("{}", i as f64 * 1e-3)];
            for station in 0..N_STATIONS {
                let wiggle = ((i + station) % 5) as f64;
                row.push(format!("{}", 200. * station as f64 + wiggle));
            }
            for station in 0..N_STATIONS {
                row.push(format!("{}", 1200. - station as f64));
            }
            writeln!(file, "{}", row.join(",")).unwrap();
        }
    }

    fn sample(dir: &std::path::Path) -> LineData {
        sample_line(dir);
        LineData::loader()
            .data_path(dir)
            .line("l0")
            .endpoints([0.1, 0.0, -0.015, 0.1, 0.05, -0.015])
            .load()
            .unwrap()
    }

    #[test]
    fn load_line() {
        let tmp = TempDir::new("line").unwrap();
        let line = sample(tmp.path());
        assert_eq!(line.len(), N_TIMES);
        assert_eq!(line.stations(), N_STATIONS);
        assert_abs_diff_eq!(line.var("T").unwrap()[[0, 3]], 1197f64, epsilon = 1e-12);
    }

    #[test]
    fn station_radius_starts_at_zero() {
        let tmp = TempDir::new("line").unwrap();
        let line = sample(tmp.path());
        let radius = line.station_radius(LineAxis::Y).unwrap();
        assert_eq!(radius.len(), N_STATIONS);
        assert_abs_diff_eq!(radius[0], 0f64, epsilon = 1e-12);
        assert_abs_diff_eq!(radius[N_STATIONS - 1], 0.05, epsilon = 1e-12);
        assert!(matches!(
            line.station_radius(LineAxis::X),
            Err(LineError::DegenerateAxis(LineAxis::X))
        ));
    }

    #[test]
    fn temporal_and_spatial_series() {
        let tmp = TempDir::new("line").unwrap();
        let line = sample(tmp.path());
        let temporal = line.temporal_series("U-X", 3, 20).unwrap();
        assert_eq!(temporal.len(), 4);
        assert!(temporal.values().all(|s| s.radius.len() == N_TIMES));
        let spatial = line
            .spatial_series("U-X", 16, LineAxis::Y, 8)
            .unwrap();
        assert_eq!(spatial.len(), 4);
        assert!(spatial.values().all(|s| s.radius.len() == N_STATIONS));
    }

    #[test]
    fn ensemble_matches_members_shape() {
        let tmp = TempDir::new("line").unwrap();
        let line = sample(tmp.path());
        let spatial = line.spatial_series("U-X", 8, LineAxis::Y, 8).unwrap();
        let ensemble = LineData::ensemble(&spatial).unwrap();
        assert_eq!(ensemble.variable.len(), N_STATIONS);
        let (boxcar, legendre) = LineData::ensemble_filters(&spatial, 2).unwrap();
        assert_eq!(boxcar.len(), N_STATIONS / 2);
        assert_eq!(legendre.variable.len(), N_STATIONS / 2);
    }

    #[test]
    fn boundary_layer_thickness() {
        let radius: Vec<f64> = (0..N_STATIONS).map(|i| i as f64 * 1e-3).collect();
        let profile = vec![
            0., 500., 1000., 1500., 2000., 2400., 2475., 2490., 2495., 2499., 2500., 2500.,
        ];
        let viscosity = vec![1.8e-5; N_STATIONS];
        let bl = boundary_layer(&radius, &profile, &viscosity, 2500.).unwrap();
        assert_abs_diff_eq!(bl.thickness, 6e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(bl.edge_value, 2475., epsilon = 1e-12);
        assert_abs_diff_eq!(bl.wall_shear, 1.8e-5 * 500. / 1e-3, epsilon = 1e-9);
        assert_eq!(bl.variable.len(), 7);
    }

    #[test]
    fn wall_units_are_positive() {
        let radius: Vec<f64> = (0..8).map(|i| i as f64 * 1e-3).collect();
        let profile: Vec<f64> = (0..8).map(|i| 300. * i as f64).collect();
        let viscosity = vec![1.8e-5; 8];
        let bl = boundary_layer(&radius, &profile, &viscosity, 2500.).unwrap();
        let rho = vec![0.05; bl.variable.len()];
        let mu = vec![1.8e-5; bl.variable.len()];
        let (y_plus, u_plus) = wall_units(&bl, &rho, &mu);
        assert_eq!(y_plus.len(), u_plus.len());
        assert!(y_plus.iter().skip(1).all(|&y| y > 0f64));
        assert!(u_plus.iter().skip(1).all(|&u| u > 0f64));
    }
}
