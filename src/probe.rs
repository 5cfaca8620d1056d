//! Point probe time series
//!
//! A probe records every flow variable at a fixed location over time. The
//! extract is a CSV file (plain or gzipped), one row per time sample, the
//! first column being the time and the remaining headers `NAME [unit]`.

use crate::{
    scales::{ScalesError, Series},
    sutherland,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, path::PathBuf, time::Instant};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to read the probe extract")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the CSV extract")]
    Csv(#[from] csv::Error),
    #[error("Invalid header filter")]
    Regex(#[from] regex::Error),
    #[error("Failed to parse a sample")]
    Parse(#[from] std::num::ParseFloatError),
    #[error("Probe variable {0} is missing")]
    MissingVariable(String),
    #[error("Probe extract is empty")]
    Empty,
    #[error(transparent)]
    Scales(#[from] ScalesError),
    #[error("Failed to read/write the pickle cache")]
    Pickle(#[from] serde_pickle::Error),
}
type Result<T> = std::result::Result<T, ProbeError>;

/// Point probe extract loader
pub struct ProbeLoader {
    path: PathBuf,
    id: String,
    time_range: (f64, f64),
    header_regex: String,
    sampling_rate: usize,
    location: Option<[f64; 3]>,
}
impl Default for ProbeLoader {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            id: String::from("p00"),
            time_range: (0f64, f64::INFINITY),
            header_regex: String::from(r"\w+"),
            sampling_rate: 1,
            location: None,
        }
    }
}
impl ProbeLoader {
    pub fn data_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }
    pub fn probe<S: Into<String>>(self, id: S) -> Self {
        Self {
            id: id.into(),
            ..self
        }
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
    /// Keeps every n-th time sample
    pub fn sampling_rate(self, rate: usize) -> Self {
        Self {
            sampling_rate: rate.max(1),
            ..self
        }
    }
    pub fn location(self, location: [f64; 3]) -> Self {
        Self {
            location: Some(location),
            ..self
        }
    }
    pub fn load(self) -> Result<ProbeData> {
        let stem = self.path.join(&self.id);
        log::info!("Loading {:?}...", stem);
        let now = Instant::now();
        let contents = crate::csv_contents(&stem)?;
        let mut rdr = csv::Reader::from_reader(contents.as_bytes());

        let headers: Vec<String> = rdr.headers()?.into_iter().map(|h| h.to_string()).collect();
        let re_name = Regex::new(r"^([A-Z][A-Z0-9-]*)")?;
        let re_header = Regex::new(&self.header_regex)?;

        let mut probe = ProbeData {
            location: self.location,
            ..Default::default()
        };
        let mut kept = 0usize;
        for result in rdr.records() {
            let record = result?;
            let time = record
                .iter()
                .next()
                .ok_or(ProbeError::Empty)?
                .parse::<f64>()?;
            if time < self.time_range.0 || time > self.time_range.1 {
                continue;
            }
            kept += 1;
            if (kept - 1) % self.sampling_rate != 0 {
                continue;
            }
            probe.time.push(time);
            for (data, header) in record
                .iter()
                .skip(1)
                .zip(headers.iter().skip(1))
                .filter(|(_, h)| re_header.is_match(h))
            {
                if let Some(capts) = re_name.captures(header) {
                    let key = capts.get(1).unwrap().as_str().to_owned();
                    probe
                        .variables
                        .entry(key)
                        .or_insert_with(Vec::new)
                        .push(data.parse::<f64>()?);
                }
            }
        }
        if probe.time.is_empty() {
            return Err(ProbeError::Empty);
        }
        log::info!("... loaded in {}ms", now.elapsed().as_millis());
        Ok(probe)
    }
}

/// Point probe time series
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProbeData {
    pub time: Vec<f64>,
    pub location: Option<[f64; 3]>,
    pub variables: BTreeMap<String, Vec<f64>>,
}
impl ProbeData {
    pub fn loader() -> ProbeLoader {
        ProbeLoader::default()
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn var(&self, name: &str) -> Result<&Vec<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| ProbeError::MissingVariable(name.to_string()))
    }
    /// Adds the derived variables: Sutherland viscosity `MU`, kinematic
    /// viscosity `NU` and pressure-dilatation `P-DIL`
    pub fn derive_variables(&mut self) -> &mut Self {
        if let Ok(temperature) = self.var("T") {
            let mu = temperature.iter().map(|&t| sutherland(t)).collect();
            self.variables.insert("MU".to_string(), mu);
        }
        if let (Ok(mu), Ok(rho)) = (self.var("MU"), self.var("RHO")) {
            let nu = mu.iter().zip(rho.iter()).map(|(mu, rho)| mu / rho).collect();
            self.variables.insert("NU".to_string(), nu);
        }
        if let (Ok(p), Ok(dil)) = (self.var("P"), self.var("DIL")) {
            let p_dil = p.iter().zip(dil.iter()).map(|(p, dil)| p * dil).collect();
            self.variables.insert("P-DIL".to_string(), p_dil);
        }
        self
    }
    /// Frozen-flow streamwise abscissa: the elapsed time convected at the
    /// mean streamwise velocity, shifted to start at zero
    pub fn radius(&self) -> Result<Vec<f64>> {
        let u = self.var("U-X")?;
        let u_mean = u.iter().sum::<f64>() / u.len() as f64;
        let radius: Vec<f64> = self.time.iter().map(|t| t * u_mean).collect();
        let r_min = radius.iter().cloned().fold(f64::INFINITY, f64::min);
        Ok(radius.iter().map(|r| r - r_min).collect())
    }
    /// Processes a variable into its fluctuation, correlation and spectrum
    pub fn series(&self, name: &str, n_lags: usize) -> Result<Series> {
        let radius = self.radius()?;
        Ok(Series::process(&radius, self.var(name)?, n_lags)?)
    }
    /// The common filter width, taken from the streamwise velocity spectrum
    pub fn cutoff(&self, n_lags: usize) -> Result<usize> {
        Ok(self.series("U-X", n_lags)?.length_scales()?.cutoff)
    }
    pub fn summary(&self) {
        let max_value = |x: &[f64]| x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_value = |x: &[f64]| x.iter().cloned().fold(f64::INFINITY, f64::min);
        let stats = |x: &[f64]| {
            let n = x.len() as f64;
            let mean = x.iter().sum::<f64>() / n;
            let std = (x.iter().map(|x| x - mean).fold(0f64, |s, x| s + x * x) / n).sqrt();
            (mean, std)
        };
        println!("SUMMARY:");
        println!(" - # of records: {}", self.len());
        println!(
            " - time range: [{:8.3}-{:8.3}]s",
            self.time[0],
            self.time.last().unwrap()
        );
        if let Some([x, y, z]) = self.location {
            println!(" - location: [{:6.3},{:6.3},{:6.3}]m", x, y, z);
        }
        println!(
            "    {:^8}: ({:^12}, {:^12})  ({:^12}, {:^12})",
            "VARIABLE", "MEAN", "STD", "MIN", "MAX"
        );
        self.variables.iter().for_each(|(key, value)| {
            println!(
                "  - {:8}: {:>12.3?}  {:>12.3?}",
                key,
                stats(value),
                (min_value(value), max_value(value))
            );
        });
    }
    /// Caches the probe to a pickle file
    pub fn to_pickle<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
    /// Restores a probe from its pickle cache
    pub fn from_pickle<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_pickle::from_reader(&mut file, Default::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;
    use tempdir::TempDir;

    fn sample_probe(dir: &std::path::Path) {
        let mut file = File::create(dir.join("p00.csv")).unwrap();
        writeln!(file, "Time [s],U-X [m/s],T [K],RHO [kg/m^3],P [Pa],DIL [1/s]").unwrap();
        for i in 0..32 {
            let t = i as f64 * 1e-3;
            writeln!(
                file,
                "{},{},{},{},{},{}",
                t,
                2500. + (i % 4) as f64,
                1200. - i as f64,
                0.05,
                1e5,
                10. * (i % 2) as f64
            )
            .unwrap();
        }
    }

    #[test]
    fn load_probe() {
        let tmp = TempDir::new("probe").unwrap();
        sample_probe(tmp.path());
        let probe = ProbeData::loader()
            .data_path(tmp.path())
            .probe("p00")
            .load()
            .unwrap();
        assert_eq!(probe.len(), 32);
        assert_eq!(probe.variables.len(), 5);
        assert_abs_diff_eq!(probe.var("T").unwrap()[1], 1199f64, epsilon = 1e-12);
    }

    #[test]
    fn sub_sampling_and_time_range() {
        let tmp = TempDir::new("probe").unwrap();
        sample_probe(tmp.path());
        let probe = ProbeData::loader()
            .data_path(tmp.path())
            .probe("p00")
            .start_time(4e-3)
            .end_time(20e-3)
            .sampling_rate(2)
            .load()
            .unwrap();
        assert_eq!(probe.len(), 9);
        assert_abs_diff_eq!(probe.time[0], 4e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(probe.time[1], 6e-3, epsilon = 1e-12);
    }

    #[test]
    fn derived_variables() {
        let tmp = TempDir::new("probe").unwrap();
        sample_probe(tmp.path());
        let mut probe = ProbeData::loader()
            .data_path(tmp.path())
            .probe("p00")
            .load()
            .unwrap();
        probe.derive_variables();
        let mu = probe.var("MU").unwrap();
        assert_abs_diff_eq!(mu[0], sutherland(1200f64), epsilon = 1e-20);
        let nu = probe.var("NU").unwrap();
        assert_abs_diff_eq!(nu[0], mu[0] / 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(probe.var("P-DIL").unwrap()[1], 1e6, epsilon = 1e-6);
    }

    #[test]
    fn frozen_flow_radius_starts_at_zero() {
        let tmp = TempDir::new("probe").unwrap();
        sample_probe(tmp.path());
        let probe = ProbeData::loader()
            .data_path(tmp.path())
            .probe("p00")
            .load()
            .unwrap();
        let radius = probe.radius().unwrap();
        assert_abs_diff_eq!(radius[0], 0f64, epsilon = 1e-12);
        assert!(radius.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn pickle_round_trip() {
        let tmp = TempDir::new("probe").unwrap();
        sample_probe(tmp.path());
        let probe = ProbeData::loader()
            .data_path(tmp.path())
            .probe("p00")
            .load()
            .unwrap();
        let cache = tmp.path().join("p00.pkl");
        probe.to_pickle(&cache).unwrap();
        let restored = ProbeData::from_pickle(&cache).unwrap();
        assert_eq!(restored.len(), probe.len());
        assert_eq!(restored.variables, probe.variables);
    }
}
