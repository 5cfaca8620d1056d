//! Batch length-scale analysis
//!
//! For every line extract: temporal and spatial series of each variable,
//! ensemble averages, length scales, boxcar + Legendre filters,
//! boundary-layer properties and wall functions. For every probe extract:
//! length scales, filters, scatter pairs and energy cascades. One report
//! directory per dataset.

use anyhow::Context;
use indicatif::ParallelProgressIterator;
use parse_probes::{
    boundary_layer, plot, wall_units, Boxcar, Legendre, LineAxis, LineCuts, LineData, Moments,
    ProbeData, ProbePoints, Series, Variable,
};
use glob::glob;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, HashSet},
    fs::create_dir_all,
    path::PathBuf,
};
use structopt::StructOpt;
use strum::IntoEnumIterator;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "length-scales",
    about = "Batch length-scale analysis of the line and probe extracts"
)]
struct Opt {
    /// Path to the extracts repository (defaults to $PROBE_REPO)
    #[structopt(long)]
    path: Option<PathBuf>,
    /// Report directory
    #[structopt(long, default_value = "report")]
    report: PathBuf,
    /// Freestream velocity [m/s]
    #[structopt(long, default_value = "2500")]
    velocity: f64,
    /// Freestream temperature [K]
    #[structopt(long, default_value = "1200")]
    temperature: f64,
    /// Station sub-sampling of the temporal series
    #[structopt(long, default_value = "10")]
    station_sampling: usize,
    /// Snapshot sub-sampling of the spatial series
    #[structopt(long, default_value = "45")]
    time_sampling: usize,
    /// Correlation lags of the line series
    #[structopt(long, default_value = "50")]
    line_lags: usize,
    /// Correlation lags of the probe series
    #[structopt(long, default_value = "40")]
    probe_lags: usize,
    /// Skip the line analysis
    #[structopt(long)]
    no_lines: bool,
    /// Skip the probe analysis
    #[structopt(long)]
    no_probes: bool,
}

/// Vertical offset of the -5/3 slope guide in the energy cascade figures
fn shifting_factor(variable: &str) -> f64 {
    match variable {
        "RHO" => 1.6,
        "P" => 1e9,
        "DIL" => 1e12,
        "RHOE" => 1e10,
        "VORTMAG" => 1e12,
        "P-DIL" => 1e21,
        "RHO-DIL" => 1e10,
        _ => 1e7,
    }
}

fn variables() -> Vec<String> {
    Variable::iter()
        .filter(|v| !matches!(v, Variable::KinematicViscosity))
        .map(|v| v.to_string())
        .collect()
}

/// Datasets with an extract file on disk
fn available(root: &std::path::Path, sub: &str) -> HashSet<String> {
    let pattern = root.join(sub).join("*.csv*");
    pattern
        .to_str()
        .map(|pattern| {
            glob(pattern)
                .map(|paths| {
                    paths
                        .filter_map(|entry| entry.ok())
                        .filter_map(|path| {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .and_then(|name| name.split('.').next())
                                .map(|id| id.to_string())
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .unwrap_or_default()
}

fn line_task(
    opt: &Opt,
    root: &std::path::Path,
    id: &str,
    endpoints: [f64; 6],
) -> anyhow::Result<(f64, f64, f64)> {
    let mut line = LineData::loader()
        .data_path(root.join("lines"))
        .line(id)
        .endpoints(endpoints)
        .load()
        .with_context(|| format!("loading line {}", id))?;
    line.derive_variables();
    let report = opt.report.join(id);
    create_dir_all(&report)?;

    let mut temporal_raw: BTreeMap<String, BTreeMap<usize, Series>> = BTreeMap::new();
    let mut spatial_raw: BTreeMap<String, BTreeMap<usize, Series>> = BTreeMap::new();
    let mut temporal: BTreeMap<String, Series> = BTreeMap::new();
    let mut spatial: BTreeMap<String, Series> = BTreeMap::new();
    for name in variables() {
        let t_raw = line.temporal_series(&name, opt.station_sampling, opt.line_lags)?;
        let s_raw = line.spatial_series(&name, opt.time_sampling, LineAxis::Y, 40)?;
        temporal.insert(name.clone(), LineData::ensemble(&t_raw)?);
        spatial.insert(name.clone(), LineData::ensemble(&s_raw)?);
        temporal_raw.insert(name.clone(), t_raw);
        spatial_raw.insert(name, s_raw);
    }

    // common filter widths from the velocity spectra
    let temporal_cutoff = temporal["U-X"].length_scales()?.cutoff;
    let spatial_cutoff = spatial["U-Z"].length_scales()?.cutoff;

    for name in variables() {
        let t_window = temporal_cutoff.clamp(1, line.len());
        let (t_boxcar, t_legendre) = LineData::ensemble_filters(&temporal_raw[&name], t_window)?;
        let s_window = spatial_cutoff.clamp(1, line.stations());
        let (s_boxcar, s_legendre) = LineData::ensemble_filters(&spatial_raw[&name], s_window)?;

        for (kind, series, boxcar, legendre) in [
            ("temporal", &temporal[&name], t_boxcar, t_legendre),
            ("spatial", &spatial[&name], s_boxcar, s_legendre),
        ] {
            let scales = series.length_scales()?;
            let figure = |figure: &str| {
                report
                    .join(format!("{}_{}_{}.png", kind, name, figure))
                    .to_str()
                    .unwrap()
                    .to_string()
            };
            plot::correlation(series, &scales, &figure("correlation"));
            plot::spectrum(&series.spectrum, &scales, &figure("spectrum"));
            let moments = Moments::new(&boxcar.variable);
            plot::boxcar(
                &series.radius,
                &series.variable,
                &boxcar,
                &moments,
                &figure("boxcar"),
            );
            plot::legendre(&boxcar, &legendre, &figure("legendre"));
        }
    }

    // boundary layers from the spatial ensembles
    let viscosity = &spatial["MU"].variable;
    let bl_velocity = boundary_layer(
        &spatial["U-X"].radius,
        &spatial["U-X"].variable,
        viscosity,
        opt.velocity,
    )?;
    let bl_temperature = boundary_layer(
        &spatial["T"].radius,
        &spatial["T"].variable,
        viscosity,
        opt.temperature,
    )?;
    let n = bl_velocity.variable.len();
    let (y_plus, u_plus) = wall_units(
        &bl_velocity,
        &spatial["RHO"].variable[..n],
        &viscosity[..n],
    );
    plot::wall_function(
        &y_plus[1..],
        &u_plus[1..],
        report.join("wall_function.png").to_str().unwrap(),
    );
    plot::boundary_layer_profile(
        &bl_velocity,
        report.join("boundary_layer.png").to_str().unwrap(),
    );
    Ok((
        endpoints[0],
        bl_velocity.thickness,
        bl_temperature.thickness,
    ))
}

fn probe_task(opt: &Opt, root: &std::path::Path, id: &str) -> anyhow::Result<()> {
    let mut probe = ProbeData::loader()
        .data_path(root.join("probes"))
        .probe(id)
        .load()
        .with_context(|| format!("loading probe {}", id))?;
    probe.derive_variables();
    let report = opt.report.join(id);
    create_dir_all(&report)?;

    let cutoff = probe.cutoff(opt.probe_lags)?.clamp(1, probe.len());
    let radius = probe.radius()?;

    // scatter the boxcar-filtered variable pairs
    let pairs = [
        ("P", "RHO"),
        ("P", "T"),
        ("RHO", "T"),
        ("P", "DIL"),
        ("T", "DIL"),
        ("RHO", "DIL"),
        ("RHO", "P-DIL"),
        ("T", "P-DIL"),
    ];
    for (x, y) in pairs {
        let filtered_x = Boxcar::new(&radius, probe.var(x)?, cutoff)?;
        let filtered_y = Boxcar::new(&radius, probe.var(y)?, cutoff)?;
        plot::scatter(
            (x, &filtered_x.variable),
            (y, &filtered_y.variable),
            report
                .join(format!("scatter_{}_{}.png", x, y))
                .to_str()
                .unwrap(),
        );
    }

    for name in variables() {
        let series = probe.series(&name, opt.probe_lags)?;
        let scales = series.length_scales()?;
        let boxcar = Boxcar::new(&series.radius, &series.variable, cutoff)?;
        let legendre = Legendre::fit(&boxcar, None)?;
        let moments = Moments::new(&boxcar.variable);
        let figure = |figure: &str| {
            report
                .join(format!("{}_{}.png", name, figure))
                .to_str()
                .unwrap()
                .to_string()
        };
        plot::correlation(&series, &scales, &figure("correlation"));
        plot::spectrum(&series.spectrum, &scales, &figure("spectrum"));
        plot::energy_cascade(
            &series.spectrum.power,
            shifting_factor(&name),
            &figure("cascade"),
        );
        plot::boxcar(
            &series.radius,
            &series.variable,
            &boxcar,
            &moments,
            &figure("boxcar"),
        );
        plot::legendre(&boxcar, &legendre, &figure("legendre"));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let root = match &opt.path {
        Some(path) => path.clone(),
        None => parse_probes::repo_path()?,
    };
    create_dir_all(&opt.report)?;

    if !opt.no_lines {
        let cuts = LineCuts::default();
        let on_disk = available(&root, "lines");
        let datasets: Vec<(String, [f64; 6])> = cuts
            .iter()
            .filter(|(id, _)| on_disk.contains(*id))
            .map(|(id, ends)| (id.clone(), *ends))
            .collect();
        let n_datasets = datasets.len() as u64;
        let results: Vec<_> = datasets
            .into_par_iter()
            .progress_count(n_datasets)
            .map(|(id, endpoints)| (id.clone(), line_task(&opt, &root, &id, endpoints)))
            .collect();
        let mut thickness: Vec<(f64, f64, f64)> = vec![];
        for (id, result) in results {
            match result {
                Ok(values) => thickness.push(values),
                Err(e) => log::warn!("line {} failed: {:#}", id, e),
            }
        }
        thickness.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        if !thickness.is_empty() {
            let (x, (velocity, temperature)): (Vec<f64>, (Vec<f64>, Vec<f64>)) = thickness
                .into_iter()
                .map(|(x, v, t)| (x, (v, t)))
                .unzip();
            plot::boundary_layer_growth(
                &x,
                &velocity,
                &temperature,
                3,
                opt.report.join("boundary_layers.png").to_str().unwrap(),
            );
        }
    }

    if !opt.no_probes {
        let points = ProbePoints::default();
        let on_disk = available(&root, "probes");
        let datasets: Vec<String> = points
            .keys()
            .filter(|id| on_disk.contains(*id))
            .cloned()
            .collect();
        let n_datasets = datasets.len() as u64;
        let results: Vec<_> = datasets
            .into_par_iter()
            .progress_count(n_datasets)
            .map(|id| (id.clone(), probe_task(&opt, &root, &id)))
            .collect();
        for (id, result) in results {
            if let Err(e) = result {
                log::warn!("probe {} failed: {:#}", id, e);
            }
        }
    }

    Ok(())
}
