//! Figures
//!
//! All the classical post-processing figures, rendered with `complot`. The
//! module is gated behind the `plot` cargo feature.

use crate::{
    filters::{smooth, Boxcar, Legendre, Moments},
    line::BoundaryLayer,
    scales::{LengthScales, Series, Spectrum},
};
use ndarray::Array2;

/// Autocorrelation function annotated with the integral and Taylor scales
pub fn correlation(series: &Series, scales: &LengthScales, filename: &str) {
    let label = format!(
        "L={:.3e}m, lambda={:.3e}m",
        scales.integral, scales.taylor
    );
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("Radius [m]"))
        .yaxis(complot::Axis::new().label("Correlation"))
        .legend(vec![label.as_str()]);
    let _: complot::Plot = (
        series
            .correlation
            .radius
            .iter()
            .zip(series.correlation.rho.iter())
            .map(|(&x, &y)| (x, vec![y])),
        Some(config),
    )
        .into();
}

/// Spectral density with the integral and Taylor wavenumber markers drawn
/// as reference decades
pub fn spectrum(spectrum: &Spectrum, scales: &LengthScales, filename: &str) {
    let label = format!(
        "Lk={:.3e}, lambdak={:.3e}",
        scales.integral_wavenumber, scales.taylor_wavenumber
    );
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("k-vector [1/m]"))
        .yaxis(complot::Axis::new().label("Energy Spectrum"))
        .legend(vec![label.as_str()]);
    let _: complot::LogLog = (
        spectrum
            .frequency
            .iter()
            .zip(spectrum.power.iter())
            .filter(|(f, p)| **f > 0f64 && **p > 0f64)
            .map(|(&f, &p)| (f, vec![p])),
        Some(config),
    )
        .into();
}

/// Energy cascade with a -5/3 slope guide
pub fn energy_cascade(power: &[f64], shifting_factor: f64, filename: &str) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("k-vector [1/m]"))
        .yaxis(complot::Axis::new().label("E(k)"))
        .legend(vec!["E(k)", "-5/3 slope"]);
    let _: complot::LogLog = (
        power.iter().enumerate().skip(1).map(|(k, &p)| {
            let guide = shifting_factor * (k as f64).powf(-5f64 / 3f64);
            (k as f64, vec![p.max(f64::MIN_POSITIVE), guide])
        }),
        Some(config),
    )
        .into();
}

/// Raw series with its boxcar-filtered overlay, annotated with the
/// statistical moments
pub fn boxcar(
    radius: &[f64],
    variable: &[f64],
    filtered: &Boxcar,
    moments: &Moments,
    filename: &str,
) {
    let label = moments.to_string();
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("Radius [m]"))
        .yaxis(complot::Axis::new().label("Variable"));
    let raw: Vec<(f64, Vec<f64>)> = radius
        .iter()
        .zip(variable.iter())
        .map(|(&x, &y)| (x, vec![y]))
        .collect();
    let smoothed: Vec<(f64, Vec<f64>)> = filtered
        .radius
        .iter()
        .zip(filtered.variable.iter())
        .map(|(&x, &y)| (x, vec![y]))
        .collect();
    combo(vec![raw, smoothed], vec!["raw", label.as_str()], config);
}

/// Boxcar-filtered series with its Legendre interpolation
pub fn legendre(filtered: &Boxcar, interpolation: &Legendre, filename: &str) {
    let label = format!("Legendre, degree {}", interpolation.degree);
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("Radius [m]"))
        .yaxis(complot::Axis::new().label("Variable"));
    let filtered: Vec<(f64, Vec<f64>)> = filtered
        .radius
        .iter()
        .zip(filtered.variable.iter())
        .map(|(&x, &y)| (x, vec![y]))
        .collect();
    let fitted: Vec<(f64, Vec<f64>)> = interpolation
        .radius
        .iter()
        .zip(interpolation.variable.iter())
        .map(|(&x, &y)| (x, vec![y]))
        .collect();
    combo(vec![filtered, fitted], vec!["boxcar", label.as_str()], config);
}

/// Scatter plot of a variable pair
pub fn scatter(x: (&str, &[f64]), y: (&str, &[f64]), filename: &str) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label(x.0))
        .yaxis(complot::Axis::new().label(y.0));
    let _: complot::Scatter = (
        x.1.iter().zip(y.1.iter()).map(|(&x, &y)| (x, vec![y])),
        Some(config),
    )
        .into();
}

/// Boundary-layer thickness versus the streamwise station, raw and smoothed
pub fn boundary_layer_growth(
    x: &[f64],
    velocity_thickness: &[f64],
    temperature_thickness: &[f64],
    window: usize,
    filename: &str,
) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("x-axis [m]"))
        .yaxis(complot::Axis::new().label("thickness [m]"));
    let half = window / 2;
    let interior = |data: &[f64]| -> Vec<(f64, Vec<f64>)> {
        let smoothed = smooth(data, window);
        x.iter()
            .zip(smoothed.iter())
            .skip(half)
            .take(data.len().saturating_sub(2 * half))
            .map(|(&x, &y)| (x, vec![y]))
            .collect()
    };
    let raw = |data: &[f64]| -> Vec<(f64, Vec<f64>)> {
        x.iter()
            .zip(data.iter())
            .map(|(&x, &y)| (x, vec![y]))
            .collect()
    };
    combo(
        vec![
            raw(velocity_thickness),
            interior(velocity_thickness),
            raw(temperature_thickness),
            interior(temperature_thickness),
        ],
        vec!["U-X", "U-X smoothed", "T", "T smoothed"],
        config,
    );
}

/// Law-of-the-wall profile, u+ against log10(y+)
pub fn wall_function(y_plus: &[f64], u_plus: &[f64], filename: &str) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("log10(y+)"))
        .yaxis(complot::Axis::new().label("u+"));
    let _: complot::Plot = (
        y_plus
            .iter()
            .zip(u_plus.iter())
            .filter(|(y, _)| **y > 0f64)
            .map(|(&y, &u)| (y.log10(), vec![u])),
        Some(config),
    )
        .into();
}

/// Van Driest transformed profile next to the raw wall units
pub fn van_driest(y_plus: &[f64], u_plus: &[f64], u_vd_plus: &[f64], filename: &str) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("log10(y+)"))
        .yaxis(complot::Axis::new().label("u+"));
    let data: Vec<(f64, Vec<f64>)> = y_plus
        .iter()
        .zip(u_plus.iter().zip(u_vd_plus.iter()))
        .filter(|(y, _)| **y > 0f64)
        .map(|(&y, (&u, &uvd))| (y.log10(), vec![u, uvd]))
        .collect();
    let _: complot::Plot = (data.into_iter(), Some(config)).into();
}

/// In-layer profile of a boundary layer
pub fn boundary_layer_profile(bl: &BoundaryLayer, filename: &str) {
    let config = complot::Config::new()
        .filename(filename)
        .xaxis(complot::Axis::new().label("Variable"))
        .yaxis(complot::Axis::new().label("y-axis [m]"));
    let _: complot::Plot = (
        bl.variable
            .iter()
            .zip(bl.radius.iter())
            .map(|(&v, &y)| (v, vec![y])),
        Some(config),
    )
        .into();
}

/// Heatmap of a 2-D field slice
pub fn heatmap(field: &Array2<f64>, label: &str, filename: &str) {
    use plotters::prelude::*;
    let (n_rows, n_cols) = field.dim();
    let root = BitMapBackend::new(filename, (768, 512)).into_drawing_area();
    root.fill(&WHITE).unwrap();
    let max = field.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = field.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .set_label_area_size(LabelAreaPosition::Left, 40)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .caption(label, ("sans-serif", 16))
        .build_cartesian_2d(0..n_cols as i32, 0..n_rows as i32)
        .unwrap();
    chart.configure_mesh().disable_mesh().draw().unwrap();
    chart
        .draw_series(field.indexed_iter().map(|((i, j), &value)| {
            let t = if max > min {
                (value - min) / (max - min)
            } else {
                0f64
            };
            let color = colorous::INFERNO.eval_continuous(t);
            Rectangle::new(
                [(j as i32, i as i32), (j as i32 + 1, i as i32 + 1)],
                RGBColor(color.r, color.g, color.b).filled(),
            )
        }))
        .unwrap();
}

fn combo(data: Vec<Vec<(f64, Vec<f64>)>>, labels: Vec<&str>, config: complot::Config) {
    let mut data_iter: Vec<Box<dyn Iterator<Item = (f64, Vec<f64>)> + 'static>> = vec![];
    for member in data.into_iter() {
        data_iter.push(Box::new(member.into_iter()));
    }
    let kinds: Vec<_> = labels
        .into_iter()
        .map(|l| complot::Kind::Plot(Some(l.into())))
        .collect();
    let _: complot::Combo = From::<complot::Complot>::from((data_iter, kinds, Some(config)));
}
