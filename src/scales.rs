//! Autocorrelation functions, turbulence length scales and spectra
//!
//! The processing pipeline shared by the probe and line extracts: a
//! fluctuation series is correlated against itself at increasing lags, the
//! decay of the correlation gives the Taylor microscale (from its curvature
//! at the origin) and the integral scale (from its integral), and the Welch
//! spectral density of the fluctuation gives the cutoff wavenumber that
//! parameterizes the smoothing filters.

use serde::{Deserialize, Serialize};
use welch_sde::{Build, SpectralDensity};

#[derive(Debug, thiserror::Error)]
pub enum ScalesError {
    #[error("Series of {0} samples is too short to process")]
    SeriesTooShort(usize),
    #[error("At least 4 correlation lags are required, got {0}")]
    Lags(usize),
    #[error("Zero fluctuation variance, correlation undefined")]
    ZeroVariance,
    #[error("Non-negative correlation curvature, Taylor scale undefined")]
    PositiveCurvature,
    #[error("Cannot average an empty set of series")]
    EmptyEnsemble,
    #[error("Series length mismatch in ensemble: {0} and {1}")]
    EnsembleMismatch(usize, usize),
}
type Result<T> = std::result::Result<T, ScalesError>;

/// Lag autocorrelation of a fluctuation series
///
/// The lag abscissa holds `n_lags` points linearly spanning the full radius
/// range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autocorrelation {
    pub radius: Vec<f64>,
    pub rho: Vec<f64>,
}
impl Autocorrelation {
    pub fn new(radius: &[f64], fluctuation: &[f64], n_lags: usize) -> Result<Self> {
        if n_lags < 4 {
            return Err(ScalesError::Lags(n_lags));
        }
        if fluctuation.len() < 2 {
            return Err(ScalesError::SeriesTooShort(fluctuation.len()));
        }
        let last = fluctuation.len() - 1;
        let mut numerator = vec![0f64; n_lags];
        let mut denominator = vec![0f64; n_lags];
        for i in 0..last {
            for (j, (num, den)) in numerator
                .iter_mut()
                .zip(denominator.iter_mut())
                .enumerate()
            {
                let k = i + j;
                if k > last {
                    break;
                }
                *num += fluctuation[i] * fluctuation[k];
                *den += fluctuation[i] * fluctuation[i];
            }
        }
        if denominator[0] == 0f64 {
            return Err(ScalesError::ZeroVariance);
        }
        let rho: Vec<f64> = numerator
            .iter()
            .zip(denominator.iter())
            .map(|(num, den)| num / den)
            .collect();
        let radius_max = radius.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            radius: linspace(0f64, radius_max, n_lags),
            rho,
        })
    }
    /// Lag abscissa spacing
    pub fn delta(&self) -> f64 {
        let n = self.radius.len();
        (self.radius[n - 1] - self.radius[0]) / (n - 1) as f64
    }
}

/// Welch spectral density of a fluctuation series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    pub frequency: Vec<f64>,
    pub power: Vec<f64>,
}
impl Spectrum {
    /// Estimates the spectral density at the sampling rate `fs`
    pub fn new(fluctuation: &[f64], fs: f64) -> Result<Self> {
        if fluctuation.len() < 8 {
            return Err(ScalesError::SeriesTooShort(fluctuation.len()));
        }
        let welch: SpectralDensity<f64> = SpectralDensity::builder(fluctuation, fs).build();
        let periodogram = welch.periodogram();
        Ok(Self {
            frequency: periodogram.frequency(),
            power: periodogram.to_vec(),
        })
    }
}

/// Taylor and integral length scales with their wavenumbers and the
/// spectral cutoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthScales {
    /// Taylor microscale [m]
    pub taylor: f64,
    /// Integral scale [m]
    pub integral: f64,
    /// Taylor wavenumber [1/m]
    pub taylor_wavenumber: f64,
    /// Integral wavenumber [1/m]
    pub integral_wavenumber: f64,
    /// Spectral cutoff index, also the boxcar filter width [samples]
    pub cutoff: usize,
}
impl LengthScales {
    pub fn new(correlation: &Autocorrelation, spectrum: &Spectrum) -> Result<Self> {
        let rho = &correlation.rho;
        if rho.len() < 4 {
            return Err(ScalesError::Lags(rho.len()));
        }
        let delta = correlation.delta();
        // curvature of the correlation at the origin, one-sided 4-point
        // estimate with a 3-point central fallback
        let mut curvature =
            (2f64 * rho[0] - 5f64 * rho[1] + 4f64 * rho[2] - rho[3]) / (delta * delta);
        if curvature >= 0f64 {
            curvature = (rho[0] - 2f64 * rho[1] + rho[2]) / (delta * delta);
        }
        if curvature >= 0f64 {
            return Err(ScalesError::PositiveCurvature);
        }
        let taylor = 1f64 / (-0.5 * curvature).sqrt();
        let integral = simpson(rho, delta).abs();
        Ok(Self {
            taylor,
            integral,
            taylor_wavenumber: taylor.recip(),
            integral_wavenumber: integral.recip(),
            cutoff: spectral_cutoff(&spectrum.power),
        })
    }
}
impl std::fmt::Display for LengthScales {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "L={:.3e}m, lambda={:.3e}m, cutoff={}",
            self.integral, self.taylor, self.cutoff
        )
    }
}

/// A processed extract: raw series, fluctuation, correlation and spectrum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub radius: Vec<f64>,
    pub variable: Vec<f64>,
    pub fluctuation: Vec<f64>,
    pub correlation: Autocorrelation,
    pub spectrum: Spectrum,
}
impl Series {
    /// Reynolds-decomposes the series and derives its correlation and
    /// spectrum
    pub fn process(radius: &[f64], variable: &[f64], n_lags: usize) -> Result<Self> {
        if variable.len() < 8 || radius.len() != variable.len() {
            return Err(ScalesError::SeriesTooShort(variable.len()));
        }
        let mean = variable.iter().sum::<f64>() / variable.len() as f64;
        let fluctuation: Vec<f64> = variable.iter().map(|x| x - mean).collect();
        let correlation = Autocorrelation::new(radius, &fluctuation, n_lags)?;
        let n = radius.len();
        let fs = (n - 1) as f64 / (radius[n - 1] - radius[0]);
        let spectrum = Spectrum::new(&fluctuation, fs)?;
        Ok(Self {
            radius: radius.to_vec(),
            variable: variable.to_vec(),
            fluctuation,
            correlation,
            spectrum,
        })
    }
    pub fn length_scales(&self) -> Result<LengthScales> {
        LengthScales::new(&self.correlation, &self.spectrum)
    }
    /// Element-wise average of a set of series sharing the same sampling
    pub fn ensemble<'a>(members: impl IntoIterator<Item = &'a Series>) -> Result<Series> {
        let members: Vec<&Series> = members.into_iter().collect();
        let first = *members.first().ok_or(ScalesError::EmptyEnsemble)?;
        for member in &members {
            if member.radius.len() != first.radius.len()
                || member.spectrum.power.len() != first.spectrum.power.len()
            {
                return Err(ScalesError::EnsembleMismatch(
                    first.radius.len(),
                    member.radius.len(),
                ));
            }
        }
        let average = |field: fn(&Series) -> &Vec<f64>| -> Vec<f64> {
            let n = members.len() as f64;
            let mut out = vec![0f64; field(first).len()];
            for member in &members {
                out.iter_mut()
                    .zip(field(member).iter())
                    .for_each(|(o, x)| *o += x);
            }
            out.iter_mut().for_each(|o| *o /= n);
            out
        };
        Ok(Series {
            radius: average(|s| &s.radius),
            variable: average(|s| &s.variable),
            fluctuation: average(|s| &s.fluctuation),
            correlation: Autocorrelation {
                radius: average(|s| &s.correlation.radius),
                rho: average(|s| &s.correlation.rho),
            },
            spectrum: Spectrum {
                frequency: average(|s| &s.spectrum.frequency),
                power: average(|s| &s.spectrum.power),
            },
        })
    }
}

/// Cutoff wavenumber of a spectral density
///
/// Scans upward from the spectral peak until the remainder of the spectrum
/// stays below 1e-3 of the peak; the returned index is also the boxcar
/// filter width in samples.
pub fn spectral_cutoff(power: &[f64]) -> usize {
    const REJECTION: f64 = 1e-3;
    let Some((i_peak, peak)) = power
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
    else {
        return 1;
    };
    let floor = peak * REJECTION;
    let mut k = i_peak + 1;
    while k < power.len() && power[k..].iter().any(|&s| s > floor) {
        k += 1;
    }
    k.max(1)
}

/// Composite Simpson's rule with uniform spacing
///
/// An even sample count closes the last interval with a trapezoid.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0f64,
        2 => 0.5 * dx * (y[0] + y[1]),
        _ => {
            let m = if n % 2 == 1 { n } else { n - 1 };
            let mut sum = y[0] + y[m - 1];
            for (i, value) in y.iter().enumerate().take(m - 1).skip(1) {
                sum += value * if i % 2 == 1 { 4f64 } else { 2f64 };
            }
            let mut integral = sum * dx / 3f64;
            if n % 2 == 0 {
                integral += 0.5 * dx * (y[n - 2] + y[n - 1]);
            }
            integral
        }
    }
}

pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cosine_series(n: usize, period: usize) -> (Vec<f64>, Vec<f64>) {
        let dx = 1e-3;
        let radius: Vec<f64> = (0..n).map(|i| i as f64 * dx).collect();
        let variable: Vec<f64> = (0..n)
            .map(|i| (2f64 * std::f64::consts::PI * i as f64 / period as f64).cos())
            .collect();
        (radius, variable)
    }

    #[test]
    fn simpson_quadratic() {
        let n = 101;
        let dx = 1f64 / (n - 1) as f64;
        let y: Vec<f64> = (0..n).map(|i| (i as f64 * dx).powi(2)).collect();
        assert_abs_diff_eq!(simpson(&y, dx), 1f64 / 3f64, epsilon = 1e-10);
    }

    #[test]
    fn simpson_even_count() {
        let n = 100;
        let dx = 1f64 / (n - 1) as f64;
        let y = vec![1f64; n];
        assert_abs_diff_eq!(simpson(&y, dx), 1f64, epsilon = 1e-10);
    }

    #[test]
    fn correlation_is_one_at_zero_lag() {
        let (radius, variable) = cosine_series(512, 64);
        let series = Series::process(&radius, &variable, 50).unwrap();
        assert_abs_diff_eq!(series.correlation.rho[0], 1f64, epsilon = 1e-12);
    }

    #[test]
    fn constant_series_has_no_correlation() {
        let radius: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let variable = vec![3.14f64; 64];
        assert!(matches!(
            Series::process(&radius, &variable, 50),
            Err(ScalesError::ZeroVariance)
        ));
    }

    #[test]
    fn length_scales_of_a_decaying_correlation() {
        let (radius, variable) = cosine_series(1024, 256);
        let series = Series::process(&radius, &variable, 50).unwrap();
        let scales = series.length_scales().unwrap();
        assert!(scales.taylor > 0f64 && scales.taylor.is_finite());
        assert!(scales.integral > 0f64 && scales.integral.is_finite());
        assert_abs_diff_eq!(
            scales.taylor_wavenumber,
            1f64 / scales.taylor,
            epsilon = 1e-12
        );
        assert!(scales.cutoff >= 1);
    }

    #[test]
    fn spectrum_peaks_at_the_tone() {
        let n = 4096;
        let fs = 1f64;
        let tone = 0.1f64;
        let fluctuation: Vec<f64> = (0..n)
            .map(|i| (2f64 * std::f64::consts::PI * tone * i as f64 / fs).sin())
            .collect();
        let spectrum = Spectrum::new(&fluctuation, fs).unwrap();
        let (i_peak, _) = spectrum
            .power
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .unwrap();
        assert!((spectrum.frequency[i_peak] - tone).abs() < 2e-2);
    }

    #[test]
    fn cutoff_past_the_peak() {
        let mut power = vec![1e-6; 64];
        power[4] = 1f64;
        power[5] = 0.5;
        power[6] = 1e-2;
        assert_eq!(spectral_cutoff(&power), 7);
    }

    #[test]
    fn white_noise_decorrelates() {
        use rand::prelude::*;
        let mut rng = StdRng::seed_from_u64(42);
        let n = 2048;
        let radius: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let variable: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
        let series = Series::process(&radius, &variable, 50).unwrap();
        assert_abs_diff_eq!(series.correlation.rho[0], 1f64, epsilon = 1e-12);
        assert!(series.correlation.rho[10].abs() < 0.1);
    }

    #[test]
    fn ensemble_of_identical_series_is_itself() {
        let (radius, variable) = cosine_series(256, 32);
        let series = Series::process(&radius, &variable, 40).unwrap();
        let ensemble = Series::ensemble([&series, &series]).unwrap();
        for (a, b) in ensemble.variable.iter().zip(series.variable.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (a, b) in ensemble.correlation.rho.iter().zip(series.correlation.rho.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}
