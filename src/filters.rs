//! Smoothing filters and statistical moments
//!
//! The boxcar filter block-averages a noisy series with the window width
//! given by the spectral cutoff, and the Legendre interpolation fits a
//! low-order Legendre series through the filtered points.

use nalgebra as na;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Boxcar window of {window} samples does not fit a series of {len}")]
    Window { window: usize, len: usize },
    #[error("Degenerate abscissa, cannot normalize to [-1, 1]")]
    DegenerateAbscissa,
    #[error("Least-squares solve failed: {0}")]
    LeastSquares(String),
}
type Result<T> = std::result::Result<T, FilterError>;

/// Non-overlapping block average of a series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boxcar {
    pub radius: Vec<f64>,
    pub variable: Vec<f64>,
    pub fluctuation: Vec<f64>,
    pub window: usize,
}
impl Boxcar {
    /// Block-averages abscissa and signal over `window` samples, dropping
    /// the remainder
    pub fn new(radius: &[f64], variable: &[f64], window: usize) -> Result<Self> {
        if window == 0 || window > variable.len() {
            return Err(FilterError::Window {
                window,
                len: variable.len(),
            });
        }
        let block = |data: &[f64]| -> Vec<f64> {
            data.chunks_exact(window)
                .map(|chunk| chunk.iter().sum::<f64>() / window as f64)
                .collect()
        };
        let radius = block(radius);
        let variable = block(variable);
        let mean = variable.iter().sum::<f64>() / variable.len() as f64;
        let fluctuation = variable.iter().map(|x| x - mean).collect();
        Ok(Self {
            radius,
            variable,
            fluctuation,
            window,
        })
    }
    pub fn len(&self) -> usize {
        self.variable.len()
    }
    pub fn is_empty(&self) -> bool {
        self.variable.is_empty()
    }
}

/// Least-squares Legendre-series interpolation of a boxcar-filtered series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Legendre {
    pub radius: Vec<f64>,
    pub variable: Vec<f64>,
    pub degree: usize,
}
impl Legendre {
    /// Fits a Legendre series on the abscissa mapped to [-1, 1] and
    /// evaluates it back at the boxcar abscissa
    ///
    /// The degree defaults to `min(7, n - 1)`.
    pub fn fit(boxcar: &Boxcar, degree: Option<usize>) -> Result<Self> {
        let n = boxcar.len();
        let degree = degree.unwrap_or(7).min(n.saturating_sub(1));
        let (r_min, r_max) = (boxcar.radius[0], boxcar.radius[n - 1]);
        if (r_max - r_min).abs() < f64::EPSILON {
            return Err(FilterError::DegenerateAbscissa);
        }
        let x_hat: Vec<f64> = boxcar
            .radius
            .iter()
            .map(|r| 2f64 * (r - r_min) / (r_max - r_min) - 1f64)
            .collect();
        let vandermonde =
            na::DMatrix::from_fn(n, degree + 1, |i, j| legendre_polynomial(j, x_hat[i]));
        let rhs = na::DVector::from_column_slice(&boxcar.variable);
        let coefficients = vandermonde
            .svd(true, true)
            .solve(&rhs, f64::EPSILON)
            .map_err(|e| FilterError::LeastSquares(e.to_string()))?;
        let variable: Vec<f64> = x_hat
            .iter()
            .map(|&x| {
                coefficients
                    .iter()
                    .enumerate()
                    .map(|(k, c)| c * legendre_polynomial(k, x))
                    .sum()
            })
            .collect();
        Ok(Self {
            radius: boxcar.radius.clone(),
            variable,
            degree,
        })
    }
}

/// Legendre polynomial of the given order by the Bonnet recurrence
fn legendre_polynomial(order: usize, x: f64) -> f64 {
    match order {
        0 => 1f64,
        1 => x,
        _ => {
            let (mut p_prev, mut p) = (1f64, x);
            for k in 1..order {
                let p_next = ((2 * k + 1) as f64 * x * p - k as f64 * p_prev) / (k + 1) as f64;
                p_prev = p;
                p = p_next;
            }
            p
        }
    }
}

/// Zero-padded same-length moving average
pub fn smooth(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let window = window.max(1);
    (0..n)
        .map(|i| {
            let hi = i + (window - 1) / 2;
            let lo = hi as isize - (window as isize - 1);
            (lo..=hi as isize)
                .filter(|&j| j >= 0 && (j as usize) < n)
                .map(|j| data[j as usize])
                .sum::<f64>()
                / window as f64
        })
        .collect()
}

/// First four statistical moments of a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
}
impl Moments {
    pub fn new(data: &[f64]) -> Self {
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let central = |order: i32| -> f64 {
            data.iter().map(|x| (x - mean).powi(order)).sum::<f64>() / n
        };
        let variance = central(2);
        Self {
            mean,
            variance,
            skewness: central(3) / variance.powf(1.5),
            kurtosis: central(4) / (variance * variance) - 3f64,
        }
    }
}
impl std::fmt::Display for Moments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mean={:.3e}, var={:.3e}, skew={:.3}, kurt={:.3}",
            self.mean, self.variance, self.skewness, self.kurtosis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn boxcar_blocks_a_ramp() {
        let radius: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let variable: Vec<f64> = (0..10).map(|i| 2f64 * i as f64).collect();
        let boxcar = Boxcar::new(&radius, &variable, 2).unwrap();
        assert_eq!(boxcar.len(), 5);
        assert_abs_diff_eq!(boxcar.radius[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(boxcar.variable[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(boxcar.variable[4], 17.0, epsilon = 1e-12);
    }

    #[test]
    fn boxcar_window_must_fit() {
        let data = vec![1f64; 4];
        assert!(Boxcar::new(&data, &data, 5).is_err());
        assert!(Boxcar::new(&data, &data, 0).is_err());
    }

    #[test]
    fn legendre_reproduces_a_quadratic() {
        let radius: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let variable: Vec<f64> = radius.iter().map(|r| 1f64 + 2f64 * r + 3f64 * r * r).collect();
        let boxcar = Boxcar::new(&radius, &variable, 1).unwrap();
        let legendre = Legendre::fit(&boxcar, Some(2)).unwrap();
        for (fitted, exact) in legendre.variable.iter().zip(variable.iter()) {
            assert_abs_diff_eq!(fitted, exact, epsilon = 1e-8);
        }
    }

    #[test]
    fn legendre_polynomials() {
        assert_abs_diff_eq!(legendre_polynomial(2, 0.5), 0.5 * (3. * 0.25 - 1.));
        assert_abs_diff_eq!(legendre_polynomial(3, 0.5), 0.5 * (5. * 0.125 - 3. * 0.5));
        assert_abs_diff_eq!(legendre_polynomial(4, 1.0), 1.0);
    }

    #[test]
    fn smooth_keeps_the_interior_of_a_constant() {
        let data = vec![2f64; 11];
        let smoothed = smooth(&data, 3);
        for value in &smoothed[1..10] {
            assert_abs_diff_eq!(*value, 2f64, epsilon = 1e-12);
        }
        // zero-padded edges are damped
        assert!(smoothed[0] < 2f64);
    }

    #[test]
    fn moments_of_a_symmetric_series() {
        let data: Vec<f64> = (-50..=50).map(|i| i as f64).collect();
        let moments = Moments::new(&data);
        assert_abs_diff_eq!(moments.mean, 0f64, epsilon = 1e-12);
        assert_abs_diff_eq!(moments.skewness, 0f64, epsilon = 1e-12);
        assert!(moments.variance > 0f64);
    }
}
