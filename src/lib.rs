//! Turbulent boundary layer CFD probes post-processing
//!
//! The crate turns the raw extracts of a compressible flow solver (point
//! probes, wall-normal line extractions and Fortran unformatted volume
//! probes) into statistical summaries: means and fluctuations, statistical
//! moments, autocorrelation functions, Taylor and integral length scales,
//! spectral densities and their cutoff wavenumber, boundary-layer thickness
//! and wall-shear quantities. The cutoff parameterizes the boxcar and
//! Legendre smoothing filters applied before plotting.
//!
//! Extracts are parsed with builder loaders, e.g.:
//!
//! ```no_run
//! use parse_probes::ProbeData;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut probe = ProbeData::loader()
//!     .data_path("data/probes")
//!     .probe("p34")
//!     .start_time(0.5)
//!     .load()?;
//! probe.derive_variables();
//! let scales = probe.series("U-X", 40)?.length_scales()?;
//! println!("{scales}");
//! # Ok(())
//! # }
//! ```

use std::{fmt, fs::File, io::Read, path::Path};

pub mod error;
pub mod filters;
pub mod fortran;
pub mod line;
pub mod locations;
#[cfg(feature = "plot")]
pub mod plot;
pub mod probe;
pub mod scales;
pub mod volume;

pub use error::Error;
pub use filters::{smooth, Boxcar, Legendre, Moments};
pub use fortran::FortranFile;
pub use line::{boundary_layer, wall_units, BoundaryLayer, LineAxis, LineData, LineLoader};
pub use locations::{repo_path, LineCuts, ProbePoints};
pub use probe::{ProbeData, ProbeLoader};
pub use scales::{simpson, spectral_cutoff, Autocorrelation, LengthScales, Series, Spectrum};
pub use volume::{MeanFields, Volume, VolumeLoader};

use strum_macros::EnumIter;

/// The flow variables of an extract
///
/// `Display` renders the solver column names, e.g. `U-X` or `P-DIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter)]
pub enum Variable {
    VelocityX,
    VelocityY,
    VelocityZ,
    Pressure,
    Temperature,
    Density,
    Dilatation,
    PressureDilatation,
    DynamicViscosity,
    KinematicViscosity,
}
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Variable::*;
        match self {
            VelocityX => write!(f, "U-X"),
            VelocityY => write!(f, "U-Y"),
            VelocityZ => write!(f, "U-Z"),
            Pressure => write!(f, "P"),
            Temperature => write!(f, "T"),
            Density => write!(f, "RHO"),
            Dilatation => write!(f, "DIL"),
            PressureDilatation => write!(f, "P-DIL"),
            DynamicViscosity => write!(f, "MU"),
            KinematicViscosity => write!(f, "NU"),
        }
    }
}

/// Sutherland's law dynamic viscosity [Pa.s]
pub fn sutherland(temperature: f64) -> f64 {
    const MU_REF: f64 = 1.716e-5;
    const T_REF: f64 = 273.15;
    const S: f64 = 110.4;
    MU_REF * (temperature / T_REF).powf(1.5) * (T_REF + S) / (temperature + S)
}

/// Reads a CSV extract, decompressing `<stem>.csv.gz` when present and
/// falling back to the plain `<stem>.csv`
pub(crate) fn csv_contents(stem: &Path) -> std::io::Result<String> {
    let gz_path = stem.with_extension("csv.gz");
    if gz_path.is_file() {
        let mut contents = String::new();
        flate2::read::GzDecoder::new(File::open(&gz_path)?).read_to_string(&mut contents)?;
        Ok(contents)
    } else {
        std::fs::read_to_string(stem.with_extension("csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn sutherland_at_the_reference_temperature() {
        assert_abs_diff_eq!(sutherland(273.15), 1.716e-5, epsilon = 1e-12);
        assert!(sutherland(1200.) > sutherland(300.));
    }

    #[test]
    fn variable_names() {
        assert_eq!(Variable::VelocityX.to_string(), "U-X");
        assert_eq!(Variable::PressureDilatation.to_string(), "P-DIL");
        assert_eq!(Variable::iter().count(), 10);
    }
}
