use crate::{
    filters::FilterError, fortran::FortranError, line::LineError, locations::LocationError,
    probe::ProbeError, scales::ScalesError, volume::VolumeError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `fortran` module")]
    Fortran(#[from] FortranError),
    #[error("Error in the `scales` module")]
    Scales(#[from] ScalesError),
    #[error("Error in the `filters` module")]
    Filter(#[from] FilterError),
    #[error("Error in the `probe` module")]
    Probe(#[from] ProbeError),
    #[error("Error in the `line` module")]
    Line(#[from] LineError),
    #[error("Error in the `volume` module")]
    Volume(#[from] VolumeError),
    #[error("Error in the `locations` module")]
    Location(#[from] LocationError),
}
