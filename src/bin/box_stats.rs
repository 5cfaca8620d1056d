//! Volume ("box") probe analysis
//!
//! Reads the Fortran unformatted box extract (or its pickle cache), derives
//! the rotational fields, maps the boundary-layer edge and renders the
//! contour, boundary-layer growth and Van Driest figures.

use ndarray::Axis;
use parse_probes::{plot, sutherland, Volume};
use std::{fs::create_dir_all, path::PathBuf};
use structopt::StructOpt;

const SCALARS: [&str; 14] = [
    "T",
    "RHO",
    "P",
    "RHOE",
    "GRADRHOMAG",
    "GRADV_11",
    "GRADV_12",
    "GRADV_13",
    "GRADV_21",
    "GRADV_22",
    "GRADV_23",
    "GRADV_31",
    "GRADV_32",
    "GRADV_33",
];

#[derive(Debug, StructOpt)]
#[structopt(name = "box-stats", about = "Volume probe statistics and figures")]
struct Opt {
    /// Path to the box extract
    #[structopt(long, default_value = ".")]
    path: PathBuf,
    /// Report directory
    #[structopt(long, default_value = "report")]
    report: PathBuf,
    /// Grid dimensions
    #[structopt(long, default_value = "1439")]
    nx: usize,
    #[structopt(long, default_value = "85")]
    ny: usize,
    #[structopt(long, default_value = "638")]
    nz: usize,
    /// Freestream velocity [m/s]
    #[structopt(long, default_value = "2500")]
    velocity: f64,
    /// Freestream temperature [K]
    #[structopt(long, default_value = "1200")]
    temperature: f64,
    /// Wall-parallel slice index of the contour maps
    #[structopt(long, default_value = "20")]
    slice: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    create_dir_all(&opt.report)?;

    let cache = opt.path.join("volume.pkl");
    let mut volume = if cache.is_file() {
        log::info!("Restoring the volume from {:?}", cache);
        Volume::from_pickle(&cache)?
    } else {
        let volume = Volume::loader()
            .data_path(&opt.path)
            .dimensions(opt.nx, opt.ny, opt.nz)
            .scalars(SCALARS.to_vec())
            .load()?;
        volume.to_pickle(&cache)?;
        volume
    };
    volume.gradient_fields()?;

    // contour maps at a wall-parallel slice
    for name in ["RHO", "T", "Ux", "VORTMAG"] {
        let slice = volume
            .field(name)?
            .index_axis(Axis(1), opt.slice.min(opt.ny - 1))
            .to_owned();
        plot::heatmap(
            &slice,
            name,
            opt.report
                .join(format!("contour_{}.png", name))
                .to_str()
                .unwrap(),
        );
    }

    // boundary-layer growth along the plate
    let velocity_edge = volume.edge_properties("Ux", "Y", opt.velocity)?;
    let temperature_edge = volume.edge_properties("T", "Y", opt.temperature)?;
    let x_mean = volume.mean_fields("X")?.x;
    plot::boundary_layer_growth(
        x_mean.as_slice().unwrap(),
        velocity_edge.mean_thickness.as_slice().unwrap(),
        temperature_edge.mean_thickness.as_slice().unwrap(),
        50,
        opt.report.join("boundary_layers.png").to_str().unwrap(),
    );

    // Van Driest transform from the plane means
    let mu = volume.field("T")?.mapv(sutherland);
    volume.fields.insert("MU".to_string(), mu);
    let van_driest = volume.van_driest(
        &volume.mean_fields("GRADV_12")?,
        &volume.mean_fields("Ux")?,
        &volume.mean_fields("Y")?,
        &volume.mean_fields("RHO")?,
        &volume.mean_fields("MU")?,
    );
    plot::van_driest(
        van_driest.mean_y_plus.as_slice().unwrap(),
        van_driest.mean_u_plus.as_slice().unwrap(),
        van_driest.mean_u_vd_plus.as_slice().unwrap(),
        opt.report.join("van_driest.png").to_str().unwrap(),
    );

    // Reynolds-stress structure parameter, when the turbulent kinetic
    // energy was extracted
    if volume.fields.contains_key("K") {
        let structure = volume.structure_parameter()?;
        let slice = structure
            .index_axis(Axis(1), opt.slice.min(opt.ny - 1))
            .to_owned();
        plot::heatmap(
            &slice,
            "RSSP",
            opt.report.join("contour_RSSP.png").to_str().unwrap(),
        );
    }

    Ok(())
}
