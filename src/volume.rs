//! 3-D box probe fields
//!
//! The solver dumps volume extracts as flat Fortran unformatted files, one
//! per variable, together with a mapping file giving the (i, j, k) grid
//! indices of every node. Fields are scattered into `Array3` and reduced
//! under the frozen-flow hypothesis (statistics compressed along z).

use crate::fortran::{FortranError, FortranFile};
use ndarray::{Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::File, path::Path, time::Instant};

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("Failed to read the volume extract")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Fortran(#[from] FortranError),
    #[error("Volume field {0} is missing")]
    MissingField(String),
    #[error("Expected {expected} nodes, got {got}")]
    Nodes { expected: usize, got: usize },
    #[error("Mapping record of {0} integers, expected at least 3")]
    Mapping(usize),
    #[error("Mapping index ({0}, {1}, {2}) is out of bounds")]
    OutOfBounds(usize, usize, usize),
    #[error("Failed to read/write the pickle cache")]
    Pickle(#[from] serde_pickle::Error),
}
type Result<T> = std::result::Result<T, VolumeError>;

/// Node -> (i, j, k) scatter table
///
/// The mapping file holds one record of 4 integers per node; the first
/// three are the 0-based grid indices.
pub struct Mapping(Vec<[usize; 3]>);
impl Mapping {
    pub fn load<P: AsRef<Path>>(path: P, n_nodes: usize) -> Result<Self> {
        let mut fortran = FortranFile::open(path)?;
        let mut mapping = Vec::with_capacity(n_nodes);
        while let Some(record) = fortran.read_i32_record()? {
            if record.len() < 3 {
                return Err(VolumeError::Mapping(record.len()));
            }
            mapping.push([record[0] as usize, record[1] as usize, record[2] as usize]);
        }
        if mapping.len() != n_nodes {
            return Err(VolumeError::Nodes {
                expected: n_nodes,
                got: mapping.len(),
            });
        }
        Ok(Self(mapping))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Plane and axis means of a volume field, compressed along z first
/// (frozen-flow hypothesis)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanFields {
    pub xy: Array2<f64>,
    pub yz: Array2<f64>,
    pub xz: Array2<f64>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array1<f64>,
}
impl MeanFields {
    pub fn new(field: &Array3<f64>) -> Self {
        let xy = field.mean_axis(Axis(2)).unwrap();
        let yz = field.mean_axis(Axis(0)).unwrap();
        let xz = field.mean_axis(Axis(1)).unwrap();
        Self {
            x: xy.mean_axis(Axis(1)).unwrap(),
            y: yz.mean_axis(Axis(1)).unwrap(),
            z: xz.mean_axis(Axis(0)).unwrap(),
            xy,
            yz,
            xz,
        }
    }
}

/// Boundary-layer edge of a volume field: per (i, k) location and
/// z-compressed means
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeProperties {
    pub field: Array2<f64>,
    pub thickness: Array2<f64>,
    pub mean_field: Array1<f64>,
    pub mean_thickness: Array1<f64>,
}

/// Wall quantities and wall-unit profiles from the Van Driest analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VanDriest {
    pub y_plus: Array2<f64>,
    pub u_plus: Array2<f64>,
    /// Density-weighted Van Driest velocity
    pub u_vd_plus: Array2<f64>,
    pub mean_y_plus: Array1<f64>,
    pub mean_u_plus: Array1<f64>,
    pub mean_u_vd_plus: Array1<f64>,
    pub rho_wall: Array1<f64>,
    pub mu_wall: Array1<f64>,
    pub nu_wall: Array1<f64>,
    pub tau_wall: Array1<f64>,
    pub u_tau: Array1<f64>,
}

/// Volume extract loader
pub struct VolumeLoader {
    path: std::path::PathBuf,
    dimensions: (usize, usize, usize),
    scalars: Vec<String>,
}
impl Default for VolumeLoader {
    fn default() -> Self {
        Self {
            path: std::path::PathBuf::from("."),
            dimensions: (0, 0, 0),
            scalars: vec![],
        }
    }
}
impl VolumeLoader {
    pub fn data_path<P: Into<std::path::PathBuf>>(self, path: P) -> Self {
        Self {
            path: path.into(),
            ..self
        }
    }
    pub fn dimensions(self, nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            dimensions: (nx, ny, nz),
            ..self
        }
    }
    /// Scalar fields to load on top of the grid and the velocity
    pub fn scalars<S: Into<String>>(self, scalars: Vec<S>) -> Self {
        Self {
            scalars: scalars.into_iter().map(|s| s.into()).collect(),
            ..self
        }
    }
    /// Reads the mapping, the grid (`X,Y,Z`), the velocity (`Ux,Uy,Uz`) and
    /// the requested scalars from `<VAR>.dat` files
    pub fn load(self) -> Result<Volume> {
        let (nx, ny, nz) = self.dimensions;
        log::info!("Loading volume {:?}...", self.path);
        let now = Instant::now();
        let mapping = Mapping::load(self.path.join("mappingVector.dat"), nx * ny * nz)?;
        let mut volume = Volume::new(nx, ny, nz);
        let names: Vec<String> = ["X", "Y", "Z", "Ux", "Uy", "Uz"]
            .iter()
            .map(|s| s.to_string())
            .chain(self.scalars)
            .collect();
        for name in names {
            let mut fortran = FortranFile::open(self.path.join(format!("{}.dat", name)))?;
            let flat = fortran.read_f64_all()?;
            let field = volume.scatter(&flat, &mapping)?;
            volume.fields.insert(name, field);
        }
        log::info!("... loaded in {}s", now.elapsed().as_secs());
        Ok(volume)
    }
}

/// 3-D box probe extract
#[derive(Debug, Serialize, Deserialize)]
pub struct Volume {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub fields: BTreeMap<String, Array3<f64>>,
}
impl Volume {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            nx,
            ny,
            nz,
            fields: BTreeMap::new(),
        }
    }
    pub fn loader() -> VolumeLoader {
        VolumeLoader::default()
    }
    pub fn n_nodes(&self) -> usize {
        self.nx * self.ny * self.nz
    }
    pub fn field(&self, name: &str) -> Result<&Array3<f64>> {
        self.fields
            .get(name)
            .ok_or_else(|| VolumeError::MissingField(name.to_string()))
    }
    /// Scatters a flat node vector into a 3-D field through the mapping
    pub fn scatter(&self, flat: &[f64], mapping: &Mapping) -> Result<Array3<f64>> {
        if flat.len() != self.n_nodes() || mapping.len() != self.n_nodes() {
            return Err(VolumeError::Nodes {
                expected: self.n_nodes(),
                got: flat.len().min(mapping.len()),
            });
        }
        let mut field = Array3::zeros((self.nx, self.ny, self.nz));
        for (&value, &[i, j, k]) in flat.iter().zip(mapping.0.iter()) {
            if i >= self.nx || j >= self.ny || k >= self.nz {
                return Err(VolumeError::OutOfBounds(i, j, k));
            }
            field[[i, j, k]] = value;
        }
        Ok(field)
    }
    /// Derives the rotational fields from the velocity gradient tensor:
    /// vorticity components and magnitude, dilatation, enstrophy and
    /// velocity magnitude
    pub fn gradient_fields(&mut self) -> Result<&mut Self> {
        let g = |ij: &str| self.field(&format!("GRADV_{}", ij));
        let vort_x = 0.5 * (g("23")? - g("32")?);
        let vort_y = 0.5 * (g("31")? - g("13")?);
        let vort_z = 0.5 * (g("12")? - g("21")?);
        let dilatation = g("11")? + g("22")? + g("33")?;
        let vort_mag = (&vort_x * &vort_x + &vort_y * &vort_y + &vort_z * &vort_z)
            .mapv(f64::sqrt);
        let enstrophy = (&vort_mag * &vort_mag) * 2f64;
        let (ux, uy, uz) = (self.field("Ux")?, self.field("Uy")?, self.field("Uz")?);
        let u_mag = (ux * ux + uy * uy + uz * uz).mapv(f64::sqrt);
        let derived = [
            ("VORTX", vort_x),
            ("VORTY", vort_y),
            ("VORTZ", vort_z),
            ("VORTMAG", vort_mag),
            ("DIL", dilatation),
            ("ENSTROPHY", enstrophy),
            ("UMAG", u_mag),
        ];
        for (name, field) in derived {
            self.fields.insert(name.to_string(), field);
        }
        Ok(self)
    }
    pub fn mean_fields(&self, name: &str) -> Result<MeanFields> {
        Ok(MeanFields::new(self.field(name)?))
    }
    /// Reynolds decomposition under the frozen-flow hypothesis: subtracts
    /// the z-mean at every (i, j)
    pub fn fluctuation(&self, name: &str) -> Result<Array3<f64>> {
        let field = self.field(name)?;
        let mean = field.mean_axis(Axis(2)).unwrap();
        Ok(field - &mean.insert_axis(Axis(2)))
    }
    /// Boundary-layer edge at 99% of the freestream value
    ///
    /// `height` is the wall-normal coordinate field.
    pub fn edge_properties(
        &self,
        name: &str,
        height: &str,
        freestream: f64,
    ) -> Result<EdgeProperties> {
        let field = self.field(name)?;
        let height = self.field(height)?;
        let cut = 0.99 * freestream;
        let mut edge_field = Array2::zeros((self.nx, self.nz));
        let mut edge_thickness = Array2::zeros((self.nx, self.nz));
        for i in 0..self.nx {
            for k in 0..self.nz {
                let edge = (0..self.ny)
                    .min_by(|&a, &b| {
                        (field[[i, a, k]] - cut)
                            .abs()
                            .partial_cmp(&(field[[i, b, k]] - cut).abs())
                            .unwrap()
                    })
                    .unwrap();
                edge_field[[i, k]] = field[[i, edge, k]];
                edge_thickness[[i, k]] = height[[i, edge, k]];
            }
        }
        Ok(EdgeProperties {
            mean_field: edge_field.mean_axis(Axis(1)).unwrap(),
            mean_thickness: edge_thickness.mean_axis(Axis(1)).unwrap(),
            field: edge_field,
            thickness: edge_thickness,
        })
    }
    /// Wall (j = 0) slice of a field and its z-compressed mean
    pub fn wall_properties(&self, name: &str, height: &str) -> Result<EdgeProperties> {
        let field = self.field(name)?.index_axis(Axis(1), 0).to_owned();
        let thickness = self.field(height)?.index_axis(Axis(1), 0).to_owned();
        Ok(EdgeProperties {
            mean_field: field.mean_axis(Axis(1)).unwrap(),
            mean_thickness: thickness.mean_axis(Axis(1)).unwrap(),
            field,
            thickness,
        })
    }
    /// Reynolds-stress structure parameter
    /// `(2 (u'v' + v'w' + u'w') + k) / k`
    pub fn structure_parameter(&self) -> Result<Array3<f64>> {
        let u = self.fluctuation("Ux")?;
        let v = self.fluctuation("Uy")?;
        let w = self.fluctuation("Uz")?;
        let k = self.field("K")?;
        Ok(((&u * &v + &v * &w + &u * &w) * 2f64 + k) / k)
    }
    /// Van Driest analysis from the z-compressed plane means
    ///
    /// `s12` is the mean of the off-diagonal velocity gradient `GRADV_12`,
    /// `u` the mean streamwise velocity, `y` the mean wall-normal
    /// coordinate, `rho` and `mu` the mean density and viscosity.
    pub fn van_driest(
        &self,
        s12: &MeanFields,
        u: &MeanFields,
        y: &MeanFields,
        rho: &MeanFields,
        mu: &MeanFields,
    ) -> VanDriest {
        let rho_wall = rho.xy.index_axis(Axis(1), 0).to_owned();
        let mu_wall = mu.xy.index_axis(Axis(1), 0).to_owned();
        let nu_wall = &mu_wall / &rho_wall;
        let tau_wall = Array1::from_shape_fn(self.nx, |i| -mu_wall[i] * s12.xy[[i, 0]]);
        let u_tau = (&tau_wall / &rho_wall).mapv(f64::abs).mapv(f64::sqrt);
        let mut y_plus = Array2::zeros((self.nx, self.ny));
        let mut u_plus = Array2::zeros((self.nx, self.ny));
        let mut u_vd_plus = Array2::zeros((self.nx, self.ny));
        for i in 0..self.nx {
            for j in 0..self.ny {
                y_plus[[i, j]] = u_tau[i] * y.xy[[i, j]] / nu_wall[i];
                u_plus[[i, j]] = u.xy[[i, j]] / u_tau[i];
            }
            // density-weighted Van Driest velocity, cumulative trapezoid
            for j in 1..self.ny {
                let weight = 0.5
                    * ((rho.xy[[i, j]] / rho_wall[i]).sqrt()
                        + (rho.xy[[i, j - 1]] / rho_wall[i]).sqrt());
                u_vd_plus[[i, j]] =
                    u_vd_plus[[i, j - 1]] + weight * (u_plus[[i, j]] - u_plus[[i, j - 1]]);
            }
        }
        VanDriest {
            mean_y_plus: y_plus.mean_axis(Axis(0)).unwrap(),
            mean_u_plus: u_plus.mean_axis(Axis(0)).unwrap(),
            mean_u_vd_plus: u_vd_plus.mean_axis(Axis(0)).unwrap(),
            y_plus,
            u_plus,
            u_vd_plus,
            rho_wall,
            mu_wall,
            nu_wall,
            tau_wall,
            u_tau,
        }
    }
    /// Caches the volume to a pickle file
    pub fn to_pickle<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, self, Default::default())?;
        Ok(())
    }
    /// Restores a volume from its pickle cache
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(serde_pickle::from_reader(&mut file, Default::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp_volume() -> Volume {
        // f(i, j, k) = 100 i + 10 j + k
        let mut volume = Volume::new(3, 4, 5);
        let field = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| {
            100. * i as f64 + 10. * j as f64 + k as f64
        });
        volume.fields.insert("F".to_string(), field);
        volume
    }

    #[test]
    fn mean_fields_of_a_ramp() {
        let volume = ramp_volume();
        let means = volume.mean_fields("F").unwrap();
        // z-mean at (i, j) is 100 i + 10 j + 2
        assert_abs_diff_eq!(means.xy[[1, 2]], 122f64, epsilon = 1e-12);
        // x profile: 100 i + 15 + 2
        assert_abs_diff_eq!(means.x[1], 117f64, epsilon = 1e-12);
        assert_eq!(means.yz.dim(), (4, 5));
        assert_eq!(means.z.len(), 5);
    }

    #[test]
    fn fluctuation_removes_the_z_mean() {
        let volume = ramp_volume();
        let fluctuation = volume.fluctuation("F").unwrap();
        // f - mean_z = k - 2
        assert_abs_diff_eq!(fluctuation[[2, 3, 0]], -2f64, epsilon = 1e-12);
        assert_abs_diff_eq!(fluctuation[[0, 0, 4]], 2f64, epsilon = 1e-12);
    }

    #[test]
    fn scatter_through_the_identity_mapping() {
        let volume = Volume::new(2, 2, 2);
        let mapping = Mapping(
            (0..8)
                .map(|n| [(n >> 2) & 1, (n >> 1) & 1, n & 1])
                .collect(),
        );
        let flat: Vec<f64> = (0..8).map(|n| n as f64).collect();
        let field = volume.scatter(&flat, &mapping).unwrap();
        assert_abs_diff_eq!(field[[1, 0, 1]], 5f64, epsilon = 1e-12);
        assert_abs_diff_eq!(field[[0, 1, 0]], 2f64, epsilon = 1e-12);
    }

    #[test]
    fn scatter_checks_the_node_count() {
        let volume = Volume::new(2, 2, 2);
        let mapping = Mapping(vec![[0, 0, 0]; 8]);
        assert!(volume.scatter(&[0f64; 7], &mapping).is_err());
    }

    #[test]
    fn gradient_fields_from_a_rigid_rotation() {
        // u = (-y, x, 0): GRADV_12 = -1, GRADV_21 = 1, all else 0
        let mut volume = Volume::new(2, 2, 2);
        let zeros = Array3::zeros((2, 2, 2));
        for ij in ["11", "13", "22", "23", "31", "32", "33"] {
            volume
                .fields
                .insert(format!("GRADV_{}", ij), zeros.clone());
        }
        volume
            .fields
            .insert("GRADV_12".to_string(), Array3::from_elem((2, 2, 2), -1f64));
        volume
            .fields
            .insert("GRADV_21".to_string(), Array3::from_elem((2, 2, 2), 1f64));
        for name in ["Ux", "Uy", "Uz"] {
            volume.fields.insert(name.to_string(), zeros.clone());
        }
        volume.gradient_fields().unwrap();
        assert_abs_diff_eq!(
            volume.field("VORTZ").unwrap()[[0, 0, 0]],
            -1f64,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            volume.field("VORTMAG").unwrap()[[1, 1, 1]],
            1f64,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            volume.field("ENSTROPHY").unwrap()[[0, 1, 0]],
            2f64,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(volume.field("DIL").unwrap()[[0, 0, 1]], 0f64, epsilon = 1e-12);
    }

    #[test]
    fn edge_of_a_linear_profile() {
        let mut volume = Volume::new(2, 11, 2);
        let field = Array3::from_shape_fn((2, 11, 2), |(_, j, _)| 250. * j as f64);
        let height = Array3::from_shape_fn((2, 11, 2), |(_, j, _)| 1e-3 * j as f64);
        volume.fields.insert("U".to_string(), field);
        volume.fields.insert("Y".to_string(), height);
        let edge = volume.edge_properties("U", "Y", 2500.).unwrap();
        // 0.99 * 2500 = 2475, closest sample is j = 10
        assert_abs_diff_eq!(edge.mean_field[0], 2500f64, epsilon = 1e-12);
        assert_abs_diff_eq!(edge.mean_thickness[0], 1e-2, epsilon = 1e-12);
        let wall = volume.wall_properties("U", "Y").unwrap();
        assert_abs_diff_eq!(wall.mean_field[0], 0f64, epsilon = 1e-12);
    }

    #[test]
    fn van_driest_wall_scaling() {
        let volume = Volume::new(2, 3, 2);
        let xy = |f: fn(usize, usize) -> f64| Array2::from_shape_fn((2, 3), |(i, j)| f(i, j));
        let means = |field: Array2<f64>| MeanFields {
            x: field.mean_axis(Axis(1)).unwrap(),
            y: field.mean_axis(Axis(0)).unwrap(),
            z: Array1::zeros(2),
            yz: Array2::zeros((3, 2)),
            xz: Array2::zeros((2, 2)),
            xy: field,
        };
        let s12 = means(xy(|_, _| -1e4));
        let u = means(xy(|_, j| 500. * j as f64));
        let y = means(xy(|_, j| 1e-4 * j as f64));
        let rho = means(xy(|_, _| 0.05));
        let mu = means(xy(|_, _| 1.8e-5));
        let vd = volume.van_driest(&s12, &u, &y, &rho, &mu);
        let tau = 1.8e-5 * 1e4;
        assert_abs_diff_eq!(vd.tau_wall[0], tau, epsilon = 1e-12);
        assert_abs_diff_eq!(vd.u_tau[0], (tau / 0.05f64).sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(vd.mean_u_plus[1], 500. / vd.u_tau[0], epsilon = 1e-9);
        // uniform density: the Van Driest velocity collapses onto u+
        assert_abs_diff_eq!(vd.mean_u_vd_plus[2], vd.mean_u_plus[2], epsilon = 1e-9);
        assert!(vd.y_plus[[0, 2]] > vd.y_plus[[0, 1]]);
    }
}
