//! Terrain shadow casting over a triangulated surface.
//!
//! One invocation runs four stages in sequence, each a fork-join region:
//! rotate vertices into the sun frame, bin faces into a grid over the rotated
//! extent, test occlusion inside every cell, then restore coordinates and
//! publish `shadowed` / `z_prime` per face.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;

use rayon::prelude::*;

#[cfg(feature = "python")]
use ndarray::Array1;
#[cfg(feature = "python")]
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray2};
#[cfg(feature = "python")]
use pyo3::prelude::*;

use crate::config::ShadowConfig;
use crate::error::ShadowError;
use crate::frame::RotatedMesh;
use crate::grid::Grid;
use crate::mesh::Mesh;
use crate::occlusion::{evaluate_grid, face_frames, OcclusionParams};
use crate::sun::{SunFrame, SunPosition};

/// Per-face shadow indicator (1.0 shadowed, 0.0 lit).
pub const SHADOWED: &str = "shadowed";
/// Per-face centroid elevation in the sun frame.
pub const Z_PRIME: &str = "z_prime";

/// Outcome of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowSummary {
    pub faces: usize,
    pub shadowed: usize,
    /// Grid cells evaluated; zero when the run short-circuited.
    pub cells: usize,
    pub below_horizon: bool,
}

/// Compute terrain shadows for one timestep and write them into the mesh's
/// per-face variables.
///
/// On any error the mesh keeps its original vertex coordinates and no
/// outputs are written.
pub fn compute_terrain_shadows(
    mesh: &mut Mesh,
    sun: SunPosition,
    config: &ShadowConfig,
    progress: Option<Arc<AtomicUsize>>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<ShadowSummary, ShadowError> {
    config.validate()?;
    let n = mesh.num_faces();

    if sun.is_below(config.min_sun_elevation_deg) {
        log::info!(
            "Sun elevation {:.2} below {:.2} degrees; all {} faces unshadowed",
            sun.elevation_deg,
            config.min_sun_elevation_deg,
            n
        );
        publish(mesh, &vec![false; n], &vec![0.0; n])?;
        return Ok(ShadowSummary {
            faces: n,
            shadowed: 0,
            cells: 0,
            below_horizon: true,
        });
    }
    if n == 0 {
        return Ok(ShadowSummary {
            faces: 0,
            shadowed: 0,
            cells: 0,
            below_horizon: false,
        });
    }

    let sun_frame = SunFrame::new(sun);
    let rotated = RotatedMesh::rotate(mesh, &sun_frame);

    let frames = face_frames(rotated.mesh());
    let mut grid = Grid::build(
        rotated.mesh(),
        config.rows,
        config.cols,
        config.bounds_padding,
    )?;
    let params = OcclusionParams {
        height_tolerance: config.height_tolerance,
        contact_tolerance: config.contact_tolerance,
    };
    let flags = match evaluate_grid(
        &mut grid,
        &frames,
        params,
        progress.as_deref(),
        cancel.as_deref(),
    ) {
        Ok(flags) => flags,
        Err(err) => {
            log::warn!("Terrain shadow run aborted: {err}");
            return Err(err);
        }
    };

    rotated.finish()?;

    if flags.len() != n {
        return Err(ShadowError::MissingFaceState { face: flags.len().min(n) });
    }
    let shadowed = flags.into_vec();
    let z_prime: Vec<f64> = frames.iter().map(|f| f.z).collect();
    publish(mesh, &shadowed, &z_prime)?;

    let summary = ShadowSummary {
        faces: n,
        shadowed: shadowed.iter().filter(|&&s| s).count(),
        cells: grid.cells().len(),
        below_horizon: false,
    };
    log::debug!(
        "Terrain shadows: {} of {} faces shadowed over {} cells",
        summary.shadowed,
        summary.faces,
        summary.cells
    );
    Ok(summary)
}

/// Write per-face outcomes into the variable store.
fn publish(mesh: &mut Mesh, shadowed: &[bool], z_prime: &[f64]) -> Result<(), ShadowError> {
    let n = mesh.num_faces();
    if shadowed.len() != n {
        return Err(ShadowError::MissingFaceState {
            face: shadowed.len().min(n),
        });
    }
    if z_prime.len() != n {
        return Err(ShadowError::MissingFaceState {
            face: z_prime.len().min(n),
        });
    }
    let vars = mesh.variables_mut();
    vars.column_mut(SHADOWED)
        .par_iter_mut()
        .zip(shadowed.par_iter())
        .for_each(|(dst, &s)| *dst = if s { 1.0 } else { 0.0 });
    vars.column_mut(Z_PRIME).copy_from_slice(z_prime);
    Ok(())
}

/// The terrain shadow simulation module.
#[derive(Debug, Clone)]
pub struct TerrainShadow {
    id: String,
    config: ShadowConfig,
}

impl TerrainShadow {
    pub fn new(id: impl Into<String>, config: ShadowConfig) -> Result<Self, ShadowError> {
        config.validate()?;
        let id = id.into();
        log::debug!("Successfully instantiated module {id}");
        Ok(Self { id, config })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Per-face variables this module writes.
    pub fn provides(&self) -> &'static [&'static str] {
        &[SHADOWED, Z_PRIME]
    }

    pub fn run(&self, mesh: &mut Mesh, sun: SunPosition) -> Result<ShadowSummary, ShadowError> {
        compute_terrain_shadows(mesh, sun, &self.config, None, None)
    }
}

#[cfg(feature = "python")]
fn mesh_from_py(
    vertices: &PyReadonlyArray2<f64>,
    triangles: &PyReadonlyArray2<u64>,
) -> Result<Mesh, ShadowError> {
    let tris = triangles.as_array().mapv(|v| v as usize);
    Mesh::from_arrays(vertices.as_array(), tris.view())
}

#[cfg(feature = "python")]
type ShadowArrays = (Py<PyArray1<f64>>, Py<PyArray1<f64>>);

#[cfg(feature = "python")]
fn outputs_into_py(py: Python<'_>, mesh: &Mesh) -> ShadowArrays {
    let column = |key: &str| {
        mesh.variables()
            .column(key)
            .map(|c| Array1::from(c.to_vec()))
            .unwrap_or_else(|| Array1::zeros(mesh.num_faces()))
    };
    (
        column(SHADOWED).into_pyarray(py).unbind(),
        column(Z_PRIME).into_pyarray(py).unbind(),
    )
}

#[cfg(feature = "python")]
fn py_config(rows: usize, cols: usize, min_sun_elevation_deg: f64) -> ShadowConfig {
    ShadowConfig {
        min_sun_elevation_deg,
        ..ShadowConfig::with_grid(rows, cols)
    }
}

/// Compute per-face terrain shadows.
///
/// Args:
///     vertices: (n, 3) float64 vertex coordinates.
///     triangles: (m, 3) uint64 vertex indices.
///     azimuth_deg, elevation_deg: solar position in degrees.
///     rows, cols: grid resolution.
///     min_sun_elevation_deg: elevation below which nothing is shadowed.
///
/// Returns:
///     (shadowed, z_prime), each of shape (m,).
#[cfg(feature = "python")]
#[pyfunction(name = "compute_terrain_shadows")]
#[pyo3(signature = (vertices, triangles, azimuth_deg, elevation_deg, rows=5, cols=5, min_sun_elevation_deg=5.0))]
#[allow(clippy::too_many_arguments)]
pub fn compute_terrain_shadows_py(
    py: Python<'_>,
    vertices: PyReadonlyArray2<f64>,
    triangles: PyReadonlyArray2<u64>,
    azimuth_deg: f64,
    elevation_deg: f64,
    rows: usize,
    cols: usize,
    min_sun_elevation_deg: f64,
) -> PyResult<ShadowArrays> {
    let mut mesh = mesh_from_py(&vertices, &triangles)?;
    let config = py_config(rows, cols, min_sun_elevation_deg);
    let sun = SunPosition::new(azimuth_deg, elevation_deg);

    py.allow_threads(|| compute_terrain_shadows(&mut mesh, sun, &config, None, None))?;
    Ok(outputs_into_py(py, &mesh))
}

/// Runner that exposes pollable progress() and cancel() for a shadow run.
///
/// Usage from Python:
///   runner = TerrainShadowRunner()
///   # launch runner.compute(...) in a thread
///   # poll runner.progress() for the number of grid cells evaluated
///   # call runner.cancel() to stop at the next cell boundary
#[cfg(feature = "python")]
#[pyclass]
pub struct TerrainShadowRunner {
    progress: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

#[cfg(feature = "python")]
impl Default for TerrainShadowRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl TerrainShadowRunner {
    #[new]
    pub fn new() -> Self {
        Self {
            progress: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Grid cells evaluated so far.
    pub fn progress(&self) -> usize {
        self.progress.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Compute shadows, releasing the GIL so progress()/cancel() can be called.
    #[pyo3(signature = (vertices, triangles, azimuth_deg, elevation_deg, rows=5, cols=5, min_sun_elevation_deg=5.0))]
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        py: Python<'_>,
        vertices: PyReadonlyArray2<f64>,
        triangles: PyReadonlyArray2<u64>,
        azimuth_deg: f64,
        elevation_deg: f64,
        rows: usize,
        cols: usize,
        min_sun_elevation_deg: f64,
    ) -> PyResult<ShadowArrays> {
        self.progress.store(0, std::sync::atomic::Ordering::Relaxed);
        self.cancelled
            .store(false, std::sync::atomic::Ordering::Relaxed);

        let mut mesh = mesh_from_py(&vertices, &triangles)?;
        let config = py_config(rows, cols, min_sun_elevation_deg);
        let sun = SunPosition::new(azimuth_deg, elevation_deg);
        let counter = Some(self.progress.clone());
        let cancel = Some(self.cancelled.clone());

        py.allow_threads(|| compute_terrain_shadows(&mut mesh, sun, &config, counter, cancel))?;
        Ok(outputs_into_py(py, &mesh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use std::sync::atomic::Ordering;

    fn shadow_flags(mesh: &Mesh) -> Vec<f64> {
        mesh.variables().column(SHADOWED).unwrap().to_vec()
    }

    fn z_primes(mesh: &Mesh) -> Vec<f64> {
        mesh.variables().column(Z_PRIME).unwrap().to_vec()
    }

    /// Rolling terrain on an `n x n` lattice with spacing 10.
    fn terrain(n: usize) -> Mesh {
        let mut v = Array2::<f64>::zeros(((n + 1) * (n + 1), 3));
        for i in 0..=n {
            for j in 0..=n {
                let k = i * (n + 1) + j;
                let (x, y) = (j as f64 * 10.0, i as f64 * 10.0);
                v[[k, 0]] = x;
                v[[k, 1]] = y;
                v[[k, 2]] = 40.0 * (x / 35.0).sin() * (y / 27.0).cos() + 0.3 * x;
            }
        }
        let mut tris = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let a = i * (n + 1) + j;
                let b = a + 1;
                let c = a + n + 1;
                let d = c + 1;
                tris.push([a, b, c]);
                tris.push([b, d, c]);
            }
        }
        Mesh::new(v, tris).unwrap()
    }

    /// Two faces sharing the edge (0,0)-(1,0); a steep face to the south
    /// folds over a flat face to the north when seen from a southern sun.
    fn ridge() -> Mesh {
        let v = array![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.5, -0.5, 3.0],
            [0.5, 1.0, 0.0]
        ];
        Mesh::new(v, vec![[0, 1, 2], [0, 1, 3]]).unwrap()
    }

    #[test]
    fn test_shared_edge_ridge_shadows_lower_face() {
        let mut mesh = ridge();
        let summary = TerrainShadow::new("shadows", ShadowConfig::default())
            .unwrap()
            .run(&mut mesh, SunPosition::new(180.0, 45.0))
            .unwrap();
        assert_eq!(shadow_flags(&mesh), vec![0.0, 1.0]);
        assert_eq!(summary.shadowed, 1);
        assert_eq!(summary.cells, 25);
        let z = z_primes(&mesh);
        assert!(z[0] > z[1]);
        assert_abs_diff_eq!(z[0], 3.5 / 2.0_f64.sqrt() / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_occluder_directly_above() {
        let v = array![
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [0.0, 4.0, 0.0],
            [0.0, 0.0, 10.0],
            [4.0, 0.0, 10.0],
            [0.0, 4.0, 10.0]
        ];
        let mut mesh = Mesh::new(v, vec![[3, 4, 5], [0, 1, 2]]).unwrap();
        compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(37.0, 90.0),
            &ShadowConfig::default(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(shadow_flags(&mesh), vec![0.0, 1.0]);
    }

    #[test]
    fn test_restoration_is_bit_identical() {
        let mut mesh = terrain(12);
        let before = mesh.vertices().clone();
        for &(az, el) in &[(180.0, 45.0), (95.0, 12.0), (271.5, 63.0), (10.0, 2.0)] {
            compute_terrain_shadows(
                &mut mesh,
                SunPosition::new(az, el),
                &ShadowConfig::default(),
                None,
                None,
            )
            .unwrap();
            assert_eq!(mesh.vertices(), &before);
        }
    }

    #[test]
    fn test_low_sun_leaves_everything_lit() {
        for az in [0.0, 90.0, 180.0, 333.0] {
            let mut mesh = terrain(6);
            let summary = compute_terrain_shadows(
                &mut mesh,
                SunPosition::new(az, 4.99),
                &ShadowConfig::default(),
                None,
                None,
            )
            .unwrap();
            assert!(summary.below_horizon);
            assert!(shadow_flags(&mesh).iter().all(|&s| s == 0.0));
            assert!(z_primes(&mesh).iter().all(|&z| z == 0.0));
        }
    }

    #[test]
    fn test_flat_mesh_under_zenith_sun_is_lit() {
        let mut mesh = terrain(8);
        let flat: Vec<[f64; 3]> = (0..mesh.num_vertices())
            .map(|i| [mesh.vertex(i)[0], mesh.vertex(i)[1], 7.0])
            .collect();
        for (i, p) in flat.into_iter().enumerate() {
            mesh.set_vertex(i, p);
        }
        compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(180.0, 90.0),
            &ShadowConfig::with_grid(3, 3),
            None,
            None,
        )
        .unwrap();
        assert!(shadow_flags(&mesh).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_flat_mesh_under_oblique_sun_is_lit() {
        let mut mesh = terrain(8);
        for i in 0..mesh.num_vertices() {
            let (x, y) = (mesh.vertex(i)[0], mesh.vertex(i)[1]);
            mesh.set_vertex(i, [x, y, 0.0]);
        }
        compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(225.0, 20.0),
            &ShadowConfig::default(),
            None,
            None,
        )
        .unwrap();
        assert!(shadow_flags(&mesh).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let config = ShadowConfig::with_grid(4, 6);
        let sun = SunPosition::new(160.0, 18.0);
        let mut a = terrain(14);
        let mut b = terrain(14);
        compute_terrain_shadows(&mut a, sun, &config, None, None).unwrap();
        compute_terrain_shadows(&mut b, sun, &config, None, None).unwrap();
        compute_terrain_shadows(&mut b, sun, &config, None, None).unwrap();
        assert_eq!(shadow_flags(&a), shadow_flags(&b));
        assert_eq!(z_primes(&a), z_primes(&b));
        assert!(shadow_flags(&a).iter().any(|&s| s == 1.0));
    }

    #[test]
    fn test_zero_grid_is_configuration_error() {
        let mut mesh = ridge();
        let before = mesh.vertices().clone();
        let result = compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(180.0, 45.0),
            &ShadowConfig::with_grid(0, 5),
            None,
            None,
        );
        assert!(matches!(result, Err(ShadowError::InvalidGrid { .. })));
        assert_eq!(mesh.vertices(), &before);
        assert!(!mesh.variables().has(SHADOWED));
    }

    #[test]
    fn test_cancelled_run_restores_and_publishes_nothing() {
        let mut mesh = terrain(10);
        let before = mesh.vertices().clone();
        let cancel = Arc::new(AtomicBool::new(true));
        let progress = Arc::new(AtomicUsize::new(0));
        let result = compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(200.0, 30.0),
            &ShadowConfig::default(),
            Some(progress.clone()),
            Some(cancel),
        );
        assert!(matches!(result, Err(ShadowError::Cancelled)));
        assert_eq!(mesh.vertices(), &before);
        assert!(!mesh.variables().has(Z_PRIME));
        assert_eq!(progress.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_progress_reports_every_cell() {
        let mut mesh = terrain(6);
        let progress = Arc::new(AtomicUsize::new(0));
        compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(120.0, 40.0),
            &ShadowConfig::with_grid(3, 4),
            Some(progress.clone()),
            None,
        )
        .unwrap();
        assert_eq!(progress.load(Ordering::Relaxed), 12);
    }

    #[test]
    fn test_module_provides_outputs() {
        let module = TerrainShadow::new("terrain_shadow", ShadowConfig::default()).unwrap();
        assert_eq!(module.id(), "terrain_shadow");
        assert_eq!(module.provides(), &["shadowed", "z_prime"]);
        assert!(TerrainShadow::new("bad", ShadowConfig::with_grid(5, 0)).is_err());
    }

    #[test]
    fn test_empty_mesh() {
        let mut mesh = Mesh::new(Array2::zeros((0, 3)), Vec::new()).unwrap();
        let summary = compute_terrain_shadows(
            &mut mesh,
            SunPosition::new(180.0, 45.0),
            &ShadowConfig::default(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(summary.faces, 0);
    }
}
