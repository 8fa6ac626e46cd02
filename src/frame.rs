//! Scoped rotation of mesh vertices into the sun frame.
//!
//! [`RotatedMesh`] rotates every vertex referenced by at least one face and
//! restores the original coordinates when finished or dropped, so no exit
//! path leaves the mesh rotated.

use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::{Array1, Array2, Zip};
use rayon::prelude::*;

use crate::error::ShadowError;
use crate::mesh::Mesh;
use crate::sun::SunFrame;

/// Engine-owned per-vertex record for one invocation.
#[derive(Debug, Clone)]
pub struct VertexFrameState {
    pub visited: Array1<bool>,
    pub original: Array2<f64>,
    pub rotated: Array2<f64>,
}

impl VertexFrameState {
    fn new(n: usize) -> Self {
        Self {
            visited: Array1::from_elem(n, false),
            original: Array2::zeros((n, 3)),
            rotated: Array2::zeros((n, 3)),
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|&&v| v).count()
    }
}

pub struct RotatedMesh<'a> {
    mesh: &'a mut Mesh,
    state: VertexFrameState,
    restored: bool,
}

impl<'a> RotatedMesh<'a> {
    /// Rotate each face-referenced vertex exactly once.
    ///
    /// Vertices are partitioned across workers rather than reached through
    /// their faces, so the visited check-and-set never races.
    pub fn rotate(mesh: &'a mut Mesh, frame: &SunFrame) -> Self {
        let n = mesh.num_vertices();
        let referenced: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();
        mesh.faces().par_iter().for_each(|face| {
            for &v in &face.vertices {
                referenced[v].store(true, Ordering::Relaxed);
            }
        });
        let referenced: Array1<bool> = referenced.into_iter().map(AtomicBool::into_inner).collect();

        let mut state = VertexFrameState::new(n);
        Zip::from(mesh.vertices_mut().rows_mut())
            .and(state.original.rows_mut())
            .and(state.rotated.rows_mut())
            .and(&mut state.visited)
            .and(&referenced)
            .par_for_each(|mut point, mut org, mut rot, visited, &used| {
                if used && !*visited {
                    org.assign(&point);
                    let prj = frame.rotate(point.view());
                    rot.assign(&prj);
                    point.assign(&prj);
                    *visited = true;
                }
            });

        log::debug!(
            "Rotated {} of {} vertices into the sun frame",
            state.visited_count(),
            n
        );
        Self {
            mesh,
            state,
            restored: false,
        }
    }

    /// The mesh with rotated coordinates.
    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    pub fn state(&self) -> &VertexFrameState {
        &self.state
    }

    /// Restore original coordinates, reporting any face vertex that was
    /// never rotated. Restoration happens even when the check fails.
    pub fn finish(mut self) -> Result<(), ShadowError> {
        let missing = self.mesh.faces().iter().find_map(|face| {
            face.vertices
                .iter()
                .copied()
                .find(|&v| !self.state.visited[v])
        });
        self.restore();
        match missing {
            Some(vertex) => {
                log::warn!("Vertex {vertex} reached restoration without sun-frame state");
                Err(ShadowError::MissingVertexState { vertex })
            }
            None => Ok(()),
        }
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        let state = &mut self.state;
        Zip::from(self.mesh.vertices_mut().rows_mut())
            .and(state.original.rows())
            .and(&mut state.visited)
            .par_for_each(|mut point, org, visited| {
                if *visited {
                    point.assign(&org);
                    *visited = false;
                }
            });
        self.restored = true;
    }
}

impl Drop for RotatedMesh<'_> {
    fn drop(&mut self) {
        if !self.restored {
            log::debug!("Restoring vertex coordinates on early exit");
            self.restore();
        }
    }
}
