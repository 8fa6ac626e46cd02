//! Per-cell occlusion between faces in the sun frame.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::ShadowError;
use crate::geometry::{Bbox2, Triangle2};
use crate::grid::Grid;
use crate::mesh::Mesh;

/// Sun-frame snapshot of one face.
#[derive(Debug, Clone, Copy)]
pub struct FaceFrame {
    pub triangle: Triangle2,
    pub bbox: Bbox2,
    /// Centroid elevation along the solar ray.
    pub z: f64,
}

/// Capture every face's projection and rotated elevation.
pub fn face_frames(mesh: &Mesh) -> Vec<FaceFrame> {
    (0..mesh.num_faces())
        .into_par_iter()
        .map(|f| {
            let triangle = mesh.face_triangle(f);
            FaceFrame {
                triangle,
                bbox: triangle.bbox(),
                z: mesh.face_elevation(f),
            }
        })
        .collect()
}

/// Per-face shadow flags. A flag only ever moves from unset to set within
/// an invocation, so concurrent marks from different cells commute.
#[derive(Debug)]
pub struct ShadowFlags(Vec<AtomicBool>);

impl ShadowFlags {
    pub fn new(n: usize) -> Self {
        Self((0..n).map(|_| AtomicBool::new(false)).collect())
    }

    #[inline]
    pub fn mark(&self, face: usize) {
        self.0[face].store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_shadowed(&self, face: usize) -> bool {
        self.0[face].load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|f| f.load(Ordering::Relaxed)).count()
    }

    pub fn into_vec(self) -> Vec<bool> {
        self.0.into_iter().map(AtomicBool::into_inner).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OcclusionParams {
    pub height_tolerance: f64,
    pub contact_tolerance: f64,
}

/// Sort a cell's faces by descending elevation and test each face against
/// every lower one in the same cell.
pub fn evaluate_cell(
    faces: &mut [usize],
    frames: &[FaceFrame],
    flags: &ShadowFlags,
    params: OcclusionParams,
) {
    // stable: equal elevations keep ascending face order
    faces.sort_by(|&a, &b| frames[b].z.total_cmp(&frames[a].z));

    for (j, &fj) in faces.iter().enumerate() {
        let upper = &frames[fj];
        for &fk in &faces[j + 1..] {
            if flags.is_shadowed(fk) {
                continue;
            }
            let lower = &frames[fk];
            if upper.z - lower.z > params.height_tolerance
                && upper.bbox.overlaps(&lower.bbox)
                && upper
                    .triangle
                    .intersects(&lower.triangle, params.contact_tolerance)
            {
                flags.mark(fk);
            }
        }
    }
}

/// Evaluate every grid cell in parallel.
///
/// `progress` is bumped once per finished cell. `cancel` is polled before
/// each cell starts; once set, remaining cells are skipped and the call
/// fails with [`ShadowError::Cancelled`].
pub fn evaluate_grid(
    grid: &mut Grid,
    frames: &[FaceFrame],
    params: OcclusionParams,
    progress: Option<&AtomicUsize>,
    cancel: Option<&AtomicBool>,
) -> Result<ShadowFlags, ShadowError> {
    let flags = ShadowFlags::new(frames.len());

    grid.cells_mut().par_iter_mut().try_for_each(|cell| {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(ShadowError::Cancelled);
        }
        evaluate_cell(cell.faces_mut(), frames, &flags, params);
        if let Some(counter) = progress {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;

    Ok(flags)
}
