//! Segmented bounding box over the rotated mesh.
//!
//! The xy extent of the (already rotated) mesh is split into `rows x cols`
//! equal cells, ordered top-to-bottom then left-to-right. A face joins every
//! cell that strictly contains at least one of its vertices, so faces that
//! straddle a boundary are evaluated in each cell they touch.

use rayon::prelude::*;

use crate::error::ShadowError;
use crate::geometry::{Bbox2, Point2};
use crate::mesh::Mesh;

const MIN_PADDING: f64 = 1e-9;

/// One grid cell: corners in bottom-left, bottom-right, top-right, top-left
/// order, and the faces binned into it.
#[derive(Debug, Clone)]
pub struct Cell {
    corners: [Point2; 4],
    faces: Vec<usize>,
}

impl Cell {
    pub fn new(corners: [Point2; 4]) -> Self {
        Self {
            corners,
            faces: Vec::new(),
        }
    }

    pub fn corners(&self) -> &[Point2; 4] {
        &self.corners
    }

    pub fn faces(&self) -> &[usize] {
        &self.faces
    }

    pub(crate) fn faces_mut(&mut self) -> &mut Vec<usize> {
        &mut self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Strict point-in-cell test. Walking the corners counter-clockwise, the
    /// point must lie strictly left of every edge; points on an edge are
    /// outside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0..4).all(|i| {
            let p0 = self.corners[i];
            let p1 = self.corners[(i + 1) % 4];
            let cross = (y - p0.y) * (p1.x - p0.x) - (x - p0.x) * (p1.y - p0.y);
            cross > 0.0
        })
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    bounds: Bbox2,
    dx: f64,
    dy: f64,
    cells: Vec<Cell>,
}

/// Cells a single face was binned into.
struct FaceCells {
    cells: Vec<usize>,
    by_centroid: bool,
}

impl Grid {
    /// Empty grid covering `bounds`.
    pub fn new(bounds: Bbox2, rows: usize, cols: usize) -> Result<Self, ShadowError> {
        if rows == 0 || cols == 0 {
            return Err(ShadowError::InvalidGrid { rows, cols });
        }
        let dx = bounds.width() / cols as f64;
        let dy = bounds.height() / rows as f64;

        let mut cells = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            let top = bounds.ymax - dy * i as f64;
            let bottom = bounds.ymax - dy * (i + 1) as f64;
            for j in 0..cols {
                let left = bounds.xmin + dx * j as f64;
                let right = bounds.xmin + dx * (j + 1) as f64;
                cells.push(Cell::new([
                    Point2::new(left, bottom),
                    Point2::new(right, bottom),
                    Point2::new(right, top),
                    Point2::new(left, top),
                ]));
            }
        }
        Ok(Self {
            rows,
            cols,
            bounds,
            dx,
            dy,
            cells,
        })
    }

    /// Cover the mesh's xy extent and bin every face.
    ///
    /// `padding` grows the bounding box by that fraction of its larger side
    /// so vertices on the hull are strictly inside the outer cells.
    pub fn build(
        mesh: &Mesh,
        rows: usize,
        cols: usize,
        padding: f64,
    ) -> Result<Self, ShadowError> {
        if rows == 0 || cols == 0 {
            return Err(ShadowError::InvalidGrid { rows, cols });
        }
        let mut bounds = (0..mesh.num_faces())
            .into_par_iter()
            .map(|f| mesh.face_triangle(f).bbox())
            .reduce(|| Bbox2::EMPTY, Bbox2::union);
        if bounds.is_empty() {
            bounds = Bbox2 {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 0.0,
                ymax: 0.0,
            };
        }
        if padding > 0.0 {
            let pad = (padding * bounds.width().max(bounds.height())).max(MIN_PADDING);
            bounds = bounds.expand(pad);
        }

        let mut grid = Self::new(bounds, rows, cols)?;

        // membership is computed in parallel and merged in face order so
        // each cell's list is independent of scheduling
        let membership: Vec<FaceCells> = (0..mesh.num_faces())
            .into_par_iter()
            .map(|f| grid.face_cells(mesh, f))
            .collect();

        let mut by_centroid = 0;
        for (f, fc) in membership.into_iter().enumerate() {
            by_centroid += usize::from(fc.by_centroid);
            for c in fc.cells {
                grid.cells[c].faces.push(f);
            }
        }

        let (lo, hi) = grid
            .cells
            .iter()
            .fold((usize::MAX, 0), |(lo, hi), c| (lo.min(c.len()), hi.max(c.len())));
        log::debug!(
            "AABB is {}x{}, cell occupancy {}..{}, {} faces binned by centroid",
            rows,
            cols,
            lo,
            hi,
            by_centroid
        );
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn bounds(&self) -> &Bbox2 {
        &self.bounds
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row * self.cols + col]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Cell index whose half-open extent holds `p`, by index arithmetic.
    pub fn locate(&self, p: Point2) -> Option<usize> {
        let b = &self.bounds;
        if !(p.x >= b.xmin && p.x <= b.xmax && p.y >= b.ymin && p.y <= b.ymax) {
            return None;
        }
        let col = if self.dx > 0.0 {
            (((p.x - b.xmin) / self.dx) as usize).min(self.cols - 1)
        } else {
            0
        };
        let row = if self.dy > 0.0 {
            (((b.ymax - p.y) / self.dy) as usize).min(self.rows - 1)
        } else {
            0
        };
        Some(row * self.cols + col)
    }

    /// Inclusive row and column ranges of cells that could hold a point of
    /// `bbox`, widened by one cell against rounding.
    fn candidate_span(&self, bbox: &Bbox2) -> ((usize, usize), (usize, usize)) {
        let span = |lo: f64, hi: f64, step: f64, n: usize| {
            if step.is_nan() || step <= 0.0 {
                return (0, n - 1);
            }
            let first = (lo / step).floor() as isize - 1;
            let last = (hi / step).floor() as isize + 1;
            let clamp = |v: isize| v.clamp(0, n as isize - 1) as usize;
            (clamp(first), clamp(last))
        };
        let b = &self.bounds;
        let rows = span(b.ymax - bbox.ymax, b.ymax - bbox.ymin, self.dy, self.rows);
        let cols = span(bbox.xmin - b.xmin, bbox.xmax - b.xmin, self.dx, self.cols);
        (rows, cols)
    }

    fn face_cells(&self, mesh: &Mesh, face: usize) -> FaceCells {
        let tri = mesh.face_triangle(face);
        let pts = tri.points();
        let ((r0, r1), (c0, c1)) = self.candidate_span(&tri.bbox());

        let mut cells = Vec::new();
        for r in r0..=r1 {
            for c in c0..=c1 {
                let idx = r * self.cols + c;
                if pts.iter().any(|p| self.cells[idx].contains(p.x, p.y)) {
                    cells.push(idx);
                }
            }
        }
        if !cells.is_empty() {
            return FaceCells {
                cells,
                by_centroid: false,
            };
        }

        // every vertex sits on a cell edge
        match self.locate(tri.centroid()) {
            Some(idx) => FaceCells {
                cells: vec![idx],
                by_centroid: true,
            },
            None => FaceCells {
                cells,
                by_centroid: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn unit_cell() -> Cell {
        Cell::new([
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
    }

    /// Regular `n x n` lattice of unit squares split into triangles.
    fn lattice(n: usize) -> Mesh {
        let mut v = Array2::<f64>::zeros(((n + 1) * (n + 1), 3));
        for i in 0..=n {
            for j in 0..=n {
                let k = i * (n + 1) + j;
                v[[k, 0]] = j as f64;
                v[[k, 1]] = i as f64;
                v[[k, 2]] = ((i * 7 + j * 3) % 5) as f64;
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

    #[test]
    fn test_point_in_cell_is_strict() {
        let cell = unit_cell();
        assert!(cell.contains(0.5, 0.5));
        assert!(!cell.contains(0.0, 0.5));
        assert!(!cell.contains(0.5, 1.0));
        assert!(!cell.contains(1.0, 1.0));
        assert!(!cell.contains(1.5, 0.5));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mesh = lattice(2);
        assert!(matches!(
            Grid::build(&mesh, 0, 3, 1e-6),
            Err(ShadowError::InvalidGrid { rows: 0, cols: 3 })
        ));
        assert!(matches!(
            Grid::build(&mesh, 2, 0, 1e-6),
            Err(ShadowError::InvalidGrid { rows: 2, cols: 0 })
        ));
    }

    #[test]
    fn test_cells_ordered_top_left_first() {
        let bounds = Bbox2 {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 4.0,
            ymax: 2.0,
        };
        let grid = Grid::new(bounds, 2, 4).unwrap();
        assert_eq!(grid.cells().len(), 8);
        let top_left = grid.cell(0, 0).corners();
        assert_eq!(top_left[3], Point2::new(0.0, 2.0));
        assert_eq!(top_left[0], Point2::new(0.0, 1.0));
        let bottom_right = grid.cell(1, 3).corners();
        assert_eq!(bottom_right[1], Point2::new(4.0, 0.0));
        assert_eq!(grid.locate(Point2::new(3.5, 0.5)), Some(7));
        assert_eq!(grid.locate(Point2::new(0.5, 1.5)), Some(0));
        assert_eq!(grid.locate(Point2::new(5.0, 0.5)), None);
    }

    #[test]
    fn test_every_face_is_binned() {
        let mesh = lattice(6);
        for &(rows, cols) in &[(1, 1), (3, 3), (5, 5), (6, 6), (2, 7)] {
            let grid = Grid::build(&mesh, rows, cols, 1e-6).unwrap();
            let mut seen = vec![false; mesh.num_faces()];
            for cell in grid.cells() {
                for &f in cell.faces() {
                    seen[f] = true;
                }
            }
            assert!(seen.iter().all(|&s| s), "dropped a face at {rows}x{cols}");
        }
    }

    #[test]
    fn test_gridline_face_falls_back_to_centroid() {
        // With a 6x6 lattice on a 3x3 grid every lattice point on an interior
        // grid line is excluded, yet no face may be dropped.
        let mesh = lattice(6);
        let grid = Grid::build(&mesh, 3, 3, 0.0).unwrap();
        let total: usize = grid.cells().iter().map(Cell::len).sum();
        assert!(total >= mesh.num_faces());
    }

    #[test]
    fn test_straddling_face_in_multiple_cells() {
        let v = array![[0.1, 0.1, 0.0], [3.9, 0.1, 0.0], [0.1, 3.9, 0.0], [4.0, 4.0, 0.0]];
        let mesh = Mesh::new(v, vec![[0, 1, 2], [1, 3, 2]]).unwrap();
        let grid = Grid::build(&mesh, 2, 2, 1e-6).unwrap();
        let containing = grid.cells().iter().filter(|c| c.faces().contains(&0)).count();
        assert_eq!(containing, 3);
    }

    #[test]
    fn test_cell_lists_are_in_face_order() {
        let mesh = lattice(5);
        let grid = Grid::build(&mesh, 2, 2, 1e-6).unwrap();
        for cell in grid.cells() {
            assert!(cell.faces().windows(2).all(|w| w[0] < w[1]));
        }
    }
}
