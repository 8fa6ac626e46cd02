//! Minimal triangle mesh consumed by the shadow engine.
//!
//! Vertices are an `n x 3` array shared between faces; faces reference them
//! by index. Each face also owns a row in the per-face [`VariableStore`].

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::ShadowError;
use crate::geometry::{Point2, Triangle2};
use crate::variables::VariableStore;

/// A mesh triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub id: usize,
    pub vertices: [usize; 3],
}

#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Array2<f64>,
    faces: Vec<Face>,
    variables: VariableStore,
}

impl Mesh {
    /// Build a mesh from an `n x 3` vertex array and vertex-index triples.
    pub fn new(vertices: Array2<f64>, triangles: Vec<[usize; 3]>) -> Result<Self, ShadowError> {
        if vertices.ncols() != 3 {
            return Err(ShadowError::InvalidVertexShape(vertices.ncols()));
        }
        let vertex_count = vertices.nrows();
        let faces = triangles
            .into_iter()
            .enumerate()
            .map(|(id, tri)| {
                if let Some(&vertex) = tri.iter().find(|&&v| v >= vertex_count) {
                    return Err(ShadowError::InvalidFace {
                        face: id,
                        vertex,
                        vertex_count,
                    });
                }
                Ok(Face { id, vertices: tri })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Created a mesh with {} triangles and {} vertices",
            faces.len(),
            vertex_count
        );
        let variables = VariableStore::new(faces.len());
        Ok(Self {
            vertices,
            faces,
            variables,
        })
    }

    /// Build a mesh from array views (`n x 3` vertices, `m x 3` triangles).
    pub fn from_arrays(
        vertices: ArrayView2<f64>,
        triangles: ArrayView2<usize>,
    ) -> Result<Self, ShadowError> {
        if triangles.ncols() != 3 {
            return Err(ShadowError::InvalidConfig(format!(
                "triangle array must have 3 columns, got {}",
                triangles.ncols()
            )));
        }
        let tris = triangles
            .rows()
            .into_iter()
            .map(|r| [r[0], r[1], r[2]])
            .collect();
        Self::new(vertices.to_owned(), tris)
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.nrows()
    }

    pub fn face(&self, i: usize) -> &Face {
        &self.faces[i]
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex(&self, i: usize) -> ArrayView1<f64> {
        self.vertices.row(i)
    }

    pub fn vertices(&self) -> &Array2<f64> {
        &self.vertices
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut Array2<f64> {
        &mut self.vertices
    }

    pub fn set_vertex(&mut self, i: usize, point: [f64; 3]) {
        self.vertices.row_mut(i).assign(&ArrayView1::from(&point));
    }

    pub fn face_centroid(&self, i: usize) -> Array1<f64> {
        let [a, b, c] = self.faces[i].vertices;
        (&self.vertices.row(a) + &self.vertices.row(b) + &self.vertices.row(c)) / 3.0
    }

    /// Elevation of a face: the z of its centroid.
    pub fn face_elevation(&self, i: usize) -> f64 {
        let [a, b, c] = self.faces[i].vertices;
        (self.vertices[[a, 2]] + self.vertices[[b, 2]] + self.vertices[[c, 2]]) / 3.0
    }

    /// Face projected onto the xy plane.
    pub fn face_triangle(&self, i: usize) -> Triangle2 {
        let [a, b, c] = self.faces[i].vertices;
        let p = |v: usize| Point2::new(self.vertices[[v, 0]], self.vertices[[v, 1]]);
        Triangle2::new(p(a), p(b), p(c))
    }

    /// Whether the xy projections of two faces share interior area.
    pub fn faces_intersect(&self, a: usize, b: usize, tolerance: f64) -> bool {
        self.face_triangle(a)
            .intersects(&self.face_triangle(b), tolerance)
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn face_data(&self, face: usize, key: &str) -> Option<f64> {
        self.variables.get(face, key)
    }

    pub fn set_face_data(&mut self, face: usize, key: &str, value: f64) -> bool {
        self.variables.set(face, key, value)
    }
}
