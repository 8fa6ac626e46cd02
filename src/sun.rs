//! Solar position and the rotation into the sun frame.
//!
//! After rotation the z axis points along the solar ray, so a larger rotated
//! z means a point lies closer to the sun along the line of sight.

use ndarray::{array, Array1, Array2, ArrayView1};

const PI: f64 = std::f64::consts::PI;

/// Solar azimuth and elevation, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

impl SunPosition {
    pub fn new(azimuth_deg: f64, elevation_deg: f64) -> Self {
        Self {
            azimuth_deg,
            elevation_deg,
        }
    }

    /// True when the sun is too close to (or below) the horizon for
    /// shadow geometry to be meaningful.
    pub fn is_below(&self, min_elevation_deg: f64) -> bool {
        self.elevation_deg < min_elevation_deg
    }
}

/// Euler rotation taking world coordinates into the sun frame.
#[derive(Debug, Clone)]
pub struct SunFrame {
    matrix: Array2<f64>,
}

impl SunFrame {
    pub fn new(sun: SunPosition) -> Self {
        let z0 = PI - sun.azimuth_deg * PI / 180.0;
        let q0 = PI / 2.0 - sun.elevation_deg * PI / 180.0;
        let (sin_z0, cos_z0) = z0.sin_cos();
        let (sin_q0, cos_q0) = q0.sin_cos();

        let matrix = array![
            [cos_z0, sin_z0, 0.0],
            [-cos_q0 * sin_z0, cos_q0 * cos_z0, sin_q0],
            [sin_q0 * sin_z0, -cos_z0 * sin_q0, cos_q0],
        ];
        Self { matrix }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    #[inline]
    pub fn rotate(&self, point: ArrayView1<f64>) -> Array1<f64> {
        self.matrix.dot(&point)
    }
}
