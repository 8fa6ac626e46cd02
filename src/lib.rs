//! Terrain shadow casting for triangulated surfaces.
//!
//! The engine rotates a mesh into a frame aligned with the solar ray, bins
//! faces into a coarse grid over the projected extent, and marks every face
//! whose projection is covered by a face lying closer to the sun.

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod grid;
pub mod mesh;
pub mod occlusion;
pub mod shadowing;
pub mod sun;
pub mod variables;

pub use config::ShadowConfig;
pub use error::{ConfigError, ShadowError};
pub use mesh::{Face, Mesh};
pub use shadowing::{compute_terrain_shadows, ShadowSummary, TerrainShadow, SHADOWED, Z_PRIME};
pub use sun::{SunFrame, SunPosition};
pub use variables::VariableStore;

#[cfg(feature = "python")]
#[pymodule]
fn terrain_shadows(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_shadowing_module(py_module)?;

    py_module.add("__doc__", "Terrain shadow casting implemented in Rust.")?;

    Ok(())
}

#[cfg(feature = "python")]
fn register_shadowing_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "shadowing")?;
    submodule.add("__doc__", "Per-face terrain shadows.")?;
    submodule.add_function(wrap_pyfunction!(
        shadowing::compute_terrain_shadows_py,
        &submodule
    )?)?;
    // Expose the runner so Python can poll progress() and call cancel()
    submodule.add_class::<shadowing::TerrainShadowRunner>()?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
