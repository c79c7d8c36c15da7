//! Render pass implementations for the DoF pipeline.

pub mod dof;
