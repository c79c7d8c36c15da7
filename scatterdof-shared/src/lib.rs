//! Data shared between the scatter depth-of-field pass pipeline and its GPU
//! backends: uniform layouts, pass identifiers and embedded WGSL.

pub mod passes;
pub mod shaders;
pub mod uniforms;
