//! WebGPU host substrate for the scatter depth-of-field passes.
//!
//! Every pass is a fullscreen draw of a host-supplied fragment module against
//! the shared DoF bind group. Scratch textures are pooled and handed to the
//! pipeline as opaque handles.

pub mod backend;
pub mod handle;
pub mod passes;
pub mod pipeline;
pub mod render_targets;

pub use backend::WgpuSubstrate;
pub use render_targets::{from_wgpu_format, to_wgpu_format};
