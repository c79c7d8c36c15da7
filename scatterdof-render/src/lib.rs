//! Scatter depth-of-field: platform-independent pass pipeline.
//!
//! Derives CoC curve parameters from the camera, sizes and scopes the scratch
//! buffers of one frame, and drives the CoC, foreground dilation and blur
//! passes on a [`RenderSubstrate`] supplied by the host.

pub mod camera;
pub mod coc;
pub mod composite;
pub mod effect;
pub mod error;
pub mod params;
pub mod recording;
pub mod settings;
pub mod substrate;
pub mod targets;

pub use camera::{DofCamera, FocalProjection};
pub use effect::DepthOfFieldScatter;
pub use error::{DofError, Result};
pub use params::BlurParameters;
pub use recording::{RecordingSubstrate, SubstrateOp};
pub use settings::DofSettings;
pub use substrate::{FilterMode, PassBindings, PixelFormat, RenderSubstrate, SourceBuffer, TargetDesc, TargetHandle};

pub use scatterdof_shared::passes::{BlurResolution, BlurType, PassId};
pub use scatterdof_shared::uniforms::DofUniforms;
