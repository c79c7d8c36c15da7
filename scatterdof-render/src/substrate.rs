//! The host rendering substrate seam.
//!
//! The pipeline only decides which pass runs on which buffer; buffer storage,
//! filtering and per-pixel execution belong to the host.

use scatterdof_shared::passes::PassId;
use scatterdof_shared::uniforms::DofUniforms;

use crate::error::{DofError, Result};

/// Opaque handle to a host-owned buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    pub fn is_hdr(self) -> bool {
        matches!(self, PixelFormat::Rgba16Float | PixelFormat::Rgba32Float)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    #[default]
    Point,
    Bilinear,
}

/// Description of a temporary buffer to acquire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
}

/// The frame's source color buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceBuffer {
    pub handle: TargetHandle,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Everything one pass reads besides its main input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassBindings {
    pub uniforms: DofUniforms,
    /// Dilated foreground CoC, `None` when foreground blur is off.
    pub fg_overlap: Option<TargetHandle>,
    /// CoC buffer read by the blur passes.
    pub low_rez: Option<TargetHandle>,
}

impl PassBindings {
    pub fn new(uniforms: DofUniforms) -> Self {
        Self { uniforms, fg_overlap: None, low_rez: None }
    }

    pub fn with_fg_overlap(self, fg_overlap: Option<TargetHandle>) -> Self {
        Self { fg_overlap, ..self }
    }

    pub fn with_low_rez(self, low_rez: TargetHandle) -> Self {
        Self { low_rez: Some(low_rez), ..self }
    }
}

/// Host graphics substrate driven by the DoF pipeline.
pub trait RenderSubstrate {
    /// Capability check (shader and feature support).
    fn supports_effect(&mut self) -> bool;

    /// Ask the host to produce a depth texture for the camera.
    fn request_depth_texture(&mut self);

    fn acquire_temporary(&mut self, desc: &TargetDesc) -> Result<TargetHandle>;

    fn release_temporary(&mut self, handle: TargetHandle);

    /// Plain copy with no shading.
    fn copy(&mut self, src: TargetHandle, dst: TargetHandle) -> Result<()>;

    /// Run one fullscreen pass reading `src` and writing `dst`. `src == dst`
    /// is allowed.
    fn run_pass(&mut self, pass: PassId, src: TargetHandle, dst: TargetHandle, bindings: &PassBindings) -> Result<()>;

    /// Diagnostic channel.
    fn report(&mut self, error: &DofError) {
        log::error!("{error}");
    }
}
