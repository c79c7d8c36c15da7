//! CoC pipeline. Builds the circle-of-confusion map the blur passes read.
//!
//! Pass order:
//! 1. optional foreground isolation: capture FG CoC, dilate it along Y then X,
//!    apply it back onto the source;
//! 2. main CoC capture on the source (variant depends on step 1);
//! 3. in low resolution mode, downsample into the scene buffer, which then
//!    holds the CoC;
//! 4. downsample the CoC buffer once more and merge it back in, widening the
//!    blur with coarse samples.

use scatterdof_shared::passes::PassId;
use scatterdof_shared::uniforms::DofUniforms;

use crate::error::Result;
use crate::params::BlurParameters;
use crate::substrate::{PassBindings, RenderSubstrate, TargetDesc, TargetHandle};
use crate::targets::FrameTargets;

/// Scale from `aperture * overlap` to the dilation offset.
pub const FOREGROUND_DILATION_SCALE: f32 = 0.225;

/// Buffers the CoC pipeline works on.
#[derive(Clone, Copy, Debug)]
pub struct CocBuffers {
    pub source: TargetHandle,
    /// Coarse scene buffer, low resolution mode only.
    pub scene: Option<TargetHandle>,
    /// Low resolution ping buffer.
    pub low: TargetHandle,
    /// Foreground scratch to acquire; `None` disables foreground isolation.
    pub foreground: Option<TargetDesc>,
}

pub fn foreground_adjustment(params: &BlurParameters) -> f32 {
    params.aperture_size * params.foreground_overlap * FOREGROUND_DILATION_SCALE
}

/// Dilation offsets: first pass spreads along Y, second along X.
pub fn dilation_offsets(adjustment: f32) -> [[f32; 4]; 2] {
    [[0.0, adjustment, 0.0, adjustment], [adjustment, 0.0, 0.0, adjustment]]
}

/// Runs the CoC passes and returns the buffer holding the final CoC map
/// (the scene buffer in low resolution mode, otherwise the source) and the
/// uniform block as left by the last pass.
pub fn build_coc_map<S: RenderSubstrate + ?Sized>(
    frame: &mut FrameTargets<'_, S>,
    buffers: &CocBuffers,
    params: &BlurParameters,
    uniforms: DofUniforms,
) -> Result<(TargetHandle, DofUniforms)> {
    let source = buffers.source;

    let (fg_overlap, uniforms) = match buffers.foreground {
        Some(desc) => {
            let (fg, uniforms) = isolate_foreground(frame, buffers, &desc, params, uniforms)?;
            (Some(fg), uniforms)
        }
        None => (None, uniforms),
    };

    // Remaining CoC (fore and background).
    let coc_pass = if fg_overlap.is_some() {
        PassId::CocForegroundHandled
    } else {
        PassId::CocFull
    };
    let bindings = PassBindings::new(uniforms).with_fg_overlap(fg_overlap);
    frame.substrate().run_pass(coc_pass, source, source, &bindings)?;

    if let Some(fg) = fg_overlap {
        frame.release(fg);
    }

    let bindings = PassBindings::new(uniforms);
    let coc = match buffers.scene {
        Some(scene) => {
            frame.substrate().run_pass(PassId::Downsample, source, scene, &bindings)?;
            scene
        }
        None => source,
    };

    // Spawn a few low res samples in the high res CoC.
    frame.substrate().run_pass(PassId::Downsample, coc, buffers.low, &bindings)?;
    frame.substrate().run_pass(PassId::MergeLowRez, buffers.low, coc, &bindings)?;

    Ok((coc, uniforms))
}

/// Captures foreground CoC into its own buffer, dilates it and writes it back
/// onto the source. The returned buffer stays bound as `fg_overlap` and is
/// still held by `frame`.
fn isolate_foreground<S: RenderSubstrate + ?Sized>(
    frame: &mut FrameTargets<'_, S>,
    buffers: &CocBuffers,
    desc: &TargetDesc,
    params: &BlurParameters,
    uniforms: DofUniforms,
) -> Result<(TargetHandle, DofUniforms)> {
    let fg = frame.acquire(desc)?;
    let source = buffers.source;

    frame
        .substrate()
        .run_pass(PassId::CaptureForeground, source, fg, &PassBindings::new(uniforms))?;

    let [along_y, along_x] = dilation_offsets(foreground_adjustment(params));

    let uniforms = uniforms.with_offsets(along_y);
    let bindings = PassBindings::new(uniforms).with_fg_overlap(Some(fg));
    frame.substrate().run_pass(PassId::DilateForeground, fg, buffers.low, &bindings)?;

    let uniforms = uniforms.with_offsets(along_x);
    let bindings = PassBindings::new(uniforms).with_fg_overlap(Some(fg));
    frame.substrate().run_pass(PassId::DilateForeground, buffers.low, fg, &bindings)?;

    frame.substrate().run_pass(PassId::ApplyForeground, fg, source, &bindings)?;

    Ok((fg, uniforms))
}
