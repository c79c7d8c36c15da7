use bytemuck::{Pod, Zeroable};

/// Smallest curve width used as a divisor when packing `curve_params`.
pub const MIN_CURVE_WIDTH: f32 = 1e-5;

/// Depth-of-field uniform block. Matches `DofUniforms` in dof_bindings.wgsl
/// (bind group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DofUniforms {
    /// x = fg curve / start width, y = bg curve / end width,
    /// z = half focal size (01 space), w = focal distance (01 space).
    pub curve_params: [f32; 4],
    /// xy = 1 / source size. Always the source buffer, never a scratch buffer.
    pub inv_render_target_size: [f32; 4],
    /// Pass-specific offset vector (dilation axes, aperture in w).
    pub offsets: [f32; 4],
}

impl DofUniforms {
    pub fn new(curve_params: [f32; 4], source_width: u32, source_height: u32) -> Self {
        Self {
            curve_params,
            inv_render_target_size: [
                1.0 / source_width.max(1) as f32,
                1.0 / source_height.max(1) as f32,
                0.0,
                0.0,
            ],
            offsets: [0.0; 4],
        }
    }

    /// Same block with a different offset vector.
    pub fn with_offsets(self, offsets: [f32; 4]) -> Self {
        Self { offsets, ..self }
    }
}

impl Default for DofUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}
