//! Depth of Field pass encoding: one fullscreen draw per pass, plus the
//! texture copies used for plain blits and in-place passes.

use crate::render_targets::{texture_size, RenderTarget};

/// Render one fullscreen pass into `target`.
pub fn render_dof_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &RenderTarget,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.color_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });

    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// Copy `source` into `destination`. Both must match in size and format.
pub fn copy_target(encoder: &mut wgpu::CommandEncoder, source: &RenderTarget, destination: &RenderTarget) {
    encoder.copy_texture_to_texture(
        wgpu::ImageCopyTexture {
            texture: &source.color_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyTexture {
            texture: &destination.color_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        texture_size(source.width, source.height),
    );
}
