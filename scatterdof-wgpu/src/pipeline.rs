//! Render pipeline creation for the scatter DoF passes.
//! Every pass is a fullscreen triangle with the same bind group layout; only
//! the fragment entry point and output format vary.

use std::collections::HashMap;

use scatterdof_shared::passes::PassId;

/// Shared fullscreen quad vertex state (used by vertex-index-based full-screen triangle).
fn fullscreen_vertex_state(module: &wgpu::ShaderModule) -> wgpu::VertexState<'_> {
    wgpu::VertexState {
        module,
        entry_point: Some("vs_main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        buffers: &[],
    }
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Layout matching the `dof_bindings.wgsl` prelude.
pub fn create_dof_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let color = wgpu::TextureSampleType::Float { filterable: true };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("DOF Bind Group Layout"),
        entries: &[
            // 0: DofUniforms
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // 1: main input
            texture_entry(1, color),
            // 2: camera depth
            texture_entry(2, wgpu::TextureSampleType::Depth),
            // 3: fg overlap, 4: low rez
            texture_entry(3, color),
            texture_entry(4, color),
            // 5: main sampler, 6: linear sampler
            sampler_entry(5),
            sampler_entry(6),
        ],
    })
}

/// Create the linear and point samplers, in that order.
pub fn create_dof_samplers(device: &wgpu::Device) -> (wgpu::Sampler, wgpu::Sampler) {
    let sampler = |label: &str, filter: wgpu::FilterMode| {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    };
    (
        sampler("DOF Linear Sampler", wgpu::FilterMode::Linear),
        sampler("DOF Point Sampler", wgpu::FilterMode::Nearest),
    )
}

/// Layout of the built-in blit: source texture and sampler.
pub fn create_blit_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("DOF Blit Bind Group Layout"),
        entries: &[
            texture_entry(0, wgpu::TextureSampleType::Float { filterable: true }),
            sampler_entry(1),
        ],
    })
}

pub fn create_fullscreen_effect_pipeline(
    device: &wgpu::Device,
    label: &str,
    vert_module: &wgpu::ShaderModule,
    frag_module: &wgpu::ShaderModule,
    frag_entry: &str,
    bgl: &wgpu::BindGroupLayout,
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Layout")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: fullscreen_vertex_state(vert_module),
        fragment: Some(wgpu::FragmentState {
            module: frag_module,
            entry_point: Some(frag_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Pipelines created on first use, one per pass and output format.
#[derive(Default)]
pub struct PipelineCache {
    pipelines: HashMap<(PassId, wgpu::TextureFormat), wgpu::RenderPipeline>,
    blits: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        pass: PassId,
        format: wgpu::TextureFormat,
        vert_module: &wgpu::ShaderModule,
        frag_module: &wgpu::ShaderModule,
        bgl: &wgpu::BindGroupLayout,
    ) -> &wgpu::RenderPipeline {
        self.pipelines.entry((pass, format)).or_insert_with(|| {
            log::debug!("creating pipeline {} for {format:?}", pass.label());
            create_fullscreen_effect_pipeline(
                device,
                pass.label(),
                vert_module,
                frag_module,
                pass.entry_point(),
                bgl,
                format,
            )
        })
    }

    pub fn get_or_create_blit(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vert_module: &wgpu::ShaderModule,
        blit_module: &wgpu::ShaderModule,
        bgl: &wgpu::BindGroupLayout,
    ) -> &wgpu::RenderPipeline {
        self.blits.entry(format).or_insert_with(|| {
            create_fullscreen_effect_pipeline(device, "DOF Blit", vert_module, blit_module, "fs_blit", bgl, format)
        })
    }
}
