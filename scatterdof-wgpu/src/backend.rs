use scatterdof_render::error::{DofError, Result};
use scatterdof_render::substrate::{FilterMode, PassBindings, PixelFormat, RenderSubstrate, TargetDesc, TargetHandle};
use scatterdof_shared::passes::PassId;
use scatterdof_shared::shaders;
use scatterdof_shared::uniforms::DofUniforms;

use crate::handle::HandleStore;
use crate::passes::dof;
use crate::pipeline::{self, PipelineCache};
use crate::render_targets::{self, RenderTarget, TargetKey, TemporaryPool};

/// WebGPU substrate for the scatter DoF passes. Owns every texture the
/// pipeline touches; the host registers its source and destination and gets
/// back opaque handles.
pub struct WgpuSubstrate {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    // Resource stores (the pipeline holds opaque u64 handles into these)
    targets: HandleStore<RenderTarget>,
    pool: TemporaryPool,
    pipelines: PipelineCache,

    bind_group_layout: wgpu::BindGroupLayout,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    vert_module: wgpu::ShaderModule,
    frag_module: wgpu::ShaderModule,
    blit_module: wgpu::ShaderModule,
    uniform_buffer: wgpu::Buffer,
    linear_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    default_texture_view: wgpu::TextureView,
    default_depth_view: wgpu::TextureView,

    // Capability state, fixed at construction
    shader_error: Option<String>,
    missing_entry_points: Vec<&'static str>,
    renderable_formats: Vec<wgpu::TextureFormat>,

    depth_view: Option<wgpu::TextureView>,
    depth_requested: bool,
    warned_missing_depth: bool,

    // Error state
    pub last_error: Option<String>,
}

impl WgpuSubstrate {
    /// Build the substrate on an existing device. `fragment_source` is the
    /// host's DoF fragment module; it is appended to the binding prelude and
    /// must export one entry point per pass.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, adapter: &wgpu::Adapter, fragment_source: &str) -> Self {
        let missing_entry_points = shaders::missing_entry_points(fragment_source, PassId::ALL);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let frag_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DOF Fragment"),
            source: wgpu::ShaderSource::Wgsl(shaders::with_dof_bindings(fragment_source).into()),
        });
        let shader_error = pollster::block_on(device.pop_error_scope()).map(|e| e.to_string());
        if let Some(err) = &shader_error {
            log::error!("DOF fragment module failed validation: {err}");
        }

        let vert_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fullscreen Vert"),
            source: wgpu::ShaderSource::Wgsl(shaders::FULLSCREEN_QUAD_VERT.into()),
        });
        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DOF Blit"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLIT_FRAG.into()),
        });

        // Adapter-specific format features only apply when the device enabled them.
        let device_features = device.features();
        let renderable_formats = usable_formats(
            |format| {
                if device_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) {
                    adapter.get_texture_format_features(format)
                } else {
                    format.guaranteed_format_features(device_features)
                }
            },
            device_features,
        );
        log::debug!("DOF target formats: {renderable_formats:?}");

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DOF Uniforms"),
            size: std::mem::size_of::<DofUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = pipeline::create_dof_bind_group_layout(&device);
        let blit_bind_group_layout = pipeline::create_blit_bind_group_layout(&device);
        let (linear_sampler, point_sampler) = pipeline::create_dof_samplers(&device);
        let (_, default_texture_view) = render_targets::create_default_texture(&device, &queue);
        let (_, default_depth_view) = render_targets::create_default_depth_texture(&device);

        Self {
            device,
            queue,
            targets: HandleStore::new(),
            pool: TemporaryPool::new(),
            pipelines: PipelineCache::new(),
            bind_group_layout,
            blit_bind_group_layout,
            vert_module,
            frag_module,
            blit_module,
            uniform_buffer,
            linear_sampler,
            point_sampler,
            default_texture_view,
            default_depth_view,
            shader_error,
            missing_entry_points,
            renderable_formats,
            depth_view: None,
            depth_requested: false,
            warned_missing_depth: false,
            last_error: None,
        }
    }

    /// Create a device without a surface and build the substrate on it.
    pub fn new_headless(fragment_source: &str) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| DofError::Backend("Failed to find suitable GPU adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Scatter DOF Device"),
                required_features: adapter.features() & wgpu::Features::FLOAT32_FILTERABLE,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| DofError::Backend(format!("Failed to create device: {e}")))?;

        log::info!("DOF substrate on {:?}", adapter.get_info().name);
        Ok(Self::new(device, queue, &adapter, fragment_source))
    }

    /// Register a host texture (frame source or destination). `filter` is how
    /// passes sample it as their main input.
    pub fn register_target(&mut self, texture: wgpu::Texture, filter: FilterMode) -> Result<TargetHandle> {
        let format = texture.format();
        if !self.renderable_formats.contains(&format) {
            return Err(self.fail(format!("{format:?} cannot be rendered and filtered on this device")));
        }
        let target = RenderTarget::from_texture(texture, filter).map_err(|e| self.fail(e))?;
        Ok(TargetHandle(self.targets.insert(target)))
    }

    /// Forget a host texture and hand it back.
    pub fn unregister_target(&mut self, handle: TargetHandle) -> Option<wgpu::Texture> {
        match self.targets.get(handle.0).map(|t| t.temporary) {
            Some(false) => self.targets.remove(handle.0).map(|t| t.color_texture),
            _ => None,
        }
    }

    pub fn texture(&self, handle: TargetHandle) -> Option<&wgpu::Texture> {
        self.targets.get(handle.0).map(|t| &t.color_texture)
    }

    /// Supply the camera depth for the next passes.
    pub fn set_depth_view(&mut self, view: wgpu::TextureView) {
        self.depth_view = Some(view);
        self.warned_missing_depth = false;
    }

    pub fn depth_requested(&self) -> bool {
        self.depth_requested
    }

    /// Drop every pooled temporary now. Idle sizes are also evicted on their
    /// own as the pool sees new requests.
    pub fn trim_pool(&mut self) {
        log::debug!("dropping {} pooled DOF targets", self.pool.free_count());
        self.pool.clear();
    }

    fn fail(&mut self, message: String) -> DofError {
        self.last_error = Some(message.clone());
        DofError::Backend(message)
    }

    fn check_live(&self, handle: TargetHandle) -> Result<()> {
        if self.targets.contains(handle.0) {
            Ok(())
        } else {
            Err(DofError::UnknownTarget(handle))
        }
    }

    fn take_twin(&mut self, key: TargetKey) -> RenderTarget {
        self.pool.take(&key, FilterMode::Point).unwrap_or_else(|| {
            render_targets::create_render_target(
                &self.device,
                key.width,
                key.height,
                "DOF In-Place Twin",
                key.format,
                FilterMode::Point,
            )
        })
    }

    /// Finish a scoped submission, turning validation errors into `Backend`.
    fn finish_scope(&mut self, what: &str) -> Result<()> {
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(self.fail(format!("{what}: {e}"))),
            None => Ok(()),
        }
    }
}

fn lookup(targets: &HandleStore<RenderTarget>, handle: TargetHandle) -> Result<&RenderTarget> {
    targets.get(handle.0).ok_or(DofError::UnknownTarget(handle))
}

/// Formats a DoF target may use: renderable, copyable both ways and
/// filterable with the device's features. `format_features` reports what the
/// device supports for one format.
pub fn usable_formats(
    format_features: impl Fn(wgpu::TextureFormat) -> wgpu::TextureFormatFeatures,
    device_features: wgpu::Features,
) -> Vec<wgpu::TextureFormat> {
    [
        PixelFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb,
        PixelFormat::Bgra8UnormSrgb,
        PixelFormat::Rgba16Float,
        PixelFormat::Rgba32Float,
    ]
    .into_iter()
    .map(render_targets::to_wgpu_format)
    .filter(|&format| format_usable(format, format_features(format), device_features))
    .collect()
}

fn format_usable(
    format: wgpu::TextureFormat,
    features: wgpu::TextureFormatFeatures,
    device_features: wgpu::Features,
) -> bool {
    if format == wgpu::TextureFormat::Rgba32Float && !device_features.contains(wgpu::Features::FLOAT32_FILTERABLE) {
        return false;
    }
    features.allowed_usages.contains(render_targets::TARGET_USAGE)
        && features.flags.contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
}

/// First reason the effect cannot run, checked in order: shader validation,
/// entry points, then an HDR target format.
pub fn capability_failure(
    shader_error: Option<&str>,
    missing_entry_points: &[&str],
    renderable_formats: &[wgpu::TextureFormat],
) -> Option<String> {
    if let Some(err) = shader_error {
        return Some(format!("DOF fragment module is invalid: {err}"));
    }
    if !missing_entry_points.is_empty() {
        return Some(format!("DOF fragment module lacks entry points: {}", missing_entry_points.join(", ")));
    }
    if !renderable_formats.contains(&wgpu::TextureFormat::Rgba16Float) {
        return Some("Rgba16Float targets are not renderable and filterable on this device".into());
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyRoute {
    /// Same size and format: a plain texture copy.
    Texture,
    /// Resampled through the blit pipeline.
    Blit,
}

pub fn copy_route(source: TargetKey, destination: TargetKey) -> CopyRoute {
    if source == destination {
        CopyRoute::Texture
    } else {
        CopyRoute::Blit
    }
}

/// Whether `dst` is also read by the pass, in which case the pass renders
/// into a twin and is copied back.
pub fn needs_twin(src: TargetHandle, dst: TargetHandle, bindings: &PassBindings) -> bool {
    src == dst || bindings.fg_overlap == Some(dst) || bindings.low_rez == Some(dst)
}

impl RenderSubstrate for WgpuSubstrate {
    fn supports_effect(&mut self) -> bool {
        match capability_failure(self.shader_error.as_deref(), &self.missing_entry_points, &self.renderable_formats) {
            Some(reason) => {
                log::warn!("{reason}");
                false
            }
            None => true,
        }
    }

    fn request_depth_texture(&mut self) {
        self.depth_requested = true;
    }

    fn acquire_temporary(&mut self, desc: &TargetDesc) -> Result<TargetHandle> {
        let format = render_targets::to_wgpu_format(desc.format);
        if !self.renderable_formats.contains(&format) {
            return Err(self.fail(format!("{:?} is not renderable for {}", desc.format, desc.label)));
        }
        let key = TargetKey::new(desc.width, desc.height, format);
        let target = match self.pool.take(&key, desc.filter) {
            Some(target) => target,
            None => {
                log::debug!("creating {} target {}x{} {format:?}", desc.label, key.width, key.height);
                render_targets::create_render_target(&self.device, desc.width, desc.height, desc.label, format, desc.filter)
            }
        };
        Ok(TargetHandle(self.targets.insert(target)))
    }

    fn release_temporary(&mut self, handle: TargetHandle) {
        match self.targets.get(handle.0).map(|t| t.temporary) {
            Some(true) => {
                if let Some(target) = self.targets.remove(handle.0) {
                    self.pool.give(target);
                }
            }
            Some(false) => log::warn!("refusing to release host target {handle:?}"),
            None => log::warn!("release of unknown temporary {handle:?}"),
        }
    }

    fn copy(&mut self, src: TargetHandle, dst: TargetHandle) -> Result<()> {
        self.check_live(src)?;
        self.check_live(dst)?;
        if src == dst {
            return Ok(());
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("DOF Copy Encoder"),
        });
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        {
            let source = lookup(&self.targets, src)?;
            let destination = lookup(&self.targets, dst)?;
            if copy_route(source.key(), destination.key()) == CopyRoute::Texture {
                dof::copy_target(&mut encoder, source, destination);
            } else {
                let sampler = match source.filter {
                    FilterMode::Bilinear => &self.linear_sampler,
                    FilterMode::Point => &self.point_sampler,
                };
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("DOF Blit Bind Group"),
                    layout: &self.blit_bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&source.color_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                });
                let pipeline = self.pipelines.get_or_create_blit(
                    &self.device,
                    destination.format,
                    &self.vert_module,
                    &self.blit_module,
                    &self.blit_bind_group_layout,
                );
                dof::render_dof_pass(&mut encoder, "DOF Blit", destination, pipeline, &bind_group);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.finish_scope("DOF copy")
    }

    fn run_pass(&mut self, pass: PassId, src: TargetHandle, dst: TargetHandle, bindings: &PassBindings) -> Result<()> {
        if let Some(err) = self.shader_error.clone() {
            return Err(self.fail(format!("{} has no valid shader: {err}", pass.label())));
        }
        if self.missing_entry_points.contains(&pass.entry_point()) {
            return Err(self.fail(format!("missing entry point {}", pass.entry_point())));
        }
        self.check_live(src)?;
        self.check_live(dst)?;
        for bound in [bindings.fg_overlap, bindings.low_rez].into_iter().flatten() {
            self.check_live(bound)?;
        }
        if self.depth_requested && self.depth_view.is_none() && !self.warned_missing_depth {
            log::warn!("depth texture requested but not supplied, sampling zero depth");
            self.warned_missing_depth = true;
        }

        let twin = if needs_twin(src, dst, bindings) {
            let key = lookup(&self.targets, dst)?.key();
            Some(self.take_twin(key))
        } else {
            None
        };

        // One submission per pass so each sees its own uniform values.
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&bindings.uniforms));
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(pass.label()),
        });
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        {
            let source = lookup(&self.targets, src)?;
            let destination = lookup(&self.targets, dst)?;
            let fg_overlap_view = match bindings.fg_overlap {
                Some(handle) => &lookup(&self.targets, handle)?.color_view,
                None => &self.default_texture_view,
            };
            let low_rez_view = match bindings.low_rez {
                Some(handle) => &lookup(&self.targets, handle)?.color_view,
                None => &self.default_texture_view,
            };
            let depth_view = self.depth_view.as_ref().unwrap_or(&self.default_depth_view);
            let main_sampler = match source.filter {
                FilterMode::Bilinear => &self.linear_sampler,
                FilterMode::Point => &self.point_sampler,
            };

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("DOF Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&source.color_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(depth_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(fg_overlap_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(low_rez_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(main_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                    },
                ],
            });

            let output = twin.as_ref().unwrap_or(destination);
            let pipeline = self.pipelines.get_or_create(
                &self.device,
                pass,
                output.format,
                &self.vert_module,
                &self.frag_module,
                &self.bind_group_layout,
            );
            dof::render_dof_pass(&mut encoder, pass.label(), output, pipeline, &bind_group);
            if let Some(twin) = &twin {
                dof::copy_target(&mut encoder, twin, destination);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(twin) = twin {
            self.pool.give(twin);
        }
        self.finish_scope(pass.label())
    }

    fn report(&mut self, error: &DofError) {
        log::error!("{error}");
        self.last_error = Some(error.to_string());
    }
}
