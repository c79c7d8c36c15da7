//! Render target creation and pooling for the DoF scratch buffers.

use std::collections::HashMap;

use scatterdof_render::substrate::{FilterMode, PixelFormat};

/// Format of the depth fallback bound when the host has not supplied one.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Usages every DoF target needs: sampled, rendered into and copied both ways
/// (in-place passes render into a twin and copy back).
pub const TARGET_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// A color texture the passes read from or render into.
pub struct RenderTarget {
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: FilterMode,
    /// Acquired from the pool rather than registered by the host.
    pub temporary: bool,
}

impl RenderTarget {
    /// Wraps a host texture. Fails if it lacks a usage the passes need.
    pub fn from_texture(texture: wgpu::Texture, filter: FilterMode) -> Result<Self, String> {
        let missing = TARGET_USAGE - texture.usage();
        if !missing.is_empty() {
            return Err(format!("texture is missing usages {missing:?}"));
        }
        let color_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            width: texture.width(),
            height: texture.height(),
            format: texture.format(),
            color_view,
            color_texture: texture,
            filter,
            temporary: false,
        })
    }

    pub fn key(&self) -> TargetKey {
        TargetKey {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

pub fn to_wgpu_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

pub fn from_wgpu_format(format: wgpu::TextureFormat) -> Option<PixelFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(PixelFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(PixelFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(PixelFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(PixelFormat::Rgba16Float),
        wgpu::TextureFormat::Rgba32Float => Some(PixelFormat::Rgba32Float),
        _ => None,
    }
}

pub fn texture_size(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}

/// Create a render target with a specific format.
pub fn create_render_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
    format: wgpu::TextureFormat,
    filter: FilterMode,
) -> RenderTarget {
    let size = texture_size(width, height);

    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: TARGET_USAGE,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    RenderTarget {
        color_texture,
        color_view,
        width: size.width,
        height: size.height,
        format,
        filter,
        temporary: true,
    }
}

/// 1x1 black texture bound for unused color inputs.
pub fn create_default_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("DOF Default 1x1"),
        size: texture_size(1, 1),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0u8, 0, 0, 0],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        texture_size(1, 1),
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// 1x1 depth texture bound until the host supplies scene depth. Reads as
/// zero; depth textures cannot be written from the queue.
pub fn create_default_depth_texture(device: &wgpu::Device) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("DOF Default Depth 1x1"),
        size: texture_size(1, 1),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl TargetKey {
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let size = texture_size(width, height);
        Self {
            width: size.width,
            height: size.height,
            format,
        }
    }
}

/// Pool requests a key may go without before its free targets are dropped.
/// One frame makes fewer than a dozen requests, so this spans several frames.
pub const POOL_IDLE_REQUESTS: u64 = 64;

/// Something the temporary pool can hold.
pub trait Pooled {
    fn key(&self) -> TargetKey;
    fn set_filter(&mut self, filter: FilterMode);
}

impl Pooled for RenderTarget {
    fn key(&self) -> TargetKey {
        RenderTarget::key(self)
    }

    fn set_filter(&mut self, filter: FilterMode) {
        self.filter = filter;
    }
}

struct Slot<T> {
    free: Vec<T>,
    last_request: u64,
}

/// Released temporaries kept for reuse, keyed by size and format. Every
/// `take` counts as a request; keys not requested within
/// [`POOL_IDLE_REQUESTS`] requests are evicted, so sizes left behind by a
/// resize do not stay resident.
pub struct TemporaryPool<T = RenderTarget> {
    slots: HashMap<TargetKey, Slot<T>>,
    requests: u64,
}

impl<T> Default for TemporaryPool<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            requests: 0,
        }
    }
}

impl<T: Pooled> TemporaryPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a pooled target matching `key`, switching it to `filter`.
    pub fn take(&mut self, key: &TargetKey, filter: FilterMode) -> Option<T> {
        self.requests += 1;
        let requests = self.requests;
        let slot = self.slots.entry(*key).or_insert_with(|| Slot {
            free: Vec::new(),
            last_request: requests,
        });
        slot.last_request = requests;
        let taken = slot.free.pop().map(|mut target| {
            target.set_filter(filter);
            target
        });
        self.evict_idle();
        taken
    }

    pub fn give(&mut self, target: T) {
        let requests = self.requests;
        self.slots
            .entry(target.key())
            .or_insert_with(|| Slot {
                free: Vec::new(),
                last_request: requests,
            })
            .free
            .push(target);
    }

    pub fn free_count(&self) -> usize {
        self.slots.values().map(|slot| slot.free.len()).sum()
    }

    /// Drops every pooled texture.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn evict_idle(&mut self) {
        let requests = self.requests;
        self.slots.retain(|key, slot| {
            let keep = requests - slot.last_request <= POOL_IDLE_REQUESTS;
            if !keep && !slot.free.is_empty() {
                log::debug!(
                    "evicting {} idle DOF targets {}x{} {:?}",
                    slot.free.len(),
                    key.width,
                    key.height,
                    key.format
                );
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping_round_trips() {
        for format in [
            PixelFormat::Rgba8Unorm,
            PixelFormat::Rgba8UnormSrgb,
            PixelFormat::Bgra8UnormSrgb,
            PixelFormat::Rgba16Float,
            PixelFormat::Rgba32Float,
        ] {
            assert_eq!(from_wgpu_format(to_wgpu_format(format)), Some(format));
        }
        assert_eq!(from_wgpu_format(wgpu::TextureFormat::R16Float), None);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let size = texture_size(0, 7);
        assert_eq!((size.width, size.height), (1, 7));
        let key = TargetKey::new(0, 0, wgpu::TextureFormat::Rgba16Float);
        assert_eq!((key.width, key.height), (1, 1));
    }

    #[test]
    fn test_target_usage_covers_in_place_passes() {
        assert!(TARGET_USAGE.contains(wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST));
        assert!(TARGET_USAGE.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(TARGET_USAGE.contains(wgpu::TextureUsages::TEXTURE_BINDING));
    }

    struct FakeTarget {
        key: TargetKey,
        filter: FilterMode,
        id: u32,
    }

    impl Pooled for FakeTarget {
        fn key(&self) -> TargetKey {
            self.key
        }

        fn set_filter(&mut self, filter: FilterMode) {
            self.filter = filter;
        }
    }

    fn fake(width: u32, height: u32, id: u32) -> FakeTarget {
        FakeTarget {
            key: TargetKey::new(width, height, wgpu::TextureFormat::Rgba16Float),
            filter: FilterMode::Point,
            id,
        }
    }

    #[test]
    fn test_empty_pool() {
        let mut pool: TemporaryPool = TemporaryPool::new();
        let key = TargetKey::new(4, 4, wgpu::TextureFormat::Rgba8Unorm);
        assert!(pool.take(&key, FilterMode::Point).is_none());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_reuses_by_key_and_switches_filter() {
        let mut pool = TemporaryPool::new();
        pool.give(fake(8, 8, 1));
        pool.give(fake(4, 4, 2));

        let other_format = TargetKey::new(8, 8, wgpu::TextureFormat::Rgba8Unorm);
        assert!(pool.take(&other_format, FilterMode::Point).is_none());

        let reused = pool.take(&TargetKey::new(8, 8, wgpu::TextureFormat::Rgba16Float), FilterMode::Bilinear).unwrap();
        assert_eq!(reused.id, 1);
        assert_eq!(reused.filter, FilterMode::Bilinear);
        assert_eq!(pool.free_count(), 1);

        pool.give(reused);
        let again = pool.take(&TargetKey::new(8, 8, wgpu::TextureFormat::Rgba16Float), FilterMode::Point).unwrap();
        assert_eq!(again.filter, FilterMode::Point);
    }

    #[test]
    fn test_pool_evicts_sizes_left_behind_by_resize() {
        let mut pool = TemporaryPool::new();
        let old = TargetKey::new(1920, 1080, wgpu::TextureFormat::Rgba16Float);
        let new = TargetKey::new(1280, 720, wgpu::TextureFormat::Rgba16Float);

        // Old size in steady use.
        for _ in 0..10 {
            let target = pool.take(&old, FilterMode::Point).unwrap_or_else(|| fake(1920, 1080, 0));
            pool.give(target);
        }
        assert_eq!(pool.free_count(), 1);

        // After the resize only the new size is requested.
        for _ in 0..POOL_IDLE_REQUESTS {
            let target = pool.take(&new, FilterMode::Point).unwrap_or_else(|| fake(1280, 720, 1));
            pool.give(target);
        }
        assert_eq!(pool.free_count(), 2);

        let target = pool.take(&new, FilterMode::Point).unwrap();
        pool.give(target);
        assert_eq!(pool.free_count(), 1);
        assert!(pool.take(&old, FilterMode::Point).is_none());
    }

    #[test]
    fn test_pool_keeps_keys_used_every_frame() {
        let mut pool = TemporaryPool::new();
        let keys = [(960, 540), (1920, 1080), (480, 270)];
        for frame in 0..100u32 {
            for (width, height) in keys {
                let key = TargetKey::new(width, height, wgpu::TextureFormat::Rgba16Float);
                let target = pool.take(&key, FilterMode::Point).unwrap_or_else(|| fake(width, height, frame));
                pool.give(target);
            }
        }
        assert_eq!(pool.free_count(), keys.len());
        for (width, height) in keys {
            let key = TargetKey::new(width, height, wgpu::TextureFormat::Rgba16Float);
            assert_eq!(pool.take(&key, FilterMode::Point).unwrap().id, 0);
        }
    }
}
