//! Scratch buffer sizing and per-frame scoped acquisition.

use scatterdof_shared::passes::BlurResolution;

use crate::error::Result;
use crate::substrate::{FilterMode, RenderSubstrate, SourceBuffer, TargetDesc, TargetHandle};

/// Sizes of every scratch buffer one frame needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetLayout {
    pub divider: u32,
    /// Coarse scene/CoC buffer, only in reduced-resolution mode.
    pub scene: Option<TargetDesc>,
    /// The two bilinear low-resolution buffers.
    pub low: TargetDesc,
    /// Foreground CoC scratch, only with foreground blur.
    pub foreground: Option<TargetDesc>,
}

impl TargetLayout {
    pub fn new(source: &SourceBuffer, resolution: BlurResolution, foreground_blur: bool) -> Self {
        let divider = resolution.divider();
        let (w, h) = (source.width, source.height);
        let scaled = |label: &'static str, div: u32, filter: FilterMode| TargetDesc {
            label,
            width: (w / div).max(1),
            height: (h / div).max(1),
            format: source.format,
            filter,
        };

        Self {
            divider,
            scene: (divider > 1).then(|| scaled("DOF Scene", divider, FilterMode::default())),
            low: scaled("DOF Low", 2 * divider, FilterMode::Bilinear),
            foreground: foreground_blur.then(|| scaled("DOF FG CoC", 2 * divider, FilterMode::default())),
        }
    }

    /// Number of buffers acquired over one frame.
    pub fn acquire_count(&self) -> usize {
        2 + self.scene.is_some() as usize + self.foreground.is_some() as usize
    }
}

/// Scoped set of temporaries for one frame. Everything still held is released
/// on drop, so early returns and `?` never leak a buffer.
pub struct FrameTargets<'a, S: RenderSubstrate + ?Sized> {
    substrate: &'a mut S,
    held: Vec<TargetHandle>,
}

impl<'a, S: RenderSubstrate + ?Sized> FrameTargets<'a, S> {
    pub fn new(substrate: &'a mut S) -> Self {
        Self { substrate, held: Vec::with_capacity(4) }
    }

    pub fn acquire(&mut self, desc: &TargetDesc) -> Result<TargetHandle> {
        let handle = self.substrate.acquire_temporary(desc)?;
        log::trace!("acquired {} {}x{} as {:?}", desc.label, desc.width, desc.height, handle);
        self.held.push(handle);
        Ok(handle)
    }

    /// Releases one buffer before the end of the frame. Unknown handles are ignored.
    pub fn release(&mut self, handle: TargetHandle) {
        if let Some(i) = self.held.iter().position(|h| *h == handle) {
            self.held.remove(i);
            self.substrate.release_temporary(handle);
        }
    }

    pub fn substrate(&mut self) -> &mut S {
        self.substrate
    }

    pub fn held(&self) -> &[TargetHandle] {
        &self.held
    }
}

impl<S: RenderSubstrate + ?Sized> Drop for FrameTargets<'_, S> {
    fn drop(&mut self) {
        for handle in self.held.drain(..) {
            self.substrate.release_temporary(handle);
        }
    }
}
