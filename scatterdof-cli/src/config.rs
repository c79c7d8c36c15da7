//! Settings file loading. Every table is optional and fills from defaults.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use scatterdof_render::substrate::PixelFormat;
use scatterdof_render::{DofCamera, DofSettings};

use crate::cli::InputArgs;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Name of the owning camera, shown in diagnostics.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Source is a half-float buffer.
    pub hdr: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            name: "Main Camera".into(),
            width: 1920,
            height: 1080,
            hdr: true,
        }
    }
}

impl FrameConfig {
    pub fn format(&self) -> PixelFormat {
        if self.hdr {
            PixelFormat::Rgba16Float
        } else {
            PixelFormat::Rgba8Unorm
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub settings: DofSettings,
    pub camera: DofCamera,
    pub frame: FrameConfig,
}

impl PlanConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid DoF settings file")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        log::debug!("loaded settings from {}", path.display());
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Loads `args.config` (or defaults) and applies the overrides.
    pub fn resolve(args: &InputArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(args);
        Ok(config)
    }

    pub fn apply(&mut self, args: &InputArgs) {
        let settings = &mut self.settings;
        if let Some(style) = args.blur_type {
            settings.blur_type = style.into();
        }
        if let Some(resolution) = args.resolution {
            settings.blur_resolution = resolution.into();
        }
        settings.foreground_blur |= args.foreground;
        settings.visualize_focus |= args.visualize;
        if let Some(focal_point) = args.focal_point {
            settings.focal_point = focal_point;
            settings.focal_target = None;
        }
        if let Some(aperture) = args.aperture {
            settings.aperture_size = aperture;
        }
        if let Some(width) = args.width {
            self.frame.width = width;
        }
        if let Some(height) = args.height {
            self.frame.height = height;
        }
    }
}
