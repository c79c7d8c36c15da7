//! Pass identifiers and blur style selection for the scatter DoF pipeline.
//!
//! Pass numbers are stable keys shared with the per-pixel programs; gaps
//! (5, 9) are intentionally unassigned.
use serde::{Deserialize, Serialize};

/// A single per-pixel operation of the DoF shader.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassId {
    /// Capture foreground and background CoC from scratch.
    CocFull = 0,
    /// Debug view of the focal curve.
    VisualizeFocus = 1,
    /// One axis of the foreground CoC dilation (axis taken from offsets).
    DilateForeground = 2,
    /// Capture CoC when foreground was already isolated.
    CocForegroundHandled = 3,
    /// Capture foreground CoC only, in alpha.
    CaptureForeground = 4,
    Downsample = 6,
    /// Merge dilated foreground CoC back into the full-resolution source.
    ApplyForeground = 7,
    /// Merge a low resolution CoC buffer back into the CoC buffer.
    MergeLowRez = 8,
    BlurPoissonLow = 10,
    BlurProductionHigh = 11,
    BlurProductionLow = 12,
    BlurPoissonHigh = 13,
    BlurMovieHigh = 14,
    BlurMovieLow = 15,
}

impl PassId {
    pub const ALL: [PassId; 14] = [
        PassId::CocFull,
        PassId::VisualizeFocus,
        PassId::DilateForeground,
        PassId::CocForegroundHandled,
        PassId::CaptureForeground,
        PassId::Downsample,
        PassId::ApplyForeground,
        PassId::MergeLowRez,
        PassId::BlurPoissonLow,
        PassId::BlurProductionHigh,
        PassId::BlurProductionLow,
        PassId::BlurPoissonHigh,
        PassId::BlurMovieHigh,
        PassId::BlurMovieLow,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.index() == index)
    }

    /// WGSL fragment entry point implementing this pass.
    pub fn entry_point(self) -> &'static str {
        match self {
            PassId::CocFull => "fs_coc_full",
            PassId::VisualizeFocus => "fs_visualize_focus",
            PassId::DilateForeground => "fs_dilate_fg",
            PassId::CocForegroundHandled => "fs_coc_fg_handled",
            PassId::CaptureForeground => "fs_capture_fg_coc",
            PassId::Downsample => "fs_downsample",
            PassId::ApplyForeground => "fs_apply_fg_coc",
            PassId::MergeLowRez => "fs_merge_low_rez",
            PassId::BlurPoissonLow => "fs_blur_poisson_low",
            PassId::BlurProductionHigh => "fs_blur_production_high",
            PassId::BlurProductionLow => "fs_blur_production_low",
            PassId::BlurPoissonHigh => "fs_blur_poisson_high",
            PassId::BlurMovieHigh => "fs_blur_movie_high",
            PassId::BlurMovieLow => "fs_blur_movie_low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassId::CocFull => "DOF CoC",
            PassId::VisualizeFocus => "DOF Visualize Focus",
            PassId::DilateForeground => "DOF FG Dilate",
            PassId::CocForegroundHandled => "DOF CoC (FG handled)",
            PassId::CaptureForeground => "DOF FG Capture",
            PassId::Downsample => "DOF Downsample",
            PassId::ApplyForeground => "DOF FG Apply",
            PassId::MergeLowRez => "DOF Merge Low Rez",
            PassId::BlurPoissonLow => "DOF Blur Poisson Low",
            PassId::BlurProductionHigh => "DOF Blur Production High",
            PassId::BlurProductionLow => "DOF Blur Production Low",
            PassId::BlurPoissonHigh => "DOF Blur Poisson High",
            PassId::BlurMovieHigh => "DOF Blur Movie High",
            PassId::BlurMovieLow => "DOF Blur Movie Low",
        }
    }
}

/// Blur kernel family. `Unknown` carries a raw key that matched none of the
/// known styles (e.g. from a settings file or a host enum that grew).
/// Deserializing `Unknown(0..=2)` yields the matching known style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "RawBlurType")]
pub enum BlurType {
    Poisson,
    #[default]
    Production,
    Movie,
    Unknown(u32),
}

impl BlurType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => BlurType::Poisson,
            1 => BlurType::Production,
            2 => BlurType::Movie,
            other => BlurType::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            BlurType::Poisson => 0,
            BlurType::Production => 1,
            BlurType::Movie => 2,
            BlurType::Unknown(raw) => raw,
        }
    }

    /// Row in [`BLUR_PASS_TABLE`], `None` for unrecognized styles.
    fn table_row(self) -> Option<usize> {
        match self {
            BlurType::Poisson => Some(0),
            BlurType::Production => Some(1),
            BlurType::Movie => Some(2),
            BlurType::Unknown(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawBlurType {
    Poisson,
    Production,
    Movie,
    Unknown(u32),
}

impl From<RawBlurType> for BlurType {
    fn from(raw: RawBlurType) -> Self {
        match raw {
            RawBlurType::Poisson => BlurType::Poisson,
            RawBlurType::Production => BlurType::Production,
            RawBlurType::Movie => BlurType::Movie,
            RawBlurType::Unknown(key) => BlurType::from_raw(key),
        }
    }
}

/// Working resolution of the blur buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurResolution {
    High,
    #[default]
    Low,
}

impl BlurResolution {
    /// Factor scratch buffers are downsampled by relative to the source.
    pub fn divider(self) -> u32 {
        match self {
            BlurResolution::High => 1,
            BlurResolution::Low => 2,
        }
    }

    fn table_column(self) -> usize {
        if self.divider() > 1 {
            1
        } else {
            0
        }
    }
}

/// Blur pass per style (rows: Poisson, Production, Movie) and resolution
/// (columns: High, Low).
pub const BLUR_PASS_TABLE: [[PassId; 2]; 3] = [
    [PassId::BlurPoissonHigh, PassId::BlurPoissonLow],
    [PassId::BlurProductionHigh, PassId::BlurProductionLow],
    [PassId::BlurMovieHigh, PassId::BlurMovieLow],
];

/// Pass used when the style is not in the table.
pub const FALLBACK_BLUR_PASS: PassId = PassId::BlurPoissonLow;

/// Looks up the blur pass. `None` means the style is unrecognized; callers
/// report it and use [`FALLBACK_BLUR_PASS`].
pub fn blur_pass(blur_type: BlurType, resolution: BlurResolution) -> Option<PassId> {
    let row = blur_type.table_row()?;
    Some(BLUR_PASS_TABLE[row][resolution.table_column()])
}
