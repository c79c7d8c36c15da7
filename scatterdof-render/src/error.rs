//! Error types for the scatter DoF pipeline

use thiserror::Error;

use crate::substrate::TargetHandle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DofError {
    /// Capability check failed; the effect disables itself.
    #[error("depth of field is not supported on this platform, disabling effect")]
    UnsupportedPlatform,

    /// A blur style with no entry in the pass table reached the compositor.
    #[error("DOF couldn't find valid blur type {style} (on {owner})")]
    InvalidBlurStyle { style: u32, owner: String },

    /// A pass referenced a buffer the substrate does not know (released or never acquired).
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetHandle),

    /// Host substrate failure.
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, DofError>;
