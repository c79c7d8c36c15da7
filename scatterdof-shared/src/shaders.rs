//! Embedded WGSL shared by every scatter DoF backend.
//!
//! The per-pixel kernels themselves are supplied by the host: a fragment
//! module is appended to [`DOF_BINDINGS`] and must export one entry point per
//! [`PassId`](crate::passes::PassId).

pub const FULLSCREEN_QUAD_VERT: &str = include_str!("../shaders/fullscreen_quad.wgsl");
pub const DOF_BINDINGS: &str = include_str!("../shaders/dof_bindings.wgsl");
/// Standalone resampling copy, independent of the host fragment module.
pub const BLIT_FRAG: &str = include_str!("../shaders/blit.wgsl");

/// Prepends the shared binding prelude to a host fragment module.
pub fn with_dof_bindings(fragment_source: &str) -> String {
    format!("{DOF_BINDINGS}\n{fragment_source}")
}

/// Entry points from `passes` that `fragment_source` does not declare.
pub fn missing_entry_points(
    fragment_source: &str,
    passes: impl IntoIterator<Item = crate::passes::PassId>,
) -> Vec<&'static str> {
    passes
        .into_iter()
        .map(|p| p.entry_point())
        .filter(|name| !declares_function(fragment_source, name))
        .collect()
}

fn declares_function(source: &str, name: &str) -> bool {
    source.match_indices("fn ").any(|(at, _)| {
        let rest = source[at + 3..].trim_start();
        rest.strip_prefix(name)
            .map(|tail| tail.trim_start().starts_with('('))
            .unwrap_or(false)
    })
}
