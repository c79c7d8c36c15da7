//! Final composite: the only stage that writes the destination.

use scatterdof_shared::passes::{self, BlurResolution, BlurType, PassId, FALLBACK_BLUR_PASS};
use scatterdof_shared::uniforms::DofUniforms;

use crate::error::{DofError, Result};
use crate::substrate::{PassBindings, RenderSubstrate, TargetHandle};

pub struct CompositeInputs<'a> {
    /// Name of the owning effect, used in diagnostics.
    pub owner: &'a str,
    pub source: TargetHandle,
    pub destination: TargetHandle,
    /// Buffer holding the CoC map.
    pub coc: TargetHandle,
    pub blur_type: BlurType,
    pub resolution: BlurResolution,
    pub visualize_focus: bool,
    pub aperture_size: f32,
    pub uniforms: DofUniforms,
}

/// Picks the blur pass for a style and resolution. Unrecognized styles are
/// reported and fall back to pass 10.
pub fn select_blur_pass<S: RenderSubstrate + ?Sized>(
    substrate: &mut S,
    owner: &str,
    blur_type: BlurType,
    resolution: BlurResolution,
) -> PassId {
    match passes::blur_pass(blur_type, resolution) {
        Some(pass) => pass,
        None => {
            substrate.report(&DofError::InvalidBlurStyle {
                style: blur_type.raw(),
                owner: owner.to_string(),
            });
            FALLBACK_BLUR_PASS
        }
    }
}

/// Writes the destination: the focus visualization, or the selected blur.
pub fn composite<S: RenderSubstrate + ?Sized>(substrate: &mut S, inputs: &CompositeInputs<'_>) -> Result<()> {
    if inputs.visualize_focus {
        let bindings = PassBindings::new(inputs.uniforms);
        return substrate.run_pass(PassId::VisualizeFocus, inputs.source, inputs.destination, &bindings);
    }

    let pass = select_blur_pass(substrate, inputs.owner, inputs.blur_type, inputs.resolution);

    // The low rez binding is only sampled in low resolution mode.
    let bindings = PassBindings::new(inputs.uniforms.with_offsets([0.0, 0.0, 0.0, inputs.aperture_size]))
        .with_low_rez(inputs.coc);
    log::trace!("blur pass {} ({})", pass.index(), pass.label());
    substrate.run_pass(pass, inputs.source, inputs.destination, &bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingSubstrate;
    use crate::substrate::PixelFormat;

    fn inputs(sub: &mut RecordingSubstrate, blur_type: BlurType, resolution: BlurResolution) -> CompositeInputs<'static> {
        let source = sub.register_external("source", 32, 32, PixelFormat::Rgba8Unorm);
        let destination = sub.register_external("destination", 32, 32, PixelFormat::Rgba8Unorm);
        CompositeInputs {
            owner: "Main Camera",
            source,
            destination,
            coc: source,
            blur_type,
            resolution,
            visualize_focus: false,
            aperture_size: 3.5,
            uniforms: DofUniforms::new([0.1, 0.2, 0.3, 0.4], 32, 32).with_offsets([9.0; 4]),
        }
    }

    #[test]
    fn test_selection_is_total() {
        let mut sub = RecordingSubstrate::new();
        for style in [BlurType::Poisson, BlurType::Production, BlurType::Movie] {
            for res in [BlurResolution::High, BlurResolution::Low] {
                let pass = select_blur_pass(&mut sub, "cam", style, res);
                assert!((10..=15).contains(&pass.index()));
            }
        }
        assert!(sub.reports.is_empty());
    }

    #[test]
    fn test_unknown_style_reports_once_and_falls_back() {
        let mut sub = RecordingSubstrate::new();
        let pass = select_blur_pass(&mut sub, "Main Camera", BlurType::Unknown(42), BlurResolution::High);
        assert_eq!(pass.index(), 10);
        assert_eq!(
            sub.reports,
            vec![DofError::InvalidBlurStyle { style: 42, owner: "Main Camera".into() }]
        );
    }

    #[test]
    fn test_blur_binds_coc_and_aperture() {
        let mut sub = RecordingSubstrate::new();
        let inp = inputs(&mut sub, BlurType::Production, BlurResolution::High);
        composite(&mut sub, &inp).unwrap();
        let passes = sub.passes();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].pass.index(), 11);
        assert_eq!((passes[0].src, passes[0].dst), (inp.source, inp.destination));
        assert_eq!(passes[0].bindings.low_rez, Some(inp.coc));
        assert_eq!(passes[0].bindings.uniforms.offsets, [0.0, 0.0, 0.0, 3.5]);
        assert_eq!(passes[0].bindings.uniforms.curve_params, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_visualize_focus_skips_blur_and_selection() {
        let mut sub = RecordingSubstrate::new();
        let mut inp = inputs(&mut sub, BlurType::Unknown(5), BlurResolution::Low);
        inp.visualize_focus = true;
        composite(&mut sub, &inp).unwrap();
        assert_eq!(sub.pass_ids(), vec![1]);
        assert!(sub.reports.is_empty());
    }

    #[test]
    fn test_unknown_style_still_renders() {
        let mut sub = RecordingSubstrate::new();
        let inp = inputs(&mut sub, BlurType::Unknown(3), BlurResolution::Low);
        composite(&mut sub, &inp).unwrap();
        assert_eq!(sub.pass_ids(), vec![10]);
        assert_eq!(sub.reports.len(), 1);
    }
}
