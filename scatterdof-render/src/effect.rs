//! The depth-of-field effect instance and its per-frame entry point.

use scatterdof_shared::uniforms::DofUniforms;

use crate::camera::FocalProjection;
use crate::coc::{self, CocBuffers};
use crate::composite::{self, CompositeInputs};
use crate::error::{DofError, Result};
use crate::params::BlurParameters;
use crate::settings::DofSettings;
use crate::substrate::{RenderSubstrate, SourceBuffer, TargetHandle};
use crate::targets::{FrameTargets, TargetLayout};

/// Scatter DoF effect attached to one camera.
///
/// Lifecycle: [`on_enable`](Self::on_enable) once at setup, then
/// [`render`](Self::render) every frame. A failed capability check disables
/// the effect until [`reinitialize`](Self::reinitialize); while disabled every
/// frame is a plain copy.
pub struct DepthOfFieldScatter {
    /// Identifies the owner in diagnostics.
    pub name: String,
    pub settings: DofSettings,
    disabled: bool,
    last_params: Option<BlurParameters>,
}

impl DepthOfFieldScatter {
    pub fn new(name: impl Into<String>, settings: DofSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            disabled: false,
            last_params: None,
        }
    }

    pub fn on_enable<S: RenderSubstrate + ?Sized>(&mut self, substrate: &mut S) {
        substrate.request_depth_texture();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Clears the self-disable flag and cached parameters.
    pub fn reinitialize(&mut self) {
        self.disabled = false;
        self.last_params = None;
    }

    /// Parameters derived by the most recent rendered frame.
    pub fn last_params(&self) -> Option<&BlurParameters> {
        self.last_params.as_ref()
    }

    /// Returns false when the effect cannot run. The first failure is reported
    /// and sticks; later calls do not query the substrate again.
    pub fn check_resources<S: RenderSubstrate + ?Sized>(&mut self, substrate: &mut S) -> bool {
        if self.disabled {
            return false;
        }
        if !substrate.supports_effect() {
            self.disabled = true;
            log::warn!("{}: disabling depth of field", self.name);
            substrate.report(&DofError::UnsupportedPlatform);
            return false;
        }
        true
    }

    /// Renders one frame from `source` into `destination`.
    ///
    /// The source buffer is used as scratch for the CoC passes. Every
    /// temporary acquired here is released before returning, on error too.
    pub fn render<S, P>(
        &mut self,
        substrate: &mut S,
        camera: &P,
        source: &SourceBuffer,
        destination: TargetHandle,
    ) -> Result<()>
    where
        S: RenderSubstrate + ?Sized,
        P: FocalProjection + ?Sized,
    {
        if !self.check_resources(substrate) {
            return substrate.copy(source.handle, destination);
        }

        let settings = &self.settings;
        let params = BlurParameters::derive(settings, camera);
        self.last_params = Some(params);

        let layout = TargetLayout::new(source, settings.blur_resolution, settings.foreground_blur);
        log::debug!(
            "{}: dof {}x{} divider {} hdr {} fg {} focal01 {:.4}",
            self.name,
            source.width,
            source.height,
            layout.divider,
            source.format.is_hdr(),
            settings.foreground_blur,
            params.focal_distance01,
        );

        let uniforms = DofUniforms::new(params.curve_params(), source.width, source.height);

        let mut frame = FrameTargets::new(substrate);
        let scene = layout.scene.map(|desc| frame.acquire(&desc)).transpose()?;
        // Two low buffers; only the second is written by the passes.
        let _low = frame.acquire(&layout.low)?;
        let low2 = frame.acquire(&layout.low)?;

        let buffers = CocBuffers {
            source: source.handle,
            scene,
            low: low2,
            foreground: layout.foreground,
        };
        let (coc, uniforms) = coc::build_coc_map(&mut frame, &buffers, &params, uniforms)?;

        composite::composite(
            frame.substrate(),
            &CompositeInputs {
                owner: &self.name,
                source: source.handle,
                destination,
                coc,
                blur_type: settings.blur_type,
                resolution: settings.blur_resolution,
                visualize_focus: settings.visualize_focus,
                aperture_size: params.aperture_size,
                uniforms,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::DofCamera;
    use crate::recording::{RecordingSubstrate, SubstrateOp};
    use crate::substrate::PixelFormat;
    use glam::Vec3;
    use scatterdof_shared::passes::{BlurResolution, BlurType, PassId};

    struct Scene {
        sub: RecordingSubstrate,
        source: SourceBuffer,
        destination: TargetHandle,
        camera: DofCamera,
    }

    fn scene(sub: RecordingSubstrate) -> Scene {
        let mut sub = sub;
        let handle = sub.register_external("source", 1280, 720, PixelFormat::Rgba16Float);
        let destination = sub.register_external("destination", 1280, 720, PixelFormat::Rgba16Float);
        Scene {
            sub,
            source: SourceBuffer { handle, width: 1280, height: 720, format: PixelFormat::Rgba16Float },
            destination,
            camera: DofCamera::new(Vec3::ZERO, Vec3::NEG_Z, 0.3, 100.0),
        }
    }

    fn effect(settings: DofSettings) -> DepthOfFieldScatter {
        DepthOfFieldScatter::new("Main Camera", settings)
    }

    fn render(fx: &mut DepthOfFieldScatter, s: &mut Scene) -> Result<()> {
        fx.render(&mut s.sub, &s.camera, &s.source, s.destination)
    }

    #[test]
    fn test_poisson_low_without_foreground() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings {
            blur_type: BlurType::Poisson,
            blur_resolution: BlurResolution::Low,
            foreground_blur: false,
            visualize_focus: false,
            ..Default::default()
        });
        render(&mut fx, &mut s).unwrap();

        assert_eq!(s.sub.pass_ids(), vec![0, 6, 6, 8, 10]);
        assert!(s.sub.passes().iter().all(|p| p.bindings.fg_overlap.is_none()));
        let last = *s.sub.passes().last().unwrap();
        assert_eq!(last.dst, s.destination);
        assert_eq!(s.sub.acquire_count(), 3);
        assert_eq!(s.sub.release_count(), 3);
        assert_eq!(s.sub.live_count(), 0);
    }

    #[test]
    fn test_production_high_with_foreground() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings {
            blur_type: BlurType::Production,
            blur_resolution: BlurResolution::High,
            foreground_blur: true,
            aperture_size: 3.0,
            foreground_overlap: 1.0,
            ..Default::default()
        });
        render(&mut fx, &mut s).unwrap();

        assert_eq!(s.sub.pass_ids(), vec![4, 2, 2, 7, 3, 6, 8, 11]);
        let passes = s.sub.passes();
        let adj = 3.0 * 1.0 * 0.225;
        assert_eq!(passes[1].bindings.uniforms.offsets, [0.0, adj, 0.0, adj]);
        assert_eq!(passes[2].bindings.uniforms.offsets, [adj, 0.0, 0.0, adj]);
        // High resolution: the CoC lives in the source, still bound as low rez.
        assert_eq!(passes[7].bindings.low_rez, Some(s.source.handle));
        assert_eq!(passes[7].bindings.uniforms.offsets, [0.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_foreground_acquires_one_extra_buffer() {
        for resolution in [BlurResolution::High, BlurResolution::Low] {
            let mut plain = scene(RecordingSubstrate::new());
            let mut with_fg = scene(RecordingSubstrate::new());
            let base = DofSettings { blur_resolution: resolution, ..Default::default() };
            render(&mut effect(base.clone()), &mut plain).unwrap();
            render(&mut effect(DofSettings { foreground_blur: true, ..base }), &mut with_fg).unwrap();

            assert_eq!(with_fg.sub.acquire_count(), plain.sub.acquire_count() + 1);
            assert_eq!(plain.sub.acquire_count(), plain.sub.release_count());
            assert_eq!(with_fg.sub.acquire_count(), with_fg.sub.release_count());
        }
    }

    #[test]
    fn test_low_resolution_coc_in_scene_buffer() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings::default());
        render(&mut fx, &mut s).unwrap();

        let scene_handle = s
            .sub
            .ops
            .iter()
            .find_map(|op| match op {
                SubstrateOp::Acquire { handle, desc } if desc.width == 640 => Some(*handle),
                _ => None,
            })
            .unwrap();
        let blur = *s.sub.passes().last().unwrap();
        assert_eq!(blur.pass.index(), 12);
        assert_eq!(blur.bindings.low_rez, Some(scene_handle));
        assert_eq!(blur.src, s.source.handle);
    }

    #[test]
    fn test_unsupported_copies_and_reports_once() {
        let mut s = scene(RecordingSubstrate::unsupported());
        let mut fx = effect(DofSettings { foreground_blur: true, ..Default::default() });

        for _ in 0..3 {
            render(&mut fx, &mut s).unwrap();
        }

        assert!(fx.is_disabled());
        assert_eq!(s.sub.copy_count(), 3);
        assert!(s.sub.passes().is_empty());
        assert_eq!(s.sub.acquire_count(), 0);
        assert_eq!(s.sub.release_count(), 0);
        assert_eq!(s.sub.reports, vec![DofError::UnsupportedPlatform]);
        assert_eq!(s.sub.capability_checks(), 1);
        assert!(s
            .sub
            .ops
            .iter()
            .all(|op| *op == SubstrateOp::Copy { src: s.source.handle, dst: s.destination }));
    }

    #[test]
    fn test_disable_persists_until_reinitialize() {
        let mut s = scene(RecordingSubstrate::unsupported());
        let mut fx = effect(DofSettings::default());
        render(&mut fx, &mut s).unwrap();
        assert!(fx.is_disabled());

        // Hardware came back, but the flag sticks.
        s.sub.supported = true;
        render(&mut fx, &mut s).unwrap();
        assert!(s.sub.passes().is_empty());

        fx.reinitialize();
        render(&mut fx, &mut s).unwrap();
        assert!(!fx.is_disabled());
        assert_eq!(s.sub.passes().last().unwrap().pass, PassId::BlurProductionLow);
    }

    #[test]
    fn test_visualize_focus_runs_coc_then_visualization_only() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings { visualize_focus: true, ..Default::default() });
        render(&mut fx, &mut s).unwrap();

        assert_eq!(s.sub.pass_ids(), vec![0, 6, 6, 8, 1]);
        let writes_destination: Vec<_> = s
            .sub
            .passes()
            .iter()
            .filter(|p| p.dst == s.destination)
            .map(|p| p.pass)
            .collect();
        assert_eq!(writes_destination, vec![PassId::VisualizeFocus]);
        assert_eq!(s.sub.live_count(), 0);
    }

    #[test]
    fn test_invalid_style_falls_back_with_one_report() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings {
            blur_type: BlurType::Unknown(9),
            blur_resolution: BlurResolution::High,
            ..Default::default()
        });
        render(&mut fx, &mut s).unwrap();

        assert_eq!(s.sub.passes().last().unwrap().pass.index(), 10);
        assert_eq!(
            s.sub.reports,
            vec![DofError::InvalidBlurStyle { style: 9, owner: "Main Camera".into() }]
        );
    }

    #[test]
    fn test_pass_failure_releases_all_buffers() {
        let mut sub = RecordingSubstrate::new();
        sub.fail_on = Some(PassId::BlurProductionLow);
        let mut s = scene(sub);
        let mut fx = effect(DofSettings { foreground_blur: true, ..Default::default() });

        assert!(render(&mut fx, &mut s).is_err());
        assert_eq!(s.sub.acquire_count(), 4);
        assert_eq!(s.sub.release_count(), 4);
        assert_eq!(s.sub.live_count(), 0);
    }

    #[test]
    fn test_last_params_overwritten_each_frame() {
        let mut s = scene(RecordingSubstrate::new());
        let mut fx = effect(DofSettings { focal_point: 10.3, ..Default::default() });
        assert!(fx.last_params().is_none());

        render(&mut fx, &mut s).unwrap();
        let first = *fx.last_params().unwrap();

        fx.settings.focal_target = Some(Vec3::new(0.0, 0.0, -50.0));
        render(&mut fx, &mut s).unwrap();
        let second = *fx.last_params().unwrap();

        assert_ne!(first.focal_distance01, second.focal_distance01);
        assert_eq!(second.focal_distance01, s.camera.project_depth01(Vec3::new(0.0, 0.0, -50.0)));
    }

    #[test]
    fn test_on_enable_requests_depth() {
        let mut sub = RecordingSubstrate::new();
        let mut fx = effect(DofSettings::default());
        fx.on_enable(&mut sub);
        assert_eq!(sub.ops, vec![SubstrateOp::RequestDepth]);
    }
}
