//! Parameter derivation. Clamps the tunables and converts the focal
//! settings to normalized depth-space curve parameters.

use scatterdof_shared::uniforms::MIN_CURVE_WIDTH;

use crate::camera::FocalProjection;
use crate::settings::DofSettings;

pub const MIN_SMOOTHNESS: f32 = 0.4;
pub const MIN_FOCAL_SIZE: f32 = 0.00001;
/// Curve strengths below this are snapped to zero.
pub const MIN_CURVE: f32 = 0.01;

/// Validated per-frame blur parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurParameters {
    /// Focal plane depth, normalized to the clip range.
    pub focal_distance01: f32,
    pub smoothness: f32,
    pub foreground_curve: f32,
    pub background_curve: f32,
    /// Clamped focal size in world units.
    pub focal_size: f32,
    /// Focal size normalized to the clip range.
    pub focal_size01: f32,
    pub aperture_size: f32,
    pub foreground_overlap: f32,
    pub focal_start_curve: f32,
    /// Always equal to `focal_start_curve`: widths are symmetric, only the
    /// curve strengths differ between foreground and background.
    pub focal_end_curve: f32,
}

impl BlurParameters {
    /// Derives parameters from raw settings. Projection goes through the
    /// camera collaborator exactly once.
    pub fn derive<P: FocalProjection + ?Sized>(settings: &DofSettings, camera: &P) -> Self {
        let smoothness = clamp_smoothness(settings.smoothness);
        let focal_size = clamp_focal_size(settings.focal_size);

        let focal_distance01 = match settings.focal_target {
            Some(target) => camera.project_depth01(target),
            None => camera.project_depth01(camera.point_at_distance(settings.focal_point)),
        };
        let focal_start_curve = focal_distance01 * smoothness;

        Self {
            focal_distance01,
            smoothness,
            foreground_curve: snap_curve(settings.foreground_curve),
            background_curve: snap_curve(settings.background_curve),
            focal_size,
            focal_size01: focal_size / camera.depth_range(),
            aperture_size: settings.aperture_size,
            foreground_overlap: settings.foreground_overlap,
            focal_start_curve,
            focal_end_curve: focal_start_curve,
        }
    }

    /// `curve_params` vector of the uniform block.
    pub fn curve_params(&self) -> [f32; 4] {
        [
            self.foreground_curve / nonzero_width(self.focal_start_curve),
            self.background_curve / nonzero_width(self.focal_end_curve),
            self.focal_size01 * 0.5,
            self.focal_distance01,
        ]
    }
}

pub fn clamp_smoothness(value: f32) -> f32 {
    if value < MIN_SMOOTHNESS {
        MIN_SMOOTHNESS
    } else {
        value
    }
}

pub fn clamp_focal_size(value: f32) -> f32 {
    if value < MIN_FOCAL_SIZE {
        MIN_FOCAL_SIZE
    } else {
        value
    }
}

/// Negative and near-zero curve strengths become exactly 0.
pub fn snap_curve(value: f32) -> f32 {
    if value < MIN_CURVE {
        0.0
    } else {
        value
    }
}

fn nonzero_width(width: f32) -> f32 {
    if width.abs() < MIN_CURVE_WIDTH {
        MIN_CURVE_WIDTH
    } else {
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::cell::RefCell;

    /// Projection stub that records every point it was asked to project.
    struct CountingProjector {
        near: f32,
        far: f32,
        projected: RefCell<Vec<Vec3>>,
    }

    impl CountingProjector {
        fn new(near: f32, far: f32) -> Self {
            Self { near, far, projected: RefCell::new(Vec::new()) }
        }
    }

    impl FocalProjection for CountingProjector {
        fn near_clip(&self) -> f32 {
            self.near
        }
        fn far_clip(&self) -> f32 {
            self.far
        }
        fn position(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn forward(&self) -> Vec3 {
            Vec3::NEG_Z
        }
        fn project_depth01(&self, world: Vec3) -> f32 {
            self.projected.borrow_mut().push(world);
            -world.z / 100.0
        }
    }

    #[test]
    fn test_smoothness_clamp() {
        for v in [-3.0, 0.0, 0.1, 0.399] {
            assert_eq!(clamp_smoothness(v), 0.4);
        }
        for v in [0.4, 0.41, 2.5, 100.0] {
            assert_eq!(clamp_smoothness(v), v);
        }
    }

    #[test]
    fn test_focal_size_clamp() {
        for v in [-1.0, 0.0, 0.000001] {
            assert_eq!(clamp_focal_size(v), 0.00001);
        }
        assert_eq!(clamp_focal_size(0.5), 0.5);
    }

    #[test]
    fn test_curve_snap() {
        for v in [-2.0, 0.0, 0.005, 0.0099] {
            assert_eq!(snap_curve(v), 0.0);
        }
        for v in [0.01, 0.5, 3.0] {
            assert_eq!(snap_curve(v), v);
        }
    }

    #[test]
    fn test_focal_target_takes_precedence() {
        let cam = CountingProjector::new(1.0, 101.0);
        let settings = DofSettings {
            focal_target: Some(Vec3::new(0.0, 0.0, -40.0)),
            focal_point: 10.0,
            ..Default::default()
        };
        let params = BlurParameters::derive(&settings, &cam);
        assert_eq!(*cam.projected.borrow(), vec![Vec3::new(0.0, 0.0, -40.0)]);
        assert_eq!(params.focal_distance01, 0.4);
    }

    #[test]
    fn test_focal_point_projects_synthetic_point() {
        let cam = CountingProjector::new(1.0, 101.0);
        let settings = DofSettings { focal_point: 21.0, ..Default::default() };
        let params = BlurParameters::derive(&settings, &cam);
        // (21 - near) along -Z from the origin.
        assert_eq!(*cam.projected.borrow(), vec![Vec3::new(0.0, 0.0, -20.0)]);
        assert_eq!(params.focal_distance01, 0.2);
    }

    #[test]
    fn test_derive_clamps_and_normalizes() {
        let cam = CountingProjector::new(1.0, 101.0);
        let settings = DofSettings {
            focal_point: 51.0,
            smoothness: 0.1,
            foreground_curve: 0.001,
            background_curve: -1.0,
            focal_size: 0.0,
            ..Default::default()
        };
        let p = BlurParameters::derive(&settings, &cam);
        assert_eq!(p.smoothness, 0.4);
        assert_eq!(p.foreground_curve, 0.0);
        assert_eq!(p.background_curve, 0.0);
        assert_eq!(p.focal_size, 0.00001);
        assert_eq!(p.focal_size01, 0.00001 / 100.0);
        assert_eq!(p.focal_start_curve, p.focal_distance01 * 0.4);
        assert_eq!(p.focal_start_curve, p.focal_end_curve);
        // Settings are not modified.
        assert_eq!(settings.smoothness, 0.1);
    }

    #[test]
    fn test_curve_params_layout() {
        let cam = CountingProjector::new(0.0, 100.0);
        let settings = DofSettings {
            focal_target: Some(Vec3::new(0.0, 0.0, -50.0)),
            smoothness: 2.0,
            foreground_curve: 2.0,
            background_curve: 0.5,
            focal_size: 10.0,
            ..Default::default()
        };
        let p = BlurParameters::derive(&settings, &cam);
        let c = p.curve_params();
        // start = end = 0.5 * 2.0
        assert_eq!(c, [2.0, 0.5, 0.05, 0.5]);
    }

    #[test]
    fn test_curve_params_finite_at_zero_focal_distance() {
        let cam = CountingProjector::new(0.0, 100.0);
        let settings = DofSettings { focal_target: Some(Vec3::ZERO), ..Default::default() };
        let p = BlurParameters::derive(&settings, &cam);
        assert_eq!(p.focal_start_curve, 0.0);
        assert!(p.curve_params().iter().all(|v| v.is_finite()));
    }
}
