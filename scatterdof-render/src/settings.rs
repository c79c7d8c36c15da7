use glam::Vec3;
use serde::{Deserialize, Serialize};

use scatterdof_shared::passes::{BlurResolution, BlurType};

/// User-facing tunables of the effect. Values are clamped when parameters
/// are derived, never in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DofSettings {
    /// Isolate and dilate foreground CoC to soften silhouettes.
    pub foreground_blur: bool,
    /// Replace the blur with a view of the focal curve.
    pub visualize_focus: bool,
    /// Focal distance in world units, used when `focal_target` is unset.
    pub focal_point: f32,
    /// World-space focus target; takes precedence over `focal_point`.
    pub focal_target: Option<Vec3>,
    pub smoothness: f32,
    pub foreground_curve: f32,
    pub background_curve: f32,
    /// Half-width of the in-focus band, world units.
    pub focal_size: f32,
    pub aperture_size: f32,
    pub blur_type: BlurType,
    pub blur_resolution: BlurResolution,
    pub foreground_overlap: f32,
}

impl Default for DofSettings {
    fn default() -> Self {
        Self {
            foreground_blur: false,
            visualize_focus: false,
            focal_point: 1.0,
            focal_target: None,
            smoothness: 2.5,
            foreground_curve: 1.0,
            background_curve: 1.0,
            focal_size: 0.0,
            aperture_size: 2.25,
            blur_type: BlurType::Production,
            blur_resolution: BlurResolution::Low,
            foreground_overlap: 0.85,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: DofSettings = toml::from_str(
            r#"
            foreground_blur = true
            aperture_size = 4.0
            blur_type = "movie"
            blur_resolution = "high"
            "#,
        )
        .unwrap();
        assert!(settings.foreground_blur);
        assert_eq!(settings.aperture_size, 4.0);
        assert_eq!(settings.blur_type, BlurType::Movie);
        assert_eq!(settings.blur_resolution, BlurResolution::High);
        assert_eq!(settings.smoothness, 2.5);
        assert_eq!(settings.foreground_overlap, 0.85);
        assert!(settings.focal_target.is_none());
    }

    #[test]
    fn test_unknown_blur_type_from_toml() {
        let settings: DofSettings = toml::from_str("blur_type = { unknown = 7 }").unwrap();
        assert_eq!(settings.blur_type, BlurType::Unknown(7));
    }

    #[test]
    fn test_unknown_blur_type_with_known_key_is_normalized() {
        let settings: DofSettings = toml::from_str("blur_type = { unknown = 1 }").unwrap();
        assert_eq!(settings.blur_type, BlurType::Production);
        let settings: DofSettings = toml::from_str("blur_type = { unknown = 0 }").unwrap();
        assert_eq!(settings.blur_type, BlurType::Poisson);
        let settings: DofSettings = toml::from_str("blur_type = { unknown = 2 }").unwrap();
        assert_eq!(settings.blur_type, BlurType::Movie);
    }

    #[test]
    fn test_focal_target_from_toml() {
        let settings: DofSettings = toml::from_str("focal_target = [1.0, 2.0, -3.0]").unwrap();
        assert_eq!(settings.focal_target, Some(Vec3::new(1.0, 2.0, -3.0)));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let settings: DofSettings = toml::from_str("").unwrap();
        assert_eq!(settings, DofSettings::default());
    }
}
