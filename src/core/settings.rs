//! Tunable demo settings
//!
//! Saved and loaded as RON or JSON. Every section defaults, so a file only
//! needs the values it changes.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::EngineConfig;
use crate::renderer::shading::{DEFAULT_BIAS, DEFAULT_PENUMBRA};
use crate::renderer::{Camera, LightModel, LightProjection, LightSpace, ShadingModel, ShadowFilter};

/// Window section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: String::from("Penumbra"),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

/// Viewer camera section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(6.0, 12.0, 15.0),
            target: Vec3::ZERO,
            field_of_view: 60.0,
            near: 1.0,
            far: 2000.0,
        }
    }
}

/// Spot cone limits in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotSettings {
    pub inner: f32,
    pub outer: f32,
}

/// Light section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub position: Vec3,
    pub target: Vec3,
    /// Perspective frustum when set, orthographic box otherwise
    pub perspective: bool,
    /// Perspective field of view in degrees
    pub field_of_view: f32,
    pub projection_width: f32,
    pub projection_height: f32,
    pub near: f32,
    pub far: f32,
    /// Spot cone; directional light when absent
    pub spot: Option<SpotSettings>,
    /// Linear RGB light color
    pub color: Vec3,
}

impl Default for LightSettings {
    fn default() -> Self {
        let light = LightSpace::new();
        Self {
            position: light.position,
            target: light.target,
            perspective: false,
            field_of_view: 120.0,
            projection_width: light.width,
            projection_height: light.height,
            near: light.near,
            far: light.far,
            spot: None,
            color: light.color,
        }
    }
}

/// Shadow and shading section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub bias: f32,
    pub soft: bool,
    pub penumbra: f32,
    /// Factor for points outside the depth target; filter default if absent
    pub out_of_range: Option<f32>,
    /// Side length of the depth target in texels
    pub map_size: u32,
    pub show_frustum: bool,
    pub blinn_phong: bool,
    pub ambient_light: Vec3,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            bias: DEFAULT_BIAS,
            soft: false,
            penumbra: DEFAULT_PENUMBRA,
            out_of_range: None,
            map_size: 512,
            show_frustum: true,
            blinn_phong: false,
            ambient_light: Vec3::ZERO,
        }
    }
}

/// All demo settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub camera: CameraSettings,
    pub light: LightSettings,
    pub shadow: ShadowSettings,
}

impl Settings {
    /// Save to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SettingsError::SerializeError(e.to_string()))?;
        fs::write(path, text).map_err(|e| SettingsError::IoError(e.to_string()))
    }

    /// Load from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|e| SettingsError::IoError(e.to_string()))?;
        ron::from_str(&text).map_err(|e| SettingsError::DeserializeError(e.to_string()))
    }

    /// Save to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::SerializeError(e.to_string()))?;
        fs::write(path, text).map_err(|e| SettingsError::IoError(e.to_string()))
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|e| SettingsError::IoError(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| SettingsError::DeserializeError(e.to_string()))
    }

    /// Load by extension: `.json` as JSON, anything else as RON
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load_ron(path),
        }
    }

    /// Window configuration for the engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_title(self.window.title.clone())
            .with_size(self.window.width, self.window.height)
            .with_vsync(self.window.vsync)
    }

    /// Viewer camera for a target of `width` x `height`
    pub fn camera(&self, width: u32, height: u32) -> Camera {
        let mut camera = Camera::look_at(self.camera.position, self.camera.target, Vec3::Y);
        camera.fov = self.camera.field_of_view.to_radians();
        camera.near = self.camera.near;
        camera.far = self.camera.far;
        camera.set_aspect(width, height);
        camera
    }

    /// Light frustum and model for this frame
    pub fn light_space(&self) -> LightSpace {
        let light = &self.light;
        LightSpace {
            position: light.position,
            target: light.target,
            up: Vec3::Y,
            projection: LightProjection::from_flag(light.perspective, light.field_of_view.to_radians()),
            width: light.projection_width,
            height: light.projection_height,
            near: light.near,
            far: light.far,
            bias: self.shadow.bias,
            model: match light.spot {
                Some(spot) => LightModel::Spot {
                    inner_limit: spot.inner.to_radians(),
                    outer_limit: spot.outer.to_radians(),
                },
                None => LightModel::Directional,
            },
            color: light.color,
        }
    }

    /// Hard or soft comparison
    pub fn shadow_filter(&self) -> ShadowFilter {
        if self.shadow.soft {
            ShadowFilter::Soft {
                penumbra: self.shadow.penumbra,
            }
        } else {
            ShadowFilter::Hard
        }
    }

    pub fn shading_model(&self) -> ShadingModel {
        if self.shadow.blinn_phong {
            ShadingModel::BlinnPhong
        } else {
            ShadingModel::Lambert
        }
    }
}

/// Errors that can occur reading or writing settings
#[derive(Debug, Clone)]
pub enum SettingsError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let settings: Settings = ron::from_str("(light: (perspective: true), shadow: (soft: true))").unwrap();
        assert!(settings.light.perspective);
        assert!(settings.shadow.soft);
        assert_eq!(settings.light.near, 0.5);
        assert_eq!(settings.shadow.bias, DEFAULT_BIAS);
        assert_eq!(settings.window, WindowSettings::default());
    }

    #[test]
    fn test_ron_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ron");
        let mut settings = Settings::default();
        settings.light.position = Vec3::new(0.0, 5.0, 0.0);
        settings.shadow.out_of_range = Some(0.25);

        settings.save_ron(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "shadow": { "bias": -0.01 } }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.shadow.bias, -0.01);
        assert_eq!(settings.camera, CameraSettings::default());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Settings::load("no/such/settings.ron").unwrap_err();
        assert!(matches!(err, SettingsError::IoError(_)));
    }

    #[test]
    fn test_light_space_conversion() {
        let mut settings = Settings::default();
        settings.light.perspective = true;
        settings.light.field_of_view = 90.0;
        settings.light.spot = Some(SpotSettings {
            inner: 10.0,
            outer: 20.0,
        });
        settings.shadow.bias = -0.002;
        settings.light.color = Vec3::new(1.0, 0.5, 0.25);

        let light = settings.light_space();
        match light.projection {
            LightProjection::Perspective { field_of_view } => {
                assert!((field_of_view - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
            }
            LightProjection::Orthographic => panic!("expected perspective"),
        }
        assert_eq!(light.bias, -0.002);
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.25));
        assert!(matches!(light.model, LightModel::Spot { .. }));
    }

    #[test]
    fn test_filter_and_shading_flags() {
        let mut settings = Settings::default();
        assert_eq!(settings.shadow_filter(), ShadowFilter::Hard);
        assert_eq!(settings.shading_model(), ShadingModel::Lambert);

        settings.shadow.soft = true;
        settings.shadow.penumbra = 0.1;
        settings.shadow.blinn_phong = true;
        assert_eq!(settings.shadow_filter(), ShadowFilter::Soft { penumbra: 0.1 });
        assert_eq!(settings.shading_model(), ShadingModel::BlinnPhong);
    }

    #[test]
    fn test_camera_aspect() {
        let camera = Settings::default().camera(800, 400);
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(camera.position, Vec3::new(6.0, 12.0, 15.0));
    }
}
