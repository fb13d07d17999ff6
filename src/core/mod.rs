//! Core engine module
//!
//! Contains the event loop driver and the demo settings

mod engine;
mod settings;

pub use engine::{Engine, EngineConfig, EngineContext, Game};
pub use settings::{
    CameraSettings, LightSettings, Settings, SettingsError, ShadowSettings, SpotSettings, WindowSettings,
};
