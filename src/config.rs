//! # Configuration
//!
//! [`SkyConfig`] gathers every knob the application exposes. The native binary fills it
//! from the command line, the web build uses [`SkyConfig::default`].

use std::borrow::Cow;

use crate::camera::DEFAULT_MOUSE_SENSITIVITY;
use crate::clock::DEFAULT_ANIMATION_SPEED;
use crate::{SKY_FRAGMENT_SHADER, SKY_VERTEX_SHADER};

/// What to do when an entity's program fails to build.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ShaderErrorPolicy {
    /// Log the diagnostic and stop with a failure status.
    #[default]
    Abort,
    /// Log the diagnostic and carry on without the entity.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shader error policy `{0}`, expected `abort` or `skip`")]
pub struct ParsePolicyError(String);

impl std::str::FromStr for ShaderErrorPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(ShaderErrorPolicy::Abort),
            "skip" => Ok(ShaderErrorPolicy::Skip),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}

impl std::fmt::Display for ShaderErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderErrorPolicy::Abort => f.write_str("abort"),
            ShaderErrorPolicy::Skip => f.write_str("skip"),
        }
    }
}

/// Stage sources for one entity. `None` marks an absent stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySource {
    pub label: String,
    pub vertex: Option<Cow<'static, str>>,
    pub fragment: Option<Cow<'static, str>>,
}

impl EntitySource {
    /// The bundled sky shaders.
    pub fn sky() -> Self {
        Self {
            label: "sky".to_owned(),
            vertex: Some(Cow::Borrowed(SKY_VERTEX_SHADER)),
            fragment: Some(Cow::Borrowed(SKY_FRAGMENT_SHADER)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkyConfig {
    /// Window title, fixed for the lifetime of the window.
    pub title: String,
    /// Requested inner size of the window in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Shader seconds per wall-clock second.
    pub animation_speed: f64,
    /// Radians per pixel of cursor travel.
    pub mouse_sensitivity: f32,
    /// Shader time at start-up. May be negative.
    pub start_time: f64,
    pub on_shader_error: ShaderErrorPolicy,
    /// Entities in draw order.
    pub entities: Vec<EntitySource>,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            title: "Sky".to_owned(),
            width: 1280,
            height: 720,
            animation_speed: DEFAULT_ANIMATION_SPEED,
            mouse_sensitivity: DEFAULT_MOUSE_SENSITIVITY,
            start_time: 0.0,
            on_shader_error: ShaderErrorPolicy::default(),
            entities: vec![EntitySource::sky()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("abort".parse(), Ok(ShaderErrorPolicy::Abort));
        assert_eq!("SKIP".parse(), Ok(ShaderErrorPolicy::Skip));
        assert!("ignore".parse::<ShaderErrorPolicy>().is_err());
        assert_eq!(ShaderErrorPolicy::Skip.to_string(), "skip");
    }

    #[test]
    fn default_draws_the_sky() {
        let config = SkyConfig::default();
        assert_eq!(config.on_shader_error, ShaderErrorPolicy::Abort);
        assert_eq!(config.entities, vec![EntitySource::sky()]);
        assert_eq!(config.animation_speed, 3.0);
    }
}
