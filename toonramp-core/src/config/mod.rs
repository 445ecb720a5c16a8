//! Scene files: YAML documents describing camera, lights, surfaces and ramp.

pub mod schema;

use schema::SceneConfig;

/// Upper bound on point lights per scene; pipelines are specialised for each count up to it.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Largest cube face resolution. One atlas is `4 * 2` faces of 4-byte texels,
/// 32 MiB at this size.
pub const MAX_SHADOW_MAP_SIZE: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse scene: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid scene: {0}")]
    Invalid(String),
}

pub fn load_from_yaml_str(s: &str) -> Result<SceneConfig, ConfigError> {
    let scene: SceneConfig = serde_yaml::from_str(s)?;
    scene.validate()?;
    Ok(scene)
}

pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<SceneConfig, ConfigError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    let scene = load_from_yaml_str(&data)?;
    tracing::debug!(path = %path.display(), lights = scene.lights.len(), objects = scene.objects.len(), "loaded scene");
    Ok(scene)
}
