//! CPU host for the toon pipeline: procedural meshes, rasterization and scene assembly.

pub mod mesh;
pub mod raster;
pub mod scene;

use crate::texture::TextureError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{lights} point lights with {shadowed} shadow casters is not supported (max {max} lights)")]
    UnsupportedLightCount { lights: usize, shadowed: usize, max: usize },
    #[error("light {index} does not exist (scene has {count})")]
    NoSuchLight { index: usize, count: usize },
    #[error("light {0} does not cast shadows")]
    NotShadowCaster(usize),
    #[error("framebuffer size must be non-zero, got {width}x{height}")]
    EmptyFramebuffer { width: u32, height: u32 },
    #[error(transparent)]
    Texture(#[from] TextureError),
}

pub use raster::{Framebuffer, RasterStats};
pub use scene::{bake_light_atlas, render_scene, RenderOutput};
