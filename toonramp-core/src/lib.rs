pub mod config;
pub mod export;
pub mod render;
pub mod shading;
pub mod texture;

pub use shading::fragment::{ToonPipeline, PipelineVariant};
pub use shading::types::{PointLight, PointLightShadow};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
