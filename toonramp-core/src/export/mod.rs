//! Render metadata written next to output images.

use std::path::Path;

use crate::render::{RasterStats, RenderOutput};
use crate::shading::fragment::PipelineVariant;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderMeta {
    pub version: &'static str,
    pub width: u32,
    pub height: u32,
    pub lights: usize,
    pub shadowed_lights: usize,
    pub variant: PipelineVariant,
    pub stats: RasterStats,
}

impl RenderMeta {
    pub fn new(output: &RenderOutput, variant: PipelineVariant) -> Self {
        Self {
            version: crate::VERSION,
            width: output.framebuffer.width(),
            height: output.framebuffer.height(),
            lights: output.lights,
            shadowed_lights: output.shadowed_lights,
            variant,
            stats: output.stats,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Framebuffer;
    use glam::Vec4;

    #[test]
    fn meta_serializes_variant_in_scene_file_terms() {
        let output = RenderOutput {
            framebuffer: Framebuffer::new(4, 2, Vec4::ZERO),
            stats: RasterStats { triangles: 10, culled: 1, fragments: 5 },
            lights: 2,
            shadowed_lights: 1,
        };
        let json = RenderMeta::new(&output, PipelineVariant::default()).to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["width"], 4);
        assert_eq!(v["shadowed_lights"], 1);
        assert_eq!(v["variant"]["shadow_filter"], "pcf");
        assert_eq!(v["variant"]["composition"], "ramp_diffuse_green");
        assert_eq!(v["stats"]["fragments"], 5);
    }
}
