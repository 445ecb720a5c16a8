use std::path::PathBuf;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::{ConfigError, MAX_POINT_LIGHTS, MAX_SHADOW_MAP_SIZE};
use crate::shading::attenuation::AttenuationMode;
use crate::shading::fragment::{Composition, PipelineVariant, ViewProjection};
use crate::shading::shadow::ShadowFilter;
use crate::texture::{srgb_to_linear, ColorSpace, Filter, RampTexture, Sampler, Texture2D, TextureError};

/// Linear RGB color. Accepts `"#RRGGBB"` (sRGB encoded) or `[r, g, b]` (linear).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorValue", into = "ColorValue")]
pub struct Color(pub Vec3);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Hex(String),
    Rgb([f32; 3]),
}

impl TryFrom<ColorValue> for Color {
    type Error = String;

    fn try_from(value: ColorValue) -> Result<Self, Self::Error> {
        match value {
            ColorValue::Hex(s) => Color::from_hex(&s),
            ColorValue::Rgb(c) => Ok(Color(Vec3::from(c))),
        }
    }
}

impl From<Color> for ColorValue {
    fn from(c: Color) -> Self {
        ColorValue::Rgb(c.0.to_array())
    }
}

impl Color {
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let trimmed = hex.trim().trim_start_matches('#');
        if trimmed.len() != 6 {
            return Err(format!("color must be #RRGGBB, got: #{}", trimmed));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&trimmed[range], 16).map_err(|e| format!("invalid hex color #{}: {}", trimmed, e))
        };
        let srgb = Vec3::new(channel(0..2)? as f32, channel(2..4)? as f32, channel(4..6)? as f32) / 255.0;
        Ok(Color(srgb_to_linear(srgb.extend(1.0)).truncate()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub output: OutputConfig,
    pub clear_color: Color,
    pub camera: CameraConfig,
    pub ambient: AmbientConfig,
    pub shading: ShadingConfig,
    pub ramp: RampConfig,
    pub lights: Vec<LightConfig>,
    pub objects: Vec<ObjectConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { width: 640, height: 360 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub projection: ViewProjection,
    /// Vertical extent of the view volume for orthographic cameras.
    pub ortho_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(5.5, 2.0, 2.0),
            target: Vec3::new(5.5, 1.0, -7.0),
            up: Vec3::Y,
            fov_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            projection: ViewProjection::Perspective,
            ortho_height: 10.0,
        }
    }
}

impl CameraConfig {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        match self.projection {
            ViewProjection::Perspective => {
                Mat4::perspective_rh(self.fov_deg.to_radians(), aspect, self.near, self.far)
            }
            ViewProjection::Orthographic => {
                let half_h = self.ortho_height * 0.5;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub color: Color,
    pub intensity: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self { color: Color(Vec3::splat(0.015996)), intensity: 0.5 }
    }
}

impl AmbientConfig {
    pub fn irradiance(&self) -> Vec3 {
        self.color.0 * self.intensity
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    pub shadow_filter: ShadowFilter,
    pub attenuation: AttenuationMode,
    pub composition: Composition,
}

impl ShadingConfig {
    /// The camera decides the view-direction convention of the variant.
    pub fn variant(&self, projection: ViewProjection) -> PipelineVariant {
        PipelineVariant {
            shadow_filter: self.shadow_filter,
            projection,
            attenuation: self.attenuation,
            composition: self.composition,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// PNG ramp; when absent the ramp is built from `bands`.
    pub path: Option<PathBuf>,
    pub bands: Vec<Color>,
    pub color_space: ColorSpace,
    /// Defaults to nearest for bands and linear for images.
    pub filter: Option<Filter>,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            path: None,
            bands: vec![Color(Vec3::splat(0.05)), Color(Vec3::splat(0.3)), Color(Vec3::ONE)],
            color_space: ColorSpace::Linear,
            filter: None,
        }
    }
}

impl RampConfig {
    pub fn build_from_bands(&self) -> Result<RampTexture, TextureError> {
        let filter = self.filter.unwrap_or(Filter::Nearest);
        let ramp = RampTexture::from_bands(&self.bands.iter().map(|c| c.0).collect::<Vec<_>>())?;
        let texture = ramp.texture().clone().with_sampler(Sampler { filter, ..Sampler::NEAREST_CLAMP });
        Ok(RampTexture::new(texture))
    }

    pub fn build_from_rgba8(&self, width: u32, height: u32, bytes: &[u8]) -> Result<RampTexture, TextureError> {
        let filter = self.filter.unwrap_or(Filter::Linear);
        let texture = Texture2D::from_rgba8(width, height, bytes)?
            .with_sampler(Sampler { filter, ..Sampler::LINEAR_CLAMP })
            .with_color_space(self.color_space);
        Ok(RampTexture::new(texture))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: Vec3,
    pub color: Color,
    pub intensity: f32,
    /// Cutoff distance, `0` for none.
    pub distance: f32,
    pub decay: f32,
    pub cast_shadow: bool,
    pub shadow: ShadowConfig,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Color(Vec3::ONE),
            intensity: 1.0,
            distance: 0.0,
            decay: 2.0,
            cast_shadow: false,
            shadow: ShadowConfig::default(),
        }
    }
}

impl LightConfig {
    pub fn radiance(&self) -> Vec3 {
        self.color.0 * self.intensity
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
    /// Resolution of one cube face.
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self { bias: 0.0, normal_bias: 0.0, radius: 1.0, map_size: 512, near: 0.5, far: 500.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeConfig {
    Sphere {
        center: Vec3,
        radius: f32,
        #[serde(default = "default_stacks")]
        stacks: u32,
        #[serde(default = "default_slices")]
        slices: u32,
    },
    /// Horizontal square facing `+Y`.
    Plane {
        center: Vec3,
        size: f32,
        #[serde(default = "default_segments")]
        segments: u32,
    },
}

fn default_stacks() -> u32 { 12 }
fn default_slices() -> u32 { 16 }
fn default_segments() -> u32 { 1 }
fn default_true() -> bool { true }

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectConfig {
    #[serde(flatten)]
    pub shape: ShapeConfig,
    #[serde(default = "default_true")]
    pub receive_shadow: bool,
    #[serde(default = "default_true")]
    pub cast_shadow: bool,
}

impl Default for SceneConfig {
    /// A lit sphere over a ground plane between two shadow-casting lamps.
    fn default() -> Self {
        let lamp = |position: Vec3| LightConfig {
            position,
            color: Color(Vec3::ONE),
            intensity: 10.0,
            distance: 5.0,
            decay: 2.0,
            cast_shadow: true,
            shadow: ShadowConfig { bias: 0.001, normal_bias: 0.003, radius: 1.0, map_size: 256, near: 0.1, far: 15.0 },
        };
        Self {
            output: OutputConfig::default(),
            clear_color: Color(Vec3::new(0.001821, 0.000607, 0.000607)),
            camera: CameraConfig::default(),
            ambient: AmbientConfig::default(),
            shading: ShadingConfig::default(),
            ramp: RampConfig::default(),
            lights: vec![lamp(Vec3::new(6.0, 1.8, 0.0)), lamp(Vec3::new(6.0, 1.0, -8.0))],
            objects: vec![
                ObjectConfig {
                    shape: ShapeConfig::Plane { center: Vec3::ZERO, size: 40.0, segments: 1 },
                    receive_shadow: true,
                    cast_shadow: false,
                },
                ObjectConfig {
                    shape: ShapeConfig::Sphere { center: Vec3::new(5.0, 1.0, 0.0), radius: 0.5, stacks: 12, slices: 16 },
                    receive_shadow: true,
                    cast_shadow: true,
                },
            ],
        }
    }
}

impl SceneConfig {
    pub fn shadow_casting_lights(&self) -> usize {
        self.lights.iter().filter(|l| l.cast_shadow).count()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.output.width == 0 || self.output.height == 0 {
            return invalid(format!("output size must be non-zero, got {}x{}", self.output.width, self.output.height));
        }
        if self.lights.len() > MAX_POINT_LIGHTS {
            return invalid(format!("at most {} point lights are supported, got {}", MAX_POINT_LIGHTS, self.lights.len()));
        }
        let cam = &self.camera;
        if !(cam.near > 0.0 && cam.far > cam.near) {
            return invalid(format!("camera needs 0 < near < far, got near={} far={}", cam.near, cam.far));
        }
        if cam.projection == ViewProjection::Perspective && !(cam.fov_deg > 0.0 && cam.fov_deg < 180.0) {
            return invalid(format!("camera fov must be in (0, 180) degrees, got {}", cam.fov_deg));
        }
        if (cam.target - cam.position).length_squared() == 0.0 {
            return invalid("camera target coincides with its position".to_string());
        }
        for (i, light) in self.lights.iter().enumerate() {
            if !light.cast_shadow {
                continue;
            }
            let s = &light.shadow;
            if s.map_size == 0 || s.map_size > MAX_SHADOW_MAP_SIZE {
                return invalid(format!(
                    "light {}: shadow map_size must be in 1..={}, got {}",
                    i, MAX_SHADOW_MAP_SIZE, s.map_size
                ));
            }
            if !(s.far > s.near) {
                return invalid(format!("light {}: shadow far ({}) must exceed near ({})", i, s.far, s.near));
            }
        }
        for (i, obj) in self.objects.iter().enumerate() {
            match obj.shape {
                ShapeConfig::Sphere { radius, .. } if radius <= 0.0 => {
                    return invalid(format!("object {}: sphere radius must be positive", i));
                }
                ShapeConfig::Plane { size, .. } if size <= 0.0 => {
                    return invalid(format!("object {}: plane size must be positive", i));
                }
                _ => {}
            }
        }
        if self.ramp.path.is_none() && self.ramp.bands.is_empty() {
            return invalid("ramp needs either a path or at least one band".to_string());
        }
        Ok(())
    }
}
