//! Read-only textures sampled by the fragment stage.
//!
//! Texels are stored as linear-or-sRGB `Vec4`s with the first row at `v = 0`.
//! Sampling follows the usual GPU conventions: texel centers sit at half-texel
//! offsets, `Nearest` picks the containing texel and `Linear` blends the four
//! surrounding texel centers.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("texture dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("expected {expected} bytes for a {width}x{height} RGBA8 texture, got {actual}")]
    SizeMismatch { width: u32, height: u32, expected: usize, actual: usize },
    #[error("expected {expected} texels for a {width}x{height} texture, got {actual}")]
    TexelCountMismatch { width: u32, height: u32, expected: usize, actual: usize },
    #[error("a ramp needs at least one band")]
    NoBands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Linear,
    /// Texels are sRGB encoded and decoded to linear when sampled.
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sampler {
    pub filter: Filter,
    pub wrap: Wrap,
}

impl Sampler {
    pub const NEAREST_CLAMP: Sampler = Sampler { filter: Filter::Nearest, wrap: Wrap::ClampToEdge };
    pub const LINEAR_CLAMP: Sampler = Sampler { filter: Filter::Linear, wrap: Wrap::ClampToEdge };
}

#[derive(Debug, Clone)]
pub struct Texture2D {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
    pub sampler: Sampler,
    pub color_space: ColorSpace,
}

impl Texture2D {
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> Vec4) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyDimensions { width, height });
        }
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }
        Ok(Self { width, height, texels, sampler: Sampler::default(), color_space: ColorSpace::Linear })
    }

    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(TextureError::SizeMismatch { width, height, expected, actual: bytes.len() });
        }
        let texels = bytes.chunks_exact(4).map(rgba8_to_vec4).collect();
        Ok(Self { width, height, texels, sampler: Sampler::default(), color_space: ColorSpace::Linear })
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.texels[(y * self.width + x) as usize]
    }

    /// Raw texel fetch with the sampler's wrap mode applied to integer coordinates.
    fn fetch(&self, x: i64, y: i64) -> Vec4 {
        let x = wrap_index(x, self.width, self.sampler.wrap);
        let y = wrap_index(y, self.height, self.sampler.wrap);
        self.texel(x, y)
    }

    /// GLSL `texture2D` equivalent.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let raw = match self.sampler.filter {
            Filter::Nearest => {
                let p = (uv * size).floor();
                self.fetch(p.x as i64, p.y as i64)
            }
            Filter::Linear => {
                let p = uv * size - Vec2::splat(0.5);
                let base = p.floor();
                let t = p - base;
                let (x0, y0) = (base.x as i64, base.y as i64);
                let top = self.fetch(x0, y0).lerp(self.fetch(x0 + 1, y0), t.x);
                let bottom = self.fetch(x0, y0 + 1).lerp(self.fetch(x0 + 1, y0 + 1), t.x);
                top.lerp(bottom, t.y)
            }
        };
        match self.color_space {
            ColorSpace::Linear => raw,
            ColorSpace::Srgb => srgb_to_linear(raw),
        }
    }
}

fn wrap_index(i: i64, size: u32, wrap: Wrap) -> u32 {
    let size = size as i64;
    match wrap {
        Wrap::ClampToEdge => i.clamp(0, size - 1) as u32,
        Wrap::Repeat => i.rem_euclid(size) as u32,
    }
}

pub fn rgba8_to_vec4(px: &[u8]) -> Vec4 {
    Vec4::new(px[0] as f32, px[1] as f32, px[2] as f32, px[3] as f32) / 255.0
}

pub fn vec4_to_rgba8(c: Vec4) -> [u8; 4] {
    let c = c.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, c.w.round() as u8]
}

fn srgb_channel_to_linear(c: f32) -> f32 {
    if c < 0.04045 { c * 0.0773993808 } else { (c * 0.9478672986 + 0.0521327014).powf(2.4) }
}

/// sRGB transfer decode of rgb; alpha passes through.
pub fn srgb_to_linear(c: Vec4) -> Vec4 {
    Vec4::new(srgb_channel_to_linear(c.x), srgb_channel_to_linear(c.y), srgb_channel_to_linear(c.z), c.w)
}

fn linear_channel_to_srgb(c: f32) -> f32 {
    if c < 0.0031308 { c * 12.92 } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 }
}

/// sRGB transfer encode of rgb; alpha passes through.
pub fn linear_to_srgb(c: Vec4) -> Vec4 {
    Vec4::new(linear_channel_to_srgb(c.x), linear_channel_to_srgb(c.y), linear_channel_to_srgb(c.z), c.w)
}

/// One-dimensional gradient stored as a 2D texture and read along its center row.
#[derive(Debug, Clone)]
pub struct RampTexture {
    texture: Texture2D,
}

impl RampTexture {
    pub const ROW: f32 = 0.5;

    pub fn new(texture: Texture2D) -> Self {
        Self { texture }
    }

    /// Hard-edged ramp with one texel per band, sampled nearest.
    pub fn from_bands(bands: &[Vec3]) -> Result<Self, TextureError> {
        if bands.is_empty() {
            return Err(TextureError::NoBands);
        }
        let texture = Texture2D::from_fn(bands.len() as u32, 1, |x, _| bands[x as usize].extend(1.0))?
            .with_sampler(Sampler::NEAREST_CLAMP);
        Ok(Self { texture })
    }

    pub fn texture(&self) -> &Texture2D {
        &self.texture
    }

    pub fn sample(&self, x: f32) -> Vec4 {
        self.texture.sample(Vec2::new(x, Self::ROW))
    }
}

impl Default for RampTexture {
    /// Three grey bands: shadow, mid, lit.
    fn default() -> Self {
        let texels = [0.2, 0.5, 1.0].map(|g| Vec3::splat(g).extend(1.0)).to_vec();
        let texture = Texture2D {
            width: texels.len() as u32,
            height: 1,
            texels,
            sampler: Sampler::NEAREST_CLAMP,
            color_space: ColorSpace::Linear,
        };
        Self { texture }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Texture2D {
        Texture2D::from_fn(2, 2, |x, y| if (x + y) % 2 == 0 { Vec4::ONE } else { Vec4::ZERO }).unwrap()
    }

    #[test]
    fn rejects_mismatched_bytes() {
        let err = Texture2D::from_rgba8(2, 2, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, TextureError::SizeMismatch { expected: 16, actual: 12, .. }));
        assert!(Texture2D::from_rgba8(0, 2, &[]).is_err());
    }

    #[test]
    fn nearest_picks_containing_texel() {
        let t = checker().with_sampler(Sampler::NEAREST_CLAMP);
        assert_eq!(t.sample(Vec2::new(0.1, 0.1)), Vec4::ONE);
        assert_eq!(t.sample(Vec2::new(0.9, 0.1)), Vec4::ZERO);
    }

    #[test]
    fn clamp_to_edge_never_wraps() {
        let t = Texture2D::from_fn(4, 1, |x, _| Vec4::splat(x as f32)).unwrap()
            .with_sampler(Sampler::LINEAR_CLAMP);
        assert_eq!(t.sample(Vec2::new(-3.0, 0.5)).x, 0.0);
        assert_eq!(t.sample(Vec2::new(7.0, 0.5)).x, 3.0);
        assert_eq!(t.sample(Vec2::new(0.99, 0.5)).x, 3.0);
    }

    #[test]
    fn repeat_wraps() {
        let t = Texture2D::from_fn(4, 1, |x, _| Vec4::splat(x as f32)).unwrap()
            .with_sampler(Sampler { filter: Filter::Nearest, wrap: Wrap::Repeat });
        assert_eq!(t.sample(Vec2::new(1.1, 0.5)).x, 0.0);
    }

    #[test]
    fn linear_blends_between_centers() {
        let t = Texture2D::from_fn(2, 1, |x, _| Vec4::splat(x as f32)).unwrap()
            .with_sampler(Sampler::LINEAR_CLAMP);
        assert!((t.sample(Vec2::new(0.5, 0.5)).x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn srgb_decode_darkens_midtones() {
        let t = Texture2D::from_fn(1, 1, |_, _| Vec4::new(0.5, 0.5, 0.5, 0.5)).unwrap()
            .with_color_space(ColorSpace::Srgb);
        let c = t.sample(Vec2::splat(0.5));
        assert!((c.x - 0.214).abs() < 1e-3);
        assert_eq!(c.w, 0.5);
    }

    #[test]
    fn ramp_bands_are_hard_edged() {
        let ramp = RampTexture::default();
        assert_eq!(ramp.sample(0.1).x, 0.2);
        assert_eq!(ramp.sample(0.5).x, 0.5);
        assert_eq!(ramp.sample(0.9).x, 1.0);
        assert!(RampTexture::from_bands(&[]).is_err());
    }

    #[test]
    fn rgba8_conversion_rounds() {
        assert_eq!(vec4_to_rgba8(Vec4::new(1.2, 0.5, -1.0, 1.0)), [255, 128, 0, 255]);
        assert_eq!(rgba8_to_vec4(&[255, 0, 255, 255]), Vec4::new(1.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn srgb_encode_inverts_decode() {
        for byte in [0u8, 2, 6, 10, 51, 128, 200, 255] {
            let c = Vec4::new(byte as f32 / 255.0, 0.0, 1.0, 0.25);
            assert_eq!(vec4_to_rgba8(linear_to_srgb(srgb_to_linear(c))), vec4_to_rgba8(c));
        }
        assert_eq!(linear_to_srgb(Vec4::new(0.001, 0.0, 0.0, 0.7)).w, 0.7);
    }
}
