//! Omnidirectional point-light shadows stored as a cube map folded into a
//! single 2D atlas.
//!
//! Atlas layout, one cell per cube face (`u` grows right, `v` grows down):
//!
//! ```text
//!   +----+----+----+----+
//!   |    | -Y |    | +Y |   v in [0, 0.5]
//!   +----+----+----+----+
//!   | -X | -Z | +X | +Z |   v in [0.5, 1]
//!   +----+----+----+----+
//! ```
//!
//! Depth is stored as the light-to-occluder distance normalized to the
//! shadow camera's `[near, far]` range and packed into four 8-bit channels.

use glam::{UVec2, Vec2, Vec3, Vec4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::PointLightShadow;
use crate::texture::{rgba8_to_vec4, TextureError};

const PACK_SCALE: f64 = 4_294_967_296.0; // 256^4

/// `(255/256) / (256^3, 256^2, 256, 1)`
pub const UNPACK_FACTORS: Vec4 = Vec4::new(
    255.0 / 256.0 / 16_777_216.0,
    255.0 / 256.0 / 65_536.0,
    255.0 / 256.0 / 256.0,
    255.0 / 256.0,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowFilter {
    /// Single tap.
    Basic,
    /// Nine-tap percentage-closer filter.
    #[default]
    #[serde(alias = "pcf_soft")]
    Pcf,
}

/// Packs a normalized depth in `[0, 1]` into base-256 digits, least
/// significant digit in `r`.
pub fn pack_depth_to_rgba(depth: f32) -> [u8; 4] {
    let scaled = (depth.clamp(0.0, 1.0) as f64 * PACK_SCALE).round();
    let n = scaled.min(u32::MAX as f64) as u32;
    n.to_le_bytes()
}

pub fn unpack_rgba_to_depth(v: Vec4) -> f32 {
    v.dot(UNPACK_FACTORS)
}

/// Maps a direction from the light to an atlas uv. Faces are inset by one
/// texel on every side so filtering never reads across a seam.
pub fn cube_to_uv(v: Vec3, texel_size_y: f32) -> Vec2 {
    let mut abs_v = v.abs();
    let longest = abs_v.max_element();
    if longest <= 0.0 {
        return Vec2::new(0.375, 0.75);
    }

    // intersect the unit cube
    let scale_to_cube = 1.0 / longest;
    abs_v *= scale_to_cube;
    let v = v * scale_to_cube * (1.0 - 2.0 * texel_size_y);

    let mut planar = v.truncate();
    let almost_one = 1.0 - 1.5 * texel_size_y;

    if abs_v.z >= almost_one {
        if v.z > 0.0 {
            planar.x = 4.0 - v.x;
        }
    } else if abs_v.x >= almost_one {
        let sign_x = v.x.signum();
        planar.x = v.z * sign_x + 2.0 * sign_x;
    } else if abs_v.y >= almost_one {
        let sign_y = v.y.signum();
        planar.x = v.x + 2.0 * sign_y + 2.0;
        planar.y = v.z * sign_y - 2.0;
    }

    // scale = 0.5 / (4, 2), translate = (center + 0.5) / (4, 2)
    Vec2::new(0.125, 0.25) * planar + Vec2::new(0.375, 0.75)
}

/// Inverse of [`cube_to_uv`]: the (unnormalized) light-space direction whose
/// projection lands on `uv`, or `None` for the two unused atlas cells.
pub fn direction_for_uv(uv: Vec2, texel_size_y: f32) -> Option<Vec3> {
    let k = 1.0 - 2.0 * texel_size_y;
    let p = (uv - Vec2::new(0.375, 0.75)) / Vec2::new(0.125, 0.25);
    let dir = if uv.y >= 0.5 {
        match uv.x {
            u if u < 0.25 => Vec3::new(-k, p.y, -(p.x + 2.0)),
            u if u < 0.5 => Vec3::new(p.x, p.y, -k),
            u if u < 0.75 => Vec3::new(k, p.y, p.x - 2.0),
            _ => Vec3::new(4.0 - p.x, p.y, k),
        }
    } else {
        match uv.x {
            u if (0.25..0.5).contains(&u) => Vec3::new(p.x, -k, -(p.y + 2.0)),
            u if u >= 0.75 => Vec3::new(p.x - 4.0, k, p.y + 2.0),
            _ => return None,
        }
    };
    Some(dir)
}

/// Packed-depth atlas for one shadow-casting point light. Texels keep the
/// four packed bytes, one `[u8; 4]` per texel, and are decoded on lookup.
#[derive(Debug, Clone)]
pub struct ShadowAtlas {
    width: u32,
    height: u32,
    texels: Vec<[u8; 4]>,
}

impl ShadowAtlas {
    pub fn from_packed(width: u32, height: u32, texels: Vec<[u8; 4]>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(TextureError::TexelCountMismatch { width, height, expected, actual: texels.len() });
        }
        Ok(Self { width, height, texels })
    }

    /// Fills the atlas from `occluder_distance`, which returns the distance from
    /// the light to the closest occluder along a direction (or `None`).
    pub fn bake<F>(map_size: UVec2, camera_near: f32, camera_far: f32, occluder_distance: F) -> Result<Self, TextureError>
    where
        F: Fn(Vec3) -> Option<f32> + Sync,
    {
        let size = map_size * UVec2::new(4, 2);
        if size.x == 0 || size.y == 0 {
            return Err(TextureError::EmptyDimensions { width: size.x, height: size.y });
        }
        let texel_size_y = 1.0 / size.y as f32;
        let range = (camera_far - camera_near).max(f32::EPSILON);
        let occluder_distance = &occluder_distance;

        let texels: Vec<[u8; 4]> = (0..size.y)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..size.x).map(move |x| {
                    let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size.as_vec2();
                    let depth = direction_for_uv(uv, texel_size_y)
                        .and_then(|dir| occluder_distance(dir.normalize()))
                        .map(|d| ((d - camera_near) / range).clamp(0.0, 1.0))
                        .unwrap_or(1.0);
                    pack_depth_to_rgba(depth)
                })
            })
            .collect();

        tracing::debug!(width = size.x, height = size.y, bytes = texels.len() * 4, "baked shadow atlas");
        Self::from_packed(size.x, size.y, texels)
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    pub fn packed_texels(&self) -> &[[u8; 4]] {
        &self.texels
    }

    /// Nearest, clamp-to-edge lookup of the decoded depth at `uv`.
    pub fn depth_at(&self, uv: Vec2) -> f32 {
        let x = ((uv.x * self.width as f32).floor() as i64).clamp(0, self.width as i64 - 1) as usize;
        let y = ((uv.y * self.height as f32).floor() as i64).clamp(0, self.height as i64 - 1) as usize;
        unpack_rgba_to_depth(rgba8_to_vec4(&self.texels[y * self.width as usize + x]))
    }

    /// Greyscale RGBA8 view of the decoded depths, row 0 first.
    pub fn depth_preview_rgba8(&self) -> Vec<u8> {
        self.texels
            .iter()
            .flat_map(|texel| {
                let g = (unpack_rgba_to_depth(rgba8_to_vec4(texel)) * 255.0).round().clamp(0.0, 255.0) as u8;
                [g, g, g, 255]
            })
            .collect()
    }
}

/// Shadow lookup with the filter already chosen.
pub type ShadowLookup = fn(&ShadowAtlas, &PointLightShadow, Vec4) -> f32;

impl ShadowFilter {
    pub fn lookup(self) -> ShadowLookup {
        match self {
            ShadowFilter::Basic => point_shadow_basic,
            ShadowFilter::Pcf => point_shadow_pcf,
        }
    }
}

/// `1.0` when the stored depth at `uv` is at or beyond `compare`, else `0.0`.
pub fn texture2d_compare(atlas: &ShadowAtlas, uv: Vec2, compare: f32) -> f32 {
    if atlas.depth_at(uv) < compare { 0.0 } else { 1.0 }
}

/// Biased comparison depth and unit direction for a light-to-fragment vector.
fn shadow_query(shadow: &PointLightShadow, shadow_coord: Vec4) -> (f32, Vec3) {
    let light_to_position = shadow_coord.truncate();
    let mut dp = (light_to_position.length() - shadow.camera_near) / (shadow.camera_far - shadow.camera_near);
    dp += shadow.bias;
    (dp, light_to_position.normalize_or_zero())
}

pub fn point_shadow_basic(atlas: &ShadowAtlas, shadow: &PointLightShadow, shadow_coord: Vec4) -> f32 {
    let (dp, bd3d) = shadow_query(shadow, shadow_coord);
    texture2d_compare(atlas, cube_to_uv(bd3d, shadow.texel_size().y), dp)
}

pub fn point_shadow_pcf(atlas: &ShadowAtlas, shadow: &PointLightShadow, shadow_coord: Vec4) -> f32 {
    let (dp, bd3d) = shadow_query(shadow, shadow_coord);
    let texel_size_y = shadow.texel_size().y;
    let r = shadow.radius * texel_size_y;
    let (x, y) = (-r, r);
    let taps = [
        Vec3::new(x, y, y),
        Vec3::new(y, y, y),
        Vec3::new(x, y, x),
        Vec3::new(y, y, x),
        Vec3::ZERO,
        Vec3::new(x, x, y),
        Vec3::new(y, x, y),
        Vec3::new(x, x, x),
        Vec3::new(y, x, x),
    ];
    let lit: f32 = taps
        .iter()
        .map(|offset| texture2d_compare(atlas, cube_to_uv(bd3d + *offset, texel_size_y), dp))
        .sum();
    lit * (1.0 / 9.0)
}

/// Fraction of the light reaching a fragment. `shadow_coord.xyz` is the
/// vector from the light to the (normal-biased) world position.
pub fn point_shadow(atlas: &ShadowAtlas, shadow: &PointLightShadow, filter: ShadowFilter, shadow_coord: Vec4) -> f32 {
    filter.lookup()(atlas, shadow, shadow_coord)
}
