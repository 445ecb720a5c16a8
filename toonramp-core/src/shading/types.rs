//! Per-invocation data shared by both pipeline stages.

use glam::{Vec2, Vec3};

/// Point light as seen by the fragment stage. `position` is in view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    /// Cutoff distance; `0.0` disables the window.
    pub distance: f32,
    /// Decay exponent of the windowed falloff.
    pub decay: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self { position: Vec3::ZERO, color: Vec3::ONE, distance: 0.0, decay: 2.0 }
    }
}

/// Shadow parameters of a shadow-casting point light, index-aligned with its light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightShadow {
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
    /// Resolution of a single cube face; the atlas is `4x2` faces.
    pub map_size: Vec2,
    pub camera_near: f32,
    pub camera_far: f32,
}

impl Default for PointLightShadow {
    fn default() -> Self {
        Self {
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            map_size: Vec2::splat(512.0),
            camera_near: 0.5,
            camera_far: 500.0,
        }
    }
}

impl PointLightShadow {
    /// Size of one atlas texel in uv units.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::ONE / (self.map_size * Vec2::new(4.0, 2.0))
    }
}

/// Surface point reconstructed from interpolated varyings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricContext {
    pub position: Vec3,
    pub normal: Vec3,
    pub view_dir: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentLight {
    pub color: Vec3,
    pub direction: Vec3,
    pub visible: bool,
}

/// Additive reflectance channels; reset for every fragment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReflectedLight {
    pub direct_diffuse: Vec3,
    pub direct_specular: Vec3,
    pub indirect_diffuse: Vec3,
    pub indirect_specular: Vec3,
}

impl ReflectedLight {
    pub fn total_diffuse(&self) -> Vec3 {
        self.direct_diffuse + self.indirect_diffuse
    }

    pub fn total_specular(&self) -> Vec3 {
        self.direct_specular + self.indirect_specular
    }
}
