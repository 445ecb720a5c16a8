//! Geometry and shadow-coordinate stage, run once per vertex.

use glam::{Mat3, Mat4, Vec3, Vec4};

use super::types::PointLightShadow;

/// Camera and object matrices for one draw, plus the derived products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub model_view: Mat4,
    /// Inverse-transpose of the upper 3x3 of `model_view`.
    pub normal_matrix: Mat3,
}

impl Transforms {
    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        let model_view = view * model;
        let upper = Mat3::from_mat4(model_view);
        let normal_matrix = if upper.determinant().abs() > f32::EPSILON {
            upper.inverse().transpose()
        } else {
            upper
        };
        Self { model, view, projection, model_view, normal_matrix }
    }
}

impl Default for Transforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Object-space vertex attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInput {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Per-draw inputs of the vertex stage for `S` shadow-casting point lights.
#[derive(Debug, Clone, Copy)]
pub struct VertexUniforms<const S: usize> {
    pub transforms: Transforms,
    pub point_shadow_matrix: [Mat4; S],
    pub point_light_shadows: [PointLightShadow; S],
}

/// Vertex stage outputs, interpolated across a primitive before shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings<const S: usize> {
    pub clip_position: Vec4,
    /// Negated view-space position, i.e. the vector from the surface to the eye.
    pub view_position: Vec3,
    pub normal: Vec3,
    pub point_shadow_coord: [Vec4; S],
}

impl<const S: usize> Varyings<S> {
    /// Blends three vertex outputs with barycentric `weights` (summing to one).
    pub fn interpolate(a: &Self, b: &Self, c: &Self, weights: Vec3) -> Self {
        let mix3 = |x: Vec3, y: Vec3, z: Vec3| x * weights.x + y * weights.y + z * weights.z;
        let mix4 = |x: Vec4, y: Vec4, z: Vec4| x * weights.x + y * weights.y + z * weights.z;
        Self {
            clip_position: mix4(a.clip_position, b.clip_position, c.clip_position),
            view_position: mix3(a.view_position, b.view_position, c.view_position),
            normal: mix3(a.normal, b.normal, c.normal),
            point_shadow_coord: std::array::from_fn(|i| {
                mix4(a.point_shadow_coord[i], b.point_shadow_coord[i], c.point_shadow_coord[i])
            }),
        }
    }
}

/// Host-side shadow matrix for a point light: maps a world position to the
/// vector from the light to that position.
pub fn point_shadow_matrix(light_world_position: Vec3) -> Mat4 {
    Mat4::from_translation(-light_world_position)
}

/// Transforms a direction by the inverse of an orthonormal `matrix`.
pub fn inverse_transform_direction(dir: Vec3, matrix: &Mat4) -> Vec3 {
    (Mat3::from_mat4(*matrix).transpose() * dir).normalize_or_zero()
}

pub fn run_vertex<const S: usize>(uniforms: &VertexUniforms<S>, input: &VertexInput) -> Varyings<S> {
    let t = &uniforms.transforms;
    let position = input.position.extend(1.0);

    let transformed_normal = t.normal_matrix * input.normal;
    let normal = transformed_normal.normalize_or_zero();

    let mv_position = t.model_view * position;
    let clip_position = t.projection * mv_position;
    let world_position = t.model * position;

    let shadow_world_normal = inverse_transform_direction(transformed_normal, &t.view);
    let point_shadow_coord = std::array::from_fn(|i| {
        let offset = shadow_world_normal * uniforms.point_light_shadows[i].normal_bias;
        uniforms.point_shadow_matrix[i] * (world_position + offset.extend(0.0))
    });

    Varyings {
        clip_position,
        view_position: -mv_position.truncate(),
        normal,
        point_shadow_coord,
    }
}
