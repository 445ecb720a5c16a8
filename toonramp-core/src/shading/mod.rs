//! Two-stage toon shading pipeline evaluated on the CPU.
//!
//! The vertex stage (`vertex`) produces view-space varyings and per-light
//! shadow coordinates; the fragment stage (`fragment`) folds the point lights,
//! applies cube-atlas shadows and resolves the final color through a ramp.
//! Both stages are pure functions of their inputs.

pub mod attenuation;
pub mod brdf;
pub mod fragment;
pub mod shadow;
pub mod types;
pub mod vertex;

pub const RECIPROCAL_PI: f32 = std::f32::consts::FRAC_1_PI;
pub const EPSILON: f32 = 1e-6;

/// Diagnostic color emitted when a pipeline variant has no point lights.
pub const NO_LIGHTS_COLOR: glam::Vec4 = glam::Vec4::new(1.0, 0.0, 1.0, 1.0);

#[inline]
pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[inline]
pub fn pow2(x: f32) -> f32 {
    x * x
}

#[inline]
pub fn pow4(x: f32) -> f32 {
    let x2 = x * x;
    x2 * x2
}
