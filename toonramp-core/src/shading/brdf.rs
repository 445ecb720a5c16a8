//! Lambert diffuse and GGX microfacet specular terms.

use glam::Vec3;

use super::types::{GeometricContext, IncidentLight, ReflectedLight};
use super::{pow2, saturate, EPSILON, RECIPROCAL_PI};

/// Fixed specular material of the toon surface.
pub const SPECULAR_F0: Vec3 = Vec3::ONE;
pub const SPECULAR_F90: f32 = 0.5;
pub const ROUGHNESS: f32 = 0.5;

pub fn brdf_lambert(diffuse_color: Vec3) -> Vec3 {
    RECIPROCAL_PI * diffuse_color
}

#[inline]
fn schlick_weight(dot_vh: f32) -> f32 {
    // Spherical gaussian fit of (1 - cos)^5 (Epic, SIGGRAPH '13).
    ((-5.55473 * dot_vh - 6.98316) * dot_vh).exp2()
}

pub fn f_schlick(f0: Vec3, f90: f32, dot_vh: f32) -> Vec3 {
    let fresnel = schlick_weight(dot_vh);
    f0 * (1.0 - fresnel) + Vec3::splat(f90 * fresnel)
}

/// Height-correlated Smith visibility for GGX.
pub fn v_ggx_smith_correlated(alpha: f32, dot_nl: f32, dot_nv: f32) -> f32 {
    let a2 = pow2(alpha);
    let gv = dot_nl * (a2 + (1.0 - a2) * pow2(dot_nv)).sqrt();
    let gl = dot_nv * (a2 + (1.0 - a2) * pow2(dot_nl)).sqrt();
    0.5 / (gv + gl).max(EPSILON)
}

pub fn d_ggx(alpha: f32, dot_nh: f32) -> f32 {
    let a2 = pow2(alpha);
    let denom = pow2(dot_nh) * (a2 - 1.0) + 1.0;
    RECIPROCAL_PI * a2 / pow2(denom)
}

/// `F * V * D` with `alpha = roughness^2`.
pub fn brdf_ggx(light_dir: Vec3, view_dir: Vec3, normal: Vec3, f0: Vec3, f90: f32, roughness: f32) -> Vec3 {
    let alpha = pow2(roughness);
    let half_dir = (light_dir + view_dir).normalize_or_zero();

    let dot_nl = saturate(normal.dot(light_dir));
    let dot_nv = saturate(normal.dot(view_dir));
    let dot_nh = saturate(normal.dot(half_dir));
    let dot_vh = saturate(view_dir.dot(half_dir));

    let f = f_schlick(f0, f90, dot_vh);
    let v = v_ggx_smith_correlated(alpha, dot_nl, dot_nv);
    let d = d_ggx(alpha, dot_nh);
    f * (v * d)
}

/// Accumulates one direct light into `reflected`.
pub fn re_direct(light: &IncidentLight, geometry: &GeometricContext, reflected: &mut ReflectedLight) {
    let dot_nl = saturate(geometry.normal.dot(light.direction));
    let irradiance = dot_nl * light.color;

    reflected.direct_specular += irradiance
        * brdf_ggx(light.direction, geometry.view_dir, geometry.normal, SPECULAR_F0, SPECULAR_F90, ROUGHNESS);
    reflected.direct_diffuse += irradiance * brdf_lambert(Vec3::ONE);
}

pub fn re_indirect_diffuse(irradiance: Vec3, reflected: &mut ReflectedLight) {
    reflected.indirect_diffuse += irradiance * brdf_lambert(Vec3::ONE);
}
