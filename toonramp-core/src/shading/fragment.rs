//! Light accumulation and ramp composition, run once per covered pixel.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::attenuation::{Attenuation, AttenuationMode};
use super::brdf::{re_direct, re_indirect_diffuse};
use super::shadow::{ShadowAtlas, ShadowFilter, ShadowLookup};
use super::types::{GeometricContext, IncidentLight, PointLight, PointLightShadow, ReflectedLight};
use super::vertex::{run_vertex, Varyings, VertexInput, VertexUniforms};
use super::NO_LIGHTS_COLOR;
use crate::texture::RampTexture;

/// Ramp lookups stay inside this band so edge texels never bleed in.
pub const RAMP_COORD_MIN: f32 = 0.01;
pub const RAMP_COORD_MAX: f32 = 0.99;

const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewProjection {
    #[default]
    Perspective,
    /// View direction is the fixed `+Z` axis.
    Orthographic,
}

impl ViewProjection {
    /// Maps a varying view-space position to the view direction.
    pub fn view_dir(self) -> fn(Vec3) -> Vec3 {
        match self {
            ViewProjection::Perspective => Vec3::normalize_or_zero,
            ViewProjection::Orthographic => |_: Vec3| Vec3::Z,
        }
    }
}

/// How the accumulated reflectance turns into a ramp coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    /// Green channel of the direct diffuse term only.
    #[default]
    RampDiffuseGreen,
    /// Luminance of total diffuse plus specular.
    RampTotalLuminance,
}

impl Composition {
    pub fn tone(self) -> fn(&ReflectedLight) -> f32 {
        match self {
            Composition::RampDiffuseGreen => |r: &ReflectedLight| r.direct_diffuse.y,
            Composition::RampTotalLuminance => |r: &ReflectedLight| (r.total_diffuse() + r.total_specular()).dot(LUMA),
        }
    }
}

/// Feature toggles fixed when a pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineVariant {
    pub shadow_filter: ShadowFilter,
    pub projection: ViewProjection,
    pub attenuation: AttenuationMode,
    pub composition: Composition,
}

/// Per-frame inputs of the fragment stage. Shadowed lights occupy indices `0..S`.
#[derive(Debug, Clone, Copy)]
pub struct FragmentUniforms<'a, const N: usize, const S: usize> {
    pub point_lights: [PointLight; N],
    pub point_light_shadows: [PointLightShadow; S],
    pub point_shadow_maps: [&'a ShadowAtlas; S],
    pub ambient_light_color: Vec3,
    pub receive_shadow: bool,
    pub gradient_map: &'a RampTexture,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentOutput {
    pub color: Vec4,
    pub reflected: ReflectedLight,
    /// `None` when no light is configured.
    pub ramp_coord: Option<f32>,
}

pub fn ramp_coordinate(value: f32) -> f32 {
    value.clamp(RAMP_COORD_MIN, RAMP_COORD_MAX)
}

pub fn point_light_info(light: &PointLight, geometry: &GeometricContext, attenuation: Attenuation) -> IncidentLight {
    let l_vector = light.position - geometry.position;
    let light_distance = l_vector.length();
    let color = light.color * attenuation(light_distance, light.distance, light.decay);
    IncidentLight { color, direction: l_vector.normalize_or_zero(), visible: color != Vec3::ZERO }
}

/// Toon pipeline specialised for `N` point lights of which the first `S` cast
/// shadows. Variant toggles are resolved to plain functions in [`Self::new`],
/// so the per-fragment path never branches on them.
#[derive(Debug, Clone, Copy)]
pub struct ToonPipeline<const N: usize, const S: usize> {
    variant: PipelineVariant,
    shadow: ShadowLookup,
    attenuation: Attenuation,
    view_dir: fn(Vec3) -> Vec3,
    tone: fn(&ReflectedLight) -> f32,
}

impl<const N: usize, const S: usize> ToonPipeline<N, S> {
    const SHADOWS_WITHIN_LIGHTS: () = assert!(S <= N, "more point shadows than point lights");

    pub fn new(variant: PipelineVariant) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SHADOWS_WITHIN_LIGHTS;
        Self {
            variant,
            shadow: variant.shadow_filter.lookup(),
            attenuation: variant.attenuation.function(),
            view_dir: variant.projection.view_dir(),
            tone: variant.composition.tone(),
        }
    }

    pub fn variant(&self) -> &PipelineVariant {
        &self.variant
    }

    pub fn vertex(&self, uniforms: &VertexUniforms<S>, input: &VertexInput) -> Varyings<S> {
        run_vertex(uniforms, input)
    }

    pub fn fragment(&self, uniforms: &FragmentUniforms<'_, N, S>, varyings: &Varyings<S>) -> Vec4 {
        self.shade_detailed(uniforms, varyings).color
    }

    pub fn shade_detailed(&self, uniforms: &FragmentUniforms<'_, N, S>, varyings: &Varyings<S>) -> FragmentOutput {
        if N == 0 {
            return FragmentOutput { color: NO_LIGHTS_COLOR, reflected: ReflectedLight::default(), ramp_coord: None };
        }

        let geometry = self.geometry(varyings);
        let mut reflected = ReflectedLight::default();

        for (i, light) in uniforms.point_lights.iter().enumerate() {
            let mut direct = point_light_info(light, &geometry, self.attenuation);
            if i < S && direct.visible && uniforms.receive_shadow {
                direct.color *= (self.shadow)(
                    uniforms.point_shadow_maps[i],
                    &uniforms.point_light_shadows[i],
                    varyings.point_shadow_coord[i],
                );
            }
            re_direct(&direct, &geometry, &mut reflected);
        }

        re_indirect_diffuse(uniforms.ambient_light_color, &mut reflected);

        let coord = ramp_coordinate((self.tone)(&reflected));
        FragmentOutput { color: uniforms.gradient_map.sample(coord), reflected, ramp_coord: Some(coord) }
    }

    fn geometry(&self, varyings: &Varyings<S>) -> GeometricContext {
        GeometricContext {
            position: -varyings.view_position,
            normal: varyings.normal.normalize_or_zero(),
            view_dir: (self.view_dir)(varyings.view_position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::shadow::pack_depth_to_rgba;
    use crate::shading::RECIPROCAL_PI;
    use crate::texture::{Filter, Sampler, Texture2D, Wrap};
    use glam::Vec2;

    fn grey_ramp(n: u32) -> RampTexture {
        let t = Texture2D::from_fn(n, 1, |x, _| Vec4::new(x as f32 / (n - 1) as f32, 0.0, 0.0, 1.0)).unwrap();
        RampTexture::new(t.with_sampler(Sampler::NEAREST_CLAMP))
    }

    fn surface(view_position: Vec3) -> Varyings<1> {
        Varyings {
            clip_position: Vec4::ZERO,
            view_position,
            normal: Vec3::Z,
            point_shadow_coord: [Vec4::new(0.0, 0.0, -5.0, 1.0)],
        }
    }

    fn light(position: Vec3, intensity: f32) -> PointLight {
        PointLight { position, color: Vec3::splat(intensity), distance: 0.0, decay: 2.0 }
    }

    fn shadow_params() -> PointLightShadow {
        PointLightShadow {
            map_size: Vec2::splat(8.0),
            camera_near: 0.0,
            camera_far: 10.0,
            ..Default::default()
        }
    }

    fn occluded_atlas() -> ShadowAtlas {
        ShadowAtlas::from_packed(32, 16, vec![pack_depth_to_rgba(0.1); 32 * 16]).unwrap()
    }

    #[test]
    fn no_lights_yields_magenta() {
        let ramp = grey_ramp(4);
        let uniforms = FragmentUniforms::<0, 0> {
            point_lights: [],
            point_light_shadows: [],
            point_shadow_maps: [],
            ambient_light_color: Vec3::ONE,
            receive_shadow: true,
            gradient_map: &ramp,
        };
        let pipeline = ToonPipeline::<0, 0>::new(PipelineVariant::default());
        for p in [Vec3::ZERO, Vec3::new(3.0, -2.0, 9.0)] {
            let v = Varyings::<0> { clip_position: Vec4::ZERO, view_position: p, normal: Vec3::X, point_shadow_coord: [] };
            assert_eq!(pipeline.fragment(&uniforms, &v), Vec4::new(1.0, 0.0, 1.0, 1.0));
        }
    }

    #[test]
    fn ramp_coordinate_is_clamped() {
        assert_eq!(ramp_coordinate(-5.0), RAMP_COORD_MIN);
        assert_eq!(ramp_coordinate(5.0), RAMP_COORD_MAX);
        assert_eq!(ramp_coordinate(0.5), 0.5);
    }

    #[test]
    fn overbright_light_never_wraps_the_ramp() {
        let texture = Texture2D::from_fn(10, 1, |x, _| Vec4::splat(x as f32)).unwrap()
            .with_sampler(Sampler { filter: Filter::Nearest, wrap: Wrap::Repeat });
        let ramp = RampTexture::new(texture);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 500.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: false,
            gradient_map: &ramp,
        };
        let out = ToonPipeline::<1, 1>::new(PipelineVariant::default()).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert_eq!(out.ramp_coord, Some(RAMP_COORD_MAX));
        assert_eq!(out.color.x, 9.0);
    }

    #[test]
    fn head_on_light_samples_lambert_coordinate() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 1.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::splat(0.25),
            receive_shadow: false,
            gradient_map: &ramp,
        };
        let out = ToonPipeline::<1, 1>::new(PipelineVariant::default()).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert!((out.reflected.direct_diffuse.y - RECIPROCAL_PI).abs() < 1e-6);
        assert!((out.reflected.indirect_diffuse.y - 0.25 * RECIPROCAL_PI).abs() < 1e-6);
        assert!(out.reflected.direct_specular.y > 0.0);
        assert_eq!(out.color, ramp.sample(RECIPROCAL_PI));
    }

    #[test]
    fn shadowed_light_drops_to_ambient_band() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let mut uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 1.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: true,
            gradient_map: &ramp,
        };
        let pipeline = ToonPipeline::<1, 1>::new(PipelineVariant::default());
        let shadowed = pipeline.shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert_eq!(shadowed.reflected.direct_diffuse, Vec3::ZERO);
        assert_eq!(shadowed.ramp_coord, Some(RAMP_COORD_MIN));

        uniforms.receive_shadow = false;
        let lit = pipeline.shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert!(lit.reflected.direct_diffuse.y > 0.3);
    }

    #[test]
    fn unshadowed_lights_ignore_atlases() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<2, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 1.0), light(Vec3::new(0.0, 0.0, 5.0), 1.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: true,
            gradient_map: &ramp,
        };
        let out = ToonPipeline::<2, 1>::new(PipelineVariant::default()).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert!((out.reflected.direct_diffuse.y - RECIPROCAL_PI).abs() < 1e-6);
    }

    #[test]
    fn cutoff_hides_distant_light() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let mut l = light(Vec3::new(0.0, 0.0, 5.0), 1.0);
        l.distance = 4.0;
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [l],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: true,
            gradient_map: &ramp,
        };
        let out = ToonPipeline::<1, 1>::new(PipelineVariant::default()).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert_eq!(out.reflected.direct_diffuse, Vec3::ZERO);
        assert_eq!(out.reflected.direct_specular, Vec3::ZERO);
    }

    #[test]
    fn orthographic_view_uses_fixed_axis() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 1.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: false,
            gradient_map: &ramp,
        };
        // eye sits off to the side; perspective sees a grazing view
        let varyings = surface(Vec3::new(10.0, 0.0, 0.1));
        let persp = ToonPipeline::<1, 1>::new(PipelineVariant::default()).shade_detailed(&uniforms, &varyings);
        let ortho = ToonPipeline::<1, 1>::new(PipelineVariant { projection: ViewProjection::Orthographic, ..Default::default() })
            .shade_detailed(&uniforms, &varyings);
        assert_ne!(persp.reflected.direct_specular, ortho.reflected.direct_specular);
    }

    #[test]
    fn luminance_composition_includes_specular() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 0.5)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: false,
            gradient_map: &ramp,
        };
        let variant = PipelineVariant { composition: Composition::RampTotalLuminance, ..Default::default() };
        let out = ToonPipeline::<1, 1>::new(variant).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        let expected = (out.reflected.total_diffuse() + out.reflected.total_specular()).dot(LUMA);
        assert_eq!(out.ramp_coord, Some(ramp_coordinate(expected)));
        assert!(out.ramp_coord.unwrap() > out.reflected.direct_diffuse.y);
    }

    #[test]
    fn variant_functions_follow_toggles() {
        let p = Vec3::new(3.0, 0.0, 4.0);
        assert!((ViewProjection::Perspective.view_dir()(p) - Vec3::new(0.6, 0.0, 0.8)).length() < 1e-6);
        assert_eq!(ViewProjection::Orthographic.view_dir()(p), Vec3::Z);
        let reflected = ReflectedLight { direct_diffuse: Vec3::new(0.1, 0.4, 0.2), ..Default::default() };
        assert_eq!(Composition::RampDiffuseGreen.tone()(&reflected), 0.4);
        assert_eq!(Composition::RampTotalLuminance.tone()(&reflected), reflected.total_diffuse().dot(LUMA));
    }

    #[test]
    fn basic_filter_shadows_like_pcf_on_uniform_depth() {
        let ramp = grey_ramp(101);
        let atlas = occluded_atlas();
        let uniforms = FragmentUniforms::<1, 1> {
            point_lights: [light(Vec3::new(0.0, 0.0, 5.0), 1.0)],
            point_light_shadows: [shadow_params()],
            point_shadow_maps: [&atlas],
            ambient_light_color: Vec3::ZERO,
            receive_shadow: true,
            gradient_map: &ramp,
        };
        let variant = PipelineVariant { shadow_filter: ShadowFilter::Basic, ..Default::default() };
        let out = ToonPipeline::<1, 1>::new(variant).shade_detailed(&uniforms, &surface(Vec3::new(0.0, 0.0, 3.0)));
        assert_eq!(out.reflected.direct_diffuse, Vec3::ZERO);
    }
}
