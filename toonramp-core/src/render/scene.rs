//! Builds pipeline uniforms from a [`SceneConfig`] and renders it.
//!
//! Pipelines are specialised on the light counts, so the runtime counts are
//! dispatched onto one `ToonPipeline<N, S>` per supported pair. Shadow casters
//! are moved to the front of the light list before dispatch.

use glam::{Mat4, UVec2, Vec3};

use super::mesh::{generate_plane, generate_uv_sphere, Mesh};
use super::raster::{self, Framebuffer, RasterStats};
use super::RenderError;
use crate::config::schema::{LightConfig, ObjectConfig, SceneConfig, ShapeConfig};
use crate::config::MAX_POINT_LIGHTS;
use crate::shading::fragment::{FragmentUniforms, PipelineVariant, ToonPipeline};
use crate::shading::shadow::ShadowAtlas;
use crate::shading::types::{PointLight, PointLightShadow};
use crate::shading::vertex::{point_shadow_matrix, Transforms, VertexUniforms};
use crate::texture::{linear_to_srgb, RampTexture};

#[derive(Debug)]
pub struct RenderOutput {
    pub framebuffer: Framebuffer,
    pub stats: RasterStats,
    pub lights: usize,
    pub shadowed_lights: usize,
}

/// Lights in pipeline order: shadow casters first, otherwise as declared.
pub fn ordered_lights(scene: &SceneConfig) -> Vec<&LightConfig> {
    let mut lights: Vec<&LightConfig> = scene.lights.iter().collect();
    lights.sort_by_key(|l| !l.cast_shadow);
    lights
}

impl ObjectConfig {
    pub fn mesh(&self) -> Mesh {
        match self.shape {
            ShapeConfig::Sphere { radius, stacks, slices, .. } => generate_uv_sphere(radius, stacks, slices),
            ShapeConfig::Plane { size, segments, .. } => generate_plane(size, segments),
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        match self.shape {
            ShapeConfig::Sphere { center, .. } | ShapeConfig::Plane { center, .. } => Mat4::from_translation(center),
        }
    }

    /// Distance along the unit ray `dir` from `origin` to the surface a shadow
    /// map would record. Shadow maps keep back faces, so a sphere reports its
    /// exit point and a plane only occludes when seen from below.
    pub fn shadow_depth(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        match self.shape {
            ShapeConfig::Sphere { center, radius, .. } => {
                let oc = origin - center;
                let b = oc.dot(dir);
                let disc = b * b - (oc.length_squared() - radius * radius);
                if disc < 0.0 {
                    return None;
                }
                let t = -b + disc.sqrt();
                (t > 0.0).then_some(t)
            }
            ShapeConfig::Plane { center, size, .. } => {
                if origin.y >= center.y || dir.y <= 0.0 {
                    return None;
                }
                let t = (center.y - origin.y) / dir.y;
                let hit = origin + dir * t;
                let half = size * 0.5;
                ((hit.x - center.x).abs() <= half && (hit.z - center.z).abs() <= half).then_some(t)
            }
        }
    }
}

fn nearest_occluder(objects: &[ObjectConfig], origin: Vec3, dir: Vec3) -> Option<f32> {
    objects
        .iter()
        .filter(|o| o.cast_shadow)
        .filter_map(|o| o.shadow_depth(origin, dir))
        .min_by(f32::total_cmp)
}

fn bake_atlas(scene: &SceneConfig, light: &LightConfig) -> Result<ShadowAtlas, RenderError> {
    let s = &light.shadow;
    let origin = light.position;
    let atlas = ShadowAtlas::bake(UVec2::splat(s.map_size), s.near, s.far, |dir| {
        nearest_occluder(&scene.objects, origin, dir)
    })?;
    Ok(atlas)
}

/// Shadow atlas of the light at `index` in declaration order.
pub fn bake_light_atlas(scene: &SceneConfig, index: usize) -> Result<ShadowAtlas, RenderError> {
    let light = scene
        .lights
        .get(index)
        .ok_or(RenderError::NoSuchLight { index, count: scene.lights.len() })?;
    if !light.cast_shadow {
        return Err(RenderError::NotShadowCaster(index));
    }
    bake_atlas(scene, light)
}

struct Frame<'a> {
    scene: &'a SceneConfig,
    lights: Vec<&'a LightConfig>,
    atlases: Vec<ShadowAtlas>,
    view: Mat4,
    projection: Mat4,
    variant: PipelineVariant,
    ramp: &'a RampTexture,
}

fn render_with<const N: usize, const S: usize>(frame: &Frame<'_>) -> Result<(Framebuffer, RasterStats), RenderError> {
    let scene = frame.scene;
    let point_lights: [PointLight; N] = std::array::from_fn(|i| {
        let l = frame.lights[i];
        PointLight {
            position: frame.view.transform_point3(l.position),
            color: l.radiance(),
            distance: l.distance,
            decay: l.decay,
        }
    });
    let point_light_shadows: [PointLightShadow; S] = std::array::from_fn(|i| {
        let s = &frame.lights[i].shadow;
        PointLightShadow {
            bias: s.bias,
            normal_bias: s.normal_bias,
            radius: s.radius,
            map_size: UVec2::splat(s.map_size).as_vec2(),
            camera_near: s.near,
            camera_far: s.far,
        }
    });
    let shadow_matrices: [Mat4; S] = std::array::from_fn(|i| point_shadow_matrix(frame.lights[i].position));
    let shadow_maps: [&ShadowAtlas; S] = std::array::from_fn(|i| &frame.atlases[i]);

    let pipeline = ToonPipeline::<N, S>::new(frame.variant);
    // clear_color is linear; the framebuffer holds display-encoded bytes
    let clear = linear_to_srgb(scene.clear_color.0.extend(1.0));
    let mut fb = Framebuffer::new(scene.output.width, scene.output.height, clear);
    let mut stats = RasterStats::default();

    for object in &scene.objects {
        let vertex_uniforms = VertexUniforms::<S> {
            transforms: Transforms::new(object.model_matrix(), frame.view, frame.projection),
            point_shadow_matrix: shadow_matrices,
            point_light_shadows,
        };
        let fragment_uniforms = FragmentUniforms::<N, S> {
            point_lights,
            point_light_shadows,
            point_shadow_maps: shadow_maps,
            ambient_light_color: scene.ambient.irradiance(),
            receive_shadow: object.receive_shadow,
            gradient_map: frame.ramp,
        };
        let mesh = object.mesh();
        tracing::debug!(triangles = mesh.triangle_count(), vertices = mesh.vertices.len(), "drawing object");
        let triangles: Vec<_> = mesh
            .triangles()
            .map(|[a, b, c]| {
                [
                    pipeline.vertex(&vertex_uniforms, a),
                    pipeline.vertex(&vertex_uniforms, b),
                    pipeline.vertex(&vertex_uniforms, c),
                ]
            })
            .collect();
        stats += raster::draw(&mut fb, &triangles, |v| pipeline.fragment(&fragment_uniforms, v));
    }

    Ok((fb, stats))
}

macro_rules! dispatch_light_counts {
    ($lights:expr, $shadowed:expr, $frame:expr; $(($n:literal, $s:literal)),* $(,)?) => {
        match ($lights, $shadowed) {
            $(($n, $s) => render_with::<$n, $s>($frame),)*
            (lights, shadowed) => Err(RenderError::UnsupportedLightCount { lights, shadowed, max: MAX_POINT_LIGHTS }),
        }
    };
}

pub fn render_scene(scene: &SceneConfig, ramp: &RampTexture) -> Result<RenderOutput, RenderError> {
    let (width, height) = (scene.output.width, scene.output.height);
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyFramebuffer { width, height });
    }

    let lights = ordered_lights(scene);
    let n = lights.len();
    let s = lights.iter().filter(|l| l.cast_shadow).count();
    if n > MAX_POINT_LIGHTS {
        return Err(RenderError::UnsupportedLightCount { lights: n, shadowed: s, max: MAX_POINT_LIGHTS });
    }

    let atlases = lights[..s].iter().map(|l| bake_atlas(scene, l)).collect::<Result<Vec<_>, _>>()?;
    tracing::info!(width, height, lights = n, shadowed = s, objects = scene.objects.len(), "rendering scene");

    let frame = Frame {
        scene,
        lights,
        atlases,
        view: scene.camera.view_matrix(),
        projection: scene.camera.projection_matrix(width as f32 / height as f32),
        variant: scene.shading.variant(scene.camera.projection),
        ramp,
    };

    let (framebuffer, stats) = dispatch_light_counts!(n, s, &frame;
        (0, 0),
        (1, 0), (1, 1),
        (2, 0), (2, 1), (2, 2),
        (3, 0), (3, 1), (3, 2), (3, 3),
        (4, 0), (4, 1), (4, 2), (4, 3), (4, 4),
    )?;

    tracing::info!(triangles = stats.triangles, culled = stats.culled, fragments = stats.fragments, "render complete");
    Ok(RenderOutput { framebuffer, stats, lights: n, shadowed_lights: s })
}
