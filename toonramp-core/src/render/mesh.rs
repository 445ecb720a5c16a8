use glam::Vec3;

use crate::shading::vertex::VertexInput;

/// Indexed triangle list in object space.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<VertexInput>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [&VertexInput; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |t| {
            [&self.vertices[t[0] as usize], &self.vertices[t[1] as usize], &self.vertices[t[2] as usize]]
        })
    }
}

// Generate a UV sphere centered at origin with the given radius.
// stacks: latitude segments (>= 3), slices: longitude segments (>= 3)
pub fn generate_uv_sphere(radius: f32, stacks: u32, slices: u32) -> Mesh {
    let stacks = stacks.max(3);
    let slices = slices.max(3);
    let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize);
    let mut indices = Vec::with_capacity((stacks * slices * 6) as usize);

    for i in 0..=stacks {
        let theta = i as f32 / stacks as f32 * std::f32::consts::PI; // 0..PI
        let (sin_t, cos_t) = theta.sin_cos();
        for j in 0..=slices {
            let phi = j as f32 / slices as f32 * std::f32::consts::TAU; // 0..2PI
            let (sin_p, cos_p) = phi.sin_cos();
            let normal = Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p);
            vertices.push(VertexInput { position: normal * radius, normal });
        }
    }

    let stride = slices + 1;
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * stride + j;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b]);
            indices.extend_from_slice(&[b, c, d]);
        }
    }

    Mesh { vertices, indices }
}

// Square in the XZ plane facing +Y, split into segments x segments quads.
pub fn generate_plane(size: f32, segments: u32) -> Mesh {
    let segments = segments.max(1);
    let half = size * 0.5;
    let stride = segments + 1;
    let mut vertices = Vec::with_capacity((stride * stride) as usize);
    let mut indices = Vec::with_capacity((segments * segments * 6) as usize);

    for i in 0..=segments {
        let z = -half + size * i as f32 / segments as f32;
        for j in 0..=segments {
            let x = -half + size * j as f32 / segments as f32;
            vertices.push(VertexInput { position: Vec3::new(x, 0.0, z), normal: Vec3::Y });
        }
    }

    for i in 0..segments {
        for j in 0..segments {
            let a = i * stride + j;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b]);
            indices.extend_from_slice(&[b, c, d]);
        }
    }

    Mesh { vertices, indices }
}
