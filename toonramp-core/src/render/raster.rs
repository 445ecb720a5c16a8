//! Scanline-free triangle rasterizer over the vertex stage's clip-space output.
//!
//! Depth follows glam's `[0, 1]` NDC convention, so the near plane is
//! `clip.z = 0`. Triangles are two-sided. Each row of the framebuffer is
//! resolved in parallel: the nearest covering fragment of a draw is found
//! first and only that fragment is shaded.

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::shading::vertex::Varyings;
use crate::texture::vec4_to_rgba8;

#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl Framebuffer {
    /// `clear` is quantized as-is, with no transfer function.
    pub fn new(width: u32, height: u32, clear: Vec4) -> Self {
        let len = width as usize * height as usize;
        Self { width, height, color: vec![vec4_to_rgba8(clear); len], depth: vec![f32::INFINITY; len] }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.color[(y * self.width + x) as usize]
    }

    /// NDC depth at a pixel, `INFINITY` where nothing was drawn.
    #[cfg(test)]
    fn depth(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width + x) as usize]
    }

    /// Tightly packed RGBA8 rows, top row first.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.color)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RasterStats {
    pub triangles: usize,
    /// Triangles entirely behind the near plane.
    pub culled: usize,
    pub fragments: u64,
}

impl std::ops::AddAssign for RasterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.triangles += rhs.triangles;
        self.culled += rhs.culled;
        self.fragments += rhs.fragments;
    }
}

/// Clips a triangle against the near plane and fans the remainder back into triangles.
pub fn clip_near<const S: usize>(tri: &[Varyings<S>; 3]) -> Vec<[Varyings<S>; 3]> {
    let dist = |v: &Varyings<S>| v.clip_position.z;
    let inside = tri.iter().filter(|v| dist(v) >= 0.0).count();
    if inside == 3 {
        return vec![*tri];
    }
    if inside == 0 {
        return Vec::new();
    }

    let mut poly: Vec<Varyings<S>> = Vec::with_capacity(4);
    for i in 0..3 {
        let a = &tri[i];
        let b = &tri[(i + 1) % 3];
        let (da, db) = (dist(a), dist(b));
        if da >= 0.0 {
            poly.push(*a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            let t = da / (da - db);
            poly.push(Varyings::interpolate(a, b, b, Vec3::new(1.0 - t, t, 0.0)));
        }
    }
    (1..poly.len() - 1).map(|i| [poly[0], poly[i], poly[i + 1]]).collect()
}

struct ScreenTriangle<const S: usize> {
    verts: [Varyings<S>; 3],
    p: [Vec2; 3],
    z: [f32; 3],
    inv_w: [f32; 3],
    area: f32,
    min: Vec2,
    max: Vec2,
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn setup<const S: usize>(verts: [Varyings<S>; 3], size: Vec2) -> Option<ScreenTriangle<S>> {
    let mut p = [Vec2::ZERO; 3];
    let mut z = [0.0; 3];
    let mut inv_w = [0.0; 3];
    for (i, v) in verts.iter().enumerate() {
        let clip = v.clip_position;
        if clip.w <= f32::EPSILON {
            return None;
        }
        inv_w[i] = 1.0 / clip.w;
        let ndc = clip.truncate() * inv_w[i];
        p[i] = Vec2::new((ndc.x * 0.5 + 0.5) * size.x, (0.5 - ndc.y * 0.5) * size.y);
        z[i] = ndc.z;
    }
    let area = edge(p[0], p[1], p[2]);
    if area.abs() < 1e-12 {
        return None;
    }
    let min = p[0].min(p[1]).min(p[2]);
    let max = p[0].max(p[1]).max(p[2]);
    Some(ScreenTriangle { verts, p, z, inv_w, area, min, max })
}

/// Rasterizes one draw into `fb`, calling `shade` once per visible pixel.
pub fn draw<const S: usize, F>(fb: &mut Framebuffer, triangles: &[[Varyings<S>; 3]], shade: F) -> RasterStats
where
    F: Fn(&Varyings<S>) -> Vec4 + Sync,
{
    let mut stats = RasterStats { triangles: triangles.len(), ..Default::default() };
    if fb.width == 0 || fb.height == 0 {
        return stats;
    }
    let size = Vec2::new(fb.width as f32, fb.height as f32);

    let mut screen = Vec::with_capacity(triangles.len());
    for tri in triangles {
        let clipped = clip_near(tri);
        if clipped.is_empty() {
            stats.culled += 1;
        }
        screen.extend(clipped.into_iter().filter_map(|t| setup(t, size)));
    }

    let width = fb.width as usize;
    let screen = &screen;
    let shade = &shade;
    stats.fragments = fb
        .color
        .par_chunks_mut(width)
        .zip(fb.depth.par_chunks_mut(width))
        .enumerate()
        .map(|(y, (color_row, depth_row))| {
            let py = y as f32 + 0.5;
            let mut nearest: Vec<Option<(usize, Vec3)>> = vec![None; width];

            for (ti, t) in screen.iter().enumerate() {
                if py < t.min.y || py > t.max.y {
                    continue;
                }
                let x0 = t.min.x.floor().clamp(0.0, size.x) as usize;
                let x1 = t.max.x.ceil().clamp(0.0, size.x) as usize;
                for x in x0..x1 {
                    let p = Vec2::new(x as f32 + 0.5, py);
                    let w = Vec3::new(edge(t.p[1], t.p[2], p), edge(t.p[2], t.p[0], p), edge(t.p[0], t.p[1], p)) / t.area;
                    if w.min_element() < 0.0 {
                        continue;
                    }
                    let depth = w.dot(Vec3::from(t.z));
                    if !(0.0..=1.0).contains(&depth) || depth >= depth_row[x] {
                        continue;
                    }
                    depth_row[x] = depth;
                    let pw = w * Vec3::from(t.inv_w);
                    nearest[x] = Some((ti, pw / pw.element_sum()));
                }
            }

            let mut shaded = 0u64;
            for (x, hit) in nearest.into_iter().enumerate() {
                if let Some((ti, weights)) = hit {
                    let [a, b, c] = &screen[ti].verts;
                    color_row[x] = vec4_to_rgba8(shade(&Varyings::interpolate(a, b, c, weights)));
                    shaded += 1;
                }
            }
            shaded
        })
        .sum();

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vert(x: f32, y: f32, z: f32, w: f32) -> Varyings<0> {
        Varyings { clip_position: Vec4::new(x, y, z, w), view_position: Vec3::splat(x), normal: Vec3::Z, point_shadow_coord: [] }
    }

    fn big_triangle(z: f32) -> [Varyings<0>; 3] {
        [vert(-3.0, -1.0, z, 1.0), vert(3.0, -1.0, z, 1.0), vert(0.0, 3.0, z, 1.0)]
    }

    #[test]
    fn covers_pixels_and_records_depth() {
        let mut fb = Framebuffer::new(8, 8, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let stats = draw(&mut fb, &[big_triangle(0.5)], |_| Vec4::ONE);
        assert_eq!(stats.fragments, 64);
        assert_eq!(fb.pixel(3, 3), [255; 4]);
        assert!((fb.depth(3, 3) - 0.5).abs() < 1e-6);
        assert_eq!(fb.as_bytes().len(), 8 * 8 * 4);
    }

    #[test]
    fn winding_does_not_matter() {
        let mut fb = Framebuffer::new(4, 4, Vec4::ZERO);
        let [a, b, c] = big_triangle(0.5);
        let stats = draw(&mut fb, &[[a, c, b]], |_| Vec4::ONE);
        assert_eq!(stats.fragments, 16);
    }

    #[test]
    fn nearest_fragment_wins_and_is_shaded_once() {
        let mut fb = Framebuffer::new(4, 4, Vec4::ZERO);
        let far = big_triangle(0.8);
        let mut near = big_triangle(0.2);
        for v in near.iter_mut() {
            v.normal = Vec3::X;
        }
        let stats = draw(&mut fb, &[near, far], |v| if v.normal == Vec3::X { Vec4::ONE } else { Vec4::ZERO });
        assert_eq!(stats.fragments, 16);
        assert_eq!(fb.pixel(1, 1), [255; 4]);

        // a second draw behind the first leaves the pixels untouched
        let stats = draw(&mut fb, &[big_triangle(0.9)], |_| Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(stats.fragments, 0);
        assert_eq!(fb.pixel(1, 1), [255; 4]);
    }

    #[test]
    fn triangles_behind_near_plane_are_culled() {
        let mut fb = Framebuffer::new(4, 4, Vec4::ZERO);
        let stats = draw(&mut fb, &[big_triangle(-0.1)], |_| Vec4::ONE);
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.fragments, 0);
    }

    #[test]
    fn near_clip_splits_crossing_triangles() {
        let one_out = [vert(0.0, 0.0, -1.0, 1.0), vert(1.0, 0.0, 1.0, 1.0), vert(0.0, 1.0, 1.0, 1.0)];
        let pieces = clip_near(&one_out);
        assert_eq!(pieces.len(), 2);
        let two_out = [vert(0.0, 0.0, -1.0, 1.0), vert(1.0, 0.0, -1.0, 1.0), vert(0.0, 1.0, 1.0, 1.0)];
        let pieces = clip_near(&two_out);
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].iter().all(|v| v.clip_position.z >= -1e-6));
        // interpolated varyings follow the clip position
        assert!((pieces[0][1].view_position.x - pieces[0][1].clip_position.x).abs() < 1e-6);
    }

    #[test]
    fn perspective_correct_weights_favour_near_vertex() {
        let mut fb = Framebuffer::new(16, 16, Vec4::ZERO);
        // left edge is close (w = 1), right edge far (w = 4)
        let tri = [
            vert(-1.0, -1.0, 0.5, 1.0),
            vert(4.0, -4.0, 2.0, 4.0),
            vert(-1.0, 1.0, 0.5, 1.0),
        ];
        let shaded = std::sync::Mutex::new(Vec::new());
        draw(&mut fb, &[tri], |v| {
            shaded.lock().unwrap().push(v.view_position.x);
            Vec4::ONE
        });
        let values = shaded.into_inner().unwrap();
        assert!(!values.is_empty());
        assert!(values.iter().all(|x| (-1.0..=4.0).contains(x)));
    }
}
