use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::{
    camera::Projection,
    clip::{ClipArena, ClipTriangle, ClipVertex},
    gbuffer::{DepthBand, Fragment, GBufferBand},
    material::Material,
    math::EPSILON,
    tile::{Tile, TileBins, TileGrid},
};

/// What a depth-only pass stores per texel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DepthEncoding {
    /// NDC z remapped to `[0, 1]`.
    Ndc,
    /// Interpolated clip `w`, the view distance under a perspective projection.
    ClipW,
    /// View distance recovered from NDC z through the projection that made it.
    Linear(Projection),
}

/// NDC to pixel coordinates; row 0 is the top of the target.
pub fn ndc_to_pixel(ndc: Vec2, width: usize, height: usize) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * width as f32,
        (1.0 - ndc.y) * 0.5 * height as f32,
    )
}

/// Barycentric weights of `p` in the 2-D triangle `(a, b, c)`, or `None` for
/// a degenerate triangle.
pub fn barycentric(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> Option<Vec3> {
    let ab = b - a;
    let bc = c - b;
    let pa = a - p;
    let pb = b - p;
    let area = ab.perp_dot(bc);
    if area.abs() < f32::EPSILON {
        return None;
    }
    let alpha = pb.perp_dot(bc) / area;
    let gamma = pa.perp_dot(ab) / area;
    Some(Vec3::new(alpha, 1.0 - alpha - gamma, gamma))
}

pub fn is_inside(bary: Vec3) -> bool {
    bary.min_element() >= -EPSILON
}

/// Screen-space weights divided by each vertex's clip `w` and renormalized.
/// `None` when the weight sum is not positive.
pub fn perspective_correct(bary: Vec3, w: Vec3) -> Option<Vec3> {
    let corrected = bary / w;
    let sum = corrected.x + corrected.y + corrected.z;
    if !(sum.is_finite() && sum > 0.0) {
        return None;
    }
    Some(corrected / sum)
}

/// Per-triangle tangent and bitangent from positions and UV deltas.
pub fn tangent_frame(v: &[ClipVertex; 3]) -> (Vec3, Vec3) {
    let edge1 = v[1].world - v[0].world;
    let edge2 = v[2].world - v[0].world;
    let uv1 = v[1].uv - v[0].uv;
    let uv2 = v[2].uv - v[0].uv;
    let tangent = (uv2.y * edge1 - uv1.y * edge2).normalize_or_zero();
    let bitangent = (uv1.x * edge2 - uv2.x * edge1).normalize_or_zero();
    if uv1.perp_dot(uv2) > 0.0 {
        (tangent, bitangent)
    } else {
        (-tangent, -bitangent)
    }
}

/// Applies a tangent-space normal with the tangent orthogonalized against the
/// interpolated normal.
pub fn perturb_normal(normal: Vec3, tangent: Vec3, bitangent: Vec3, sampled: Vec3) -> Vec3 {
    let t = (tangent - tangent.dot(normal) * normal).normalize_or_zero();
    let mut b = normal.cross(t).normalize_or_zero();
    if b.dot(bitangent) <= 0.0 {
        b = -b;
    }
    let n = (t * sampled.x + b * sampled.y + normal * sampled.z).normalize_or_zero();
    if n == Vec3::ZERO {
        normal
    } else {
        n
    }
}

/// A clipped triangle after perspective divide and viewport mapping.
#[derive(Clone, Copy, Debug)]
pub struct ScreenTriangle {
    pub vertices: [ClipVertex; 3],
    pub screen: [Vec2; 3],
    pub mesh: u32,
    pub tbn: Option<(Vec3, Vec3)>,
}

impl ScreenTriangle {
    pub fn new(tri: &ClipTriangle, mesh: u32, width: usize, height: usize) -> Option<Self> {
        let v = tri.vertices;
        if v.iter().any(|v| !(v.clip.w > 0.0)) {
            return None;
        }
        let screen = v.map(|v| ndc_to_pixel(v.clip.truncate().truncate() / v.clip.w, width, height));
        let area = (screen[1] - screen[0]).perp_dot(screen[2] - screen[1]);
        if !(area.abs() >= f32::EPSILON) {
            return None;
        }
        Some(Self {
            vertices: v,
            screen,
            mesh,
            tbn: None,
        })
    }

    pub fn with_tangent_frame(mut self) -> Self {
        self.tbn = Some(tangent_frame(&self.vertices));
        self
    }

    /// Inclusive pixel bounds of the screen-space bounding box.
    pub fn pixel_bounds(&self) -> (i32, i32, i32, i32) {
        let [a, b, c] = self.screen;
        let min = a.min(b).min(c);
        let max = a.max(b).max(c);
        (
            min.x.floor() as i32,
            min.y.floor() as i32,
            max.x.floor() as i32,
            max.y.floor() as i32,
        )
    }

    fn w(&self) -> Vec3 {
        Vec3::new(
            self.vertices[0].clip.w,
            self.vertices[1].clip.w,
            self.vertices[2].clip.w,
        )
    }

    fn interpolate<T>(&self, weights: Vec3, attr: impl Fn(&ClipVertex) -> T) -> T
    where
        T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
    {
        attr(&self.vertices[0]) * weights.x
            + attr(&self.vertices[1]) * weights.y
            + attr(&self.vertices[2]) * weights.z
    }

    /// Calls `f(x, y, weights)` for every pixel center of `tile` inside the
    /// triangle, with perspective-correct weights.
    pub fn for_each_sample(&self, tile: &Tile, mut f: impl FnMut(usize, usize, Vec3)) {
        let (min_x, min_y, max_x, max_y) = self.pixel_bounds();
        let x0 = min_x.max(tile.x0 as i32);
        let y0 = min_y.max(tile.y0 as i32);
        let x1 = max_x.min(tile.x1 as i32 - 1);
        let y1 = max_y.min(tile.y1 as i32 - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }
        let w = self.w();
        let [a, b, c] = self.screen;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let Some(bary) = barycentric(a, b, c, p) else {
                    return;
                };
                if !is_inside(bary) {
                    continue;
                }
                if let Some(weights) = perspective_correct(bary, w) {
                    f(x as usize, y as usize, weights);
                }
            }
        }
    }

    /// NDC z for perspective-correct `weights`.
    pub fn ndc_depth(&self, weights: Vec3) -> f32 {
        let z = self.interpolate(weights, |v| v.clip.z);
        let w = self.interpolate(weights, |v| v.clip.w);
        z / w
    }

    pub fn encoded_depth(&self, weights: Vec3, encoding: DepthEncoding) -> f32 {
        match encoding {
            DepthEncoding::Ndc => self.ndc_depth(weights) * 0.5 + 0.5,
            DepthEncoding::ClipW => self.interpolate(weights, |v| v.clip.w),
            DepthEncoding::Linear(projection) => projection.linear_depth(self.ndc_depth(weights)),
        }
    }

    pub fn uv(&self, weights: Vec3) -> Vec2 {
        self.interpolate(weights, |v| v.uv)
    }

    /// G-buffer sample for `weights`, shading channels resolved through
    /// `material`.
    pub fn fragment(&self, weights: Vec3, material: &Material) -> Fragment {
        let uv = self.uv(weights);
        let mut normal = self.interpolate(weights, |v| v.normal).normalize_or_zero();
        if let (Some((tangent, bitangent)), Some(sampled)) = (self.tbn, material.tangent_normal(uv)) {
            normal = perturb_normal(normal, tangent, bitangent, sampled.normalize_or_zero());
        }
        Fragment {
            depth: self.encoded_depth(weights, DepthEncoding::Ndc),
            position: self.interpolate(weights, |v| v.world),
            normal,
            diffuse: material.diffuse(uv, self.interpolate(weights, |v| v.color)),
            specular: material.specular(uv),
            glow: material.glow(uv),
        }
    }
}

/// Screen triangles of a whole frame, binned per tile.
#[derive(Debug, Default)]
pub struct BinnedTriangles {
    pub triangles: Vec<ScreenTriangle>,
    pub bins: TileBins,
}

impl BinnedTriangles {
    /// Maps every arena triangle to `grid`'s pixel space and bins it.
    /// `wants_tbn(mesh)` selects meshes that need a tangent frame.
    pub fn build(arena: &ClipArena, grid: &TileGrid, wants_tbn: impl Fn(usize) -> bool + Sync) -> Self {
        let (width, height) = (grid.width(), grid.height());
        let wants_tbn = &wants_tbn;
        let triangles: Vec<ScreenTriangle> = (0..arena.mesh_count())
            .into_par_iter()
            .flat_map_iter(move |mesh| {
                let tbn = wants_tbn(mesh);
                arena.mesh(mesh).iter().filter_map(move |t| {
                    ScreenTriangle::new(t, mesh as u32, width, height)
                        .map(|s| if tbn { s.with_tangent_frame() } else { s })
                })
            })
            .collect();
        let bins = TileBins::build(grid, triangles.iter().map(ScreenTriangle::pixel_bounds));
        Self { triangles, bins }
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn in_tile(&self, tile: &Tile) -> impl Iterator<Item = &ScreenTriangle> + '_ {
        self.bins
            .items(tile.index)
            .iter()
            .map(move |&i| &self.triangles[i as usize])
    }
}

/// Rasterizes the triangles binned to `tile` into a G-buffer band.
pub fn rasterize_gbuffer_tile(
    band: &mut GBufferBand<'_>,
    tile: Tile,
    tris: &BinnedTriangles,
    materials: &[&Material],
) {
    for tri in tris.in_tile(&tile) {
        let Some(material) = materials.get(tri.mesh as usize) else {
            continue;
        };
        tri.for_each_sample(&tile, |x, y, weights| {
            let depth = tri.encoded_depth(weights, DepthEncoding::Ndc);
            // Depth-test before resolving textures.
            if depth < band.depth_at(x, y) {
                band.try_write(x, y, &tri.fragment(weights, material));
            }
        });
    }
}

/// Depth-only rasterization of `tile` into a shadow map band.
pub fn rasterize_depth_tile(
    band: &mut DepthBand<'_>,
    tile: Tile,
    tris: &BinnedTriangles,
    encoding: DepthEncoding,
) {
    for tri in tris.in_tile(&tile) {
        tri.for_each_sample(&tile, |x, y, weights| {
            band.try_write(x, y, tri.encoded_depth(weights, encoding));
        });
    }
}
