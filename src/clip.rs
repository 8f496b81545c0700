use glam::{Mat4, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::{
    config::CullMode,
    math::EPSILON,
    mesh::{Mesh, Triangle},
};

/// A vertex carried through clipping. All attributes are interpolated
/// linearly in homogeneous space, before any perspective divide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipVertex {
    pub clip: Vec4,
    pub world: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
    pub uv: Vec2,
}

impl ClipVertex {
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
            color: self.color.lerp(other.color, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }

    pub fn is_inside(&self) -> bool {
        ClipPlane::ALL.iter().all(|p| p.distance(self.clip) >= 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipTriangle {
    pub vertices: [ClipVertex; 3],
}

/// The six planes of the canonical clip volume. A point is on the inner side
/// when [`ClipPlane::distance`] is non-negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipPlane {
    Left,
    Right,
    Bottom,
    Top,
    Near,
    Far,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Left,
        ClipPlane::Right,
        ClipPlane::Bottom,
        ClipPlane::Top,
        ClipPlane::Near,
        ClipPlane::Far,
    ];

    pub fn distance(self, p: Vec4) -> f32 {
        match self {
            ClipPlane::Left => p.w + p.x,
            ClipPlane::Right => p.w - p.x,
            ClipPlane::Bottom => p.w + p.y,
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Near => p.w + p.z,
            ClipPlane::Far => p.w - p.z,
        }
    }
}

/// Clips `tri` against one plane, appending 0, 1 or 2 triangles to `out`.
pub fn clip_against_plane(tri: &ClipTriangle, plane: ClipPlane, out: &mut Vec<ClipTriangle>) {
    let v = &tri.vertices;
    let d = v.map(|v| plane.distance(v.clip));
    let outside = d.map(|d| d < 0.0);

    // Intersection on edge a -> b where exactly one end is outside.
    let cut = |a: usize, b: usize| {
        let t = d[a] / (d[a] - d[b]);
        v[a].lerp(&v[b], t)
    };

    match outside.iter().filter(|o| **o).count() {
        0 => out.push(*tri),
        1 => {
            let o = outside.iter().position(|o| *o).unwrap_or(0);
            let i1 = (o + 1) % 3;
            let i2 = (o + 2) % 3;
            let a = cut(o, i1);
            let b = cut(i2, o);
            out.push(ClipTriangle {
                vertices: [a, v[i1], v[i2]],
            });
            out.push(ClipTriangle {
                vertices: [a, v[i2], b],
            });
        }
        2 => {
            let k = outside.iter().position(|o| !*o).unwrap_or(0);
            let j1 = (k + 1) % 3;
            let j2 = (k + 2) % 3;
            out.push(ClipTriangle {
                vertices: [v[k], cut(k, j1), cut(j2, k)],
            });
        }
        _ => {}
    }
}

/// Clips against all six planes in turn. Fully inside triangles come back
/// unchanged; winding is preserved.
pub fn clip_triangle(tri: &ClipTriangle, out: &mut Vec<ClipTriangle>) {
    if tri.vertices.iter().all(ClipVertex::is_inside) {
        out.push(*tri);
        return;
    }

    let mut current = vec![*tri];
    let mut next = Vec::with_capacity(4);
    for plane in ClipPlane::ALL {
        for t in &current {
            clip_against_plane(t, plane, &mut next);
        }
        std::mem::swap(&mut current, &mut next);
        next.clear();
        if current.is_empty() {
            return;
        }
    }
    out.extend(current);
}

/// View and projection for one frustum, plus face culling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub view: Mat4,
    pub projection: Mat4,
    pub perspective: bool,
    pub cull: CullMode,
}

impl ViewTransform {
    /// Back-facing test in view space on counter-clockwise winding.
    pub fn is_back_facing(&self, view_pos: [Vec3; 3]) -> bool {
        let normal = (view_pos[1] - view_pos[0]).cross(view_pos[2] - view_pos[1]);
        if self.perspective {
            normal.dot(view_pos[0]) > EPSILON
        } else {
            -normal.z > EPSILON
        }
    }

    /// Transforms a world-space triangle into clip space, or `None` when it
    /// is culled.
    pub fn project(&self, tri: &Triangle) -> Option<ClipTriangle> {
        let view_pos = tri
            .vertices
            .map(|v| self.view.transform_point3(v.position));
        if self.cull == CullMode::Back && self.is_back_facing(view_pos) {
            return None;
        }
        let vertices = std::array::from_fn(|i| {
            let v = tri.vertices[i];
            ClipVertex {
                clip: self.projection * view_pos[i].extend(1.0),
                world: v.position,
                normal: v.normal,
                color: v.color,
                uv: v.uv,
            }
        });
        Some(ClipTriangle { vertices })
    }

    pub fn clip_mesh(&self, mesh: &Mesh, out: &mut Vec<ClipTriangle>) {
        for tri in mesh.triangles() {
            if let Some(ct) = self.project(&tri) {
                clip_triangle(&ct, out);
            }
        }
    }
}

/// Per-frame scratch space holding the clipped triangles of every mesh.
///
/// Each mesh owns its own list, so clipping runs one task per mesh with no
/// shared writes. Lists are cleared, never read across frames.
#[derive(Debug, Default)]
pub struct ClipArena {
    lists: Vec<Vec<ClipTriangle>>,
}

impl ClipArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the arena and clips every mesh in parallel on the current
    /// rayon pool.
    pub fn rebuild(&mut self, meshes: &[&Mesh], transform: &ViewTransform) {
        self.lists.resize_with(meshes.len(), Vec::new);
        self.lists
            .par_iter_mut()
            .zip(meshes.par_iter())
            .for_each(|(list, mesh)| {
                list.clear();
                transform.clip_mesh(mesh, list);
            });
    }

    pub fn mesh(&self, index: usize) -> &[ClipTriangle] {
        self.lists.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mesh_count(&self) -> usize {
        self.lists.len()
    }

    /// `(mesh index, triangle)` over the whole arena.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ClipTriangle)> + '_ {
        self.lists
            .iter()
            .enumerate()
            .flat_map(|(i, list)| list.iter().map(move |t| (i, t)))
    }

    pub fn triangle_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(x, y, z, w),
            world: Vec3::new(x, y, z),
            normal: Vec3::Z,
            color: Vec3::ONE,
            uv: Vec2::new(x, y),
        }
    }

    fn tri(a: ClipVertex, b: ClipVertex, c: ClipVertex) -> ClipTriangle {
        ClipTriangle {
            vertices: [a, b, c],
        }
    }

    fn signed_area(t: &ClipTriangle) -> f32 {
        let p = t.vertices.map(|v| v.clip.truncate().truncate() / v.clip.w);
        (p[1] - p[0]).perp_dot(p[2] - p[0])
    }

    #[test]
    fn inside_triangle_passes_through_unchanged() {
        let t = tri(
            vertex(-0.5, -0.5, 0.0, 1.0),
            vertex(0.5, -0.5, 0.2, 2.0),
            vertex(0.0, 0.5, -0.3, 1.5),
        );
        let mut out = Vec::new();
        clip_triangle(&t, &mut out);
        assert_eq!(out, vec![t]);
    }

    #[test]
    fn outside_one_plane_is_dropped() {
        let t = tri(
            vertex(2.0, 0.0, 0.0, 1.0),
            vertex(3.0, 0.5, 0.0, 1.0),
            vertex(2.5, -0.5, 0.0, 1.0),
        );
        let mut out = Vec::new();
        clip_triangle(&t, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn one_outside_vertex_splits_into_two() {
        let t = tri(
            vertex(-0.5, -0.5, 0.0, 1.0),
            vertex(2.0, 0.0, 0.0, 1.0),
            vertex(-0.5, 0.5, 0.0, 1.0),
        );
        let mut out = Vec::new();
        clip_against_plane(&t, ClipPlane::Right, &mut out);
        assert_eq!(out.len(), 2);
        for c in &out {
            assert!(signed_area(c) > 0.0);
            for v in c.vertices {
                assert!(ClipPlane::Right.distance(v.clip) >= -EPSILON);
            }
        }
        // The two pieces cover the clipped area of the original triangle.
        let total: f32 = out.iter().map(signed_area).sum();
        // Apex beyond x = 1 is similar to the whole with ratio 1 / 2.5.
        let whole = 2.5;
        assert_relative_eq!(total, whole * (1.0 - 0.4 * 0.4), epsilon = 1e-4);
    }

    #[test]
    fn two_outside_vertices_shrink_to_one() {
        let t = tri(
            vertex(0.0, 0.0, 0.0, 1.0),
            vertex(3.0, 0.0, 0.0, 1.0),
            vertex(0.0, 3.0, 0.0, 1.0),
        );
        let mut out = Vec::new();
        clip_triangle(&t, &mut out);
        assert!(!out.is_empty());
        for c in &out {
            assert!(signed_area(c) > 0.0);
            for v in c.vertices {
                for plane in ClipPlane::ALL {
                    assert!(plane.distance(v.clip) >= -EPSILON);
                }
            }
        }
    }

    #[test]
    fn intersection_interpolates_homogeneous_attributes() {
        // Edge from w=1 (inside) to w=3 with x beyond the right plane.
        let a = vertex(0.0, 0.0, 0.0, 1.0);
        let b = vertex(6.0, 0.0, 0.0, 3.0);
        let c = vertex(0.0, 0.5, 0.0, 1.0);
        let mut out = Vec::new();
        clip_against_plane(&tri(a, b, c), ClipPlane::Right, &mut out);
        let on_plane: Vec<_> = out
            .iter()
            .flat_map(|t| t.vertices)
            .filter(|v| ClipPlane::Right.distance(v.clip).abs() < 1e-5 && v.clip.y == 0.0)
            .collect();
        assert!(!on_plane.is_empty());
        // d(a) = 1, d(b) = -3, so t = 0.25 in homogeneous space.
        assert_relative_eq!(on_plane[0].uv.x, 1.5, epsilon = 1e-5);
        assert_relative_eq!(on_plane[0].clip.w, 1.5, epsilon = 1e-5);
    }

    #[test]
    fn back_faces_are_culled() {
        let xf = ViewTransform {
            view: Mat4::look_to_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z, Vec3::Y),
            projection: Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 10.0),
            perspective: true,
            cull: CullMode::Back,
        };
        let front = Mesh::unit_triangle().triangle(0);
        let mut back = front;
        back.vertices.swap(1, 2);
        assert!(xf.project(&front).is_some());
        assert!(xf.project(&back).is_none());

        let both = ViewTransform {
            cull: CullMode::None,
            ..xf
        };
        assert!(both.project(&back).is_some());
    }

    #[test]
    fn arena_rebuild_resets_lists() {
        let xf = ViewTransform {
            view: Mat4::look_to_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z, Vec3::Y),
            projection: Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 10.0),
            perspective: true,
            cull: CullMode::Back,
        };
        let tri = Mesh::unit_triangle();
        let cube = Mesh::unit_cube();
        let mut arena = ClipArena::new();
        arena.rebuild(&[&tri, &cube], &xf);
        assert_eq!(arena.mesh_count(), 2);
        assert_eq!(arena.mesh(0).len(), 1);
        let first = arena.triangle_count();
        arena.rebuild(&[&tri, &cube], &xf);
        assert_eq!(arena.triangle_count(), first);
        arena.rebuild(&[&tri], &xf);
        assert_eq!(arena.mesh_count(), 1);
        assert!(arena.mesh(5).is_empty());
    }
}
