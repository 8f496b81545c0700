use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::error::MeshError;

pub type Tri = [u32; 3];

/// Color substituted for vertices without one.
pub const DEFAULT_VERTEX_COLOR: Vec3 = Vec3::splat(0.8);

/// A fully resolved vertex, in the space of the mesh that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, color: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            color,
            uv,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Unnormalized face normal following the counter-clockwise winding.
    pub fn face_normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b.position - a.position).cross(c.position - a.position)
    }
}

/// Indexed triangle mesh. Optional attributes are either empty or exactly as
/// long as `positions`.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<Tri>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub colors: Vec<Vec3>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions(mut self, positions: Vec<Vec3>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_indices(mut self, indices: Vec<Tri>) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_colors(mut self, colors: Vec<Vec3>) -> Self {
        self.colors = colors;
        self
    }

    /// Single color applied to every vertex.
    pub fn with_uniform_color(mut self, color: Vec3) -> Self {
        self.colors = vec![color; self.positions.len()];
        self
    }

    pub fn push_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push([i0, i1, i2]);
    }

    /// Builds a mesh from raw indexed data and validates it.
    pub fn from_indexed(
        positions: Vec<Vec3>,
        indices: Vec<Tri>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        colors: Vec<Vec3>,
    ) -> Result<Self, MeshError> {
        let mesh = Self {
            positions,
            indices,
            normals,
            uvs,
            colors,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Triangle in the z = 0 plane facing +Z, spanning `[-0.5, 0.5]` in x and y.
    pub fn unit_triangle() -> Self {
        Self::new()
            .with_positions(vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
            ])
            .with_indices(vec![[0, 1, 2]])
            .with_uvs(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.5, 1.0),
            ])
    }

    /// Square of side `size` in the z = 0 plane facing +Z with full `[0, 1]` UVs.
    pub fn quad(size: f32) -> Self {
        let h = 0.5 * size;
        Self::new()
            .with_positions(vec![
                Vec3::new(-h, -h, 0.0),
                Vec3::new(h, -h, 0.0),
                Vec3::new(h, h, 0.0),
                Vec3::new(-h, h, 0.0),
            ])
            .with_indices(vec![[0, 1, 2], [0, 2, 3]])
            .with_normals(vec![Vec3::Z; 4])
            .with_uvs(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ])
    }

    /// Unit cube centered at the origin. Faces wind outward and carry no
    /// vertex normals, so shading uses flat face normals.
    pub fn unit_cube() -> Self {
        let positions = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];

        let indices = vec![
            [4, 5, 6],
            [4, 6, 7],
            [1, 0, 3],
            [1, 3, 2],
            [0, 4, 7],
            [0, 7, 3],
            [5, 1, 2],
            [5, 2, 6],
            [3, 7, 6],
            [3, 6, 2],
            [0, 1, 5],
            [0, 5, 4],
        ];

        Self::new().with_positions(positions).with_indices(indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        for (i, p) in self.positions.iter().enumerate() {
            if !p.is_finite() {
                return Err(MeshError::PositionNotFinite { index: i });
            }
        }

        let positions = self.positions.len();
        let check_len = |attribute: &'static str, len: usize| {
            if len != 0 && len != positions {
                Err(MeshError::AttributeLenMismatch {
                    attribute,
                    len,
                    positions,
                })
            } else {
                Ok(())
            }
        };
        check_len("normals", self.normals.len())?;
        check_len("uvs", self.uvs.len())?;
        check_len("colors", self.colors.len())?;

        for (ti, t) in self.indices.iter().enumerate() {
            for &ix in t.iter() {
                if ix as usize >= positions {
                    return Err(MeshError::IndexOutOfBounds {
                        tri: ti,
                        index: ix,
                        vertex_count: positions,
                    });
                }
            }
        }

        Ok(())
    }

    /// Resolves triangle `index` into owned vertices, substituting the face
    /// normal, [`DEFAULT_VERTEX_COLOR`] and a zero UV for missing attributes.
    pub fn triangle(&self, index: usize) -> Triangle {
        let [i0, i1, i2] = self.indices[index];
        let ids = [i0 as usize, i1 as usize, i2 as usize];
        let p = ids.map(|i| self.positions[i]);
        let face = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();

        let vertex = |slot: usize| {
            let i = ids[slot];
            let normal = if self.normals.is_empty() {
                face
            } else {
                self.normals[i]
            };
            Vertex {
                position: p[slot],
                normal,
                color: self.colors.get(i).copied().unwrap_or(DEFAULT_VERTEX_COLOR),
                uv: self.uvs.get(i).copied().unwrap_or(Vec2::ZERO),
            }
        };
        Triangle::new(vertex(0), vertex(1), vertex(2))
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.indices.len()).map(move |i| self.triangle(i))
    }

    /// Bakes `matrix` into positions; normals go through the inverse transpose.
    pub fn apply_matrix(&mut self, matrix: Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        if normal_matrix.is_finite() {
            for n in &mut self.normals {
                *n = (normal_matrix * *n).normalize_or_zero();
            }
        }
    }
}
