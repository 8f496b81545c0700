use glam::{Mat4, Vec3};

use crate::{material::Material, mesh::Mesh, transform::Transform};

/// Leaf of a model tree: triangles plus the textures used to shade them.
#[derive(Clone, Debug, Default)]
pub struct MeshNode {
    pub mesh: Mesh,
    pub material: Material,
}

impl MeshNode {
    pub fn new(mesh: Mesh, material: Material) -> Self {
        Self { mesh, material }
    }
}

#[derive(Clone, Debug)]
pub enum Node {
    Mesh(MeshNode),
    Group(Vec<Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Group(Vec::new())
    }
}

impl Node {
    /// Visits every mesh leaf in depth-first order.
    pub fn for_each_mesh<'a>(&'a self, f: &mut impl FnMut(&'a MeshNode)) {
        match self {
            Node::Mesh(m) => f(m),
            Node::Group(children) => {
                for child in children {
                    child.for_each_mesh(f);
                }
            }
        }
    }

    pub fn for_each_mesh_mut(&mut self, f: &mut impl FnMut(&mut MeshNode)) {
        match self {
            Node::Mesh(m) => f(m),
            Node::Group(children) => {
                for child in children {
                    child.for_each_mesh_mut(f);
                }
            }
        }
    }

    pub fn meshes(&self) -> Vec<&MeshNode> {
        let mut out = Vec::new();
        self.for_each_mesh(&mut |m| out.push(m));
        out
    }

    pub fn triangle_count(&self) -> usize {
        let mut n = 0;
        self.for_each_mesh(&mut |m| n += m.mesh.triangle_count());
        n
    }
}

/// A posed tree of meshes.
///
/// Transforms are baked into the vertex data as they are applied, so source
/// triangles are always in world space.
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    root: Node,
    position: Vec3,
    scale: f32,
}

impl Default for Model {
    fn default() -> Self {
        Self::new("", Node::default())
    }
}

impl Model {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
            position: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn from_mesh(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self::new(name, Node::Mesh(MeshNode::new(mesh, material)))
    }

    /// Attaches `child` as a sub-model. Its current pose is kept; later
    /// transforms of `self` move it along.
    pub fn add_child(&mut self, child: Model) {
        let root = std::mem::take(&mut self.root);
        self.root = match root {
            Node::Group(mut children) => {
                children.push(child.root);
                Node::Group(children)
            }
            leaf @ Node::Mesh(_) => Node::Group(vec![leaf, child.root]),
        };
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn triangle_count(&self) -> usize {
        self.root.triangle_count()
    }

    pub fn apply_matrix(&mut self, matrix: Mat4) {
        self.root.for_each_mesh_mut(&mut |m| m.mesh.apply_matrix(matrix));
    }

    pub fn translate_to(&mut self, position: Vec3) {
        let delta = position - self.position;
        self.apply_matrix(Transform::from_translation(delta).to_mat4());
        self.position = position;
    }

    pub fn translate_by(&mut self, delta: Vec3) {
        self.translate_to(self.position + delta);
    }

    /// Rotates by `degrees` around `axis` through the model position.
    pub fn rotate(&mut self, axis: Vec3, degrees: f32) {
        let m = Transform::from_axis_angle_degrees(axis, degrees).to_mat4_about(self.position);
        self.apply_matrix(m);
    }

    /// Sets the absolute uniform scale, scaling around the model position.
    /// Non-positive or non-finite values are ignored.
    pub fn set_scale(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            log::warn!("ignoring invalid scale {scale} for model `{}`", self.name);
            return;
        }
        let factor = scale / self.scale;
        let m = Transform::from_uniform_scale(factor).to_mat4_about(self.position);
        self.apply_matrix(m);
        self.scale = scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri_model() -> Model {
        Model::from_mesh("tri", Mesh::unit_triangle(), Material::new())
    }

    #[test]
    fn translate_then_scale_about_position() {
        let mut m = tri_model();
        m.translate_to(Vec3::new(0.0, 0.0, -2.0));
        m.set_scale(2.0);
        m.set_scale(4.0);
        let meshes = m.root().meshes();
        let p0 = meshes[0].mesh.positions[0];
        assert_relative_eq!(p0.x, -2.0, epsilon = 1e-5);
        assert_relative_eq!(p0.z, -2.0, epsilon = 1e-5);
        assert_eq!(m.scale(), 4.0);
    }

    #[test]
    fn invalid_scale_is_ignored() {
        let mut m = tri_model();
        m.set_scale(0.0);
        assert_eq!(m.scale(), 1.0);
        assert_eq!(m.root().meshes()[0].mesh.positions[1], Vec3::new(0.5, -0.5, 0.0));
    }

    #[test]
    fn rotation_moves_children_and_normals() {
        let mut m = Model::from_mesh("quad", Mesh::quad(1.0), Material::new());
        m.add_child(tri_model());
        assert_eq!(m.triangle_count(), 3);
        m.rotate(Vec3::Y, 90.0);
        for node in m.root().meshes() {
            for tri in node.mesh.triangles() {
                for v in tri.vertices {
                    assert_relative_eq!(v.normal.x, 1.0, epsilon = 1e-5);
                    assert_relative_eq!(v.position.x, 0.0, epsilon = 1e-5);
                }
            }
        }
    }
}
