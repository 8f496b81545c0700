use crate::{
    camera::Camera,
    error::RenderError,
    light::Light,
    model::{MeshNode, Model},
};

/// Stable reference to a model in a [`Scene`]. Stale after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(Handle);

/// Stable reference to a light in a [`Scene`]. Stale after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightHandle(Handle);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Handle {
    index: u32,
    generation: u32,
}

/// Generational slot list; iteration follows slot order.
#[derive(Clone, Debug)]
struct Slots<T> {
    slots: Vec<(u32, Option<T>)>,
    free: Vec<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, value: T) -> Handle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.1 = Some(value);
            return Handle {
                index,
                generation: slot.0,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push((0, Some(value)));
        Handle {
            index,
            generation: 0,
        }
    }

    fn remove(&mut self, h: Handle) -> Option<T> {
        let slot = self.slots.get_mut(h.index as usize)?;
        if slot.0 != h.generation {
            return None;
        }
        let value = slot.1.take()?;
        slot.0 = slot.0.wrapping_add(1);
        self.free.push(h.index);
        Some(value)
    }

    fn get(&self, h: Handle) -> Option<&T> {
        match self.slots.get(h.index as usize)? {
            (generation, Some(v)) if *generation == h.generation => Some(v),
            _ => None,
        }
    }

    fn get_mut(&mut self, h: Handle) -> Option<&mut T> {
        match self.slots.get_mut(h.index as usize)? {
            (generation, Some(v)) if *generation == h.generation => Some(v),
            _ => None,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().filter_map(|(_, v)| v.as_ref())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(|(_, v)| v.as_mut())
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Models, lights and the camera of one rendered view.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub camera: Camera,
    models: Slots<Model>,
    lights: Slots<Light>,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    pub fn add_model(&mut self, model: Model) -> ModelHandle {
        ModelHandle(self.models.insert(model))
    }

    pub fn remove_model(&mut self, handle: ModelHandle) -> Option<Model> {
        self.models.remove(handle.0)
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle.0)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models.get_mut(handle.0)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> + '_ {
        self.models.iter()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn add_light(&mut self, light: Light) -> LightHandle {
        LightHandle(self.lights.insert(light))
    }

    pub fn remove_light(&mut self, handle: LightHandle) -> Option<Light> {
        self.lights.remove(handle.0)
    }

    pub fn light(&self, handle: LightHandle) -> Option<&Light> {
        self.lights.get(handle.0)
    }

    pub fn light_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle.0)
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> + '_ {
        self.lights.iter()
    }

    pub fn lights_mut(&mut self) -> impl Iterator<Item = &mut Light> + '_ {
        self.lights.iter_mut()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Every mesh leaf of every model, in model order then tree order.
    pub fn mesh_nodes(&self) -> Vec<&MeshNode> {
        let mut out = Vec::new();
        for model in self.models.iter() {
            model.root().for_each_mesh(&mut |m| out.push(m));
        }
        out
    }

    pub fn triangle_count(&self) -> usize {
        self.models.iter().map(Model::triangle_count).sum()
    }

    /// Checks the camera, every mesh and every light before a frame uses them.
    pub fn validate(&self) -> Result<(), RenderError> {
        self.camera.validate()?;
        for model in self.models.iter() {
            let mut result = Ok(());
            model.root().for_each_mesh(&mut |node| {
                if result.is_ok() {
                    result = node.mesh.validate();
                }
            });
            result.map_err(|err| {
                log::warn!("model `{}` has an invalid mesh: {err}", model.name);
                RenderError::from(err)
            })?;
        }
        for light in self.lights.iter() {
            light.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera::Projection, error::MeshError, material::Material, mesh::Mesh};
    use glam::Vec3;

    #[test]
    fn removed_handles_go_stale() {
        let mut scene = Scene::default();
        let a = scene.add_model(Model::from_mesh("a", Mesh::unit_triangle(), Material::new()));
        let b = scene.add_model(Model::from_mesh("b", Mesh::quad(1.0), Material::new()));
        assert_eq!(scene.triangle_count(), 3);

        assert_eq!(scene.remove_model(a).map(|m| m.name), Some("a".to_string()));
        assert!(scene.model(a).is_none());
        assert!(scene.remove_model(a).is_none());

        // The freed slot is reused without reviving the old handle.
        let c = scene.add_model(Model::from_mesh("c", Mesh::unit_cube(), Material::new()));
        assert!(scene.model(a).is_none());
        assert_eq!(scene.model(c).map(|m| m.name.as_str()), Some("c"));
        assert_eq!(scene.model(b).map(|m| m.name.as_str()), Some("b"));
        assert_eq!(scene.model_count(), 2);
    }

    #[test]
    fn mesh_nodes_flatten_groups() {
        let mut scene = Scene::default();
        let mut parent = Model::from_mesh("p", Mesh::quad(1.0), Material::new());
        parent.add_child(Model::from_mesh("c", Mesh::unit_triangle(), Material::new()));
        scene.add_model(parent);
        scene.add_model(Model::from_mesh("q", Mesh::unit_cube(), Material::new()));
        let counts: Vec<_> = scene
            .mesh_nodes()
            .iter()
            .map(|n| n.mesh.triangle_count())
            .collect();
        assert_eq!(counts, vec![2, 1, 12]);
    }

    #[test]
    fn lights_are_validated() {
        let mut scene = Scene::default();
        let h = scene.add_light(Light::spot(Vec3::Z, Vec3::NEG_Z, Vec3::ONE));
        assert!(scene.validate().is_ok());
        if let Some(light) = scene.light_mut(h) {
            light.intensity = Vec3::splat(2.0);
            *light = light.clone().with_depth_range(2.0, 1.0);
        }
        assert!(scene.validate().is_err());
        assert!(scene.remove_light(h).is_some());
        assert_eq!(scene.light_count(), 0);
    }

    #[test]
    fn broken_meshes_are_rejected() {
        let mut scene = Scene::default();
        let mut bad_index = Mesh::unit_triangle();
        bad_index.indices = vec![[0, 1, 7]];
        let h = scene.add_model(Model::from_mesh("bad", bad_index, Material::new()));
        assert!(matches!(
            scene.validate(),
            Err(RenderError::Mesh(MeshError::IndexOutOfBounds { index: 7, .. }))
        ));
        scene.remove_model(h);

        // A short attribute list inside a group is found as well.
        let mut parent = Model::from_mesh("p", Mesh::quad(1.0), Material::new());
        let short = Mesh::unit_triangle().with_normals(vec![Vec3::Z]);
        parent.add_child(Model::from_mesh("c", short, Material::new()));
        scene.add_model(parent);
        assert!(matches!(
            scene.validate(),
            Err(RenderError::Mesh(MeshError::AttributeLenMismatch { attribute: "normals", .. }))
        ));
    }

    #[test]
    fn degenerate_camera_is_rejected() {
        let mut scene = Scene::default();
        scene.add_model(Model::from_mesh("q", Mesh::quad(1.0), Material::new()));
        assert!(scene.validate().is_ok());
        scene.camera.projection = Projection::Perspective {
            fov_y_degrees: 60.0,
            near: 1.0,
            far: 1.0,
        };
        assert!(matches!(scene.validate(), Err(RenderError::InvalidConfig(_))));
    }
}
