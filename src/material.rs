use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::texture::Texture;

/// Specular strength used when no specular map is bound.
pub const DEFAULT_SPECULAR: Vec3 = Vec3::splat(0.8);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    Specular,
    Normal,
    Glow,
}

/// Optional texture bindings of a mesh. Unbound channels fall back to the
/// interpolated vertex color (diffuse), [`DEFAULT_SPECULAR`], the vertex
/// normal, and black glow.
#[derive(Clone, Debug, Default)]
pub struct Material {
    diffuse: Option<Arc<Texture>>,
    specular: Option<Arc<Texture>>,
    normal: Option<Arc<Texture>>,
    glow: Option<Arc<Texture>>,
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: Arc<Texture>) -> Self {
        self.bind(slot, Some(texture));
        self
    }

    pub fn bind(&mut self, slot: TextureSlot, texture: Option<Arc<Texture>>) {
        *self.slot_mut(slot) = texture;
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<Texture>> {
        match slot {
            TextureSlot::Diffuse => self.diffuse.as_ref(),
            TextureSlot::Specular => self.specular.as_ref(),
            TextureSlot::Normal => self.normal.as_ref(),
            TextureSlot::Glow => self.glow.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: TextureSlot) -> &mut Option<Arc<Texture>> {
        match slot {
            TextureSlot::Diffuse => &mut self.diffuse,
            TextureSlot::Specular => &mut self.specular,
            TextureSlot::Normal => &mut self.normal,
            TextureSlot::Glow => &mut self.glow,
        }
    }

    pub fn has_normal_map(&self) -> bool {
        self.normal.is_some()
    }

    pub fn diffuse(&self, uv: Vec2, vertex_color: Vec3) -> Vec3 {
        match &self.diffuse {
            Some(tex) => tex.sample(uv.x, uv.y),
            None => vertex_color,
        }
    }

    pub fn specular(&self, uv: Vec2) -> Vec3 {
        match &self.specular {
            Some(tex) => tex.sample(uv.x, uv.y),
            None => DEFAULT_SPECULAR,
        }
    }

    pub fn glow(&self, uv: Vec2) -> Vec3 {
        match &self.glow {
            Some(tex) => tex.sample(uv.x, uv.y),
            None => Vec3::ZERO,
        }
    }

    /// Tangent-space normal decoded from `[0, 1]` texel values to `[-1, 1]`.
    pub fn tangent_normal(&self, uv: Vec2) -> Option<Vec3> {
        self.normal
            .as_ref()
            .map(|tex| tex.sample(uv.x, uv.y) * 2.0 - Vec3::ONE)
    }
}
