pub use crate::{
    Camera, CullMode, DebugView, ImageTarget, Light, Material, Mesh, Model, Projection,
    RenderError, RenderStats, Renderer, RendererConfig, Scene, ShaderId, ShadowConfig,
    ShadowMethod, Texture, TextureSlot, Transform,
};

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
