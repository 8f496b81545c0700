//! CPU software rasterizer with tiled deferred shading and soft shadow maps.
//!
//! A frame runs as a sequence of data-parallel stages over a bounded worker
//! pool: per-light shadow depth, camera clipping, G-buffer rasterization, the
//! penumbra mask, and deferred shading. See [`Renderer`].

#![forbid(unsafe_code)]

pub mod camera;
pub mod clip;
pub mod config;
pub mod debug;
pub mod error;
pub mod framegraph;
pub mod gbuffer;
pub mod io;
pub mod light;
pub mod material;
pub mod math;
pub mod mesh;
pub mod model;
pub mod prelude;
pub mod profile;
pub mod raster;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod shadow;
pub mod targets;
pub mod texture;
pub mod tile;
pub mod transform;
pub mod types;

pub use crate::{
    camera::{Camera, Projection},
    config::{CullMode, RendererConfig, ShadowConfig},
    debug::DebugView,
    error::{MeshError, RenderError, RenderResult, TextureError},
    gbuffer::{Fragment, GBuffer},
    light::{Light, LightKind},
    material::{Material, TextureSlot},
    mesh::{Mesh, Triangle, Vertex},
    model::{MeshNode, Model, Node},
    profile::RenderStats,
    renderer::Renderer,
    scene::{LightHandle, ModelHandle, Scene},
    shader::{BlinnPhongShader, BuiltinShader, LightSample, Shader, ShaderId, UnlitShader},
    shadow::{PenumbraClass, ShadowEngine, ShadowMethod},
    targets::ImageTarget,
    texture::Texture,
    transform::Transform,
};
