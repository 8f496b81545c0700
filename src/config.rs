use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{debug::DebugView, error::RenderError, shader::ShaderId, shadow::ShadowMethod};

/// Which triangles are rejected before clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CullMode {
    None,
    #[default]
    Back,
}

/// Frame-level settings for the renderer and its tile scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    width: usize,
    height: usize,
    tile_size: usize,
    max_threads: usize,
    cull_mode: CullMode,
    background: Vec3,
    shader: ShaderId,
    debug_view: DebugView,
    penumbra_blur_radius: Option<usize>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            tile_size: 32,
            max_threads: 8,
            cull_mode: CullMode::Back,
            background: Vec3::splat(0.7),
            shader: ShaderId::BlinnPhong,
            debug_view: DebugView::Final,
            penumbra_blur_radius: None,
        }
    }
}

impl RendererConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self::default().with_size(width, height)
    }

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_background(mut self, background: Vec3) -> Self {
        self.background = background;
        self
    }

    pub fn with_shader(mut self, shader: ShaderId) -> Self {
        self.shader = shader;
        self
    }

    pub fn with_debug_view(mut self, view: DebugView) -> Self {
        self.debug_view = view;
        self
    }

    pub fn with_penumbra_blur_radius(mut self, radius: usize) -> Self {
        self.penumbra_blur_radius = Some(radius);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    pub fn background(&self) -> Vec3 {
        self.background
    }

    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    pub fn debug_view(&self) -> DebugView {
        self.debug_view
    }

    /// Blur radius of the penumbra mask, in mask cells.
    ///
    /// Defaults to `round(4 * max(width, height) / 1024)`.
    pub fn penumbra_blur_radius(&self) -> usize {
        self.penumbra_blur_radius
            .unwrap_or_else(|| (4.0 * self.width.max(self.height) as f32 / 1024.0).round() as usize)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::invalid_config(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.tile_size == 0 {
            return Err(RenderError::invalid_config("tile size must be non-zero"));
        }
        if self.max_threads == 0 {
            return Err(RenderError::invalid_config("max_threads must be at least 1"));
        }
        if !self.background.is_finite() {
            return Err(RenderError::invalid_config("background color must be finite"));
        }
        Ok(())
    }
}

/// Per-light shadow map and filtering settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    pub map_width: usize,
    pub map_height: usize,
    /// Scales the slope-dependent depth bias of spot lights.
    pub bias_scale: f32,
    /// Grid radius, in texels, of the fixed-size PCF kernel.
    pub pcf_radius: usize,
    /// Number of Fibonacci disk samples used when sampling is accelerated.
    pub sample_count: usize,
    pub clump_exponent: f32,
    /// Radii at or above this switch from an NxN grid to the disk pattern.
    pub disk_threshold: usize,
    /// Multiplier on the light-type specific blocker search radius.
    pub blocker_search_scale: f32,
    pub max_search_radius: usize,
    pub pcf_sample_accelerate: bool,
    pub pcss_sample_accelerate: bool,
    pub penumbra_mask: bool,
    /// Filter used inside penumbra blocks.
    pub soft_method: ShadowMethod,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map_width: 2048,
            map_height: 2048,
            bias_scale: 0.05,
            pcf_radius: 1,
            sample_count: 64,
            clump_exponent: 1.0,
            disk_threshold: 6,
            blocker_search_scale: 1.0,
            max_search_radius: 32,
            pcf_sample_accelerate: false,
            pcss_sample_accelerate: true,
            penumbra_mask: true,
            soft_method: ShadowMethod::Pcss,
        }
    }
}

impl ShadowConfig {
    pub fn with_resolution(mut self, width: usize, height: usize) -> Self {
        self.map_width = width;
        self.map_height = height;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_pcf_radius(mut self, radius: usize) -> Self {
        self.pcf_radius = radius;
        self
    }

    pub fn with_sample_accelerate(mut self, pcf: bool, pcss: bool) -> Self {
        self.pcf_sample_accelerate = pcf;
        self.pcss_sample_accelerate = pcss;
        self
    }

    pub fn with_penumbra_mask(mut self, enabled: bool) -> Self {
        self.penumbra_mask = enabled;
        self
    }

    pub fn with_soft_method(mut self, method: ShadowMethod) -> Self {
        self.soft_method = method;
        self
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.map_width == 0 || self.map_height == 0 {
            return Err(RenderError::invalid_config(format!(
                "shadow map size must be non-zero, got {}x{}",
                self.map_width, self.map_height
            )));
        }
        if self.sample_count == 0 {
            return Err(RenderError::invalid_config("shadow sample_count must be at least 1"));
        }
        if !(self.bias_scale.is_finite() && self.bias_scale >= 0.0) {
            return Err(RenderError::invalid_config("shadow bias_scale must be finite and non-negative"));
        }
        if !(self.clump_exponent.is_finite() && self.clump_exponent > 0.0) {
            return Err(RenderError::invalid_config("shadow clump_exponent must be positive"));
        }
        if !(self.blocker_search_scale.is_finite() && self.blocker_search_scale > 0.0) {
            return Err(RenderError::invalid_config("blocker_search_scale must be positive"));
        }
        Ok(())
    }
}
