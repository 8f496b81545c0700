//! Per-light shadow maps and soft shadow queries.
//!
//! A [`ShadowEngine`] is re-run every frame: [`ShadowEngine::look_at`] builds
//! the light transform and clears the map, [`ShadowEngine::render_depth`]
//! clips and rasterizes the scene into it, and
//! [`ShadowEngine::build_penumbra_mask`] optionally classifies 4x4 screen
//! blocks so the shading pass only runs soft filtering where it matters.
//!
//! Shadow maps store view distance along the light axis, smaller is closer.
//! Points outside the light frustum are fully lit.

use glam::{Mat4, Vec2, Vec3, Vec4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    clip::{ClipArena, ViewTransform},
    config::{CullMode, ShadowConfig},
    gbuffer::{DepthBuffer, GBuffer},
    light::{Light, LightKind},
    math::{box_blur, fibonacci_disk, EPSILON},
    mesh::Mesh,
    raster::{rasterize_depth_tile, BinnedTriangles, DepthEncoding},
    tile::{TileGrid, TileScheduler},
};

/// Screen pixels per penumbra mask cell along each axis.
pub const MASK_BLOCK: usize = 4;

const SPOT_BIAS_MIN_SLOPE: f32 = 0.2;
const SPOT_BIAS_TEXELS: f32 = 512.0;
const SPOT_BLOCKER_SEARCH_SCALE: f32 = 1.0 / 32.0;
const DIRECTIONAL_BIAS_MIN: f32 = 0.05;
const DIRECTIONAL_BLOCKER_SEARCH_SCALE: f32 = 2.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShadowMethod {
    Direct,
    Pcf,
    #[default]
    Pcss,
}

/// Classification of one penumbra mask cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PenumbraClass {
    /// No covered pixel, or every covered pixel passes the direct test.
    #[default]
    Bright,
    /// Covered pixels exist and all fail the direct test.
    Shadow,
    Penumbra,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadowStage {
    #[default]
    Idle,
    LookAt,
    DepthReady,
    Ready,
}

/// Light-type constants derived at look-at time.
#[derive(Clone, Copy, Debug, PartialEq)]
enum LightParams {
    Spot {
        position: Vec3,
        fov_factor: f32,
        pixel_radius: f32,
        near: f32,
        light_size: f32,
    },
    Directional {
        direction: Vec3,
        pixel_radius: f32,
        size_over_distance: f32,
    },
}

/// A point projected into the shadow map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSample {
    pub x: i32,
    pub y: i32,
    /// Distance from the light along its view axis.
    pub depth: f32,
    pub bias: f32,
}

/// Coarse screen-space classification, one cell per 4x4 pixel block.
#[derive(Clone, Debug, Default)]
pub struct PenumbraMask {
    width: usize,
    height: usize,
    classes: Vec<PenumbraClass>,
    values: Vec<f32>,
}

impl PenumbraMask {
    pub fn reset(&mut self, screen_width: usize, screen_height: usize) {
        self.width = screen_width.div_ceil(MASK_BLOCK);
        self.height = screen_height.div_ceil(MASK_BLOCK);
        let n = self.width * self.height;
        self.classes.clear();
        self.classes.resize(n, PenumbraClass::Bright);
        self.values.clear();
        self.values.resize(n, 0.0);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Class of the cell containing screen pixel `(x, y)`.
    pub fn class_at(&self, x: usize, y: usize) -> PenumbraClass {
        let (cx, cy) = (x / MASK_BLOCK, y / MASK_BLOCK);
        if cx >= self.width || cy >= self.height {
            return PenumbraClass::Bright;
        }
        self.classes[cy * self.width + cx]
    }

    /// Blurred mask value of the cell containing screen pixel `(x, y)`.
    pub fn value_at(&self, x: usize, y: usize) -> f32 {
        let (cx, cy) = (x / MASK_BLOCK, y / MASK_BLOCK);
        if cx >= self.width || cy >= self.height {
            return 0.0;
        }
        self.values[cy * self.width + cx]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn count(&self, class: PenumbraClass) -> usize {
        self.classes.iter().filter(|c| **c == class).count()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowStats {
    pub triangles: usize,
    pub penumbra_cells: usize,
}

/// Shadow map, transforms and filters for one light.
#[derive(Debug, Default)]
pub struct ShadowEngine {
    config: ShadowConfig,
    view: Mat4,
    view_projection: Mat4,
    params: Option<LightParams>,
    encoding: Option<DepthEncoding>,
    depth: DepthBuffer,
    arena: ClipArena,
    mask: PenumbraMask,
    mask_built: bool,
    disk: Vec<Vec2>,
    disk_clump: f32,
    stage: ShadowStage,
    stats: ShadowStats,
}

impl ShadowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> ShadowStage {
        self.stage
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn depth_map(&self) -> &DepthBuffer {
        &self.depth
    }

    pub fn penumbra_mask(&self) -> Option<&PenumbraMask> {
        self.mask_built.then_some(&self.mask)
    }

    pub fn stats(&self) -> ShadowStats {
        self.stats
    }

    /// Rebuilds the light transform and clears the shadow map.
    pub fn look_at(&mut self, light: &Light) {
        self.config = light.shadow.clone();
        self.view = light.view_matrix();
        self.view_projection = light.projection_matrix() * self.view;

        let (w, h) = (self.config.map_width, self.config.map_height);
        self.params = Some(match light.kind {
            LightKind::Spot {
                fov_degrees,
                aspect,
                near,
                light_size,
                ..
            } => LightParams::Spot {
                position: light.position,
                fov_factor: (0.5 * fov_degrees.to_radians()).tan(),
                pixel_radius: (1.0 / h as f32).max(aspect / w as f32),
                near,
                light_size,
            },
            LightKind::Directional {
                direction,
                view_width,
                view_height,
                angular_diameter_degrees,
                ..
            } => LightParams::Directional {
                direction,
                pixel_radius: 0.5 * (view_width / w as f32).max(view_height / h as f32),
                size_over_distance: 2.0 * (0.5 * angular_diameter_degrees.to_radians()).tan(),
            },
        });
        self.encoding = Some(match light.kind {
            LightKind::Spot { .. } => DepthEncoding::ClipW,
            LightKind::Directional { .. } => DepthEncoding::Linear(light.projection()),
        });

        if self.disk.len() != self.config.sample_count
            || self.disk_clump != self.config.clump_exponent
        {
            self.disk = fibonacci_disk(self.config.sample_count, self.config.clump_exponent);
            self.disk_clump = self.config.clump_exponent;
        }
        if self.config.enabled {
            self.depth.reset(w, h);
        }
        self.mask_built = false;
        self.stats = ShadowStats::default();
        self.stage = ShadowStage::LookAt;
    }

    /// Clips `meshes` against the light frustum and rasterizes their depth.
    pub fn render_depth(
        &mut self,
        scheduler: &TileScheduler,
        meshes: &[&Mesh],
        light: &Light,
        cull: CullMode,
        tile_size: usize,
    ) {
        debug_assert_eq!(self.stage, ShadowStage::LookAt);
        if !self.config.enabled {
            self.stage = ShadowStage::Ready;
            return;
        }
        let Some(encoding) = self.encoding else {
            return;
        };
        let transform = ViewTransform {
            view: self.view,
            projection: light.projection_matrix(),
            perspective: !light.is_directional(),
            cull,
        };
        let grid = TileGrid::new(self.depth.width(), self.depth.height(), tile_size);
        let arena = &mut self.arena;
        let tris = scheduler.install(|| {
            arena.rebuild(meshes, &transform);
            BinnedTriangles::build(arena, &grid, |_| false)
        });
        scheduler.for_each_tile(&grid, self.depth.bands_mut(grid.tile_size()), |band, tile| {
            rasterize_depth_tile(band, tile, &tris, encoding);
        });
        self.stats.triangles = tris.len();
        log::trace!(
            "shadow depth: {} triangles into {}x{}",
            tris.len(),
            grid.width(),
            grid.height()
        );
        self.stage = ShadowStage::DepthReady;
    }

    /// Classifies every 4x4 block of `gbuffer` and blurs the result.
    pub fn build_penumbra_mask(
        &mut self,
        scheduler: &TileScheduler,
        gbuffer: &GBuffer,
        blur_radius: usize,
        tile_size: usize,
    ) {
        if !(self.config.enabled && self.config.penumbra_mask) {
            self.stage = ShadowStage::Ready;
            return;
        }
        debug_assert_eq!(self.stage, ShadowStage::DepthReady);

        let mut mask = std::mem::take(&mut self.mask);
        mask.reset(gbuffer.width(), gbuffer.height());
        let (mw, mh) = (mask.width, mask.height);
        let grid = TileGrid::new(mw, mh, tile_size);
        let rows = grid.tile_size();
        let engine = &*self;
        let bands = mask
            .classes
            .par_chunks_mut(mw * rows)
            .zip(mask.values.par_chunks_mut(mw * rows))
            .enumerate();
        scheduler.for_each_tile(&grid, bands, |(band, (classes, values)), tile| {
            let y_base = *band * rows;
            for cy in tile.y0..tile.y1 {
                for cx in tile.x0..tile.x1 {
                    let class = engine.classify_block(gbuffer, cx, cy);
                    let i = (cy - y_base) * mw + cx;
                    classes[i] = class;
                    values[i] = if class == PenumbraClass::Penumbra { 1.0 } else { 0.0 };
                }
            }
        });
        mask.values = box_blur(&mask.values, mw, mh, blur_radius);
        self.stats.penumbra_cells = mask.count(PenumbraClass::Penumbra);
        log::trace!(
            "penumbra mask {}x{}: {} penumbra cells",
            mw,
            mh,
            self.stats.penumbra_cells
        );
        self.mask = mask;
        self.mask_built = true;
        self.stage = ShadowStage::Ready;
    }

    fn classify_block(&self, gbuffer: &GBuffer, cx: usize, cy: usize) -> PenumbraClass {
        let (w, h) = (gbuffer.width(), gbuffer.height());
        let mut covered = 0;
        let mut unshadowed = 0;
        for v in cy * MASK_BLOCK..(cy + 1) * MASK_BLOCK {
            for u in cx * MASK_BLOCK..(cx + 1) * MASK_BLOCK {
                let Some(frag) = gbuffer.at(u.min(w - 1), v.min(h - 1)) else {
                    continue;
                };
                covered += 1;
                if self.visibility(frag.position, frag.normal, ShadowMethod::Direct) > EPSILON {
                    unshadowed += 1;
                }
            }
        }
        if covered == 0 || unshadowed == covered {
            PenumbraClass::Bright
        } else if unshadowed == 0 {
            PenumbraClass::Shadow
        } else {
            PenumbraClass::Penumbra
        }
    }

    /// Projects `point` into the map, or `None` when it lies outside the
    /// light frustum.
    pub fn project(&self, point: Vec3, normal: Vec3) -> Option<ShadowSample> {
        let params = self.params?;
        let clip = self.view_projection * point.extend(1.0);
        if !inside_frustum(clip) {
            return None;
        }
        let (w, h) = (self.depth.width() as i32, self.depth.height() as i32);
        if w == 0 || h == 0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (((ndc.x + 1.0) * 0.5 * w as f32) as i32).clamp(0, w - 1);
        let y = (((1.0 - ndc.y) * 0.5 * h as f32) as i32).clamp(0, h - 1);
        let depth = -self.view.transform_point3(point).z;
        Some(ShadowSample {
            x,
            y,
            depth,
            bias: self.bias(params, point, normal, depth),
        })
    }

    fn bias(&self, params: LightParams, point: Vec3, normal: Vec3, depth: f32) -> f32 {
        match params {
            LightParams::Spot {
                position,
                fov_factor,
                pixel_radius,
                ..
            } => {
                let slope = 1.0 - (position - point).normalize_or_zero().dot(normal);
                slope.max(SPOT_BIAS_MIN_SLOPE)
                    * self.config.bias_scale
                    * fov_factor
                    * depth
                    * SPOT_BIAS_TEXELS
                    * pixel_radius
            }
            LightParams::Directional {
                direction,
                pixel_radius,
                ..
            } => {
                let cos = direction.dot(-normal);
                let cos2 = (cos * cos).max(EPSILON);
                DIRECTIONAL_BIAS_MIN
                    .max(((1.0 - cos2) / cos2).sqrt() * std::f32::consts::SQRT_2 * pixel_radius)
            }
        }
    }

    /// Calls `f(dx, dy)` for every texel offset of a filter of `radius`
    /// texels and returns the number of offsets visited.
    fn for_each_offset(&self, radius: usize, accelerate: bool, mut f: impl FnMut(i32, i32)) -> usize {
        if accelerate && radius >= self.config.disk_threshold && !self.disk.is_empty() {
            let r = radius as f32;
            for d in &self.disk {
                f((r * d.x).round() as i32, (r * d.y).round() as i32);
            }
            self.disk.len()
        } else {
            let r = radius as i32;
            for dy in -r..=r {
                for dx in -r..=r {
                    f(dx, dy);
                }
            }
            let side = 2 * radius + 1;
            side * side
        }
    }

    fn stored(&self, s: &ShadowSample, dx: i32, dy: i32) -> f32 {
        self.depth.at_clamped(s.x + dx, s.y + dy)
    }

    /// Receiver depth minus the bias for offset `(dx, dy)`; the bias grows
    /// with the Chebyshev distance from the center texel.
    fn biased_depth(s: &ShadowSample, dx: i32, dy: i32) -> f32 {
        let k = (dx.abs().max(dy.abs()) + 1) as f32;
        s.depth - k * s.bias
    }

    fn direct(&self, s: &ShadowSample) -> f32 {
        if Self::biased_depth(s, 0, 0) < self.stored(s, 0, 0) {
            1.0
        } else {
            0.0
        }
    }

    fn filter(&self, s: &ShadowSample, radius: usize, accelerate: bool) -> f32 {
        let mut lit = 0usize;
        let total = self.for_each_offset(radius, accelerate, |dx, dy| {
            if Self::biased_depth(s, dx, dy) < self.stored(s, dx, dy) {
                lit += 1;
            }
        });
        if total == 0 {
            return 1.0;
        }
        lit as f32 / total as f32
    }

    /// Average depth of texels closer to the light than the receiver.
    fn blocker_search(&self, s: &ShadowSample, radius: usize) -> Option<f32> {
        let mut count = 0usize;
        let mut sum = 0.0f32;
        self.for_each_offset(radius, self.config.pcss_sample_accelerate, |dx, dy| {
            let stored = self.stored(s, dx, dy);
            if Self::biased_depth(s, dx, dy) > stored {
                count += 1;
                sum += stored;
            }
        });
        if count == 0 {
            return None;
        }
        let avg = sum / count as f32;
        (avg >= EPSILON).then_some(avg)
    }

    fn pcss(&self, s: &ShadowSample) -> f32 {
        let Some(params) = self.params else {
            return 1.0;
        };
        let max_radius = self.config.max_search_radius.max(1);
        let scale = self.config.blocker_search_scale;
        let search = match params {
            LightParams::Spot {
                fov_factor,
                pixel_radius,
                near,
                light_size,
                ..
            } => {
                (s.depth - near) / s.depth * 0.5 * light_size / (fov_factor * pixel_radius)
                    * SPOT_BLOCKER_SEARCH_SCALE
                    * scale
            }
            LightParams::Directional {
                pixel_radius,
                size_over_distance,
                ..
            } => DIRECTIONAL_BLOCKER_SEARCH_SCALE * size_over_distance / pixel_radius * scale,
        };
        let search = radius_from(search, max_radius);

        let Some(avg) = self.blocker_search(s, search) else {
            return 1.0;
        };

        let radius = match params {
            LightParams::Spot {
                fov_factor,
                pixel_radius,
                light_size,
                ..
            } => {
                let penumbra = (s.depth - avg) / avg * light_size;
                0.5 * penumbra / (s.depth * fov_factor * pixel_radius)
            }
            LightParams::Directional {
                pixel_radius,
                size_over_distance,
                ..
            } => {
                let penumbra = (s.depth - avg) * size_over_distance;
                0.25 * penumbra / pixel_radius
            }
        };
        self.filter(s, radius_from(radius, max_radius), self.config.pcf_sample_accelerate)
    }

    /// Visibility of `point` in `[0, 1]` for the given method.
    pub fn visibility(&self, point: Vec3, normal: Vec3, method: ShadowMethod) -> f32 {
        if !self.config.enabled {
            return 1.0;
        }
        debug_assert!(matches!(
            self.stage,
            ShadowStage::DepthReady | ShadowStage::Ready
        ));
        let Some(sample) = self.project(point, normal) else {
            return 1.0;
        };
        match method {
            ShadowMethod::Direct => self.direct(&sample),
            ShadowMethod::Pcf => self.filter(
                &sample,
                self.config.pcf_radius,
                self.config.pcf_sample_accelerate,
            ),
            ShadowMethod::Pcss => self.pcss(&sample),
        }
    }

    /// Method to use at screen pixel `(x, y)`: the soft method inside
    /// penumbra cells, the direct test elsewhere. Without a mask the soft
    /// method is used everywhere.
    pub fn method_at(&self, x: usize, y: usize) -> ShadowMethod {
        if self.mask_built && self.mask.value_at(x, y) <= EPSILON {
            ShadowMethod::Direct
        } else {
            self.config.soft_method
        }
    }

    pub fn visibility_at_pixel(&self, x: usize, y: usize, point: Vec3, normal: Vec3) -> f32 {
        self.visibility(point, normal, self.method_at(x, y))
    }
}

fn inside_frustum(clip: Vec4) -> bool {
    clip.w > 0.0
        && clip.x >= -clip.w
        && clip.x <= clip.w
        && clip.y >= -clip.w
        && clip.y <= clip.w
        && clip.z >= -clip.w
        && clip.z <= clip.w
}

fn radius_from(value: f32, max_radius: usize) -> usize {
    if !value.is_finite() {
        return 1;
    }
    (value.round().max(1.0) as usize).min(max_radius)
}
