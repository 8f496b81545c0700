use glam::Vec3;
use rayon::prelude::*;
use std::time::Instant;

use crate::{
    clip::{ClipArena, ViewTransform},
    config::RendererConfig,
    debug::{depth_rgb, mask_rgb, normal_rgb, DebugView},
    error::RenderError,
    framegraph::{FrameGraph, FramePassId, FrameSettings},
    gbuffer::{Fragment, GBuffer},
    light::Light,
    material::Material,
    mesh::Mesh,
    profile::{timed, RenderStats},
    raster::{rasterize_gbuffer_tile, BinnedTriangles},
    scene::Scene,
    shader::{BuiltinShader, LightSample, Shader},
    shadow::ShadowEngine,
    targets::ImageTarget,
    tile::{TileGrid, TileScheduler},
};

/// Sequences the passes of a frame and owns every per-frame buffer.
///
/// Buffers are reused across frames but fully overwritten at the start of
/// each [`Renderer::render`] call.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    scheduler: TileScheduler,
    shader: BuiltinShader,
    gbuffer: GBuffer,
    arena: ClipArena,
    shadows: Vec<ShadowEngine>,
    color: Vec<Vec3>,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let scheduler = TileScheduler::new(config.max_threads())?;
        log::debug!(
            "renderer {}x{} tile={} threads={}",
            config.width(),
            config.height(),
            config.tile_size(),
            scheduler.threads()
        );
        Ok(Self {
            shader: BuiltinShader::from_id(config.shader()),
            config,
            scheduler,
            gbuffer: GBuffer::default(),
            arena: ClipArena::new(),
            shadows: Vec::new(),
            color: Vec::new(),
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// Shaded linear color of the last frame, row-major.
    pub fn color(&self) -> &[Vec3] {
        &self.color
    }

    pub fn color_at(&self, x: usize, y: usize) -> Option<Vec3> {
        if x >= self.config.width() || y >= self.config.height() {
            return None;
        }
        self.color.get(y * self.config.width() + x).copied()
    }

    /// Shadow engine of the `index`-th light of the last frame.
    pub fn shadow(&self, index: usize) -> Option<&ShadowEngine> {
        self.shadows.get(index)
    }

    pub fn render(&mut self, scene: &Scene) -> Result<RenderStats, RenderError> {
        self.run(scene, None)
    }

    /// Renders and resolves into `target`, resizing it to the frame size.
    pub fn render_image(
        &mut self,
        scene: &Scene,
        target: &mut ImageTarget,
    ) -> Result<RenderStats, RenderError> {
        self.run(scene, Some(target))
    }

    fn frame_settings(&self, scene: &Scene, resolve: bool) -> FrameSettings {
        let view = self.config.debug_view();
        let lit = match view {
            DebugView::Final => self.shader.uses_lights(),
            other => other.needs_shadows(),
        };
        let shadows = lit && scene.light_count() > 0;
        FrameSettings {
            shadows,
            penumbra_mask: shadows
                && scene
                    .lights()
                    .any(|l| l.shadow.enabled && l.shadow.penumbra_mask),
            resolve,
        }
    }

    fn run(
        &mut self,
        scene: &Scene,
        mut target: Option<&mut ImageTarget>,
    ) -> Result<RenderStats, RenderError> {
        scene.validate()?;
        let start = Instant::now();
        let (width, height) = (self.config.width(), self.config.height());
        let mut stats = RenderStats {
            width,
            height,
            threads: self.scheduler.threads(),
            models: scene.model_count(),
            lights: scene.light_count(),
            triangles_submitted: scene.triangle_count(),
            ..RenderStats::default()
        };

        let nodes = scene.mesh_nodes();
        let meshes: Vec<&Mesh> = nodes.iter().map(|n| &n.mesh).collect();
        let materials: Vec<&Material> = nodes.iter().map(|n| &n.material).collect();
        let lights: Vec<&Light> = scene.lights().collect();

        let graph = FrameGraph::new(self.frame_settings(scene, target.is_some()));
        let shadows_ready = graph.contains(FramePassId::ShadowDepth);
        let grid = TileGrid::new(width, height, self.config.tile_size());

        self.gbuffer.reset(width, height);
        self.color.clear();
        self.color.resize(width * height, self.config.background());
        if !shadows_ready {
            self.shadows.clear();
        }

        for pass in graph.passes() {
            match pass.id {
                FramePassId::ShadowDepth => {
                    stats.shadow_triangles =
                        timed(&mut stats.shadow_depth, || self.shadow_depth_pass(&lights, &meshes));
                }
                FramePassId::ClipCamera => {
                    let camera = scene.camera;
                    let transform = ViewTransform {
                        view: camera.view_matrix(),
                        projection: camera.projection_matrix(width as f32 / height as f32),
                        perspective: camera.projection.is_perspective(),
                        cull: self.config.cull_mode(),
                    };
                    let arena = &mut self.arena;
                    timed(&mut stats.clip, || {
                        self.scheduler.install(|| arena.rebuild(&meshes, &transform))
                    });
                    stats.triangles_clipped = self.arena.triangle_count();
                }
                FramePassId::RasterizeGBuffer => {
                    let arena = &self.arena;
                    let scheduler = &self.scheduler;
                    let gbuffer = &mut self.gbuffer;
                    let materials = &materials;
                    timed(&mut stats.raster, || {
                        let tris = scheduler.install(|| {
                            BinnedTriangles::build(arena, &grid, |m| {
                                materials.get(m).is_some_and(|mat| mat.has_normal_map())
                            })
                        });
                        scheduler.for_each_tile(&grid, gbuffer.bands_mut(grid.tile_size()), |band, tile| {
                            rasterize_gbuffer_tile(band, tile, &tris, materials);
                        });
                    });
                }
                FramePassId::PenumbraMask => {
                    let blur = self.config.penumbra_blur_radius();
                    let tile_size = self.config.tile_size();
                    let (scheduler, gbuffer) = (&self.scheduler, &self.gbuffer);
                    let shadows = &mut self.shadows;
                    stats.penumbra_cells = timed(&mut stats.penumbra_mask, || {
                        shadows
                            .iter_mut()
                            .map(|engine| {
                                engine.build_penumbra_mask(scheduler, gbuffer, blur, tile_size);
                                engine.stats().penumbra_cells
                            })
                            .sum::<usize>()
                    });
                }
                FramePassId::Shade => {
                    let ctx = ShadeContext {
                        lights: &lights,
                        shadows: &self.shadows,
                        shadows_ready,
                        shader: self.shader,
                        view: self.config.debug_view(),
                        eye: scene.camera.eye,
                    };
                    let gbuffer = &self.gbuffer;
                    let rows = grid.tile_size();
                    let bands = self.color.par_chunks_mut(width * rows).enumerate();
                    let scheduler = &self.scheduler;
                    timed(&mut stats.shade, || {
                        scheduler.for_each_tile(&grid, bands, |(band, color), tile| {
                            let y_base = *band * rows;
                            let mut samples = Vec::with_capacity(ctx.lights.len());
                            for y in tile.y0..tile.y1 {
                                for x in tile.x0..tile.x1 {
                                    if let Some(frag) = gbuffer.at(x, y) {
                                        color[(y - y_base) * width + x] =
                                            ctx.shade_pixel(x, y, &frag, &mut samples);
                                    }
                                }
                            }
                        });
                    });
                }
                FramePassId::Resolve => {
                    if let Some(target) = target.as_deref_mut() {
                        timed(&mut stats.resolve, || {
                            target.resize(width, height);
                            target.write_linear(&self.color);
                        });
                    }
                }
            }
        }
        stats.total = start.elapsed();
        log::debug!("frame: {}", stats.summary());
        Ok(stats)
    }

    /// Look-at and depth pass for every light; returns the rasterized
    /// triangle count.
    fn shadow_depth_pass(&mut self, lights: &[&Light], meshes: &[&Mesh]) -> usize {
        self.shadows.resize_with(lights.len(), ShadowEngine::new);
        let cull = self.config.cull_mode();
        let tile_size = self.config.tile_size();
        let mut triangles = 0;
        for (engine, light) in self.shadows.iter_mut().zip(lights) {
            engine.look_at(light);
            engine.render_depth(&self.scheduler, meshes, light, cull, tile_size);
            log::trace!(
                "light at {:?}: {} shadow triangles",
                light.position,
                engine.stats().triangles
            );
            triangles += engine.stats().triangles;
        }
        triangles
    }
}

/// Read-only state shared by every shading worker.
struct ShadeContext<'a> {
    lights: &'a [&'a Light],
    shadows: &'a [ShadowEngine],
    shadows_ready: bool,
    shader: BuiltinShader,
    view: DebugView,
    eye: Vec3,
}

impl ShadeContext<'_> {
    fn visibility(&self, light: usize, x: usize, y: usize, frag: &Fragment) -> f32 {
        if !self.shadows_ready {
            return 1.0;
        }
        self.shadows
            .get(light)
            .map_or(1.0, |s| s.visibility_at_pixel(x, y, frag.position, frag.normal))
    }

    fn shade_pixel(&self, x: usize, y: usize, frag: &Fragment, samples: &mut Vec<LightSample>) -> Vec3 {
        match self.view {
            DebugView::Depth => depth_rgb(frag.depth),
            DebugView::Normals => normal_rgb(frag.normal),
            DebugView::Diffuse => frag.diffuse,
            DebugView::PenumbraMask => self
                .shadows
                .first()
                .and_then(ShadowEngine::penumbra_mask)
                .map_or(Vec3::ONE, |mask| mask_rgb(mask.class_at(x, y), mask.value_at(x, y))),
            DebugView::ShadowVisibility => Vec3::splat(if self.lights.is_empty() {
                1.0
            } else {
                self.visibility(0, x, y, frag)
            }),
            DebugView::Final => {
                samples.clear();
                if self.shader.uses_lights() {
                    for (i, light) in self.lights.iter().enumerate() {
                        samples.push(LightSample {
                            direction: light.direction_from(frag.position),
                            radiance: light.radiance_at(frag.position),
                            visibility: self.visibility(i, x, y, frag),
                        });
                    }
                }
                self.shader.shade(frag, self.eye, samples)
            }
        }
    }
}
