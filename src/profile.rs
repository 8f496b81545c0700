use std::time::{Duration, Instant};

/// Counters and per-stage wall time of one rendered frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub width: usize,
    pub height: usize,
    pub threads: usize,
    pub models: usize,
    pub lights: usize,
    pub triangles_submitted: usize,
    /// Camera-space triangles left after culling and clipping.
    pub triangles_clipped: usize,
    /// Triangles rasterized into shadow maps, summed over lights.
    pub shadow_triangles: usize,
    pub penumbra_cells: usize,

    pub total: Duration,
    pub shadow_depth: Duration,
    pub clip: Duration,
    pub raster: Duration,
    pub penumbra_mask: Duration,
    pub shade: Duration,
    pub resolve: Duration,
}

impl RenderStats {
    pub fn summary(&self) -> String {
        fn ms(d: Duration) -> f32 {
            d.as_secs_f32() * 1000.0
        }

        format!(
            "{}x{} threads={} models={} lights={} tri={} clipped={} shadow_tri={} penumbra={} \
             total={:.2}ms shadow={:.2}ms clip={:.2}ms raster={:.2}ms mask={:.2}ms shade={:.2}ms resolve={:.2}ms",
            self.width,
            self.height,
            self.threads,
            self.models,
            self.lights,
            self.triangles_submitted,
            self.triangles_clipped,
            self.shadow_triangles,
            self.penumbra_cells,
            ms(self.total),
            ms(self.shadow_depth),
            ms(self.clip),
            ms(self.raster),
            ms(self.penumbra_mask),
            ms(self.shade),
            ms(self.resolve),
        )
    }
}

/// Runs `f` and adds its wall time to `slot`.
pub(crate) fn timed<R>(slot: &mut Duration, f: impl FnOnce() -> R) -> R {
    let start = Instant::now();
    let out = f();
    *slot += start.elapsed();
    out
}
