use glam::Vec3;
use rayon::prelude::*;

/// Everything the shading pass needs for one covered pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fragment {
    /// Camera depth in `[0, 1]`, smaller is closer.
    pub depth: f32,
    pub position: Vec3,
    pub normal: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub glow: Vec3,
}

/// Per-pixel geometry channels, row-major with row 0 at the top.
#[derive(Clone, Debug, Default)]
pub struct GBuffer {
    width: usize,
    height: usize,
    depth: Vec<f32>,
    position: Vec<Vec3>,
    normal: Vec<Vec3>,
    diffuse: Vec<Vec3>,
    specular: Vec<Vec3>,
    glow: Vec<Vec3>,
}

impl GBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let mut g = Self::default();
        g.reset(width, height);
        g
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Resizes if needed and overwrites every channel.
    pub fn reset(&mut self, width: usize, height: usize) {
        let n = width.saturating_mul(height);
        self.width = width;
        self.height = height;
        for channel in [
            &mut self.position,
            &mut self.normal,
            &mut self.diffuse,
            &mut self.specular,
            &mut self.glow,
        ] {
            channel.clear();
            channel.resize(n, Vec3::ZERO);
        }
        self.depth.clear();
        self.depth.resize(n, f32::INFINITY);
    }

    pub fn depth_slice(&self) -> &[f32] {
        &self.depth
    }

    pub fn normal_slice(&self) -> &[Vec3] {
        &self.normal
    }

    pub fn diffuse_slice(&self) -> &[Vec3] {
        &self.diffuse
    }

    pub fn is_covered(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.depth[y * self.width + x].is_finite()
    }

    /// Fragment stored at `(x, y)`, or `None` when nothing covers it.
    pub fn at(&self, x: usize, y: usize) -> Option<Fragment> {
        if !self.is_covered(x, y) {
            return None;
        }
        let i = y * self.width + x;
        Some(Fragment {
            depth: self.depth[i],
            position: self.position[i],
            normal: self.normal[i],
            diffuse: self.diffuse[i],
            specular: self.specular[i],
            glow: self.glow[i],
        })
    }

    /// Splits every channel into disjoint bands of `rows` rows.
    pub fn bands_mut(&mut self, rows: usize) -> impl IndexedParallelIterator<Item = GBufferBand<'_>> {
        let width = self.width;
        let stride = width * rows.max(1);
        self.depth
            .par_chunks_mut(stride)
            .zip(self.position.par_chunks_mut(stride))
            .zip(self.normal.par_chunks_mut(stride))
            .zip(self.diffuse.par_chunks_mut(stride))
            .zip(self.specular.par_chunks_mut(stride))
            .zip(self.glow.par_chunks_mut(stride))
            .enumerate()
            .map(
                move |(i, (((((depth, position), normal), diffuse), specular), glow))| GBufferBand {
                    width,
                    y0: i * rows.max(1),
                    depth,
                    position,
                    normal,
                    diffuse,
                    specular,
                    glow,
                },
            )
    }
}

/// Exclusive view of a horizontal band of the G-buffer.
pub struct GBufferBand<'a> {
    width: usize,
    y0: usize,
    depth: &'a mut [f32],
    position: &'a mut [Vec3],
    normal: &'a mut [Vec3],
    diffuse: &'a mut [Vec3],
    specular: &'a mut [Vec3],
    glow: &'a mut [Vec3],
}

impl GBufferBand<'_> {
    pub fn y0(&self) -> usize {
        self.y0
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.depth.len() / self.width
        }
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y < self.y0 || y >= self.y0 + self.rows() {
            return None;
        }
        Some((y - self.y0) * self.width + x)
    }

    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.index(x, y).map_or(f32::NEG_INFINITY, |i| self.depth[i])
    }

    /// Depth-tested write; all channels of the pixel change together.
    pub fn try_write(&mut self, x: usize, y: usize, frag: &Fragment) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        if frag.depth < self.depth[i] {
            self.depth[i] = frag.depth;
            self.position[i] = frag.position;
            self.normal[i] = frag.normal;
            self.diffuse[i] = frag.diffuse;
            self.specular[i] = frag.specular;
            self.glow[i] = frag.glow;
            true
        } else {
            false
        }
    }
}

/// Single-channel depth target, used for shadow maps.
#[derive(Clone, Debug, Default)]
pub struct DepthBuffer {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let mut d = Self::default();
        d.reset(width, height);
        d
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn reset(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width.saturating_mul(height), f32::INFINITY);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Clamped lookup; coordinates outside the map read the nearest edge texel.
    pub fn at_clamped(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width + x]
    }

    pub fn bands_mut(&mut self, rows: usize) -> impl IndexedParallelIterator<Item = DepthBand<'_>> {
        let width = self.width;
        let rows = rows.max(1);
        self.data
            .par_chunks_mut(width * rows)
            .enumerate()
            .map(move |(i, depth)| DepthBand {
                width,
                y0: i * rows,
                depth,
            })
    }
}

pub struct DepthBand<'a> {
    width: usize,
    y0: usize,
    depth: &'a mut [f32],
}

impl DepthBand<'_> {
    pub fn y0(&self) -> usize {
        self.y0
    }

    pub fn try_write(&mut self, x: usize, y: usize, depth: f32) -> bool {
        if x >= self.width || y < self.y0 {
            return false;
        }
        let i = (y - self.y0) * self.width + x;
        match self.depth.get_mut(i) {
            Some(slot) if depth < *slot => {
                *slot = depth;
                true
            }
            _ => false,
        }
    }
}
