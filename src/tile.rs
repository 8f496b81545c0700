use rayon::prelude::*;

use crate::error::RenderError;

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub index: usize,
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Tile {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Partition of a `width x height` target into `tile_size` squares. Tiles on
/// the right and bottom edges may be partial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tile_size: usize,
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        Self {
            width,
            height,
            tile_size: tile_size.max(1),
        }
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

    pub fn tiles_x(&self) -> usize {
        self.width.div_ceil(self.tile_size)
    }

    pub fn tiles_y(&self) -> usize {
        self.height.div_ceil(self.tile_size)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x() * self.tiles_y()
    }

    pub fn tile(&self, tx: usize, ty: usize) -> Tile {
        let x0 = tx * self.tile_size;
        let y0 = ty * self.tile_size;
        Tile {
            index: ty * self.tiles_x() + tx,
            x0,
            y0,
            x1: (x0 + self.tile_size).min(self.width),
            y1: (y0 + self.tile_size).min(self.height),
        }
    }

    /// Tiles of row `ty`, left to right.
    pub fn row(&self, ty: usize) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tiles_x()).map(move |tx| self.tile(tx, ty))
    }

    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tiles_y()).flat_map(move |ty| self.row(ty))
    }

    /// Inclusive tile index range touched by an inclusive pixel range, or
    /// `None` when it misses the target.
    pub fn tile_span(
        &self,
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
    ) -> Option<(usize, usize, usize, usize)> {
        if max_x < 0 || max_y < 0 || min_x >= self.width as i32 || min_y >= self.height as i32 {
            return None;
        }
        if min_x > max_x || min_y > max_y {
            return None;
        }
        let ts = self.tile_size as i32;
        let tx0 = (min_x.max(0) / ts) as usize;
        let ty0 = (min_y.max(0) / ts) as usize;
        let tx1 = ((max_x / ts) as usize).min(self.tiles_x() - 1);
        let ty1 = ((max_y / ts) as usize).min(self.tiles_y() - 1);
        Some((tx0, ty0, tx1, ty1))
    }
}

/// Primitive indices binned per tile (counting sort, stable in input order).
#[derive(Clone, Debug, Default)]
pub struct TileBins {
    starts: Vec<u32>,
    items: Vec<u32>,
}

impl TileBins {
    /// `spans` yields, per primitive, its inclusive pixel bounding box.
    pub fn build<I>(grid: &TileGrid, spans: I) -> Self
    where
        I: Iterator<Item = (i32, i32, i32, i32)> + Clone,
    {
        let mut counts = vec![0u32; grid.tile_count() + 1];
        for (min_x, min_y, max_x, max_y) in spans.clone() {
            if let Some((tx0, ty0, tx1, ty1)) = grid.tile_span(min_x, min_y, max_x, max_y) {
                for ty in ty0..=ty1 {
                    for tx in tx0..=tx1 {
                        counts[ty * grid.tiles_x() + tx] += 1;
                    }
                }
            }
        }

        let mut starts = vec![0u32; counts.len()];
        let mut acc = 0u32;
        for (s, c) in starts.iter_mut().zip(counts.iter()) {
            *s = acc;
            acc += *c;
        }

        let mut cursor = starts.clone();
        let mut items = vec![0u32; acc as usize];
        for (prim, (min_x, min_y, max_x, max_y)) in spans.enumerate() {
            if let Some((tx0, ty0, tx1, ty1)) = grid.tile_span(min_x, min_y, max_x, max_y) {
                for ty in ty0..=ty1 {
                    for tx in tx0..=tx1 {
                        let t = ty * grid.tiles_x() + tx;
                        items[cursor[t] as usize] = prim as u32;
                        cursor[t] += 1;
                    }
                }
            }
        }
        Self { starts, items }
    }

    pub fn items(&self, tile: usize) -> &[u32] {
        match (self.starts.get(tile), self.starts.get(tile + 1)) {
            (Some(&s), Some(&e)) => &self.items[s as usize..e as usize],
            _ => &[],
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

/// Runs per-tile work on a bounded worker pool.
///
/// Work is handed out as bands of `tile_size` rows; each band visits its
/// tiles left to right. Every call returns only after all bands finish.
pub struct TileScheduler {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl TileScheduler {
    pub fn new(max_threads: usize) -> Result<Self, RenderError> {
        let threads = max_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("penumbra-worker-{i}"))
            .build()?;
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `op` inside the worker pool, so nested rayon iterators use it.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Calls `f(&mut band, tile)` for every tile of `grid`.
    ///
    /// `bands` must yield one exclusive band per tile row, i.e. be split at
    /// `grid.tile_size()` rows.
    pub fn for_each_tile<B, I, F>(&self, grid: &TileGrid, bands: I, f: F)
    where
        B: Send,
        I: IndexedParallelIterator<Item = B>,
        F: Fn(&mut B, Tile) + Sync + Send,
    {
        self.pool.install(|| {
            bands.enumerate().for_each(|(ty, mut band)| {
                if ty >= grid.tiles_y() {
                    return;
                }
                for tile in grid.row(ty) {
                    f(&mut band, tile);
                }
            })
        });
    }
}

impl std::fmt::Debug for TileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileScheduler")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn grid_includes_partial_tiles() {
        let grid = TileGrid::new(10, 7, 4);
        assert_eq!(grid.tiles_x(), 3);
        assert_eq!(grid.tiles_y(), 2);
        let last = grid.tile(2, 1);
        assert_eq!((last.x0, last.y0, last.x1, last.y1), (8, 4, 10, 7));
        let covered: usize = grid.tiles().map(|t| t.width() * t.height()).sum();
        assert_eq!(covered, 70);
    }

    #[test]
    fn bins_keep_input_order() {
        let grid = TileGrid::new(8, 8, 4);
        let spans = [(0, 0, 7, 7), (5, 5, 6, 6), (-10, -10, -1, -1), (4, 0, 4, 0)];
        let bins = TileBins::build(&grid, spans.iter().copied());
        assert_eq!(bins.items(0), &[0]);
        assert_eq!(bins.items(1), &[0, 3]);
        assert_eq!(bins.items(3), &[0, 1]);
        assert_eq!(bins.total(), 6);
        assert!(bins.items(99).is_empty());
    }

    #[test]
    fn scheduler_visits_every_tile_once() {
        let scheduler = TileScheduler::new(3).unwrap();
        let grid = TileGrid::new(13, 9, 4);
        let mut data = vec![0u32; 13 * 9];
        let visits = AtomicUsize::new(0);
        let bands = data.par_chunks_mut(13 * 4).enumerate();
        scheduler.for_each_tile(&grid, bands, |(band_index, band), tile| {
            visits.fetch_add(1, Ordering::Relaxed);
            for y in tile.y0..tile.y1 {
                for x in tile.x0..tile.x1 {
                    band[(y - *band_index * 4) * 13 + x] += 1;
                }
            }
        });
        assert_eq!(visits.load(Ordering::Relaxed), grid.tile_count());
        assert!(data.iter().all(|&v| v == 1));
    }
}
