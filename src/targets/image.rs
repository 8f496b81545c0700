use glam::Vec3;

use crate::{error::RenderError, types::Rgb8};

/// Row-major RGB8 image, row 0 at the top.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageTarget {
    width: usize,
    height: usize,
    rgb: Vec<u8>,
}

impl ImageTarget {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgb: vec![0u8; width.saturating_mul(height).saturating_mul(3)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self, color: Rgb8) {
        for px in self.rgb.chunks_exact_mut(3) {
            px.copy_from_slice(&color.to_bytes());
        }
    }

    pub fn set(&mut self, x: usize, y: usize, color: Rgb8) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = (y * self.width + x) * 3;
        self.rgb[i..i + 3].copy_from_slice(&color.to_bytes());
        true
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some(Rgb8::new(self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]))
    }

    /// Converts a float color buffer of the same size, clamped to `[0, 1]`.
    pub fn write_linear(&mut self, color: &[Vec3]) {
        debug_assert_eq!(color.len(), self.width * self.height);
        for (px, c) in self.rgb.chunks_exact_mut(3).zip(color) {
            px.copy_from_slice(&Rgb8::from_unit(*c).to_bytes());
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgb
    }

    /// FNV-1a over the dimensions and pixels.
    pub fn hash64(&self) -> u64 {
        let mut h: u64 = 0xcbf29ce484222325;
        fn mix(h: &mut u64, b: u8) {
            *h ^= b as u64;
            *h = h.wrapping_mul(0x100000001b3);
        }
        for b in self.width.to_le_bytes() {
            mix(&mut h, b);
        }
        for b in self.height.to_le_bytes() {
            mix(&mut h, b);
        }
        for &b in &self.rgb {
            mix(&mut h, b);
        }
        h
    }

    #[cfg(feature = "image")]
    fn to_image(&self) -> Result<image::RgbImage, RenderError> {
        image::RgbImage::from_raw(self.width as u32, self.height as u32, self.rgb.clone())
            .ok_or_else(|| RenderError::Output(format!("bad buffer for {}x{}", self.width, self.height)))
    }

    #[cfg(feature = "image")]
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        self.to_image()?
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| RenderError::Output(e.to_string()))?;
        Ok(out)
    }

    #[cfg(feature = "image")]
    pub fn write_png(&self, path: impl AsRef<std::path::Path>) -> Result<(), RenderError> {
        let path = path.as_ref();
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| RenderError::Output(format!("{}: {e}", path.display())))?;
        log::debug!("wrote {}x{} png to {}", self.width, self.height, path.display());
        Ok(())
    }

    #[cfg(not(feature = "image"))]
    pub fn write_png(&self, path: impl AsRef<std::path::Path>) -> Result<(), RenderError> {
        Err(RenderError::Output(format!(
            "cannot write {}: feature `image` is disabled",
            path.as_ref().display()
        )))
    }
}
