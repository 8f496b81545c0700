use glam::{Vec3, Vec4};

use crate::error::TextureError;

/// 8-bit RGBA image sampled with bilinear filtering and clamp-to-edge
/// addressing.
///
/// Texel rows are stored top to bottom, while `v = 0` addresses the bottom
/// row, matching the usual mesh UV convention.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl Texture {
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> Result<Self, TextureError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        match expected {
            Some(len) if len == rgba8.len() && len > 0 => Ok(Self {
                width,
                height,
                rgba8,
            }),
            _ => Err(TextureError::InvalidDimensions { width, height }),
        }
    }

    /// 1x1 texture holding `color`, components clamped to `[0, 1]`.
    pub fn solid(color: Vec3) -> Self {
        let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        Self {
            width: 1,
            height: 1,
            rgba8: vec![c.x as u8, c.y as u8, c.z as u8, 255],
        }
    }

    fn texel(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        Vec4::new(
            self.rgba8[i] as f32,
            self.rgba8[i + 1] as f32,
            self.rgba8[i + 2] as f32,
            self.rgba8[i + 3] as f32,
        ) / 255.0
    }

    pub fn sample_rgba(&self, u: f32, v: f32) -> Vec4 {
        let u = if u.is_finite() { u.clamp(0.0, 1.0) } else { 0.0 };
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };

        let x = u * self.width as f32 - 0.5;
        let y = (1.0 - v) * self.height as f32 - 0.5;

        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let tx = x - x0 as f32;
        let ty = y - y0 as f32;

        let c00 = self.texel(x0, y0);
        let c10 = self.texel(x0 + 1, y0);
        let c01 = self.texel(x0, y0 + 1);
        let c11 = self.texel(x0 + 1, y0 + 1);

        c00.lerp(c10, tx).lerp(c01.lerp(c11, tx), ty)
    }

    /// Bilinear RGB sample with components in `[0, 1]`.
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        self.sample_rgba(u, v).truncate()
    }
}
