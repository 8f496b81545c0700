use std::{fs, path::Path};

use crate::{error::TextureError, texture::Texture};

pub fn load_texture(path: impl AsRef<Path>) -> Result<Texture, TextureError> {
    let bytes = fs::read(path.as_ref())?;
    load_texture_from_bytes(&bytes)
}

/// Decodes an encoded image. Channel values are kept as stored; no color
/// space conversion is applied.
pub fn load_texture_from_bytes(bytes: &[u8]) -> Result<Texture, TextureError> {
    #[cfg(feature = "image")]
    {
        let img = image::load_from_memory(bytes).map_err(|e| TextureError::Decode(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Texture::from_rgba8(w, h, rgba.into_raw())
    }
    #[cfg(not(feature = "image"))]
    {
        let _ = bytes;
        Err(TextureError::FeatureDisabled)
    }
}

/// Loads a texture, logging and returning `None` on failure so the material
/// falls back to its default channel value.
pub fn load_texture_or_warn(path: impl AsRef<Path>) -> Option<Texture> {
    let path = path.as_ref();
    match load_texture(path) {
        Ok(tex) => {
            log::debug!("loaded texture {} ({}x{})", path.display(), tex.width, tex.height);
            Some(tex)
        }
        Err(err) => {
            log::warn!("failed to load texture {}: {err}", path.display());
            None
        }
    }
}
