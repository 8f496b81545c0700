pub mod texture;

pub use texture::{load_texture, load_texture_from_bytes, load_texture_or_warn};
