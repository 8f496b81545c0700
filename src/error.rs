use thiserror::Error;

/// Errors surfaced while configuring or setting up a render.
///
/// The per-frame pipeline itself has no error path: degenerate geometry is
/// dropped and zero denominators fall back to defined values.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("output error: {0}")]
    Output(String),
}

impl RenderError {
    pub fn invalid_config<T: ToString>(msg: T) -> Self {
        RenderError::InvalidConfig(msg.to_string())
    }
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("pixel data does not match {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("feature `image` is disabled")]
    FeatureDisabled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("vertex {index} has a non-finite position")]
    PositionNotFinite { index: usize },

    #[error("{attribute} has {len} entries but there are {positions} positions")]
    AttributeLenMismatch {
        attribute: &'static str,
        len: usize,
        positions: usize,
    },

    #[error("triangle {tri} references vertex {index} of {vertex_count}")]
    IndexOutOfBounds {
        tri: usize,
        index: u32,
        vertex_count: usize,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;
