//! Crate error type

/// Errors raised while building buffers, loading configuration or talking to SDL.
///
/// Runtime buffer operations (lock, unlock, blit, draw) never produce these;
/// they report through `bool` so a denied frame can simply be skipped.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("failed to allocate {size} byte pixel store")]
    Allocation { size: usize },

    #[error("pixel store holds {size} bytes but {needed} are required")]
    TooSmall { size: usize, needed: usize },

    #[error("SDL error: {0}")]
    Sdl(String),

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GfxError>;
