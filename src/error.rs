//! Error types for style construction and tile rendering.

use std::path::PathBuf;

/// Errors raised while assembling or serializing a style document.
///
/// These are configuration defects. They abort startup and are never
/// recoverable at request time.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a style named '{0}' already exists in the document")]
    DuplicateStyle(String),

    #[error("no style to attach to; add_style must come first")]
    NoCurrentStyle,

    #[error("no rule to attach to; add_rule must come first")]
    NoCurrentRule,

    #[error("layer '{layer}' references unknown style '{style}'")]
    UnresolvedStyle { layer: String, style: String },

    #[error("invalid service configuration")]
    Config(#[from] serde_yaml::Error),
}

/// Failures reported by the rendering engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine rejected the style document: {0}")]
    InvalidDocument(String),

    #[error("datasource connection failed: {0}")]
    Datasource(String),

    #[error("render failed: {0}")]
    Render(String),
}

/// Per-request failures from the tile render service.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("tile ({x}, {y}) is out of range for zoom {zoom}")]
    TileOutOfRange { zoom: u8, x: u32, y: u32 },

    #[error("zoom {0} is beyond the supported tile pyramid")]
    ZoomOutOfRange(u8),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write tile to {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
