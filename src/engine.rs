//! Rendering engine boundary.
//!
//! The native engine that turns a style document plus a viewport into
//! pixels is not part of this crate. It sits behind two traits: an engine
//! that initializes reusable contexts from the serialized document, and the
//! contexts themselves, which hold a mutable viewport and render on demand.
//! The pool owns every context; callers borrow one per request.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::TileBounds;

/// Output raster encodings the service can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
}

/// A rendering engine capable of initializing render contexts from a
/// serialized style document.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    type Context: RenderContext;

    /// Initializes one reusable context bound to the document.
    ///
    /// Fails when the engine rejects the document or cannot reach a
    /// datasource the document references.
    async fn create_context(
        &self,
        document: &str,
        width: u32,
        height: u32,
    ) -> Result<Self::Context, EngineError>;
}

/// An initialized engine handle bound to one style document.
///
/// The viewport is transient per-request state: it is set immediately
/// before each render and means nothing between uses.
#[async_trait]
pub trait RenderContext: Send {
    /// Sets the projected viewport for the next render.
    fn zoom_to_box(&mut self, bounds: &TileBounds);

    /// Renders the current viewport into an encoded image.
    async fn render(&mut self, format: ImageFormat) -> Result<Vec<u8>, EngineError>;
}
