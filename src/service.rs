//! Tile render service: tile address in, encoded image out.
//!
//! The entry point the HTTP layer calls. Per request it validates the tile
//! address, computes the projected extent, borrows a render context from
//! the pool, points its viewport at the extent, and renders. The pool
//! guard returns the context on every path, so a failed render never costs
//! a context.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::engine::{ImageFormat, RenderContext, RenderEngine};
use crate::error::RenderError;
use crate::pool::ContextPool;
use crate::{tile_bounds, MAX_ZOOM};

/// Renders slippy-map tiles against one immutable style document.
pub struct TileRenderService<E: RenderEngine> {
    pool: ContextPool<E>,
    config: ServiceConfig,
}

impl<E: RenderEngine> TileRenderService<E> {
    /// Builds the service around an engine and a serialized style document.
    pub fn new(engine: E, document: String, config: ServiceConfig) -> TileRenderService<E> {
        let pool = ContextPool::new(
            engine,
            document,
            config.pool.capacity,
            config.map.tile_size,
            config.map.tile_size,
        );
        TileRenderService { pool, config }
    }

    pub fn pool(&self) -> &ContextPool<E> {
        &self.pool
    }

    /// Initializes every render context up front so configuration problems
    /// fail startup instead of the first requests.
    pub async fn warm_up(&self) -> Result<(), RenderError> {
        Ok(self.pool.warm_up().await?)
    }

    /// Renders one tile and returns the encoded image.
    pub async fn render_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Vec<u8>, RenderError> {
        check_tile_address(zoom, x, y)?;
        let bounds = tile_bounds(zoom, x, y);

        let mut context = self.pool.acquire().await?;
        context.zoom_to_box(&bounds);
        let image = context.render(ImageFormat::Png).await;
        // The guard returns the context whether or not the render worked.
        drop(context);

        match image {
            Ok(image) => {
                debug!(zoom, x, y, bytes = image.len(), "rendered tile");
                Ok(image)
            }
            Err(err) => {
                warn!(zoom, x, y, error = %err, "tile render failed");
                Err(err.into())
            }
        }
    }

    /// Renders one tile and writes it under the configured tile directory.
    pub async fn render_to_file(&self, zoom: u8, x: u32, y: u32) -> Result<PathBuf, RenderError> {
        let image = self.render_tile(zoom, x, y).await?;
        let path = self.config.output.tile_path(zoom, x, y);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| RenderError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, &image)
            .await
            .map_err(|source| RenderError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Rejects addresses outside the tile pyramid before any pool resource is
/// touched.
fn check_tile_address(zoom: u8, x: u32, y: u32) -> Result<(), RenderError> {
    if zoom > MAX_ZOOM {
        return Err(RenderError::ZoomOutOfRange(zoom));
    }
    let tiles_per_axis = 1u64 << zoom;
    if u64::from(x) >= tiles_per_axis || u64::from(y) >= tiles_per_axis {
        return Err(RenderError::TileOutOfRange { zoom, x, y });
    }
    Ok(())
}
