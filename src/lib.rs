//! # Tile Painter
//!
//! Tools for modeling cartographic styles and rendering raster map tiles.
//!
//! ## Current status
//!
//! This crate should be regarded as stable in terms of code
//! reliability/correctness, but not yet stable in terms of trait and method
//! signatures. The document model covers the symbolizers we render in
//! production; more will be added as the need arises.
//!
//! ## Current features
//!
//! A style document is assembled once at startup with
//! [`style::builder::StyleBuilder`]: named styles, ordered rules with
//! filter and zoom predicates, typed symbolizers, and layers bound to a
//! PostGIS-style datastore or to raster files. The serialized document feeds
//! a rendering engine behind the [`engine::RenderEngine`] trait, and
//! [`service::TileRenderService`] answers slippy-map tile requests by
//! computing the tile's EPSG:3857 extent and driving a bounded pool of
//! reusable render contexts.
//!
//! ## Known limitations
//!
//! The rendering engine itself is not part of this crate; callers supply an
//! implementation of the engine traits. Datasource queries embedded in the
//! document are opaque here and are executed by the engine. A document binds
//! all of its SQL layers to a single datastore.

#![deny(warnings)]

use slippy_map_tilenames as smt;

pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod service;
pub mod style;
pub mod stylesheet;

/// Spherical earth radius used by EPSG:3857, in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Deepest zoom level the service will accept.
pub const MAX_ZOOM: u8 = 22;

/// Projected extent of one tile in EPSG:3857 meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Returns the geographic coordinates of a tile's northwest corner.
pub fn tile_to_lon_lat(zoom: u8, x: u32, y: u32) -> (f64, f64) {
    smt::tile2lonlat(x, y, zoom)
}

/// Spherical Mercator forward projection onto EPSG:3857 meters.
pub fn project(lon: f64, lat: f64) -> (f64, f64) {
    let easting = EARTH_RADIUS_M * lon.to_radians();
    let northing =
        EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (easting, northing)
}

/// Computes the projected bounding box of a slippy-map tile.
///
/// The southwest corner comes from tile (x, y+1) and the northeast corner
/// from tile (x+1, y); tile rows count down from the north.
pub fn tile_bounds(zoom: u8, x: u32, y: u32) -> TileBounds {
    let (west_lon, south_lat) = tile_to_lon_lat(zoom, x, y + 1);
    let (east_lon, north_lat) = tile_to_lon_lat(zoom, x + 1, y);
    let (west, south) = project(west_lon, south_lat);
    let (east, north) = project(east_lon, north_lat);
    TileBounds {
        west,
        south,
        east,
        north,
    }
}
