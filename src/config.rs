//! Process-wide configuration consumed at startup.
//!
//! Settings are plain data structs deserialized from a YAML document; every
//! field carries a default so a partial (or empty) config section is enough
//! to get a working service.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::BuildError;

/// Spherical Mercator (EPSG:3857) proj4 definition used as the default map
/// projection.
pub const WEB_MERCATOR_SRS: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 \
     +x_0=0.0 +y_0=0 +k=1.0 +units=m +nadgrids=@null +no_defs +over";

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub map: MapSettings,
    pub datastore: DatastoreSettings,
    pub pool: PoolSettings,
    pub output: OutputSettings,
}

impl ServiceConfig {
    /// Parses a YAML configuration document.
    pub fn from_yaml(data: &str) -> Result<ServiceConfig, BuildError> {
        Ok(serde_yaml::from_str(data)?)
    }
}

/// Map-wide rendering settings serialized into the style document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// Background color painted before any layer.
    pub background_color: String,
    /// Spatial reference system of the rendered map.
    pub srs: String,
    /// Rendering margin around each tile, in pixels.
    pub buffer_size: u32,
    /// Output tile edge length, in pixels.
    pub tile_size: u32,
}

impl Default for MapSettings {
    fn default() -> Self {
        MapSettings {
            background_color: String::from("white"),
            srs: String::from(WEB_MERCATOR_SRS),
            buffer_size: 256,
            tile_size: 256,
        }
    }
}

/// Connection parameters for the spatial datastore backing SQL layers.
///
/// These are opaque configuration passed through to the rendering engine;
/// query execution happens entirely on the engine side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatastoreSettings {
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for DatastoreSettings {
    fn default() -> Self {
        DatastoreSettings {
            kind: String::from("postgis"),
            host: String::from("localhost"),
            port: 5432,
            user: String::from("postgres"),
            password: String::new(),
            dbname: String::from("gis"),
        }
    }
}

/// Render context pool sizing.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of concurrently usable render contexts.
    pub capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings { capacity: 8 }
    }
}

/// Where rendered tiles land when written to disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub tile_dir: PathBuf,
}

impl OutputSettings {
    /// Path for one rendered tile under the output directory.
    pub fn tile_path(&self, zoom: u8, x: u32, y: u32) -> PathBuf {
        self.tile_dir.join(format!("tile_{zoom}_{x}_{y}.png"))
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            tile_dir: PathBuf::from("tiles"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = ServiceConfig::from_yaml("{}").expect("empty mapping should parse");
        assert_eq!("white", config.map.background_color);
        assert_eq!(256, config.map.buffer_size);
        assert_eq!(256, config.map.tile_size);
        assert_eq!("postgis", config.datastore.kind);
        assert_eq!(8, config.pool.capacity);
        assert_eq!(PathBuf::from("tiles"), config.output.tile_dir);
        assert!(config.map.srs.contains("+proj=merc"));
    }

    #[test]
    fn test_partial_overrides() {
        let yaml = "
map:
  background_color: '#222222'
datastore:
  host: db.example.net
  port: 5433
  user: carto
  password: secret
  dbname: osm
pool:
  capacity: 4
output:
  tile_dir: /var/tiles
";
        let config = ServiceConfig::from_yaml(yaml).expect("valid yaml");
        assert_eq!("#222222", config.map.background_color);
        // Unset fields keep their defaults.
        assert_eq!(256, config.map.tile_size);
        assert_eq!("db.example.net", config.datastore.host);
        assert_eq!(5433, config.datastore.port);
        assert_eq!("osm", config.datastore.dbname);
        assert_eq!(4, config.pool.capacity);
        assert_eq!(
            PathBuf::from("/var/tiles/tile_12_2200_1343.png"),
            config.output.tile_path(12, 2200, 1343)
        );
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let result = ServiceConfig::from_yaml("pool: [not, a, mapping]");
        assert!(matches!(result, Err(BuildError::Config(_))));
    }
}
