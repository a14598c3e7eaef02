//! The built-in hiking map stylesheet.
//!
//! Landcover, water, a track/road network with per-grade dash patterns,
//! buildings, hillshading, peaks with elevation labels, place names,
//! stacked hiking-route overlays, and elevation contours, with the SQL and
//! raster-file layers feeding them. Datastore parameters and map-wide
//! settings come from the service configuration.

use crate::config::ServiceConfig;
use crate::error::BuildError;
use crate::style::builder::{RulePredicate, StyleBuilder, StyleOptions};
use crate::style::overlay::OverlaySpec;
use crate::style::{
    Document, FileSource, LineSymbolizer, MarkersSymbolizer, PolygonSymbolizer, RasterSymbolizer,
    ScalingMethod, TextSymbolizer,
};

/// Hiking-route marker colors, innermost first.
const ROUTE_FLAGS: [&str; 4] = ["red", "blue", "green", "yellow"];

/// Dash patterns for track grades 1-5; the trailing entry covers tracks
/// with no tracktype tag.
const TRACK_GRADE_DASHES: [Option<&str>; 6] = [
    None,
    Some("8,2"),
    Some("6,4"),
    Some("4,6"),
    Some("2,8"),
    Some("3,7,7,3"),
];

/// Builds the complete hiking map document.
pub fn hiking_map_document(config: &ServiceConfig) -> Result<Document, BuildError> {
    StyleBuilder::new(config.map.clone(), config.datastore.clone())
        .add_style("Landcover")?
        .add_rule(RulePredicate::filter(
            "[landuse] = 'forest' or [landuse] = 'wood' or [natural] = 'wood'",
        ))?
        .add_bordered_polygon_symbolizer("#8CCF8C")?
        .add_rule(RulePredicate::filter("[landuse] = 'farmland'"))?
        .add_bordered_polygon_symbolizer("#EEE0BB")?
        .add_rule(RulePredicate::filter("[landuse] = 'meadow'"))?
        .add_bordered_polygon_symbolizer("#BFFF9F")?
        .add_style("Water-area")?
        .add_rule(RulePredicate::filter("[natural] = 'water'"))?
        .add_bordered_polygon_symbolizer("#8080ff")?
        .add_style("Water-line")?
        .add_rule(RulePredicate::filter("[waterway] = 'river'"))?
        .add_line_symbolizer(LineSymbolizer::new("#8080ff", 0.5))?
        .add_rule(RulePredicate::filter("[waterway] <> 'river'"))?
        .add_line_symbolizer(LineSymbolizer::new("#8080ff", 0.2))?
        .add_style("tracks")?
        .add_rule(RulePredicate::filter(
            "[highway] = 'residential' or [highway] = 'service' or [highway] = 'unclassified' \
             or [highway] = 'road' or [highway] = 'primary' or [highway] = 'secondary' \
             or [highway] = 'tertiary' or [highway] = 'motorway' or [highway] = 'trunk'",
        ))?
        .add_line_symbolizer(LineSymbolizer::new("#ffffff", 3.0).opacity(0.5))?
        .add_line_symbolizer(LineSymbolizer::new("#804040", 1.2))?
        .add_rule(RulePredicate::filter("[highway] = 'path'"))?
        .add_line_symbolizer(LineSymbolizer::new("#ffffff", 3.0).opacity(0.5))?
        .add_line_symbolizer(LineSymbolizer::new("#804040", 1.2).dasharray("2,2"))?
        .add_rule(RulePredicate::filter("[highway] = 'footway'"))?
        .add_line_symbolizer(LineSymbolizer::new("#ffffff", 3.0).opacity(0.5))?
        .add_line_symbolizer(LineSymbolizer::new("#804040", 1.2).dasharray("3,1"))?
        .add_rule(RulePredicate::filter("[highway] = 'track'"))?
        .add_line_symbolizer(LineSymbolizer::new("#ffffff", 3.0).opacity(0.5))?
        .do_in_style(|style| {
            // One rule per track grade, dashing heavier as quality drops.
            for (i, dasharray) in TRACK_GRADE_DASHES.iter().enumerate() {
                let tracktype = if i == 5 {
                    String::from("null")
                } else {
                    format!("'grade{}'", i + 1)
                };
                let mut line = LineSymbolizer::new("#804040", 1.2);
                if let Some(dasharray) = dasharray {
                    line = line.dasharray(*dasharray);
                }
                style
                    .add_rule(RulePredicate::filter(format!(
                        "[highway] = 'track' and [tracktype] = {tracktype}"
                    )))
                    .add_line_symbolizer(line)?;
            }
            Ok(())
        })?
        .add_style("buildings")?
        .add_rule(RulePredicate::all())?
        .add_polygon_symbolizer(PolygonSymbolizer::new("#404040"))?
        .add_style("hillshade")?
        .add_rule(RulePredicate::all())?
        .add_raster_symbolizer(
            RasterSymbolizer::new()
                .opacity(0.5)
                .comp_op("multiply")
                .scaling(ScalingMethod::Bilinear),
        )?
        .add_style("peaks")?
        .add_rule(RulePredicate::filter("[natural] = 'peak'"))?
        .add_markers_symbolizer(
            MarkersSymbolizer::new("style/peak.svg")
                .size(6.0, 6.0)
                .fill("#000000"),
        )?
        .add_text_symbolizer(
            TextSymbolizer::new("DejaVu Sans Book", "[name] + '\n' + [ele]")
                .size(10.0)
                .fill("black")
                .halo("white", 1.0)
                .dy(-8.0),
        )?
        .add_rule(RulePredicate::filter("not ([place] = null)"))?
        .add_text_symbolizer(
            TextSymbolizer::new("DejaVu Sans Book", "[name]")
                .size(20.0)
                .fill("black")
                .halo("white", 1.0)
                .opacity(0.5),
        )?
        .add_style("hiking")?
        .do_in_style(|style| route_overlay().generate_into(style))?
        .add_style_with("contours", StyleOptions::opacity(0.33))?
        .add_rule(
            RulePredicate::filter("([height] % 100 = 0) and ([height] != 0)").max_zoom(13),
        )?
        .add_line_symbolizer(LineSymbolizer::new("#000000", 0.3))?
        .add_rule(RulePredicate::filter("([height] % 10 = 0) and ([height] != 0)").max_zoom(14))?
        .add_line_symbolizer(LineSymbolizer::new("#000000", 0.2))?
        .add_rule(
            RulePredicate::filter("([height] % 20 = 0) and ([height] != 0)")
                .min_zoom(13)
                .max_zoom(13),
        )?
        .add_line_symbolizer(LineSymbolizer::new("#000000", 0.2))?
        .add_rule(
            RulePredicate::filter("([height] % 50 = 0) and ([height] != 0)")
                .min_zoom(12)
                .max_zoom(12),
        )?
        .add_line_symbolizer(LineSymbolizer::new("#000000", 0.2))?
        .add_sql_layer(
            "landcover",
            "Landcover",
            "select \"natural\", landuse, way from planet_osm_polygon where landuse in \
             ('forest', 'farmland', 'wood', 'meadow') or \"natural\" in ('scrub', 'wood', 'heath')",
        )
        .add_sql_layer(
            "landcover",
            "Water-area",
            "select \"natural\", landuse, way from planet_osm_polygon where \"natural\" in ('water')",
        )
        .add_sql_layer(
            "landcover",
            "Water-line",
            "select \"waterway\", way from planet_osm_line where \"waterway\" in \
             ('stream', 'river', 'ditch', 'drain')",
        )
        .add_sql_layer(
            "tracks",
            "tracks",
            "select way, highway, tracktype from planet_osm_line where \"highway\" in \
             ('track', 'service', 'path', 'trunk', 'motorway', 'residential', 'primary', \
             'secondary', 'tertiary', 'unclassified', 'footway', 'construction')",
        )
        .add_sql_layer(
            "buildings",
            "buildings",
            "select way from planet_osm_polygon where building is not null or building <> 'no'",
        )
        .add_sql_layer("contours", "contours", "select height, way from contour")
        .add_file_layer(
            "hillshade",
            "hillshade",
            FileSource::gdal("hgt/N48E020_warped.tif"),
        )
        .add_sql_layer(
            "hiking",
            "hiking",
            "select geometry, concat('/', string_agg(\"osmc:symbol\", '/')) as osmc_symbol \
             from import.osm_hiking_members join import.osm_hiking using(osm_id) \
             group by member, geometry",
        )
        .add_sql_layer(
            "peaks",
            "peaks",
            "select name, ele, \"natural\", place, way from planet_osm_point \
             where \"natural\" in ('peak') or \"place\" <> 'locality'",
        )
        .document()
}

/// Serialized form of the hiking map, ready for the render context pool.
pub fn hiking_map_xml(config: &ServiceConfig) -> Result<String, BuildError> {
    Ok(hiking_map_document(config)?.to_string())
}

fn route_overlay() -> OverlaySpec {
    OverlaySpec {
        attribute: String::from("osmc_symbol"),
        flags: ROUTE_FLAGS.iter().map(|f| (*f).to_owned()).collect(),
        base_offset: 4.0,
        spacing: 2.0,
        stroke_width: 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builds_and_validates() {
        let document = hiking_map_document(&ServiceConfig::default()).expect("stylesheet builds");
        let names: Vec<&str> = document.styles.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            vec![
                "Landcover",
                "Water-area",
                "Water-line",
                "tracks",
                "buildings",
                "hillshade",
                "peaks",
                "hiking",
                "contours",
            ],
            names
        );
        assert_eq!(9, document.layers.len());
    }

    #[test]
    fn test_track_style_includes_generated_grade_rules() {
        let document = hiking_map_document(&ServiceConfig::default()).unwrap();
        let tracks = &document.styles[3];
        // Four hand-written rules plus one generated rule per grade entry.
        assert_eq!(4 + TRACK_GRADE_DASHES.len(), tracks.rules.len());
        let last = tracks.rules.last().unwrap();
        assert_eq!(
            Some("[highway] = 'track' and [tracktype] = null"),
            last.filter.as_deref()
        );
    }

    #[test]
    fn test_route_overlay_rule_count() {
        let document = hiking_map_document(&ServiceConfig::default()).unwrap();
        let hiking = &document.styles[7];
        // Flag i contributes i + 1 popcount classes: 1 + 2 + 3 + 4.
        assert_eq!(10, hiking.rules.len());
    }

    #[test]
    fn test_contour_opacity() {
        let document = hiking_map_document(&ServiceConfig::default()).unwrap();
        let contours = document.styles.last().unwrap();
        assert_eq!(Some(0.33), contours.opacity);
        assert_eq!(4, contours.rules.len());
    }

    #[test]
    fn test_serialization_round_is_byte_identical() {
        let config = ServiceConfig::default();
        assert_eq!(
            hiking_map_xml(&config).unwrap(),
            hiking_map_xml(&config).unwrap()
        );
    }

    #[test]
    fn test_xml_mentions_every_layer_source() {
        let xml = hiking_map_xml(&ServiceConfig::default()).unwrap();
        assert!(xml.contains("planet_osm_polygon"));
        assert!(xml.contains("planet_osm_line"));
        assert!(xml.contains("planet_osm_point"));
        assert!(xml.contains("from contour"));
        assert!(xml.contains("hgt/N48E020_warped.tif"));
        assert!(xml.contains("osm_hiking_members"));
    }
}
