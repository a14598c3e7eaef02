//! In-memory model of a cartographic style document.
//!
//! A [`Document`] owns named styles (ordered rules with filter and zoom
//! predicates plus typed symbolizers) and layers binding those styles to
//! datasources. It is assembled once at startup by
//! [`builder::StyleBuilder`], validated, serialized through its
//! [`std::fmt::Display`] impl into the engine's XML styling document, and
//! never mutated afterwards.
//!
//! Filter and label expressions are opaque strings: they are escaped into
//! the output verbatim and never parsed or reinterpreted here.

pub mod builder;
pub mod overlay;

use std::fmt;
use std::path::PathBuf;

use crate::config::{DatastoreSettings, MapSettings};
use crate::error::BuildError;

/// Scale denominator of zoom level 0 on the standard OSM ladder.
const SCALE_DENOM_Z0: f64 = 559_082_264.028;

/// Scale denominator at a zoom level; halves with every level.
fn scale_denominator(zoom: u8) -> f64 {
    SCALE_DENOM_Z0 / 2f64.powi(i32::from(zoom))
}

/// Root of the style document tree.
#[derive(Debug, Clone)]
pub struct Document {
    pub map: MapSettings,
    pub datastore: DatastoreSettings,
    pub styles: Vec<Style>,
    pub layers: Vec<Layer>,
}

impl Document {
    /// Checks that every layer's style reference resolves.
    pub fn validate(&self) -> Result<(), BuildError> {
        for layer in &self.layers {
            if !self.styles.iter().any(|s| s.name == layer.style_name) {
                return Err(BuildError::UnresolvedStyle {
                    layer: layer.name.clone(),
                    style: layer.style_name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A named, ordered collection of rules, with optional whole-style opacity.
#[derive(Debug, Clone)]
pub struct Style {
    pub name: String,
    pub opacity: Option<f64>,
    pub rules: Vec<Rule>,
}

/// A conditional set of drawing instructions.
///
/// A rule with no filter matches every feature routed to its style. Zoom
/// bounds are inclusive; an absent bound is unbounded.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub filter: Option<String>,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub symbolizers: Vec<Symbolizer>,
}

/// One typed drawing instruction. Order within a rule is paint order:
/// later symbolizers paint over earlier ones.
#[derive(Debug, Clone)]
pub enum Symbolizer {
    Line(LineSymbolizer),
    Polygon(PolygonSymbolizer),
    Raster(RasterSymbolizer),
    Markers(MarkersSymbolizer),
    Text(TextSymbolizer),
}

/// Line join styles understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    fn as_str(self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// Raster resampling modes understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMethod {
    Near,
    Bilinear,
    Bicubic,
}

impl ScalingMethod {
    fn as_str(self) -> &'static str {
        match self {
            ScalingMethod::Near => "near",
            ScalingMethod::Bilinear => "bilinear",
            ScalingMethod::Bicubic => "bicubic",
        }
    }
}

/// Stroked line drawing. Unset attributes take engine defaults.
#[derive(Debug, Clone, Default)]
pub struct LineSymbolizer {
    pub stroke: Option<String>,
    pub stroke_width: Option<f64>,
    pub stroke_opacity: Option<f64>,
    pub stroke_dasharray: Option<String>,
    pub stroke_linejoin: Option<LineJoin>,
    /// Perpendicular offset from the geometry, in pixels.
    pub offset: Option<f64>,
}

impl LineSymbolizer {
    pub fn new(stroke: impl Into<String>, width: f64) -> LineSymbolizer {
        LineSymbolizer {
            stroke: Some(stroke.into()),
            stroke_width: Some(width),
            ..LineSymbolizer::default()
        }
    }

    pub fn opacity(mut self, opacity: f64) -> LineSymbolizer {
        self.stroke_opacity = Some(opacity);
        self
    }

    pub fn dasharray(mut self, dasharray: impl Into<String>) -> LineSymbolizer {
        self.stroke_dasharray = Some(dasharray.into());
        self
    }

    pub fn linejoin(mut self, join: LineJoin) -> LineSymbolizer {
        self.stroke_linejoin = Some(join);
        self
    }

    pub fn offset(mut self, offset: f64) -> LineSymbolizer {
        self.offset = Some(offset);
        self
    }
}

/// Filled area drawing with an optional border stroke.
#[derive(Debug, Clone)]
pub struct PolygonSymbolizer {
    pub fill: String,
    pub fill_opacity: Option<f64>,
    pub border: Option<Stroke>,
}

impl PolygonSymbolizer {
    pub fn new(fill: impl Into<String>) -> PolygonSymbolizer {
        PolygonSymbolizer {
            fill: fill.into(),
            fill_opacity: None,
            border: None,
        }
    }

    /// Fill plus a same-color hairline border, hiding seams between
    /// adjacent polygons.
    pub fn bordered(fill: impl Into<String>) -> PolygonSymbolizer {
        let fill = fill.into();
        PolygonSymbolizer {
            border: Some(Stroke {
                color: fill.clone(),
                width: 1.0,
            }),
            fill,
            fill_opacity: None,
        }
    }

    pub fn opacity(mut self, opacity: f64) -> PolygonSymbolizer {
        self.fill_opacity = Some(opacity);
        self
    }

    pub fn border(mut self, color: impl Into<String>, width: f64) -> PolygonSymbolizer {
        self.border = Some(Stroke {
            color: color.into(),
            width,
        });
        self
    }
}

/// Border stroke of a polygon symbolizer.
#[derive(Debug, Clone)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

/// Raster compositing. Unset attributes take engine defaults.
#[derive(Debug, Clone, Default)]
pub struct RasterSymbolizer {
    pub opacity: Option<f64>,
    /// Composite operation name, passed through to the engine.
    pub comp_op: Option<String>,
    pub scaling: Option<ScalingMethod>,
}

impl RasterSymbolizer {
    pub fn new() -> RasterSymbolizer {
        RasterSymbolizer::default()
    }

    pub fn opacity(mut self, opacity: f64) -> RasterSymbolizer {
        self.opacity = Some(opacity);
        self
    }

    pub fn comp_op(mut self, comp_op: impl Into<String>) -> RasterSymbolizer {
        self.comp_op = Some(comp_op.into());
        self
    }

    pub fn scaling(mut self, scaling: ScalingMethod) -> RasterSymbolizer {
        self.scaling = Some(scaling);
        self
    }
}

/// Point marker drawing from an icon file.
#[derive(Debug, Clone)]
pub struct MarkersSymbolizer {
    pub file: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub fill: Option<String>,
}

impl MarkersSymbolizer {
    pub fn new(file: impl Into<String>) -> MarkersSymbolizer {
        MarkersSymbolizer {
            file: file.into(),
            width: None,
            height: None,
            fill: None,
        }
    }

    pub fn size(mut self, width: f64, height: f64) -> MarkersSymbolizer {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn fill(mut self, fill: impl Into<String>) -> MarkersSymbolizer {
        self.fill = Some(fill.into());
        self
    }
}

/// Attribute-derived text label drawing.
#[derive(Debug, Clone)]
pub struct TextSymbolizer {
    /// Label expression over feature attributes, passed through verbatim.
    pub label: String,
    pub face_name: String,
    pub size: Option<f64>,
    pub fill: Option<String>,
    pub halo_fill: Option<String>,
    pub halo_radius: Option<f64>,
    /// Vertical offset in pixels; negative moves the label up.
    pub dy: Option<f64>,
    pub opacity: Option<f64>,
}

impl TextSymbolizer {
    pub fn new(face_name: impl Into<String>, label: impl Into<String>) -> TextSymbolizer {
        TextSymbolizer {
            label: label.into(),
            face_name: face_name.into(),
            size: None,
            fill: None,
            halo_fill: None,
            halo_radius: None,
            dy: None,
            opacity: None,
        }
    }

    pub fn size(mut self, size: f64) -> TextSymbolizer {
        self.size = Some(size);
        self
    }

    pub fn fill(mut self, fill: impl Into<String>) -> TextSymbolizer {
        self.fill = Some(fill.into());
        self
    }

    pub fn halo(mut self, fill: impl Into<String>, radius: f64) -> TextSymbolizer {
        self.halo_fill = Some(fill.into());
        self.halo_radius = Some(radius);
        self
    }

    pub fn dy(mut self, dy: f64) -> TextSymbolizer {
        self.dy = Some(dy);
        self
    }

    pub fn opacity(mut self, opacity: f64) -> TextSymbolizer {
        self.opacity = Some(opacity);
        self
    }
}

/// Binding of a datasource to a style.
///
/// Layer names need not be unique; several layers may feed different styles
/// from the same logical source.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub style_name: String,
    pub source: LayerSource,
}

/// Where a layer's features come from.
#[derive(Debug, Clone)]
pub enum LayerSource {
    /// Declarative query against the document-level datastore.
    Sql { query: String },
    /// File-backed raster source.
    File(FileSource),
}

/// A file-backed datasource, e.g. a GDAL raster.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub source_type: String,
    pub file: PathBuf,
}

impl FileSource {
    pub fn gdal(file: impl Into<PathBuf>) -> FileSource {
        FileSource {
            source_type: String::from("gdal"),
            file: file.into(),
        }
    }
}

/// Escapes a value for use in XML attribute or text content.
fn esc(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Document {
    /// Serializes the document into the engine's XML styling format.
    ///
    /// Deterministic: the same document always yields byte-identical text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
        writeln!(
            f,
            r#"<Map background-color="{}" srs="{}" buffer-size="{}">"#,
            esc(&self.map.background_color),
            esc(&self.map.srs),
            self.map.buffer_size
        )?;
        for style in &self.styles {
            style.write_xml(f)?;
        }
        for layer in &self.layers {
            layer.write_xml(f, &self.map, &self.datastore)?;
        }
        writeln!(f, "</Map>")
    }
}

impl Style {
    fn write_xml(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"  <Style name="{}""#, esc(&self.name))?;
        if let Some(opacity) = self.opacity {
            write!(f, r#" opacity="{opacity}""#)?;
        }
        writeln!(f, ">")?;
        for rule in &self.rules {
            rule.write_xml(f)?;
        }
        writeln!(f, "  </Style>")
    }
}

impl Rule {
    fn write_xml(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    <Rule>")?;
        if let Some(filter) = &self.filter {
            writeln!(f, "      <Filter>{}</Filter>", esc(filter))?;
        }
        if let Some(min_zoom) = self.min_zoom {
            // Inclusive: the denominator one level up excludes min_zoom - 1
            // under the engine's strict upper bound.
            writeln!(
                f,
                "      <MaxScaleDenominator>{}</MaxScaleDenominator>",
                scale_denominator(min_zoom) * 2.0
            )?;
        }
        if let Some(max_zoom) = self.max_zoom {
            writeln!(
                f,
                "      <MinScaleDenominator>{}</MinScaleDenominator>",
                scale_denominator(max_zoom)
            )?;
        }
        for symbolizer in &self.symbolizers {
            symbolizer.write_xml(f)?;
        }
        writeln!(f, "    </Rule>")
    }
}

/// Writes one optional attribute, skipping unset values so the engine
/// applies its own defaults.
fn attr(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<String>) -> fmt::Result {
    match value {
        Some(value) => write!(f, r#" {name}="{}""#, esc(value)),
        None => Ok(()),
    }
}

fn num_attr(f: &mut fmt::Formatter<'_>, name: &str, value: &Option<f64>) -> fmt::Result {
    match value {
        Some(value) => write!(f, r#" {name}="{value}""#),
        None => Ok(()),
    }
}

impl Symbolizer {
    fn write_xml(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbolizer::Line(line) => line.write_xml(f, "      "),
            Symbolizer::Polygon(polygon) => {
                write!(f, r#"      <PolygonSymbolizer fill="{}""#, esc(&polygon.fill))?;
                num_attr(f, "fill-opacity", &polygon.fill_opacity)?;
                writeln!(f, "/>")?;
                match &polygon.border {
                    Some(border) => writeln!(
                        f,
                        r#"      <LineSymbolizer stroke="{}" stroke-width="{}"/>"#,
                        esc(&border.color),
                        border.width
                    ),
                    None => Ok(()),
                }
            }
            Symbolizer::Raster(raster) => {
                write!(f, "      <RasterSymbolizer")?;
                num_attr(f, "opacity", &raster.opacity)?;
                attr(f, "comp-op", &raster.comp_op)?;
                if let Some(scaling) = raster.scaling {
                    write!(f, r#" scaling="{}""#, scaling.as_str())?;
                }
                writeln!(f, "/>")
            }
            Symbolizer::Markers(markers) => {
                write!(f, r#"      <MarkersSymbolizer file="{}""#, esc(&markers.file))?;
                num_attr(f, "width", &markers.width)?;
                num_attr(f, "height", &markers.height)?;
                attr(f, "fill", &markers.fill)?;
                writeln!(f, "/>")
            }
            Symbolizer::Text(text) => {
                write!(f, r#"      <TextSymbolizer face-name="{}""#, esc(&text.face_name))?;
                num_attr(f, "size", &text.size)?;
                attr(f, "fill", &text.fill)?;
                attr(f, "halo-fill", &text.halo_fill)?;
                num_attr(f, "halo-radius", &text.halo_radius)?;
                num_attr(f, "dy", &text.dy)?;
                num_attr(f, "opacity", &text.opacity)?;
                writeln!(f, ">{}</TextSymbolizer>", esc(&text.label))
            }
        }
    }
}

impl LineSymbolizer {
    fn write_xml(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        write!(f, "{indent}<LineSymbolizer")?;
        attr(f, "stroke", &self.stroke)?;
        num_attr(f, "stroke-width", &self.stroke_width)?;
        num_attr(f, "stroke-opacity", &self.stroke_opacity)?;
        attr(f, "stroke-dasharray", &self.stroke_dasharray)?;
        if let Some(join) = self.stroke_linejoin {
            write!(f, r#" stroke-linejoin="{}""#, join.as_str())?;
        }
        num_attr(f, "offset", &self.offset)?;
        writeln!(f, "/>")
    }
}

impl Layer {
    fn write_xml(
        &self,
        f: &mut fmt::Formatter<'_>,
        map: &MapSettings,
        datastore: &DatastoreSettings,
    ) -> fmt::Result {
        writeln!(
            f,
            r#"  <Layer name="{}" srs="{}">"#,
            esc(&self.name),
            esc(&map.srs)
        )?;
        writeln!(f, "    <StyleName>{}</StyleName>", esc(&self.style_name))?;
        writeln!(f, "    <Datasource>")?;
        match &self.source {
            LayerSource::Sql { query } => {
                param(f, "type", &datastore.kind)?;
                param(f, "host", &datastore.host)?;
                param(f, "port", &datastore.port.to_string())?;
                param(f, "user", &datastore.user)?;
                param(f, "password", &datastore.password)?;
                param(f, "dbname", &datastore.dbname)?;
                param(f, "table", &format!("({query}) as data"))?;
            }
            LayerSource::File(source) => {
                param(f, "type", &source.source_type)?;
                param(f, "file", &source.file.display().to_string())?;
            }
        }
        writeln!(f, "    </Datasource>")?;
        writeln!(f, "  </Layer>")
    }
}

fn param(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    writeln!(
        f,
        r#"      <Parameter name="{name}">{}</Parameter>"#,
        esc(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_document() -> Document {
        Document {
            map: MapSettings::default(),
            datastore: DatastoreSettings::default(),
            styles: Vec::new(),
            layers: Vec::new(),
        }
    }

    fn water_document() -> Document {
        let mut doc = empty_document();
        doc.styles.push(Style {
            name: String::from("Water-line"),
            opacity: None,
            rules: vec![Rule {
                filter: Some(String::from("[waterway] <> 'river'")),
                min_zoom: None,
                max_zoom: None,
                symbolizers: vec![Symbolizer::Line(LineSymbolizer::new("#8080ff", 0.2))],
            }],
        });
        doc.layers.push(Layer {
            name: String::from("water"),
            style_name: String::from("Water-line"),
            source: LayerSource::Sql {
                query: String::from("select way from planet_osm_line"),
            },
        });
        doc
    }

    #[test]
    fn test_serialization_is_deterministic() {
        assert_eq!(water_document().to_string(), water_document().to_string());
    }

    #[test]
    fn test_filter_expression_escaped_verbatim() {
        let xml = water_document().to_string();
        assert!(xml.contains("<Filter>[waterway] &lt;&gt; &apos;river&apos;</Filter>"));
    }

    #[test]
    fn test_sql_layer_carries_datastore_parameters() {
        let xml = water_document().to_string();
        assert!(xml.contains(r#"<Parameter name="type">postgis</Parameter>"#));
        assert!(xml.contains(r#"<Parameter name="port">5432</Parameter>"#));
        assert!(xml.contains(
            r#"<Parameter name="table">(select way from planet_osm_line) as data</Parameter>"#
        ));
        assert!(xml.contains("<StyleName>Water-line</StyleName>"));
    }

    #[test]
    fn test_style_opacity_attribute() {
        let mut doc = empty_document();
        doc.styles.push(Style {
            name: String::from("contours"),
            opacity: Some(0.33),
            rules: Vec::new(),
        });
        assert!(doc.to_string().contains(r#"<Style name="contours" opacity="0.33">"#));
    }

    #[test]
    fn test_zoom_bounds_map_to_scale_denominators() {
        let mut doc = empty_document();
        doc.styles.push(Style {
            name: String::from("contours"),
            opacity: None,
            rules: vec![Rule {
                filter: None,
                min_zoom: Some(13),
                max_zoom: Some(13),
                symbolizers: Vec::new(),
            }],
        });
        let xml = doc.to_string();
        let max = scale_denominator(13) * 2.0;
        let min = scale_denominator(13);
        assert!(xml.contains(&format!("<MaxScaleDenominator>{max}</MaxScaleDenominator>")));
        assert!(xml.contains(&format!("<MinScaleDenominator>{min}</MinScaleDenominator>")));
    }

    #[test]
    fn test_bordered_polygon_paints_fill_then_outline() {
        let mut doc = empty_document();
        doc.styles.push(Style {
            name: String::from("Landcover"),
            opacity: None,
            rules: vec![Rule {
                symbolizers: vec![Symbolizer::Polygon(PolygonSymbolizer::bordered("#8CCF8C"))],
                ..Rule::default()
            }],
        });
        let xml = doc.to_string();
        let fill = xml.find(r##"<PolygonSymbolizer fill="#8CCF8C"/>"##);
        let outline = xml.find(r##"<LineSymbolizer stroke="#8CCF8C" stroke-width="1"/>"##);
        assert!(fill.is_some());
        assert!(outline.is_some());
        assert!(fill < outline);
    }

    #[test]
    fn test_file_layer_datasource() {
        let mut doc = empty_document();
        doc.styles.push(Style {
            name: String::from("hillshade"),
            opacity: None,
            rules: Vec::new(),
        });
        doc.layers.push(Layer {
            name: String::from("hillshade"),
            style_name: String::from("hillshade"),
            source: LayerSource::File(FileSource::gdal("hgt/N48E020_warped.tif")),
        });
        let xml = doc.to_string();
        assert!(xml.contains(r#"<Parameter name="type">gdal</Parameter>"#));
        assert!(xml.contains(r#"<Parameter name="file">hgt/N48E020_warped.tif</Parameter>"#));
    }

    #[test]
    fn test_validate_rejects_unresolved_style() {
        let mut doc = empty_document();
        doc.layers.push(Layer {
            name: String::from("orphan"),
            style_name: String::from("missing"),
            source: LayerSource::Sql {
                query: String::from("select 1"),
            },
        });
        match doc.validate() {
            Err(BuildError::UnresolvedStyle { layer, style }) => {
                assert_eq!("orphan", layer);
                assert_eq!("missing", style);
            }
            other => panic!("expected UnresolvedStyle, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_accepts_duplicate_layer_names() {
        // Several layers may reuse one name against different styles; only
        // the style reference has to resolve.
        let mut doc = water_document();
        doc.layers.push(Layer {
            name: String::from("water"),
            style_name: String::from("Water-line"),
            source: LayerSource::Sql {
                query: String::from("select way from planet_osm_polygon"),
            },
        });
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_unset_attributes_are_omitted() {
        let xml = water_document().to_string();
        assert!(xml.contains(r##"<LineSymbolizer stroke="#8080ff" stroke-width="0.2"/>"##));
        assert!(!xml.contains("stroke-opacity"));
        assert!(!xml.contains("stroke-dasharray"));
    }
}
