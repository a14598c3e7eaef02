//! Chainable construction of a style document.
//!
//! [`StyleBuilder`] is an explicit value that owns the document under
//! construction plus two cursors: the current style and, within it, the
//! current rule. Every operation threads the builder by value, so there is
//! no hidden mutable state, and [`StyleBuilder::stringify`] consumes the
//! builder, making finalization terminal by move.
//!
//! Cursors nest strictly: symbolizers always land in the most recently
//! added rule of the most recently added style. Programmatic rule
//! generation goes through [`StyleBuilder::do_in_style`], which hands out a
//! [`StyleEditor`] that can only append to the current style.

use tracing::info;

use crate::config::{DatastoreSettings, MapSettings};
use crate::error::BuildError;
use crate::style::{
    Document, FileSource, Layer, LayerSource, LineSymbolizer, MarkersSymbolizer,
    PolygonSymbolizer, RasterSymbolizer, Rule, Style, Symbolizer, TextSymbolizer,
};

/// Whole-style options for [`StyleBuilder::add_style_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleOptions {
    pub opacity: Option<f64>,
}

impl StyleOptions {
    pub fn opacity(opacity: f64) -> StyleOptions {
        StyleOptions {
            opacity: Some(opacity),
        }
    }
}

/// Matching conditions for a rule: an opaque filter expression and an
/// inclusive zoom range. The empty predicate matches every feature.
#[derive(Debug, Clone, Default)]
pub struct RulePredicate {
    pub filter: Option<String>,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
}

impl RulePredicate {
    /// Matches every feature routed to the style.
    pub fn all() -> RulePredicate {
        RulePredicate::default()
    }

    pub fn filter(expr: impl Into<String>) -> RulePredicate {
        RulePredicate {
            filter: Some(expr.into()),
            ..RulePredicate::default()
        }
    }

    pub fn min_zoom(mut self, zoom: u8) -> RulePredicate {
        self.min_zoom = Some(zoom);
        self
    }

    pub fn max_zoom(mut self, zoom: u8) -> RulePredicate {
        self.max_zoom = Some(zoom);
        self
    }

    fn into_rule(self) -> Rule {
        Rule {
            filter: self.filter,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            symbolizers: Vec::new(),
        }
    }
}

/// Stateful, chainable constructor for a [`Document`].
#[derive(Debug)]
pub struct StyleBuilder {
    document: Document,
    current_style: Option<usize>,
    current_rule: Option<usize>,
}

impl StyleBuilder {
    pub fn new(map: MapSettings, datastore: DatastoreSettings) -> StyleBuilder {
        StyleBuilder {
            document: Document {
                map,
                datastore,
                styles: Vec::new(),
                layers: Vec::new(),
            },
            current_style: None,
            current_rule: None,
        }
    }

    /// Appends a new style and makes it current.
    pub fn add_style(self, name: &str) -> Result<StyleBuilder, BuildError> {
        self.add_style_with(name, StyleOptions::default())
    }

    pub fn add_style_with(
        mut self,
        name: &str,
        options: StyleOptions,
    ) -> Result<StyleBuilder, BuildError> {
        if self.document.styles.iter().any(|s| s.name == name) {
            return Err(BuildError::DuplicateStyle(name.to_owned()));
        }
        self.document.styles.push(Style {
            name: name.to_owned(),
            opacity: options.opacity,
            rules: Vec::new(),
        });
        self.current_style = Some(self.document.styles.len() - 1);
        self.current_rule = None;
        Ok(self)
    }

    /// Appends a rule to the current style and makes it current.
    pub fn add_rule(mut self, predicate: RulePredicate) -> Result<StyleBuilder, BuildError> {
        let index = self.current_style.ok_or(BuildError::NoCurrentStyle)?;
        let style = &mut self.document.styles[index];
        style.rules.push(predicate.into_rule());
        self.current_rule = Some(style.rules.len() - 1);
        Ok(self)
    }

    fn push_symbolizer(mut self, symbolizer: Symbolizer) -> Result<StyleBuilder, BuildError> {
        let style = self.current_style.ok_or(BuildError::NoCurrentStyle)?;
        let rule = self.current_rule.ok_or(BuildError::NoCurrentRule)?;
        self.document.styles[style].rules[rule]
            .symbolizers
            .push(symbolizer);
        Ok(self)
    }

    pub fn add_line_symbolizer(self, line: LineSymbolizer) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Line(line))
    }

    pub fn add_polygon_symbolizer(
        self,
        polygon: PolygonSymbolizer,
    ) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Polygon(polygon))
    }

    /// Filled polygon with a same-color hairline border.
    pub fn add_bordered_polygon_symbolizer(self, fill: &str) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Polygon(PolygonSymbolizer::bordered(fill)))
    }

    pub fn add_raster_symbolizer(
        self,
        raster: RasterSymbolizer,
    ) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Raster(raster))
    }

    pub fn add_markers_symbolizer(
        self,
        markers: MarkersSymbolizer,
    ) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Markers(markers))
    }

    pub fn add_text_symbolizer(self, text: TextSymbolizer) -> Result<StyleBuilder, BuildError> {
        self.push_symbolizer(Symbolizer::Text(text))
    }

    /// Runs `f` against the current style for programmatic rule generation.
    ///
    /// The editor can only append rules and symbolizers to that style; the
    /// outer rule cursor is restored afterwards.
    pub fn do_in_style<F>(mut self, f: F) -> Result<StyleBuilder, BuildError>
    where
        F: FnOnce(&mut StyleEditor<'_>) -> Result<(), BuildError>,
    {
        let index = self.current_style.ok_or(BuildError::NoCurrentStyle)?;
        let mut editor = StyleEditor {
            style: &mut self.document.styles[index],
            current_rule: None,
        };
        f(&mut editor)?;
        Ok(self)
    }

    /// Appends a layer querying the document's datastore.
    pub fn add_sql_layer(mut self, name: &str, style_name: &str, query: &str) -> StyleBuilder {
        self.document.layers.push(Layer {
            name: name.to_owned(),
            style_name: style_name.to_owned(),
            source: LayerSource::Sql {
                query: query.to_owned(),
            },
        });
        self
    }

    /// Appends a layer backed by a file datasource.
    pub fn add_file_layer(
        mut self,
        name: &str,
        style_name: &str,
        source: FileSource,
    ) -> StyleBuilder {
        self.document.layers.push(Layer {
            name: name.to_owned(),
            style_name: style_name.to_owned(),
            source: LayerSource::File(source),
        });
        self
    }

    /// Finalizes the document, checking that every layer's style reference
    /// resolves.
    pub fn document(self) -> Result<Document, BuildError> {
        self.document.validate()?;
        info!(
            styles = self.document.styles.len(),
            layers = self.document.layers.len(),
            "style document finalized"
        );
        Ok(self.document)
    }

    /// Finalizes and serializes the document. Terminal: consumes the
    /// builder, so no further mutation is possible.
    pub fn stringify(self) -> Result<String, BuildError> {
        Ok(self.document()?.to_string())
    }
}

/// Capability-restricted handle over one style, handed out by
/// [`StyleBuilder::do_in_style`]. Appending is all it can do; it cannot
/// reach other styles or the layer list.
#[derive(Debug)]
pub struct StyleEditor<'a> {
    style: &'a mut Style,
    current_rule: Option<usize>,
}

impl StyleEditor<'_> {
    /// Appends a rule and makes it current.
    pub fn add_rule(&mut self, predicate: RulePredicate) -> &mut Self {
        self.style.rules.push(predicate.into_rule());
        self.current_rule = Some(self.style.rules.len() - 1);
        self
    }

    /// Appends a symbolizer to the current rule.
    pub fn add_symbolizer(&mut self, symbolizer: Symbolizer) -> Result<&mut Self, BuildError> {
        let rule = self.current_rule.ok_or(BuildError::NoCurrentRule)?;
        self.style.rules[rule].symbolizers.push(symbolizer);
        Ok(self)
    }

    pub fn add_line_symbolizer(&mut self, line: LineSymbolizer) -> Result<&mut Self, BuildError> {
        self.add_symbolizer(Symbolizer::Line(line))
    }
}
