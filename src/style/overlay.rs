//! Combinatorial generation of stacked line overlays.
//!
//! Some feature attributes encode several independent boolean flags at
//! once, e.g. a composite route-marker attribute listing every marker color
//! a way carries. Drawing each flag as its own offset line, without two
//! flags ever painting at the same offset, needs one rule per combination
//! of "this flag plus some set of lower-indexed flags": a feature carrying
//! flags {a, b, c} must draw c offset past both a and b.
//!
//! For flag index `i` the generator enumerates all 2^i subsets of the
//! lower-indexed flags and buckets them by popcount. Each popcount class
//! becomes one rule: the flag's own presence test AND an OR over the
//! class's subsets, each subset an AND of positive or negated presence
//! tests. The line offset grows linearly with the popcount, so every
//! combination lands in a distinct, deterministic paint slot. Rules are
//! emitted in increasing flag index, then increasing popcount; that order
//! is what stacks the markers correctly.
//!
//! Rule count is O(K * 2^K); fine for the single-digit flag counts this is
//! meant for.

use std::collections::BTreeMap;

use crate::error::BuildError;
use crate::style::builder::{RulePredicate, StyleEditor};
use crate::style::{LineJoin, LineSymbolizer};

/// Declarative intent: draw each flag as a parallel offset line marker.
#[derive(Debug, Clone)]
pub struct OverlaySpec {
    /// Feature attribute holding the composite flag list.
    pub attribute: String,
    /// Flag markers in stacking order; each doubles as the stroke color.
    /// Lower indices paint closest to the base offset.
    pub flags: Vec<String>,
    /// Offset of the first marker from the geometry, in pixels.
    pub base_offset: f64,
    /// Offset added per already-present lower flag, in pixels.
    pub spacing: f64,
    pub stroke_width: f64,
}

impl OverlaySpec {
    /// Presence test for one flag within the composite attribute.
    ///
    /// A feature without the attribute matches nothing, which reads as
    /// "no flags": such features simply draw no overlay.
    fn presence(&self, flag: &str) -> String {
        format!("[{}].match('.*/{}:.*')", self.attribute, flag)
    }

    /// Appends the full rule set to a style, in stacking order.
    pub fn generate_into(&self, editor: &mut StyleEditor<'_>) -> Result<(), BuildError> {
        for (i, flag) in self.flags.iter().enumerate() {
            // All subsets of the lower-indexed flags, bucketed by how many
            // flags each contains. BTreeMap iteration gives increasing
            // popcount; subsets within a bucket stay in numeric order.
            let mut classes: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
            for subset in 0u32..1 << i {
                classes.entry(subset.count_ones()).or_default().push(subset);
            }

            for (popcount, subsets) in &classes {
                let presence = self.presence(flag);
                // The first flag has no lower flags to discriminate on; its
                // single rule is the bare presence test.
                let branches: Vec<String> = if i == 0 {
                    Vec::new()
                } else {
                    subsets
                        .iter()
                        .map(|subset| {
                            (0..i)
                                .map(|j| {
                                    let test = self.presence(&self.flags[j]);
                                    // Flag j sits at bit i-1-j, most
                                    // significant bit first.
                                    if subset & (1 << (i - 1 - j)) != 0 {
                                        test
                                    } else {
                                        format!("not({test})")
                                    }
                                })
                                .collect::<Vec<String>>()
                                .join(" and ")
                        })
                        .collect()
                };

                let filter = if branches.is_empty() {
                    presence
                } else {
                    let ors: Vec<String> =
                        branches.into_iter().map(|b| format!("({b})")).collect();
                    format!("{} and ({})", presence, ors.join(" or "))
                };

                let offset = self.base_offset + f64::from(*popcount) * self.spacing;
                editor.add_rule(RulePredicate::filter(filter)).add_line_symbolizer(
                    LineSymbolizer::new(flag.clone(), self.stroke_width)
                        .linejoin(LineJoin::Round)
                        .offset(offset),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatastoreSettings, MapSettings};
    use crate::style::builder::StyleBuilder;
    use crate::style::{Document, Symbolizer};

    fn spec(flags: &[&str]) -> OverlaySpec {
        OverlaySpec {
            attribute: String::from("osmc_symbol"),
            flags: flags.iter().map(|f| (*f).to_owned()).collect(),
            base_offset: 4.0,
            spacing: 2.0,
            stroke_width: 2.0,
        }
    }

    fn generate(flags: &[&str]) -> Document {
        let spec = spec(flags);
        StyleBuilder::new(MapSettings::default(), DatastoreSettings::default())
            .add_style("hiking")
            .unwrap()
            .do_in_style(|style| spec.generate_into(style))
            .unwrap()
            .document()
            .unwrap()
    }

    fn offsets(document: &Document) -> Vec<f64> {
        document.styles[0]
            .rules
            .iter()
            .map(|rule| match &rule.symbolizers[..] {
                [Symbolizer::Line(line)] => line.offset.expect("overlay line has an offset"),
                other => panic!("expected exactly one line symbolizer, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_two_flags_produce_three_rules() {
        let document = generate(&["red", "blue"]);
        // Flag 0: one unconditional rule. Flag 1: one rule per popcount
        // class of {flag 0 absent, flag 0 present}.
        assert_eq!(3, document.styles[0].rules.len());
        assert_eq!(vec![4.0, 4.0, 6.0], offsets(&document));
    }

    #[test]
    fn test_two_flag_filters() {
        let document = generate(&["red", "blue"]);
        let filters: Vec<&str> = document.styles[0]
            .rules
            .iter()
            .map(|r| r.filter.as_deref().expect("overlay rules are filtered"))
            .collect();
        assert_eq!(
            vec![
                "[osmc_symbol].match('.*/red:.*')",
                "[osmc_symbol].match('.*/blue:.*') and ((not([osmc_symbol].match('.*/red:.*'))))",
                "[osmc_symbol].match('.*/blue:.*') and (([osmc_symbol].match('.*/red:.*')))",
            ],
            filters
        );
    }

    #[test]
    fn test_rule_count_grows_by_popcount_classes() {
        // Flag i contributes i + 1 rules, one per popcount class.
        assert_eq!(1, generate(&["red"]).styles[0].rules.len());
        assert_eq!(3, generate(&["red", "blue"]).styles[0].rules.len());
        assert_eq!(6, generate(&["red", "blue", "green"]).styles[0].rules.len());
        assert_eq!(
            10,
            generate(&["red", "blue", "green", "yellow"]).styles[0].rules.len()
        );
    }

    #[test]
    fn test_offsets_are_distinct_per_popcount_within_a_flag() {
        let document = generate(&["red", "blue", "green", "yellow"]);
        // Per flag, one rule per popcount class; no two classes of the same
        // flag may share an offset.
        let mut index = 0;
        for flag in 0..4 {
            let classes = flag + 1;
            let slice = &offsets(&document)[index..index + classes];
            for (popcount, offset) in slice.iter().enumerate() {
                assert_eq!(4.0 + 2.0 * popcount as f64, *offset);
            }
            index += classes;
        }
    }

    #[test]
    fn test_third_flag_popcount_one_disjoins_both_single_subsets() {
        let document = generate(&["red", "blue", "green"]);
        // Rules: red; blue x2; green popcount 0, 1, 2.
        let rule = &document.styles[0].rules[4];
        let filter = rule.filter.as_deref().unwrap();
        assert!(filter.starts_with("[osmc_symbol].match('.*/green:.*') and ("));
        // Popcount 1 over {red, blue}: exactly one of the two present.
        assert!(filter.contains(
            "(not([osmc_symbol].match('.*/red:.*')) and [osmc_symbol].match('.*/blue:.*'))"
        ));
        assert!(filter.contains(
            "([osmc_symbol].match('.*/red:.*') and not([osmc_symbol].match('.*/blue:.*')))"
        ));
        assert!(filter.contains(" or "));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate(&["red", "blue", "green", "yellow"]).to_string();
        let b = generate(&["red", "blue", "green", "yellow"]).to_string();
        assert_eq!(a, b);
    }
}
