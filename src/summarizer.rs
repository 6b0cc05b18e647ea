//! Summarizer family (spec §2: matches, forwardindex, accumulate-near,
//! accumulate-variable, structure-header), pluggable over the proximity
//! context. Expressed as a tagged-variant enum with a dispatch match, per
//! spec §9's guidance for polymorphism without deep inheritance.

use crate::proximity::ProximityWeightingContext;
use crate::structure::StructureTable;
use crate::types::IndexRange;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryElement {
    pub name: String,
    pub value: String,
    pub weight: f64,
}

/// Everything a summarizer needs to build its elements for one document:
/// the already-resolved forward-index tokens in position order, the
/// feature names in query order, and (optionally) a proximity context and
/// structure table.
pub struct SummaryContext<'a> {
    pub docno: u64,
    pub forward_tokens: &'a [(u32, String)],
    pub feature_names: &'a [String],
    pub proximity: Option<&'a ProximityWeightingContext>,
    pub structures: Option<&'a StructureTable>,
    pub match_positions: &'a [(usize, u32)],
}

pub enum Summarizer {
    /// Emits one element per literal feature match, up to `max_matches`.
    Matches { max_matches: usize },
    /// Concatenates the forward-index tokens inside `field` into one
    /// summary element.
    ForwardIndex { name: String, field: IndexRange },
    /// Emits the accumulated proximity ff for each feature whose
    /// `ff_prox` is above `min_weight`.
    AccumulateNear { min_weight: f64 },
    /// Sums the weight of all matches per feature name into one element
    /// per feature (a variable accumulator, independent of proximity).
    AccumulateVariable,
    /// Emits the forward-index text of the header field of the enclosing
    /// structure at each match position.
    StructureHeader { structure_name: String },
}

impl Summarizer {
    pub fn build(&self, ctx: &SummaryContext) -> Vec<SummaryElement> {
        match self {
            Summarizer::Matches { max_matches } => Self::matches(ctx, *max_matches),
            Summarizer::ForwardIndex { name, field } => Self::forward_index(ctx, name, *field),
            Summarizer::AccumulateNear { min_weight } => Self::accumulate_near(ctx, *min_weight),
            Summarizer::AccumulateVariable => Self::accumulate_variable(ctx),
            Summarizer::StructureHeader { structure_name } => Self::structure_header(ctx, structure_name),
        }
    }

    fn matches(ctx: &SummaryContext, max_matches: usize) -> Vec<SummaryElement> {
        ctx.match_positions
            .iter()
            .take(max_matches)
            .map(|(featidx, pos)| SummaryElement {
                name: "match".to_string(),
                value: format!("{}@{}", ctx.feature_names.get(*featidx).map(String::as_str).unwrap_or("?"), pos),
                weight: 1.0,
            })
            .collect()
    }

    fn forward_index(ctx: &SummaryContext, name: &str, field: IndexRange) -> Vec<SummaryElement> {
        let text: Vec<&str> = ctx
            .forward_tokens
            .iter()
            .filter(|(pos, _)| *pos >= field.start && *pos < field.end)
            .map(|(_, token)| token.as_str())
            .collect();
        if text.is_empty() {
            return Vec::new();
        }
        vec![SummaryElement { name: name.to_string(), value: text.join(" "), weight: 1.0 }]
    }

    fn accumulate_near(ctx: &SummaryContext, min_weight: f64) -> Vec<SummaryElement> {
        let Some(prox) = ctx.proximity else { return Vec::new() };
        (0..prox.nof_features())
            .filter_map(|featidx| {
                let weight = prox.ff_prox(featidx);
                if weight < min_weight {
                    return None;
                }
                Some(SummaryElement {
                    name: "near".to_string(),
                    value: ctx.feature_names.get(featidx).cloned().unwrap_or_default(),
                    weight,
                })
            })
            .collect()
    }

    fn accumulate_variable(ctx: &SummaryContext) -> Vec<SummaryElement> {
        let mut totals: std::collections::BTreeMap<usize, f64> = std::collections::BTreeMap::new();
        for (featidx, _) in ctx.match_positions {
            *totals.entry(*featidx).or_default() += 1.0;
        }
        totals
            .into_iter()
            .map(|(featidx, weight)| SummaryElement {
                name: "variable".to_string(),
                value: ctx.feature_names.get(featidx).cloned().unwrap_or_default(),
                weight,
            })
            .collect()
    }

    fn structure_header(ctx: &SummaryContext, structure_name: &str) -> Vec<SummaryElement> {
        let Some(structures) = ctx.structures else { return Vec::new() };
        let mut seen_headers = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for (_, pos) in ctx.match_positions {
            if let Some(field) = structures.enclosing(structure_name, ctx.docno, *pos) {
                if seen_headers.insert((field.header.start, field.header.end)) {
                    let text: Vec<&str> = ctx
                        .forward_tokens
                        .iter()
                        .filter(|(p, _)| *p >= field.header.start && *p < field.header.end)
                        .map(|(_, token)| token.as_str())
                        .collect();
                    if !text.is_empty() {
                        out.push(SummaryElement { name: "header".to_string(), value: text.join(" "), weight: 1.0 });
                    }
                }
            }
        }
        out
    }
}
