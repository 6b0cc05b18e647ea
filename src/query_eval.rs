//! Query evaluator (spec §4.8): runs the priority-pass accumulator over
//! already-materialized selection iterators, applies restriction/exclusion
//! sets, scores accepted candidates with BM25pff, and inserts them into the
//! ranker. Parsing a query into a feature DAG is explicitly out of scope
//! here (spec §4.8 step 1: "given as input"); this module starts from
//! already-built posting iterator trees. Grounded in
//! `queryproc/weighting`/`queryproc/accumulator`'s pass-loop shape, as
//! described structurally in spec §4.8 (no single teacher analogue; the
//! pass/ranker loop follows the teacher's explicit-state, no-hidden-control
//! flow style used throughout `posting`).

use std::collections::{HashMap, HashSet};

use crate::errors::CoreResult;
use crate::posting::PostingIterator;
use crate::proximity::{ProximityConfig, ProximityWeightingContext};
use crate::ranker::{RankedResult, Ranker};
use crate::structure::StructureTable;
use crate::summarizer::{SummaryContext, SummaryElement, Summarizer};
use crate::types::IndexRange;
use crate::weighting::{Bm25Pff, FeatureStats};

/// One priority pass: a single posting iterator (typically a union over
/// that pass's selection features) yielding candidate docnos in ascending
/// order.
pub struct SelectionPass {
    pub iterator: Box<dyn PostingIterator>,
}

/// Per-query inputs the evaluator needs beyond the posting iterators
/// themselves: where to read document length and title extent from.
pub trait DocumentMetrics {
    fn doclen(&self, docno: u64) -> f64;
    fn title_end(&self, docno: u64) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationStats {
    pub nof_visited: u64,
    pub nof_ranked: u64,
    pub evaluation_pass: u32,
}

pub struct EvaluationResult {
    pub results: Vec<RankedResult>,
    pub stats: EvaluationStats,
    /// Each retained document's proximity context, captured during scoring
    /// (posting iterators are forward-only and can't be re-walked once
    /// ranking moves past them) and pruned to just the docnos the ranker
    /// actually kept. `summarize` reads match positions and ff_prox off of
    /// these rather than re-driving the iterators.
    pub proximity: HashMap<u64, ProximityWeightingContext>,
}

pub struct QueryEvaluator {
    weighter: Bm25Pff,
    proximity_config: ProximityConfig,
    field: IndexRange,
}

impl QueryEvaluator {
    pub fn new(weighter: Bm25Pff, proximity_config: ProximityConfig, field: IndexRange) -> Self {
        Self { weighter, proximity_config, field }
    }

    /// Runs the full pipeline: priority passes -> restrictions/exclusions ->
    /// BM25pff scoring -> ranker insertion.
    ///
    /// `weighting_features` supplies both the classical per-feature counts
    /// (via its own `skip_doc`/`frequency`) and the position stream
    /// [`ProximityWeightingContext::build`] walks; each is driven twice per
    /// candidate document, which is safe since every iterator resets its
    /// position cursor on `skip_doc`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        passes: &mut [SelectionPass],
        restrictions: &mut [Box<dyn PostingIterator>],
        exclusions: &mut [Box<dyn PostingIterator>],
        weighting_features: &mut [Box<dyn PostingIterator>],
        eos: &mut dyn PostingIterator,
        metrics: &dyn DocumentMetrics,
        first: usize,
        k: usize,
    ) -> CoreResult<EvaluationResult> {
        let mut ranker = Ranker::new(first, k);
        let mut stats = EvaluationStats::default();
        let mut visited: HashSet<u64> = HashSet::new();
        let mut proximity: HashMap<u64, ProximityWeightingContext> = HashMap::new();

        for (pass_idx, pass) in passes.iter_mut().enumerate() {
            let mut candidate = pass.iterator.skip_doc_candidate(1)?;
            while candidate != 0 {
                stats.nof_visited += 1;
                if visited.insert(candidate) {
                    let confirmed = pass.iterator.skip_doc(candidate)? == candidate;
                    if confirmed && self.passes_restrictions(restrictions, candidate)? && !self.excluded(exclusions, candidate)? {
                        let (score, prox) = self.score_candidate(weighting_features, eos, candidate, metrics)?;
                        ranker.insert(RankedResult { docno: candidate, score });
                        proximity.insert(candidate, prox);
                        stats.nof_ranked += 1;
                        stats.evaluation_pass = stats.evaluation_pass.max(pass_idx as u32 + 1);
                    }
                }
                if ranker.is_full() {
                    break;
                }
                candidate = pass.iterator.skip_doc_candidate(candidate + 1)?;
            }
        }

        let results = ranker.into_results();
        let kept: HashSet<u64> = results.iter().map(|r| r.docno).collect();
        proximity.retain(|docno, _| kept.contains(docno));
        Ok(EvaluationResult { results, stats, proximity })
    }

    /// Runs `summarizers` over every document retained in `result` (spec
    /// §2: "summarizers then visit each retained document to build summary
    /// elements from the forward index"), reusing the proximity context and
    /// match positions already captured during `evaluate`. Forward-index
    /// tokens are looked up asynchronously elsewhere; the caller supplies
    /// them pre-fetched so this stays synchronous like the rest of scoring.
    pub fn summarize(
        &self,
        result: &EvaluationResult,
        feature_names: &[String],
        forward_tokens: &HashMap<u64, Vec<(u32, String)>>,
        structures: Option<&StructureTable>,
        summarizers: &[Summarizer],
    ) -> HashMap<u64, Vec<SummaryElement>> {
        let empty_tokens: Vec<(u32, String)> = Vec::new();
        let mut out = HashMap::with_capacity(result.results.len());
        for ranked in &result.results {
            let proximity = result.proximity.get(&ranked.docno);
            let match_positions = proximity.map(ProximityWeightingContext::match_positions).unwrap_or_default();
            let tokens = forward_tokens.get(&ranked.docno).unwrap_or(&empty_tokens);
            let ctx = SummaryContext {
                docno: ranked.docno,
                forward_tokens: tokens,
                feature_names,
                proximity,
                structures,
                match_positions: &match_positions,
            };
            let elements = summarizers.iter().flat_map(|s| s.build(&ctx)).collect();
            out.insert(ranked.docno, elements);
        }
        out
    }

    fn passes_restrictions(&self, restrictions: &mut [Box<dyn PostingIterator>], docno: u64) -> CoreResult<bool> {
        for restriction in restrictions.iter_mut() {
            if restriction.skip_doc(docno)? != docno {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn excluded(&self, exclusions: &mut [Box<dyn PostingIterator>], docno: u64) -> CoreResult<bool> {
        for exclusion in exclusions.iter_mut() {
            if exclusion.skip_doc(docno)? == docno {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn score_candidate(
        &self,
        weighting_features: &mut [Box<dyn PostingIterator>],
        eos: &mut dyn PostingIterator,
        docno: u64,
        metrics: &dyn DocumentMetrics,
    ) -> CoreResult<(f64, ProximityWeightingContext)> {
        let mut features = Vec::with_capacity(weighting_features.len());
        for feature in weighting_features.iter_mut() {
            if feature.skip_doc(docno)? == docno {
                let first_pos = feature.skip_pos(self.field.start)?;
                features.push(FeatureStats {
                    df: feature.document_frequency(),
                    ff_classic: feature.frequency() as f64,
                    weight: 1.0,
                    first_pos,
                });
            } else {
                features.push(FeatureStats { df: feature.document_frequency(), ff_classic: 0.0, weight: 1.0, first_pos: 0 });
            }
        }

        // High-df features get a narrower proximity window (spec's
        // maxdf window-cardinality suppression): the node stream scans at
        // most the tightest cap any weighting feature's df demands, not the
        // full requested field.
        let requested_window = self.field.end.saturating_sub(self.field.start);
        let capped_window = weighting_features
            .iter()
            .map(|feature| self.weighter.window_cap_for_df(feature.document_frequency(), requested_window))
            .min()
            .unwrap_or(requested_window);
        let effective_field =
            IndexRange::new(self.field.start, self.field.start + capped_window).map_err(crate::errors::CoreError::external)?;

        let title_end = metrics.title_end(docno);
        let prox = ProximityWeightingContext::build(weighting_features, eos, docno, effective_field, title_end, self.proximity_config)?;
        let score = self.weighter.score(&features, metrics.doclen(docno), title_end, Some(&prox));
        Ok((score, prox))
    }
}

/// Combines per-shard result lists by interleaving in descending weight
/// (a plain stable sort over the concatenation achieves this), summing
/// nofRanked/nofVisited and keeping the highest evaluation pass reached by
/// any shard (spec §4.8's `QueryResult::merge`).
pub fn merge_shard_results(shards: Vec<EvaluationResult>, k: usize) -> EvaluationResult {
    let mut stats = EvaluationStats::default();
    let mut combined = Vec::new();
    let mut proximity = HashMap::new();
    for shard in shards {
        stats.nof_visited += shard.stats.nof_visited;
        stats.nof_ranked += shard.stats.nof_ranked;
        stats.evaluation_pass = stats.evaluation_pass.max(shard.stats.evaluation_pass);
        combined.extend(shard.results);
        proximity.extend(shard.proximity);
    }
    combined.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.docno.cmp(&b.docno)));
    combined.truncate(k);
    let kept: HashSet<u64> = combined.iter().map(|r| r.docno).collect();
    proximity.retain(|docno, _| kept.contains(docno));
    EvaluationResult { results: combined, stats, proximity }
}

/// Merges summary elements for the same document across shards, summing
/// weights for matching `(name, value)` pairs.
pub fn merge_summary_elements(elements: Vec<SummaryElement>) -> Vec<SummaryElement> {
    let mut merged: Vec<SummaryElement> = Vec::new();
    for element in elements {
        if let Some(existing) = merged.iter_mut().find(|e| e.name == element.name && e.value == element.value) {
            existing.weight += element.weight;
        } else {
            merged.push(element);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::leaf::LeafIterator;
    use crate::posting::test_support::leaf;
    use crate::posting::union::UnionIterator;
    use crate::types::{DocumentNumber, Position};
    use crate::weighting::Bm25PffConfig;

    struct FlatMetrics;
    impl DocumentMetrics for FlatMetrics {
        fn doclen(&self, _docno: u64) -> f64 {
            100.0
        }
        fn title_end(&self, _docno: u64) -> Option<u32> {
            None
        }
    }

    #[test]
    fn ranks_documents_matching_selection() {
        let union = UnionIterator::new(
            vec![Box::new(leaf("fox", &[(1, 5), (2, 5)])) as Box<dyn PostingIterator>],
            "fox".to_string(),
        );
        let mut passes = vec![SelectionPass { iterator: Box::new(union) }];
        let mut restrictions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut exclusions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut weighting_features: Vec<Box<dyn PostingIterator>> = vec![Box::new(leaf("fox", &[(1, 5), (2, 5)]))];
        let mut eos = leaf("eos", &[(1, 1000), (2, 1000)]);

        let weighter = Bm25Pff::new(Bm25PffConfig::default(), 10.0).unwrap();
        let evaluator = QueryEvaluator::new(weighter, ProximityConfig::default(), IndexRange::new(0, 2000).unwrap());
        let result = evaluator
            .evaluate(&mut passes, &mut restrictions, &mut exclusions, &mut weighting_features, &mut eos, &FlatMetrics, 0, 10)
            .unwrap();

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.stats.nof_ranked, 2);
    }

    #[test]
    fn exclusions_drop_otherwise_matching_candidates() {
        let union = UnionIterator::new(
            vec![Box::new(leaf("fox", &[(1, 5), (2, 5)])) as Box<dyn PostingIterator>],
            "fox".to_string(),
        );
        let mut passes = vec![SelectionPass { iterator: Box::new(union) }];
        let mut restrictions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut exclusions: Vec<Box<dyn PostingIterator>> = vec![Box::new(leaf("banned", &[(2, 1)]))];
        let mut weighting_features: Vec<Box<dyn PostingIterator>> = vec![Box::new(leaf("fox", &[(1, 5), (2, 5)]))];
        let mut eos = leaf("eos", &[(1, 1000), (2, 1000)]);

        let weighter = Bm25Pff::new(Bm25PffConfig::default(), 10.0).unwrap();
        let evaluator = QueryEvaluator::new(weighter, ProximityConfig::default(), IndexRange::new(0, 2000).unwrap());
        let result = evaluator
            .evaluate(&mut passes, &mut restrictions, &mut exclusions, &mut weighting_features, &mut eos, &FlatMetrics, 0, 10)
            .unwrap();

        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].docno, 1);
    }

    #[test]
    fn merge_sums_nof_visited_and_keeps_top_k() {
        let a = EvaluationResult {
            results: vec![RankedResult { docno: 1, score: 3.0 }],
            stats: EvaluationStats { nof_visited: 5, nof_ranked: 1, evaluation_pass: 1 },
            proximity: HashMap::new(),
        };
        let b = EvaluationResult {
            results: vec![RankedResult { docno: 2, score: 9.0 }],
            stats: EvaluationStats { nof_visited: 7, nof_ranked: 1, evaluation_pass: 2 },
            proximity: HashMap::new(),
        };
        let merged = merge_shard_results(vec![a, b], 10);
        assert_eq!(merged.stats.nof_visited, 12);
        assert_eq!(merged.stats.evaluation_pass, 2);
        assert_eq!(merged.results[0].docno, 2);
    }

    #[test]
    fn merge_summary_elements_sums_matching_name_value() {
        let elements = vec![
            SummaryElement { name: "near".to_string(), value: "fox".to_string(), weight: 1.0 },
            SummaryElement { name: "near".to_string(), value: "fox".to_string(), weight: 2.0 },
        ];
        let merged = merge_summary_elements(elements);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].weight, 3.0);
    }

    fn posting(docno: u64, pos: u32) -> crate::types::Posting {
        crate::types::Posting::new(DocumentNumber::new(docno).unwrap(), Position::new(pos).unwrap(), 1).unwrap()
    }

    /// Runs the same two-feature, one-document query through the evaluator
    /// with a given `maxdf`, holding every feature's df and the collection
    /// size fixed — so idf is identical across calls and `maxdf` is the
    /// only thing that can change `window_cap_for_df`'s decision.
    fn score_with_maxdf(maxdf: f64) -> f64 {
        let union = UnionIterator::new(vec![Box::new(leaf("near", &[(1, 4)])) as Box<dyn PostingIterator>], "near".to_string());
        let mut passes = vec![SelectionPass { iterator: Box::new(union) }];
        let mut restrictions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut exclusions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut eos = leaf("eos", &[(1, 1000)]);
        let mut weighting_features = vec![
            Box::new(LeafIterator::new("near".to_string(), vec![posting(1, 4)], 2)) as Box<dyn PostingIterator>,
            Box::new(LeafIterator::new("far".to_string(), vec![posting(1, 9)], 2)) as Box<dyn PostingIterator>,
        ];

        let config = Bm25PffConfig { maxdf, ffbase: 0.5, ..Default::default() };
        let weighter = Bm25Pff::new(config, 10.0).unwrap();
        let evaluator = QueryEvaluator::new(weighter, ProximityConfig::default(), IndexRange::new(0, 2000).unwrap());
        let result = evaluator
            .evaluate(&mut passes, &mut restrictions, &mut exclusions, &mut weighting_features, &mut eos, &FlatMetrics, 0, 10)
            .unwrap();
        assert_eq!(result.results.len(), 1);
        result.results[0].score
    }

    /// A weighting feature's df (2, fixed here) crosses `maxdf * N` only
    /// when `maxdf` is small enough (weighting::window_cap_for_df) — once
    /// it does, the evaluator caps the proximity node stream's field to 5
    /// positions, which excludes the df-9 partner match at position 9 from
    /// a field starting at 0. Excluding it drops the `near`/`far` pair's
    /// only touch, so `is_clustered` goes false and both features fall
    /// back to their classical ff instead of the clustered blend — a
    /// different score than the uncapped run reaches for the identical
    /// postings and idf inputs.
    #[test]
    fn window_cap_changes_score_relative_to_the_uncapped_window() {
        let uncapped = score_with_maxdf(0.5); // threshold 5, df 2 < 5: no cap
        let capped = score_with_maxdf(0.1); // threshold 1, df 2 > 1: capped to 5
        assert!(
            (uncapped - capped).abs() > 1e-9,
            "expected the window cap to change the score, got {uncapped} both times"
        );
    }

    #[test]
    fn summarize_builds_elements_only_for_retained_documents() {
        let union = UnionIterator::new(
            vec![Box::new(leaf("fox", &[(1, 5)])) as Box<dyn PostingIterator>],
            "fox".to_string(),
        );
        let mut passes = vec![SelectionPass { iterator: Box::new(union) }];
        let mut restrictions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut exclusions: Vec<Box<dyn PostingIterator>> = Vec::new();
        let mut weighting_features: Vec<Box<dyn PostingIterator>> = vec![Box::new(leaf("fox", &[(1, 5)]))];
        let mut eos = leaf("eos", &[(1, 1000)]);

        let weighter = Bm25Pff::new(Bm25PffConfig::default(), 10.0).unwrap();
        let evaluator = QueryEvaluator::new(weighter, ProximityConfig::default(), IndexRange::new(0, 2000).unwrap());
        let result = evaluator
            .evaluate(&mut passes, &mut restrictions, &mut exclusions, &mut weighting_features, &mut eos, &FlatMetrics, 0, 10)
            .unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.proximity.len(), 1);

        let feature_names = vec!["fox".to_string()];
        let mut forward_tokens = HashMap::new();
        forward_tokens.insert(1u64, vec![(5u32, "fox".to_string())]);
        let summaries =
            evaluator.summarize(&result, &feature_names, &forward_tokens, None, &[Summarizer::Matches { max_matches: 5 }]);

        let elements = summaries.get(&1).expect("docno 1 was retained and should have summary elements");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].value, "fox@5");
    }
}
