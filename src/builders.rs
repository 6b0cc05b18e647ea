//! Fluent builders for the values callers assemble before handing them to
//! the storage engine or the query evaluator, matching the teacher's
//! builder-pattern convention for constructing validated aggregates.

use crate::errors::{CoreError, CoreResult};
use crate::types::{DocumentNumber, Position, Posting};
use crate::weighting::FeatureStats;

/// Builds a document's postings for one feature, keeping them sorted by
/// position as they're added rather than requiring a separate sort pass.
#[derive(Default)]
pub struct PostingSetBuilder {
    docno: Option<DocumentNumber>,
    postings: Vec<Posting>,
}

impl PostingSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn docno(mut self, docno: DocumentNumber) -> Self {
        self.docno = Some(docno);
        self
    }

    pub fn occurrence(mut self, pos: u32, length: u32) -> CoreResult<Self> {
        let docno = self.docno.ok_or_else(|| CoreError::input_domain("docno must be set before adding occurrences"))?;
        let position = Position::new(pos).map_err(CoreError::external)?;
        let posting = Posting::new(docno, position, length).map_err(CoreError::external)?;
        self.postings.push(posting);
        Ok(self)
    }

    pub fn build(mut self) -> Vec<Posting> {
        self.postings.sort();
        self.postings
    }
}

/// Builds the per-feature input array for [`crate::weighting::Bm25Pff`],
/// resolving document frequency and classical feature-frequency counts as
/// features are added.
#[derive(Default)]
pub struct FeatureStatsBuilder {
    features: Vec<FeatureStats>,
}

impl FeatureStatsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature(mut self, df: u64, ff_classic: f64, weight: f64, first_pos: u32) -> Self {
        self.features.push(FeatureStats { df, ff_classic, weight, first_pos });
        self
    }

    pub fn build(self) -> Vec<FeatureStats> {
        self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posting_set_builder_sorts_by_position() {
        let docno = DocumentNumber::new(7).unwrap();
        let postings = PostingSetBuilder::new()
            .docno(docno)
            .occurrence(30, 1)
            .unwrap()
            .occurrence(10, 1)
            .unwrap()
            .occurrence(20, 1)
            .unwrap()
            .build();
        let positions: Vec<u32> = postings.iter().map(|p| p.pos.get()).collect();
        assert_eq!(positions, vec![10, 20, 30]);
    }

    #[test]
    fn posting_set_builder_requires_docno_first() {
        let err = PostingSetBuilder::new().occurrence(1, 1);
        assert!(err.is_err());
    }

    #[test]
    fn feature_stats_builder_preserves_order() {
        let features = FeatureStatsBuilder::new().feature(100, 2.0, 1.0, 0).feature(50, 1.0, 0.5, 3).build();
        assert_eq!(features.len(), 2);
        assert_eq!(features[1].df, 50);
    }
}
