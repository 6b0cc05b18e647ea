//! Posting-iterator algebra (spec §4.2): leaf iterators reading decoded
//! posting blocks, and join iterators (union, intersect-within-range,
//! difference, sequence, sentence, metadata-range) composing over them.
//! Every iterator implements the same skip/read contract so the query
//! evaluator and proximity context can treat any composed tree uniformly
//! (spec §9: "express as tagged variants plus dispatch tables").

pub mod block;
pub mod difference;
pub mod intersect;
pub mod leaf;
pub mod metadata_range;
pub mod sentence;
pub mod sequence;
pub mod union;

use crate::errors::CoreResult;

/// The capability set every posting iterator implements. `skip_doc` and
/// `skip_pos` never raise for "not found" — they return 0 — matching
/// spec §4.2 and §7's not-found-is-zero propagation policy.
pub trait PostingIterator {
    /// Advances to the smallest docno >= `d` that matches exactly.
    /// Returns 0 when exhausted.
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64>;

    /// Advances to a docno >= `d` that *might* match, cheaper than
    /// `skip_doc` for set operations that confirm positions later.
    /// Leaf iterators have no candidate/confirmed distinction, so the
    /// default forwards to `skip_doc`.
    fn skip_doc_candidate(&mut self, d: u64) -> CoreResult<u64> {
        self.skip_doc(d)
    }

    /// Within the current document, advances to the smallest position
    /// >= `p`. Returns 0 when exhausted in this document.
    fn skip_pos(&mut self, p: u32) -> CoreResult<u32>;

    fn docno(&self) -> u64;
    fn posno(&self) -> u32;
    fn length(&self) -> u32;

    /// Count of positions in the current document.
    fn frequency(&self) -> u32;

    /// Global document frequency. Composed iterators may estimate this
    /// (spec §4.2).
    fn document_frequency(&self) -> u64;

    fn featureid(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::leaf::LeafIterator;
    use crate::types::{DocumentNumber, Position, Posting};

    pub fn postings(pairs: &[(u64, u32)]) -> Vec<Posting> {
        pairs
            .iter()
            .map(|&(d, p)| Posting::new(DocumentNumber::new(d).unwrap(), Position::new(p).unwrap(), 1).unwrap())
            .collect()
    }

    pub fn leaf(name: &str, pairs: &[(u64, u32)]) -> LeafIterator {
        LeafIterator::new(name.to_string(), postings(pairs), pairs.len() as u64)
    }
}
