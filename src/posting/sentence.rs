//! Sentence join: given an end-of-sentence iterator and a maximum span,
//! returns the sentence-sized range containing a queried position —
//! the range begins right after the previous eos position.

use super::PostingIterator;
use crate::errors::CoreResult;
use crate::types::IndexRange;

pub struct SentenceIterator {
    eos: Box<dyn PostingIterator>,
    max_span: u32,
    featureid: String,
    current_doc: u64,
}

impl SentenceIterator {
    pub fn new(eos: Box<dyn PostingIterator>, max_span: u32, featureid: String) -> Self {
        Self { eos, max_span, featureid, current_doc: 0 }
    }

    /// The sentence range containing `pos`: `(prev_eos, next_eos]`
    /// capped at `max_span`. `skip_pos` only ever moves its cursor forward
    /// (posting/mod.rs), so both bounds come out of one forward walk from
    /// position 0 — the previous boundary is whatever we last passed
    /// before reaching `pos`, not a second scan re-started from 0.
    pub fn sentence_containing(&mut self, pos: u32) -> CoreResult<IndexRange> {
        let mut prev_end = 0u32;
        let mut cursor = self.eos.skip_pos(0)?;
        while cursor != 0 && cursor < pos {
            prev_end = cursor;
            cursor = self.eos.skip_pos(cursor + 1)?;
        }
        let next = if cursor == 0 { pos.saturating_add(self.max_span) } else { cursor };

        let start = prev_end;
        let capped_end = next.min(start + self.max_span);
        IndexRange::new(start, capped_end.max(start)).map_err(crate::errors::CoreError::external)
    }
}

impl PostingIterator for SentenceIterator {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        self.current_doc = self.eos.skip_doc(d)?;
        Ok(self.current_doc)
    }

    fn skip_doc_candidate(&mut self, d: u64) -> CoreResult<u64> {
        self.skip_doc(d)
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        self.eos.skip_pos(p)
    }

    fn docno(&self) -> u64 {
        self.current_doc
    }

    fn posno(&self) -> u32 {
        self.eos.posno()
    }

    fn length(&self) -> u32 {
        1
    }

    fn frequency(&self) -> u32 {
        self.eos.frequency()
    }

    fn document_frequency(&self) -> u64 {
        self.eos.document_frequency()
    }

    fn featureid(&self) -> &str {
        &self.featureid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::test_support::leaf;

    #[test]
    fn finds_sentence_bounds_around_position() {
        let eos = leaf("eos", &[(1, 10), (1, 30)]);
        let mut it = SentenceIterator::new(Box::new(eos), 50, "sent".to_string());
        it.skip_doc(1).unwrap();
        let range = it.sentence_containing(15).unwrap();
        assert_eq!(range.start, 10);
        assert_eq!(range.end, 30);
    }

    #[test]
    fn position_before_first_boundary_starts_at_zero() {
        let eos = leaf("eos", &[(1, 10), (1, 30)]);
        let mut it = SentenceIterator::new(Box::new(eos), 50, "sent".to_string());
        it.skip_doc(1).unwrap();
        let range = it.sentence_containing(3).unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.end, 10);
    }

    #[test]
    fn position_past_last_boundary_caps_at_max_span() {
        let eos = leaf("eos", &[(1, 10), (1, 30)]);
        let mut it = SentenceIterator::new(Box::new(eos), 50, "sent".to_string());
        it.skip_doc(1).unwrap();
        let range = it.sentence_containing(40).unwrap();
        assert_eq!(range.start, 30);
        assert_eq!(range.end, 80);
    }
}
