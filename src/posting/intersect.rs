//! Intersect-within-range join: emits positions where at least
//! `cardinality` children occur within a span of at most `range` touching
//! a queried "cut" position. The span may be anchored forward of the cut
//! (the next window starting at or after it) or backward (the nearest
//! window ending at or before it), selected by `backward`.

use super::PostingIterator;
use crate::errors::{CoreError, CoreResult};
use crate::position_window::{scan_cardinality_windows, WindowMatch, WindowMode};

pub struct IntersectWithinRange {
    children: Vec<Box<dyn PostingIterator>>,
    featureid: String,
    range: u32,
    cardinality: usize,
    backward: bool,
    current_doc: u64,
    current_pos: u32,
    /// Every qualifying window for the current document, computed once on
    /// `skip_doc` (each child's positions are forward-only and would be
    /// fully drained by the first `skip_pos` call otherwise) and reused by
    /// every subsequent `skip_pos` query against that document.
    matches: Vec<WindowMatch>,
}

impl IntersectWithinRange {
    pub fn new(
        children: Vec<Box<dyn PostingIterator>>,
        range: u32,
        cardinality: usize,
        featureid: String,
    ) -> CoreResult<Self> {
        Self::new_with_direction(children, range, cardinality, featureid, false)
    }

    /// Same as [`Self::new`], but with `backward = true` the window looked
    /// up by `skip_pos(p)` is the nearest span ending at or before `p`
    /// rather than the nearest one starting at or after it (spec §4.2:
    /// "the range may be positive, look forward, or negative, look
    /// backward").
    pub fn new_with_direction(
        children: Vec<Box<dyn PostingIterator>>,
        range: u32,
        cardinality: usize,
        featureid: String,
        backward: bool,
    ) -> CoreResult<Self> {
        if cardinality == 0 || cardinality > children.len() {
            return Err(CoreError::input_domain("cardinality out of arity range"));
        }
        Ok(Self { children, featureid, range, cardinality, backward, current_doc: 0, current_pos: 0, matches: Vec::new() })
    }

    fn align_docs(&mut self, d: u64) -> CoreResult<u64> {
        let mut target = d;
        loop {
            let mut max_doc = 0u64;
            for child in &mut self.children {
                let r = child.skip_doc(target)?;
                if r == 0 {
                    return Ok(0);
                }
                if r > max_doc {
                    max_doc = r;
                }
            }
            if self.children.iter().all(|c| c.docno() == max_doc) {
                return Ok(max_doc);
            }
            target = max_doc;
        }
    }

    fn collect_all_positions(&mut self) -> CoreResult<Vec<Vec<u32>>> {
        let mut lists = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            let mut positions = Vec::new();
            let mut p = child.skip_pos(0)?;
            while p != 0 {
                positions.push(p);
                p = child.skip_pos(p + 1)?;
            }
            lists.push(positions);
        }
        Ok(lists)
    }

    /// The window's reported anchor position: its start for a forward
    /// range, its end for a backward one, so that successive `skip_pos`
    /// queries still see a monotonically increasing stream either way.
    fn anchor(&self, m: &WindowMatch) -> u32 {
        if self.backward {
            m.end
        } else {
            m.start
        }
    }
}

impl PostingIterator for IntersectWithinRange {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        let doc = self.align_docs(d)?;
        self.current_doc = doc;
        self.current_pos = 0;
        self.matches = if doc == 0 {
            Vec::new()
        } else {
            let lists = self.collect_all_positions()?;
            scan_cardinality_windows(&lists, self.range, self.cardinality, WindowMode::MinWin)
        };
        Ok(doc)
    }

    fn skip_doc_candidate(&mut self, d: u64) -> CoreResult<u64> {
        self.skip_doc(d)
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        if self.current_doc == 0 {
            return Ok(0);
        }
        let best = self.matches.iter().filter(|m| self.anchor(m) >= p).min_by_key(|m| self.anchor(m));
        self.current_pos = best.map(|m| self.anchor(m)).unwrap_or(0);
        Ok(self.current_pos)
    }

    fn docno(&self) -> u64 {
        self.current_doc
    }

    fn posno(&self) -> u32 {
        self.current_pos
    }

    fn length(&self) -> u32 {
        1
    }

    fn frequency(&self) -> u32 {
        self.children.iter().filter(|c| c.docno() == self.current_doc).map(|c| c.frequency()).min().unwrap_or(0)
    }

    fn document_frequency(&self) -> u64 {
        self.children.iter().map(|c| c.document_frequency()).min().unwrap_or(0)
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
    fn emits_positions_within_range_for_cardinality() {
        let a = leaf("a", &[(1, 10), (1, 100)]);
        let b = leaf("b", &[(1, 12)]);
        let mut it = IntersectWithinRange::new(vec![Box::new(a), Box::new(b)], 5, 2, "i".to_string()).unwrap();
        assert_eq!(it.skip_doc(1).unwrap(), 1);
        let pos = it.skip_pos(0).unwrap();
        assert_eq!(pos, 10);
    }

    #[test]
    fn rejects_cardinality_above_arity() {
        let a = leaf("a", &[(1, 1)]);
        assert!(IntersectWithinRange::new(vec![Box::new(a)], 5, 2, "i".to_string()).is_err());
    }

    #[test]
    fn a_second_query_on_the_same_document_still_finds_the_window() {
        let a = leaf("a", &[(1, 10), (1, 100)]);
        let b = leaf("b", &[(1, 12)]);
        let mut it = IntersectWithinRange::new(vec![Box::new(a), Box::new(b)], 5, 2, "i".to_string()).unwrap();
        it.skip_doc(1).unwrap();
        assert_eq!(it.skip_pos(0).unwrap(), 10);
        assert_eq!(it.skip_pos(11).unwrap(), 0, "no second window starting at or after 11");
    }

    #[test]
    fn backward_range_anchors_on_the_window_end_instead_of_its_start() {
        let a = leaf("a", &[(1, 10)]);
        let b = leaf("b", &[(1, 12)]);
        let mut it = IntersectWithinRange::new_with_direction(vec![Box::new(a), Box::new(b)], 5, 2, "i".to_string(), true).unwrap();
        it.skip_doc(1).unwrap();
        // The only qualifying window is [10, 12]; backward mode reports its
        // end (12), forward mode (the prior tests) reports its start (10).
        assert_eq!(it.skip_pos(0).unwrap(), 12);
        assert_eq!(it.skip_pos(13).unwrap(), 0);
    }
}
