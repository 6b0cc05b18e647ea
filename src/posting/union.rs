//! Union join iterator: merges N children by doc, then by position.

use super::PostingIterator;
use crate::errors::CoreResult;

pub struct UnionIterator {
    children: Vec<Box<dyn PostingIterator>>,
    featureid: String,
    current_doc: u64,
    current_pos: u32,
}

impl UnionIterator {
    pub fn new(children: Vec<Box<dyn PostingIterator>>, featureid: String) -> Self {
        Self { children, featureid, current_doc: 0, current_pos: 0 }
    }
}

impl PostingIterator for UnionIterator {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        let mut best = 0u64;
        for child in &mut self.children {
            let r = child.skip_doc(d)?;
            if r > 0 && (best == 0 || r < best) {
                best = r;
            }
        }
        self.current_doc = best;
        self.current_pos = 0;
        Ok(best)
    }

    fn skip_doc_candidate(&mut self, d: u64) -> CoreResult<u64> {
        self.skip_doc(d)
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        if self.current_doc == 0 {
            return Ok(0);
        }
        let mut best = 0u32;
        for child in &mut self.children {
            if child.docno() == self.current_doc {
                let r = child.skip_pos(p)?;
                if r > 0 && (best == 0 || r < best) {
                    best = r;
                }
            }
        }
        self.current_pos = best;
        Ok(best)
    }

    fn docno(&self) -> u64 {
        self.current_doc
    }

    fn posno(&self) -> u32 {
        self.current_pos
    }

    fn length(&self) -> u32 {
        self.children
            .iter()
            .find(|c| c.docno() == self.current_doc && c.posno() == self.current_pos)
            .map(|c| c.length())
            .unwrap_or(1)
    }

    fn frequency(&self) -> u32 {
        self.children
            .iter()
            .filter(|c| c.docno() == self.current_doc)
            .map(|c| c.frequency())
            .max()
            .unwrap_or(0)
    }

    fn document_frequency(&self) -> u64 {
        // Estimated: the exact union df would require scanning every
        // child over the whole doc axis (spec §4.2 permits estimation
        // for composed iterators).
        self.children.iter().map(|c| c.document_frequency()).max().unwrap_or(0)
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
    fn union_walks_doc_then_position() {
        let a = leaf("a", &[(1, 10), (1, 20), (3, 5)]);
        let b = leaf("b", &[(1, 15), (2, 7), (3, 5)]);
        let mut u = UnionIterator::new(vec![Box::new(a), Box::new(b)], "u".to_string());

        assert_eq!(u.skip_doc(1).unwrap(), 1);
        assert_eq!(u.skip_pos(0).unwrap(), 10);
        assert_eq!(u.skip_pos(11).unwrap(), 15);
        assert_eq!(u.skip_pos(16).unwrap(), 20);
        assert_eq!(u.skip_pos(21).unwrap(), 0);

        assert_eq!(u.skip_doc(2).unwrap(), 2);
        assert_eq!(u.skip_pos(0).unwrap(), 7);

        assert_eq!(u.skip_doc(3).unwrap(), 3);
        assert_eq!(u.skip_pos(0).unwrap(), 5);
    }
}
