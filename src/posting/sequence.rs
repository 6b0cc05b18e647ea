//! Sequence join: children must occur in argument order with pairwise
//! gaps <= `range`.

use super::PostingIterator;
use crate::errors::{CoreError, CoreResult};

pub struct SequenceIterator {
    children: Vec<Box<dyn PostingIterator>>,
    range: u32,
    featureid: String,
    current_doc: u64,
    current_pos: u32,
}

impl SequenceIterator {
    pub fn new(children: Vec<Box<dyn PostingIterator>>, range: u32, featureid: String) -> CoreResult<Self> {
        if children.len() < 2 {
            return Err(CoreError::input_domain("sequence requires at least two children"));
        }
        Ok(Self { children, range, featureid, current_doc: 0, current_pos: 0 })
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

    /// Finds the first starting position at or after `from` for which
    /// every later child occurs, in order, within `range` of its
    /// predecessor.
    fn find_sequence(&mut self, from: u32) -> CoreResult<u32> {
        let mut start = self.children[0].skip_pos(from)?;
        'outer: while start != 0 {
            let mut prev = start;
            for child in self.children.iter_mut().skip(1) {
                let p = child.skip_pos(prev + 1)?;
                if p == 0 || p > prev + 1 + self.range {
                    start = self.children[0].skip_pos(start + 1)?;
                    continue 'outer;
                }
                prev = p;
            }
            return Ok(start);
        }
        Ok(0)
    }
}

impl PostingIterator for SequenceIterator {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        let doc = self.align_docs(d)?;
        self.current_doc = doc;
        self.current_pos = 0;
        Ok(doc)
    }

    fn skip_doc_candidate(&mut self, d: u64) -> CoreResult<u64> {
        self.skip_doc(d)
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        if self.current_doc == 0 {
            return Ok(0);
        }
        let found = self.find_sequence(p)?;
        self.current_pos = found;
        Ok(found)
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
        self.children.iter().map(|c| c.frequency()).min().unwrap_or(0)
    }

    fn document_frequency(&self) -> u64 {
        self.children.iter().map(|c| c.document_frequency()).min().unwrap_or(0)
    }

    fn featureid(&self) -> &str {
        &self.featureid
    }
}
