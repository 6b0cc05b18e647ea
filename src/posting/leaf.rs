//! Leaf posting iterator: reads a decoded posting block for a single term
//! and exposes the skip_doc/skip_pos cursor contract directly over it.

use super::PostingIterator;
use crate::errors::CoreResult;
use crate::types::Posting;

struct DocGroup {
    docno: u64,
    positions: Vec<(u32, u32)>, // (position, length)
}

pub struct LeafIterator {
    featureid: String,
    groups: Vec<DocGroup>,
    document_frequency: u64,
    doc_cursor: usize,
    pos_cursor: usize,
}

impl LeafIterator {
    /// `postings` must already be sorted by (docno, position).
    /// `document_frequency` is the term's global df, supplied by the
    /// caller (it may span multiple blocks, unlike this single block).
    pub fn new(featureid: String, postings: Vec<Posting>, document_frequency: u64) -> Self {
        let mut groups: Vec<DocGroup> = Vec::new();
        for p in postings {
            match groups.last_mut() {
                Some(g) if g.docno == p.docno.get() => g.positions.push((p.pos.get(), p.length)),
                _ => groups.push(DocGroup { docno: p.docno.get(), positions: vec![(p.pos.get(), p.length)] }),
            }
        }
        Self { featureid, groups, document_frequency, doc_cursor: 0, pos_cursor: 0 }
    }

    fn current_group(&self) -> Option<&DocGroup> {
        self.groups.get(self.doc_cursor)
    }
}

impl PostingIterator for LeafIterator {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        while self.doc_cursor < self.groups.len() && self.groups[self.doc_cursor].docno < d {
            self.doc_cursor += 1;
        }
        self.pos_cursor = 0;
        Ok(self.current_group().map(|g| g.docno).unwrap_or(0))
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        let Some(group) = self.groups.get(self.doc_cursor) else {
            return Ok(0);
        };
        while self.pos_cursor < group.positions.len() && group.positions[self.pos_cursor].0 < p {
            self.pos_cursor += 1;
        }
        Ok(group.positions.get(self.pos_cursor).map(|(pos, _)| *pos).unwrap_or(0))
    }

    fn docno(&self) -> u64 {
        self.current_group().map(|g| g.docno).unwrap_or(0)
    }

    fn posno(&self) -> u32 {
        self.current_group()
            .and_then(|g| g.positions.get(self.pos_cursor))
            .map(|(pos, _)| *pos)
            .unwrap_or(0)
    }

    fn length(&self) -> u32 {
        self.current_group()
            .and_then(|g| g.positions.get(self.pos_cursor))
            .map(|(_, len)| *len)
            .unwrap_or(0)
    }

    fn frequency(&self) -> u32 {
        self.current_group().map(|g| g.positions.len() as u32).unwrap_or(0)
    }

    fn document_frequency(&self) -> u64 {
        self.document_frequency
    }

    fn featureid(&self) -> &str {
        &self.featureid
    }
}
