//! Metadata-range iterator: produces a virtual per-document `[lo, hi)`
//! range computed from two metadata elements (e.g. title start/end)
//! without touching any posting block.

use super::PostingIterator;
use crate::errors::CoreResult;
use crate::metadata::MetadataTable;

pub struct MetadataRangeIterator {
    lo_element: String,
    hi_element: String,
    featureid: String,
    docnos: Vec<u64>,
    cursor: usize,
}

impl MetadataRangeIterator {
    pub fn new(lo_element: impl Into<String>, hi_element: impl Into<String>, docnos: Vec<u64>, featureid: String) -> Self {
        Self { lo_element: lo_element.into(), hi_element: hi_element.into(), featureid, docnos, cursor: 0 }
    }

    pub fn range_for(&self, table: &MetadataTable, docno: u64) -> CoreResult<Option<(f64, f64)>> {
        let lo = table.get(docno, &self.lo_element)?;
        let hi = table.get(docno, &self.hi_element)?;
        Ok(match (lo, hi) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        })
    }
}

impl PostingIterator for MetadataRangeIterator {
    fn skip_doc(&mut self, d: u64) -> CoreResult<u64> {
        while self.cursor < self.docnos.len() && self.docnos[self.cursor] < d {
            self.cursor += 1;
        }
        Ok(self.docnos.get(self.cursor).copied().unwrap_or(0))
    }

    fn skip_pos(&mut self, p: u32) -> CoreResult<u32> {
        Ok(if p == 0 { 1 } else { 0 })
    }

    fn docno(&self) -> u64 {
        self.docnos.get(self.cursor).copied().unwrap_or(0)
    }

    fn posno(&self) -> u32 {
        1
    }

    fn length(&self) -> u32 {
        1
    }

    fn frequency(&self) -> u32 {
        1
    }

    fn document_frequency(&self) -> u64 {
        self.docnos.len() as u64
    }

    fn featureid(&self) -> &str {
        &self.featureid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_doc_walks_the_eligible_list() {
        let mut it = MetadataRangeIterator::new("title_start", "title_end", vec![2, 5, 9], "mr".to_string());
        assert_eq!(it.skip_doc(3).unwrap(), 5);
        assert_eq!(it.skip_doc(10).unwrap(), 0);
    }
}
