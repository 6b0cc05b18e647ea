//! Structures (spec §3): a named set of (header-field, content-field)
//! pairs per document, e.g. a section and its title. Header fields for a
//! given (document, structure name) are disjoint, and each header's
//! content field starts exactly where the header ends.

use std::collections::HashMap;

use crate::errors::{CoreError, CoreResult};
use crate::types::IndexRange;

#[derive(Debug, Clone, Copy)]
pub struct StructureField {
    pub header: IndexRange,
    pub content: IndexRange,
}

#[derive(Debug, Default)]
pub struct StructureTable {
    /// Keyed by (structure name, docno); fields kept sorted by header
    /// start so lookups can binary-search.
    fields: HashMap<(String, u64), Vec<StructureField>>,
}

impl StructureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a (header, content) pair, enforcing that headers for this
    /// (name, docno) stay disjoint and that `content.start == header.end`.
    pub fn add(&mut self, name: &str, docno: u64, header: IndexRange, content: IndexRange) -> CoreResult<()> {
        if content.start != header.end {
            return Err(CoreError::invariant("structure content field must start where its header ends"));
        }
        let entries = self.fields.entry((name.to_string(), docno)).or_default();
        let insert_at = entries.partition_point(|f| f.header.start < header.start);
        if let Some(prev) = insert_at.checked_sub(1).and_then(|i| entries.get(i)) {
            if prev.header.end > header.start {
                return Err(CoreError::invariant("structure header fields must be disjoint"));
            }
        }
        if let Some(next) = entries.get(insert_at) {
            if header.end > next.header.start {
                return Err(CoreError::invariant("structure header fields must be disjoint"));
            }
        }
        entries.insert(insert_at, StructureField { header, content });
        Ok(())
    }

    /// The structure field enclosing `pos` (header or content range),
    /// for `(name, docno)`, if any.
    pub fn enclosing(&self, name: &str, docno: u64, pos: u32) -> Option<StructureField> {
        self.fields.get(&(name.to_string(), docno))?.iter().find(|f| {
            (f.header.start..f.content.end).contains(&pos)
        }).copied()
    }

    pub fn fields_for(&self, name: &str, docno: u64) -> &[StructureField] {
        self.fields.get(&(name.to_string(), docno)).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
