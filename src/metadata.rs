//! Per-document metadata element table: small numeric attributes (doc
//! length, title span, date) addressed by name, stored densely per
//! document number.

use std::collections::HashMap;

use crate::errors::{CoreError, CoreResult};
use crate::types::DocumentNumber;

#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    elements: Vec<String>,
    values: HashMap<u64, Vec<f64>>,
}

impl MetadataTable {
    pub fn new(elements: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { elements: elements.into_iter().map(Into::into).collect(), values: HashMap::new() }
    }

    fn index_of(&self, name: &str) -> CoreResult<usize> {
        self.elements
            .iter()
            .position(|e| e == name)
            .ok_or_else(|| CoreError::invariant(format!("unknown metadata element '{name}'")))
    }

    pub fn set(&mut self, docno: DocumentNumber, name: &str, value: f64) -> CoreResult<()> {
        let idx = self.index_of(name)?;
        let row = self.values.entry(docno.get()).or_insert_with(|| vec![0.0; self.elements.len()]);
        row[idx] = value;
        Ok(())
    }

    /// Returns `None` if no row has been set for `docno` rather than
    /// erroring; a missing *element name* is still a hard error.
    pub fn get(&self, docno: u64, name: &str) -> CoreResult<Option<f64>> {
        let idx = self.index_of(name)?;
        Ok(self.values.get(&docno).map(|row| row[idx]))
    }

    pub fn element_names(&self) -> &[String] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut table = MetadataTable::new(["doclen", "title_start"]);
        let doc = DocumentNumber::new(1).unwrap();
        table.set(doc, "doclen", 420.0).unwrap();
        assert_eq!(table.get(1, "doclen").unwrap(), Some(420.0));
        assert_eq!(table.get(1, "title_start").unwrap(), Some(0.0));
        assert_eq!(table.get(2, "doclen").unwrap(), None);
    }

    #[test]
    fn unknown_element_errors() {
        let table = MetadataTable::new(["doclen"]);
        assert!(table.get(1, "nope").is_err());
    }
}
