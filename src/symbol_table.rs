//! The two symbol tables backing the inverted index (spec §4.5): a
//! term-type table (string -> id) and a term-value table, keyed so that
//! all values of one type sort contiguously. Both are monotonic-append:
//! once assigned, an id is never reused or renumbered.

use crate::codec::encode_uint;
use crate::errors::CoreResult;
use crate::trie::CompactTrie;

/// `string -> id` table for term *types* (e.g. `"word"`, `"stem"`).
#[derive(Default)]
pub struct TypeTable {
    trie: CompactTrie,
    next_id: u32,
}

impl TypeTable {
    pub fn new() -> Self {
        Self { trie: CompactTrie::new(), next_id: 1 }
    }

    /// Returns the existing id for `name`, or allocates and assigns the
    /// next monotonic id.
    pub fn get_or_create(&mut self, name: &str) -> CoreResult<u32> {
        if let Some(id) = self.trie.lookup(name.as_bytes())? {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.trie.insert(name.as_bytes(), id)?;
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> CoreResult<Option<u32>> {
        self.trie.lookup(name.as_bytes())
    }

    pub fn iter(&self) -> impl Iterator<Item = CoreResult<(Vec<u8>, u32)>> + '_ {
        self.trie.iter()
    }

    /// Replays a previously-assigned `(name, id)` pair recovered from the
    /// backing store, keeping `next_id` ahead of every recovered id.
    pub fn load(&mut self, name: &str, id: u32) -> CoreResult<()> {
        self.trie.insert(name.as_bytes(), id)?;
        self.next_id = self.next_id.max(id + 1);
        Ok(())
    }
}

/// `(type-id, value) -> id` table for term *values*. The key is the
/// type-id varint-encoded followed by the raw value bytes, so a
/// lexicographic scan of the trie visits every value of a type
/// contiguously before moving to the next type (spec §4.5's prefix-scan
/// requirement).
#[derive(Default)]
pub struct ValueTable {
    trie: CompactTrie,
    next_id: u32,
}

impl ValueTable {
    pub fn new() -> Self {
        Self { trie: CompactTrie::new(), next_id: 1 }
    }

    fn key(type_id: u32, value: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(value.len() + 4);
        encode_uint(&mut key, type_id);
        key.extend_from_slice(value);
        key
    }

    pub fn get_or_create(&mut self, type_id: u32, value: &[u8]) -> CoreResult<u32> {
        let key = Self::key(type_id, value);
        if let Some(id) = self.trie.lookup(&key)? {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.trie.insert(&key, id)?;
        Ok(id)
    }

    pub fn lookup(&self, type_id: u32, value: &[u8]) -> CoreResult<Option<u32>> {
        self.trie.lookup(&Self::key(type_id, value))
    }

    /// Replays a previously-assigned `(type_id, value, id)` triple recovered
    /// from the backing store, keeping `next_id` ahead of every recovered id.
    pub fn load(&mut self, type_id: u32, value: &[u8], id: u32) -> CoreResult<()> {
        let key = Self::key(type_id, value);
        self.trie.insert(&key, id)?;
        self.next_id = self.next_id.max(id + 1);
        Ok(())
    }

    /// All `(value, id)` pairs for one type, in lexicographic value order.
    pub fn values_of_type(&self, type_id: u32) -> CoreResult<Vec<(Vec<u8>, u32)>> {
        let mut prefix = Vec::new();
        encode_uint(&mut prefix, type_id);
        let mut out = Vec::new();
        for entry in self.trie.iter() {
            let (key, id) = entry?;
            if key.len() >= prefix.len() && key[..prefix.len()] == prefix[..] {
                out.push((key[prefix.len()..].to_vec(), id));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_table_assigns_monotonic_ids() {
        let mut table = TypeTable::new();
        let word = table.get_or_create("word").unwrap();
        let stem = table.get_or_create("stem").unwrap();
        assert_ne!(word, stem);
        assert_eq!(table.get_or_create("word").unwrap(), word);
    }

    #[test]
    fn value_table_groups_by_type() {
        let mut table = ValueTable::new();
        table.get_or_create(1, b"apple").unwrap();
        table.get_or_create(1, b"banana").unwrap();
        table.get_or_create(2, b"apple").unwrap();

        let type1_values = table.values_of_type(1).unwrap();
        assert_eq!(type1_values.len(), 2);
        let type2_values = table.values_of_type(2).unwrap();
        assert_eq!(type2_values.len(), 1);
    }
}
