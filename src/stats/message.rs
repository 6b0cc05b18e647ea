//! Statistics df-change message codec (spec §4.6): a delta-encoded,
//! prefix-compressed chunk format broadcasting document-frequency changes
//! between shards. Grounded in `statsproc/statisticsBuilder.cpp` /
//! `statisticsViewer.cpp`'s newer wire layout (spec's resolved Open
//! Question: the newer, "isnew"-free format is authoritative).
//!
//! Entry layout (each field a variable-byte uint except the 1-byte flag):
//! `commonBytes, restLen, keysuffix[restLen], flags, |delta|`. The original
//! format additionally tags a combined `restLen + payloadLen` length for
//! fast skipping; since the flag byte and the delta varint are already
//! self-delimiting, this rewrite keeps `restLen` alone and drops the
//! redundant combined field.

use crate::codec::{common_prefix_len, decode_uint, encode_uint};
use crate::errors::{CoreError, CoreResult};
use crate::types::DfDelta;

const NEGATIVE_FLAG: u8 = 0x01;

/// Accumulates df-change entries and a nof-documents-inserted delta,
/// emitting one or more size-bounded, prefix-compressed chunks on commit.
#[derive(Debug, Default)]
pub struct StatisticsBuilder {
    entries: std::collections::BTreeMap<(String, String), i64>,
    nof_documents_change: i64,
    max_chunk_size: usize,
}

impl StatisticsBuilder {
    pub fn new(max_chunk_size: usize) -> Self {
        Self { entries: Default::default(), nof_documents_change: 0, max_chunk_size }
    }

    pub fn add_df_change(&mut self, term_type: &str, term_value: &str, delta: i32) -> CoreResult<()> {
        let key = (term_type.to_string(), term_value.to_string());
        let entry = self.entries.entry(key).or_insert(0);
        *entry += delta as i64;
        if *entry > i32::MAX as i64 || *entry < i32::MIN as i64 {
            return Err(CoreError::capacity("df delta overflowed 32-bit signed bounds"));
        }
        Ok(())
    }

    pub fn add_nof_documents_inserted_change(&mut self, delta: i32) -> CoreResult<()> {
        self.nof_documents_change += delta as i64;
        if self.nof_documents_change > i32::MAX as i64 || self.nof_documents_change < i32::MIN as i64 {
            return Err(CoreError::capacity("nof-documents-inserted delta overflowed 32-bit signed bounds"));
        }
        Ok(())
    }

    fn entry_key_bytes(term_type: &str, term_value: &str) -> Vec<u8> {
        let mut key = term_type.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(term_value.as_bytes());
        key
    }

    /// Serializes the staged entries into one or more chunks, each at most
    /// `max_chunk_size` bytes (except a chunk holding a single
    /// over-sized entry), and clears staging.
    fn build_chunks(&mut self) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut current = Self::new_chunk_header(self.nof_documents_change);
        let mut prev_key: Vec<u8> = Vec::new();

        for ((term_type, term_value), delta) in std::mem::take(&mut self.entries) {
            if delta == 0 {
                continue;
            }
            let key = Self::entry_key_bytes(&term_type, &term_value);
            let common = common_prefix_len(&prev_key, &key);
            let suffix = &key[common..];

            let mut entry_bytes = Vec::new();
            encode_uint(&mut entry_bytes, common as u32);
            encode_uint(&mut entry_bytes, suffix.len() as u32);
            entry_bytes.extend_from_slice(suffix);
            entry_bytes.push(if delta < 0 { NEGATIVE_FLAG } else { 0 });
            encode_uint(&mut entry_bytes, delta.unsigned_abs() as u32);

            if current.len() > 4 && current.len() + entry_bytes.len() > self.max_chunk_size {
                chunks.push(std::mem::replace(&mut current, Self::new_chunk_header(0)));
                prev_key.clear();
                let recompressed_common = 0;
                let mut recompressed = Vec::new();
                encode_uint(&mut recompressed, recompressed_common as u32);
                encode_uint(&mut recompressed, key.len() as u32);
                recompressed.extend_from_slice(&key);
                recompressed.push(if delta < 0 { NEGATIVE_FLAG } else { 0 });
                encode_uint(&mut recompressed, delta.unsigned_abs() as u32);
                current.extend_from_slice(&recompressed);
            } else {
                current.extend_from_slice(&entry_bytes);
            }
            prev_key = key;
        }
        if current.len() > 4 || Self::chunk_header_value(&current) != 0 {
            chunks.push(current);
        }
        self.nof_documents_change = 0;
        chunks
    }

    /// Whether `chunk` is header-only with a zero nof-documents-inserted
    /// delta and no entries — skipped by the builder rather than shipped.
    fn chunk_header_value(chunk: &[u8]) -> i32 {
        i32::from_be_bytes(chunk[0..4].try_into().unwrap())
    }

    fn new_chunk_header(nof_documents_change: i64) -> Vec<u8> {
        (nof_documents_change as i32).to_be_bytes().to_vec()
    }

    /// Persists every produced chunk. Here "persisting" means handing the
    /// caller the chunk bytes plus its own empty-staging postcondition;
    /// actual file placement is [`crate::stats::dated_file_list`]'s job.
    pub fn commit(&mut self) -> Vec<Vec<u8>> {
        self.build_chunks()
    }

    /// Produces the chunk list without retaining any staged state — used
    /// to ship statistics to peers without keeping a local copy.
    pub fn create_iterator_and_rollback(&mut self) -> Vec<Vec<u8>> {
        self.build_chunks()
    }
}

/// Decodes one chunk produced by [`StatisticsBuilder`].
pub struct StatisticsViewer<'a> {
    buf: &'a [u8],
    cursor: usize,
    prev_key: Vec<u8>,
}

impl<'a> StatisticsViewer<'a> {
    pub fn new(buf: &'a [u8]) -> CoreResult<Self> {
        if buf.len() < 4 {
            return Err(CoreError::invariant("statistics chunk shorter than its header"));
        }
        Ok(Self { buf, cursor: 4, prev_key: Vec::new() })
    }

    pub fn nof_documents_inserted_change(&self) -> i32 {
        i32::from_be_bytes(self.buf[0..4].try_into().unwrap())
    }

    /// Yields the next (type, value, delta) entry, or `None` at the end of
    /// the chunk.
    pub fn next_entry(&mut self) -> CoreResult<Option<DfDelta>> {
        if self.cursor >= self.buf.len() {
            return Ok(None);
        }
        let (common, n) = decode_uint(&self.buf[self.cursor..])?;
        self.cursor += n;
        if common as usize > self.prev_key.len() {
            return Err(CoreError::invariant("prefix length exceeds previous key length"));
        }
        let (rest_len, n) = decode_uint(&self.buf[self.cursor..])?;
        self.cursor += n;

        let rest_len = rest_len as usize;
        if self.cursor + rest_len > self.buf.len() {
            return Err(CoreError::invariant("truncated key suffix"));
        }
        let mut key = self.prev_key[..common as usize].to_vec();
        key.extend_from_slice(&self.buf[self.cursor..self.cursor + rest_len]);
        self.cursor += rest_len;

        let flag = *self
            .buf
            .get(self.cursor)
            .ok_or_else(|| CoreError::invariant("truncated entry flag byte"))?;
        if flag > 1 {
            return Err(CoreError::invariant("illegal sign flag byte"));
        }
        self.cursor += 1;

        let (magnitude, n) = decode_uint(&self.buf[self.cursor..])?;
        self.cursor += n;
        let delta = if flag == 1 { -(magnitude as i64) as i32 } else { magnitude as i32 };

        self.prev_key = key.clone();
        let mut split = key.splitn(2, |&b| b == 0);
        let term_type = split.next().unwrap_or(&[]);
        let term_value = split.next().unwrap_or(&[]);
        Ok(Some(DfDelta {
            term_type: String::from_utf8_lossy(term_type).into_owned(),
            term_value: String::from_utf8_lossy(term_value).into_owned(),
            delta,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_round_trip_orders_and_merges() {
        let mut builder = StatisticsBuilder::new(1 << 20);
        builder.add_df_change("term", "apple", 3).unwrap();
        builder.add_df_change("term", "banana", -2).unwrap();
        builder.add_df_change("term", "apricot", 1).unwrap();
        builder.add_nof_documents_inserted_change(7).unwrap();

        let chunks = builder.commit();
        assert_eq!(chunks.len(), 1);

        let mut viewer = StatisticsViewer::new(&chunks[0]).unwrap();
        assert_eq!(viewer.nof_documents_inserted_change(), 7);

        let mut seen = Vec::new();
        while let Some(entry) = viewer.next_entry().unwrap() {
            seen.push((entry.term_type, entry.term_value, entry.delta));
        }
        assert_eq!(
            seen,
            vec![
                ("term".to_string(), "apple".to_string(), 3),
                ("term".to_string(), "apricot".to_string(), 1),
                ("term".to_string(), "banana".to_string(), -2),
            ]
        );
    }

    #[test]
    fn chunk_boundary_resets_prefix_state() {
        let mut builder = StatisticsBuilder::new(12);
        builder.add_df_change("t", "aaaaaaaaaa", 1).unwrap();
        builder.add_df_change("t", "aaaaaaaaab", 1).unwrap();
        let chunks = builder.commit();
        assert!(chunks.len() >= 2, "expected a chunk split, got {}", chunks.len());

        let mut viewer = StatisticsViewer::new(&chunks[1]).unwrap();
        let entry = viewer.next_entry().unwrap().unwrap();
        assert_eq!(entry.term_value, "aaaaaaaaab");
    }

    #[test]
    fn empty_commit_produces_no_chunks() {
        let mut builder = StatisticsBuilder::new(1 << 20);
        assert!(builder.commit().is_empty());
    }

    #[test]
    fn net_zero_df_change_produces_no_chunks() {
        let mut builder = StatisticsBuilder::new(1 << 20);
        builder.add_df_change("term", "apple", 3).unwrap();
        builder.add_df_change("term", "apple", -3).unwrap();
        assert!(builder.commit().is_empty());
    }

    #[test]
    fn overflow_is_reported_as_capacity_error() {
        let mut builder = StatisticsBuilder::new(1 << 20);
        builder.add_df_change("t", "v", i32::MAX).unwrap();
        assert!(builder.add_df_change("t", "v", 1).is_err());
    }
}
