//! Forward index (spec §4.5's `F` key prefix): per-document,
//! per-position token lookup, used by the summarizer family to recover
//! surface text without reconstructing the document.

use std::sync::Arc;

use anyhow::Result;

use crate::codec::{decode_uint, encode_uint};
use crate::kvstore::{KvBatch, KvStore};

const PREFIX: u8 = b'F';

fn key(type_id: u32, docno: u64, pos: u32) -> Vec<u8> {
    let mut k = vec![PREFIX];
    encode_uint(&mut k, type_id);
    encode_uint(&mut k, docno as u32);
    encode_uint(&mut k, pos);
    k
}

fn doc_prefix(type_id: u32, docno: u64) -> Vec<u8> {
    let mut k = vec![PREFIX];
    encode_uint(&mut k, type_id);
    encode_uint(&mut k, docno as u32);
    k
}

/// One (position, token) entry awaiting insertion for a document.
pub struct ForwardIndexEntry {
    pub pos: u32,
    pub token: String,
}

pub struct ForwardIndex {
    store: Arc<dyn KvStore>,
}

impl ForwardIndex {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn stage(batch: KvBatch, type_id: u32, docno: u64, entries: &[ForwardIndexEntry]) -> KvBatch {
        let mut batch = batch;
        for entry in entries {
            batch = batch.put(key(type_id, docno, entry.pos), entry.token.as_bytes().to_vec());
        }
        batch
    }

    pub async fn token_at(&self, type_id: u32, docno: u64, pos: u32) -> Result<Option<String>> {
        let raw = self.store.get(&key(type_id, docno, pos)).await?;
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// All tokens for a document, in position order, for the given
    /// forward-index type.
    pub async fn document_tokens(&self, type_id: u32, docno: u64) -> Result<Vec<(u32, String)>> {
        let prefix = doc_prefix(type_id, docno);
        let entries = self.store.scan_prefix(&prefix).await?;
        let mut out = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            let (_type_id, n) = decode_uint(&k[1..])?;
            let (_docno, m) = decode_uint(&k[1 + n..])?;
            let (pos, _) = decode_uint(&k[1 + n + m..])?;
            out.push((pos, String::from_utf8_lossy(&v).into_owned()));
        }
        out.sort_by_key(|(pos, _)| *pos);
        Ok(out)
    }
}
