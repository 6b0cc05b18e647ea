//! Storage engine (spec §4.5): owns the two symbol-table tries, the
//! posting/forward-index blocks, the metadata table, and the statistics
//! cache, serializing each into the external ordered KV store under its
//! own disjoint key prefix. Grounded in the teacher's `file_storage.rs`
//! open/insert/commit wrapping shape, re-expressed over this crate's
//! `KvStore` trait instead of a filesystem-specific backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::codec::{decode_uint, encode_uint};
use crate::errors::{CoreError, CoreResult};
use crate::forward_index::{ForwardIndex, ForwardIndexEntry};
use crate::kvstore::{KvBatch, KvStore};
use crate::metadata::MetadataTable;
use crate::posting::block::{decode_block, encode_block};
use crate::stats::cache::{DfIncrement, StatisticsCache};
use crate::stats::dated_file_list::DatedFileList;
use crate::stats::message::{StatisticsBuilder, StatisticsViewer};
use crate::stats::peer_transaction::{PeerDfChange, PeerReplyEntry, PeerTransaction};
use crate::structure::StructureTable;
use crate::symbol_table::{TypeTable, ValueTable};
use crate::types::{DocumentNumber, Posting};

const TYPE_PREFIX: u8 = b'T';
const VALUE_PREFIX: u8 = b'V';
const DOCID_PREFIX: u8 = b'D';
const POSTING_PREFIX: u8 = b'I';
const GLOBAL_DF_PREFIX: u8 = b'G';
const NOF_DOCUMENTS_KEY: &[u8] = b"N";

/// Statistics chunks stay well under typical network datagram sizes
/// (spec §4.6); 64KiB matches the teacher's block-sized staging elsewhere.
const STATISTICS_MAX_CHUNK_SIZE: usize = 1 << 16;

fn type_key(name: &str) -> Vec<u8> {
    let mut k = vec![TYPE_PREFIX];
    k.extend_from_slice(name.as_bytes());
    k
}

fn value_key(type_id: u32, value: &[u8]) -> Vec<u8> {
    let mut k = vec![VALUE_PREFIX];
    encode_uint(&mut k, type_id);
    k.extend_from_slice(value);
    k
}

fn docid_key(docid: &str) -> Vec<u8> {
    let mut k = vec![DOCID_PREFIX];
    k.extend_from_slice(docid.as_bytes());
    k
}

fn posting_key(term_id: u64, last_docno_in_block: u64) -> Vec<u8> {
    let mut k = vec![POSTING_PREFIX];
    encode_uint(&mut k, (term_id >> 32) as u32);
    encode_uint(&mut k, term_id as u32);
    encode_uint(&mut k, (last_docno_in_block >> 32) as u32);
    encode_uint(&mut k, last_docno_in_block as u32);
    k
}

fn global_df_key(type_id: u32, term_id: u32) -> Vec<u8> {
    let mut k = vec![GLOBAL_DF_PREFIX];
    encode_uint(&mut k, type_id);
    encode_uint(&mut k, term_id);
    k
}

/// Top-level engine tying the symbol tables, posting store, forward
/// index, metadata, structures, and statistics cache into one unit with a
/// single commit discipline: everything a caller stages lands in one
/// [`KvBatch`], applied atomically by the backing [`KvStore`].
pub struct StorageEngine {
    store: Arc<dyn KvStore>,
    types: Mutex<TypeTable>,
    values: Mutex<ValueTable>,
    docids: Mutex<HashMap<String, u64>>,
    next_docno: AtomicU64,
    pub forward_index: ForwardIndex,
    pub metadata: Mutex<MetadataTable>,
    pub structures: Mutex<StructureTable>,
    pub statistics: StatisticsCache,
    statistics_builder: Mutex<StatisticsBuilder>,
    statistics_log: AsyncMutex<DatedFileList>,
}

impl StorageEngine {
    /// Opens a fresh engine over `store`, replaying the `T`/`V`/`D`/`N`
    /// prefixes already present so ids stay stable across restarts.
    /// `statistics_log_dir` is the on-disk directory `commit` appends
    /// df-change chunks to (spec §4.6), independent of the KV store.
    pub async fn open(
        store: Arc<dyn KvStore>,
        metadata_elements: impl IntoIterator<Item = impl Into<String>>,
        statistics_log_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let mut types = TypeTable::new();
        for (key, value) in store.scan_prefix(&[TYPE_PREFIX]).await? {
            let (id, _) = decode_uint(&value)?;
            let name = String::from_utf8_lossy(&key[1..]).into_owned();
            types.load(&name, id)?;
        }

        let mut values = ValueTable::new();
        for (key, value) in store.scan_prefix(&[VALUE_PREFIX]).await? {
            let (id, _) = decode_uint(&value)?;
            let (type_id, consumed) = decode_uint(&key[1..])?;
            let raw_value = &key[1 + consumed..];
            values.load(type_id, raw_value, id)?;
        }

        let mut docids = HashMap::new();
        let mut max_docno = 0u64;
        for (key, value) in store.scan_prefix(&[DOCID_PREFIX]).await? {
            let (docno, _) = decode_uint(&value)?;
            let docid = String::from_utf8_lossy(&key[1..]).into_owned();
            max_docno = max_docno.max(docno as u64);
            docids.insert(docid, docno as u64);
        }

        let statistics_log = DatedFileList::open(statistics_log_dir).await?;

        Ok(Self {
            forward_index: ForwardIndex::new(store.clone()),
            metadata: Mutex::new(MetadataTable::new(metadata_elements)),
            structures: Mutex::new(StructureTable::new()),
            statistics: StatisticsCache::new(),
            statistics_builder: Mutex::new(StatisticsBuilder::new(STATISTICS_MAX_CHUNK_SIZE)),
            statistics_log: AsyncMutex::new(statistics_log),
            store,
            types: Mutex::new(types),
            values: Mutex::new(values),
            docids: Mutex::new(docids),
            next_docno: AtomicU64::new(max_docno + 1),
        })
    }

    /// Assigns a fresh [`DocumentNumber`] for `docid`, or returns the one
    /// already assigned, staging the `D` mapping either way.
    pub fn insert_document(&self, batch: KvBatch, docid: &str) -> CoreResult<(KvBatch, DocumentNumber, KvBatch)> {
        let mut docids = self.docids.lock();
        if let Some(&existing) = docids.get(docid) {
            let docno = DocumentNumber::new(existing).map_err(CoreError::external)?;
            return Ok((batch, docno, KvBatch::new()));
        }
        let raw_docno = self.next_docno.fetch_add(1, Ordering::SeqCst);
        docids.insert(docid.to_string(), raw_docno);
        let docno = DocumentNumber::new(raw_docno).map_err(CoreError::external)?;

        let mut encoded_docno = Vec::new();
        encode_uint(&mut encoded_docno, raw_docno as u32);
        let batch = batch.put(docid_key(docid), encoded_docno);
        let nof_increment = KvBatch::new();
        Ok((batch, docno, nof_increment))
    }

    /// Returns the existing id for `(type_id, name)` or stages its
    /// assignment, mirroring the in-memory trie insert into the `T` prefix.
    pub fn type_id(&self, batch: KvBatch, name: &str) -> CoreResult<(KvBatch, u32)> {
        let mut types = self.types.lock();
        let existed = types.lookup(name)?.is_some();
        let id = types.get_or_create(name)?;
        if existed {
            return Ok((batch, id));
        }
        let mut encoded = Vec::new();
        encode_uint(&mut encoded, id);
        Ok((batch.put(type_key(name), encoded), id))
    }

    pub fn value_id(&self, batch: KvBatch, type_id: u32, value: &[u8]) -> CoreResult<(KvBatch, u32)> {
        let mut values = self.values.lock();
        let existed = values.lookup(type_id, value)?.is_some();
        let id = values.get_or_create(type_id, value)?;
        if existed {
            return Ok((batch, id));
        }
        let mut encoded = Vec::new();
        encode_uint(&mut encoded, id);
        Ok((batch.put(value_key(type_id, value), encoded), id))
    }

    /// Stages one posting block for `term_id` covering `postings` (already
    /// sorted by docno then position), keyed by the block's last docno so
    /// range scans over a term visit blocks in ascending order.
    pub fn stage_postings(batch: KvBatch, term_id: u64, postings: &[Posting]) -> KvBatch {
        if postings.is_empty() {
            return batch;
        }
        let last_docno = postings.last().unwrap().docno.get();
        batch.put(posting_key(term_id, last_docno), encode_block(postings))
    }

    /// Loads every posting block for `term_id`, concatenated in block
    /// order, decoded back into a flat posting list.
    pub async fn load_postings(&self, term_id: u64) -> Result<Vec<Posting>> {
        let mut prefix = vec![POSTING_PREFIX];
        encode_uint(&mut prefix, (term_id >> 32) as u32);
        encode_uint(&mut prefix, term_id as u32);
        let mut out = Vec::new();
        for (_, block) in self.store.scan_prefix(&prefix).await? {
            out.extend(decode_block(&block)?);
        }
        Ok(out)
    }

    /// Stages forward-index entries for one document.
    pub fn stage_forward_index(batch: KvBatch, type_id: u32, docno: u64, entries: &[ForwardIndexEntry]) -> KvBatch {
        ForwardIndex::stage(batch, type_id, docno, entries)
    }

    /// Applies df changes to the in-memory cache and stages their
    /// persisted `G` counters in the same batch, and stages each change's
    /// `(term_type, term_value, delta)` into the pending statistics chunk
    /// (spec §3: "df deltas are simultaneously appended to the statistics
    /// log"). `commit` flushes that staged chunk to the statistics log in
    /// the same call that commits `batch` to the KV store.
    pub fn apply_and_stage_df_changes(&self, mut batch: KvBatch, changes: &[DfChange]) -> CoreResult<KvBatch> {
        let increments: Vec<DfIncrement> = changes.iter().map(|c| c.increment).collect();
        self.statistics.apply_batch(&increments)?;
        let mut builder = self.statistics_builder.lock();
        for change in changes {
            let current = self.statistics.get(change.increment.type_id, change.increment.term_id);
            let mut encoded = Vec::new();
            encode_uint(&mut encoded, current.max(0) as u32);
            batch = batch.put(global_df_key(change.increment.type_id, change.increment.term_id), encoded);
            builder.add_df_change(&change.term_type, &change.term_value, change.increment.delta as i32)?;
        }
        Ok(batch)
    }

    /// Stages the scalar total-documents-inserted counter.
    pub fn stage_nof_documents(batch: KvBatch, total: u32) -> KvBatch {
        let mut encoded = Vec::new();
        encode_uint(&mut encoded, total);
        batch.put(NOF_DOCUMENTS_KEY.to_vec(), encoded)
    }

    /// Stages this commit's contribution to the statistics log's
    /// nof-documents-inserted delta, alongside its df changes.
    pub fn stage_nof_documents_change(&self, delta: i32) -> CoreResult<()> {
        self.statistics_builder.lock().add_nof_documents_inserted_change(delta)
    }

    pub async fn nof_documents_inserted(&self) -> Result<u32> {
        match self.store.get(NOF_DOCUMENTS_KEY).await? {
            Some(bytes) => Ok(decode_uint(&bytes)?.0),
            None => Ok(0),
        }
    }

    /// Decodes and applies one statistics chunk received from a peer shard
    /// (spec §4.7): resolves each entry's `(term_type, term_value)` to this
    /// shard's own ids — assigning fresh ones for terms never seen here —
    /// applies the delta through the same path a local commit uses, and
    /// replies with this shard's own contribution for any term the peer
    /// believed was new but that this shard already tracks.
    pub fn ingest_peer_chunk(&self, mut batch: KvBatch, chunk: &[u8]) -> CoreResult<(KvBatch, Vec<PeerReplyEntry>)> {
        let mut viewer = StatisticsViewer::new(chunk)?;
        let mut txn = PeerTransaction::new();
        while let Some(entry) = viewer.next_entry()? {
            let is_new = self.lookup_term_id(&entry.term_type, &entry.term_value)?.is_none();
            txn.push(PeerDfChange { term_type: entry.term_type, term_value: entry.term_value, delta: entry.delta, is_new });
        }

        let (deltas, reply) = txn.commit(|term_type, term_value| {
            self.lookup_term_id(term_type, term_value)
                .ok()
                .flatten()
                .map(|(type_id, term_id)| self.statistics.get(type_id, term_id))
        });

        let mut df_changes = Vec::with_capacity(deltas.len());
        for delta in deltas {
            let (b, type_id) = self.type_id(batch, &delta.term_type)?;
            batch = b;
            let (b, term_id) = self.value_id(batch, type_id, delta.term_value.as_bytes())?;
            batch = b;
            df_changes.push(DfChange {
                increment: DfIncrement { type_id, term_id, delta: delta.delta as i64 },
                term_type: delta.term_type,
                term_value: delta.term_value,
            });
        }
        batch = self.apply_and_stage_df_changes(batch, &df_changes)?;
        Ok((batch, reply))
    }

    fn lookup_term_id(&self, term_type: &str, term_value: &str) -> CoreResult<Option<(u32, u32)>> {
        let Some(type_id) = self.types.lock().lookup(term_type)? else { return Ok(None) };
        let value_id = self.values.lock().lookup(type_id, term_value.as_bytes())?;
        Ok(value_id.map(|v| (type_id, v)))
    }

    /// Commits `batch` to the KV store and, in the same call, builds and
    /// persists any df changes staged since the last commit to the
    /// statistics log — the two halves of spec §3's "atomically
    /// batch-applied... and simultaneously appended" commit discipline.
    pub async fn commit(&self, batch: KvBatch) -> Result<()> {
        let chunks = self.statistics_builder.lock().commit();
        self.store.commit(batch).await?;
        if !chunks.is_empty() {
            self.statistics_log.lock().await.commit_chunks(chunks).await?;
        }
        Ok(())
    }
}

/// One df delta ready to apply: both its resolved numeric ids (for the
/// in-memory cache and the `G` counters) and its term name (for the
/// statistics wire chunk, which is keyed by name since a receiving shard
/// hasn't necessarily assigned the same term-id).
#[derive(Debug, Clone)]
pub struct DfChange {
    pub increment: DfIncrement,
    pub term_type: String,
    pub term_value: String,
}
