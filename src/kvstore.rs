//! Adapter over the external, opaque ordered key-value store (spec §6):
//! get, prefix-bounded iteration, and atomic batch writes. The core only
//! ever depends on the [`KvStore`] trait; [`FjallStore`] is the concrete
//! backing adapter, grounded in the teacher's `Storage` trait shape
//! (`kotadb::contracts::Storage`, `kotadb::file_storage::FileStorage`).

use anyhow::{Context, Result};
use async_trait::async_trait;

/// One all-or-nothing set of writes, matching spec §5's "either the
/// entire batch lands or none does" transaction discipline.
#[derive(Debug, Default, Clone)]
pub struct KvBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl KvBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    pub fn delete(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.deletes.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// The KV contract the core requires: ordered map of byte strings,
/// prefix-bounded iteration, and an atomically-committed batch of
/// put/delete operations. No isolation guarantee beyond what the backing
/// store natively provides (spec §6).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// The first entry with key >= `key`, used by posting-block iterators
    /// to seek to `(type, term, docno)` (spec §6's posting-block key
    /// format).
    async fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>>;

    async fn commit(&self, batch: KvBatch) -> Result<()>;
}

/// `fjall`-backed [`KvStore`]: a single partition holding every key
/// prefix (`T`, `V`, `D`, `I`, `F`, `M`, `A`, `G`, `N`) described in spec
/// §4.5, since `fjall` partitions are already ordered byte-string maps.
pub struct FjallStore {
    partition: fjall::PartitionHandle,
}

impl FjallStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let keyspace = fjall::Config::new(path.as_ref()).open().context("opening fjall keyspace")?;
        let partition = keyspace
            .open_partition("core", fjall::PartitionCreateOptions::default())
            .context("opening fjall partition")?;
        Ok(Self { partition })
    }
}

#[async_trait]
impl KvStore for FjallStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.partition.get(key)?.map(|v| v.to_vec()))
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.partition.prefix(prefix) {
            let (k, v) = entry?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    async fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        for entry in self.partition.range(key.to_vec()..) {
            let (k, v) = entry?;
            return Ok(Some((k.to_vec(), v.to_vec())));
        }
        Ok(None)
    }

    async fn commit(&self, batch: KvBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut write_batch = self.partition.keyspace().batch();
        for (k, v) in batch.puts {
            write_batch.insert(&self.partition, k, v);
        }
        for k in batch.deletes {
            write_batch.remove(&self.partition, k);
        }
        write_batch.commit().context("committing fjall batch")?;
        Ok(())
    }
}

/// In-memory [`KvStore`] used by tests and by callers that do not need
/// durability, matching the teacher's `create_test_symbol_storage` /
/// in-memory-backing convention.
pub struct MemoryStore {
    inner: parking_lot::RwLock<std::collections::BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: parking_lot::RwLock::new(std::collections::BTreeMap::new()) }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .range(key.to_vec()..)
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    async fn commit(&self, batch: KvBatch) -> Result<()> {
        let mut guard = self.inner.write();
        for (k, v) in batch.puts {
            guard.insert(k, v);
        }
        for k in batch.deletes {
            guard.remove(&k);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_batch_is_atomic_in_effect() {
        let store = MemoryStore::new();
        let batch = KvBatch::new().put("a", "1").put("b", "2").delete("missing");
        store.commit(batch).await.unwrap();
        assert_eq!(store.get(b"a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn scan_prefix_is_bounded() {
        let store = MemoryStore::new();
        let batch = KvBatch::new().put("I1", "x").put("I2", "y").put("J1", "z");
        store.commit(batch).await.unwrap();
        let entries = store.scan_prefix(b"I").await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
