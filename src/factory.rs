//! Factory functions for assembling a production-ready [`StorageEngine`].
//!
//! Mirrors the teacher's `create_symbol_storage` / `create_test_symbol_storage`
//! pair: one function wires a durable, `fjall`-backed engine; the other wires
//! an in-memory one for tests, with no UUID-named scratch directories to clean
//! up afterward.

use std::sync::Arc;

use anyhow::Result;

use crate::kvstore::{FjallStore, KvStore, MemoryStore};
use crate::storage::StorageEngine;

/// Opens a durable storage engine rooted at `data_dir`, with the
/// statistics log kept in a `stats` subdirectory alongside the KV store.
pub async fn create_storage_engine(
    data_dir: &str,
    metadata_elements: impl IntoIterator<Item = impl Into<String>>,
) -> Result<Arc<StorageEngine>> {
    let store: Arc<dyn KvStore> = Arc::new(FjallStore::open(data_dir)?);
    let statistics_log_dir = std::path::Path::new(data_dir).join("stats");
    let engine = StorageEngine::open(store, metadata_elements, statistics_log_dir).await?;
    Ok(Arc::new(engine))
}

/// Opens an in-memory storage engine for tests. The KV store never touches
/// disk; the statistics log still needs a real directory to append chunk
/// files to, so this carves out a fresh scratch directory under the
/// system temp root for the process's lifetime rather than threading a
/// cleanup handle through every test.
pub async fn create_test_storage_engine(
    metadata_elements: impl IntoIterator<Item = impl Into<String>>,
) -> Result<Arc<StorageEngine>> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
    let statistics_log_dir =
        std::env::temp_dir().join(format!("proxidex-test-stats-{}-{unique}", std::process::id()));
    let engine = StorageEngine::open(store, metadata_elements, statistics_log_dir).await?;
    Ok(Arc::new(engine))
}

/// Wraps a caller-supplied `KvStore` in a storage engine, for callers that
/// already manage their own backing store (e.g. one shared across shards).
pub async fn create_storage_engine_with_store(
    store: Arc<dyn KvStore>,
    metadata_elements: impl IntoIterator<Item = impl Into<String>>,
    statistics_log_dir: impl AsRef<std::path::Path>,
) -> Result<Arc<StorageEngine>> {
    let engine = StorageEngine::open(store, metadata_elements, statistics_log_dir).await?;
    Ok(Arc::new(engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_storage_engine_starts_empty() {
        let engine = create_test_storage_engine(["doclen"]).await.unwrap();
        assert_eq!(engine.nof_documents_inserted().await.unwrap(), 0);
    }
}
