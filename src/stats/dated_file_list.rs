//! On-disk statistics log (spec §4.6/§6): one file per committed chunk,
//! named `stats_<timestamp>.bin`, written via temp-file-plus-rename.
//! Grounded in `statsproc/datedFileList.cpp`'s filename scheme and
//! all-or-nothing commit sweep.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::types::Timestamp;

const FILE_PREFIX: &str = "stats_";
const FILE_SUFFIX: &str = ".bin";
const TMP_SUFFIX: &str = ".tmp";

pub struct DatedFileList {
    dir: PathBuf,
    next_counter: u32,
}

impl DatedFileList {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.context("creating statistics log directory")?;
        Ok(Self { dir, next_counter: 0 })
    }

    fn filename(ts: Timestamp) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", ts.to_sortable_string())
    }

    fn allocate_timestamp(&mut self) -> Timestamp {
        let ts = Timestamp::now_with_counter(self.next_counter);
        self.next_counter = self.next_counter.wrapping_add(1);
        ts
    }

    /// Writes every chunk as its own file under a freshly allocated
    /// timestamp, each via temp-extension-then-rename. If any write fails,
    /// every temp and already-renamed file from this call is removed and
    /// the error is returned — the whole commit publishes, or nothing
    /// does.
    pub async fn commit_chunks(&mut self, chunks: Vec<Vec<u8>>) -> Result<Vec<Timestamp>> {
        let mut written = Vec::new();
        let mut timestamps = Vec::new();
        for chunk in &chunks {
            let ts = self.allocate_timestamp();
            let final_path = self.dir.join(Self::filename(ts));
            let mut tmp_name = final_path.clone().into_os_string();
            tmp_name.push(TMP_SUFFIX);
            let tmp_path = PathBuf::from(tmp_name);

            if let Err(e) = Self::write_and_rename(&tmp_path, &final_path, chunk).await {
                for path in &written {
                    let _ = tokio::fs::remove_file(path).await;
                }
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
            written.push(final_path);
            timestamps.push(ts);
        }
        Ok(timestamps)
    }

    async fn write_and_rename(tmp_path: &Path, final_path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(tmp_path, bytes).await.context("writing temp statistics chunk")?;
        tokio::fs::rename(tmp_path, final_path).await.context("renaming statistics chunk into place")?;
        Ok(())
    }

    /// Chunks whose filename-timestamp is strictly newer than `ts`, in
    /// timestamp order.
    pub async fn iter_after(&self, ts: Timestamp) -> Result<Vec<(Timestamp, Vec<u8>)>> {
        let mut entries = self.list_entries().await?;
        entries.retain(|(file_ts, _)| *file_ts > ts);
        entries.sort_by_key(|(file_ts, _)| *file_ts);
        let mut out = Vec::with_capacity(entries.len());
        for (file_ts, path) in entries {
            let bytes = tokio::fs::read(&path).await.context("reading statistics chunk")?;
            out.push((file_ts, bytes));
        }
        Ok(out)
    }

    /// Deletes every chunk whose filename-timestamp is ≤ `ts`.
    pub async fn release(&self, ts: Timestamp) -> Result<usize> {
        let entries = self.list_entries().await?;
        let mut removed = 0;
        for (file_ts, path) in entries {
            if file_ts <= ts {
                tokio::fs::remove_file(&path).await.context("removing retained statistics chunk")?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn list_entries(&self) -> Result<Vec<(Timestamp, PathBuf)>> {
        let mut out = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await.context("listing statistics log directory")?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix(FILE_PREFIX).and_then(|s| s.strip_suffix(FILE_SUFFIX)) {
                if let Ok(ts) = Timestamp::from_sortable_string(rest) {
                    out.push((ts, entry.path()));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_then_iterate_after_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = DatedFileList::open(dir.path()).await.unwrap();
        let before = Timestamp::now_with_counter(0);
        let timestamps = log.commit_chunks(vec![b"chunk-a".to_vec(), b"chunk-b".to_vec()]).await.unwrap();
        assert_eq!(timestamps.len(), 2);

        let after = log.iter_after(before).await.unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].1, b"chunk-a".to_vec());
    }

    #[tokio::test]
    async fn release_deletes_up_to_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = DatedFileList::open(dir.path()).await.unwrap();
        let timestamps = log.commit_chunks(vec![b"a".to_vec()]).await.unwrap();
        let cutoff = timestamps[0];
        let removed = log.release(cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert!(log.iter_after(Timestamp::new(0, 0).unwrap()).await.unwrap().is_empty());
    }
}
