//! File-backed ledger store writing newline-delimited JSON entries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::entry::LedgerEntry;
use crate::store::LedgerStore;
use crate::LedgerResult;

/// Append-only journal file holding one JSON entry per line.
pub struct FileLedgerStore {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileLedgerStore {
    /// Opens (or creates) a journal file at the provided path.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while preparing the file.
    pub async fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the underlying path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the entries of an existing journal without opening it for
    /// writing. A missing file is an error, never an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LedgerError::Io`] when the file cannot be read
    /// (including `NotFound`) and [`crate::LedgerError::Serialization`] for a
    /// malformed line.
    pub async fn read_entries(path: impl AsRef<Path>) -> LedgerResult<Vec<LedgerEntry>> {
        let data = fs::read(path.as_ref()).await?;
        parse_lines(&data)
    }
}

fn parse_lines(data: &[u8]) -> LedgerResult<Vec<LedgerEntry>> {
    let mut entries = Vec::new();
    for chunk in data
        .split(|byte| *byte == b'\n')
        .filter(|chunk| !chunk.is_empty())
    {
        entries.push(serde_json::from_slice(chunk)?);
    }
    Ok(entries)
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn save_entry(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut guard = self.file.lock().await;
        guard.write_all(&line).await?;
        guard.flush().await?;
        guard.sync_data().await?;
        Ok(())
    }

    async fn load_all_entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        // Hold the writer lock so a concurrent save cannot leave a half line.
        let _guard = self.file.lock().await;
        let data = fs::read(&self.path).await?;
        parse_lines(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerChain, LedgerError};
    use serde_json::{Map, json};
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("ledger-journal-{}.jsonl", Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn persists_and_restores_chain() {
        let path = temp_path();
        let store = FileLedgerStore::open(&path).await.unwrap();
        let chain = LedgerChain::restore(&store).await.unwrap();

        for n in 0..3 {
            let mut data = Map::new();
            data.insert("n".into(), json!(n));
            let entry = chain.append("decision", data);
            store.save_entry(&entry).await.unwrap();
        }

        let reopened = FileLedgerStore::open(&path).await.unwrap();
        let restored = LedgerChain::restore(&reopened).await.unwrap();
        assert_eq!(restored.entries(), chain.entries());
        assert_eq!(reopened.entries_by_type("decision").await.unwrap().len(), 3);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn tampered_line_is_rejected_on_restore() {
        let path = temp_path();
        let store = FileLedgerStore::open(&path).await.unwrap();
        let chain = LedgerChain::restore(&store).await.unwrap();
        let mut data = Map::new();
        data.insert("decision".into(), json!("deny"));
        store.save_entry(&chain.append("decision", data)).await.unwrap();
        drop(store);

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replace("\"deny\"", "\"permit\"")).unwrap();

        let reopened = FileLedgerStore::open(&path).await.unwrap();
        let err = LedgerChain::restore(&reopened).await.unwrap_err();
        assert!(matches!(err, LedgerError::Integrity(_)));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn reading_entries_never_creates_the_file() {
        let path = temp_path();
        let err = FileLedgerStore::read_entries(&path).await.unwrap_err();
        assert!(matches!(err, LedgerError::Io { ref source } if source.kind() == std::io::ErrorKind::NotFound));
        assert!(!path.exists());

        let store = FileLedgerStore::open(&path).await.unwrap();
        let chain = LedgerChain::restore(&store).await.unwrap();
        store.save_entry(&chain.append("decision", Map::new())).await.unwrap();
        drop(store);

        let before = std::fs::read(&path).unwrap();
        let entries = FileLedgerStore::read_entries(&path).await.unwrap();
        assert_eq!(entries, chain.entries());
        assert_eq!(std::fs::read(&path).unwrap(), before);

        let _ = std::fs::remove_file(path);
    }
}
