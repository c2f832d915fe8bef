use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::domain::EnrollmentRecord;
use super::store::{ledger_row, EnrollmentStore, StorageError, LEDGER_FILE, LEDGER_HEADER};

/// Filesystem-backed store: one pretty-printed JSON file per record plus a
/// shared append-only CSV ledger, all inside a dedicated directory.
///
/// Ledger writes are serialized through a single-writer lock and use an
/// append-mode handle, so concurrent submissions cannot lose rows.
pub struct FilesystemEnrollmentStore {
    dir: PathBuf,
    ledger_lock: Mutex<()>,
}

impl FilesystemEnrollmentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            ledger_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    async fn append_ledger_row(&self, record: &EnrollmentRecord) -> Result<(), StorageError> {
        let row = ledger_row(record)?;

        let _guard = self.ledger_lock.lock().await;
        let path = self.dir.join(LEDGER_FILE);
        let fresh = !fs::try_exists(&path).await?;

        let mut ledger = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        if fresh {
            ledger.write_all(LEDGER_HEADER.as_bytes()).await?;
            ledger.write_all(b"\n").await?;
        }
        ledger.write_all(row.as_bytes()).await?;
        ledger.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for FilesystemEnrollmentStore {
    async fn save(&self, record: &EnrollmentRecord) -> Result<String, StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.json", record.file_stem());
        let payload = serde_json::to_vec_pretty(record)?;
        fs::write(self.dir.join(&file_name), payload).await?;

        self.append_ledger_row(record).await?;

        Ok(format!("Enrollment saved locally: {file_name}"))
    }

    async fn list(&self) -> Result<Vec<EnrollmentRecord>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<EnrollmentRecord>(&bytes) {
                Ok(record) => records.push(record),
                // A stray or truncated file should not take down the dashboard.
                Err(err) => warn!(file = %path.display(), %err, "skipping unreadable enrollment file"),
            }
        }

        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    async fn ledger_csv(&self) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.dir.join(LEDGER_FILE)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}
