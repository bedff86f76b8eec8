//! Payment history: a bounded in-memory ring with JSONL persistence.
//!
//! Each completed payment appends one JSON line to `history.jsonl`. When
//! the ring trims its oldest record, the whole file is rewritten with the
//! retained tail so file and memory never diverge. Corrupt lines are
//! skipped on load.

use std::collections::VecDeque;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use payfetch::record::PaymentRecord;

/// Default bound on retained records when no configuration overrides it.
pub const DEFAULT_MAX_RECORDS: usize = 100;

/// Append-only log of completed payments.
#[derive(Debug)]
pub struct PaymentHistory {
    max_records: usize,
    records: Mutex<VecDeque<PaymentRecord>>,
    path: Option<PathBuf>,
}

impl PaymentHistory {
    /// Creates an unpersisted history with the default bound.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            records: Mutex::new(VecDeque::new()),
            path: None,
        }
    }

    /// Creates a history bounded to `max_records`, loading persisted
    /// records from `path` when given.
    ///
    /// Records beyond the bound are dropped oldest-first on load, and
    /// unparseable lines are skipped silently.
    pub async fn load(max_records: usize, path: Option<PathBuf>) -> Self {
        let mut records = VecDeque::new();
        if let Some(path) = &path
            && let Ok(text) = tokio::fs::read_to_string(path).await
        {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Ok(record) = serde_json::from_str::<PaymentRecord>(line) {
                    records.push_back(record);
                }
            }
            while records.len() > max_records {
                records.pop_front();
            }
        }
        Self {
            max_records,
            records: Mutex::new(records),
            path,
        }
    }

    /// Appends a record, trimming the oldest when the ring is full.
    ///
    /// Persistence failures are logged, never raised: the payment
    /// already happened.
    pub async fn append(&self, record: PaymentRecord) {
        let mut records = self.records.lock().await;
        records.push_back(record.clone());
        let trimmed = records.len() > self.max_records;
        if trimmed {
            records.pop_front();
        }

        let Some(path) = &self.path else { return };
        if trimmed {
            self.rewrite(path, &records).await;
        } else {
            self.append_line(path, &record).await;
        }
    }

    /// Returns the retained records, oldest first.
    pub async fn records(&self) -> Vec<PaymentRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    /// Number of retained records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns `true` when no records are retained.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    async fn append_line(&self, path: &PathBuf, record: &PaymentRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "failed serialising history record");
                return;
            }
        };
        if let Some(parent) = path.parent()
            && let Err(err) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(error = %err, "failed creating history directory");
            return;
        }
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed appending history record");
        }
    }

    async fn rewrite(&self, path: &PathBuf, records: &VecDeque<PaymentRecord>) {
        let mut contents = String::new();
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    contents.push_str(&line);
                    contents.push('\n');
                }
                Err(err) => tracing::warn!(error = %err, "failed serialising history record"),
            }
        }
        if let Some(parent) = path.parent()
            && let Err(err) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(error = %err, "failed creating history directory");
            return;
        }
        let tmp = path.with_extension("jsonl.tmp");
        let result = async {
            tokio::fs::write(&tmp, contents.as_bytes()).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed rewriting history file");
        }
    }
}
