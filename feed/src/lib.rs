#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Append-only feed abstractions over the game's broadcast console.
//!
//! The hosting page exposes an event log that only ever grows; consumers such
//! as the broadcast monitor care about newly appended lines, never history.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::broadcast};
use uuid::Uuid;

/// One appended line of the broadcast console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Unique identifier.
    pub id: Uuid,
    /// When the line was observed.
    pub observed_at: DateTime<Utc>,
    /// Raw console text, e.g. `BROADCAST | zer0day lost 4.2 coins to ...`.
    pub line: String,
}

impl FeedEntry {
    /// Wraps a raw console line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            observed_at: Utc::now(),
            line: line.into(),
        }
    }
}

/// Producer side of the feed.
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    /// Appends an entry to the feed.
    async fn publish(&self, entry: FeedEntry) -> Result<()>;
}

/// Consumer side of the feed.
#[async_trait]
pub trait FeedSubscriber: Send + Sync {
    /// Starts receiving entries appended after the call.
    async fn subscribe(&self) -> Result<broadcast::Receiver<FeedEntry>>;
}

/// In-memory broadcast feed with a bounded backlog of recent entries.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    sender: broadcast::Sender<FeedEntry>,
    backlog: Arc<Mutex<VecDeque<FeedEntry>>>,
    capacity: usize,
}

impl MemoryFeed {
    /// Creates a feed retaining up to `capacity` recent entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Snapshot of recent entries retained in memory.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FeedEntry> {
        self.backlog.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl FeedPublisher for MemoryFeed {
    async fn publish(&self, entry: FeedEntry) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            backlog.push_back(entry.clone());
            while backlog.len() > self.capacity {
                backlog.pop_front();
            }
        }
        let _ = self.sender.send(entry);
        Ok(())
    }
}

#[async_trait]
impl FeedSubscriber for MemoryFeed {
    async fn subscribe(&self) -> Result<broadcast::Receiver<FeedEntry>> {
        Ok(self.sender.subscribe())
    }
}

/// File-backed publisher keeping a durable JSONL trace of the feed.
#[derive(Debug, Clone)]
pub struct FileFeedWriter {
    path: PathBuf,
}

impl FileFeedWriter {
    /// Creates a writer that appends JSON lines to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl FeedPublisher for FileFeedWriter {
    async fn publish(&self, entry: FeedEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let data = serde_json::to_vec(&entry)?;
        file.write_all(&data).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn publishes_and_receives() {
        let feed = MemoryFeed::new(16);
        let mut rx = feed.subscribe().await.unwrap();
        feed.publish(FeedEntry::new("BROADCAST | hello")).await.unwrap();
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.line, "BROADCAST | hello");
    }

    #[tokio::test]
    async fn backlog_is_bounded() {
        let feed = MemoryFeed::new(2);
        for n in 0..5 {
            feed.publish(FeedEntry::new(format!("line {n}"))).await.unwrap();
        }
        let recent = feed.snapshot();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].line, "line 3");
    }

    #[tokio::test]
    async fn file_writer_appends_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        let writer = FileFeedWriter::new(&path).unwrap();
        writer.publish(FeedEntry::new("durable line")).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("durable line"));
    }
}
