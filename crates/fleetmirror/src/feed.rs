//! Sources of remote change batches
//!
//! The remote source commits changes in batches that share one collection
//! version. Feeds deliver those batches in commit order.

use async_trait::async_trait;
use fleetmirror_core::{
    error::{MirrorError, Result},
    types::RemoteChange,
};
use std::collections::VecDeque;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

#[async_trait]
pub trait ChangeFeed: Send {
    /// Next batch in commit order, `None` once the feed is exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<RemoteChange>>>;
}

/// Group consecutive changes that share a collection and version
pub fn group_batches(changes: impl IntoIterator<Item = RemoteChange>) -> Vec<Vec<RemoteChange>> {
    let mut batches: Vec<Vec<RemoteChange>> = Vec::new();
    for change in changes {
        if let Some(batch) = batches.last_mut() {
            if same_batch(&batch[0], &change) {
                batch.push(change);
                continue;
            }
        }
        batches.push(vec![change]);
    }
    batches
}

fn same_batch(a: &RemoteChange, b: &RemoteChange) -> bool {
    a.collection == b.collection && a.version == b.version
}

/// Feed over batches held in memory
#[derive(Debug, Default)]
pub struct VecChangeFeed {
    batches: VecDeque<Vec<RemoteChange>>,
}

impl VecChangeFeed {
    pub fn new(batches: Vec<Vec<RemoteChange>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Build from a flat list of changes, grouping same-version runs
    pub fn from_changes(changes: impl IntoIterator<Item = RemoteChange>) -> Self {
        Self::new(group_batches(changes))
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait]
impl ChangeFeed for VecChangeFeed {
    async fn next_batch(&mut self) -> Result<Option<Vec<RemoteChange>>> {
        Ok(self.batches.pop_front())
    }
}

/// Feed over a recorded stream, one JSON [`RemoteChange`] per line
///
/// Blank lines are skipped. Consecutive lines with the same collection and
/// version form one batch.
pub struct JsonLinesChangeFeed {
    lines: Lines<BufReader<tokio::fs::File>>,
    line_no: usize,
    lookahead: Option<RemoteChange>,
}

impl JsonLinesChangeFeed {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            lookahead: None,
        })
    }

    async fn read_change(&mut self) -> Result<Option<RemoteChange>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let change = serde_json::from_str(line).map_err(|e| {
                MirrorError::Serialization(format!("line {}: {}", self.line_no, e))
            })?;
            return Ok(Some(change));
        }
        Ok(None)
    }
}

#[async_trait]
impl ChangeFeed for JsonLinesChangeFeed {
    async fn next_batch(&mut self) -> Result<Option<Vec<RemoteChange>>> {
        let first = match self.lookahead.take() {
            Some(change) => change,
            None => match self.read_change().await? {
                Some(change) => change,
                None => return Ok(None),
            },
        };

        let mut batch = vec![first];
        while let Some(change) = self.read_change().await? {
            if same_batch(&batch[0], &change) {
                batch.push(change);
            } else {
                self.lookahead = Some(change);
                break;
            }
        }
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmirror_core::types::Document;

    fn change(collection: &str, id: &str, version: i64) -> RemoteChange {
        RemoteChange::inserted(collection, Document::new(id), version)
    }

    #[test]
    fn test_group_batches() {
        let batches = group_batches(vec![
            change("trackers", "a", 1),
            change("trackers", "b", 1),
            change("references", "r", 1),
            change("trackers", "c", 2),
        ]);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
    }

    #[tokio::test]
    async fn test_vec_feed_drains() {
        let mut feed = VecChangeFeed::from_changes(vec![change("trackers", "a", 1)]);
        assert_eq!(feed.next_batch().await.unwrap().unwrap().len(), 1);
        assert!(feed.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_lines_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.jsonl");
        let lines = [
            r#"{"collection":"trackers","kind":"inserted","id":"a","fields":{"vID":"A"},"version":1}"#,
            r#"{"collection":"trackers","kind":"inserted","id":"b","fields":{"vID":"B"},"version":1}"#,
            "",
            r#"{"collection":"trackers","kind":"deleted","id":"a","version":2}"#,
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let mut feed = JsonLinesChangeFeed::open(&path).await.unwrap();
        assert_eq!(feed.next_batch().await.unwrap().unwrap().len(), 2);
        let second = feed.next_batch().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].version, 2);
        assert!(feed.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_lines_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("changes.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let mut feed = JsonLinesChangeFeed::open(&path).await.unwrap();
        match feed.next_batch().await {
            Err(MirrorError::Serialization(msg)) => assert!(msg.starts_with("line 1")),
            other => panic!("unexpected: {:?}", other.map(|b| b.map(|b| b.len()))),
        }
    }
}
