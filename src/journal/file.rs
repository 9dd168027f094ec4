//! JSON-lines file journal
//!
//! Events are appended one per line to `events.jsonl` with fsync, then
//! published to live subscribers. Historical scans read the file lazily,
//! one page at a time, using the line number as the cursor.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Broadcaster, JournalStore, LiveHandler, LiveNotifier, Page, Scope, SubscriptionId};
use crate::types::{Event, JournalError, JournalResult};
use crate::utils::next_monotonic_timestamp;

/// Configuration for the FileJournal
#[derive(Debug, Clone)]
pub struct FileJournalConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
}

impl Default for FileJournalConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl FileJournalConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to events.jsonl
    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }
}

/// Scan position inside a `FileJournal`
#[derive(Debug, Clone)]
pub struct FileCursor {
    scope: Scope,
    line: usize,
}

#[derive(Default)]
struct WriterState {
    highest: HashMap<String, u64>,
    last_timestamp: i64,
}

/// Append-only journal stored as JSON lines
pub struct FileJournal {
    config: FileJournalConfig,
    writer: Mutex<WriterState>,
    broadcaster: Broadcaster,
}

impl FileJournal {
    /// Open (or create) a journal, recovering sequence numbers from disk
    pub fn open(config: FileJournalConfig) -> JournalResult<Self> {
        std::fs::create_dir_all(config.data_dir())?;

        let mut state = WriterState::default();
        let (events, _) = read_lines(&config.events_path(), 0, usize::MAX)?;
        for event in &events {
            let highest = state.highest.entry(event.persistence_id.clone()).or_insert(0);
            *highest = (*highest).max(event.sequence_nr);
            state.last_timestamp = state.last_timestamp.max(event.timestamp);
        }
        tracing::debug!(
            path = %config.events_path().display(),
            events = events.len(),
            entities = state.highest.len(),
            "opened file journal"
        );

        Ok(Self {
            config,
            writer: Mutex::new(state),
            broadcaster: Broadcaster::new(),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &FileJournalConfig {
        &self.config
    }

    /// Append a payload for an entity
    ///
    /// The event is synced to disk before live subscribers hear about it.
    pub fn append(&self, persistence_id: &str, payload: serde_json::Value) -> JournalResult<Event> {
        let mut state = self.writer.lock();
        let sequence_nr = state.highest.get(persistence_id).copied().unwrap_or(0) + 1;
        let timestamp = next_monotonic_timestamp(state.last_timestamp);
        let event = Event::with_timestamp(persistence_id, sequence_nr, timestamp, payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.events_path())?;
        writeln!(file, "{}", event.to_json_line()?)?;
        file.sync_all()?;

        state.highest.insert(event.persistence_id.clone(), sequence_nr);
        state.last_timestamp = timestamp;
        self.broadcaster.publish(&event);
        Ok(event)
    }

    /// Highest sequence number written for an entity, 0 if none
    pub fn highest_sequence_nr(&self, persistence_id: &str) -> u64 {
        self.writer.lock().highest.get(persistence_id).copied().unwrap_or(0)
    }

    /// The live notifier attached to this journal
    pub fn notifier(&self) -> &Broadcaster {
        &self.broadcaster
    }
}

/// Read up to `at_most` events starting at line `skip`
///
/// Returns the events and the line number after the last one consumed, or
/// `None` when the end of the file was reached.
fn read_lines(path: &Path, skip: usize, at_most: usize) -> JournalResult<(Vec<Event>, Option<usize>)> {
    if !path.exists() {
        return Ok((Vec::new(), None));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate().skip(skip) {
        if events.len() >= at_most {
            return Ok((events, Some(line_num)));
        }
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        match Event::from_json_line(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skipping unparseable journal line");
            }
        }
    }

    Ok((events, None))
}

#[async_trait]
impl JournalStore for FileJournal {
    type Cursor = FileCursor;

    async fn resolve_initial_cursor(&self, scope: &Scope) -> JournalResult<FileCursor> {
        let path = self.config.events_path();
        if !self.config.data_dir().is_dir() {
            return Err(JournalError::CursorUnavailable(format!(
                "journal directory {} is missing",
                self.config.data_dir().display()
            )));
        }
        tracing::trace!(path = %path.display(), ?scope, "resolved file cursor");
        Ok(FileCursor {
            scope: scope.clone(),
            line: 0,
        })
    }

    async fn fetch_page(&self, cursor: FileCursor, at_most: usize) -> JournalResult<Page<FileCursor>> {
        let path = self.config.events_path();
        let mut events = Vec::new();
        let mut line = cursor.line;

        // Keep reading until the page is full of in-scope events or the file ends
        loop {
            let blocking_path = path.clone();
            let wanted = at_most - events.len();
            let (batch, next_line) =
                tokio::task::spawn_blocking(move || read_lines(&blocking_path, line, wanted))
                    .await
                    .map_err(|e| JournalError::Backend(format!("file reader task failed: {}", e)))??;

            events.extend(batch.into_iter().filter(|e| cursor.scope.matches(e)));
            match next_line {
                Some(next) if events.len() < at_most => line = next,
                Some(next) => {
                    return Ok(Page {
                        events,
                        next: Some(FileCursor {
                            scope: cursor.scope,
                            line: next,
                        }),
                    })
                }
                None => return Ok(Page::last(events)),
            }
        }
    }
}

impl LiveNotifier for FileJournal {
    fn subscribe(&self, handler: LiveHandler) -> SubscriptionId {
        self.broadcaster.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.broadcaster.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_journal() -> (FileJournal, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let journal = FileJournal::open(FileJournalConfig::new(temp_dir.path())).unwrap();
        (journal, temp_dir)
    }

    #[test]
    fn test_append_writes_json_lines() {
        let (journal, _temp_dir) = create_test_journal();

        let first = journal.append("acct-1", json!({"amount": 5})).unwrap();
        let second = journal.append("acct-1", json!({"amount": 7})).unwrap();
        assert_eq!(first.sequence_nr, 1);
        assert_eq!(second.sequence_nr, 2);

        let content = std::fs::read_to_string(journal.config().events_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(Event::from_json_line(lines[1]).unwrap(), second);
    }

    #[test]
    fn test_reopen_recovers_sequence_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileJournalConfig::new(temp_dir.path());
        {
            let journal = FileJournal::open(config.clone()).unwrap();
            journal.append("a", json!(1)).unwrap();
            journal.append("a", json!(2)).unwrap();
            journal.append("b", json!(1)).unwrap();
        }

        let journal = FileJournal::open(config).unwrap();
        assert_eq!(journal.highest_sequence_nr("a"), 2);
        assert_eq!(journal.append("a", json!(3)).unwrap().sequence_nr, 3);
        assert_eq!(journal.append("c", json!(1)).unwrap().sequence_nr, 1);
    }

    #[tokio::test]
    async fn test_pages_fill_with_in_scope_events() {
        let (journal, _temp_dir) = create_test_journal();
        for i in 0..4 {
            journal.append("a", json!(i)).unwrap();
            journal.append("b", json!(i)).unwrap();
        }

        let cursor = journal
            .resolve_initial_cursor(&Scope::entity("b", 1, u64::MAX))
            .await
            .unwrap();
        let page = journal.fetch_page(cursor, 3).await.unwrap();
        let seqs: Vec<u64> = page.events.iter().map(|e| e.sequence_nr).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        let last = journal.fetch_page(page.next.unwrap(), 3).await.unwrap();
        assert_eq!(last.events.len(), 1);
        assert_eq!(last.events[0].sequence_nr, 4);
        assert!(last.next.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_lines_are_skipped() {
        let (journal, _temp_dir) = create_test_journal();
        journal.append("a", json!(1)).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(journal.config().events_path())
                .unwrap();
            writeln!(file, "{{not json").unwrap();
        }
        journal.append("a", json!(2)).unwrap();

        let cursor = journal.resolve_initial_cursor(&Scope::all(0)).await.unwrap();
        let page = journal.fetch_page(cursor, 10).await.unwrap();
        assert_eq!(page.events.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_fails_cursor_resolution() {
        let (journal, temp_dir) = create_test_journal();
        drop(temp_dir);

        let result = journal.resolve_initial_cursor(&Scope::all(0)).await;
        assert!(matches!(result, Err(JournalError::CursorUnavailable(_))));
    }
}
