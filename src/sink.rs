//! Append-only result file shared by every batch

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SweepError};

/// Line-oriented output file, one reachable domain per line.
///
/// Every append runs inside a single-writer critical section: lock, open in
/// append mode, write the whole line at once, flush, unlock.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    writer: Mutex<()>,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file if it does not exist yet, leaving existing content alone
    pub fn ensure_exists(&self) -> Result<()> {
        let _guard = self.writer.lock();
        self.open().map(|_| ())
    }

    /// Append `domain` followed by a newline. No duplicate suppression.
    pub fn append(&self, domain: &str) -> Result<()> {
        let line = format!("{}\n", domain);

        let _guard = self.writer.lock();
        let mut file = self.open()?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SweepError::persistence(&self.path, e.to_string()))?;

        tracing::debug!(domain = %domain, path = %self.path.display(), "Result appended");
        Ok(())
    }

    /// [`append`](Self::append) on the blocking pool, for callers on async workers
    pub async fn append_async(self: Arc<Self>, domain: String) -> Result<()> {
        tokio::task::spawn_blocking(move || self.append(&domain))
            .await
            .map_err(|e| SweepError::internal(format!("sink write task failed: {}", e)))?
    }

    fn open(&self) -> Result<std::fs::File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SweepError::persistence(&self.path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("sites.txt"));

        sink.append("abc.com").unwrap();
        sink.append("x9.net").unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "abc.com\nx9.net\n");
    }

    #[test]
    fn test_same_domain_twice_gives_two_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("sites.txt"));

        sink.append("dup.org").unwrap();
        sink.append("dup.org").unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec!["dup.org", "dup.org"]);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_ensure_exists_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.txt");
        std::fs::write(&path, "old.com\n").unwrap();

        let sink = ResultSink::new(&path);
        sink.ensure_exists().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old.com\n");
    }

    #[test]
    fn test_unwritable_destination_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("missing").join("sites.txt"));

        let err = sink.append("abc.com").unwrap_err();
        assert!(matches!(err, SweepError::Persistence { .. }));
    }

    #[tokio::test]
    async fn test_async_append_from_many_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(ResultSink::new(dir.path().join("sites.txt")));

        let tasks: Vec<_> = (0..32)
            .map(|i| tokio::spawn(Arc::clone(&sink).append_async(format!("t{}.org", i))))
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 32);
        assert!(content.lines().all(|l| l.starts_with('t') && l.ends_with(".org")));
    }

    #[tokio::test]
    async fn test_async_append_reports_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(ResultSink::new(dir.path().join("missing").join("sites.txt")));

        let err = sink.append_async("abc.com".to_string()).await.unwrap_err();
        assert!(matches!(err, SweepError::Persistence { .. }));
    }

    #[test]
    fn test_concurrent_appends_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(ResultSink::new(dir.path().join("sites.txt")));
        let writers = 16;
        let per_writer = 50;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..per_writer {
                        sink.append(&format!("w{}n{}.com", w, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), writers * per_writer);

        let line_re = regex::Regex::new(r"^w\d+n\d+\.com$").unwrap();
        assert!(lines.iter().all(|l| line_re.is_match(l)));

        let unique: std::collections::HashSet<_> = lines.iter().collect();
        assert_eq!(unique.len(), writers * per_writer);
    }
}
