//! Audit Sinks

use crate::{AuditError, AuditRecord};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Destination for serialized audit lines.
///
/// Implementations must serialize physical writes: concurrent producers may
/// interleave whole lines but never partial ones.
pub trait AuditSink: Send + Sync {
    /// Append one already-serialized line (without trailing newline)
    fn append(&self, line: &str) -> Result<(), AuditError>;
}

/// JSON-lines file opened in append mode
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) the audit file, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Audit log opened at {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileSink {
    fn append(&self, line: &str) -> Result<(), AuditError> {
        let mut file = self.file.lock().map_err(|_| AuditError::LockPoisoned)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory sink, used by tests and dry runs
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lines in append order
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Parsed records in append order; unparsable lines are skipped
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemorySink {
    fn append(&self, line: &str) -> Result<(), AuditError> {
        let mut lines = self.lines.lock().map_err(|_| AuditError::LockPoisoned)?;
        lines.push(line.to_string());
        debug!("Audit record #{} buffered", lines.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.log");

        let sink = FileSink::open(&path).unwrap();
        sink.append(r#"{"a":1}"#).unwrap();
        sink.append(r#"{"a":2}"#).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn test_file_sink_preserves_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "{\"old\":true}\n").unwrap();

        let sink = FileSink::open(&path).unwrap();
        sink.append(r#"{"new":true}"#).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("{\"old\":true}\n"));
        assert!(contents.ends_with("{\"new\":true}\n"));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.append("x").unwrap();
        assert_eq!(sink.lines(), vec!["x".to_string()]);
        // "x" is not a record
        assert!(sink.records().is_empty());
    }
}
