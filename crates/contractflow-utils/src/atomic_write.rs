//! Atomic file writes: temp file in the target directory, fsync, rename.
//!
//! On Windows the rename is retried with bounded exponential backoff
//! (≤ 250ms total) because virus scanners and indexers hold transient locks.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

#[cfg(target_os = "windows")]
use std::{thread, time::Duration};

/// Outcome of an atomic write
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Number of rename retries that occurred (Windows only)
    pub rename_retry_count: u32,
    pub warnings: Vec<String>,
}

/// Atomically replace `path` with `content`.
///
/// Readers observe either the previous file or the complete new one.
/// Line endings are normalized to LF.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let mut result = AtomicWriteResult::default();
    let normalized = content.replace("\r\n", "\n");

    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;
    temp_file
        .write_all(normalized.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    let retries = atomic_rename(temp_file, path.as_std_path())
        .with_context(|| format!("Failed to atomically write file: {path}"))?;
    result.rename_retry_count = retries;
    if retries > 0 {
        result.warnings.push(format!(
            "Rename required {retries} retries due to transient filesystem locks"
        ));
    }
    Ok(result)
}

#[cfg(target_os = "windows")]
fn atomic_rename(mut temp_file: NamedTempFile, target: &Path) -> Result<u32> {
    use std::io::ErrorKind;

    const MAX_RETRIES: u32 = 5;
    const INITIAL_DELAY_MS: u64 = 10;
    const MAX_TOTAL_DELAY_MS: u64 = 250;

    let mut retry_count = 0;
    let mut total_delay_ms = 0;

    loop {
        match temp_file.persist(target) {
            Ok(_) => return Ok(retry_count),
            Err(persist_error) => {
                let retryable = matches!(
                    persist_error.error.kind(),
                    ErrorKind::PermissionDenied | ErrorKind::Other
                );
                let delay_ms = INITIAL_DELAY_MS * 2_u64.pow(retry_count);
                if !retryable
                    || retry_count >= MAX_RETRIES
                    || total_delay_ms + delay_ms > MAX_TOTAL_DELAY_MS
                {
                    return Err(anyhow::anyhow!(persist_error.error));
                }
                thread::sleep(Duration::from_millis(delay_ms));
                total_delay_ms += delay_ms;
                retry_count += 1;
                temp_file = persist_error.file;
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn atomic_rename(temp_file: NamedTempFile, target: &Path) -> Result<u32> {
    temp_file
        .persist(target)
        .map(|_| 0)
        .map_err(|e| anyhow::anyhow!(e.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir, "runs/r1/run.json");
        let result = write_file_atomic(&path, "{}").unwrap();
        assert_eq!(result.rename_retry_count, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir, "doc.json");
        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second\r\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir, "doc.json");
        write_file_atomic(&path, "x").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
