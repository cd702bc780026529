// sala-core/src/infrastructure/fs.rs

use crate::domain::ports::CommitLock;
use crate::infrastructure::error::InfrastructureError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const LOCK_FILE: &str = ".sala.lock";

fn temp_beside(path: &Path) -> Result<NamedTempFile, InfrastructureError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    // Same directory, so the final rename never crosses filesystems
    Ok(NamedTempFile::new_in(parent)?)
}

/// Write content to a file atomically using a temporary file.
///
/// The target is either fully written or left as it was.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let mut temp_file = temp_beside(path)?;
    temp_file.write_all(content.as_ref())?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;
    Ok(())
}

/// Like `atomic_write`, but fails with `AlreadyExists` instead of replacing.
pub fn write_once<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let mut temp_file = temp_beside(path)?;
    temp_file.write_all(content.as_ref())?;
    temp_file.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            InfrastructureError::AlreadyExists(path.display().to_string())
        } else {
            InfrastructureError::Io(e.error)
        }
    })?;
    Ok(())
}

/// Appends one line (newline added) to a log file, creating it if needed.
pub fn append_line<P: AsRef<Path>>(path: P, line: &str) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format!("{}\n", line).as_bytes())?;
    Ok(())
}

/// Advisory exclusive lock on `<dir>/.sala.lock`, shared by every process
/// pointing at the same state directory. Blocks until acquired.
pub struct StateLock {
    file: File,
}

impl StateLock {
    pub fn acquire<P: AsRef<Path>>(dir: P) -> Result<Self, InfrastructureError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        debug!(dir = %dir.display(), "State lock acquired");
        Ok(Self { file })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // Closing the handle releases it anyway
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "State lock release failed");
        }
    }
}

impl CommitLock for StateLock {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_overwrites_existing() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("nested/rules.json");

        atomic_write(&file_path, "Initial")?;
        atomic_write(&file_path, "Updated")?;

        assert_eq!(fs::read_to_string(file_path)?, "Updated");
        Ok(())
    }

    #[test]
    fn test_write_once_refuses_second_write() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("rules_v000001.json");

        write_once(&file_path, "first")?;
        let err = write_once(&file_path, "second").unwrap_err();

        assert!(matches!(err, InfrastructureError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&file_path)?, "first");
        // No temp file left behind
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_state_lock_excludes_a_second_holder() -> Result<()> {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Duration;

        let dir = tempdir()?;
        let first = StateLock::acquire(dir.path())?;
        let acquired = Arc::new(AtomicBool::new(false));

        let waiter = {
            let path = dir.path().to_path_buf();
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                let _second = StateLock::acquire(&path).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(200));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(first);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        Ok(())
    }

    #[test]
    fn test_append_line_accumulates() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta/insights.jsonl");
        append_line(&file_path, "{\"a\":1}")?;
        append_line(&file_path, "{\"a\":2}")?;
        assert_eq!(fs::read_to_string(file_path)?.lines().count(), 2);
        Ok(())
    }
}
