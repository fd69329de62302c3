//! Single-flight guard for callers that mutate a project root.

use anyhow::{Context, Result, bail};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Advisory lock file; hold the guard from [`RunLock::acquire`] for the
/// whole run.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl RunLock {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create lock dir: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("open lock: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(file),
        })
    }

    /// Fails immediately if another process holds the lock.
    pub fn acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>> {
        let path = self.path.clone();
        match self.lock.try_write() {
            Ok(mut guard) => {
                guard
                    .set_len(0)
                    .with_context(|| format!("truncate lock: {}", path.display()))?;
                writeln!(guard, "pid={}", std::process::id())
                    .with_context(|| format!("write lock: {}", path.display()))?;
                Ok(guard)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                bail!("another migration is running on this project ({})", path.display())
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("acquire lock: {}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_refused() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".doplan/migrate.lock");

        let mut first = RunLock::open(&path).unwrap();
        let _held = first.acquire().unwrap();

        let mut second = RunLock::open(&path).unwrap();
        let err = second.acquire().unwrap_err();
        assert!(err.to_string().contains("another migration"));

        let body = fs::read_to_string(&path).unwrap();
        assert_eq!(body, format!("pid={}\n", std::process::id()));
    }
}
