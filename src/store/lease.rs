use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::StoreError;

/// How often a blocked opener re-checks the lock while waiting.
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive writer lease over a store file.
///
/// Backed by an advisory lock on a `<store>.lock` sidecar file. The lock is
/// tied to the open file description, so two leases on the same store conflict
/// even inside one process. Dropping the lease releases the lock.
#[derive(Debug)]
pub struct WriterLease {
    file: File,
    lock_path: PathBuf,
}

impl WriterLease {
    /// Acquire the lease for `store_path`, waiting at most `timeout`.
    pub fn acquire(store_path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(store_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Writer lease acquired: {}", lock_path.display());
                    return Ok(WriterLease { file, lock_path });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(StoreError::Io(e)),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                warn!(
                    "Writer lease on {} still held after {:?}",
                    lock_path.display(),
                    waited
                );
                return Err(StoreError::LockTimeout {
                    path: store_path.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(RETRY_INTERVAL.min(timeout - waited));
        }
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(
                "Failed to release writer lease {}: {}",
                self.lock_path.display(),
                e
            );
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// `fpl.db` → `fpl.db.lock`
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = OsString::from(store_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/fpl.db")),
            PathBuf::from("/data/fpl.db.lock")
        );
    }

    #[test]
    fn second_lease_times_out_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let _held = WriterLease::acquire(&path, Duration::from_millis(100)).unwrap();
        let started = Instant::now();
        let err = WriterLease::acquire(&path, Duration::from_millis(100)).unwrap_err();

        assert!(matches!(err, StoreError::LockTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn lease_is_reusable_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let first = WriterLease::acquire(&path, Duration::from_millis(100)).unwrap();
        drop(first);
        assert!(WriterLease::acquire(&path, Duration::from_millis(100)).is_ok());
    }
}
