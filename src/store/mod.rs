use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::fs;
use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub mod lease;
pub use lease::WriterLease;

use crate::error::StoreError;

/// Default bound on the wait for the writer lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Where the store lives and how long an opener may wait for it.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: PathBuf,
    pub lock_timeout: Duration,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreOptions {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

/// Embedded, file-backed key/value store partitioned into named buckets.
///
/// Holding a `BucketStore` means holding the writer lease for its file. Both
/// the SQLite connection and the lease are released when the store is closed
/// or dropped, whichever comes first.
pub struct BucketStore {
    // Field order matters: the connection must close before the lease unlocks.
    conn: Connection,
    path: PathBuf,
    _lease: WriterLease,
}

impl BucketStore {
    /// Open (or create) the store, waiting up to `options.lock_timeout` for
    /// any other writer to let go.
    pub fn open(options: &StoreOptions) -> Result<Self, StoreError> {
        if let Some(parent) = options.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let lease = WriterLease::acquire(&options.path, options.lock_timeout)?;
        let conn = Connection::open(&options.path)?;
        conn.busy_timeout(options.lock_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!("Bucket store opened: {}", options.path.display());

        Ok(BucketStore {
            conn,
            path: options.path.clone(),
            _lease: lease,
        })
    }

    /// Open a store that must already exist, for read-only commands.
    ///
    /// Unlike [`BucketStore::open`], a missing store file is reported as
    /// [`StoreError::NotFound`] and neither the store nor its lock file is
    /// created.
    pub fn open_existing(options: &StoreOptions) -> Result<Self, StoreError> {
        if !options.path.is_file() {
            return Err(StoreError::NotFound(options.path.clone()));
        }
        Self::open(options)
    }

    /// Run `f` inside one write transaction.
    ///
    /// Everything `f` stages becomes visible together on commit. If `f`
    /// returns an error, or the commit itself fails, nothing is applied.
    pub fn update<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let wtx = WriteTx { tx };
        // An early return drops `wtx`, which rolls the transaction back.
        let out = f(&wtx)?;
        wtx.tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    /// Run `f` inside a read-only snapshot.
    pub fn view<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(StoreError::from)?;
        let rtx = ReadTx { tx };
        let out = f(&rtx)?;
        rtx.tx.rollback().map_err(StoreError::from)?;
        Ok(out)
    }

    /// Flush and close the connection, then release the writer lease.
    pub fn close(self) -> Result<(), StoreError> {
        let BucketStore { conn, path, _lease } = self;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        debug!("Bucket store closed: {}", path.display());
        Ok(())
    }
}

/// A write transaction handed to [`BucketStore::update`] closures.
pub struct WriteTx<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> WriteTx<'conn> {
    /// Return the named bucket, creating it first if it does not exist yet.
    pub fn create_bucket_if_not_exists(&self, name: &str) -> Result<BucketMut<'_>, StoreError> {
        validate_bucket_name(name)?;
        let inserted = self.tx.execute(
            "INSERT INTO buckets (name, created_at) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, Utc::now()],
        )?;
        if inserted > 0 {
            debug!("Created bucket {:?}", name);
        }
        let id = bucket_id(&self.tx, name)?.ok_or_else(|| StoreError::BucketNotFound(name.into()))?;
        Ok(BucketMut {
            inner: Bucket {
                conn: &self.tx,
                id,
                name: name.to_string(),
            },
        })
    }
}

/// A read-only snapshot handed to [`BucketStore::view`] closures.
pub struct ReadTx<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> ReadTx<'conn> {
    pub fn bucket(&self, name: &str) -> Result<Option<Bucket<'_>>, StoreError> {
        Ok(bucket_id(&self.tx, name)?.map(|id| Bucket {
            conn: &self.tx,
            id,
            name: name.to_string(),
        }))
    }

    /// Names of all buckets, in byte order.
    pub fn bucket_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.tx.prepare("SELECT name FROM buckets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}

/// Read access to one bucket inside a transaction.
pub struct Bucket<'t> {
    conn: &'t Connection,
    id: i64,
    name: String,
}

impl<'t> Bucket<'t> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM entries WHERE bucket_id = ?1 AND key = ?2",
                params![self.id, key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// All keys in ascending byte order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM entries WHERE bucket_id = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<Vec<u8>>>>()?;
        Ok(keys)
    }

    /// All key/value pairs in ascending key order.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM entries WHERE bucket_id = ?1 ORDER BY key")?;
        let entries = stmt
            .query_map(params![self.id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(Vec<u8>, Vec<u8>)>>>()?;
        Ok(entries)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE bucket_id = ?1",
            params![self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Read/write access to one bucket inside a write transaction.
pub struct BucketMut<'t> {
    inner: Bucket<'t>,
}

impl<'t> BucketMut<'t> {
    /// Insert or replace the value stored under `key`.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey(self.inner.name.clone()));
        }
        self.inner.conn.execute(
            "INSERT INTO entries (bucket_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket_id, key) DO UPDATE SET value = excluded.value",
            params![self.inner.id, key, value],
        )?;
        Ok(())
    }
}

impl<'t> Deref for BucketMut<'t> {
    type Target = Bucket<'t>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn bucket_id(conn: &Connection, name: &str) -> Result<Option<i64>, StoreError> {
    let id = conn
        .query_row(
            "SELECT id FROM buckets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn validate_bucket_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidBucketName(name.to_string()));
    }
    Ok(())
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS buckets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL UNIQUE,
    created_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    bucket_id   INTEGER NOT NULL,
    key         BLOB    NOT NULL,
    value       BLOB    NOT NULL,
    PRIMARY KEY (bucket_id, key),
    FOREIGN KEY (bucket_id) REFERENCES buckets(id)
) WITHOUT ROWID;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &tempfile::TempDir) -> StoreOptions {
        StoreOptions::new(dir.path().join("store.db")).with_lock_timeout(Duration::from_millis(200))
    }

    #[test]
    fn create_bucket_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists("teams")?;
                b.put(b"ARS", b"arsenal")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();
        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists("teams")?;
                assert_eq!(b.get(b"ARS")?, Some(b"arsenal".to_vec()));
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let names = store.view(|tx| tx.bucket_names()).unwrap();
        assert_eq!(names, vec!["teams".to_string()]);
    }

    #[test]
    fn put_replaces_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists("7")?;
                b.put(b"k", b"one")?;
                b.put(b"k", b"two")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let (len, value) = store
            .view(|tx| {
                let b = tx.bucket("7")?.expect("bucket exists");
                Ok::<_, StoreError>((b.len()?, b.get(b"k")?))
            })
            .unwrap();
        assert_eq!(len, 1);
        assert_eq!(value, Some(b"two".to_vec()));
    }

    #[test]
    fn buckets_are_independent_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        store
            .update(|tx| {
                tx.create_bucket_if_not_exists("7")?.put(b"k", b"seven")?;
                tx.create_bucket_if_not_exists("8")?.put(b"k", b"eight")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let values = store
            .view(|tx| {
                let seven = tx.bucket("7")?.unwrap().get(b"k")?;
                let eight = tx.bucket("8")?.unwrap().get(b"k")?;
                Ok::<_, StoreError>((seven, eight))
            })
            .unwrap();
        assert_eq!(values, (Some(b"seven".to_vec()), Some(b"eight".to_vec())));
    }

    #[test]
    fn keys_are_returned_in_byte_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        store
            .update(|tx| {
                let b = tx.create_bucket_if_not_exists("players")?;
                b.put(b"b", b"2")?;
                b.put(b"c", b"3")?;
                b.put(b"a", b"1")?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let keys = store
            .view(|tx| tx.bucket("players")?.unwrap().keys())
            .unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn failed_transaction_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        let result: Result<(), StoreError> = store.update(|tx| {
            let b = tx.create_bucket_if_not_exists("7")?;
            b.put(b"a", b"1")?;
            b.put(b"b", b"2")?;
            b.put(b"c", b"3")?;
            Err(StoreError::BucketNotFound("forced abort".into()))
        });
        assert!(result.is_err());

        let bucket_exists = store.view(|tx| Ok::<_, StoreError>(tx.bucket("7")?.is_some())).unwrap();
        assert!(!bucket_exists);
    }

    #[test]
    fn empty_key_and_blank_bucket_name_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BucketStore::open(&options(&dir)).unwrap();

        let blank: Result<(), StoreError> = store.update(|tx| {
            tx.create_bucket_if_not_exists("  ")?;
            Ok(())
        });
        assert!(matches!(blank, Err(StoreError::InvalidBucketName(_))));

        let empty_key: Result<(), StoreError> = store.update(|tx| {
            tx.create_bucket_if_not_exists("teams")?.put(b"", b"x")
        });
        assert!(matches!(empty_key, Err(StoreError::EmptyKey(_))));
    }

    #[test]
    fn committed_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);

        let mut store = BucketStore::open(&opts).unwrap();
        store
            .update(|tx| tx.create_bucket_if_not_exists("teams")?.put(b"CHE", b"chelsea"))
            .unwrap();
        store.close().unwrap();

        let mut store = BucketStore::open(&opts).unwrap();
        let value = store
            .view(|tx| tx.bucket("teams")?.unwrap().get(b"CHE"))
            .unwrap();
        assert_eq!(value, Some(b"chelsea".to_vec()));
    }

    #[test]
    fn open_existing_does_not_create_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);

        match BucketStore::open_existing(&opts) {
            Err(StoreError::NotFound(path)) => assert_eq!(path, opts.path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing store should not open"),
        }
        assert!(!opts.path.exists());
        assert!(!lease::lock_path_for(&opts.path).exists());

        BucketStore::open(&opts).unwrap().close().unwrap();
        let mut store = BucketStore::open_existing(&opts).unwrap();
        assert!(store.view(|tx| tx.bucket_names()).unwrap().is_empty());
    }

    #[test]
    fn second_open_fails_with_lock_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);

        let _held = BucketStore::open(&opts).unwrap();
        match BucketStore::open(&opts) {
            Err(StoreError::LockTimeout { path, .. }) => assert_eq!(path, opts.path),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second writer should not open the store"),
        }
    }

    #[test]
    fn lease_is_released_after_close_and_drop() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir);

        BucketStore::open(&opts).unwrap().close().unwrap();
        drop(BucketStore::open(&opts).unwrap());
        assert!(BucketStore::open(&opts).is_ok());
    }
}
