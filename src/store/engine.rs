//! Public API: `Database`, the top-level entity.
//!
//! State machine: `Open -> Closing -> Closed`. `open()` performs recovery
//! and spawns both actor loops before returning, so there is no separately
//! observable opening state. `Put` and `Get` require `Open`; every operation
//! after `Close` fails with `Closed`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::config::StoreConfig;
use crate::store::error::{Result, StoreError};
use crate::store::index::{self, ask, IndexMsg};
use crate::store::recovery;
use crate::store::segment::Segment;
use crate::store::stats::StoreStats;
use crate::store::writer::{self, WriterMsg};

const SEGMENT_PREFIX: &str = "current-data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbState {
    Open,
    Closing,
    Closed,
}

/// The top-level KV store entity: a directory of segment files plus the
/// actor tasks (writer loop, index loop) that serialize access to them.
///
/// Cheap to share: every field is a channel sender or an `Arc`, so callers
/// commonly hold a `Database` behind an `Arc` themselves when handing it to
/// multiple concurrent tasks (e.g. HTTP handlers).
pub struct Database {
    dir: PathBuf,
    state: RwLock<DbState>,
    writer_tx: Mutex<Option<mpsc::UnboundedSender<WriterMsg>>>,
    writer_join: Mutex<Option<JoinHandle<()>>>,
    index_tx: Mutex<Option<mpsc::UnboundedSender<IndexMsg>>>,
    index_join: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Opens (or creates) a database directory: discovers existing segment
    /// files, rebuilds their indexes, and allocates a fresh empty active
    /// segment.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let dir = config.data_dir.clone();
        std::fs::create_dir_all(&dir).map_err(StoreError::Io)?;

        let dir_for_scan = dir.clone();
        let (recovered, next_id) =
            tokio::task::spawn_blocking(move || recover_all(&dir_for_scan))
                .await
                .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))??;

        let id_counter = Arc::new(AtomicU64::new(next_id + 1));
        let active_path = dir.join(format!("{SEGMENT_PREFIX}{next_id}"));
        let active_file = writer::open_segment_file(&active_path)?;
        let active_segment = Segment::empty(next_id, active_path);

        let mut segments = recovered;
        segments.push(active_segment);

        let (index_tx, index_join) = index::spawn(segments);
        let merge_in_flight = Arc::new(AtomicBool::new(false));
        let (writer_tx, writer_join) = writer::spawn(
            dir.clone(),
            config.max_segment_size,
            config.fsync_policy,
            active_file,
            0,
            id_counter,
            index_tx.clone(),
            merge_in_flight,
        );

        Ok(Database {
            dir,
            state: RwLock::new(DbState::Open),
            writer_tx: Mutex::new(Some(writer_tx)),
            writer_join: Mutex::new(Some(writer_join)),
            index_tx: Mutex::new(Some(index_tx)),
            index_join: Mutex::new(Some(index_join)),
        })
    }

    /// Writes a new record for `key`. Empty keys are rejected with
    /// `BadArgument`. Suspends the caller until the writer loop has
    /// attempted the file write and replied.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.require_open()?;
        if key.is_empty() {
            return Err(StoreError::BadArgument);
        }
        let tx = self
            .writer_tx
            .lock()
            .clone()
            .ok_or(StoreError::Closed)?;
        writer::put(&tx, key.to_string(), value.to_string()).await
    }

    /// Looks up `key`'s current value. Suspends until the index loop
    /// answers the lookup, then performs one synchronous random-access
    /// file read against the located segment.
    pub async fn get(&self, key: &str) -> Result<String> {
        self.require_open()?;
        let tx = self.index_tx.lock().clone().ok_or(StoreError::Closed)?;
        let outcome = ask(&tx, |reply| IndexMsg::Lookup {
            key: key.to_string(),
            reply,
        })
        .await;

        match outcome {
            None | Some(Ok(None)) => Err(StoreError::NotFound),
            Some(Err(e)) => Err(e),
            Some(Ok(Some(loc))) => {
                tokio::task::spawn_blocking(move || loc.segment.read_value(loc.offset))
                    .await
                    .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?
            }
        }
    }

    /// A point-in-time snapshot of size and shape. Not part of the store's
    /// core contract; an ambient operational convenience.
    pub async fn stats(&self) -> Result<StoreStats> {
        self.require_open()?;
        let tx = self.index_tx.lock().clone().ok_or(StoreError::Closed)?;
        let snapshot = ask(&tx, |reply| IndexMsg::Snapshot { reply })
            .await
            .ok_or(StoreError::Closed)?;

        let dir = self.dir.clone();
        let total_bytes = tokio::task::spawn_blocking(move || directory_size(&dir))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))??;

        Ok(StoreStats::from_snapshot(snapshot, total_bytes))
    }

    /// Closes the active file. After `Close`, every operation fails with
    /// `Closed`.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state == DbState::Closed {
                return Ok(());
            }
            *state = DbState::Closing;
        }

        self.writer_tx.lock().take();
        self.index_tx.lock().take();

        if let Some(join) = self.writer_join.lock().take() {
            let _ = join.await;
        }
        if let Some(join) = self.index_join.lock().take() {
            let _ = join.await;
        }

        *self.state.write() = DbState::Closed;
        Ok(())
    }

    fn require_open(&self) -> Result<()> {
        if *self.state.read() == DbState::Open {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

/// Scans `dir` for `current-data<N>` files, recovers each in ascending id
/// order (tolerating a truncated tail only on the newest one), and returns
/// the recovered segments plus the next free segment id.
fn recover_all(dir: &Path) -> Result<(Vec<Segment>, u64)> {
    let mut entries: Vec<(u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(StoreError::Io)? {
        let entry = entry.map_err(StoreError::Io)?;
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(id_str) = name.strip_prefix(SEGMENT_PREFIX) {
                if let Ok(id) = id_str.parse::<u64>() {
                    entries.push((id, path));
                }
            }
        }
    }
    entries.sort_by_key(|(id, _)| *id);

    let next_id = entries.last().map(|(id, _)| id + 1).unwrap_or(0);
    let newest_index = entries.len().saturating_sub(1);

    let mut segments = Vec::with_capacity(entries.len());
    for (i, (id, path)) in entries.into_iter().enumerate() {
        let tolerate_tail = i == newest_index;
        segments.push(recovery::recover_segment(&path, id, tolerate_tail)?);
    }
    Ok((segments, next_id))
}

fn directory_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(dir).map_err(StoreError::Io)? {
        let entry = entry.map_err(StoreError::Io)?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(SEGMENT_PREFIX) {
                total += entry.metadata().map_err(StoreError::Io)?.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mini-kvstore-v2-engine-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir("roundtrip");
        let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();

        db.put("alpha", "1").await.unwrap();
        assert_eq!(db.get("alpha").await.unwrap(), "1");
        assert!(matches!(db.get("missing").await, Err(StoreError::NotFound)));

        db.close().await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let dir = tempdir("lww");
        let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();

        db.put("k", "v1").await.unwrap();
        db.put("k", "v2").await.unwrap();
        assert_eq!(db.get("k").await.unwrap(), "v2");

        db.close().await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_key_is_bad_argument() {
        let dir = tempdir("badarg");
        let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();

        assert!(matches!(db.put("", "x").await, Err(StoreError::BadArgument)));

        db.close().await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn operations_after_close_fail() {
        let dir = tempdir("closed");
        let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();
        db.put("k", "v").await.unwrap();
        db.close().await.unwrap();

        assert!(matches!(db.put("k2", "v2").await, Err(StoreError::Closed)));
        assert!(matches!(db.get("k").await, Err(StoreError::Closed)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rotation_and_merge_preserve_last_writer_wins() {
        let dir = tempdir("rotate-merge");
        // A tiny threshold forces rotation almost every write.
        let config = StoreConfig {
            data_dir: dir.clone(),
            max_segment_size: 40,
            fsync_policy: crate::store::config::FsyncPolicy::Never,
        };
        let db = Database::open(config).await.unwrap();

        db.put("k", "v1").await.unwrap();
        db.put("k", "v2").await.unwrap();
        for i in 0..20 {
            db.put(&format!("filler{i}"), "x").await.unwrap();
        }

        assert_eq!(db.get("k").await.unwrap(), "v2");
        for i in 0..20 {
            assert_eq!(db.get(&format!("filler{i}")).await.unwrap(), "x");
        }

        db.close().await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reopen_after_close_is_durable() {
        let dir = tempdir("durable");
        {
            let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();
            for i in 0..20 {
                db.put(&format!("key{i}"), &format!("value{i}")).await.unwrap();
            }
            db.close().await.unwrap();
        }
        {
            let db = Database::open(StoreConfig::test_config(&dir)).await.unwrap();
            for i in 0..20 {
                assert_eq!(
                    db.get(&format!("key{i}")).await.unwrap(),
                    format!("value{i}")
                );
            }
            db.close().await.unwrap();
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
