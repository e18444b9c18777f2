//! Writer loop: the single long-lived task that owns the active segment's
//! file handle and serializes every `Put`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::store::compaction;
use crate::store::config::FsyncPolicy;
use crate::store::error::{Result, StoreError};
use crate::store::index::IndexMsg;
use crate::store::record;
use crate::store::segment::Segment;

/// Once a rotation brings the segment count to this many, a background
/// merge is triggered.
const COMPACTION_TRIGGER: usize = 3;

pub enum WriterMsg {
    Put {
        key: String,
        value: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

struct WriterState {
    dir: PathBuf,
    max_segment_size: u64,
    fsync_policy: FsyncPolicy,
    file: File,
    active_size: u64,
    id_counter: Arc<AtomicU64>,
    index_tx: mpsc::UnboundedSender<IndexMsg>,
    merge_in_flight: Arc<AtomicBool>,
    runtime: tokio::runtime::Handle,
}

/// Spawns the writer loop as a blocking task and returns a sender for its
/// inbox plus a join handle.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    dir: PathBuf,
    max_segment_size: u64,
    fsync_policy: FsyncPolicy,
    active_file: File,
    active_size: u64,
    id_counter: Arc<AtomicU64>,
    index_tx: mpsc::UnboundedSender<IndexMsg>,
    merge_in_flight: Arc<AtomicBool>,
) -> (mpsc::UnboundedSender<WriterMsg>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let runtime = tokio::runtime::Handle::current();
    let state = WriterState {
        dir,
        max_segment_size,
        fsync_policy,
        file: active_file,
        active_size,
        id_counter,
        index_tx,
        merge_in_flight,
        runtime,
    };
    let join = tokio::task::spawn_blocking(move || run(state, rx));
    (tx, join)
}

fn run(mut state: WriterState, mut rx: mpsc::UnboundedReceiver<WriterMsg>) {
    while let Some(msg) = rx.blocking_recv() {
        match msg {
            WriterMsg::Put { key, value, reply } => {
                let result = state.handle_put(&key, &value);
                let _ = reply.send(result);
            }
        }
    }
}

impl WriterState {
    fn handle_put(&mut self, key: &str, value: &str) -> Result<()> {
        let encoded = record::encode(key, value);
        let len = encoded.len() as u64;

        if self.active_size + len > self.max_segment_size {
            self.rotate()?;
        }

        let offset = self.active_size;
        self.file.write_all(&encoded).map_err(StoreError::Io)?;
        if self.fsync_policy == FsyncPolicy::Always {
            self.file.sync_data().map_err(StoreError::Io)?;
        }
        self.active_size += len;

        let _ = self.index_tx.send(IndexMsg::Update {
            key: key.to_string(),
            offset,
        });

        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        let new_id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let new_path = self.dir.join(format!("current-data{new_id}"));
        let new_file = open_segment_file(&new_path)?;

        self.file = new_file;
        self.active_size = 0;

        let new_segment = Segment::empty(new_id, new_path);
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .index_tx
            .send(IndexMsg::Rotate {
                segment: new_segment,
                reply: reply_tx,
            })
            .is_err()
        {
            return Ok(());
        }
        let total_segments = reply_rx.blocking_recv().unwrap_or(0);

        if total_segments >= COMPACTION_TRIGGER
            && self
                .merge_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            let dir = self.dir.clone();
            let index_tx = self.index_tx.clone();
            let id_counter = Arc::clone(&self.id_counter);
            let merge_in_flight = Arc::clone(&self.merge_in_flight);
            self.runtime.spawn(async move {
                compaction::run_merge(dir, index_tx, id_counter, merge_in_flight).await;
            });
        }

        Ok(())
    }
}

/// Opens a segment file with create+append+read semantics and mode 0644.
pub fn open_segment_file(path: &std::path::Path) -> Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .mode(0o644)
            .open(path)
            .map_err(StoreError::Io)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(StoreError::Io)
    }
}

/// Convenience used by `Database::put`.
pub async fn put(
    tx: &mpsc::UnboundedSender<WriterMsg>,
    key: String,
    value: String,
) -> Result<()> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(WriterMsg::Put {
        key,
        value,
        reply: reply_tx,
    })
    .map_err(|_| StoreError::Closed)?;
    reply_rx.await.map_err(|_| StoreError::Closed)?
}
