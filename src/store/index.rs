//! Index loop: a single long-lived task that serializes access to every
//! segment's key->offset map.
//!
//! The index loop does not read or write segment data itself. It owns the
//! segments list (oldest-first, tail active) and answers two kinds of
//! request: `Update` (record a new key -> offset in the active segment) and
//! `Lookup` (scan newest-first for the first segment whose map contains the
//! key). A `Lookup` opens a file descriptor for the winning segment before
//! replying, so that descriptor outlives any unlink a racing merge performs
//! afterward -- the caller's eventual read goes through that descriptor, not
//! a fresh open of the path. Rotation and merge completion are also
//! serialized through this actor since both mutate the segments list.

use tokio::sync::{mpsc, oneshot};

use crate::store::error::Result;
use crate::store::segment::{Segment, SegmentHandle};

/// Where a key's current value lives.
pub struct Location {
    pub segment: SegmentHandle,
    pub offset: u64,
}

pub enum IndexMsg {
    /// Record that `key`'s newest value now lives at `offset` in the
    /// active (last) segment. The writer computes `offset` itself -- the
    /// index loop never derives it from a write's return value.
    Update {
        key: String,
        offset: u64,
    },
    /// Replies with `Ok(None)` on a miss, `Ok(Some(_))` on a hit (with the
    /// winning segment's file descriptor already open), or `Err` if that
    /// open itself fails.
    Lookup {
        key: String,
        reply: oneshot::Sender<Result<Option<Location>>>,
    },
    /// Append a freshly created, empty segment as the new tail. Replies
    /// with the new total segment count so the writer can decide whether
    /// to trigger a merge.
    Rotate {
        segment: Segment,
        reply: oneshot::Sender<usize>,
    },
    /// Hand the merger an owned snapshot of every segment but the tail.
    /// `None` if fewer than two candidates exist.
    PrepareMerge {
        reply: oneshot::Sender<Option<Vec<Segment>>>,
    },
    /// Atomically replace the first `candidate_count` segments with the one
    /// merged segment, leaving everything after untouched -- this still
    /// handles further rotations landing after `PrepareMerge` was taken,
    /// since rotation only ever appends at the end.
    CompleteMerge {
        merged: Segment,
        candidate_count: usize,
        reply: oneshot::Sender<()>,
    },
    /// A cheap snapshot for `Database::stats`.
    Snapshot {
        reply: oneshot::Sender<SnapshotInfo>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotInfo {
    pub num_segments: usize,
    pub num_keys: usize,
    pub active_segment_id: u64,
    pub oldest_segment_id: u64,
}

/// Spawns the index loop as a blocking task and returns a sender for its
/// inbox plus a join handle. The task runs until every sender clone
/// (including the one returned here) is dropped.
pub fn spawn(initial_segments: Vec<Segment>) -> (mpsc::UnboundedSender<IndexMsg>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let join = tokio::task::spawn_blocking(move || run(initial_segments, rx));
    (tx, join)
}

fn run(mut segments: Vec<Segment>, mut rx: mpsc::UnboundedReceiver<IndexMsg>) {
    while let Some(msg) = rx.blocking_recv() {
        match msg {
            IndexMsg::Update { key, offset } => {
                if let Some(tail) = segments.last_mut() {
                    tail.index.insert(key, offset);
                }
            }
            IndexMsg::Lookup { key, reply } => {
                let found = segments
                    .iter()
                    .rev()
                    .find_map(|seg| seg.index.get(&key).map(|&offset| (seg, offset)));
                let response = match found {
                    None => Ok(None),
                    Some((seg, offset)) => seg.handle().map(|segment| Some(Location { segment, offset })),
                };
                let _ = reply.send(response);
            }
            IndexMsg::Rotate { segment, reply } => {
                segments.push(segment);
                let _ = reply.send(segments.len());
            }
            IndexMsg::PrepareMerge { reply } => {
                let candidate_count = segments.len().saturating_sub(1);
                let snapshot = if candidate_count >= 2 {
                    Some(segments[..candidate_count].to_vec())
                } else {
                    None
                };
                let _ = reply.send(snapshot);
            }
            IndexMsg::CompleteMerge {
                merged,
                candidate_count,
                reply,
            } => {
                if candidate_count <= segments.len() {
                    let mut rest = segments.split_off(candidate_count);
                    segments.clear();
                    segments.push(merged);
                    segments.append(&mut rest);
                }
                let _ = reply.send(());
            }
            IndexMsg::Snapshot { reply } => {
                let num_keys: usize = segments.iter().map(|s| s.index.len()).sum();
                let info = SnapshotInfo {
                    num_segments: segments.len(),
                    num_keys,
                    active_segment_id: segments.last().map(|s| s.id).unwrap_or(0),
                    oldest_segment_id: segments.first().map(|s| s.id).unwrap_or(0),
                };
                let _ = reply.send(info);
            }
        }
    }
}

/// Convenience for sending a request and awaiting its reply from async
/// callers (`Database::get`/`put` and the merger).
pub async fn ask<T>(
    tx: &mpsc::UnboundedSender<IndexMsg>,
    build: impl FnOnce(oneshot::Sender<T>) -> IndexMsg,
) -> Option<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(build(reply_tx)).ok()?;
    reply_rx.await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tempdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mini-kvstore-v2-index-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// `Lookup` opens the winning segment's file, so tests that exercise it
    /// need a real (if empty) file on disk at each segment's path.
    fn touch(path: &std::path::Path) {
        std::fs::File::create(path).unwrap();
    }

    #[tokio::test]
    async fn lookup_scans_newest_first() {
        let dir = tempdir("newest-first");
        let path0 = dir.join("seg0");
        let path1 = dir.join("seg1");
        touch(&path0);
        touch(&path1);

        let tail = Segment::empty(0, path0);
        let (tx, _join) = spawn(vec![tail]);

        tx.send(IndexMsg::Update {
            key: "k".to_string(),
            offset: 10,
        })
        .unwrap();

        let mut new_seg = Segment::empty(1, path1);
        new_seg.index.insert("k".to_string(), 99);
        let count = ask(&tx, |reply| IndexMsg::Rotate {
            segment: new_seg,
            reply,
        })
        .await
        .unwrap();
        assert_eq!(count, 2);

        let loc = ask(&tx, |reply| IndexMsg::Lookup {
            key: "k".to_string(),
            reply,
        })
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(loc.segment.id, 1);
        assert_eq!(loc.offset, 99);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn prepare_merge_needs_two_candidates() {
        let tail = Segment::empty(0, PathBuf::from("seg0"));
        let (tx, _join) = spawn(vec![tail]);

        let snapshot = ask(&tx, |reply| IndexMsg::PrepareMerge { reply })
            .await
            .unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn complete_merge_replaces_prefix_only() {
        let tail = Segment::empty(0, PathBuf::from("seg0"));
        let (tx, _join) = spawn(vec![tail]);

        for id in 1..=2 {
            let seg = Segment::empty(id, PathBuf::from(format!("seg{id}")));
            let _ = ask(&tx, |reply| IndexMsg::Rotate { segment: seg, reply }).await;
        }
        // segments: [0, 1, 2(tail)]
        let snapshot = ask(&tx, |reply| IndexMsg::PrepareMerge { reply })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        let candidate_count = snapshot.len();

        let merged = Segment::empty(3, PathBuf::from("merged"));
        let _ = ask(&tx, |reply| IndexMsg::CompleteMerge {
            merged: merged.clone(),
            candidate_count,
            reply,
        })
        .await;

        let info = ask(&tx, |reply| IndexMsg::Snapshot { reply })
            .await
            .unwrap();
        assert_eq!(info.num_segments, 2); // [merged, tail]
        assert_eq!(info.oldest_segment_id, 3);
        assert_eq!(info.active_segment_id, 2);
    }
}
