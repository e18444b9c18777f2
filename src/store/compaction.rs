//! Background compaction: merges the older, immutable segments into one
//! consolidated segment.
//!
//! Runs as a transient async task spawned by the writer loop. At most one
//! merge is in flight at a time; `merge_in_flight` is released on every
//! return path so the next rotation that reaches the threshold can retry.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::store::index::{ask, IndexMsg};
use crate::store::record;
use crate::store::segment::{self, Segment};

pub async fn run_merge(
    dir: PathBuf,
    index_tx: mpsc::UnboundedSender<IndexMsg>,
    id_counter: Arc<AtomicU64>,
    merge_in_flight: Arc<AtomicBool>,
) {
    let result = run_merge_inner(&dir, &index_tx, &id_counter).await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "merge abandoned, will retry on next rotation");
    }
    merge_in_flight.store(false, Ordering::SeqCst);
}

async fn run_merge_inner(
    dir: &PathBuf,
    index_tx: &mpsc::UnboundedSender<IndexMsg>,
    id_counter: &Arc<AtomicU64>,
) -> std::io::Result<()> {
    let candidates = match ask(index_tx, |reply| IndexMsg::PrepareMerge { reply }).await {
        Some(Some(candidates)) => candidates,
        _ => return Ok(()),
    };
    let candidate_count = candidates.len();
    if candidate_count < 2 {
        return Ok(());
    }

    let new_id = id_counter.fetch_add(1, Ordering::SeqCst);
    let dir = dir.clone();
    let merged = tokio::task::spawn_blocking(move || build_merged_segment(&dir, new_id, candidates))
        .await
        .map_err(|e| std::io::Error::other(format!("merge task panicked: {e}")))??;

    let old_paths: Vec<PathBuf> = merged.sources.clone();
    let merged_segment = merged.segment;

    ask(index_tx, |reply| IndexMsg::CompleteMerge {
        merged: merged_segment,
        candidate_count,
        reply,
    })
    .await;

    for path in old_paths {
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to unlink old segment after merge");
        }
    }

    Ok(())
}

struct MergedSegment {
    segment: Segment,
    sources: Vec<PathBuf>,
}

/// Builds one new segment file containing, for each key across
/// `candidates`, only the value from the newest candidate that holds it
/// Blocking file I/O; run via `spawn_blocking`.
fn build_merged_segment(
    dir: &std::path::Path,
    new_id: u64,
    candidates: Vec<Segment>,
) -> std::io::Result<MergedSegment> {
    // Newest-to-oldest pass: the first candidate (in reverse) holding a key
    // owns it, since within one candidate's map the entry is already the
    // latest offset for that key.
    let mut owner_of: HashMap<&str, usize> = HashMap::new();
    for (i, candidate) in candidates.iter().enumerate().rev() {
        for key in candidate.index.keys() {
            owner_of.entry(key.as_str()).or_insert(i);
        }
    }

    let new_path = dir.join(format!("current-data{new_id}"));
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&new_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = file.set_permissions(std::fs::Permissions::from_mode(0o644));
    }

    let mut index = HashMap::new();
    let mut offset: u64 = 0;

    for (i, candidate) in candidates.iter().enumerate() {
        for (key, &src_offset) in candidate.index.iter() {
            if owner_of.get(key.as_str()) != Some(&i) {
                continue;
            }
            let value = segment::read_value_at(&candidate.path, src_offset)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            let encoded = record::encode(key, &value);
            file.write_all(&encoded)?;
            index.insert(key.clone(), offset);
            offset += encoded.len() as u64;
        }
    }
    file.flush()?;

    let sources = candidates.iter().map(|s| s.path.as_ref().clone()).collect();
    let segment = Segment {
        id: new_id,
        path: Arc::new(new_path),
        index,
    };

    Ok(MergedSegment { segment, sources })
}
