//! Segment recovery: rebuild a segment's key->offset map by streaming its
//! records front-to-back.
//!
//! Runs before the writer and index loops start, so no synchronization
//! with them is required.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use crate::store::error::{Result, StoreError};
use crate::store::record;
use crate::store::segment::Segment;

/// Reads into `buf` until it is full or the stream ends, returning how many
/// bytes were actually read. Unlike `read_exact`, a short read is not an
/// error here -- the caller decides what a short read means.
fn read_as_much_as_possible(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

/// Recovers a single segment file, rebuilding its key->offset map.
///
/// `tolerate_tail` should be `true` only for the single newest pre-existing
/// segment: a truncated trailing record there is a `CorruptTail` (the scan
/// stops and keeps every fully-decoded record before it); the same
/// truncation on any other segment is `FatalCorruption` and aborts `open`.
/// A structurally complete but internally inconsistent record is always
/// `FatalCorruption`, on the newest segment too -- that is corruption, not
/// a write-in-progress artifact.
pub fn recover_segment(path: &Path, id: u64, tolerate_tail: bool) -> Result<Segment> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(StoreError::Io)?;
    let file_len = file.metadata().map_err(StoreError::Io)?.len();
    let mut reader = BufReader::new(file);
    let mut index: HashMap<String, u64> = HashMap::new();
    let mut offset: u64 = 0;

    loop {
        let mut len_buf = [0u8; 4];
        let n = read_as_much_as_possible(&mut reader, &mut len_buf).map_err(StoreError::Io)?;
        if n == 0 {
            break; // clean EOF on a record boundary
        }
        if n < 4 {
            return tail_or_fatal(&path_str, id, path, offset, tolerate_tail, index);
        }

        let total_len = u32::from_le_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(StoreError::FatalCorruption {
                path: path_str,
                reason: format!("total_len {total_len} smaller than its own header"),
            });
        }

        // Bound the claimed length against what the file actually still
        // holds before allocating a buffer for it -- a corrupt length
        // prefix can claim up to ~4 GiB, and this file may hold only a few
        // bytes more.
        let body_len = total_len - 4;
        let remaining = file_len.saturating_sub(offset + 4);
        if body_len as u64 > remaining {
            return tail_or_fatal(&path_str, id, path, offset, tolerate_tail, index);
        }

        let mut body = vec![0u8; body_len];
        let bn = read_as_much_as_possible(&mut reader, &mut body).map_err(StoreError::Io)?;
        if bn < body.len() {
            return tail_or_fatal(&path_str, id, path, offset, tolerate_tail, index);
        }

        let mut full = Vec::with_capacity(total_len);
        full.extend_from_slice(&len_buf);
        full.extend_from_slice(&body);

        let path_for_closure = path_str.clone();
        match record::decode(&full, move |reason| StoreError::CorruptRecord {
            path: path_for_closure.clone(),
            reason,
        }) {
            Ok((key, _value)) => {
                index.insert(key, offset);
                offset += total_len as u64;
            }
            Err(_) => {
                return Err(StoreError::FatalCorruption {
                    path: path_str,
                    reason: format!("structurally inconsistent record at offset {offset}"),
                });
            }
        }
    }

    Ok(Segment {
        id,
        path: Arc::new(path.to_path_buf()),
        index,
    })
}

fn tail_or_fatal(
    path_str: &str,
    id: u64,
    path: &Path,
    offset: u64,
    tolerate_tail: bool,
    index: HashMap<String, u64>,
) -> Result<Segment> {
    if tolerate_tail {
        tracing::warn!(
            path = path_str,
            offset,
            "tolerating truncated trailing record on newest segment"
        );
        Ok(Segment {
            id,
            path: Arc::new(path.to_path_buf()),
            index,
        })
    } else {
        Err(StoreError::FatalCorruption {
            path: path_str.to_string(),
            reason: format!("truncated trailing record at offset {offset}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tempdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mini-kvstore-v2-recovery-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
    use std::path::PathBuf;

    #[test]
    fn recovers_all_records_in_order() {
        let dir = tempdir("ok");
        let path = dir.join("current-data0");
        let mut f = File::create(&path).unwrap();
        f.write_all(&record::encode("a", "1")).unwrap();
        f.write_all(&record::encode("b", "2")).unwrap();
        f.write_all(&record::encode("a", "3")).unwrap();
        drop(f);

        let seg = recover_segment(&path, 0, false).unwrap();
        assert_eq!(seg.index.len(), 2);
        assert!(seg.index.contains_key("a"));
        assert!(seg.index.contains_key("b"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tolerates_truncated_tail_on_newest_segment() {
        let dir = tempdir("tail");
        let path = dir.join("current-data0");
        let mut f = File::create(&path).unwrap();
        f.write_all(&record::encode("a", "1")).unwrap();
        let partial = record::encode("b", "2");
        f.write_all(&partial[..partial.len() - 2]).unwrap();
        drop(f);

        let seg = recover_segment(&path, 0, true).unwrap();
        assert_eq!(seg.index.len(), 1);
        assert!(seg.index.contains_key("a"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn truncated_tail_is_fatal_on_non_newest_segment() {
        let dir = tempdir("fatal-tail");
        let path = dir.join("current-data0");
        let mut f = File::create(&path).unwrap();
        f.write_all(&record::encode("a", "1")).unwrap();
        let partial = record::encode("b", "2");
        f.write_all(&partial[..partial.len() - 2]).unwrap();
        drop(f);

        let err = recover_segment(&path, 0, false).unwrap_err();
        assert!(matches!(err, StoreError::FatalCorruption { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
