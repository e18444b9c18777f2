//! Segment: an immutable-once-rotated file plus its in-memory key->offset
//! index.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::store::error::{Result, StoreError};
use crate::store::record;

/// One append-only file plus the map of each key to the offset of its most
/// recent record within that file.
///
/// `path` is `Arc`-wrapped so a cheap [`SegmentHandle`] can be produced for
/// readers without cloning the whole index map on every `Get`.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: u64,
    pub path: Arc<PathBuf>,
    pub index: HashMap<String, u64>,
}

impl Segment {
    /// A fresh, empty segment at `path` with the given id. The file itself
    /// is created by the caller (the writer loop owns file creation).
    pub fn empty(id: u64, path: PathBuf) -> Self {
        Segment {
            id,
            path: Arc::new(path),
            index: HashMap::new(),
        }
    }

    /// Opens the file fresh and hands the caller a handle holding that open
    /// descriptor. The open happens now, not when the handle is eventually
    /// read from, so the handle keeps the inode alive even if a concurrent
    /// merge later unlinks this path -- a reader that already has a handle
    /// in flight is unaffected by the unlink.
    pub fn handle(&self) -> Result<SegmentHandle> {
        let file = OpenOptions::new()
            .read(true)
            .open(self.path.as_ref())
            .map_err(StoreError::Io)?;
        Ok(SegmentHandle {
            id: self.id,
            path: Arc::clone(&self.path),
            file: Arc::new(file),
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}

/// A reference to a segment file with its own already-open file descriptor,
/// cheap to clone and hand to a reader task so the actual file I/O happens
/// off the index loop.
#[derive(Debug, Clone)]
pub struct SegmentHandle {
    pub id: u64,
    pub path: Arc<PathBuf>,
    file: Arc<File>,
}

impl SegmentHandle {
    /// Reads the length-prefixed record at `offset` from the handle's own
    /// open descriptor and decodes it. The key is trusted to match what the
    /// index promised; it is not re-verified here (the store does not pass
    /// the expected key).
    pub fn read_value(&self, offset: u64) -> Result<String> {
        let path_str = self.path.display().to_string();
        read_value_from_file(&self.file, &path_str, offset)
    }
}

/// Reads the length-prefixed record at `offset` from an already-open file
/// via a positioned read, so it never races a concurrent seek from another
/// reader sharing the same descriptor.
#[cfg(unix)]
fn read_value_from_file(file: &File, path_str: &str, offset: u64) -> Result<String> {
    use std::os::unix::fs::FileExt;

    let mut len_buf = [0u8; 4];
    file.read_exact_at(&mut len_buf, offset).map_err(StoreError::Io)?;
    let total_len = u32::from_le_bytes(len_buf) as usize;
    if total_len < 4 {
        return Err(StoreError::CorruptRecord {
            path: path_str.to_string(),
            reason: format!("total_len {total_len} smaller than its own header"),
        });
    }

    let mut rest = vec![0u8; total_len - 4];
    file.read_exact_at(&mut rest, offset + 4).map_err(StoreError::Io)?;

    let mut full = Vec::with_capacity(total_len);
    full.extend_from_slice(&len_buf);
    full.extend_from_slice(&rest);
    decode_full_record(&full, path_str)
}

#[cfg(not(unix))]
fn read_value_from_file(file: &File, path_str: &str, offset: u64) -> Result<String> {
    let mut file = file.try_clone().map_err(StoreError::Io)?;
    file.seek(SeekFrom::Start(offset)).map_err(StoreError::Io)?;

    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(StoreError::Io)?;
    let total_len = u32::from_le_bytes(len_buf) as usize;
    if total_len < 4 {
        return Err(StoreError::CorruptRecord {
            path: path_str.to_string(),
            reason: format!("total_len {total_len} smaller than its own header"),
        });
    }

    let mut rest = vec![0u8; total_len - 4];
    file.read_exact(&mut rest).map_err(StoreError::Io)?;

    let mut full = Vec::with_capacity(total_len);
    full.extend_from_slice(&len_buf);
    full.extend_from_slice(&rest);
    decode_full_record(&full, path_str)
}

fn decode_full_record(full: &[u8], path_str: &str) -> Result<String> {
    let path_for_closure = path_str.to_string();
    let (_key, value) = record::decode(full, move |reason| StoreError::CorruptRecord {
        path: path_for_closure.clone(),
        reason,
    })?;
    Ok(value)
}

/// Opens `path` fresh and reads the record at `offset`. Used by the merger,
/// which reads every candidate while it is still fully present on disk and
/// before any unlink can race it, so reopening by path is safe there.
pub fn read_value_at(path: &Path, offset: u64) -> Result<String> {
    let path_str = path.display().to_string();
    let mut file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(StoreError::Io)?;
    file.seek(SeekFrom::Start(offset)).map_err(StoreError::Io)?;

    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).map_err(StoreError::Io)?;
    let total_len = u32::from_le_bytes(len_buf) as usize;
    if total_len < 4 {
        return Err(StoreError::CorruptRecord {
            path: path_str,
            reason: format!("total_len {total_len} smaller than its own header"),
        });
    }

    let mut rest = vec![0u8; total_len - 4];
    file.read_exact(&mut rest).map_err(StoreError::Io)?;

    let mut full = Vec::with_capacity(total_len);
    full.extend_from_slice(&len_buf);
    full.extend_from_slice(&rest);
    decode_full_record(&full, &path_str)
}
