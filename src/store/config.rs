//! Store configuration.
//!
//! There is no CLI parsing and no config file format, so the only
//! configuration surface is environment variables with documented
//! defaults -- there is nothing else to parse or serialize.

use std::path::PathBuf;

/// Policy for how aggressively the writer flushes to disk. Not part of the
/// store's core contract; an implementation detail `Database::open` honors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// `sync_data` after every successful write. Safest, slowest.
    #[default]
    Always,
    /// Never call `sync_data`; rely on the OS page cache.
    Never,
}

impl FsyncPolicy {
    fn from_env(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "never" | "0" | "false" => FsyncPolicy::Never,
            _ => FsyncPolicy::Always,
        }
    }
}

/// Configuration for a `Database`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory the database's segment files live in.
    pub data_dir: PathBuf,
    /// Rotation threshold: the maximum byte size allowed for any one
    /// segment.
    pub max_segment_size: u64,
    /// Whether the writer fsyncs after every record.
    pub fsync_policy: FsyncPolicy,
}

const ENV_DATA_DIR: &str = "MINI_KVSTORE_DATA_DIR";
const ENV_MAX_SEGMENT_SIZE: &str = "MINI_KVSTORE_MAX_SEGMENT_SIZE";
const ENV_FSYNC: &str = "MINI_KVSTORE_FSYNC";

const DEFAULT_MAX_SEGMENT_SIZE: u64 = 16 * 1024 * 1024; // 16 MiB

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            fsync_policy: FsyncPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Builds a config from environment variables, falling back to
    /// documented defaults for anything unset or unparseable.
    ///
    /// - `MINI_KVSTORE_DATA_DIR` (default `db`)
    /// - `MINI_KVSTORE_MAX_SEGMENT_SIZE` (default `16777216`)
    /// - `MINI_KVSTORE_FSYNC` (`always` | `never`, default `always`)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var(ENV_MAX_SEGMENT_SIZE) {
            if let Ok(n) = raw.parse() {
                config.max_segment_size = n;
            }
        }
        if let Ok(raw) = std::env::var(ENV_FSYNC) {
            config.fsync_policy = FsyncPolicy::from_env(&raw);
        }
        config
    }

    /// A config suitable for tests and benches: a small rotation threshold
    /// so compaction scenarios exercise quickly, fsync disabled for speed.
    pub fn test_config(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_segment_size: 512,
            fsync_policy: FsyncPolicy::Never,
        }
    }
}
