//! FNV-1a, used to map a client's remote address onto one healthy backend.

use std::hash::Hasher;

use fnv::FnvHasher;

/// FNV-1a over raw bytes, via the `fnv` crate's `Hasher` implementation.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}
