//! mini-kvstore-v2: a segmented, log-structured key-value store with
//! background compaction, plus a small consistent-hash HTTP reverse proxy
//! that can sit in front of a colocated service.
//!
//! The two halves are independent and communicate only over HTTP, if at
//! all: [`store`] is an in-process library, [`proxy`] never touches
//! [`store`].

pub mod proxy;
pub mod store;

pub use store::config::StoreConfig;
pub use store::error::{Result, StoreError};
pub use store::stats::StoreStats;
pub use store::Database;
