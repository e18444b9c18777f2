//! Errors for the proxy. Deliberately its own small enum -- the proxy and
//! the KV store share no in-process state, so they do not share an error
//! type either.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}
