//! Freshrag application crate: concrete backends and the pipeline stages.
//!
//! The core crate defines the protocol and the capability traits; this
//! crate supplies the etcd coordination client, the HTTP page fetcher,
//! the Ollama embedder and generator, the on-disk content store, and the
//! three pipeline stages (crawl, index, query) the `freshrag` binary
//! drives.

pub mod config;
pub mod content_store;
pub mod crawl;
pub mod etcd;
pub mod fetch;
pub mod indexer;
pub mod ollama;
pub mod query;
