//! # Freshrag Core
//!
//! Shared logic for freshrag: data models, the lease-based crawl
//! coordination protocol, the per-domain semaphore, and the capability
//! traits the pipeline is built against (page fetcher, embedder, vector
//! store, generator).
//!
//! This crate contains no HTTP clients, no CLI, and no filesystem I/O.
//! Concrete backends (etcd, Ollama, on-disk artifacts) live in the
//! `freshrag` app crate; the in-memory implementations here exist so the
//! coordination and retrieval algorithms can be tested without external
//! services.

pub mod cancel;
pub mod coordination;
pub mod embedding;
pub mod error;
pub mod fetcher;
pub mod generator;
pub mod models;
pub mod semaphore;
pub mod vector_store;
