//! Storage Engine Module
//!
//! This module provides the shared key-value store for TinyKV: a thread-safe,
//! sharded map with optional per-key expiry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **Millisecond Expiry**: SET can attach a deadline to a key
//! - **Passive Expiry**: Expired keys are removed when a GET finds them, and only then
//!
//! ## Example
//!
//! ```
//! use tinykv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! // Create the storage engine
//! let engine = Arc::new(StorageEngine::new());
//!
//! // Basic operations
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//!
//! // Set with a one hour expiry
//! engine.set(Bytes::from("session"), Bytes::from("token123"), Some(3_600_000));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{Entry, StorageEngine, StorageStats};
