//! SQLite-backed cache stores for the offline worker.
//!
//! This module provides the named, versioned request/response stores the
//! worker serves from, using SQLite with async access via tokio-rusqlite.
//! It supports:
//!
//! - Named stores whose names embed a version tag (static / dynamic)
//! - One entry per (store, request key), upsert on re-fetch
//! - FIFO eviction by insertion order
//! - Atomic batch writes for install-time precaching
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedResponse;
pub use key::request_key;
pub use stores::StoreKind;
