//! Core types and shared functionality for stashway.
//!
//! This crate provides:
//! - Named, versioned cache stores with a SQLite backend
//! - Unified error types
//! - Worker configuration with layered loading

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CachedResponse, StoreKind};
pub use config::WorkerConfig;
pub use error::Error;
