//! # File System
//!
//! The public face of storage: store and retrieve whole files by universal
//! naming path. A store splits the payload into blocks, persists a new
//! manifest version and fans the blocks out to every local tier; a
//! retrieve walks the newest manifest version and reassembles it through
//! the storage manager (local tiers first, connected peers as fallback).
//!
//! ## Crate Structure
//!
//! - `manifest/` — the persistence collaborator contract and its adapters
//! - `cache` — bounded cache of retrieved files with replacement events
//! - `filesystem` — the orchestrator

pub mod cache;
pub mod errors;
pub mod filesystem;
pub mod manifest;

pub use cache::{CacheActivity, FileCache};
pub use errors::FsError;
pub use filesystem::FileSystem;
pub use manifest::{
    InMemoryManifestStore, JsonFileManifestStore, ManifestError, ManifestPersistence,
    ManifestStore,
};
