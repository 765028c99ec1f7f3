//! ChunkStore - chunked key-value store over size-limited string media
//!
//! Stores JSON-serializable values in a flat string map (the *medium*).
//! Values too large to sit comfortably in one entry are split into slices
//! and reassembled on read, and a soft size budget keeps the medium below
//! its hard capacity.
//!
//! # Architecture
//!
//! ```text
//! profile           -> "{...}"            # small value, stored directly
//!
//! catalog_chunks    -> "3"                # large value, split in three
//! catalog_0         -> "{\"items\":[..."
//! catalog_1         -> "...."
//! catalog_2         -> "...]}"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chunkstore::{ChunkedStore, SqliteMedium, StoreOptions};
//!
//! let store = ChunkedStore::new(SqliteMedium::open("store.db")?, StoreOptions::default());
//! store.set("profile", &profile)?;
//! let profile: Option<Profile> = store.get("profile")?;
//! store.remove("profile")?;
//! ```
//!
//! # Modules
//!
//! - [`store`] - The chunked store and its options
//! - [`medium`] - Backing media (in-memory and SQLite)
//! - [`layout`] - Physical key naming and slicing
//! - [`eviction`] - Cleanup policies under quota pressure
//! - [`images`] - Product image cache built on the store
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod eviction;
pub mod images;
pub mod layout;
pub mod lock;
pub mod medium;
pub mod store;

pub use config::Config;
pub use error::{MediumError, StoreError};
pub use eviction::{EvictionPolicy, MarkerEviction};
pub use images::{ProductImageCache, ProductImages};
pub use medium::{Medium, MemoryMedium, Op, SqliteMedium};
pub use store::{ChunkedStore, FailureMode, StoreOptions, Usage};

/// Default chunk threshold and slice size (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default soft budget for the whole medium (4.5MB)
pub const DEFAULT_MAX_TOTAL_SIZE: usize = 9 * 512 * 1024;
