//! Stripview Cache Library
//!
//! Bounded in-memory store of rendered tiles, split into an active and a
//! passive generation, plus a small FIFO of whole-page thumbnails.

pub mod tile_cache;

pub use tile_cache::{CacheSnapshot, CacheStats, TileCache, CACHE_SIZE, THUMBNAIL_CACHE_SIZE};
