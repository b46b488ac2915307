//! Generation-based tile cache
//!
//! Tiles requested for the current viewport live in the *active* generation.
//! When the viewport settles somewhere new, the whole active generation is
//! demoted to *passive*; tiles that are requested again get promoted back
//! instead of re-rendered, and everything else becomes the first candidate
//! for eviction. Both generations share one capacity bound.
//!
//! Thumbnails are kept apart in a small FIFO so a low resolution preview of
//! every nearby page survives even when the tile generations churn.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stripview_render::{PixelBuffer, RelativeBounds, Tile, TileKey};

/// Default number of tiles held across both generations.
pub const CACHE_SIZE: usize = 120;

/// Default number of thumbnails held outside of printing.
pub const THUMBNAIL_CACHE_SIZE: usize = 8;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Tiles in the active generation
    pub active: usize,

    /// Tiles in the passive generation
    pub passive: usize,

    /// Cached thumbnails
    pub thumbnails: usize,

    /// Passive tiles moved back to the active generation
    pub promotions: u64,

    /// Tiles evicted to stay within capacity
    pub evictions: u64,

    /// Thumbnails evicted to stay within capacity
    pub thumbnail_evictions: u64,

    /// Thumbnails dropped because an equal one was already cached
    pub duplicate_thumbnails: u64,
}

impl CacheStats {
    /// Total number of tiles across both generations
    pub fn tile_count(&self) -> usize {
        self.active + self.passive
    }
}

/// Read-only view of the cache for compositing.
#[derive(Debug)]
pub struct CacheSnapshot<P = PixelBuffer> {
    pub thumbnails: Vec<Arc<Tile<P>>>,
    /// Active tiles followed by passive tiles.
    pub tiles: Vec<Arc<Tile<P>>>,
    /// Current cache order of each entry in `tiles`, including promotions.
    /// `Tile::cache_order` keeps the order the tile was rendered with.
    pub orders: Vec<u32>,
}

impl<P> CacheSnapshot<P> {
    pub fn empty() -> Self {
        Self {
            thumbnails: Vec::new(),
            tiles: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// Tiles paired with their current order.
    pub fn ordered_tiles(&self) -> impl Iterator<Item = (u32, &Arc<Tile<P>>)> {
        self.orders.iter().copied().zip(self.tiles.iter())
    }
}

/// Heap entry. The order lives here, not in the tile, so a promotion pushes a
/// fresh entry instead of mutating one inside a live heap.
struct Entry<P> {
    order: u32,
    stamp: u64,
    tile: Arc<Tile<P>>,
}

impl<P> PartialEq for Entry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.stamp == other.stamp
    }
}

impl<P> Eq for Entry<P> {}

impl<P> Ord for Entry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the lowest order first, oldest first on ties
        other
            .order
            .cmp(&self.order)
            .then_with(|| other.stamp.cmp(&self.stamp))
    }
}

impl<P> PartialOrd for Entry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Generations<P> {
    active: BinaryHeap<Entry<P>>,
    passive: BinaryHeap<Entry<P>>,
    next_stamp: u64,
    promotions: u64,
    evictions: u64,
}

impl<P> Generations<P> {
    fn new() -> Self {
        Self {
            active: BinaryHeap::new(),
            passive: BinaryHeap::new(),
            next_stamp: 0,
            promotions: 0,
            evictions: 0,
        }
    }

    fn len(&self) -> usize {
        self.active.len() + self.passive.len()
    }

    fn push_active(&mut self, order: u32, tile: Arc<Tile<P>>) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.active.push(Entry { order, stamp, tile });
    }

    /// Drop the lowest-order passive tile, or the lowest-order active tile
    /// once passive is empty.
    fn evict_one(&mut self) -> bool {
        let evicted = self.passive.pop().or_else(|| self.active.pop());
        match evicted {
            Some(entry) => {
                log::trace!(
                    "evicting tile page={} order={}",
                    entry.tile.page,
                    entry.order
                );
                self.evictions += 1;
                true
            }
            None => false,
        }
    }
}

fn take<P>(heap: &mut BinaryHeap<Entry<P>>, key: &TileKey) -> Option<Arc<Tile<P>>> {
    let tile = heap
        .iter()
        .find(|entry| entry.tile.key() == *key)
        .map(|entry| Arc::clone(&entry.tile))?;
    heap.retain(|entry| entry.tile.key() != *key);
    Some(tile)
}

struct Thumbnails<P> {
    tiles: VecDeque<Arc<Tile<P>>>,
    evictions: u64,
    duplicates: u64,
}

/// Capacity-bounded tile cache with active/passive generations and a
/// thumbnail FIFO.
///
/// Thread-safe: the render worker inserts finished tiles while the viewer
/// promotes and ages out tiles on viewport changes. Generations and
/// thumbnails are guarded by separate locks. A tile's pixel buffer is
/// released when the last reference to it is dropped, which for the cache
/// means on eviction or [`TileCache::clear`].
///
/// # Example
///
/// ```
/// use stripview_cache::TileCache;
/// use stripview_render::{RelativeBounds, Tile};
///
/// let cache: TileCache<()> = TileCache::new(4, 2);
/// cache.insert(Tile {
///     page: 0,
///     bounds: RelativeBounds::new(0.0, 0.0, 0.5, 0.5),
///     pixels: (),
///     is_thumbnail: false,
///     cache_order: 1,
/// });
///
/// cache.begin_new_generation();
/// assert!(cache.upgrade_if_present(0, RelativeBounds::new(0.0, 0.0, 0.5, 0.5), 3));
/// assert_eq!(cache.stats().active, 1);
/// ```
pub struct TileCache<P = PixelBuffer> {
    capacity: usize,
    thumbnail_capacity: usize,
    generations: Mutex<Generations<P>>,
    thumbnails: Mutex<Thumbnails<P>>,
}

impl<P> Default for TileCache<P> {
    fn default() -> Self {
        Self::new(CACHE_SIZE, THUMBNAIL_CACHE_SIZE)
    }
}

impl<P> TileCache<P> {
    /// Create a cache
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of tiles across both generations (at least 1)
    /// * `thumbnail_capacity` - Maximum number of thumbnails outside of printing (at least 1)
    pub fn new(capacity: usize, thumbnail_capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            thumbnail_capacity: thumbnail_capacity.max(1),
            generations: Mutex::new(Generations::new()),
            thumbnails: Mutex::new(Thumbnails {
                tiles: VecDeque::new(),
                evictions: 0,
                duplicates: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn thumbnail_capacity(&self) -> usize {
        self.thumbnail_capacity
    }

    fn generations(&self) -> MutexGuard<'_, Generations<P>> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn thumbnails(&self) -> MutexGuard<'_, Thumbnails<P>> {
        self.thumbnails.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Promote a cached tile instead of rendering it again
    ///
    /// A matching passive tile moves to the active generation with `new_order`.
    /// A matching active tile is left as it is.
    ///
    /// # Returns
    ///
    /// `true` if the tile is now in the active generation, `false` if the
    /// caller has to schedule a render.
    pub fn upgrade_if_present(&self, page: u32, bounds: RelativeBounds, new_order: u32) -> bool {
        let key = TileKey::new(page, bounds);
        let mut generations = self.generations();

        if let Some(tile) = take(&mut generations.passive, &key) {
            generations.push_active(new_order, tile);
            generations.promotions += 1;
            return true;
        }
        generations.active.iter().any(|entry| entry.tile.key() == key)
    }

    /// Store a rendered tile in the active generation
    ///
    /// A cached copy of the same fragment is replaced. Tiles are evicted,
    /// passive generation first and lowest order first, until there is room.
    pub fn insert(&self, tile: Tile<P>) {
        let key = tile.key();
        let order = tile.cache_order;
        let mut generations = self.generations();

        let stale_active = take(&mut generations.active, &key);
        let stale_passive = take(&mut generations.passive, &key);
        drop((stale_active, stale_passive));

        while generations.len() >= self.capacity {
            if !generations.evict_one() {
                break;
            }
        }
        generations.push_active(order, Arc::new(tile));
    }

    /// Demote the whole active generation to passive.
    pub fn begin_new_generation(&self) {
        let mut generations = self.generations();
        let mut active = std::mem::take(&mut generations.active);
        let demoted = active.len();
        generations.passive.append(&mut active);
        log::debug!(
            "new cache generation: {} tiles demoted, {} passive",
            demoted,
            generations.passive.len()
        );
    }

    /// Store a thumbnail
    ///
    /// # Arguments
    ///
    /// * `tile` - Whole-page thumbnail
    /// * `unbounded` - Skip the capacity bound, used when collecting thumbnails for printing
    ///
    /// # Returns
    ///
    /// `false` if an equal thumbnail was already cached; the new one is dropped.
    pub fn insert_thumbnail(&self, tile: Tile<P>, unbounded: bool) -> bool {
        let key = tile.key();
        let mut thumbnails = self.thumbnails();

        if thumbnails.tiles.iter().any(|cached| cached.key() == key) {
            thumbnails.duplicates += 1;
            return false;
        }
        if !unbounded {
            while thumbnails.tiles.len() >= self.thumbnail_capacity {
                if thumbnails.tiles.pop_front().is_none() {
                    break;
                }
                thumbnails.evictions += 1;
            }
        }
        thumbnails.tiles.push_back(Arc::new(tile));
        true
    }

    pub fn contains_thumbnail(&self, page: u32, bounds: RelativeBounds) -> bool {
        let key = TileKey::new(page, bounds);
        self.thumbnails().tiles.iter().any(|cached| cached.key() == key)
    }

    /// Everything currently cached, for drawing.
    pub fn snapshot(&self) -> CacheSnapshot<P> {
        let (orders, tiles) = {
            let generations = self.generations();
            generations
                .active
                .iter()
                .chain(generations.passive.iter())
                .map(|entry| (entry.order, Arc::clone(&entry.tile)))
                .unzip()
        };
        let thumbnails = self.thumbnails().tiles.iter().cloned().collect();
        CacheSnapshot {
            thumbnails,
            tiles,
            orders,
        }
    }

    /// Release every cached tile and thumbnail.
    pub fn clear(&self) {
        let (active, passive) = {
            let mut generations = self.generations();
            (
                std::mem::take(&mut generations.active),
                std::mem::take(&mut generations.passive),
            )
        };
        let thumbnails = std::mem::take(&mut self.thumbnails().tiles);
        log::debug!(
            "clearing cache: {} active, {} passive, {} thumbnails",
            active.len(),
            passive.len(),
            thumbnails.len()
        );
    }

    /// Number of tiles across both generations
    pub fn len(&self) -> usize {
        self.generations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn thumbnail_count(&self) -> usize {
        self.thumbnails().tiles.len()
    }

    pub fn stats(&self) -> CacheStats {
        let (active, passive, promotions, evictions) = {
            let generations = self.generations();
            (
                generations.active.len(),
                generations.passive.len(),
                generations.promotions,
                generations.evictions,
            )
        };
        let thumbnails = self.thumbnails();
        CacheStats {
            active,
            passive,
            thumbnails: thumbnails.tiles.len(),
            promotions,
            evictions,
            thumbnail_evictions: thumbnails.evictions,
            duplicate_thumbnails: thumbnails.duplicates,
        }
    }
}
