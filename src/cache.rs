//! Tile cache (§4.11): a bounded LRU over `Tile` objects keyed by
//! `tileIndex`, backed by a `TileFileStore`. Dirty tiles are written back on
//! eviction and on `flush`.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::element::ElementSpec;
use crate::error::{Error, Result};
use crate::store::TileFileStore;
use crate::tile::Tile;

/// Default tile capacity when none is requested explicitly.
const DEFAULT_CAPACITY: usize = 16;

/// Named convenience capacities, chosen (per the design) to be relatively
/// prime to common tile-row widths so that a row-major scan doesn't thrash
/// the cache by repeatedly evicting a tile it is about to revisit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSize {
    Small,
    Medium,
    Large,
    Custom(usize),
}

impl CacheSize {
    pub fn tile_count(self) -> usize {
        match self {
            CacheSize::Small => 13,
            CacheSize::Medium => 29,
            CacheSize::Large => 97,
            CacheSize::Custom(n) => n.max(1),
        }
    }
}

impl Default for CacheSize {
    fn default() -> Self {
        CacheSize::Custom(DEFAULT_CAPACITY)
    }
}

/// Diagnostic counters surfaced through `GvrsFile::summarize` (supplemented
/// feature, §A.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub negative_hits: u64,
}

pub struct TileCache {
    store: TileFileStore,
    elements: Vec<ElementSpec>,
    n_rows_per_tile: u32,
    n_cols_per_tile: u32,
    n_cols_of_tiles: u32,
    cache: LruCache<i32, Tile>,
    /// Fast-path shortcut: the most recently served index. A match still
    /// goes through the hash map (the `lru` crate doesn't expose a cheaper
    /// path), but it skips the negative-miss check and the separate
    /// `contains` probe, collapsing repeated access to the same tile to a
    /// single lookup instead of two.
    last_index: Option<i32>,
    prior_unsatisfied_request: Option<i32>,
    statistics: CacheStatistics,
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("capacity", &self.cache.cap())
            .field("resident", &self.cache.len())
            .field("statistics", &self.statistics)
            .finish()
    }
}

impl TileCache {
    pub fn new(store: TileFileStore, elements: Vec<ElementSpec>, n_rows_per_tile: u32, n_cols_per_tile: u32, n_cols_of_tiles: u32, capacity: CacheSize) -> Self {
        let cap = NonZeroUsize::new(capacity.tile_count()).unwrap_or(NonZeroUsize::new(1).unwrap());

        Self {
            store,
            elements,
            n_rows_per_tile,
            n_cols_per_tile,
            n_cols_of_tiles,
            cache: LruCache::new(cap),
            last_index: None,
            prior_unsatisfied_request: None,
            statistics: CacheStatistics::default(),
        }
    }

    fn tile_row_col(&self, tile_index: i32) -> (u32, u32) {
        let idx = tile_index as u32;
        (idx / self.n_cols_of_tiles, idx % self.n_cols_of_tiles)
    }

    /// Grows or shrinks the cache. Shrinking writes back and evicts the
    /// least-recently-used tiles down to the new capacity.
    pub fn set_capacity(&mut self, capacity: CacheSize) -> Result<()> {
        let new_cap = capacity.tile_count();

        while self.cache.len() > new_cap {
            self.evict_lru()?;
        }

        self.cache.resize(NonZeroUsize::new(new_cap).unwrap_or(NonZeroUsize::new(1).unwrap()));
        Ok(())
    }

    fn evict_lru(&mut self) -> Result<()> {
        if let Some((_, evicted)) = self.cache.pop_lru() {
            if evicted.is_dirty() {
                self.store.store_tile(&evicted, &self.elements)?;
            }
            self.statistics.evictions += 1;
        }
        Ok(())
    }

    fn insert(&mut self, tile_index: i32, tile: Tile) -> Result<()> {
        if self.cache.len() >= self.cache.cap().get() && !self.cache.contains(&tile_index) {
            self.evict_lru()?;
        }
        self.cache.put(tile_index, tile);
        Ok(())
    }

    /// Looks up a tile, reading it from the backing store on a cache miss.
    /// Returns `Ok(None)` if the store has no record for this index either
    /// (a negative-miss request, remembered so a repeat doesn't re-query
    /// the store).
    pub fn get_tile(&mut self, tile_index: i32) -> Result<Option<&mut Tile>> {
        if self.last_index == Some(tile_index) {
            if let Some(tile) = self.cache.get_mut(&tile_index) {
                self.statistics.hits += 1;
                return Ok(Some(tile));
            }
            self.last_index = None;
        }

        if self.prior_unsatisfied_request == Some(tile_index) {
            self.statistics.negative_hits += 1;
            return Ok(None);
        }

        if self.cache.contains(&tile_index) {
            self.statistics.hits += 1;
            self.last_index = Some(tile_index);
            return Ok(self.cache.get_mut(&tile_index));
        }

        self.statistics.misses += 1;
        let (tile_row, tile_col) = self.tile_row_col(tile_index);
        let loaded = self.store.read_tile(tile_index, tile_row, tile_col, self.n_rows_per_tile, self.n_cols_per_tile, &self.elements)?;

        let Some(tile) = loaded else {
            self.prior_unsatisfied_request = Some(tile_index);
            return Ok(None);
        };

        self.prior_unsatisfied_request = None;
        self.insert(tile_index, tile)?;
        self.last_index = Some(tile_index);
        Ok(self.cache.get_mut(&tile_index))
    }

    /// Creates and caches a new all-fill tile. Errors if the tile is
    /// already resident; callers that want "get or create" should call
    /// `get_tile` first.
    pub fn allocate_new_tile(&mut self, tile_index: i32) -> Result<&mut Tile> {
        if self.cache.contains(&tile_index) {
            return Err(Error::invalid(format!("tile {} is already present in the cache", tile_index)));
        }

        self.prior_unsatisfied_request = None;
        let (tile_row, tile_col) = self.tile_row_col(tile_index);
        let tile = Tile::new_filled(tile_index, tile_row, tile_col, self.n_rows_per_tile, self.n_cols_per_tile, &self.elements);
        self.insert(tile_index, tile)?;
        self.last_index = Some(tile_index);
        Ok(self.cache.get_mut(&tile_index).expect("just inserted"))
    }

    /// Writes back every dirty resident tile and clears their dirty flags.
    pub fn flush(&mut self) -> Result<()> {
        for (_, tile) in self.cache.iter_mut() {
            if tile.is_dirty() {
                self.store.store_tile(tile, &self.elements)?;
                tile.clear_dirty();
            }
        }
        Ok(())
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.statistics
    }

    pub fn resident_tile_count(&self) -> usize {
        self.cache.len()
    }

    pub fn store(&self) -> &TileFileStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TileFileStore {
        &mut self.store
    }

    pub fn into_store(self) -> TileFileStore {
        self.store
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::CodecRegistry;
    use std::fs::OpenOptions;

    fn temp_store(tag: &str) -> TileFileStore {
        let path = std::env::temp_dir().join(format!("gvrs-cache-test-{}-{}.dat", tag, rand::random::<u64>()));
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path).unwrap();
        TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap()
    }

    fn elements() -> Vec<ElementSpec> {
        vec![ElementSpec::int32("elevation", i32::MIN).unwrap()]
    }

    #[test]
    fn allocates_and_round_trips_through_the_cache() {
        let elements = elements();
        let mut cache = TileCache::new(temp_store("alloc"), elements.clone(), 4, 4, 8, CacheSize::Custom(4));

        {
            let tile = cache.allocate_new_tile(5).unwrap();
            tile.write_cell_int(0, &elements[0], 0, 0, 42).unwrap();
        }

        assert!(cache.allocate_new_tile(5).is_err());
        let tile = cache.get_tile(5).unwrap().expect("tile 5 is resident");
        assert_eq!(tile.read_cell_int(0, &elements[0], 0, 0).unwrap(), 42);
        assert_eq!(cache.statistics().hits, 1);
    }

    #[test]
    fn missing_tile_is_remembered_as_a_negative_hit() {
        let mut cache = TileCache::new(temp_store("negative"), elements(), 4, 4, 8, CacheSize::Custom(4));
        assert!(cache.get_tile(9).unwrap().is_none());
        assert!(cache.get_tile(9).unwrap().is_none());
        assert_eq!(cache.statistics().negative_hits, 1);
    }

    #[test]
    fn eviction_writes_back_dirty_tiles() {
        let elements = elements();
        let mut cache = TileCache::new(temp_store("evict"), elements.clone(), 2, 2, 8, CacheSize::Custom(1));

        {
            let tile = cache.allocate_new_tile(0).unwrap();
            tile.write_cell_int(0, &elements[0], 0, 0, 11).unwrap();
        }

        // second tile evicts the first, which must be written back since it is dirty
        cache.allocate_new_tile(1).unwrap();
        assert_eq!(cache.statistics().evictions, 1);

        let reloaded = cache.get_tile(0).unwrap().expect("tile 0 should have been written back");
        assert_eq!(reloaded.read_cell_int(0, &elements[0], 0, 0).unwrap(), 11);
    }

    #[test]
    fn flush_clears_dirty_flags_without_evicting() {
        let elements = elements();
        let mut cache = TileCache::new(temp_store("flush"), elements.clone(), 2, 2, 8, CacheSize::Custom(4));

        {
            let tile = cache.allocate_new_tile(2).unwrap();
            tile.write_cell_int(0, &elements[0], 0, 0, 5).unwrap();
        }

        cache.flush().unwrap();
        assert!(!cache.get_tile(2).unwrap().unwrap().is_dirty());
    }
}
