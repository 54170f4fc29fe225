//! Tile file store (§4.10): the on-disk record stream that backs a raster
//! file, sitting below the tile cache. Owns the free-space allocator and
//! the tile-position / VLR lookup tables, and performs the actual reads and
//! writes against the backing file.

pub mod allocator;
pub mod record;

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::compression::{CodecAnalysis, CodecRegistry};
use crate::element::ElementSpec;
use crate::error::{Error, Result};
use crate::tile::Tile;

use allocator::{AllocOutcome, FreeBlock, FreeList};
use record::{padded, RecordHeader, VlrHeader, NON_TILE_SPARE_SIZE, RECORD_HEADER_SIZE, VLR_TYPE_CODE};

/// One variable-length record's location and header, as discovered by
/// `scan_on_open` or recorded after a write.
#[derive(Debug, Clone, Copy)]
struct VlrSlot {
    header_pos: u64,
    payload_len: u64,
}

/// The record stream: everything in the backing file from `data_start`
/// onward. The region before `data_start` belongs to the persisted
/// `FileSpecification` header and is never touched here.
pub struct TileFileStore {
    file: File,
    data_start: u64,
    file_size: u64,
    free_list: FreeList,
    tile_positions: HashMap<i32, u64>,
    vlrs: HashMap<(String, u32), VlrSlot>,
    registry: CodecRegistry,
}

impl std::fmt::Debug for TileFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFileStore")
            .field("data_start", &self.data_start)
            .field("file_size", &self.file_size)
            .field("tile_count", &self.tile_positions.len())
            .field("vlr_count", &self.vlrs.len())
            .field("free_bytes", &self.free_list.total_free_bytes())
            .finish()
    }
}

impl TileFileStore {
    /// Opens a freshly created file: the record stream starts empty right
    /// after `data_start`.
    pub fn create(file: File, data_start: u64, registry: CodecRegistry) -> Result<Self> {
        Ok(Self {
            file,
            data_start,
            file_size: data_start,
            free_list: FreeList::new(),
            tile_positions: HashMap::new(),
            vlrs: HashMap::new(),
            registry,
        })
    }

    /// Opens an existing file and reconstructs the in-memory index by
    /// walking every record from `data_start` to end of file.
    pub fn open(mut file: File, data_start: u64, registry: CodecRegistry) -> Result<Self> {
        let file_size = file.seek(SeekFrom::End(0))?;

        let mut store = Self {
            file: { file.seek(SeekFrom::Start(data_start))?; file },
            data_start,
            file_size,
            free_list: FreeList::new(),
            tile_positions: HashMap::new(),
            vlrs: HashMap::new(),
            registry,
        };

        store.scan_on_open()?;
        Ok(store)
    }

    fn scan_on_open(&mut self) -> Result<()> {
        let mut free_blocks = Vec::new();
        let mut pos = self.data_start;

        while pos < self.file_size {
            let header_bytes = self.read_exact_at(pos, RECORD_HEADER_SIZE as usize)?;
            let header = RecordHeader::from_bytes(&header_bytes)?;
            let record_len = padded(header.size.unsigned_abs() as u64);

            if record_len < RECORD_HEADER_SIZE || pos + record_len > self.file_size {
                return Err(Error::corrupt(format!("record at {} has an out-of-range length", pos)));
            }

            if header.size < 0 {
                free_blocks.push(FreeBlock { pos, size: record_len });
            }
            else if header.tile_index >= 0 {
                self.tile_positions.insert(header.tile_index, pos);
            }
            else if header.tile_index == VLR_TYPE_CODE {
                let vlr_header_pos = pos + RECORD_HEADER_SIZE + NON_TILE_SPARE_SIZE;
                let vlr_header_bytes = self.read_exact_at(vlr_header_pos, record::VLR_HEADER_SIZE as usize)?;
                let vlr_header = VlrHeader::read(&vlr_header_bytes)?;

                let payload_pos = vlr_header_pos + record::VLR_HEADER_SIZE;
                let slot = VlrSlot { header_pos: pos, payload_len: vlr_header.payload_size as u64 };
                self.vlrs.insert((vlr_header.user_id.clone(), vlr_header.record_id), slot);
                let _ = payload_pos; // payload is re-read from header_pos on demand, not cached
            }
            else {
                return Err(Error::corrupt(format!("record at {} has an invalid tile index {}", pos, header.tile_index)));
            }

            pos += record_len;
        }

        self.free_list = FreeList::from_blocks(free_blocks);
        Ok(())
    }

    fn read_exact_at(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(pos))?;
        let mut buffer = vec![0_u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_all_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn write_free_header(&mut self, block: FreeBlock) -> Result<()> {
        let header = RecordHeader { size: -(block.size as i32), tile_index: 0, flags: 0 };
        self.write_all_at(block.pos, &header.to_bytes())
    }

    fn reserve(&mut self, record_len: u64) -> Result<AllocOutcome> {
        let outcome = self.free_list.alloc(record_len, self.file_size)?;

        if outcome.position == self.file_size {
            self.file_size += record_len;
            self.file.set_len(self.file_size)?;
        }

        if let Some(remainder) = outcome.split_remainder {
            self.write_free_header(remainder)?;
        }

        Ok(outcome)
    }

    fn release_tile_slot(&mut self, tile_index: i32) -> Result<()> {
        if let Some(old_pos) = self.tile_positions.remove(&tile_index) {
            let header_bytes = self.read_exact_at(old_pos, RECORD_HEADER_SIZE as usize)?;
            let old_header = RecordHeader::from_bytes(&header_bytes)?;
            let merged = self.free_list.dealloc(old_pos, padded(old_header.size.unsigned_abs() as u64));
            self.write_free_header(merged)?;
        }
        Ok(())
    }

    /// Stores (or overwrites) one tile's record. Tries the codec registry
    /// first and falls back to an uncompressed record if compression
    /// doesn't help or no codec can encode the tile. The tile's previous
    /// slot, if any, is released before the new one is allocated.
    pub fn store_tile(&mut self, tile: &Tile, elements: &[ElementSpec]) -> Result<()> {
        let uncompressed = tile.uncompressed_packing(elements)?;
        let compressed = tile.compressed_packing(elements, &self.registry)?;

        let uncompressed_record_len = padded(RECORD_HEADER_SIZE + uncompressed.len() as u64);
        let (compressed_flag, payload) = match compressed {
            Some(bytes) if padded(RECORD_HEADER_SIZE + bytes.len() as u64) < uncompressed_record_len => (true, bytes),
            _ => (false, uncompressed),
        };

        let record_len = padded(RECORD_HEADER_SIZE + payload.len() as u64);
        if record_len > i32::MAX as u64 {
            return Err(Error::NotEncodable);
        }

        self.release_tile_slot(tile.tile_index)?;
        let outcome = self.reserve(record_len)?;

        let header = RecordHeader::tile(record_len as i32, tile.tile_index, compressed_flag)?;
        let mut buffer = Vec::with_capacity(record_len as usize);
        buffer.extend_from_slice(&header.to_bytes());
        buffer.extend_from_slice(&payload);
        buffer.resize(record_len as usize, 0);

        self.write_all_at(outcome.position, &buffer)?;
        self.tile_positions.insert(tile.tile_index, outcome.position);
        Ok(())
    }

    /// Reads one tile's record back. Returns `Ok(None)` if no record has
    /// ever been stored for this tile index — callers typically treat that
    /// the same as an all-fill tile.
    pub fn read_tile(&mut self, tile_index: i32, tile_row: u32, tile_col: u32, n_rows: u32, n_cols: u32, elements: &[ElementSpec]) -> Result<Option<Tile>> {
        let Some(&pos) = self.tile_positions.get(&tile_index) else { return Ok(None) };

        let header_bytes = self.read_exact_at(pos, RECORD_HEADER_SIZE as usize)?;
        let header = RecordHeader::from_bytes(&header_bytes)?;

        if header.size <= 0 || header.tile_index != tile_index {
            return Err(Error::corrupt(format!("tile record at {} does not match its index", pos)));
        }

        let body_len = header.size as u64 - RECORD_HEADER_SIZE;
        let body = self.read_exact_at(pos + RECORD_HEADER_SIZE, body_len as usize)?;

        let tile = if header.is_compressed() {
            Tile::from_compressed_packing(tile_index, tile_row, tile_col, n_rows, n_cols, elements, &self.registry, &body)?
        }
        else {
            Tile::from_uncompressed_packing(tile_index, tile_row, tile_col, n_rows, n_cols, elements, &body)?
        };

        Ok(Some(tile))
    }

    /// Every tile index currently backed by a record, in no particular
    /// order.
    pub fn tile_indices(&self) -> Vec<i32> {
        self.tile_positions.keys().copied().collect()
    }

    /// Analysis mode (§4.8): the codec statistics for one tile's on-disk
    /// record, without decoding its values. Returns `Ok(None)` if no record
    /// has ever been stored for this index. Uncompressed records report
    /// their raw byte count with no codec-specific detail.
    pub fn analyze_tile(&mut self, tile_index: i32) -> Result<Option<CodecAnalysis>> {
        let Some(&pos) = self.tile_positions.get(&tile_index) else { return Ok(None) };

        let header_bytes = self.read_exact_at(pos, RECORD_HEADER_SIZE as usize)?;
        let header = RecordHeader::from_bytes(&header_bytes)?;
        let body_len = header.size as u64 - RECORD_HEADER_SIZE;
        let body = self.read_exact_at(pos + RECORD_HEADER_SIZE, body_len as usize)?;

        if header.is_compressed() {
            Ok(Some(self.registry.analyze_tile(&body)?))
        }
        else {
            Ok(Some(CodecAnalysis { compressed_bytes: body.len(), ..Default::default() }))
        }
    }

    /// Writes a variable-length record (metadata, not tile data). Overwrites
    /// any existing VLR with the same `(user_id, record_id)`.
    pub fn write_vlr(&mut self, user_id: &str, record_id: u32, is_text: bool, description: &str, payload: &[u8]) -> Result<()> {
        let key = (user_id.to_string(), record_id);
        if self.vlrs.contains_key(&key) {
            self.release_vlr_slot(&key)?;
        }

        let vlr_header = VlrHeader {
            user_id: user_id.to_string(),
            record_id,
            payload_size: payload.len() as u32,
            is_text,
            description: description.to_string(),
        };

        let mut header_bytes = Vec::new();
        vlr_header.write(&mut header_bytes)?;

        let body_len = NON_TILE_SPARE_SIZE + header_bytes.len() as u64 + payload.len() as u64;
        let record_len = padded(RECORD_HEADER_SIZE + body_len);
        if record_len > i32::MAX as u64 {
            return Err(Error::NotEncodable);
        }

        let outcome = self.reserve(record_len)?;
        let header = RecordHeader { size: record_len as i32, tile_index: VLR_TYPE_CODE, flags: 0 };

        let mut buffer = Vec::with_capacity(record_len as usize);
        buffer.extend_from_slice(&header.to_bytes());
        buffer.extend_from_slice(&[0_u8; NON_TILE_SPARE_SIZE as usize]);
        buffer.extend_from_slice(&header_bytes);
        buffer.extend_from_slice(payload);
        buffer.resize(record_len as usize, 0);

        self.write_all_at(outcome.position, &buffer)?;
        self.vlrs.insert(key, VlrSlot { header_pos: outcome.position, payload_len: payload.len() as u64 });
        Ok(())
    }

    fn release_vlr_slot(&mut self, key: &(String, u32)) -> Result<()> {
        if let Some(slot) = self.vlrs.remove(key) {
            let header_bytes = self.read_exact_at(slot.header_pos, RECORD_HEADER_SIZE as usize)?;
            let old_header = RecordHeader::from_bytes(&header_bytes)?;
            let merged = self.free_list.dealloc(slot.header_pos, padded(old_header.size.unsigned_abs() as u64));
            self.write_free_header(merged)?;
        }
        Ok(())
    }

    pub fn read_vlr(&mut self, user_id: &str, record_id: u32) -> Result<Option<Vec<u8>>> {
        let Some(&slot) = self.vlrs.get(&(user_id.to_string(), record_id)) else { return Ok(None) };

        let payload_pos = slot.header_pos + RECORD_HEADER_SIZE + NON_TILE_SPARE_SIZE + record::VLR_HEADER_SIZE;
        Ok(Some(self.read_exact_at(payload_pos, slot.payload_len as usize)?))
    }

    pub fn vlr_keys(&self) -> Vec<(String, u32)> {
        self.vlrs.keys().cloned().collect()
    }

    pub fn tile_count(&self) -> usize {
        self.tile_positions.len()
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_list.total_free_bytes()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Invariant check (§8): every tile/VLR slot is disjoint from the free
    /// list and the free list itself is well-formed. Used by tests and by
    /// `summarize`'s diagnostic pass.
    pub fn is_well_formed(&self) -> bool {
        self.free_list.is_well_formed()
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::element::ElementSpec;
    use std::fs::OpenOptions;

    fn temp_file(tag: &str) -> File {
        let path = std::env::temp_dir().join(format!("gvrs-store-test-{}-{}.dat", tag, rand::random::<u64>()));
        OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path).unwrap()
    }

    fn elements() -> Vec<ElementSpec> {
        vec![ElementSpec::int32("elevation", i32::MIN).unwrap()]
    }

    #[test]
    fn stores_and_reads_back_a_tile() {
        let file = temp_file("round-trip");
        let mut store = TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap();
        let elements = elements();

        let mut tile = Tile::new_filled(3, 0, 3, 4, 4, &elements);
        tile.write_cell_int(0, &elements[0], 1, 1, 77).unwrap();

        store.store_tile(&tile, &elements).unwrap();
        let restored = store.read_tile(3, 0, 3, 4, 4, &elements).unwrap().expect("tile should exist");
        assert_eq!(restored.read_cell_int(0, &elements[0], 1, 1).unwrap(), 77);
        assert!(store.is_well_formed());
    }

    #[test]
    fn missing_tile_reads_as_none() {
        let file = temp_file("missing");
        let mut store = TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap();
        let elements = elements();
        assert!(store.read_tile(9, 0, 9, 4, 4, &elements).unwrap().is_none());
    }

    #[test]
    fn overwriting_a_tile_frees_its_old_slot() {
        let file = temp_file("overwrite");
        let mut store = TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap();
        let elements = elements();

        let mut tile = Tile::new_filled(1, 0, 1, 4, 4, &elements);
        store.store_tile(&tile, &elements).unwrap();
        let size_after_first = store.file_size();

        tile.write_cell_int(0, &elements[0], 0, 0, 5).unwrap();
        store.store_tile(&tile, &elements).unwrap();

        assert_eq!(store.tile_count(), 1);
        assert!(store.is_well_formed());
        assert!(store.file_size() <= size_after_first + 64);
    }

    #[test]
    fn vlr_round_trips_and_reopens() {
        let path = std::env::temp_dir().join(format!("gvrs-store-test-vlr-{}.dat", rand::random::<u64>()));
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).unwrap();

        let mut store = TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap();
        store.write_vlr("gvrs-metadata", 1, true, "a note", b"hello world").unwrap();
        store.flush().unwrap();

        let reopened_file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let mut reopened = TileFileStore::open(reopened_file, 64, CodecRegistry::with_default_codecs()).unwrap();

        let payload = reopened.read_vlr("gvrs-metadata", 1).unwrap().unwrap();
        assert_eq!(payload, b"hello world");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn scan_on_open_reconstructs_tile_positions() {
        let path = std::env::temp_dir().join(format!("gvrs-store-test-scan-{}.dat", rand::random::<u64>()));
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).unwrap();

        let elements = elements();
        {
            let mut store = TileFileStore::create(file, 64, CodecRegistry::with_default_codecs()).unwrap();
            for i in 0..3 {
                let tile = Tile::new_filled(i, 0, i as u32, 4, 4, &elements);
                store.store_tile(&tile, &elements).unwrap();
            }
            store.flush().unwrap();
        }

        let reopened_file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let reopened = TileFileStore::open(reopened_file, 64, CodecRegistry::with_default_codecs()).unwrap();
        assert_eq!(reopened.tile_count(), 3);

        std::fs::remove_file(&path).ok();
    }
}
