//! File facade (§4.13): the public surface applications use to open,
//! create, read, and write a raster file.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::cache::{CacheSize, CacheStatistics, TileCache};
use crate::compression::{integer_deflate, integer_huffman, float_codec, Codec, CodecRegistry};
use crate::element::ElementSpec;
use crate::error::{Error, Result};
use crate::spec_file::FileSpecification;
use crate::store::record::padded;
use crate::store::TileFileStore;

/// Generously larger than any realistic header, so opening a file only
/// needs a single read before the header length is known.
const HEADER_READ_BUDGET: usize = 1 << 16;

const METADATA_USER_ID: &str = "gvrs-metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// An open raster file: the persisted specification plus a live tile
/// cache over its backing store.
pub struct GvrsFile {
    spec: FileSpecification,
    cache: TileCache,
    mode: OpenMode,
    multi_threading_enabled: bool,
}

impl std::fmt::Debug for GvrsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GvrsFile")
            .field("identification", &self.spec.identification)
            .field("mode", &self.mode)
            .field("cache", &self.cache)
            .finish()
    }
}

fn codec_for_id(id: &str) -> Result<Box<dyn Codec>> {
    match id {
        "gvrs-int-huffman" => Ok(Box::new(integer_huffman::IntegerHuffmanCodec)),
        "gvrs-int-deflate" => Ok(Box::new(integer_deflate::IntegerDeflateCodec)),
        "gvrs-float" => Ok(Box::new(float_codec::FloatCodec)),
        other => Err(Error::unsupported(format!("unknown codec id {:?} persisted in file header", other))),
    }
}

impl GvrsFile {
    /// Creates a new raster file at `path`, writing `spec`'s header. If
    /// `spec` hasn't had any codecs registered, the default codec set is
    /// installed and recorded.
    pub fn create(path: impl AsRef<Path>, mut spec: FileSpecification) -> Result<Self> {
        let registry = if spec.codec_ids.is_empty() {
            let registry = CodecRegistry::with_default_codecs();
            for name in registry.codec_names() {
                spec.add_compression_codec(name)?;
            }
            registry
        }
        else {
            let mut registry = CodecRegistry::new();
            for id in &spec.codec_ids {
                registry.add_codec(codec_for_id(id)?)?;
            }
            registry
        };

        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;

        let mut header = Vec::new();
        spec.write(&mut header)?;
        let data_start = padded(header.len() as u64);
        header.resize(data_start as usize, 0);
        file.write_all(&header)?;
        file.flush()?;

        let store = TileFileStore::create(file, data_start, registry)?;
        let cache = TileCache::new(store, spec.elements.clone(), spec.n_rows_in_tile, spec.n_cols_in_tile, spec.n_cols_of_tiles(), CacheSize::default());

        Ok(Self { spec, cache, mode: OpenMode::ReadWrite, multi_threading_enabled: cfg!(feature = "rayon") })
    }

    /// Opens an existing raster file, reconstructing the tile index by
    /// scanning the record stream (§4.10's "scan on open").
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(mode == OpenMode::ReadWrite).open(path)?;

        let file_size = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;

        let read_len = (file_size as usize).min(HEADER_READ_BUDGET);
        let mut header_bytes = vec![0_u8; read_len];
        file.read_exact(&mut header_bytes)?;

        let (spec, consumed) = FileSpecification::read_with_consumed(&header_bytes)?;
        let data_start = padded(consumed as u64);

        let mut registry = CodecRegistry::new();
        for id in &spec.codec_ids {
            registry.add_codec(codec_for_id(id)?)?;
        }

        let store = TileFileStore::open(file, data_start, registry)?;
        let cache = TileCache::new(store, spec.elements.clone(), spec.n_rows_in_tile, spec.n_cols_in_tile, spec.n_cols_of_tiles(), CacheSize::default());

        Ok(Self { spec, cache, mode, multi_threading_enabled: cfg!(feature = "rayon") })
    }

    pub fn specification(&self) -> &FileSpecification {
        &self.spec
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(Error::invalid("file was opened read-only"));
        }
        Ok(())
    }

    fn element_index(&self, name: &str) -> Result<usize> {
        self.spec.elements.iter().position(|element| element.name == name).ok_or_else(|| Error::invalid(format!("no such element {:?}", name)))
    }

    /// Returns a handle for reading/writing one named element across the
    /// raster. Errors if no element with that name was declared.
    pub fn element(&mut self, name: &str) -> Result<ElementHandle<'_>> {
        let element_index = self.element_index(name)?;
        Ok(ElementHandle { file: self, element_index })
    }

    fn locate(&self, row: u32, col: u32) -> Result<(i32, u32, u32)> {
        if row >= self.spec.n_rows_in_raster || col >= self.spec.n_cols_in_raster {
            return Err(Error::invalid(format!("cell ({}, {}) is outside the {}x{} raster", row, col, self.spec.n_rows_in_raster, self.spec.n_cols_in_raster)));
        }

        let tile_row = row / self.spec.n_rows_in_tile;
        let tile_col = col / self.spec.n_cols_in_tile;
        let tile_index = (tile_row * self.spec.n_cols_of_tiles() + tile_col) as i32;
        Ok((tile_index, row % self.spec.n_rows_in_tile, col % self.spec.n_cols_in_tile))
    }

    pub fn set_tile_cache_size(&mut self, size: CacheSize) -> Result<()> {
        self.cache.set_capacity(size)
    }

    /// Advisory only (§5): this crate does not itself farm out tile
    /// compression to a thread pool. A facade built on top of it can honor
    /// this flag to decide whether to use `rayon` for bulk operations.
    pub fn set_multi_threading_enabled(&mut self, enabled: bool) {
        self.multi_threading_enabled = enabled && cfg!(feature = "rayon");
    }

    pub fn multi_threading_enabled(&self) -> bool {
        self.multi_threading_enabled
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.cache.statistics()
    }

    /// Writes back every dirty cached tile.
    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush()?;
        self.cache.store_mut().flush()
    }

    /// Flushes and drops the file handle. Equivalent to letting `self` go
    /// out of scope, but lets callers surface a flush error explicitly.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Attaches an arbitrary metadata payload to the file as a
    /// variable-length record (§4.10), keyed by `record_id`.
    pub fn write_metadata(&mut self, record_id: u32, description: &str, payload: &[u8]) -> Result<()> {
        self.require_writable()?;
        self.cache.store_mut().write_vlr(METADATA_USER_ID, record_id, false, description, payload)
    }

    pub fn read_metadata(&mut self, record_id: u32) -> Result<Option<Vec<u8>>> {
        self.cache.store_mut().read_vlr(METADATA_USER_ID, record_id)
    }

    /// Writes a human-readable report to `writer`: raster/tile geometry,
    /// on-disk tile and free-space counts, and cache hit/miss statistics.
    /// `verbose` additionally lists every declared element.
    pub fn summarize(&mut self, writer: &mut dyn Write, verbose: bool) -> Result<()> {
        let stats = self.cache.statistics();

        writeln!(writer, "raster: {} x {} cells, tile {} x {} ({} x {} tiles)",
            self.spec.n_rows_in_raster, self.spec.n_cols_in_raster,
            self.spec.n_rows_in_tile, self.spec.n_cols_in_tile,
            self.spec.n_rows_of_tiles(), self.spec.n_cols_of_tiles())?;
        writeln!(writer, "tiles on disk: {}, free space: {} bytes", self.cache.store().tile_count(), self.cache.store().free_bytes())?;
        writeln!(writer, "cache: {} resident, {} hits, {} misses, {} evictions, {} negative hits",
            self.cache.resident_tile_count(), stats.hits, stats.misses, stats.evictions, stats.negative_hits)?;

        if verbose {
            for element in &self.spec.elements {
                writeln!(writer, "  element {:?}: {:?} (scale {}, offset {})", element.name, element.data_type, element.scale, element.offset)?;
            }

            let tile_indices = self.cache.store().tile_indices();
            let mut compressed_bytes_total = 0usize;
            let mut m32_bytes_total = 0usize;
            let mut tiles_with_m32 = 0usize;

            for tile_index in &tile_indices {
                if let Some(analysis) = self.cache.store_mut().analyze_tile(*tile_index)? {
                    compressed_bytes_total += analysis.compressed_bytes;
                    if let Some(m32_bytes) = analysis.m32_bytes {
                        m32_bytes_total += m32_bytes;
                        tiles_with_m32 += 1;
                    }
                }
            }

            writeln!(writer, "  codec analysis: {} tiles, {} bytes packed", tile_indices.len(), compressed_bytes_total)?;
            if tiles_with_m32 > 0 {
                writeln!(writer, "  codec analysis: {} bytes of varint-coded residuals across {} tiles", m32_bytes_total, tiles_with_m32)?;
            }
        }

        Ok(())
    }
}

/// A handle for reading and writing one element's values across the whole
/// raster, borrowed from a `GvrsFile`.
pub struct ElementHandle<'a> {
    file: &'a mut GvrsFile,
    element_index: usize,
}

impl<'a> ElementHandle<'a> {
    fn element(&self) -> ElementSpec {
        self.file.spec.elements[self.element_index].clone()
    }

    fn tile_for_write(&mut self, tile_index: i32) -> Result<&mut crate::tile::Tile> {
        if self.file.cache.get_tile(tile_index)?.is_none() {
            self.file.cache.allocate_new_tile(tile_index)?;
        }
        Ok(self.file.cache.get_tile(tile_index)?.expect("tile was just loaded or allocated"))
    }

    pub fn read_value_int(&mut self, row: u32, col: u32) -> Result<i32> {
        let (tile_index, local_row, local_col) = self.file.locate(row, col)?;
        let element = self.element();

        match self.file.cache.get_tile(tile_index)? {
            Some(tile) => tile.read_cell_int(self.element_index, &element, local_row, local_col),
            None => Ok(element.fill_value_int()),
        }
    }

    pub fn write_value_int(&mut self, row: u32, col: u32, value: i32) -> Result<()> {
        self.file.require_writable()?;
        let (tile_index, local_row, local_col) = self.file.locate(row, col)?;
        let element = self.element();
        self.tile_for_write(tile_index)?.write_cell_int(self.element_index, &element, local_row, local_col, value)
    }

    pub fn read_value(&mut self, row: u32, col: u32) -> Result<f32> {
        let (tile_index, local_row, local_col) = self.file.locate(row, col)?;
        let element = self.element();

        match self.file.cache.get_tile(tile_index)? {
            Some(tile) => tile.read_cell_float(self.element_index, &element, local_row, local_col),
            None => Ok(element.fill_value_float()),
        }
    }

    pub fn write_value(&mut self, row: u32, col: u32, value: f32) -> Result<()> {
        self.file.require_writable()?;
        let (tile_index, local_row, local_col) = self.file.locate(row, col)?;
        let element = self.element();
        self.tile_for_write(tile_index)?.write_cell_float(self.element_index, &element, local_row, local_col, value)
    }

    /// Reads a `n_rows x n_cols` block starting at `(row0, col0)`,
    /// row-major. May span multiple tiles.
    pub fn read_block_int(&mut self, row0: u32, col0: u32, n_rows: u32, n_cols: u32) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity((n_rows * n_cols) as usize);
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                out.push(self.read_value_int(r, c)?);
            }
        }
        Ok(out)
    }

    pub fn write_block_int(&mut self, row0: u32, col0: u32, n_rows: u32, n_cols: u32, values: &[i32]) -> Result<()> {
        if values.len() != (n_rows * n_cols) as usize {
            return Err(Error::invalid("block write value count does not match n_rows*n_cols"));
        }

        let mut k = 0;
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                self.write_value_int(r, c, values[k])?;
                k += 1;
            }
        }
        Ok(())
    }

    pub fn read_block(&mut self, row0: u32, col0: u32, n_rows: u32, n_cols: u32) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity((n_rows * n_cols) as usize);
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                out.push(self.read_value(r, c)?);
            }
        }
        Ok(out)
    }

    pub fn write_block(&mut self, row0: u32, col0: u32, n_rows: u32, n_cols: u32, values: &[f32]) -> Result<()> {
        if values.len() != (n_rows * n_cols) as usize {
            return Err(Error::invalid("block write value count does not match n_rows*n_cols"));
        }

        let mut k = 0;
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                self.write_value(r, c, values[k])?;
                k += 1;
            }
        }
        Ok(())
    }
}
