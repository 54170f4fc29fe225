//! In-memory tile representation: one dense plane per element, dirty
//! tracking, and the conversions that feed the codec pipeline (§4.9).

use crate::compression::CodecRegistry;
use crate::element::{ElementSpec, ElementType};
use crate::error::{Error, Result};

/// One element's data within a tile: either a dense `i32` plane (`Int32`,
/// `Int16`, `IntCodedFloat32` all share the integer representation) or a
/// dense `f32` plane (`Float32`).
#[derive(Debug, Clone)]
enum Plane {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

/// A tile: a `tRows * tCols` block of every element's data, addressed by
/// `tileIndex = tileRow * nColsOfTiles + tileCol`.
#[derive(Debug, Clone)]
pub struct Tile {
    pub tile_index: i32,
    pub tile_row: u32,
    pub tile_col: u32,
    pub n_rows: u32,
    pub n_cols: u32,
    planes: Vec<Plane>,
    writing_required: bool,
}

impl Tile {
    /// Creates a new tile with every cell set to its element's fill value.
    pub fn new_filled(tile_index: i32, tile_row: u32, tile_col: u32, n_rows: u32, n_cols: u32, elements: &[ElementSpec]) -> Self {
        let n = (n_rows * n_cols) as usize;

        let planes = elements.iter().map(|element| match element.data_type {
            ElementType::Float32 => Plane::Float(vec![element.fill_value_float(); n]),
            _ => Plane::Int(vec![element.fill_value_int(); n]),
        }).collect();

        Self { tile_index, tile_row, tile_col, n_rows, n_cols, planes, writing_required: false }
    }

    pub fn is_dirty(&self) -> bool {
        self.writing_required
    }

    pub fn clear_dirty(&mut self) {
        self.writing_required = false;
    }

    fn index_of(&self, row: u32, col: u32) -> Result<usize> {
        if row >= self.n_rows || col >= self.n_cols {
            return Err(Error::invalid(format!("cell ({}, {}) out of bounds for a {}x{} tile", row, col, self.n_rows, self.n_cols)));
        }
        Ok((row * self.n_cols + col) as usize)
    }

    fn plane(&self, element_index: usize) -> Result<&Plane> {
        self.planes.get(element_index).ok_or_else(|| Error::invalid(format!("element index {} out of range", element_index)))
    }

    fn plane_mut(&mut self, element_index: usize) -> Result<&mut Plane> {
        self.planes.get_mut(element_index).ok_or_else(|| Error::invalid(format!("element index {} out of range", element_index)))
    }

    /// Reads one cell through the integer API. A `Float32` plane is
    /// converted via the element's scale/offset.
    pub fn read_cell_int(&self, element_index: usize, element: &ElementSpec, row: u32, col: u32) -> Result<i32> {
        let i = self.index_of(row, col)?;

        match self.plane(element_index)? {
            Plane::Int(data) => Ok(data[i]),
            Plane::Float(data) => element.encode_to_int(data[i]),
        }
    }

    /// Writes one cell through the integer API and marks the tile dirty.
    pub fn write_cell_int(&mut self, element_index: usize, element: &ElementSpec, row: u32, col: u32, value: i32) -> Result<()> {
        let i = self.index_of(row, col)?;

        match self.plane_mut(element_index)? {
            Plane::Int(data) => data[i] = value,
            Plane::Float(data) => data[i] = element.decode_from_int(value)?,
        }

        self.writing_required = true;
        Ok(())
    }

    /// Reads one cell through the float API. An `Int32`/`Int16` plane has no
    /// scale and returns its raw value cast to `f32`; `IntCodedFloat32`
    /// converts via scale/offset.
    pub fn read_cell_float(&self, element_index: usize, element: &ElementSpec, row: u32, col: u32) -> Result<f32> {
        let i = self.index_of(row, col)?;

        match self.plane(element_index)? {
            Plane::Float(data) => Ok(data[i]),
            Plane::Int(data) => {
                if element.data_type == ElementType::IntCodedFloat32 {
                    element.decode_from_int(data[i])
                }
                else {
                    Ok(data[i] as f32)
                }
            },
        }
    }

    pub fn write_cell_float(&mut self, element_index: usize, element: &ElementSpec, row: u32, col: u32, value: f32) -> Result<()> {
        let i = self.index_of(row, col)?;

        match self.plane_mut(element_index)? {
            Plane::Float(data) => data[i] = value,
            Plane::Int(data) => {
                data[i] = if element.data_type == ElementType::IntCodedFloat32 {
                    element.encode_to_int(value)?
                }
                else {
                    if !value.is_finite() || value < i32::MIN as f32 || value > i32::MAX as f32 {
                        return Err(Error::NotEncodable);
                    }
                    value.round() as i32
                };
            },
        }

        self.writing_required = true;
        Ok(())
    }

    /// Reads a contiguous rectangular block `[row0, row0+n_rows) x [col0,
    /// col0+n_cols)` as integer values, row-major.
    pub fn read_block_int(&self, element_index: usize, element: &ElementSpec, row0: u32, col0: u32, n_rows: u32, n_cols: u32) -> Result<Vec<i32>> {
        let mut out = Vec::with_capacity((n_rows * n_cols) as usize);
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                out.push(self.read_cell_int(element_index, element, r, c)?);
            }
        }
        Ok(out)
    }

    pub fn write_block_int(&mut self, element_index: usize, element: &ElementSpec, row0: u32, col0: u32, n_rows: u32, n_cols: u32, values: &[i32]) -> Result<()> {
        if values.len() != (n_rows * n_cols) as usize {
            return Err(Error::invalid("block write value count does not match n_rows*n_cols"));
        }

        let mut k = 0;
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                self.write_cell_int(element_index, element, r, c, values[k])?;
                k += 1;
            }
        }
        Ok(())
    }

    pub fn read_block_float(&self, element_index: usize, element: &ElementSpec, row0: u32, col0: u32, n_rows: u32, n_cols: u32) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity((n_rows * n_cols) as usize);
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                out.push(self.read_cell_float(element_index, element, r, c)?);
            }
        }
        Ok(out)
    }

    pub fn write_block_float(&mut self, element_index: usize, element: &ElementSpec, row0: u32, col0: u32, n_rows: u32, n_cols: u32, values: &[f32]) -> Result<()> {
        if values.len() != (n_rows * n_cols) as usize {
            return Err(Error::invalid("block write value count does not match n_rows*n_cols"));
        }

        let mut k = 0;
        for r in row0 .. row0 + n_rows {
            for c in col0 .. col0 + n_cols {
                self.write_cell_float(element_index, element, r, c, values[k])?;
                k += 1;
            }
        }
        Ok(())
    }

    /// Produces an `int[]` snapshot of one element's plane for the integer
    /// codecs: a cell equal to the fill value (or NaN, for float planes)
    /// becomes `None`.
    pub fn get_int_coding(&self, element_index: usize, element: &ElementSpec) -> Result<Vec<Option<i32>>> {
        match self.plane(element_index)? {
            Plane::Int(data) => Ok(data.iter().map(|&v| if v == element.fill_value_bits { None } else { Some(v) }).collect()),
            Plane::Float(data) => data.iter().map(|&v| {
                if v.is_nan() { Ok(None) } else { element.encode_to_int(v).map(Some) }
            }).collect(),
        }
    }

    /// Inverse of `get_int_coding`: writes a decoded integer-codec result
    /// back into the element's plane.
    pub fn set_int_coding(&mut self, element_index: usize, element: &ElementSpec, values: &[Option<i32>]) -> Result<()> {
        let n = (self.n_rows * self.n_cols) as usize;
        if values.len() != n {
            return Err(Error::invalid("decoded plane length does not match tile dimensions"));
        }

        match self.plane_mut(element_index)? {
            Plane::Int(data) => {
                for (slot, value) in data.iter_mut().zip(values) {
                    *slot = value.unwrap_or(element.fill_value_bits);
                }
            },
            Plane::Float(data) => {
                for (slot, value) in data.iter_mut().zip(values) {
                    *slot = match value {
                        Some(encoded) => element.decode_from_int(*encoded)?,
                        None => f32::NAN,
                    };
                }
            },
        }

        Ok(())
    }

    pub fn has_null_data_values(&self, element_index: usize, element: &ElementSpec) -> Result<bool> {
        Ok(match self.plane(element_index)? {
            Plane::Int(data) => data.iter().any(|&v| v == element.fill_value_bits),
            Plane::Float(data) => data.iter().any(|v| v.is_nan()),
        })
    }

    pub fn has_valid_data(&self, element_index: usize, element: &ElementSpec) -> Result<bool> {
        Ok(match self.plane(element_index)? {
            Plane::Int(data) => data.iter().any(|&v| v != element.fill_value_bits),
            Plane::Float(data) => data.iter().any(|v| !v.is_nan()),
        })
    }

    pub fn set_to_null_state(&mut self, element_index: usize, element: &ElementSpec) -> Result<()> {
        match self.plane_mut(element_index)? {
            Plane::Int(data) => data.iter_mut().for_each(|v| *v = element.fill_value_bits),
            Plane::Float(data) => data.iter_mut().for_each(|v| *v = f32::NAN),
        }
        self.writing_required = true;
        Ok(())
    }

    /// Compresses every element plane independently (float elements may use
    /// the float codec directly), prefixing each with a 4-byte little-endian
    /// length and concatenating. Returns `None` if any plane could not be
    /// compressed by any installed codec — the caller falls back to
    /// uncompressed storage.
    pub fn compressed_packing(&self, elements: &[ElementSpec], registry: &CodecRegistry) -> Result<Option<Vec<u8>>> {
        let mut output = Vec::new();

        for (element_index, element) in elements.iter().enumerate() {
            let plane_bytes = match self.plane(element_index)? {
                Plane::Float(data) if registry.supports_float() => {
                    match registry.encode_float(self.n_rows as usize, self.n_cols as usize, data) {
                        Some(bytes) => bytes,
                        None => return Ok(None),
                    }
                },
                _ => {
                    let int_coding = self.get_int_coding(element_index, element)?;
                    match registry.encode_integer(self.n_rows as usize, self.n_cols as usize, &int_coding) {
                        Some(bytes) => bytes,
                        None => return Ok(None),
                    }
                },
            };

            output.extend_from_slice(&(plane_bytes.len() as u32).to_le_bytes());
            output.extend_from_slice(&plane_bytes);
        }

        Ok(Some(output))
    }

    /// Inverse of `compressed_packing`.
    pub fn from_compressed_packing(tile_index: i32, tile_row: u32, tile_col: u32, n_rows: u32, n_cols: u32, elements: &[ElementSpec], registry: &CodecRegistry, data: &[u8]) -> Result<Self> {
        let mut tile = Self::new_filled(tile_index, tile_row, tile_col, n_rows, n_cols, elements);
        let mut cursor = data;

        for (element_index, element) in elements.iter().enumerate() {
            if cursor.len() < 4 {
                return Err(Error::invalid("compressed tile packing truncated before a plane length"));
            }

            let plane_len = u32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]) as usize;
            cursor = &cursor[4..];

            if cursor.len() < plane_len {
                return Err(Error::invalid("compressed tile packing truncated inside a plane"));
            }

            let plane_bytes = &cursor[..plane_len];
            cursor = &cursor[plane_len..];

            if element.data_type == ElementType::Float32 && registry.supports_float() {
                let values = registry.decode_float(n_rows as usize, n_cols as usize, plane_bytes)?;
                if let Plane::Float(slot) = tile.plane_mut(element_index)? {
                    *slot = values;
                }
            }
            else {
                let values = registry.decode_integer(n_rows as usize, n_cols as usize, plane_bytes)?;
                tile.set_int_coding(element_index, element, &values)?;
            }
        }

        Ok(tile)
    }

    /// Uncompressed payload: each plane, row-major, little-endian, at the
    /// element's natural storage width (§6).
    pub fn uncompressed_packing(&self, elements: &[ElementSpec]) -> Result<Vec<u8>> {
        let mut output = Vec::new();

        for (element_index, element) in elements.iter().enumerate() {
            match self.plane(element_index)? {
                Plane::Int(data) => {
                    match element.data_type {
                        ElementType::Int16 => {
                            for &v in data {
                                output.extend_from_slice(&(v as i16).to_le_bytes());
                            }
                        },
                        _ => {
                            for &v in data {
                                output.extend_from_slice(&v.to_le_bytes());
                            }
                        },
                    }
                },
                Plane::Float(data) => {
                    for &v in data {
                        output.extend_from_slice(&v.to_bits().to_le_bytes());
                    }
                },
            }
        }

        Ok(output)
    }

    pub fn from_uncompressed_packing(tile_index: i32, tile_row: u32, tile_col: u32, n_rows: u32, n_cols: u32, elements: &[ElementSpec], data: &[u8]) -> Result<Self> {
        let n = (n_rows * n_cols) as usize;
        let mut planes = Vec::with_capacity(elements.len());
        let mut cursor = data;

        for element in elements {
            let width = element.storage_byte_size();
            let needed = width * n;
            if cursor.len() < needed {
                return Err(Error::invalid("uncompressed tile payload shorter than declared element planes"));
            }

            let plane = match element.data_type {
                ElementType::Float32 => {
                    let values = (0..n).map(|i| {
                        let bytes = &cursor[i * 4 .. i * 4 + 4];
                        f32::from_bits(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    }).collect();
                    Plane::Float(values)
                },
                ElementType::Int16 => {
                    let values = (0..n).map(|i| {
                        let bytes = &cursor[i * 2 .. i * 2 + 2];
                        i16::from_le_bytes([bytes[0], bytes[1]]) as i32
                    }).collect();
                    Plane::Int(values)
                },
                _ => {
                    let values = (0..n).map(|i| {
                        let bytes = &cursor[i * 4 .. i * 4 + 4];
                        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                    }).collect();
                    Plane::Int(values)
                },
            };

            planes.push(plane);
            cursor = &cursor[needed..];
        }

        Ok(Self { tile_index, tile_row, tile_col, n_rows, n_cols, planes, writing_required: false })
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::CodecRegistry;

    fn elements() -> Vec<ElementSpec> {
        vec![
            ElementSpec::int32("elevation", i32::MIN).unwrap(),
            ElementSpec::float32("temperature").unwrap(),
        ]
    }

    #[test]
    fn fresh_tile_is_all_fill() {
        let elements = elements();
        let tile = Tile::new_filled(0, 0, 0, 4, 4, &elements);
        assert_eq!(tile.read_cell_int(0, &elements[0], 1, 1).unwrap(), i32::MIN);
        assert!(tile.read_cell_float(1, &elements[1], 1, 1).unwrap().is_nan());
        assert!(!tile.is_dirty());
    }

    #[test]
    fn writes_mark_dirty_and_round_trip() {
        let elements = elements();
        let mut tile = Tile::new_filled(0, 0, 0, 4, 4, &elements);
        tile.write_cell_int(0, &elements[0], 2, 3, 42).unwrap();
        assert!(tile.is_dirty());
        assert_eq!(tile.read_cell_int(0, &elements[0], 2, 3).unwrap(), 42);
        assert_eq!(tile.read_cell_int(0, &elements[0], 0, 0).unwrap(), i32::MIN);
    }

    #[test]
    fn uncompressed_round_trip() {
        let elements = elements();
        let mut tile = Tile::new_filled(5, 1, 2, 3, 3, &elements);
        tile.write_cell_int(0, &elements[0], 1, 1, 99).unwrap();
        tile.write_cell_float(1, &elements[1], 0, 0, 3.5).unwrap();

        let bytes = tile.uncompressed_packing(&elements).unwrap();
        let restored = Tile::from_uncompressed_packing(5, 1, 2, 3, 3, &elements, &bytes).unwrap();

        assert_eq!(restored.read_cell_int(0, &elements[0], 1, 1).unwrap(), 99);
        assert_eq!(restored.read_cell_float(1, &elements[1], 0, 0).unwrap(), 3.5);
    }

    #[test]
    fn compressed_round_trip() {
        let elements = elements();
        let registry = CodecRegistry::with_default_codecs();
        let mut tile = Tile::new_filled(5, 1, 2, 4, 4, &elements);

        for r in 0..4 {
            for c in 0..4 {
                tile.write_cell_int(0, &elements[0], r, c, (r * 4 + c) as i32 - 8).unwrap();
                tile.write_cell_float(1, &elements[1], r, c, (r + c) as f32 * 1.5).unwrap();
            }
        }

        let packing = tile.compressed_packing(&elements, &registry).unwrap().expect("should be encodable");
        let restored = Tile::from_compressed_packing(5, 1, 2, 4, 4, &elements, &registry, &packing).unwrap();

        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(restored.read_cell_int(0, &elements[0], r, c).unwrap(), tile.read_cell_int(0, &elements[0], r, c).unwrap());
                assert_eq!(restored.read_cell_float(1, &elements[1], r, c).unwrap(), tile.read_cell_float(1, &elements[1], r, c).unwrap());
            }
        }
    }

    #[test]
    fn null_state_tracks_fill_values() {
        let elements = elements();
        let mut tile = Tile::new_filled(0, 0, 0, 2, 2, &elements);
        assert!(tile.has_null_data_values(0, &elements[0]).unwrap());
        assert!(!tile.has_valid_data(0, &elements[0]).unwrap());

        tile.write_cell_int(0, &elements[0], 0, 0, 7).unwrap();
        assert!(tile.has_valid_data(0, &elements[0]).unwrap());

        tile.set_to_null_state(0, &elements[0]).unwrap();
        assert!(!tile.has_valid_data(0, &elements[0]).unwrap());
    }
}
