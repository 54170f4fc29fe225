//! File specification (§4.12): the persisted, fixed-layout header that
//! describes a raster's dimensions, element declarations, coordinate
//! mapping, and installed codec ids.

use crate::element::ElementSpec;
use crate::error::{Error, Result};
use crate::io::{read_fixed_ascii, read_prefixed_string, write_fixed_ascii, write_prefixed_string, Data};
use crate::math::{compute_tile_count, CoordinateTransform, GridPoint, ModelPoint};

const MAGIC: [u8; 4] = *b"GVRS";
const FORMAT_MAJOR: u8 = 1;
const FORMAT_MINOR: u8 = 0;
const FORMAT_SUB: u8 = 0;

const IDENTIFICATION_WIDTH: usize = 64;
const MAX_ELEMENT_STRING_LEN: usize = 256;
const CODEC_ID_WIDTH: usize = 16;
const MAX_CODECS: usize = 255;
const MAX_TILE_COUNT: u64 = (1_u64 << 31) - 1;

/// Whether a raster's cells are read as discrete points or as area averages.
/// Purely descriptive metadata; it has no effect on coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Unspecified,
    PointValued,
    AreaValued,
}

impl GeometryType {
    fn code(self) -> u8 {
        match self {
            GeometryType::Unspecified => 0,
            GeometryType::PointValued => 1,
            GeometryType::AreaValued => 2,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(GeometryType::Unspecified),
            1 => Ok(GeometryType::PointValued),
            2 => Ok(GeometryType::AreaValued),
            other => Err(Error::invalid(format!("unknown geometry type code {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    None,
    Cartesian,
    Geographic,
}

impl CoordinateSystem {
    fn code(self) -> u8 {
        match self {
            CoordinateSystem::None => 0,
            CoordinateSystem::Cartesian => 1,
            CoordinateSystem::Geographic => 2,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(CoordinateSystem::None),
            1 => Ok(CoordinateSystem::Cartesian),
            2 => Ok(CoordinateSystem::Geographic),
            other => Err(Error::invalid(format!("unknown coordinate system code {}", other))),
        }
    }
}

/// The persisted raster description: dimensions, element declarations,
/// coordinate mapping, and the codec ids installed when the file was
/// created.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpecification {
    pub identification: String,
    pub n_rows_in_raster: u32,
    pub n_cols_in_raster: u32,
    pub n_rows_in_tile: u32,
    pub n_cols_in_tile: u32,
    pub elements: Vec<ElementSpec>,
    pub extended_size: bool,
    pub geometry: GeometryType,
    pub coordinate_system: CoordinateSystem,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub codec_ids: Vec<String>,
    pub checksums_enabled: bool,
    pub data_compression_enabled: bool,
    uuid: [u8; 16],
}

impl FileSpecification {
    pub fn new(n_rows_in_raster: u32, n_cols_in_raster: u32, n_rows_in_tile: u32, n_cols_in_tile: u32, elements: Vec<ElementSpec>, uuid: [u8; 16]) -> Result<Self> {
        if n_rows_in_raster == 0 || n_cols_in_raster == 0 || n_rows_in_tile == 0 || n_cols_in_tile == 0 {
            return Err(Error::invalid("raster and tile dimensions must be positive"));
        }

        if n_rows_in_tile > n_rows_in_raster || n_cols_in_tile > n_cols_in_raster {
            return Err(Error::invalid("tile dimensions must not exceed raster dimensions"));
        }

        if elements.is_empty() {
            return Err(Error::invalid("a file specification needs at least one element"));
        }

        let n_rows_of_tiles = compute_tile_count(n_rows_in_raster, n_rows_in_tile) as u64;
        let n_cols_of_tiles = compute_tile_count(n_cols_in_raster, n_cols_in_tile) as u64;
        if n_rows_of_tiles * n_cols_of_tiles > MAX_TILE_COUNT {
            return Err(Error::invalid("raster requires more tiles than the format can index"));
        }

        Ok(Self {
            identification: String::new(),
            n_rows_in_raster,
            n_cols_in_raster,
            n_rows_in_tile,
            n_cols_in_tile,
            elements,
            extended_size: false,
            geometry: GeometryType::Unspecified,
            coordinate_system: CoordinateSystem::None,
            x0: 0.0,
            y0: 0.0,
            x1: n_cols_in_raster as f64,
            y1: n_rows_in_raster as f64,
            codec_ids: Vec::new(),
            checksums_enabled: false,
            data_compression_enabled: true,
            uuid,
        })
    }

    pub fn with_identification(mut self, identification: impl Into<String>) -> Result<Self> {
        let identification = identification.into();
        if identification.len() > IDENTIFICATION_WIDTH {
            return Err(Error::invalid("identification exceeds 64 bytes"));
        }
        self.identification = identification;
        Ok(self)
    }

    /// Sets Cartesian bounds. The source this design is modeled on has a
    /// `setCartesianCoordinates` with an apparent self-assignment bug
    /// (`x0 = x0`); here the evident intent — actually storing the given
    /// bounds — is what happens.
    pub fn set_cartesian_coordinates(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.coordinate_system = CoordinateSystem::Cartesian;
        self.x0 = x0;
        self.y0 = y0;
        self.x1 = x1;
        self.y1 = y1;
    }

    pub fn set_geographic_coordinates(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.coordinate_system = CoordinateSystem::Geographic;
        self.x0 = x0;
        self.y0 = y0;
        self.x1 = x1;
        self.y1 = y1;
    }

    pub fn n_rows_of_tiles(&self) -> u32 {
        compute_tile_count(self.n_rows_in_raster, self.n_rows_in_tile)
    }

    pub fn n_cols_of_tiles(&self) -> u32 {
        compute_tile_count(self.n_cols_in_raster, self.n_cols_in_tile)
    }

    pub fn cells_in_tile(&self) -> u64 {
        self.n_rows_in_tile as u64 * self.n_cols_in_tile as u64
    }

    /// Size in bytes of one tile's record if stored uncompressed: every
    /// element plane at its natural storage width.
    pub fn standard_tile_size_in_bytes(&self) -> u64 {
        let cells = self.cells_in_tile();
        self.elements.iter().map(|element| cells * element.storage_byte_size() as u64).sum()
    }

    pub fn coordinate_transform(&self) -> Option<CoordinateTransform> {
        if self.coordinate_system == CoordinateSystem::None {
            return None;
        }

        Some(CoordinateTransform {
            x0: self.x0, y0: self.y0, x1: self.x1, y1: self.y1,
            n_rows: self.n_rows_in_raster, n_cols: self.n_cols_in_raster,
            geographic: self.coordinate_system == CoordinateSystem::Geographic,
        })
    }

    pub fn grid_to_model(&self, point: GridPoint) -> Option<ModelPoint> {
        self.coordinate_transform().map(|transform| transform.grid_to_model(point))
    }

    pub fn model_to_grid(&self, point: ModelPoint) -> Option<GridPoint> {
        self.coordinate_transform().map(|transform| transform.model_to_grid(point))
    }

    /// Registers a codec id to be persisted in the header. The actual
    /// `Codec` implementation lives in the `CodecRegistry` the caller builds
    /// separately; this only tracks the ids so a reader can validate the
    /// registry it constructs against the one the writer used.
    pub fn add_compression_codec(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if id.is_empty() || id.len() > CODEC_ID_WIDTH || !id.is_ascii() {
            return Err(Error::invalid(format!("codec id {:?} must be 1..={} ASCII characters", id, CODEC_ID_WIDTH)));
        }
        if self.codec_ids.len() >= MAX_CODECS {
            return Err(Error::invalid("codec registry is full (255 codec limit)"));
        }
        if self.codec_ids.iter().any(|existing| existing == &id) {
            return Err(Error::invalid(format!("duplicate codec id {:?}", id)));
        }

        self.codec_ids.push(id);
        Ok(())
    }

    pub fn uuid(&self) -> [u8; 16] {
        self.uuid
    }

    pub fn write(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&MAGIC);
        buffer.push(FORMAT_MAJOR);
        buffer.push(FORMAT_MINOR);
        buffer.push(FORMAT_SUB);
        buffer.push(0); // spare

        buffer.extend_from_slice(&self.uuid);
        write_fixed_ascii(buffer, &self.identification, IDENTIFICATION_WIDTH)?;

        (self.n_rows_in_raster as i32).write(buffer)?;
        (self.n_cols_in_raster as i32).write(buffer)?;
        (self.n_rows_in_tile as i32).write(buffer)?;
        (self.n_cols_in_tile as i32).write(buffer)?;

        (self.elements.len() as u32).write(buffer)?;
        for element in &self.elements {
            write_element(buffer, element)?;
        }

        buffer.push(if self.extended_size { 1 } else { 0 });
        buffer.push(self.geometry.code());
        buffer.push(self.coordinate_system.code());

        self.x0.to_bits().write(buffer)?;
        self.y0.to_bits().write(buffer)?;
        self.x1.to_bits().write(buffer)?;
        self.y1.to_bits().write(buffer)?;

        (self.codec_ids.len() as u32).write(buffer)?;
        for id in &self.codec_ids {
            write_fixed_ascii(buffer, id, CODEC_ID_WIDTH)?;
        }

        buffer.push(if self.checksums_enabled { 1 } else { 0 });
        buffer.push(if self.data_compression_enabled { 1 } else { 0 });

        Ok(())
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        Ok(Self::read_with_consumed(bytes)?.0)
    }

    /// Like `read`, but also reports how many leading bytes of `bytes` the
    /// header actually occupied — the tile-record stream starts there. Lets
    /// the file facade hand in a generously sized read buffer without
    /// knowing the header length up front.
    pub fn read_with_consumed(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = bytes;

        let mut magic = [0_u8; 4];
        magic.copy_from_slice(read_exact_slice(&mut cursor, 4)?);
        if magic != MAGIC {
            return Err(Error::invalid("not a gvrs file (bad magic)"));
        }

        let format = read_exact_slice(&mut cursor, 4)?;
        if format[0] != FORMAT_MAJOR {
            return Err(Error::unsupported(format!("unsupported format major version {}", format[0])));
        }

        let mut uuid = [0_u8; 16];
        uuid.copy_from_slice(read_exact_slice(&mut cursor, 16)?);

        let identification = read_fixed_ascii(&mut cursor, IDENTIFICATION_WIDTH)?;

        let n_rows_in_raster = crate::io::positive_i32(i32::read(&mut cursor)?, "nRowsInRaster")?;
        let n_cols_in_raster = crate::io::positive_i32(i32::read(&mut cursor)?, "nColsInRaster")?;
        let n_rows_in_tile = crate::io::positive_i32(i32::read(&mut cursor)?, "nRowsInTile")?;
        let n_cols_in_tile = crate::io::positive_i32(i32::read(&mut cursor)?, "nColsInTile")?;

        let element_count = u32::read(&mut cursor)?;
        if element_count == 0 {
            return Err(Error::invalid("a gvrs file needs at least one element"));
        }

        let mut elements = Vec::with_capacity(element_count as usize);
        for _ in 0..element_count {
            elements.push(read_element(&mut cursor)?);
        }

        let extended_size = u8::read(&mut cursor)? != 0;
        let geometry = GeometryType::from_code(u8::read(&mut cursor)?)?;
        let coordinate_system = CoordinateSystem::from_code(u8::read(&mut cursor)?)?;

        let x0 = f64::from_bits(u64::read(&mut cursor)?);
        let y0 = f64::from_bits(u64::read(&mut cursor)?);
        let x1 = f64::from_bits(u64::read(&mut cursor)?);
        let y1 = f64::from_bits(u64::read(&mut cursor)?);

        let codec_count = u32::read(&mut cursor)?;
        if codec_count as usize > MAX_CODECS {
            return Err(Error::corrupt("persisted codec count exceeds the 255-codec limit"));
        }

        let mut codec_ids = Vec::with_capacity(codec_count as usize);
        for _ in 0..codec_count {
            codec_ids.push(read_fixed_ascii(&mut cursor, CODEC_ID_WIDTH)?);
        }

        let checksums_enabled = u8::read(&mut cursor)? != 0;
        let data_compression_enabled = u8::read(&mut cursor)? != 0;

        let consumed = bytes.len() - cursor.len();
        Ok((Self {
            identification, n_rows_in_raster, n_cols_in_raster, n_rows_in_tile, n_cols_in_tile,
            elements, extended_size, geometry, coordinate_system, x0, y0, x1, y1, codec_ids,
            checksums_enabled, data_compression_enabled, uuid,
        }, consumed))
    }
}

fn read_exact_slice<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(Error::invalid("file specification header truncated"));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

fn write_element(buffer: &mut Vec<u8>, element: &ElementSpec) -> Result<()> {
    buffer.push(element.data_type.code());
    buffer.extend_from_slice(&[0_u8; 3]);
    element.scale.write(buffer)?;
    element.offset.write(buffer)?;
    element.fill_value_bits.write(buffer)?;

    write_prefixed_string(buffer, &element.name, MAX_ELEMENT_STRING_LEN)?;
    write_prefixed_string(buffer, element.description.as_deref().unwrap_or(""), MAX_ELEMENT_STRING_LEN)?;
    write_prefixed_string(buffer, element.unit.as_deref().unwrap_or(""), MAX_ELEMENT_STRING_LEN)?;
    write_prefixed_string(buffer, element.label.as_deref().unwrap_or(""), MAX_ELEMENT_STRING_LEN)?;
    Ok(())
}

fn read_element(cursor: &mut &[u8]) -> Result<ElementSpec> {
    let data_type = crate::element::ElementType::from_code(u8::read(cursor)?)?;
    let _spare = read_exact_slice(cursor, 3)?;
    let scale = f32::read(cursor)?;
    let offset = f32::read(cursor)?;
    let fill_value_bits = i32::read(cursor)?;

    let name = read_prefixed_string(cursor, MAX_ELEMENT_STRING_LEN)?;
    let description = read_prefixed_string(cursor, MAX_ELEMENT_STRING_LEN)?;
    let unit = read_prefixed_string(cursor, MAX_ELEMENT_STRING_LEN)?;
    let label = read_prefixed_string(cursor, MAX_ELEMENT_STRING_LEN)?;

    let mut element = match data_type {
        crate::element::ElementType::Int32 => ElementSpec::int32(name, fill_value_bits)?,
        crate::element::ElementType::Int16 => ElementSpec::int16(name, fill_value_bits as i16)?,
        crate::element::ElementType::Float32 => ElementSpec::float32(name)?,
        crate::element::ElementType::IntCodedFloat32 => ElementSpec::int_coded_float32(name, scale, offset, fill_value_bits)?,
    };

    if !description.is_empty() {
        element = element.with_description(description)?;
    }
    if !unit.is_empty() {
        element = element.with_unit(unit)?;
    }
    if !label.is_empty() {
        element = element.with_label(label)?;
    }

    Ok(element)
}


#[cfg(test)]
mod test {
    use super::*;

    fn elements() -> Vec<ElementSpec> {
        vec![
            ElementSpec::int32("elevation", i32::MIN).unwrap().with_unit("m").unwrap(),
            ElementSpec::int_coded_float32("temperature", 100.0, 0.0, i32::MIN).unwrap(),
        ]
    }

    #[test]
    fn header_round_trips() {
        let mut spec = FileSpecification::new(1000, 2000, 32, 32, elements(), [7_u8; 16]).unwrap().with_identification("test raster").unwrap();
        spec.set_geographic_coordinates(-180.0, -90.0, 180.0, 90.0);
        spec.add_compression_codec("gvrs-int-huffman").unwrap();

        let mut buffer = Vec::new();
        spec.write(&mut buffer).unwrap();
        let decoded = FileSpecification::read(&buffer).unwrap();

        assert_eq!(decoded, spec);
    }

    #[test]
    fn rejects_tile_larger_than_raster() {
        assert!(FileSpecification::new(10, 10, 20, 10, elements(), [0; 16]).is_err());
    }

    #[test]
    fn tile_geometry_is_computed_correctly() {
        let spec = FileSpecification::new(100, 250, 32, 32, elements(), [0; 16]).unwrap();
        assert_eq!(spec.n_rows_of_tiles(), 4);
        assert_eq!(spec.n_cols_of_tiles(), 8);
        assert_eq!(spec.cells_in_tile(), 1024);
    }

    #[test]
    fn rejects_duplicate_codec_ids() {
        let mut spec = FileSpecification::new(10, 10, 5, 5, elements(), [0; 16]).unwrap();
        spec.add_compression_codec("gvrs-float").unwrap();
        assert!(spec.add_compression_codec("gvrs-float").is_err());
    }
}
