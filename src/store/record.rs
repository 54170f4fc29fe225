//! On-disk record headers (§4.10, §6): the 12-byte header shared by every
//! record, and the variable-length-record (VLR) header nested inside
//! non-tile records.

use crate::error::{Error, Result};
use crate::io::{write_fixed_ascii, read_fixed_ascii};

/// Every record is padded to a multiple of this many bytes.
pub const RECORD_ALIGNMENT: u64 = 8;

/// Size of the header shared by every record: `size`, `tileIndex`, `flags`.
pub const RECORD_HEADER_SIZE: u64 = 12;

/// Extra spare bytes after the common header in non-tile records, before
/// the payload (or, for VLRs, before the VLR-specific header).
pub const NON_TILE_SPARE_SIZE: u64 = 8;

/// Reserved `tileIndex` value marking a variable-length record.
pub const VLR_TYPE_CODE: i32 = -1;

/// Size of the VLR-specific header embedded in a VLR record's payload.
pub const VLR_HEADER_SIZE: u64 = 16 + 4 + 4 + 1 + 7 + 32;

const VLR_USER_ID_WIDTH: usize = 16;
const VLR_DESCRIPTION_WIDTH: usize = 32;

/// Rounds `size` up to the next multiple of `RECORD_ALIGNMENT`.
pub fn padded(size: u64) -> u64 {
    (size + RECORD_ALIGNMENT - 1) / RECORD_ALIGNMENT * RECORD_ALIGNMENT
}

/// The 12-byte header common to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub size: i32,
    pub tile_index: i32,
    pub flags: u32,
}

impl RecordHeader {
    pub const COMPRESSED_FLAG: u32 = 1;

    pub fn tile(size: i32, tile_index: i32, compressed: bool) -> Result<Self> {
        if tile_index < 0 {
            return Err(Error::invalid("tile record index must be non-negative"));
        }
        Ok(Self { size, tile_index, flags: if compressed { Self::COMPRESSED_FLAG } else { 0 } })
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & Self::COMPRESSED_FLAG != 0
    }

    pub fn to_bytes(self) -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut bytes = [0_u8; RECORD_HEADER_SIZE as usize];
        bytes[0..4].copy_from_slice(&self.size.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.tile_index.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_SIZE as usize {
            return Err(Error::invalid("record header truncated"));
        }

        Ok(Self {
            size: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            tile_index: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            flags: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// The header nested inside a VLR's payload: user id, record id, payload
/// size, a text/binary flag, and a short description.
#[derive(Debug, Clone, PartialEq)]
pub struct VlrHeader {
    pub user_id: String,
    pub record_id: u32,
    pub payload_size: u32,
    pub is_text: bool,
    pub description: String,
}

impl VlrHeader {
    pub fn write(&self, buffer: &mut Vec<u8>) -> Result<()> {
        write_fixed_ascii(buffer, &self.user_id, VLR_USER_ID_WIDTH)?;
        buffer.extend_from_slice(&self.record_id.to_le_bytes());
        buffer.extend_from_slice(&self.payload_size.to_le_bytes());
        buffer.push(if self.is_text { 1 } else { 0 });
        buffer.extend_from_slice(&[0_u8; 7]);
        write_fixed_ascii(buffer, &self.description, VLR_DESCRIPTION_WIDTH)?;
        Ok(())
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if (bytes.len() as u64) < VLR_HEADER_SIZE {
            return Err(Error::invalid("vlr header truncated"));
        }

        let mut cursor = bytes;
        let user_id = read_fixed_ascii(&mut cursor, VLR_USER_ID_WIDTH)?;
        let record_id = u32::from_le_bytes([cursor[0], cursor[1], cursor[2], cursor[3]]);
        let payload_size = u32::from_le_bytes([cursor[4], cursor[5], cursor[6], cursor[7]]);
        let is_text = cursor[8] != 0;
        let mut cursor = &cursor[16..]; // record_id(4) + payload_size(4) + flag(1) + reserved(7)
        let description = read_fixed_ascii(&mut cursor, VLR_DESCRIPTION_WIDTH)?;

        Ok(Self { user_id, record_id, payload_size, is_text, description })
    }
}
