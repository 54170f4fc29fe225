

pub use ::std::io::{Read, Write};
use lebe::prelude::*;
use crate::error::{Error, Result, PassiveResult};


pub fn skip_bytes(read: &mut impl Read, count: u64) -> PassiveResult {
    let skipped = std::io::copy(
        &mut read.by_ref().take(count),
        &mut std::io::sink()
    )?;

    debug_assert_eq!(skipped, count);
    Ok(())
}

#[inline]
pub fn positive_i32(value: i32, name: &'static str) -> Result<u32> {
    if value < 0 { Err(Error::invalid(name)) }
    else { Ok(value as u32) }
}

/// Extension trait for the primitive types making up record headers,
/// file-specification fields, and VLR payloads. All on-disk integers are
/// little-endian (§6); this is the single place that fact is encoded.
pub trait Data: Sized + Default + Clone {
    #[inline]
    fn read(read: &mut impl Read) -> Result<Self>;

    #[inline]
    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> PassiveResult;

    #[inline]
    fn read_vec(read: &mut impl Read, data_size: usize) -> Result<Vec<Self>> {
        let mut vec = vec![Self::default(); data_size];
        Self::read_slice(read, &mut vec)?;
        Ok(vec)
    }

    #[inline]
    fn write(self, write: &mut impl Write) -> PassiveResult;

    #[inline]
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> PassiveResult;

    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_little_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(i16);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(i32);
implement_data_for_primitive!(i64);
implement_data_for_primitive!(u64);
implement_data_for_primitive!(f32);


/// Read a zero-padded, length-prefixed UTF-8 string: a `u16` byte length,
/// then that many bytes of UTF-8, validated. Used for element names,
/// descriptions, units and labels in the file specification (§4.12).
pub fn read_prefixed_string(read: &mut impl Read, max_len: usize) -> Result<String> {
    let len = u16::read(read)? as usize;
    if len > max_len {
        return Err(Error::invalid(format!("string length {} exceeds maximum {}", len, max_len)));
    }

    let bytes = u8::read_vec(read, len)?;
    String::from_utf8(bytes).map_err(|_| Error::invalid("string is not valid utf-8"))
}

/// Write a length-prefixed UTF-8 string, the counterpart of `read_prefixed_string`.
pub fn write_prefixed_string(write: &mut impl Write, text: &str, max_len: usize) -> PassiveResult {
    let bytes = text.as_bytes();
    if bytes.len() > max_len {
        return Err(Error::invalid(format!("string length {} exceeds maximum {}", bytes.len(), max_len)));
    }

    (bytes.len() as u16).write(write)?;
    write.write_all(bytes)?;
    Ok(())
}

/// Write a fixed-width, zero-padded ASCII field (used for the codec id
/// table and VLR user-id, both of which are fixed-size ASCII in the file
/// layout rather than length-prefixed).
pub fn write_fixed_ascii(write: &mut impl Write, text: &str, width: usize) -> PassiveResult {
    if !text.is_ascii() || text.len() > width {
        return Err(Error::invalid(format!("'{}' is not ascii or exceeds {} bytes", text, width)));
    }

    let mut buffer = vec![0_u8; width];
    buffer[.. text.len()].copy_from_slice(text.as_bytes());
    write.write_all(&buffer)?;
    Ok(())
}

/// Read a fixed-width, zero-padded ASCII field written by `write_fixed_ascii`.
pub fn read_fixed_ascii(read: &mut impl Read, width: usize) -> Result<String> {
    let bytes = u8::read_vec(read, width)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[.. end].to_vec()).map_err(|_| Error::invalid("fixed ascii field is not valid utf-8"))
}
