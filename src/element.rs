//! Element declarations: the per-element data type, fill value, and scaling
//! that together describe one plane of a tile (§3).

use crate::error::{Error, Result};

/// The storage type of one element plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Int32,
    Float32,
    IntCodedFloat32,
    Int16,
}

impl ElementType {
    pub fn code(self) -> u8 {
        match self {
            ElementType::Int32 => 0,
            ElementType::Float32 => 1,
            ElementType::IntCodedFloat32 => 2,
            ElementType::Int16 => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ElementType::Int32),
            1 => Ok(ElementType::Float32),
            2 => Ok(ElementType::IntCodedFloat32),
            3 => Ok(ElementType::Int16),
            other => Err(Error::invalid(format!("unknown element type code {}", other))),
        }
    }

    /// Natural on-disk width of one cell, in bytes.
    pub fn storage_byte_size(self) -> usize {
        match self {
            ElementType::Int16 => 2,
            _ => 4,
        }
    }

    /// Whether the element's natural API is float-valued (`Float32`,
    /// `IntCodedFloat32`) or int-valued (`Int32`, `Int16`).
    pub fn is_float_valued(self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::IntCodedFloat32)
    }
}

const MAX_NAME_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 256;
const MAX_UNIT_LEN: usize = 16;

/// One element's full declaration: name, storage type, scale/offset,
/// fill value, permitted range, and optional documentation fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    pub name: String,
    pub data_type: ElementType,
    pub scale: f32,
    pub offset: f32,
    pub fill_value_bits: i32,
    pub min_value: i32,
    pub max_value: i32,
    pub label: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
}

impl ElementSpec {
    fn base(name: impl Into<String>, data_type: ElementType, fill_value_bits: i32) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name, MAX_NAME_LEN, "element name")?;

        Ok(Self {
            name,
            data_type,
            scale: 1.0,
            offset: 0.0,
            fill_value_bits,
            min_value: i32::MIN,
            max_value: i32::MAX,
            label: None,
            description: None,
            unit: None,
        })
    }

    pub fn int32(name: impl Into<String>, fill_value: i32) -> Result<Self> {
        Self::base(name, ElementType::Int32, fill_value)
    }

    pub fn int16(name: impl Into<String>, fill_value: i16) -> Result<Self> {
        Self::base(name, ElementType::Int16, fill_value as i32)
    }

    pub fn float32(name: impl Into<String>) -> Result<Self> {
        Self::base(name, ElementType::Float32, f32::NAN.to_bits() as i32)
    }

    /// `scale`/`offset` define `encoded = round((value - offset) * scale)`.
    /// `nan_sentinel` is the encoded integer that marks NaN.
    pub fn int_coded_float32(name: impl Into<String>, scale: f32, offset: f32, nan_sentinel: i32) -> Result<Self> {
        if scale <= 0.0 || !scale.is_finite() {
            return Err(Error::invalid("IntCodedFloat32 scale must be a positive finite number"));
        }

        let mut spec = Self::base(name, ElementType::IntCodedFloat32, nan_sentinel)?;
        spec.scale = scale;
        spec.offset = offset;
        Ok(spec)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        validate_identifier(&label, MAX_LABEL_LEN, "element label")?;
        self.label = Some(label);
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Result<Self> {
        let description = description.into();
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(Error::invalid("element description exceeds maximum length"));
        }
        self.description = Some(description);
        Ok(self)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Result<Self> {
        let unit = unit.into();
        if unit.len() > MAX_UNIT_LEN {
            return Err(Error::invalid("element unit exceeds maximum length"));
        }
        self.unit = Some(unit);
        Ok(self)
    }

    pub fn with_range(mut self, min_value: i32, max_value: i32) -> Result<Self> {
        if min_value > max_value {
            return Err(Error::invalid("element min_value exceeds max_value"));
        }
        self.min_value = min_value;
        self.max_value = max_value;
        Ok(self)
    }

    pub fn storage_byte_size(&self) -> usize {
        self.data_type.storage_byte_size()
    }

    /// The fill value as seen through the integer API, for any element type.
    pub fn fill_value_int(&self) -> i32 {
        self.fill_value_bits
    }

    /// The fill value as seen through the float API. For `Float32` this is
    /// `fill_value_bits` reinterpreted as an `f32` (commonly NaN); for
    /// `IntCodedFloat32` this is always NaN, since the NaN sentinel is an
    /// encoded integer rather than a stored float bit pattern.
    pub fn fill_value_float(&self) -> f32 {
        match self.data_type {
            ElementType::Float32 => f32::from_bits(self.fill_value_bits as u32),
            _ => f32::NAN,
        }
    }

    /// Encodes a logical float value into its stored `IntCodedFloat32`
    /// integer representation. NaN maps to the element's sentinel.
    pub fn encode_float(&self, value: f32) -> Result<i32> {
        if self.data_type != ElementType::IntCodedFloat32 {
            return Err(Error::invalid("encode_float only applies to IntCodedFloat32 elements"));
        }

        self.encode_to_int(value)
    }

    /// Inverse of `encode_float`.
    pub fn decode_float(&self, encoded: i32) -> Result<f32> {
        if self.data_type != ElementType::IntCodedFloat32 {
            return Err(Error::invalid("decode_float only applies to IntCodedFloat32 elements"));
        }

        self.decode_from_int(encoded)
    }

    /// General float-to-int conversion for any float-valued element type
    /// (`Float32` or `IntCodedFloat32`), used by `Tile::get_int_coding` when
    /// a plane has to travel through an integer codec. NaN maps to the
    /// element's fill sentinel.
    pub fn encode_to_int(&self, value: f32) -> Result<i32> {
        if !self.data_type.is_float_valued() {
            return Err(Error::invalid("encode_to_int only applies to float-valued elements"));
        }

        if value.is_nan() {
            return Ok(self.fill_value_bits);
        }

        let scaled = ((value - self.offset) as f64 * self.scale as f64).round();
        if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
            return Err(Error::NotEncodable);
        }

        Ok(scaled as i32)
    }

    /// Inverse of `encode_to_int`.
    pub fn decode_from_int(&self, encoded: i32) -> Result<f32> {
        if !self.data_type.is_float_valued() {
            return Err(Error::invalid("decode_from_int only applies to float-valued elements"));
        }

        if encoded == self.fill_value_bits {
            return Ok(f32::NAN);
        }

        Ok(self.offset + (encoded as f64 / self.scale as f64) as f32)
    }
}

fn validate_identifier(value: &str, max_len: usize, field: &str) -> Result<()> {
    if value.is_empty() || value.len() > max_len {
        return Err(Error::invalid(format!("{} must be 1..={} bytes, got {}", field, max_len, value.len())));
    }

    if !value.is_ascii() || value.chars().any(|c| c.is_ascii_control()) {
        return Err(Error::invalid(format!("{} must be printable ASCII", field)));
    }

    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_coded_float_round_trips_within_scale_tolerance() {
        let spec = ElementSpec::int_coded_float32("elevation", 100.0, 0.0, i32::MIN).unwrap();

        for &value in &[0.0_f32, 1.005, -273.15, 8848.86] {
            let encoded = spec.encode_float(value).unwrap();
            let decoded = spec.decode_float(encoded).unwrap();
            assert!((decoded - value).abs() <= 1.0 / spec.scale, "{} vs {}", decoded, value);
        }
    }

    #[test]
    fn int_coded_float_nan_round_trips() {
        let spec = ElementSpec::int_coded_float32("elevation", 100.0, 0.0, i32::MIN).unwrap();
        let encoded = spec.encode_float(f32::NAN).unwrap();
        assert_eq!(encoded, i32::MIN);
        assert!(spec.decode_float(encoded).unwrap().is_nan());
    }

    #[test]
    fn float32_fill_defaults_to_nan() {
        let spec = ElementSpec::float32("temperature").unwrap();
        assert!(spec.fill_value_float().is_nan());
    }

    #[test]
    fn rejects_empty_and_non_ascii_names() {
        assert!(ElementSpec::int32("", -1).is_err());
        assert!(ElementSpec::int32("élévation", -1).is_err());
    }

    #[test]
    fn rejects_non_positive_scale() {
        assert!(ElementSpec::int_coded_float32("x", 0.0, 0.0, 0).is_err());
        assert!(ElementSpec::int_coded_float32("x", -1.0, 0.0, 0).is_err());
    }

    #[test]
    fn storage_sizes_match_type() {
        assert_eq!(ElementSpec::int32("a", 0).unwrap().storage_byte_size(), 4);
        assert_eq!(ElementSpec::int16("a", 0).unwrap().storage_byte_size(), 2);
        assert_eq!(ElementSpec::float32("a").unwrap().storage_byte_size(), 4);
    }
}
