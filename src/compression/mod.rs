//! Codec registry: indexes pluggable tile codecs, picks the smallest
//! packing on encode, and dispatches on decode by the packing's first byte
//! (§4.8).

pub mod integer_huffman;
pub mod integer_deflate;
pub mod float_codec;

use crate::error::{Error, Result};

/// A byte vector, matching the rest of the crate's naming for codec output.
pub type ByteVec = Vec<u8>;

const MAX_CODEC_ID_LEN: usize = 16;
const MAX_CODECS: usize = 255;

/// Diagnostics produced by a codec's analysis path (§4.8, supplemented
/// "analysis mode"): per-tile statistics for entropy/overhead reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecAnalysis {
    pub compressed_bytes: usize,
    pub m32_bytes: Option<usize>,
    pub tree_overhead_bits: Option<usize>,
}

/// A single compressor/decompressor pair installed in a `CodecRegistry`.
/// Implementations see only the *body* of a packing — the registry owns and
/// strips the leading codec-index byte.
pub trait Codec {
    /// Stable identifier, persisted into the file header (§4.12); at most
    /// 16 ASCII characters.
    fn name(&self) -> &'static str;

    fn supports_integer(&self) -> bool {
        false
    }

    fn supports_float(&self) -> bool {
        false
    }

    /// Encodes a tile's values. `Ok(None)` means "not encodable with this
    /// codec" (e.g. an all-null tile, or predictor overflow for every
    /// candidate variant); the caller tries the next codec or uncompressed
    /// storage.
    fn encode_integer(&self, _n_rows: usize, _n_cols: usize, _values: &[Option<i32>]) -> Result<Option<ByteVec>> {
        Ok(None)
    }

    fn decode_integer(&self, _n_rows: usize, _n_cols: usize, _body: &[u8]) -> Result<Vec<Option<i32>>> {
        Err(Error::unsupported("this codec does not support integer decoding"))
    }

    fn encode_float(&self, _n_rows: usize, _n_cols: usize, _values: &[f32]) -> Result<Option<ByteVec>> {
        Ok(None)
    }

    fn decode_float(&self, _n_rows: usize, _n_cols: usize, _body: &[u8]) -> Result<Vec<f32>> {
        Err(Error::unsupported("this codec does not support float decoding"))
    }

    /// Optional statistics-collection path (§4.8 analysis mode).
    fn analyze(&self, body: &[u8]) -> Result<CodecAnalysis> {
        Ok(CodecAnalysis { compressed_bytes: body.len(), ..Default::default() })
    }
}

/// Ordered set of installed codecs. A codec's position in the registry is
/// its on-disk index, written as the first byte of every packing it
/// produces.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry").field("codecs", &self.codec_names()).finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_default_codecs()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// The registry installed by `FileSpecification::new`: integer Huffman,
    /// integer Deflate, and the lossless float codec, in that index order.
    pub fn with_default_codecs() -> Self {
        let mut registry = Self::new();
        registry.add_codec(Box::new(integer_huffman::IntegerHuffmanCodec)).expect("default codecs are well-formed");
        registry.add_codec(Box::new(integer_deflate::IntegerDeflateCodec)).expect("default codecs are well-formed");
        registry.add_codec(Box::new(float_codec::FloatCodec)).expect("default codecs are well-formed");
        registry
    }

    /// Installs a codec, assigning it the next free index. Rejects
    /// duplicate or ill-formed ids and enforces the 255-codec limit
    /// (§4.12).
    pub fn add_codec(&mut self, codec: Box<dyn Codec>) -> Result<u8> {
        if self.codecs.len() >= MAX_CODECS {
            return Err(Error::invalid("codec registry is full (255 codec limit)"));
        }

        let name = codec.name();
        if name.is_empty() || name.len() > MAX_CODEC_ID_LEN || !name.is_ascii() {
            return Err(Error::invalid(format!("codec id {:?} must be 1..={} ASCII characters", name, MAX_CODEC_ID_LEN)));
        }

        if self.codecs.iter().any(|existing| existing.name() == name) {
            return Err(Error::invalid(format!("duplicate codec id {:?}", name)));
        }

        let index = self.codecs.len() as u8;
        self.codecs.push(codec);
        Ok(index)
    }

    pub fn codec_names(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|codec| codec.name()).collect()
    }

    pub fn supports_float(&self) -> bool {
        self.codecs.iter().any(|codec| codec.supports_float())
    }

    /// Tries every integer-capable codec and keeps the shortest packing.
    /// Returns `None` if no codec could encode the tile (the caller falls
    /// back to uncompressed storage).
    pub fn encode_integer(&self, n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Option<ByteVec> {
        let mut best: Option<ByteVec> = None;

        for (index, codec) in self.codecs.iter().enumerate() {
            if !codec.supports_integer() {
                continue;
            }

            let Ok(Some(body)) = codec.encode_integer(n_rows, n_cols, values) else { continue };

            let mut packing = Vec::with_capacity(body.len() + 1);
            packing.push(index as u8);
            packing.extend_from_slice(&body);

            if best.as_ref().map_or(true, |current| packing.len() < current.len()) {
                best = Some(packing);
            }
        }

        best
    }

    /// Dispatches on `packing[0]` to decode a tile's values.
    pub fn decode_integer(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> Result<Vec<Option<i32>>> {
        let (codec, body) = self.dispatch(packing)?;
        codec.decode_integer(n_rows, n_cols, body)
    }

    /// Tries every float-capable codec and keeps the shortest packing.
    pub fn encode_float(&self, n_rows: usize, n_cols: usize, values: &[f32]) -> Option<ByteVec> {
        let mut best: Option<ByteVec> = None;

        for (index, codec) in self.codecs.iter().enumerate() {
            if !codec.supports_float() {
                continue;
            }

            let Ok(Some(body)) = codec.encode_float(n_rows, n_cols, values) else { continue };

            let mut packing = Vec::with_capacity(body.len() + 1);
            packing.push(index as u8);
            packing.extend_from_slice(&body);

            if best.as_ref().map_or(true, |current| packing.len() < current.len()) {
                best = Some(packing);
            }
        }

        best
    }

    pub fn decode_float(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> Result<Vec<f32>> {
        let (codec, body) = self.dispatch(packing)?;
        codec.decode_float(n_rows, n_cols, body)
    }

    /// Analysis mode (§4.8): dispatches by `packing[0]` like decode, but
    /// returns statistics instead of values.
    pub fn analyze_tile(&self, packing: &[u8]) -> Result<CodecAnalysis> {
        let (codec, body) = self.dispatch(packing)?;
        codec.analyze(body)
    }

    fn dispatch<'a>(&self, packing: &'a [u8]) -> Result<(&dyn Codec, &'a [u8])> {
        let &index = packing.first().ok_or_else(|| Error::invalid("empty codec packing"))?;
        let codec = self.codecs.get(index as usize).ok_or_else(|| Error::invalid(format!("unknown codec index {}", index)))?;
        Ok((codec.as_ref(), &packing[1..]))
    }
}

/// Middle compression level shared by the Deflate-entropy integer codec and
/// the float codec's plane compression (§4.6, §4.7).
const DEFLATE_LEVEL: u8 = 6;

pub(crate) fn deflate_compress(data: &[u8]) -> ByteVec {
    miniz_oxide::deflate::compress_to_vec_zlib(data, DEFLATE_LEVEL)
}

pub(crate) fn deflate_decompress(data: &[u8], expected_len: usize) -> Result<ByteVec> {
    let options = zune_inflate::DeflateOptions::default().set_size_hint(expected_len);
    let mut decoder = zune_inflate::DeflateDecoder::new_with_options(data, options);
    decoder.decode_zlib().map_err(|_| Error::corrupt("zlib-compressed tile data is malformed"))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_oversized_and_duplicate_ids() {
        struct Named(&'static str);
        impl Codec for Named {
            fn name(&self) -> &'static str { self.0 }
        }

        let mut registry = CodecRegistry::new();
        registry.add_codec(Box::new(Named("abc"))).unwrap();
        assert!(registry.add_codec(Box::new(Named("abc"))).is_err());
        assert!(registry.add_codec(Box::new(Named("this-id-is-way-too-long-for-the-registry"))).is_err());
    }

    #[test]
    fn default_registry_round_trips_an_all_constant_tile() {
        let registry = CodecRegistry::with_default_codecs();
        let values: Vec<Option<i32>> = (0..16).map(|i| Some(i * 3 - 5)).collect();

        let packing = registry.encode_integer(4, 4, &values).expect("should be encodable");
        let decoded = registry.decode_integer(4, 4, &packing).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn all_null_tile_is_not_encodable() {
        let registry = CodecRegistry::with_default_codecs();
        let values = vec![None; 16];
        assert!(registry.encode_integer(4, 4, &values).is_none());
    }
}
