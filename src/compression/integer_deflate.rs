//! Integer codec, Deflate entropy stage (§4.6): identical structure to the
//! Huffman codec, but the M32 residual stream is compressed with generic
//! Deflate instead of a per-tile Huffman tree.

use crate::error::Result;
use crate::predictors::{self, PredictorType};
use super::{Codec, ByteVec, CodecAnalysis, deflate_compress, deflate_decompress};

pub struct IntegerDeflateCodec;

impl Codec for IntegerDeflateCodec {
    fn name(&self) -> &'static str {
        "gvrs-int-deflate"
    }

    fn supports_integer(&self) -> bool {
        true
    }

    fn encode_integer(&self, n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<Option<ByteVec>> {
        if values.iter().all(|v| v.is_none()) {
            return Ok(None);
        }

        let has_nulls = values.iter().any(|v| v.is_none());
        let mut best: Option<ByteVec> = None;

        for predictor in PredictorType::all() {
            if !predictor.applicable(has_nulls) {
                continue;
            }

            let Ok((seed, m32_bytes)) = predictors::encode(predictor, n_rows, n_cols, values) else { continue };
            if m32_bytes.is_empty() {
                continue;
            }

            let compressed = deflate_compress(&m32_bytes);

            let mut packing = Vec::with_capacity(9 + compressed.len());
            packing.push(predictor.code());
            packing.extend_from_slice(&seed.to_le_bytes());
            packing.extend_from_slice(&(m32_bytes.len() as u32).to_le_bytes());
            packing.extend_from_slice(&compressed);

            if best.as_ref().map_or(true, |current| packing.len() < current.len()) {
                best = Some(packing);
            }
        }

        Ok(best)
    }

    fn decode_integer(&self, n_rows: usize, n_cols: usize, body: &[u8]) -> Result<Vec<Option<i32>>> {
        let (predictor, seed, n_m32, compressed) = parse_header(body)?;
        let m32_bytes = deflate_decompress(compressed, n_m32)?;
        predictors::decode(predictor, seed, n_rows, n_cols, &m32_bytes)
    }

    fn analyze(&self, body: &[u8]) -> Result<CodecAnalysis> {
        let (_predictor, _seed, n_m32, _compressed) = parse_header(body)?;
        Ok(CodecAnalysis { compressed_bytes: body.len(), m32_bytes: Some(n_m32), tree_overhead_bits: None })
    }
}

fn parse_header(body: &[u8]) -> Result<(PredictorType, i32, usize, &[u8])> {
    if body.len() < 9 {
        return Err(crate::error::Error::invalid("integer-deflate packing shorter than its fixed header"));
    }

    let predictor = PredictorType::from_code(body[0])?;
    let seed = i32::from_le_bytes([body[1], body[2], body[3], body[4]]);
    let n_m32 = u32::from_le_bytes([body[5], body[6], body[7], body[8]]) as usize;
    Ok((predictor, seed, n_m32, &body[9..]))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_dense_tile() {
        let codec = IntegerDeflateCodec;
        let values: Vec<Option<i32>> = (0..64).map(|i| Some((i * 7) % 101 - 50)).collect();

        let body = codec.encode_integer(8, 8, &values).unwrap().unwrap();
        let decoded = codec.decode_integer(8, 8, &body).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn round_trips_a_tile_with_nulls() {
        let codec = IntegerDeflateCodec;
        let mut values: Vec<Option<i32>> = (0..20).map(|i| Some(i)).collect();
        values[0] = None;
        values[10] = None;

        let body = codec.encode_integer(4, 5, &values).unwrap().unwrap();
        let decoded = codec.decode_integer(4, 5, &body).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn rejects_all_null() {
        let codec = IntegerDeflateCodec;
        assert!(codec.encode_integer(2, 2, &vec![None; 4]).unwrap().is_none());
    }
}
