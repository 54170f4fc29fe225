//! Integer codec, Huffman entropy stage (§4.5): tries every predictor
//! variant compatible with the tile's null pattern, runs Huffman over each
//! one's M32 residual stream, and keeps the smallest packing.

use crate::bitio::{BitWriter, BitReader};
use crate::error::{Error, Result};
use crate::huffman::HuffmanTree;
use crate::predictors::{self, PredictorType};
use super::{Codec, ByteVec, CodecAnalysis};

pub struct IntegerHuffmanCodec;

impl Codec for IntegerHuffmanCodec {
    fn name(&self) -> &'static str {
        "gvrs-int-huffman"
    }

    fn supports_integer(&self) -> bool {
        true
    }

    fn encode_integer(&self, n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<Option<ByteVec>> {
        if values.iter().all(|v| v.is_none()) {
            return Ok(None);
        }

        let has_nulls = values.iter().any(|v| v.is_none());
        let mut best: Option<BitWriter> = None;

        for predictor in PredictorType::all() {
            if !predictor.applicable(has_nulls) {
                continue;
            }

            let Ok((seed, m32_bytes)) = predictors::encode(predictor, n_rows, n_cols, values) else { continue };
            if m32_bytes.is_empty() {
                continue;
            }

            let mut writer = BitWriter::new();
            writer.append_bits(8, predictor.code() as u32)?;
            writer.append_bits(32, seed as u32)?;
            writer.append_bits(32, m32_bytes.len() as u32)?;

            if HuffmanTree::compress_into(&mut writer, &m32_bytes).is_err() {
                continue;
            }

            if best.as_ref().map_or(true, |current| writer.encoded_length_in_bytes() < current.encoded_length_in_bytes()) {
                best = Some(writer);
            }
        }

        Ok(best.map(BitWriter::into_bytes))
    }

    fn decode_integer(&self, n_rows: usize, n_cols: usize, body: &[u8]) -> Result<Vec<Option<i32>>> {
        let mut reader = BitReader::new(body);
        let predictor = PredictorType::from_code(reader.get_bits(8)? as u8)?;
        let seed = reader.get_bits(32)? as i32;
        let n_m32 = reader.get_bits(32)? as usize;

        let m32_bytes = HuffmanTree::decompress_from(&mut reader, n_m32)?;
        predictors::decode(predictor, seed, n_rows, n_cols, &m32_bytes)
    }

    fn analyze(&self, body: &[u8]) -> Result<CodecAnalysis> {
        let mut reader = BitReader::new(body);
        let _predictor = reader.get_bits(8)?;
        let _seed = reader.get_bits(32)?;
        let n_m32 = reader.get_bits(32)? as usize;

        let (_tree, overhead_bits) = HuffmanTree::read(&mut reader).map_err(|_| Error::corrupt("huffman analysis could not parse tree header"))?;

        Ok(CodecAnalysis {
            compressed_bytes: body.len(),
            m32_bytes: Some(n_m32),
            tree_overhead_bits: Some(overhead_bits),
        })
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_tile_with_nulls() {
        let codec = IntegerHuffmanCodec;
        let mut values: Vec<Option<i32>> = (0..25).map(|i| Some(i - 12)).collect();
        values[3] = None;
        values[4] = None;

        let body = codec.encode_integer(5, 5, &values).unwrap().expect("should be encodable");
        let decoded = codec.decode_integer(5, 5, &body).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn round_trips_a_dense_tile() {
        let codec = IntegerHuffmanCodec;
        let values: Vec<Option<i32>> = (0..16).map(|i| Some((i * i) % 37)).collect();

        let body = codec.encode_integer(4, 4, &values).unwrap().unwrap();
        let decoded = codec.decode_integer(4, 4, &body).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn all_null_tile_declines() {
        let codec = IntegerHuffmanCodec;
        let values = vec![None; 9];
        assert!(codec.encode_integer(3, 3, &values).unwrap().is_none());
    }
}
