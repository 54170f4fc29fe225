//! Byte-symbol Huffman coding over the 0..=255 alphabet (§4.3).
//!
//! The tree is serialized before the symbols it encodes: an 8-bit count
//! `k - 1` of distinct symbols, then either the one-symbol special case
//! (root flag bit `1` followed by the 8-bit symbol) or a pre-order walk of
//! the tree (root flag bit `0`; each node is a leaf bit `1` + 8-bit symbol,
//! or an internal bit `0` followed by its two children). Symbols themselves
//! are then emitted as the root-to-leaf bit path, left = 0, right = 1, with
//! no end-of-stream marker — the caller must know how many symbols follow.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use crate::bitio::{BitWriter, BitReader};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Node {
    Leaf(u8),
    Internal(Box<Node>, Box<Node>),
}

/// A built Huffman tree, ready to encode or decode a stream of bytes drawn
/// from the alphabet it was built over.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    root: Node,
    codes: [Option<(u32, u8)>; 256],
    symbol_count: usize,
}

impl HuffmanTree {
    /// Builds a tree from the byte frequencies of `data`. `data` must
    /// contain at least one byte.
    pub fn build(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid("cannot build a huffman tree over an empty stream"));
        }

        let mut frequencies = [0_u64; 256];
        for &byte in data {
            frequencies[byte as usize] += 1;
        }

        Self::from_frequencies(&frequencies)
    }

    fn from_frequencies(frequencies: &[u64; 256]) -> Result<Self> {
        // (freq, insertion order) as the heap key so ties break deterministically
        // by symbol/creation order rather than by node identity.
        let mut heap: BinaryHeap<Reverse<(u64, usize, Node)>> = BinaryHeap::new();
        let mut order = 0_usize;

        for symbol in 0..256 {
            if frequencies[symbol] > 0 {
                heap.push(Reverse((frequencies[symbol], order, Node::Leaf(symbol as u8))));
                order += 1;
            }
        }

        let symbol_count = heap.len();
        if symbol_count == 0 {
            return Err(Error::invalid("cannot build a huffman tree over zero symbols"));
        }

        while heap.len() > 1 {
            let Reverse((freq_a, _, a)) = heap.pop().unwrap();
            let Reverse((freq_b, _, b)) = heap.pop().unwrap();
            heap.push(Reverse((freq_a + freq_b, order, Node::Internal(Box::new(a), Box::new(b)))));
            order += 1;
        }

        let Reverse((_, _, root)) = heap.pop().unwrap();

        let mut codes: [Option<(u32, u8)>; 256] = [None; 256];
        assign_codes(&root, 0, 0, &mut codes);

        Ok(Self { root, codes, symbol_count })
    }

    /// Serializes the tree header onto `writer`.
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.append_bits(8, (self.symbol_count - 1) as u32)?;

        if self.symbol_count == 1 {
            writer.append_bit(1);
            let symbol = match &self.root {
                Node::Leaf(symbol) => *symbol,
                Node::Internal(..) => return Err(Error::corrupt("one-symbol tree has an internal root")),
            };
            writer.append_bits(8, symbol as u32)?;
        }
        else {
            writer.append_bit(0);
            write_node(&self.root, writer)?;
        }

        Ok(())
    }

    /// Reads a tree header from `reader`, returning the tree and the number
    /// of bits the header occupied (so callers can report "overhead").
    pub fn read(reader: &mut BitReader<'_>) -> Result<(Self, usize)> {
        let start = reader.position();
        let symbol_count = reader.get_bits(8)? as usize + 1;
        let is_single = reader.get_bit()? == 1;

        let root = if is_single {
            let symbol = reader.get_bits(8)? as u8;
            Node::Leaf(symbol)
        }
        else {
            if symbol_count < 2 {
                return Err(Error::invalid("huffman tree header claims <2 symbols but is not the one-symbol form"));
            }
            read_node(reader)?
        };

        let mut codes: [Option<(u32, u8)>; 256] = [None; 256];
        assign_codes(&root, 0, 0, &mut codes);

        let consumed = reader.position() - start;
        Ok((Self { root, codes, symbol_count }, consumed))
    }

    /// Appends the bit path for `symbol` onto `writer`.
    pub fn encode_symbol(&self, writer: &mut BitWriter, symbol: u8) -> Result<()> {
        let (code, len) = self.codes[symbol as usize]
            .ok_or_else(|| Error::invalid(format!("symbol {} is not present in this huffman tree", symbol)))?;

        for i in (0..len).rev() {
            writer.append_bit((code >> i) & 1);
        }

        Ok(())
    }

    /// Decodes the next symbol by walking the tree bit by bit from the root.
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut node = &self.root;

        loop {
            match node {
                Node::Leaf(symbol) => return Ok(*symbol),
                Node::Internal(left, right) => {
                    node = if reader.get_bit()? == 0 { left } else { right };
                },
            }
        }
    }

    /// Encodes every byte of `data`, tree header included, onto `writer`.
    pub fn compress_into(writer: &mut BitWriter, data: &[u8]) -> Result<()> {
        let tree = Self::build(data)?;
        tree.write(writer)?;

        for &byte in data {
            tree.encode_symbol(writer, byte)?;
        }

        Ok(())
    }

    /// Decodes a tree header followed by exactly `symbol_count_to_read`
    /// symbols from `reader`.
    pub fn decompress_from(reader: &mut BitReader<'_>, symbol_count_to_read: usize) -> Result<Vec<u8>> {
        let (tree, _overhead_bits) = Self::read(reader)?;

        let mut result = Vec::with_capacity(symbol_count_to_read);
        for _ in 0..symbol_count_to_read {
            result.push(tree.decode_symbol(reader)?);
        }

        Ok(result)
    }
}

fn write_node(node: &Node, writer: &mut BitWriter) -> Result<()> {
    match node {
        Node::Leaf(symbol) => {
            writer.append_bit(1);
            writer.append_bits(8, *symbol as u32)?;
        },
        Node::Internal(left, right) => {
            writer.append_bit(0);
            write_node(left, writer)?;
            write_node(right, writer)?;
        },
    }

    Ok(())
}

fn read_node(reader: &mut BitReader<'_>) -> Result<Node> {
    if reader.get_bit()? == 1 {
        Ok(Node::Leaf(reader.get_bits(8)? as u8))
    }
    else {
        let left = read_node(reader)?;
        let right = read_node(reader)?;
        Ok(Node::Internal(Box::new(left), Box::new(right)))
    }
}

fn assign_codes(node: &Node, code: u32, depth: u8, codes: &mut [Option<(u32, u8)>; 256]) {
    match node {
        Node::Leaf(symbol) => {
            // a lone symbol has depth 0; give it a one-bit code so
            // `encode_symbol`/`decode_symbol` still do something, even
            // though the one-symbol case never calls them in practice.
            let len = depth.max(1);
            codes[*symbol as usize] = Some((code, len));
        },
        Node::Internal(left, right) => {
            assign_codes(left, code << 1, depth + 1, codes);
            assign_codes(right, (code << 1) | 1, depth + 1, codes);
        },
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_mixed_alphabet() {
        let data: Vec<u8> = (0..=255_u16).flat_map(|n| std::iter::repeat((n % 17) as u8).take((n % 5 + 1) as usize)).map(|b| b).collect();

        let mut writer = BitWriter::new();
        HuffmanTree::compress_into(&mut writer, &data).unwrap();

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let decoded = HuffmanTree::decompress_from(&mut reader, data.len()).unwrap();

        assert_eq!(decoded, data);
    }

    #[test]
    fn one_symbol_tile_s4() {
        // scenario S4: a tile whose M32 stream is 100 zero bytes.
        let data = vec![0_u8; 100];

        let mut writer = BitWriter::new();
        HuffmanTree::compress_into(&mut writer, &data).unwrap();
        let bytes = writer.into_bytes();

        // header: [count-1 = 0][root flag = 1][symbol = 0x00]
        assert_eq!(bytes[0], 0);

        let mut reader = BitReader::new(&bytes);
        let (tree, _) = HuffmanTree::read(&mut reader).unwrap();
        assert_eq!(tree.symbol_count, 1);

        let mut reader = BitReader::new(&bytes);
        let decoded = HuffmanTree::decompress_from(&mut reader, 100).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_stream_is_rejected() {
        assert!(HuffmanTree::build(&[]).is_err());
    }

    #[test]
    fn unknown_symbol_cannot_be_encoded() {
        let tree = HuffmanTree::build(&[1, 2, 3]).unwrap();
        let mut writer = BitWriter::new();
        assert!(tree.encode_symbol(&mut writer, 99).is_err());
    }
}
