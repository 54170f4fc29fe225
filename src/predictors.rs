//! Predictive transforms that turn a tile's values into a stream of small
//! signed residuals, M32-encoded (§4.4).
//!
//! Every variant operates on a row-major `n_rows * n_cols` grid of
//! `Option<i32>` (`None` marks a fill/null cell) and produces a single
//! 32-bit seed plus an M32 byte stream. All residual arithmetic happens in
//! `i64`; a residual that does not fit back into `i32` fails the whole
//! encode so the caller can fall back to another codec or uncompressed
//! storage (§4.4 overflow policy).

use crate::error::{Error, Result};
use crate::m32;

/// The four predictor variants, tagged with their on-disk type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorType {
    Constant,
    Linear,
    Triangle,
    ConstantWithNulls,
}

impl PredictorType {
    pub fn code(self) -> u8 {
        match self {
            PredictorType::Constant => 0,
            PredictorType::Linear => 1,
            PredictorType::Triangle => 2,
            PredictorType::ConstantWithNulls => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(PredictorType::Constant),
            1 => Ok(PredictorType::Linear),
            2 => Ok(PredictorType::Triangle),
            3 => Ok(PredictorType::ConstantWithNulls),
            other => Err(Error::invalid(format!("unknown predictor type code {}", other))),
        }
    }

    /// Every variant in the fixed try-order used by the integer codecs
    /// (§4.5 step 2): first-found wins ties on compressed length.
    pub fn all() -> [PredictorType; 4] {
        [PredictorType::Constant, PredictorType::Linear, PredictorType::Triangle, PredictorType::ConstantWithNulls]
    }

    /// Whether this variant can be applied to a tile with (or without)
    /// null cells. Only `ConstantWithNulls` tolerates nulls; the other
    /// three require a fully populated tile.
    pub fn applicable(self, has_nulls: bool) -> bool {
        match self {
            PredictorType::ConstantWithNulls => true,
            _ => !has_nulls,
        }
    }
}

fn to_i32(residual: i64) -> Result<i32> {
    i32::try_from(residual).map_err(|_| Error::NotEncodable)
}

/// Encodes `values` (row-major, `n_rows * n_cols` long) with `predictor`,
/// returning the 32-bit seed and the M32 residual stream.
pub fn encode(predictor: PredictorType, n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<(i32, Vec<u8>)> {
    if values.len() != n_rows * n_cols {
        return Err(Error::invalid("predictor input does not match nRows*nCols"));
    }

    match predictor {
        PredictorType::Constant => encode_constant(n_rows, n_cols, values),
        PredictorType::Linear => encode_linear(n_rows, n_cols, values),
        PredictorType::Triangle => encode_triangle(n_rows, n_cols, values),
        PredictorType::ConstantWithNulls => encode_constant_with_nulls(n_rows, n_cols, values),
    }
}

/// Inverts `encode`, reconstructing the `n_rows * n_cols` grid.
pub fn decode(predictor: PredictorType, seed: i32, n_rows: usize, n_cols: usize, m32_bytes: &[u8]) -> Result<Vec<Option<i32>>> {
    match predictor {
        PredictorType::Constant => decode_constant(seed, n_rows, n_cols, m32_bytes),
        PredictorType::Linear => decode_linear(seed, n_rows, n_cols, m32_bytes),
        PredictorType::Triangle => decode_triangle(seed, n_rows, n_cols, m32_bytes),
        PredictorType::ConstantWithNulls => decode_constant_with_nulls(seed, n_rows, n_cols, m32_bytes),
    }
}

fn require_no_nulls(values: &[Option<i32>]) -> Result<Vec<i32>> {
    values.iter().map(|v| v.ok_or_else(|| Error::invalid("this predictor variant does not tolerate null cells"))).collect()
}

// --- Constant (row-wise previous) -----------------------------------------

fn encode_constant(n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<(i32, Vec<u8>)> {
    let v = require_no_nulls(values)?;
    if n_rows == 0 || n_cols == 0 {
        return Ok((0, Vec::new()));
    }

    let seed = v[0];
    let mut buffer = Vec::new();

    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let current = v[r * n_cols + c] as i64;
            let predictor = if c == 0 { v[(r - 1) * n_cols] as i64 } else { v[r * n_cols + c - 1] as i64 };
            m32::encode(&mut buffer, to_i32(current - predictor)?);
        }
    }

    Ok((seed, buffer))
}

fn decode_constant(seed: i32, n_rows: usize, n_cols: usize, m32_bytes: &[u8]) -> Result<Vec<Option<i32>>> {
    if n_rows == 0 || n_cols == 0 {
        return Ok(Vec::new());
    }

    let mut values = vec![0_i32; n_rows * n_cols];
    values[0] = seed;

    let mut reader = m32::Reader::new(m32_bytes);
    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let residual = reader.next_value()? as i64;
            let predictor = if c == 0 { values[(r - 1) * n_cols] as i64 } else { values[r * n_cols + c - 1] as i64 };
            values[r * n_cols + c] = to_i32(residual + predictor)?;
        }
    }

    Ok(values.into_iter().map(Some).collect())
}

// --- Linear (second difference) -------------------------------------------

fn encode_linear(n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<(i32, Vec<u8>)> {
    let v = require_no_nulls(values)?;
    if n_rows == 0 || n_cols == 0 {
        return Ok((0, Vec::new()));
    }

    let seed = v[0];
    let mut buffer = Vec::new();

    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let current = v[r * n_cols + c] as i64;

            let residual = if c == 0 {
                current - v[(r - 1) * n_cols] as i64
            }
            else if c == 1 {
                current - v[r * n_cols] as i64
            }
            else {
                current - 2 * v[r * n_cols + c - 1] as i64 + v[r * n_cols + c - 2] as i64
            };

            m32::encode(&mut buffer, to_i32(residual)?);
        }
    }

    Ok((seed, buffer))
}

fn decode_linear(seed: i32, n_rows: usize, n_cols: usize, m32_bytes: &[u8]) -> Result<Vec<Option<i32>>> {
    if n_rows == 0 || n_cols == 0 {
        return Ok(Vec::new());
    }

    let mut values = vec![0_i32; n_rows * n_cols];
    values[0] = seed;

    let mut reader = m32::Reader::new(m32_bytes);
    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let residual = reader.next_value()? as i64;

            let reconstructed = if c == 0 {
                residual + values[(r - 1) * n_cols] as i64
            }
            else if c == 1 {
                residual + values[r * n_cols] as i64
            }
            else {
                residual + 2 * values[r * n_cols + c - 1] as i64 - values[r * n_cols + c - 2] as i64
            };

            values[r * n_cols + c] = to_i32(reconstructed)?;
        }
    }

    Ok(values.into_iter().map(Some).collect())
}

// --- Triangle (planar) -----------------------------------------------------

fn encode_triangle(n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<(i32, Vec<u8>)> {
    let v = require_no_nulls(values)?;
    if n_rows == 0 || n_cols == 0 {
        return Ok((0, Vec::new()));
    }

    let seed = v[0];
    let mut buffer = Vec::new();

    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let current = v[r * n_cols + c] as i64;

            let residual = if r == 0 {
                current - v[c - 1] as i64
            }
            else if c == 0 {
                current - v[(r - 1) * n_cols] as i64
            }
            else {
                let above = v[(r - 1) * n_cols + c] as i64;
                let left = v[r * n_cols + c - 1] as i64;
                let diagonal = v[(r - 1) * n_cols + c - 1] as i64;
                current - (above + left - diagonal)
            };

            m32::encode(&mut buffer, to_i32(residual)?);
        }
    }

    Ok((seed, buffer))
}

fn decode_triangle(seed: i32, n_rows: usize, n_cols: usize, m32_bytes: &[u8]) -> Result<Vec<Option<i32>>> {
    if n_rows == 0 || n_cols == 0 {
        return Ok(Vec::new());
    }

    let mut values = vec![0_i32; n_rows * n_cols];
    values[0] = seed;

    let mut reader = m32::Reader::new(m32_bytes);
    for r in 0..n_rows {
        for c in 0..n_cols {
            if r == 0 && c == 0 {
                continue;
            }

            let residual = reader.next_value()? as i64;

            let reconstructed = if r == 0 {
                residual + values[c - 1] as i64
            }
            else if c == 0 {
                residual + values[(r - 1) * n_cols] as i64
            }
            else {
                let above = values[(r - 1) * n_cols + c] as i64;
                let left = values[r * n_cols + c - 1] as i64;
                let diagonal = values[(r - 1) * n_cols + c - 1] as i64;
                residual + (above + left - diagonal)
            };

            values[r * n_cols + c] = to_i32(reconstructed)?;
        }
    }

    Ok(values.into_iter().map(Some).collect())
}

// --- Constant-with-nulls ----------------------------------------------------

fn encode_constant_with_nulls(n_rows: usize, n_cols: usize, values: &[Option<i32>]) -> Result<(i32, Vec<u8>)> {
    if n_rows == 0 || n_cols == 0 {
        return Ok((0, Vec::new()));
    }

    let mut run_starts = Vec::new();
    let mut prior_was_null = true;
    for &value in values {
        match value {
            Some(v) if prior_was_null => { run_starts.push(v as i64); prior_was_null = false; },
            Some(_) => {},
            None => prior_was_null = true,
        }
    }

    if run_starts.is_empty() {
        return Err(Error::invalid("constant-with-nulls predictor requires at least one non-null value"));
    }

    let seed = to_i32((run_starts.iter().sum::<i64>()) / run_starts.len() as i64)?;

    let mut buffer = Vec::new();
    let mut prev_non_null: Option<i32> = None;

    for &value in values {
        match value {
            None => {
                m32::encode_null(&mut buffer);
                prev_non_null = None;
            },
            Some(v) => {
                let predictor = prev_non_null.unwrap_or(seed) as i64;
                m32::encode(&mut buffer, to_i32(v as i64 - predictor)?);
                prev_non_null = Some(v);
            },
        }
    }

    Ok((seed, buffer))
}

fn decode_constant_with_nulls(seed: i32, n_rows: usize, n_cols: usize, m32_bytes: &[u8]) -> Result<Vec<Option<i32>>> {
    if n_rows == 0 || n_cols == 0 {
        return Ok(Vec::new());
    }

    let mut values = Vec::with_capacity(n_rows * n_cols);
    let mut prev_non_null: Option<i32> = None;
    let mut reader = m32::Reader::new(m32_bytes);

    for _ in 0..n_rows * n_cols {
        match reader.next_symbol()? {
            m32::Symbol::Null => {
                values.push(None);
                prev_non_null = None;
            },
            m32::Symbol::Value(residual) => {
                let predictor = prev_non_null.unwrap_or(seed) as i64;
                let value = to_i32(residual as i64 + predictor)?;
                values.push(Some(value));
                prev_non_null = Some(value);
            },
        }
    }

    Ok(values)
}


#[cfg(test)]
mod test {
    use super::*;

    fn dense(n_rows: usize, n_cols: usize, f: impl Fn(usize, usize) -> i32) -> Vec<Option<i32>> {
        (0..n_rows).flat_map(|r| (0..n_cols).map(move |c| Some(f(r, c)))).collect()
    }

    #[test]
    fn constant_round_trips() {
        let values = dense(4, 5, |r, c| (r as i32 * 3 - c as i32 * 2) + 10);
        let (seed, m32_bytes) = encode(PredictorType::Constant, 4, 5, &values).unwrap();
        let decoded = decode(PredictorType::Constant, seed, 4, 5, &m32_bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn linear_round_trips() {
        let values = dense(4, 6, |r, c| (r as i32) * (r as i32) + (c as i32) * 2 - 7);
        let (seed, m32_bytes) = encode(PredictorType::Linear, 4, 6, &values).unwrap();
        let decoded = decode(PredictorType::Linear, seed, 4, 6, &m32_bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn triangle_round_trips() {
        let values = dense(5, 5, |r, c| (r as i32) * 7 + (c as i32) * 3 - 12);
        let (seed, m32_bytes) = encode(PredictorType::Triangle, 5, 5, &values).unwrap();
        let decoded = decode(PredictorType::Triangle, seed, 5, 5, &m32_bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn constant_with_nulls_round_trips() {
        let mut values = dense(3, 4, |r, c| (r as i32) * 10 + c as i32);
        values[0] = None;
        values[5] = None;
        values[6] = None;

        let (seed, m32_bytes) = encode(PredictorType::ConstantWithNulls, 3, 4, &values).unwrap();
        let decoded = decode(PredictorType::ConstantWithNulls, seed, 3, 4, &m32_bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn all_null_tile_is_rejected_by_constant_with_nulls() {
        let values = vec![None; 16];
        assert!(encode(PredictorType::ConstantWithNulls, 4, 4, &values).is_err());
    }

    #[test]
    fn overflowing_residual_is_an_error_not_a_panic() {
        let values = vec![Some(i32::MIN), Some(i32::MAX)];
        assert!(encode(PredictorType::Constant, 1, 2, &values).is_err());
    }

    #[test]
    fn constant_rejects_null_cells() {
        let values = vec![Some(1), None, Some(3), Some(4)];
        assert!(encode(PredictorType::Constant, 2, 2, &values).is_err());
    }

    #[test]
    fn applicability_matches_null_pattern() {
        assert!(PredictorType::Constant.applicable(false));
        assert!(!PredictorType::Constant.applicable(true));
        assert!(PredictorType::ConstantWithNulls.applicable(true));
        assert!(PredictorType::ConstantWithNulls.applicable(false));
    }
}
