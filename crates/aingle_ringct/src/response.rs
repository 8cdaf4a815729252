//! Length-validated response containers
//!
//! Both the ELRS (per ring member, per round) and the aggregate proof
//! (per committed item, per round) carry a two-dimensional array of response
//! vectors. [`ResponseGrid`] stores them row-major with the dimensions checked
//! on construction, so indexing a deserialized proof never goes out of bounds.

use serde::{Deserialize, Serialize};

use crate::codec::{packed_size, put_packed_vec, Reader, Writer};
use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::ring::{vec_infinity_norm, Poly};

/// `rows × rounds` grid of response vectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseGrid {
    rows: usize,
    rounds: usize,
    vectors: Vec<Vec<Poly>>,
}

impl ResponseGrid {
    /// Wrap row-major vectors, checking the count
    pub fn new(rows: usize, rounds: usize, vectors: Vec<Vec<Poly>>) -> Result<Self> {
        if vectors.len() != rows * rounds {
            return Err(RingCtError::structural(
                "responses",
                format!(
                    "expected {}x{} vectors, got {}",
                    rows,
                    rounds,
                    vectors.len()
                ),
            ));
        }
        Ok(Self {
            rows,
            rounds,
            vectors,
        })
    }

    /// Build from a function of `(row, round)`
    pub fn from_fn(
        rows: usize,
        rounds: usize,
        mut f: impl FnMut(usize, usize) -> Vec<Poly>,
    ) -> Self {
        let mut vectors = Vec::with_capacity(rows * rounds);
        for row in 0..rows {
            for round in 0..rounds {
                vectors.push(f(row, round));
            }
        }
        Self {
            rows,
            rounds,
            vectors,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Response vector of `row` in `round`
    pub fn get(&self, row: usize, round: usize) -> &[Poly] {
        &self.vectors[row * self.rounds + round]
    }

    /// Mutable access, mostly useful for tampering tests
    pub fn get_mut(&mut self, row: usize, round: usize) -> &mut Vec<Poly> {
        &mut self.vectors[row * self.rounds + round]
    }

    /// Every vector, row-major
    pub fn iter(&self) -> impl Iterator<Item = &Vec<Poly>> {
        self.vectors.iter()
    }

    /// Largest absolute coefficient in the grid
    pub fn infinity_norm(&self) -> u64 {
        self.vectors
            .iter()
            .map(|v| vec_infinity_norm(v))
            .max()
            .unwrap_or(0)
    }

    /// Check the grid has the expected dimensions and vector shapes
    pub fn check_shape(
        &self,
        rows: usize,
        rounds: usize,
        len: usize,
        degree: usize,
        field: &'static str,
    ) -> Result<()> {
        if self.rows != rows
            || self.rounds != rounds
            || self.vectors.len() != rows * rounds
            || self
                .vectors
                .iter()
                .any(|v| v.len() != len || v.iter().any(|p| p.len() != degree))
        {
            return Err(RingCtError::structural(
                field,
                format!("expected {}x{} vectors of length {}", rows, rounds, len),
            ));
        }
        Ok(())
    }

    /// Bytes [`ResponseGrid::encode_packed`] writes
    pub(crate) fn packed_size(&self, bits: u32) -> usize {
        self.vectors
            .iter()
            .flatten()
            .map(|p| packed_size(p.len(), bits))
            .sum()
    }

    pub(crate) fn encode_packed(&self, w: &mut Writer, bits: u32) {
        for v in &self.vectors {
            put_packed_vec(w, v, bits);
        }
    }

    /// Read `rows × rounds` ring-C response vectors
    pub(crate) fn decode_commitment_responses(
        params: &SchemeParameters,
        r: &mut Reader<'_>,
        rows: usize,
        rounds: usize,
        field: &'static str,
    ) -> Result<Self> {
        let vectors = (0..rows * rounds)
            .map(|_| params.read_commitment_response(r, field))
            .collect::<Result<Vec<_>>>()?;
        Self::new(rows, rounds, vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(tag: i64) -> Vec<Poly> {
        vec![Poly::from_coeffs(vec![tag, -tag]); 2]
    }

    #[test]
    fn test_grid_indexing() {
        let grid = ResponseGrid::from_fn(3, 4, |row, round| vector((row * 10 + round) as i64));
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.rounds(), 4);
        assert_eq!(grid.get(2, 1)[0].coeffs[0], 21);
        assert_eq!(grid.infinity_norm(), 23);
        assert!(grid.check_shape(3, 4, 2, 2, "grid").is_ok());
        assert!(grid.check_shape(4, 3, 2, 2, "grid").is_err());
        assert!(grid.check_shape(3, 4, 3, 2, "grid").is_err());
    }

    #[test]
    fn test_grid_count_checked() {
        assert!(ResponseGrid::new(2, 2, vec![vector(1); 3]).is_err());
        assert!(ResponseGrid::new(2, 2, vec![vector(1); 4]).is_ok());
    }
}
