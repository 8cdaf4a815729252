//! Balance relations proven by the aggregate proof
//!
//! Every amount is committed bit-wise, so a balance equation such as
//! `Σ in = Σ out + fee` is checked as a binary addition with explicit carries:
//!
//! ```text
//! for t in 0..d_c:   Σ addends[t] + public[t] + f[t] - 2·f[t+1] - total[t] = 0
//!                    f[0] = 0,  f[d_c] = 0
//! ```
//!
//! The carry vectors `f` are committed alongside the amounts. To keep them
//! short, the prover also reveals `u' = B_bin·(f_1 ‖ f_2 …) + e` for a public
//! binary matrix `B_bin` chosen after `f` and the noise `e` are fixed; the
//! verifier checks `‖u'‖∞ <= η_f - β_f`.
//!
//! Message layouts (indices into the extended message vector):
//!
//! | Kind | Messages | n | n1 | n2 |
//! |------|----------|---|----|----|
//! | coinbase, J >= 2 | `out_0..out_J, f, e` | J | J | J+2 |
//! | transfer, I = 1 | `in, out_0..out_J, f, e` | J+1 | J+1 | J+3 |
//! | transfer, I >= 2 | `in_0..in_I, out_0..out_J, total, f_1, f_2, e` | I+J | I+J+1 | I+J+4 |

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::ring::{add_mod, mul_mod, sub_mod, NttPoly};
use crate::sampling::{sample_bounded, sample_bounded_vec, Expander, Seed};
use crate::transcript::Transcript;

/// Which balance statement an aggregate proof carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Coinbase with two or more outputs: `Σ out = vin`
    CoinbaseMulti,
    /// Transfer with one input: `in = Σ out + fee`
    SingleInputTransfer,
    /// Transfer with several inputs: `Σ in = total = Σ out + fee`
    MultiInputTransfer,
}

impl RelationKind {
    pub(crate) fn tag(self) -> u64 {
        match self {
            Self::CoinbaseMulti => 0,
            Self::SingleInputTransfer => 1,
            Self::MultiInputTransfer => 2,
        }
    }
}

/// Right-hand side of a carry relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Total {
    Message(usize),
    Public(u64),
}

/// One binary addition with carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CarryRelation {
    pub addends: Vec<usize>,
    pub public_addend: u64,
    pub total: Total,
    pub carry: usize,
}

/// Message layout and relations of an aggregate statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RelationLayout {
    pub kind: RelationKind,
    pub input_count: usize,
    pub output_count: usize,
    pub public_value: u64,
    /// Commitments linked to individual outputs/inputs
    pub n: usize,
    /// Messages that must be bit strings
    pub n1: usize,
    /// All extended messages
    pub n2: usize,
    pub relations: Vec<CarryRelation>,
    pub noise: usize,
    max_carry: u64,
}

impl RelationLayout {
    /// Coinbase paying `vin` to `output_count >= 2` outputs
    pub fn coinbase(params: &SchemeParameters, output_count: usize, vin: u64) -> Result<Self> {
        check_count("outputs", output_count, 2, params.config().max_outputs)?;
        let j = output_count;
        let layout = Self {
            kind: RelationKind::CoinbaseMulti,
            input_count: 0,
            output_count: j,
            public_value: vin,
            n: j,
            n1: j,
            n2: j + 2,
            relations: vec![CarryRelation {
                addends: (0..j).collect(),
                public_addend: 0,
                total: Total::Public(vin),
                carry: j,
            }],
            noise: j + 1,
            max_carry: j as u64 - 1,
        };
        Ok(layout)
    }

    /// Transfer spending `input_count` inputs into `output_count` outputs
    pub fn transfer(
        params: &SchemeParameters,
        input_count: usize,
        output_count: usize,
        fee: u64,
    ) -> Result<Self> {
        check_count("inputs", input_count, 1, params.config().max_inputs)?;
        check_count("outputs", output_count, 1, params.config().max_outputs)?;
        let (i, j) = (input_count, output_count);
        let outputs: Vec<usize> = (i..i + j).collect();

        let layout = if i == 1 {
            Self {
                kind: RelationKind::SingleInputTransfer,
                input_count: 1,
                output_count: j,
                public_value: fee,
                n: j + 1,
                n1: j + 1,
                n2: j + 3,
                relations: vec![CarryRelation {
                    addends: outputs,
                    public_addend: fee,
                    total: Total::Message(0),
                    carry: j + 1,
                }],
                noise: j + 2,
                max_carry: j as u64,
            }
        } else {
            let total = i + j;
            Self {
                kind: RelationKind::MultiInputTransfer,
                input_count: i,
                output_count: j,
                public_value: fee,
                n: i + j,
                n1: i + j + 1,
                n2: i + j + 4,
                relations: vec![
                    CarryRelation {
                        addends: (0..i).collect(),
                        public_addend: 0,
                        total: Total::Message(total),
                        carry: total + 1,
                    },
                    CarryRelation {
                        addends: outputs,
                        public_addend: fee,
                        total: Total::Message(total),
                        carry: total + 2,
                    },
                ],
                noise: total + 3,
                max_carry: (i as u64 - 1).max(j as u64),
            }
        };
        Ok(layout)
    }

    /// Columns of `B_bin`
    pub fn carry_columns(&self, params: &SchemeParameters) -> usize {
        self.relations.len() * params.ring_c().degree()
    }

    /// Acceptance bound `η_f - β_f` for `u'`
    pub fn noise_limit(&self, params: &SchemeParameters) -> u64 {
        let beta = self.carry_columns(params) as u64 * self.max_carry;
        params.config().carry_noise_bound - beta
    }

    /// Scalar equations the linear predicate combines
    pub fn equation_count(&self, params: &SchemeParameters) -> usize {
        let d = params.ring_c().degree();
        self.relations.len() * (d + 1) + d
    }

    /// Carries for the given bit-decomposed messages (`messages[j][t]`)
    ///
    /// Fails with [`RingCtError::BalanceError`] if some relation does not hold.
    pub fn carries(
        &self,
        params: &SchemeParameters,
        messages: &[Vec<u64>],
    ) -> Result<Vec<Vec<u64>>> {
        let d = params.ring_c().degree();
        self.relations
            .iter()
            .map(|rel| {
                let mut f = vec![0u64; d + 1];
                for t in 0..d {
                    let public = if t < 64 { (rel.public_addend >> t) & 1 } else { 0 };
                    let sum: u64 = rel.addends.iter().map(|&a| messages[a][t]).sum::<u64>()
                        + public
                        + f[t];
                    let total_bit = match rel.total {
                        Total::Message(m) => messages[m][t],
                        Total::Public(v) => {
                            if t < 64 {
                                (v >> t) & 1
                            } else {
                                0
                            }
                        }
                    };
                    if sum % 2 != total_bit {
                        return Err(RingCtError::BalanceError(format!(
                            "bit {} of the balance relation does not add up",
                            t
                        )));
                    }
                    f[t + 1] = sum / 2;
                }
                if f[d] != 0 {
                    return Err(RingCtError::BalanceError(
                        "balance relation overflows the ring degree".into(),
                    ));
                }
                f.truncate(d);
                Ok(f)
            })
            .collect()
    }

    /// Predicate coefficients for one batch `γ` of equation weights
    ///
    /// Returns per-message slot vectors `Γ_j` and the scalar `target` with
    /// `Σ_j Σ_t Γ_j[t]·m_j[t] = target` for every honest witness.
    pub fn linear_coefficients(
        &self,
        params: &SchemeParameters,
        gamma: &[u64],
        bin: &BinaryMatrix,
        u_p: &[i64],
    ) -> (Vec<NttPoly>, u64) {
        let ring = params.ring_c();
        let q = ring.modulus();
        let d = ring.degree();
        let mut coeffs = vec![vec![0u64; d]; self.n2];
        let mut target = 0u64;

        let bit_weighted_sum = |weights: &[u64], v: u64| {
            (0..d.min(64))
                .filter(|&t| (v >> t) & 1 == 1)
                .fold(0u64, |acc, t| add_mod(acc, weights[t], q))
        };

        for (ri, rel) in self.relations.iter().enumerate() {
            let g0 = gamma[ri * (d + 1)];
            let g1 = &gamma[ri * (d + 1) + 1..(ri + 1) * (d + 1)];
            for &a in &rel.addends {
                for t in 0..d {
                    coeffs[a][t] = add_mod(coeffs[a][t], g1[t], q);
                }
            }
            match rel.total {
                Total::Message(m) => {
                    for t in 0..d {
                        coeffs[m][t] = sub_mod(coeffs[m][t], g1[t], q);
                    }
                }
                Total::Public(v) => target = add_mod(target, bit_weighted_sum(g1, v), q),
            }
            target = sub_mod(target, bit_weighted_sum(g1, rel.public_addend), q);

            let carry = &mut coeffs[rel.carry];
            carry[0] = add_mod(carry[0], add_mod(g0, g1[0], q), q);
            for s in 1..d {
                let twice = add_mod(g1[s - 1], g1[s - 1], q);
                carry[s] = add_mod(carry[s], sub_mod(g1[s], twice, q), q);
            }
        }

        let g3 = &gamma[self.relations.len() * (d + 1)..];
        for (ri, rel) in self.relations.iter().enumerate() {
            for s in 0..d {
                let col = ri * d + s;
                let w = (0..d)
                    .filter(|&r| bin.get(r, col))
                    .fold(0u64, |acc, r| add_mod(acc, g3[r], q));
                coeffs[rel.carry][s] = add_mod(coeffs[rel.carry][s], w, q);
            }
        }
        for r in 0..d {
            coeffs[self.noise][r] = add_mod(coeffs[self.noise][r], g3[r], q);
            target = add_mod(target, mul_mod(g3[r], ring.reduce(u_p[r]), q), q);
        }

        (
            coeffs.into_iter().map(|c| ring.from_slots(c)).collect(),
            target,
        )
    }
}

fn check_count(field: &'static str, n: usize, min: usize, max: usize) -> Result<()> {
    if n < min || n > max {
        return Err(RingCtError::structural(
            field,
            format!("count {} outside {}..={}", n, min, max),
        ));
    }
    Ok(())
}

/// Public binary matrix `B_bin` (`d_c × cols`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BinaryMatrix {
    rows: usize,
    cols: usize,
    bits: Vec<bool>,
}

impl BinaryMatrix {
    /// Expand a matrix from a seed
    pub fn expand(seed: &Seed, rows: usize, cols: usize) -> Self {
        let mut exp = Expander::new(b"aingle_ringct.binary_matrix", &[seed]);
        Self {
            rows,
            cols,
            bits: (0..rows * cols).map(|_| exp.next_bits(1) == 1).collect(),
        }
    }

    pub fn get(&self, r: usize, c: usize) -> bool {
        self.bits[r * self.cols + c]
    }

    /// `B_bin·v` over the integers
    pub fn mul_vec(&self, v: &[i64]) -> Vec<i64> {
        (0..self.rows)
            .map(|r| {
                (0..self.cols)
                    .filter(|&c| self.get(r, c))
                    .map(|c| v[c])
                    .sum()
            })
            .collect()
    }

    pub fn append_to(&self, t: &mut Transcript) {
        let packed: Vec<u8> = self
            .bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i))
            })
            .collect();
        t.append_bytes(b"binary_matrix", &packed);
    }
}

/// Seed of `B_bin`, bound to the transaction body and aggregate commitment
pub(crate) fn binary_matrix_seed(message: &[u8], b_hat: &[NttPoly], c_hats: &[NttPoly]) -> Seed {
    let mut t = Transcript::new(b"aingle_ringct.binary_matrix_seed");
    t.append_bytes(b"message", message);
    t.append_ntt_vec(b"b_hat", b_hat);
    t.append_ntt_vec(b"c_hats", c_hats);
    t.finish()
}

/// Bit decomposition of an amount into `d_c` slots
pub(crate) fn amount_slots(params: &SchemeParameters, value: u64) -> Vec<u64> {
    crate::commitment::value_bits(params, value)
}

/// Aggregate commitment to the extended messages, with its carry proof
#[derive(Debug, Clone)]
pub(crate) struct AggregateCommitment {
    pub b_hat: Vec<NttPoly>,
    pub c_hats: Vec<NttPoly>,
    pub r_hat: Vec<NttPoly>,
    pub messages: Vec<NttPoly>,
    pub bin_matrix: BinaryMatrix,
    pub u_p: Vec<i64>,
}

/// Commit to the extended messages and sample the carry noise
///
/// `messages` holds every extended message except the noise `e` as slot
/// vectors; the carries must already be in place. Restarts until
/// `‖u'‖∞ <= η_f - β_f`.
pub(crate) fn commit_extended<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    layout: &RelationLayout,
    body: &[u8],
    messages: &[Vec<u64>],
    stage: &'static str,
) -> Result<AggregateCommitment> {
    let ring = params.ring_c();
    let d = ring.degree();
    let limit = layout.noise_limit(params);
    let eta_f = params.config().carry_noise_bound;
    let attempts = params.config().max_rejection_attempts;
    debug_assert_eq!(messages.len() + 1, layout.n2);

    let carries: Vec<i64> = layout
        .relations
        .iter()
        .flat_map(|rel| messages[rel.carry].iter().map(|&f| f as i64))
        .collect();

    for attempt in 0..attempts {
        let e = sample_bounded(rng, d, eta_f).coeffs;
        let r_hat = ring.ntt_vec(&sample_bounded_vec(rng, params.l_c(), d, 1));

        let mut m_hat: Vec<NttPoly> = messages
            .iter()
            .map(|m| ring.from_slots(m.clone()))
            .collect();
        m_hat.push(ring.from_slots(e.iter().map(|&x| ring.reduce(x)).collect()));

        let b_hat = ring.mat_vec(params.matrix_b(), &r_hat);
        let c_hats: Vec<NttPoly> = m_hat
            .iter()
            .enumerate()
            .map(|(j, m)| ring.add(&ring.inner_product(params.h(j + 1), &r_hat), m))
            .collect();

        let seed = binary_matrix_seed(body, &b_hat, &c_hats);
        let bin_matrix = BinaryMatrix::expand(&seed, d, layout.carry_columns(params));
        let u_p: Vec<i64> = bin_matrix
            .mul_vec(&carries)
            .into_iter()
            .zip(&e)
            .map(|(x, y)| x + y)
            .collect();

        if u_p.iter().all(|x| x.unsigned_abs() <= limit) {
            return Ok(AggregateCommitment {
                b_hat,
                c_hats,
                r_hat,
                messages: m_hat,
                bin_matrix,
                u_p,
            });
        }
        log::debug!("{}: carry noise out of bound, restart {}", stage, attempt + 1);
    }
    Err(RingCtError::RestartLimitExceeded { stage, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingContext;
    use rand::rngs::OsRng;
    use rand::Rng;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    fn slots(values: &[u64]) -> Vec<Vec<u64>> {
        values.iter().map(|&v| amount_slots(params(), v)).collect()
    }

    /// `Σ_j Σ_t Γ_j[t]·m_j[t]` in `Z_q`
    fn evaluate(ring: &RingContext, coeffs: &[NttPoly], messages: &[Vec<u64>]) -> u64 {
        let q = ring.modulus();
        coeffs
            .iter()
            .zip(messages)
            .flat_map(|(c, m)| c.slots().iter().zip(m).map(move |(&x, &y)| mul_mod(x, y % q, q)))
            .fold(0, |acc, x| add_mod(acc, x, q))
    }

    fn check_predicate(layout: &RelationLayout, mut messages: Vec<Vec<u64>>) {
        let ring = params().ring_c();
        let d = ring.degree();
        let carries = layout.carries(params(), &messages).unwrap();
        for (rel, f) in layout.relations.iter().zip(&carries) {
            assert_eq!(messages[rel.carry], vec![0; d]);
            messages[rel.carry] = f.clone();
        }
        let e: Vec<i64> = (0..d).map(|_| OsRng.gen_range(-1000..=1000)).collect();
        let bin = BinaryMatrix::expand(&[9u8; 64], d, layout.carry_columns(params()));
        let flat: Vec<i64> = carries.iter().flatten().map(|&x| x as i64).collect();
        let u_p: Vec<i64> = bin.mul_vec(&flat).iter().zip(&e).map(|(a, b)| a + b).collect();
        messages[layout.noise] = e.iter().map(|&x| ring.reduce(x)).collect();

        let gamma: Vec<u64> = (0..layout.equation_count(params()))
            .map(|_| OsRng.gen_range(0..ring.modulus()))
            .collect();
        let (coeffs, target) = layout.linear_coefficients(params(), &gamma, &bin, &u_p);
        assert_eq!(evaluate(ring, &coeffs, &messages), target);
    }

    #[test]
    fn test_coinbase_layout_predicate() {
        let layout = RelationLayout::coinbase(params(), 3, 600).unwrap();
        assert_eq!((layout.n, layout.n1, layout.n2), (3, 3, 5));
        let mut messages = slots(&[100, 200, 300]);
        messages.extend(slots(&[0, 0]));
        check_predicate(&layout, messages);
    }

    #[test]
    fn test_single_input_layout_predicate() {
        let layout = RelationLayout::transfer(params(), 1, 2, 10).unwrap();
        assert_eq!(layout.kind, RelationKind::SingleInputTransfer);
        assert_eq!((layout.n, layout.n1, layout.n2), (3, 3, 5));
        let mut messages = slots(&[256, 200, 46]);
        messages.extend(slots(&[0, 0]));
        check_predicate(&layout, messages);
    }

    #[test]
    fn test_multi_input_layout_predicate() {
        let layout = RelationLayout::transfer(params(), 2, 2, 7).unwrap();
        assert_eq!(layout.kind, RelationKind::MultiInputTransfer);
        assert_eq!((layout.n, layout.n1, layout.n2), (4, 5, 8));
        let mut messages = slots(&[500, 507, 1000, 0, 1007]);
        messages.extend(slots(&[0, 0, 0]));
        check_predicate(&layout, messages);
    }

    #[test]
    fn test_unbalanced_carries_rejected() {
        let layout = RelationLayout::coinbase(params(), 2, 512).unwrap();
        let mut messages = slots(&[257, 256]);
        messages.extend(slots(&[0, 0]));
        assert!(matches!(
            layout.carries(params(), &messages),
            Err(RingCtError::BalanceError(_))
        ));
    }

    #[test]
    fn test_layout_counts() {
        assert!(RelationLayout::coinbase(params(), 1, 5).is_err());
        assert!(RelationLayout::coinbase(params(), 6, 5).is_err());
        assert!(RelationLayout::transfer(params(), 0, 1, 0).is_err());
        assert!(RelationLayout::transfer(params(), 6, 1, 0).is_err());
        let layout = RelationLayout::transfer(params(), 5, 5, 0).unwrap();
        assert_eq!(layout.n2, params().max_extended_messages());
        assert!(layout.noise_limit(params()) < params().config().carry_noise_bound);
    }

    #[test]
    fn test_commit_extended_bounds_noise() {
        let layout = RelationLayout::coinbase(params(), 2, 3).unwrap();
        let mut messages = slots(&[1, 2, 0]);
        let carries = layout.carries(params(), &messages).unwrap();
        messages[layout.relations[0].carry] = carries[0].clone();
        let agg = commit_extended(params(), &mut OsRng, &layout, b"body", &messages, "test")
            .unwrap();
        assert_eq!(agg.c_hats.len(), layout.n2);
        assert!(agg
            .u_p
            .iter()
            .all(|x| x.unsigned_abs() <= layout.noise_limit(params())));
    }

    #[test]
    fn test_binary_matrix_is_deterministic() {
        let a = BinaryMatrix::expand(&[1u8; 64], 8, 16);
        let b = BinaryMatrix::expand(&[1u8; 64], 8, 16);
        let c = BinaryMatrix::expand(&[2u8; 64], 8, 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let v: Vec<i64> = (0..16).collect();
        let direct: i64 = (0..16).filter(|&c| a.get(0, c)).map(|c| c as i64).sum();
        assert_eq!(a.mul_vec(&v)[0], direct);
    }
}
