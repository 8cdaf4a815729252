//! Scheme parameters and configuration
//!
//! [`ParameterConfig`] is the serializable description of a parameter set.
//! [`SchemeParameters`] is the validated, expanded form: ring contexts, the
//! public matrices `A`, `a`, `B` and `H`, the automorphism tables and the
//! encoding limits. It is built once, never mutated, and shared by reference
//! (it is `Send + Sync`) across every generation and verification call.
//!
//! # Example
//!
//! ```rust,no_run
//! use aingle_ringct::{ParameterConfig, SchemeParameters};
//!
//! let config = ParameterConfig::standard();
//! let params = SchemeParameters::new(config).unwrap();
//! assert_eq!(params.max_value(), (1u64 << 51) - 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::{ADDRESS_RESPONSE_BITS, ADDRESS_SECRET_BITS, COMMITMENT_RESPONSE_BITS};
use crate::error::{Result, RingCtError};
use crate::ring::{permute, NttPoly, Poly, RingContext};
use crate::sampling::Expander;

/// Serializable parameter set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Seed from which all public matrices are expanded
    pub public_seed: String,

    /// Degree `d_a` of ring A
    pub address_ring_degree: usize,
    /// Prime modulus `q_a` of ring A
    pub address_ring_modulus: u64,
    /// Rows `k_a` of the address matrix `A`
    pub address_rows: usize,
    /// Extra columns `λ_a`; the secret has `k_a + λ_a + 1` components
    pub address_lambda: usize,
    /// Coefficient bound `γ_a` of the address secret `s`
    pub address_secret_bound: u64,
    /// Number of non-zero coefficients `θ_a` of a ring-A challenge
    pub address_challenge_weight: usize,
    /// Mask bound `η_a` for ring-A responses
    pub address_mask_bound: u64,

    /// Degree `d_c` of ring C
    pub commitment_ring_degree: usize,
    /// Prime modulus `q_c` of ring C
    pub commitment_ring_modulus: u64,
    /// Rows `k_c` of the commitment matrix `B`
    pub commitment_rows: usize,
    /// Extra randomness columns `λ_c`
    pub commitment_lambda: usize,
    /// Number of non-zero coefficients `θ_c` of a ring-C challenge
    pub commitment_challenge_weight: usize,
    /// Mask bound `η_c` for ring-C responses
    pub commitment_mask_bound: u64,

    /// Parallel repetitions `K` (order of the ring-C automorphism)
    pub repetitions: usize,
    /// Amount bit-width `N`; amounts live in `[0, 2^N - 1]`
    pub value_bits: usize,
    /// Bound `η_f` of the carry masking noise
    pub carry_noise_bound: u64,

    /// Maximum inputs per transfer
    pub max_inputs: usize,
    /// Maximum outputs per transaction
    pub max_outputs: usize,
    /// Maximum ring size per input
    pub max_ring_size: usize,
    /// Maximum memo length in bytes
    pub max_memo_size: usize,
    /// Maximum ledger identifier length in bytes
    pub max_ledger_id_size: usize,
    /// Cap on every rejection-sampling loop
    pub max_rejection_attempts: usize,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl ParameterConfig {
    /// Standard parameter set
    pub fn standard() -> Self {
        Self {
            public_seed: "aingle_ringct public parameters v1".to_string(),
            address_ring_degree: 256,
            address_ring_modulus: 4294962689,
            address_rows: 5,
            address_lambda: 5,
            address_secret_bound: 2,
            address_challenge_weight: 60,
            address_mask_bound: (1 << 19) - 1,
            commitment_ring_degree: 128,
            commitment_ring_modulus: 9007199254735873,
            commitment_rows: 5,
            commitment_lambda: 5,
            commitment_challenge_weight: 60,
            commitment_mask_bound: (1 << 24) - 1,
            repetitions: 4,
            value_bits: 51,
            carry_noise_bound: (1 << 19) - 1,
            max_inputs: 5,
            max_outputs: 5,
            max_ring_size: 7,
            max_memo_size: 1024,
            max_ledger_id_size: 64,
            max_rejection_attempts: 1024,
        }
    }

    /// Standard rings with smaller transaction limits
    ///
    /// Fewer inputs and outputs shrink the commitment matrix `H`, which makes
    /// every proof cheaper. Transactions are not interchangeable with the
    /// standard set.
    pub fn compact() -> Self {
        Self {
            public_seed: "aingle_ringct public parameters v1 compact".to_string(),
            max_inputs: 2,
            max_outputs: 3,
            max_ring_size: 4,
            max_memo_size: 256,
            ..Self::standard()
        }
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RingCtError::InvalidParameters(format!("invalid JSON: {}", e)))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RingCtError::InvalidParameters(format!("cannot serialize: {}", e)))
    }

    /// Largest carry-bound `β_f` over all relation kinds
    fn max_carry_bound(&self) -> u64 {
        let biggest = self.max_inputs.max(self.max_outputs) as u64;
        2 * self.commitment_ring_degree as u64 * biggest
    }

    /// Check the relations between parameters the protocols rely on
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(RingCtError::InvalidParameters(msg));

        for (name, d) in [
            ("address_ring_degree", self.address_ring_degree),
            ("commitment_ring_degree", self.commitment_ring_degree),
        ] {
            if d < 8 || !d.is_power_of_two() {
                return fail(format!("{} must be a power of two >= 8", name));
            }
        }
        if self.address_ring_modulus >= 1 << 33 {
            return fail("address_ring_modulus must be below 2^33".into());
        }
        if self.commitment_ring_modulus >= 1 << 54 {
            return fail("commitment_ring_modulus must be below 2^54".into());
        }
        if self.address_rows == 0 || self.commitment_rows == 0 {
            return fail("matrix row counts must be positive".into());
        }

        let k = self.repetitions;
        if k == 0 || !k.is_power_of_two() || k > self.commitment_ring_degree / 2 {
            return fail("repetitions must be a power of two <= d_c / 2".into());
        }
        if self.value_bits == 0 || self.value_bits > 62 {
            return fail("value_bits must be in 1..=62".into());
        }
        if self.value_bits + 8 > self.commitment_ring_degree {
            return fail("value_bits leaves no room for carries in ring C".into());
        }

        for (name, weight, degree) in [
            (
                "address_challenge_weight",
                self.address_challenge_weight,
                self.address_ring_degree,
            ),
            (
                "commitment_challenge_weight",
                self.commitment_challenge_weight,
                self.commitment_ring_degree,
            ),
        ] {
            if weight == 0 || weight > degree {
                return fail(format!("{} must be in 1..=degree", name));
            }
        }

        let beta_a = self.address_challenge_weight as u64 * self.address_secret_bound;
        if self.address_secret_bound == 0 || self.address_mask_bound <= 2 * beta_a {
            return fail("address_mask_bound must exceed twice θ_a·γ_a".into());
        }
        let beta_c = self.commitment_challenge_weight as u64;
        if self.commitment_mask_bound <= 2 * beta_c {
            return fail("commitment_mask_bound must exceed twice θ_c".into());
        }
        for (name, bound, bits) in [
            ("address_secret_bound", self.address_secret_bound, ADDRESS_SECRET_BITS),
            ("address_mask_bound", self.address_mask_bound, ADDRESS_RESPONSE_BITS),
            (
                "commitment_mask_bound",
                self.commitment_mask_bound,
                COMMITMENT_RESPONSE_BITS,
            ),
        ] {
            if signed_width(bound) > bits {
                return fail(format!("{} does not fit a {}-bit encoding", name, bits));
            }
        }
        if self.address_mask_bound >= self.address_ring_modulus / 4
            || self.commitment_mask_bound >= self.commitment_ring_modulus / 4
        {
            return fail("mask bounds must be far below the moduli".into());
        }
        if self.carry_noise_bound <= 2 * self.max_carry_bound() || self.carry_noise_bound >= 1 << 30
        {
            return fail("carry_noise_bound must exceed twice the carry bound".into());
        }

        if self.max_inputs == 0 || self.max_outputs == 0 || self.max_ring_size == 0 {
            return fail("input, output and ring limits must be positive".into());
        }
        if self.max_rejection_attempts == 0 {
            return fail("max_rejection_attempts must be positive".into());
        }
        Ok(())
    }
}

/// Validated and expanded parameter set
#[derive(Debug, Clone)]
pub struct SchemeParameters {
    config: ParameterConfig,
    ring_a: RingContext,
    ring_c: RingContext,
    matrix_a: Vec<Vec<NttPoly>>,
    vector_a: Vec<NttPoly>,
    matrix_b: Vec<Vec<NttPoly>>,
    matrix_h: Vec<Vec<NttPoly>>,
    sigma_powers: Vec<Vec<usize>>,
    monomials: Vec<NttPoly>,
}

impl SchemeParameters {
    /// Validate `config` and expand the public matrices
    pub fn new(config: ParameterConfig) -> Result<Self> {
        config.validate()?;
        let ring_a = RingContext::new(config.address_ring_modulus, config.address_ring_degree)?;
        let ring_c = RingContext::new(
            config.commitment_ring_modulus,
            config.commitment_ring_degree,
        )?;

        let seed = config.public_seed.as_bytes();
        let expand = |ring: &RingContext, name: &[u8], rows: usize, cols: usize| {
            (0..rows)
                .map(|i| {
                    (0..cols)
                        .map(|j| {
                            let (i, j) = ((i as u32).to_le_bytes(), (j as u32).to_le_bytes());
                            Expander::new(b"aingle_ringct.matrix", &[seed, name, &i, &j])
                                .uniform_ntt(ring)
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };

        let l_a = config.address_rows + config.address_lambda + 1;
        let h_count = config.max_inputs + config.max_outputs + 4 + 3;
        let l_c = config.commitment_rows + config.commitment_lambda + h_count;

        let matrix_a = expand(&ring_a, b"A", config.address_rows, l_a);
        let vector_a = expand(&ring_a, b"a", 1, l_a).remove(0);
        let matrix_b = expand(&ring_c, b"B", config.commitment_rows, l_c);
        let matrix_h = expand(&ring_c, b"H", h_count, l_c);

        let k = config.repetitions;
        let d_c = config.commitment_ring_degree;
        let sigma = ring_c.automorphism_permutation(2 * d_c / k + 1)?;
        let mut sigma_powers = vec![(0..d_c).collect::<Vec<_>>()];
        for t in 1..=k {
            let prev = &sigma_powers[t - 1];
            sigma_powers.push(sigma.iter().map(|&j| prev[j]).collect());
        }
        // σ^K must be the identity
        if sigma_powers[k] != sigma_powers[0] {
            return Err(RingCtError::InvalidParameters(
                "automorphism order does not match repetitions".into(),
            ));
        }
        sigma_powers.truncate(k);

        let monomials = (0..k)
            .map(|mu| {
                let mut x = Poly::zero(d_c);
                x.coeffs[mu] = 1;
                ring_c.ntt(&x)
            })
            .collect();

        log::debug!(
            "expanded scheme parameters: l_a={}, l_c={}, h_count={}, K={}",
            l_a,
            l_c,
            h_count,
            k
        );

        Ok(Self {
            config,
            ring_a,
            ring_c,
            matrix_a,
            vector_a,
            matrix_b,
            matrix_h,
            sigma_powers,
            monomials,
        })
    }

    /// Standard parameter set
    pub fn standard() -> Result<Self> {
        Self::new(ParameterConfig::standard())
    }

    /// Configuration these parameters were built from
    pub fn config(&self) -> &ParameterConfig {
        &self.config
    }

    /// Ring A (address keys)
    pub fn ring_a(&self) -> &RingContext {
        &self.ring_a
    }

    /// Ring C (value commitments)
    pub fn ring_c(&self) -> &RingContext {
        &self.ring_c
    }

    /// Address matrix `A` (`k_a × l_a`)
    pub fn matrix_a(&self) -> &[Vec<NttPoly>] {
        &self.matrix_a
    }

    /// Address vector `a` (`l_a`)
    pub fn vector_a(&self) -> &[NttPoly] {
        &self.vector_a
    }

    /// Commitment matrix `B` (`k_c × l_c`)
    pub fn matrix_b(&self) -> &[Vec<NttPoly>] {
        &self.matrix_b
    }

    /// Row `j` of the message matrix `H`
    pub fn h(&self, j: usize) -> &[NttPoly] {
        &self.matrix_h[j]
    }

    /// Row of `H` masking the auxiliary polynomial `g`
    pub(crate) fn h_aux_index(&self) -> usize {
        self.matrix_h.len() - 2
    }

    /// Row of `H` masking the quadratic term `ψ`
    pub(crate) fn h_psi_index(&self) -> usize {
        self.matrix_h.len() - 1
    }

    /// Largest extended message count `n2`
    pub fn max_extended_messages(&self) -> usize {
        self.config.max_inputs + self.config.max_outputs + 4
    }

    /// Address secret length `l_a`
    pub fn l_a(&self) -> usize {
        self.vector_a.len()
    }

    /// Commitment randomness length `l_c`
    pub fn l_c(&self) -> usize {
        self.matrix_b[0].len()
    }

    /// Parallel repetitions `K`
    pub fn repetitions(&self) -> usize {
        self.config.repetitions
    }

    /// Amount bit-width `N`
    pub fn value_bits(&self) -> usize {
        self.config.value_bits
    }

    /// Largest representable amount `V = 2^N - 1`
    pub fn max_value(&self) -> u64 {
        (1u64 << self.config.value_bits) - 1
    }

    /// Bytes of a masked amount
    pub fn masked_value_size(&self) -> usize {
        self.config.value_bits.div_ceil(8)
    }

    /// Accept bound `η_a - β_a` for ring-A responses
    pub fn address_response_bound(&self) -> u64 {
        self.config.address_mask_bound
            - self.config.address_challenge_weight as u64 * self.config.address_secret_bound
    }

    /// Accept bound `η_c - β_c` for ring-C responses
    pub fn commitment_response_bound(&self) -> u64 {
        self.config.commitment_mask_bound - self.config.commitment_challenge_weight as u64
    }

    /// Slot permutation for `σ^t` (`t` taken mod `K`)
    pub(crate) fn sigma(&self, t: usize) -> &[usize] {
        &self.sigma_powers[t % self.config.repetitions]
    }

    /// Slot permutation for `σ^{-t}`
    pub(crate) fn sigma_inv(&self, t: usize) -> &[usize] {
        let k = self.config.repetitions;
        &self.sigma_powers[(k - t % k) % k]
    }

    /// `σ^t(p)`
    pub(crate) fn apply_sigma(&self, p: &NttPoly, t: usize) -> NttPoly {
        permute(p, self.sigma(t))
    }

    /// NTT form of `X^μ`
    pub(crate) fn monomial(&self, mu: usize) -> &NttPoly {
        &self.monomials[mu]
    }
}

/// Bits of a two's-complement field holding `[-bound, bound]`
fn signed_width(bound: u64) -> u32 {
    64 - bound.leading_zeros() + 1
}
