//! Aggregate range and balance proof
//!
//! One non-interactive proof shows, for a whole transaction, that
//!
//! - every linked commitment `(b_i, c_i)` carries the same message as the
//!   matching slot `ĉ_i` of the aggregate commitment `(b̂, ĉ)`,
//! - the first `n1` aggregate messages are bit strings, so each amount lies
//!   in `[0, 2^N)`,
//! - the aggregate messages satisfy the linear balance predicate of the
//!   [`RelationLayout`] under the public binary matrix and `u'`.
//!
//! Soundness is amplified with `K` parallel rounds that use the challenge
//! rotations `σ^t(c)`. The quadratic (bit) check contributes `ψ`, the linear
//! check is masked by the auxiliary polynomial `g` whose low `K` coefficients
//! are zero, and both are folded into a single challenge seed.
//!
//! ## Example
//!
//! ```text
//! prove:   masks y, ŷ, g  →  seed1  →  α, γ  →  ψ, φ  →  ch_seed  →  z, ẑ
//! verify:  recompute w, ŵ, δ̃, δ̂ from z, ẑ  →  seed1  →  ψ', φ'  →  compare
//! ```

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{
    hex_seed, packed_size, poly_c_size, put_packed_vec, put_poly_c_vec, varint_size, Decode,
    Encode, Reader, Writer, COMMITMENT_RESPONSE_BITS,
};
use crate::commitment::CommitmentNtt;
use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::relation::{binary_matrix_seed, AggregateCommitment, BinaryMatrix, RelationLayout};
use crate::response::ResponseGrid;
use crate::ring::{mul_mod, permute, pow_mod, vec_infinity_norm, NttPoly, Poly};
use crate::sampling::{
    challenge_from_seed, sample_bounded_vec, sample_uniform_low_zero, Expander, Seed,
};
use crate::transcript::Transcript;

/// Aggregate proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpulpProof {
    /// `c̃_i = <h_{i+1}, r_i> + m_i`, one per linked commitment
    pub c_waves: Vec<Poly>,
    /// `<h_G, r̂> + g`
    pub c_hat_g: Poly,
    /// Linear part of the bit check
    pub psi: Poly,
    /// Masked linear predicate; the low `K` coefficients are zero
    pub phi: Poly,
    /// Challenge seed
    #[serde(with = "hex_seed")]
    pub ch_seed: Seed,
    /// Responses for the linked commitments (`n × K`)
    pub cmt_zs: ResponseGrid,
    /// Responses for the aggregate commitment (one per round)
    pub zs: Vec<Vec<Poly>>,
}

/// Public side of an aggregate statement
pub(crate) struct Statement<'a> {
    pub layout: &'a RelationLayout,
    pub commitments: &'a [CommitmentNtt],
    pub b_hat: &'a [NttPoly],
    pub c_hats: &'a [NttPoly],
    pub bin_matrix: &'a BinaryMatrix,
    pub u_p: &'a [i64],
}

/// First-round prover messages (or their verifier reconstruction)
struct FirstRound {
    w: Vec<Vec<Vec<NttPoly>>>,
    w_hat: Vec<Vec<NttPoly>>,
    delta_wave: Vec<Vec<NttPoly>>,
    delta_hat: Vec<Vec<NttPoly>>,
}

/// Verifier randomness derived from the first round
struct Folding {
    alpha: Vec<NttPoly>,
    gammas: Vec<(Vec<NttPoly>, NttPoly)>,
}

fn first_seed(
    params: &SchemeParameters,
    body: &[u8],
    st: &Statement<'_>,
    c_waves: &[NttPoly],
    c_hat_g: &NttPoly,
    round: &FirstRound,
) -> Seed {
    let mut t = Transcript::new(b"aingle_ringct.rpulp");
    t.append_bytes(b"body", body);
    t.append_u64(b"kind", st.layout.kind.tag());
    t.append_u64(b"inputs", st.layout.input_count as u64);
    t.append_u64(b"outputs", st.layout.output_count as u64);
    t.append_u64(b"public_value", st.layout.public_value);
    st.bin_matrix.append_to(&mut t);
    t.append_i64s(b"u_p", st.u_p);
    for cmt in st.commitments {
        t.append_ntt_vec(b"b", &cmt.b);
        t.append_ntt(b"c", &cmt.c);
    }
    t.append_ntt_vec(b"b_hat", st.b_hat);
    t.append_ntt_vec(b"c_hats", st.c_hats);
    t.append_ntt_vec(b"c_waves", c_waves);
    t.append_ntt(b"c_hat_g", c_hat_g);
    for r in 0..params.repetitions() {
        for w in &round.w[r] {
            t.append_ntt_vec(b"w", w);
        }
        t.append_ntt_vec(b"w_hat", &round.w_hat[r]);
        t.append_ntt_vec(b"delta_wave", &round.delta_wave[r]);
        t.append_ntt_vec(b"delta_hat", &round.delta_hat[r]);
    }
    t.finish()
}

fn challenge_seed(
    seed1: &Seed,
    psi: &NttPoly,
    psi_p: &NttPoly,
    phi: &NttPoly,
    phi_p: &NttPoly,
) -> Seed {
    let mut t = Transcript::new(b"aingle_ringct.rpulp.challenge");
    t.append_bytes(b"seed1", seed1);
    t.append_ntt(b"psi", psi);
    t.append_ntt(b"psi_p", psi_p);
    t.append_ntt(b"phi", phi);
    t.append_ntt(b"phi_p", phi_p);
    t.finish()
}

fn fold(params: &SchemeParameters, seed1: &Seed, st: &Statement<'_>) -> Folding {
    let ring = params.ring_c();
    let q = ring.modulus();
    let d_inv = pow_mod(ring.degree() as u64, q - 2, q);
    let eq = st.layout.equation_count(params);

    let alpha = (0..st.layout.n1)
        .map(|j| {
            Expander::new(b"aingle_ringct.rpulp.alpha", &[seed1, &(j as u32).to_le_bytes()])
                .uniform_ntt(ring)
        })
        .collect();
    let gammas = (0..params.repetitions())
        .map(|mu| {
            let mut exp =
                Expander::new(b"aingle_ringct.rpulp.gamma", &[seed1, &(mu as u32).to_le_bytes()]);
            let gamma: Vec<u64> = (0..eq).map(|_| exp.uniform_mod(q)).collect();
            let (coeffs, target) =
                st.layout
                    .linear_coefficients(params, &gamma, st.bin_matrix, st.u_p);
            (coeffs, ring.constant(mul_mod(target, d_inv, q)))
        })
        .collect();
    Folding { alpha, gammas }
}

/// `Σ_μ X^μ · Σ_ν σ^ν(term(μ, ν))`
fn rotate_sum(
    params: &SchemeParameters,
    mut term: impl FnMut(usize, usize) -> NttPoly,
) -> NttPoly {
    let ring = params.ring_c();
    let k = params.repetitions();
    let mut out = ring.zero();
    for mu in 0..k {
        let mut inner = ring.zero();
        for nu in 0..k {
            ring.add_assign(&mut inner, &params.apply_sigma(&term(mu, nu), nu));
        }
        ring.mul_add_assign(&mut out, params.monomial(mu), &inner);
    }
    out
}

fn sigma_inv(params: &SchemeParameters, p: &NttPoly, t: usize) -> NttPoly {
    permute(p, params.sigma_inv(t))
}

fn challenges(params: &SchemeParameters, ch_seed: &Seed) -> (NttPoly, Vec<NttPoly>) {
    let ring = params.ring_c();
    let c = ring.ntt(&challenge_from_seed(
        ch_seed,
        b"aingle_ringct.rpulp.c",
        ring.degree(),
        params.config().commitment_challenge_weight,
    ));
    let rotated = (0..params.repetitions())
        .map(|t| params.apply_sigma(&c, t))
        .collect();
    (c, rotated)
}

/// Prove the aggregate statement
///
/// `openings[i]` is the randomness of `commitments[i]`, whose message must be
/// the `i`-th extended message in `agg`.
pub(crate) fn prove<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    body: &[u8],
    layout: &RelationLayout,
    commitments: &[CommitmentNtt],
    openings: &[Vec<NttPoly>],
    agg: &AggregateCommitment,
) -> Result<RpulpProof> {
    let ring = params.ring_c();
    let d = ring.degree();
    let k = params.repetitions();
    let l_c = params.l_c();
    let n = layout.n;
    if commitments.len() != n || openings.len() != n || agg.messages.len() != layout.n2 {
        return Err(RingCtError::InternalFault(
            "aggregate proof witness does not match its layout".into(),
        ));
    }
    let eta = params.config().commitment_mask_bound;
    let bound = params.commitment_response_bound();
    let h_g = params.h(params.h_aux_index());
    let h_psi = params.h(params.h_psi_index());
    let h_diff: Vec<Vec<NttPoly>> = (0..n)
        .map(|i| ring.vec_sub(params.h(0), params.h(i + 1)))
        .collect();

    let c_waves: Vec<NttPoly> = (0..n)
        .map(|i| ring.add(&ring.inner_product(params.h(i + 1), &openings[i]), &agg.messages[i]))
        .collect();
    let st = Statement {
        layout,
        commitments,
        b_hat: &agg.b_hat,
        c_hats: &agg.c_hats,
        bin_matrix: &agg.bin_matrix,
        u_p: &agg.u_p,
    };
    let one = ring.constant(1);
    let bit_factors: Vec<NttPoly> = agg.messages[..layout.n1]
        .iter()
        .map(|m| ring.sub(&one, &ring.scale(m, 2)))
        .collect();

    let attempts = params.config().max_rejection_attempts;
    for attempt in 0..attempts {
        let mut draw = || ring.ntt_vec(&sample_bounded_vec(&mut *rng, l_c, d, eta));
        let ys: Vec<Vec<Vec<NttPoly>>> = (0..k).map(|_| (0..n).map(|_| draw()).collect()).collect();
        let y_hats: Vec<Vec<NttPoly>> = (0..k).map(|_| draw()).collect();
        let g = ring.ntt(&sample_uniform_low_zero(rng, ring, k));
        let c_hat_g = ring.add(&ring.inner_product(h_g, &agg.r_hat), &g);

        let round = FirstRound {
            w: ys
                .iter()
                .map(|yt| yt.iter().map(|y| ring.mat_vec(params.matrix_b(), y)).collect())
                .collect(),
            w_hat: y_hats
                .iter()
                .map(|y| ring.mat_vec(params.matrix_b(), y))
                .collect(),
            delta_wave: ys
                .iter()
                .map(|yt| {
                    yt.iter()
                        .enumerate()
                        .map(|(i, y)| ring.inner_product(&h_diff[i], y))
                        .collect()
                })
                .collect(),
            delta_hat: ys
                .iter()
                .zip(&y_hats)
                .map(|(yt, y_hat)| {
                    yt.iter()
                        .enumerate()
                        .map(|(i, y)| ring.inner_product(params.h(i + 1), &ring.vec_sub(y_hat, y)))
                        .collect()
                })
                .collect(),
        };
        let seed1 = first_seed(params, body, &st, &c_waves, &c_hat_g, &round);
        let folding = fold(params, &seed1, &st);

        // a[t][j] = <h_{j+1}, ŷ_t>
        let a: Vec<Vec<NttPoly>> = y_hats
            .iter()
            .map(|y_hat| {
                (0..layout.n2)
                    .map(|j| ring.inner_product(params.h(j + 1), y_hat))
                    .collect()
            })
            .collect();

        let mut psi = ring.inner_product(h_psi, &agg.r_hat);
        let mut psi_p = ring.inner_product(h_psi, &y_hats[0]);
        for (t, at) in a.iter().enumerate() {
            let mut linear = ring.zero();
            let mut quadratic = ring.zero();
            for j in 0..layout.n1 {
                let weighted = ring.mul(&folding.alpha[j], &at[j]);
                ring.mul_add_assign(&mut linear, &weighted, &bit_factors[j]);
                ring.mul_add_assign(&mut quadratic, &weighted, &at[j]);
            }
            ring.add_assign(&mut psi, &sigma_inv(params, &linear, t));
            ring.add_assign(&mut psi_p, &sigma_inv(params, &quadratic, t));
        }

        let big_psi = rotate_sum(params, |mu, _| {
            let (coeffs, u) = &folding.gammas[mu];
            ring.sub(&ring.inner_product(coeffs, &agg.messages), u)
        });
        let a_hat = rotate_sum(params, |mu, nu| {
            ring.inner_product(&folding.gammas[mu].0, &a[(k - nu) % k])
        });
        let phi = ring.add(&big_psi, &g);
        let phi_p = ring.add(&a_hat, &ring.inner_product(h_g, &y_hats[0]));

        let ch_seed = challenge_seed(&seed1, &psi, &psi_p, &phi, &phi_p);
        let (_, rotated) = challenges(params, &ch_seed);

        let cmt_zs = ResponseGrid::from_fn(n, k, |i, t| {
            ring.intt_vec(&ring.vec_add(&ys[t][i], &ring.scale_vec(&rotated[t], &openings[i])))
        });
        let zs: Vec<Vec<Poly>> = (0..k)
            .map(|t| {
                ring.intt_vec(&ring.vec_add(&y_hats[t], &ring.scale_vec(&rotated[t], &agg.r_hat)))
            })
            .collect();

        let norm = cmt_zs
            .infinity_norm()
            .max(zs.iter().map(|z| vec_infinity_norm(z)).max().unwrap_or(0));
        if norm <= bound {
            return Ok(RpulpProof {
                c_waves: ring.intt_vec(&c_waves),
                c_hat_g: ring.intt(&c_hat_g),
                psi: ring.intt(&psi),
                phi: ring.intt(&phi),
                ch_seed,
                cmt_zs,
                zs,
            });
        }
        log::debug!("rpulp: response norm {} over bound, restart {}", norm, attempt + 1);
    }
    Err(RingCtError::RestartLimitExceeded {
        stage: "rpulp",
        attempts,
    })
}

/// Verify an aggregate proof
///
/// The binary matrix is re-expanded from `body` and the aggregate
/// commitment. Malformed inputs are errors; a proof that does not verify
/// yields `Ok(false)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify(
    params: &SchemeParameters,
    body: &[u8],
    layout: &RelationLayout,
    commitments: &[CommitmentNtt],
    b_hat: &[Poly],
    c_hats: &[Poly],
    u_p: &[i64],
    proof: &RpulpProof,
) -> Result<bool> {
    let ring = params.ring_c();
    let d = ring.degree();
    let k = params.repetitions();
    let l_c = params.l_c();
    let n = layout.n;

    let poly_ok = |p: &Poly| p.len() == d;
    if commitments.len() != n {
        return Err(RingCtError::structural("commitments", "count does not match layout"));
    }
    if b_hat.len() != params.config().commitment_rows
        || !b_hat.iter().all(poly_ok)
        || c_hats.len() != layout.n2
        || !c_hats.iter().all(poly_ok)
    {
        return Err(RingCtError::structural("aggregate_commitment", "malformed"));
    }
    if u_p.len() != d {
        return Err(RingCtError::structural("u_p", "wrong length"));
    }
    if proof.c_waves.len() != n
        || !proof.c_waves.iter().all(poly_ok)
        || !poly_ok(&proof.c_hat_g)
        || !poly_ok(&proof.psi)
        || !poly_ok(&proof.phi)
        || proof.zs.len() != k
        || proof
            .zs
            .iter()
            .any(|z| z.len() != l_c || !z.iter().all(poly_ok))
    {
        return Err(RingCtError::structural("rpulp", "malformed proof"));
    }
    proof.cmt_zs.check_shape(n, k, l_c, d, "rpulp.cmt_zs")?;

    let bound = params.commitment_response_bound();
    let norm = proof
        .cmt_zs
        .infinity_norm()
        .max(proof.zs.iter().map(|z| vec_infinity_norm(z)).max().unwrap_or(0));
    if norm > bound {
        log::debug!("rpulp: response norm {} over bound {}", norm, bound);
        return Ok(false);
    }
    if u_p.iter().any(|x| x.unsigned_abs() > layout.noise_limit(params)) {
        log::debug!("rpulp: u' over bound");
        return Ok(false);
    }
    if proof.phi.coeffs[..k].iter().any(|&x| x != 0) {
        log::debug!("rpulp: phi has non-zero low coefficients");
        return Ok(false);
    }

    let b_hat = ring.ntt_vec(b_hat);
    let c_hats = ring.ntt_vec(c_hats);
    let seed = binary_matrix_seed(body, &b_hat, &c_hats);
    let bin_matrix = BinaryMatrix::expand(&seed, d, layout.carry_columns(params));
    let st = Statement {
        layout,
        commitments,
        b_hat: &b_hat,
        c_hats: &c_hats,
        bin_matrix: &bin_matrix,
        u_p,
    };

    let c_waves = ring.ntt_vec(&proof.c_waves);
    let c_hat_g = ring.ntt(&proof.c_hat_g);
    let psi = ring.ntt(&proof.psi);
    let phi = ring.ntt(&proof.phi);
    let (c, rotated) = challenges(params, &proof.ch_seed);
    let cmt_zs: Vec<Vec<Vec<NttPoly>>> = (0..k)
        .map(|t| (0..n).map(|i| ring.ntt_vec(proof.cmt_zs.get(i, t))).collect())
        .collect();
    let zs: Vec<Vec<NttPoly>> = proof.zs.iter().map(|z| ring.ntt_vec(z)).collect();

    let round = FirstRound {
        w: (0..k)
            .map(|t| {
                (0..n)
                    .map(|i| {
                        ring.vec_sub(
                            &ring.mat_vec(params.matrix_b(), &cmt_zs[t][i]),
                            &ring.scale_vec(&rotated[t], &commitments[i].b),
                        )
                    })
                    .collect()
            })
            .collect(),
        w_hat: (0..k)
            .map(|t| {
                ring.vec_sub(
                    &ring.mat_vec(params.matrix_b(), &zs[t]),
                    &ring.scale_vec(&rotated[t], &b_hat),
                )
            })
            .collect(),
        delta_wave: (0..k)
            .map(|t| {
                (0..n)
                    .map(|i| {
                        let h_diff = ring.vec_sub(params.h(0), params.h(i + 1));
                        ring.sub(
                            &ring.inner_product(&h_diff, &cmt_zs[t][i]),
                            &ring.mul(&rotated[t], &ring.sub(&commitments[i].c, &c_waves[i])),
                        )
                    })
                    .collect()
            })
            .collect(),
        delta_hat: (0..k)
            .map(|t| {
                (0..n)
                    .map(|i| {
                        ring.sub(
                            &ring.inner_product(
                                params.h(i + 1),
                                &ring.vec_sub(&zs[t], &cmt_zs[t][i]),
                            ),
                            &ring.mul(&rotated[t], &ring.sub(&c_hats[i], &c_waves[i])),
                        )
                    })
                    .collect()
            })
            .collect(),
    };
    let seed1 = first_seed(params, body, &st, &c_waves, &c_hat_g, &round);
    let folding = fold(params, &seed1, &st);

    // f[t][j] = <h_{j+1}, ẑ_t> - σ^t(c)·ĉ_j
    let f: Vec<Vec<NttPoly>> = (0..k)
        .map(|t| {
            (0..layout.n2)
                .map(|j| {
                    ring.sub(
                        &ring.inner_product(params.h(j + 1), &zs[t]),
                        &ring.mul(&rotated[t], &c_hats[j]),
                    )
                })
                .collect()
        })
        .collect();

    let h_psi = params.h(params.h_psi_index());
    let mut psi_p = ring.sub(&ring.inner_product(h_psi, &zs[0]), &ring.mul(&c, &psi));
    for (t, ft) in f.iter().enumerate() {
        let mut acc = ring.zero();
        for j in 0..layout.n1 {
            let shifted = ring.add(&ft[j], &rotated[t]);
            ring.mul_add_assign(&mut acc, &ring.mul(&folding.alpha[j], &ft[j]), &shifted);
        }
        ring.add_assign(&mut psi_p, &sigma_inv(params, &acc, t));
    }

    let lambda = rotate_sum(params, |mu, nu| {
        let t = (k - nu) % k;
        let (coeffs, u) = &folding.gammas[mu];
        ring.add(&ring.inner_product(coeffs, &f[t]), &ring.mul(&rotated[t], u))
    });
    let h_g = params.h(params.h_aux_index());
    let phi_p = ring.add(
        &ring.add(&lambda, &ring.inner_product(h_g, &zs[0])),
        &ring.sub(&ring.mul(&c, &phi), &ring.mul(&c, &c_hat_g)),
    );

    let ok = challenge_seed(&seed1, &psi, &psi_p, &phi, &phi_p) == proof.ch_seed;
    if !ok {
        log::debug!("rpulp: challenge seed mismatch");
    }
    Ok(ok)
}

impl Encode for RpulpProof {
    fn encoded_size(&self) -> usize {
        let d = self.psi.len();
        let response =
            self.zs.first().map_or(0, |z| z.len()) * packed_size(d, COMMITMENT_RESPONSE_BITS);
        varint_size(self.c_waves.len() as u64)
            + (self.c_waves.len() + 3) * poly_c_size(d)
            + 64
            + (self.cmt_zs.rows() + 1) * self.cmt_zs.rounds() * response
    }

    fn encode(&self, w: &mut Writer) {
        w.put_varint(self.c_waves.len() as u64);
        put_poly_c_vec(w, &self.c_waves);
        w.put_poly_c(&self.c_hat_g);
        w.put_poly_c(&self.psi);
        w.put_poly_c(&self.phi);
        w.put_seed(&self.ch_seed);
        self.cmt_zs.encode_packed(w, COMMITMENT_RESPONSE_BITS);
        for z in &self.zs {
            put_packed_vec(w, z, COMMITMENT_RESPONSE_BITS);
        }
    }
}

impl Decode for RpulpProof {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let max = params.config().max_inputs + params.config().max_outputs;
        let n = r.get_count("rpulp.n", max)?;
        let k = params.repetitions();
        let c_waves = params.read_poly_c_vec(r, n, "rpulp.c_waves")?;
        let c_hat_g = params.read_poly_c(r, "rpulp.c_hat_g")?;
        let psi = params.read_poly_c(r, "rpulp.psi")?;
        let phi = params.read_poly_c(r, "rpulp.phi")?;
        let ch_seed = r.get_seed("rpulp.ch_seed")?;
        let cmt_zs = ResponseGrid::decode_commitment_responses(params, r, n, k, "rpulp.cmt_zs")?;
        let zs = (0..k)
            .map(|_| params.read_commitment_response(r, "rpulp.zs"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            c_waves,
            c_hat_g,
            psi,
            phi,
            ch_seed,
            cmt_zs,
            zs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_with, value_message};
    use crate::relation::{amount_slots, commit_extended};
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    struct Fixture {
        layout: RelationLayout,
        commitments: Vec<CommitmentNtt>,
        agg: AggregateCommitment,
        proof: RpulpProof,
    }

    /// Commit to `linked` amounts and prove them against `layout`
    fn fixture(layout: RelationLayout, linked: &[u64], extra: &[u64]) -> Fixture {
        let p = params();
        let ring = p.ring_c();
        let openings: Vec<Vec<NttPoly>> = linked
            .iter()
            .map(|_| ring.ntt_vec(&sample_bounded_vec(&mut OsRng, p.l_c(), ring.degree(), 1)))
            .collect();
        let commitments: Vec<CommitmentNtt> = linked
            .iter()
            .zip(&openings)
            .map(|(&v, r)| commit_with(p, r, &value_message(p, v)))
            .collect();

        let mut messages: Vec<Vec<u64>> = linked
            .iter()
            .chain(extra)
            .map(|&v| amount_slots(p, v))
            .collect();
        while messages.len() + 1 < layout.n2 {
            messages.push(amount_slots(p, 0));
        }
        let carries = layout.carries(p, &messages).unwrap();
        for (rel, f) in layout.relations.iter().zip(carries) {
            messages[rel.carry] = f;
        }
        let agg = commit_extended(p, &mut OsRng, &layout, b"body", &messages, "test").unwrap();
        let proof = prove(p, &mut OsRng, b"body", &layout, &commitments, &openings, &agg).unwrap();
        Fixture {
            layout,
            commitments,
            agg,
            proof,
        }
    }

    fn check(
        fx: &Fixture,
        body: &[u8],
        layout: &RelationLayout,
        proof: &RpulpProof,
    ) -> Result<bool> {
        let ring = params().ring_c();
        verify(
            params(),
            body,
            layout,
            &fx.commitments,
            &ring.intt_vec(&fx.agg.b_hat),
            &ring.intt_vec(&fx.agg.c_hats),
            &fx.agg.u_p,
            proof,
        )
    }

    #[test]
    fn test_coinbase_statement_verifies() {
        let layout = RelationLayout::coinbase(params(), 2, 512).unwrap();
        let fx = fixture(layout, &[256, 256], &[]);
        assert!(check(&fx, b"body", &fx.layout, &fx.proof).unwrap());
        assert!(fx.proof.phi.coeffs[..params().repetitions()]
            .iter()
            .all(|&x| x == 0));
    }

    #[test]
    fn test_transfer_statements_verify() {
        let layout = RelationLayout::transfer(params(), 1, 2, 10).unwrap();
        let fx = fixture(layout, &[256, 200, 46], &[]);
        assert!(check(&fx, b"body", &fx.layout, &fx.proof).unwrap());

        let layout = RelationLayout::transfer(params(), 2, 2, 7).unwrap();
        let fx = fixture(layout, &[500, 507, 1000, 0], &[1007]);
        assert!(check(&fx, b"body", &fx.layout, &fx.proof).unwrap());
    }

    #[test]
    fn test_wrong_statement_rejected() {
        let layout = RelationLayout::coinbase(params(), 2, 512).unwrap();
        let fx = fixture(layout, &[256, 256], &[]);

        let other = RelationLayout::coinbase(params(), 2, 513).unwrap();
        assert!(!check(&fx, b"body", &other, &fx.proof).unwrap());
        assert!(!check(&fx, b"other body", &fx.layout, &fx.proof).unwrap());
    }

    #[test]
    fn test_tampered_proof_rejected() {
        let layout = RelationLayout::coinbase(params(), 2, 512).unwrap();
        let fx = fixture(layout, &[256, 256], &[]);

        let mut proof = fx.proof.clone();
        proof.cmt_zs.get_mut(0, 1)[3].coeffs[7] += 1;
        assert!(!check(&fx, b"body", &fx.layout, &proof).unwrap());

        let mut proof = fx.proof.clone();
        proof.psi.coeffs[0] += 1;
        assert!(!check(&fx, b"body", &fx.layout, &proof).unwrap());

        let mut proof = fx.proof.clone();
        proof.phi.coeffs[1] = 1;
        assert!(!check(&fx, b"body", &fx.layout, &proof).unwrap());

        let mut proof = fx.proof.clone();
        proof.zs[2][0].coeffs[0] = params().commitment_response_bound() as i64 + 1;
        assert!(!check(&fx, b"body", &fx.layout, &proof).unwrap());
    }

    #[test]
    fn test_malformed_proof_is_an_error() {
        let layout = RelationLayout::coinbase(params(), 2, 512).unwrap();
        let fx = fixture(layout, &[256, 256], &[]);
        let mut proof = fx.proof.clone();
        proof.c_waves.pop();
        assert!(matches!(
            check(&fx, b"body", &fx.layout, &proof),
            Err(RingCtError::Structural { .. })
        ));
    }

    #[test]
    fn test_proof_encoding() {
        let layout = RelationLayout::coinbase(params(), 3, 600).unwrap();
        let fx = fixture(layout, &[100, 200, 300], &[]);
        let bytes = fx.proof.to_bytes();
        assert_eq!(bytes.len(), fx.proof.encoded_size());
        let decoded = RpulpProof::from_bytes(params(), &bytes).unwrap();
        assert_eq!(decoded, fx.proof);
        assert!(check(&fx, b"body", &fx.layout, &decoded).unwrap());

        assert!(RpulpProof::from_bytes(params(), &bytes[..bytes.len() - 1]).is_err());
    }
}
