//! Extractable linkable ring signature (ELRS)
//!
//! Signs a transaction body on behalf of one member of a ring of ledger
//! outputs. Besides knowledge of the member's address secret, the signature
//! proves that
//!
//! - the revealed key image `ma'` belongs to that member, via
//!   `<a, s> = e_j + kidr_j - ma'`,
//! - the fresh proof commitment `(b', c')` hides the same amount as the
//!   member's output commitment `(b_j, c_j)`.
//!
//! Each member carries its own 64-byte seed. For every member but the signer
//! the seed and responses are sampled and the first-round commitments are
//! obtained by rearranging the verification equations; the signer's seed
//! closes the ring:
//!
//! ```text
//! seed_s = H(transcript) ⊕ (⊕_{j ≠ s} seed_j)
//! ```
//!
//! Verification accepts iff the XOR of all seeds equals the recomputed hash.

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::codec::{
    hex_seeds, packed_size, put_packed_vec, varint_size, Decode, Encode, Reader, Writer,
    ADDRESS_RESPONSE_BITS, COMMITMENT_RESPONSE_BITS,
};
use crate::commitment::{LedgerTxo, ValueCommitment};
use crate::error::{Result, RingCtError};
use crate::keys::AddressSecretKey;
use crate::params::SchemeParameters;
use crate::response::ResponseGrid;
use crate::ring::{vec_infinity_norm, NttPoly, Poly};
use crate::sampling::{challenge_from_seed, random_seed, sample_bounded_vec, Seed};
use crate::serial::expand_kidr;
use crate::transcript::Transcript;

/// Ring signature over a transaction body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElrsSignature {
    /// One seed per ring member
    #[serde(with = "hex_seeds")]
    pub seeds: Vec<Seed>,
    /// Ring-A responses, one vector per member
    pub z_as: Vec<Vec<Poly>>,
    /// Ring-C responses for the member commitments (member × round)
    pub z_cs: ResponseGrid,
    /// Ring-C responses for the proof commitment (member × round)
    pub z_cps: ResponseGrid,
}

/// What a ring signature is checked against
pub(crate) struct ElrsStatement<'a> {
    pub ring: &'a [LedgerTxo],
    pub key_image: &'a Poly,
    pub proof_commitment: &'a ValueCommitment,
    pub message: &'a [u8],
}

impl ElrsStatement<'_> {
    /// Check the ring and the published values have the shapes the
    /// parameters fix
    fn check_shape(&self, params: &SchemeParameters) -> Result<()> {
        if self.ring.is_empty() || self.ring.len() > params.config().max_ring_size {
            return Err(RingCtError::structural("ring", "size outside the allowed range"));
        }
        for member in self.ring {
            member
                .txo
                .address_public_key
                .check_shape(params, "ring.address_public_key")?;
            member
                .txo
                .value_commitment
                .check_shape(params, "ring.value_commitment")?;
        }
        if self.key_image.len() != params.ring_a().degree() {
            return Err(RingCtError::structural("key_image", "wrong degree"));
        }
        self.proof_commitment.check_shape(params, "proof_commitment")
    }
}

/// Signer's secrets
pub(crate) struct ElrsSigner<'a> {
    pub index: usize,
    pub address_secret_key: &'a AddressSecretKey,
    /// Randomness of the signer's output commitment
    pub commitment_randomness: &'a [NttPoly],
    /// Randomness of the proof commitment
    pub proof_randomness: &'a [NttPoly],
}

/// Public data of one ring member, in NTT form
struct MemberPublic {
    t: Vec<NttPoly>,
    /// `e_j + kidr_j - ma'`
    e_shift: NttPoly,
    b: Vec<NttPoly>,
    /// `c_j - c'`
    c_diff: NttPoly,
}

/// Responses of one member, in NTT form
struct MemberResponse {
    z_a: Vec<NttPoly>,
    z_c: Vec<Vec<NttPoly>>,
    z_cp: Vec<Vec<NttPoly>>,
}

/// First-round commitments of one member
struct MemberRound {
    w_a: Vec<NttPoly>,
    delta_a: NttPoly,
    w_c: Vec<Vec<NttPoly>>,
    w_cp: Vec<Vec<NttPoly>>,
    delta_c: Vec<NttPoly>,
}

struct Context {
    members: Vec<MemberPublic>,
    key_image: NttPoly,
    b_p: Vec<NttPoly>,
    c_p: NttPoly,
}

fn context(params: &SchemeParameters, st: &ElrsStatement<'_>) -> Context {
    let ring_a = params.ring_a();
    let ring_c = params.ring_c();
    let key_image = ring_a.ntt(st.key_image);
    let b_p = ring_c.ntt_vec(&st.proof_commitment.b);
    let c_p = ring_c.ntt(&st.proof_commitment.c);

    let members = st
        .ring
        .par_iter()
        .map(|lgtxo| {
            let apk = &lgtxo.txo.address_public_key;
            let cmt = &lgtxo.txo.value_commitment;
            let e_kidr = ring_a.add(&ring_a.ntt(&apk.e), &expand_kidr(params, lgtxo));
            MemberPublic {
                t: ring_a.ntt_vec(&apk.t),
                e_shift: ring_a.sub(&e_kidr, &key_image),
                b: ring_c.ntt_vec(&cmt.b),
                c_diff: ring_c.sub(&ring_c.ntt(&cmt.c), &c_p),
            }
        })
        .collect();
    Context {
        members,
        key_image,
        b_p,
        c_p,
    }
}

/// Ring-A and rotated ring-C challenges of a member seed
fn member_challenges(params: &SchemeParameters, seed: &Seed) -> (NttPoly, Vec<NttPoly>) {
    let cfg = params.config();
    let ch_a = params.ring_a().ntt(&challenge_from_seed(
        seed,
        b"aingle_ringct.elrs.a",
        cfg.address_ring_degree,
        cfg.address_challenge_weight,
    ));
    let ch_c = params.ring_c().ntt(&challenge_from_seed(
        seed,
        b"aingle_ringct.elrs.c",
        cfg.commitment_ring_degree,
        cfg.commitment_challenge_weight,
    ));
    let rotated = (0..params.repetitions())
        .map(|t| params.apply_sigma(&ch_c, t))
        .collect();
    (ch_a, rotated)
}

/// First-round commitments implied by a seed and responses
fn rearrange(
    params: &SchemeParameters,
    ctx: &Context,
    member: &MemberPublic,
    seed: &Seed,
    z: &MemberResponse,
) -> MemberRound {
    let ring_a = params.ring_a();
    let ring_c = params.ring_c();
    let (ch_a, rotated) = member_challenges(params, seed);

    let w_a = ring_a.vec_sub(
        &ring_a.mat_vec(params.matrix_a(), &z.z_a),
        &ring_a.scale_vec(&ch_a, &member.t),
    );
    let delta_a = ring_a.sub(
        &ring_a.inner_product(params.vector_a(), &z.z_a),
        &ring_a.mul(&ch_a, &member.e_shift),
    );
    let mut w_c = Vec::with_capacity(rotated.len());
    let mut w_cp = Vec::with_capacity(rotated.len());
    let mut delta_c = Vec::with_capacity(rotated.len());
    for (t, ch) in rotated.iter().enumerate() {
        w_c.push(ring_c.vec_sub(
            &ring_c.mat_vec(params.matrix_b(), &z.z_c[t]),
            &ring_c.scale_vec(ch, &member.b),
        ));
        w_cp.push(ring_c.vec_sub(
            &ring_c.mat_vec(params.matrix_b(), &z.z_cp[t]),
            &ring_c.scale_vec(ch, &ctx.b_p),
        ));
        delta_c.push(ring_c.sub(
            &ring_c.inner_product(params.h(0), &ring_c.vec_sub(&z.z_c[t], &z.z_cp[t])),
            &ring_c.mul(ch, &member.c_diff),
        ));
    }
    MemberRound {
        w_a,
        delta_a,
        w_c,
        w_cp,
        delta_c,
    }
}

fn xor_into(acc: &mut Seed, seed: &Seed) {
    for (a, b) in acc.iter_mut().zip(seed) {
        *a ^= b;
    }
}

/// Sign `st.message` as ring member `signer.index`
pub(crate) fn sign<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    st: &ElrsStatement<'_>,
    signer: &ElrsSigner<'_>,
) -> Result<ElrsSignature> {
    let ring_a = params.ring_a();
    let ring_c = params.ring_c();
    let (d_a, d_c) = (ring_a.degree(), ring_c.degree());
    let (l_a, l_c) = (params.l_a(), params.l_c());
    let k = params.repetitions();
    st.check_shape(params)?;
    let size = st.ring.len();
    if signer.index >= size {
        return Err(RingCtError::InternalFault("signer index outside the ring".into()));
    }
    let bound_a = params.address_response_bound();
    let bound_c = params.commitment_response_bound();
    let ctx = context(params, st);

    // Simulated members: seeds and in-bound responses drawn up front
    let mut seeds: Vec<Seed> = (0..size).map(|_| random_seed(&mut *rng)).collect();
    let mut z_as: Vec<Vec<Poly>> = (0..size)
        .map(|_| sample_bounded_vec(&mut *rng, l_a, d_a, bound_a))
        .collect();
    let mut z_cs = ResponseGrid::from_fn(size, k, |_, _| {
        sample_bounded_vec(&mut *rng, l_c, d_c, bound_c)
    });
    let mut z_cps = ResponseGrid::from_fn(size, k, |_, _| {
        sample_bounded_vec(&mut *rng, l_c, d_c, bound_c)
    });

    let to_ntt = |j: usize, z_as: &[Vec<Poly>], z_cs: &ResponseGrid, z_cps: &ResponseGrid| {
        MemberResponse {
            z_a: ring_a.ntt_vec(&z_as[j]),
            z_c: (0..k).map(|t| ring_c.ntt_vec(z_cs.get(j, t))).collect(),
            z_cp: (0..k).map(|t| ring_c.ntt_vec(z_cps.get(j, t))).collect(),
        }
    };
    let mut rounds: Vec<Option<MemberRound>> = (0..size)
        .into_par_iter()
        .map(|j| {
            (j != signer.index).then(|| {
                let z = to_ntt(j, &z_as, &z_cs, &z_cps);
                rearrange(params, &ctx, &ctx.members[j], &seeds[j], &z)
            })
        })
        .collect();

    let mut others = [0u8; 64];
    for (j, seed) in seeds.iter().enumerate() {
        if j != signer.index {
            xor_into(&mut others, seed);
        }
    }

    let s = signer.address_secret_key.s_ntt(params);
    let eta_a = params.config().address_mask_bound;
    let eta_c = params.config().commitment_mask_bound;
    let attempts = params.config().max_rejection_attempts;
    for attempt in 0..attempts {
        let y_a = ring_a.ntt_vec(&sample_bounded_vec(rng, l_a, d_a, eta_a));
        let y_c: Vec<Vec<NttPoly>> = (0..k)
            .map(|_| ring_c.ntt_vec(&sample_bounded_vec(&mut *rng, l_c, d_c, eta_c)))
            .collect();
        let y_cp: Vec<Vec<NttPoly>> = (0..k)
            .map(|_| ring_c.ntt_vec(&sample_bounded_vec(&mut *rng, l_c, d_c, eta_c)))
            .collect();

        rounds[signer.index] = Some(MemberRound {
            w_a: ring_a.mat_vec(params.matrix_a(), &y_a),
            delta_a: ring_a.inner_product(params.vector_a(), &y_a),
            w_c: y_c
                .iter()
                .map(|y| ring_c.mat_vec(params.matrix_b(), y))
                .collect(),
            w_cp: y_cp
                .iter()
                .map(|y| ring_c.mat_vec(params.matrix_b(), y))
                .collect(),
            delta_c: y_c
                .iter()
                .zip(&y_cp)
                .map(|(a, b)| ring_c.inner_product(params.h(0), &ring_c.vec_sub(a, b)))
                .collect(),
        });
        let complete: Vec<&MemberRound> = rounds.iter().flatten().collect();
        if complete.len() != size {
            return Err(RingCtError::InternalFault("incomplete ring transcript".into()));
        }
        let mut seed = ring_hash(&ctx, st.message, &complete);
        xor_into(&mut seed, &others);

        let (ch_a, rotated) = member_challenges(params, &seed);
        let z_a = ring_a.intt_vec(&ring_a.vec_add(&y_a, &ring_a.scale_vec(&ch_a, &s)));
        let z_c: Vec<Vec<Poly>> = (0..k)
            .map(|t| {
                ring_c.intt_vec(&ring_c.vec_add(
                    &y_c[t],
                    &ring_c.scale_vec(&rotated[t], signer.commitment_randomness),
                ))
            })
            .collect();
        let z_cp: Vec<Vec<Poly>> = (0..k)
            .map(|t| {
                ring_c.intt_vec(&ring_c.vec_add(
                    &y_cp[t],
                    &ring_c.scale_vec(&rotated[t], signer.proof_randomness),
                ))
            })
            .collect();

        let norm_a = vec_infinity_norm(&z_a);
        let norm_c = z_c
            .iter()
            .chain(&z_cp)
            .map(|z| vec_infinity_norm(z))
            .max()
            .unwrap_or(0);
        if norm_a <= bound_a && norm_c <= bound_c {
            seeds[signer.index] = seed;
            z_as[signer.index] = z_a;
            for (t, (zc, zcp)) in z_c.into_iter().zip(z_cp).enumerate() {
                *z_cs.get_mut(signer.index, t) = zc;
                *z_cps.get_mut(signer.index, t) = zcp;
            }
            return Ok(ElrsSignature {
                seeds,
                z_as,
                z_cs,
                z_cps,
            });
        }
        log::debug!(
            "elrs: signer response over bound (a: {}, c: {}), restart {}",
            norm_a,
            norm_c,
            attempt + 1
        );
    }
    Err(RingCtError::RestartLimitExceeded {
        stage: "elrs",
        attempts,
    })
}

fn ring_hash(ctx: &Context, message: &[u8], rounds: &[&MemberRound]) -> Seed {
    let mut t = Transcript::new(b"aingle_ringct.elrs");
    t.append_bytes(b"message", message);
    t.append_ntt(b"key_image", &ctx.key_image);
    t.append_ntt_vec(b"b_p", &ctx.b_p);
    t.append_ntt(b"c_p", &ctx.c_p);
    t.append_u64(b"ring_size", ctx.members.len() as u64);
    for (member, round) in ctx.members.iter().zip(rounds) {
        append_member(&mut t, member, round);
    }
    t.finish()
}

fn append_member(t: &mut Transcript, member: &MemberPublic, round: &MemberRound) {
    t.append_ntt_vec(b"t", &member.t);
    t.append_ntt(b"e_shift", &member.e_shift);
    t.append_ntt_vec(b"b", &member.b);
    t.append_ntt(b"c_diff", &member.c_diff);
    t.append_ntt_vec(b"w_a", &round.w_a);
    t.append_ntt(b"delta_a", &round.delta_a);
    for (w_c, w_cp) in round.w_c.iter().zip(&round.w_cp) {
        t.append_ntt_vec(b"w_c", w_c);
        t.append_ntt_vec(b"w_cp", w_cp);
    }
    t.append_ntt_vec(b"delta_c", &round.delta_c);
}

/// Verify a ring signature
pub(crate) fn verify(
    params: &SchemeParameters,
    st: &ElrsStatement<'_>,
    sig: &ElrsSignature,
) -> Result<bool> {
    let ring_a = params.ring_a();
    let ring_c = params.ring_c();
    let k = params.repetitions();
    st.check_shape(params)?;
    let size = st.ring.len();
    if sig.seeds.len() != size
        || sig.z_as.len() != size
        || sig
            .z_as
            .iter()
            .any(|z| z.len() != params.l_a() || z.iter().any(|p| p.len() != ring_a.degree()))
    {
        return Err(RingCtError::structural("elrs", "malformed signature"));
    }
    sig.z_cs
        .check_shape(size, k, params.l_c(), ring_c.degree(), "elrs.z_cs")?;
    sig.z_cps
        .check_shape(size, k, params.l_c(), ring_c.degree(), "elrs.z_cps")?;

    let norm_a = sig.z_as.iter().map(|z| vec_infinity_norm(z)).max().unwrap_or(0);
    let norm_c = sig.z_cs.infinity_norm().max(sig.z_cps.infinity_norm());
    if norm_a > params.address_response_bound() || norm_c > params.commitment_response_bound() {
        log::debug!("elrs: response over bound (a: {}, c: {})", norm_a, norm_c);
        return Ok(false);
    }

    let ctx = context(params, st);
    let rounds: Vec<MemberRound> = (0..size)
        .into_par_iter()
        .map(|j| {
            let z = MemberResponse {
                z_a: ring_a.ntt_vec(&sig.z_as[j]),
                z_c: (0..k).map(|t| ring_c.ntt_vec(sig.z_cs.get(j, t))).collect(),
                z_cp: (0..k).map(|t| ring_c.ntt_vec(sig.z_cps.get(j, t))).collect(),
            };
            rearrange(params, &ctx, &ctx.members[j], &sig.seeds[j], &z)
        })
        .collect();

    let refs: Vec<&MemberRound> = rounds.iter().collect();
    let expected = ring_hash(&ctx, st.message, &refs);
    let mut combined = [0u8; 64];
    for seed in &sig.seeds {
        xor_into(&mut combined, seed);
    }
    let ok = bool::from(combined[..].ct_eq(&expected[..]));
    if !ok {
        log::debug!("elrs: seed combination does not match the ring hash");
    }
    Ok(ok)
}

impl Encode for ElrsSignature {
    fn encoded_size(&self) -> usize {
        let size = self.seeds.len();
        let ring_a = self.z_as.first().map_or(0, |z| {
            z.len() * z.first().map_or(0, |p| packed_size(p.len(), ADDRESS_RESPONSE_BITS))
        });
        varint_size(size as u64)
            + size * (64 + ring_a)
            + self.z_cs.packed_size(COMMITMENT_RESPONSE_BITS)
            + self.z_cps.packed_size(COMMITMENT_RESPONSE_BITS)
    }

    fn encode(&self, w: &mut Writer) {
        w.put_varint(self.seeds.len() as u64);
        for seed in &self.seeds {
            w.put_seed(seed);
        }
        for z in &self.z_as {
            put_packed_vec(w, z, ADDRESS_RESPONSE_BITS);
        }
        self.z_cs.encode_packed(w, COMMITMENT_RESPONSE_BITS);
        self.z_cps.encode_packed(w, COMMITMENT_RESPONSE_BITS);
    }
}

impl Decode for ElrsSignature {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let size = r.get_count("elrs.ring_size", params.config().max_ring_size)?;
        let k = params.repetitions();
        let seeds = (0..size)
            .map(|_| r.get_seed("elrs.seeds"))
            .collect::<Result<Vec<_>>>()?;
        let z_as = (0..size)
            .map(|_| params.read_address_response(r, "elrs.z_as"))
            .collect::<Result<Vec<_>>>()?;
        let z_cs = ResponseGrid::decode_commitment_responses(params, r, size, k, "elrs.z_cs")?;
        let z_cps = ResponseGrid::decode_commitment_responses(params, r, size, k, "elrs.z_cps")?;
        Ok(Self {
            seeds,
            z_as,
            z_cs,
            z_cps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_fresh, txo_gen, txo_open, Txo};
    use crate::kem::{value_key_gen, ValueSecretKey};
    use crate::keys::address_key_gen;
    use crate::serial::key_image;
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    struct Fixture {
        ring: Vec<LedgerTxo>,
        signer: usize,
        ask: AddressSecretKey,
        vsk: ValueSecretKey,
    }

    fn fixture(size: usize, signer: usize) -> Fixture {
        let mut ring = Vec::new();
        let mut secret = None;
        for j in 0..size {
            let (apk, ask) = address_key_gen(params(), &[j as u8 + 1; 32]).unwrap();
            let (vpk, vsk) = value_key_gen();
            let (txo, _): (Txo, _) = txo_gen(params(), &apk, &vpk, 100 + j as u64).unwrap();
            ring.push(LedgerTxo {
                txo,
                id: vec![j as u8],
            });
            if j == signer {
                secret = Some((ask, vsk));
            }
        }
        let (ask, vsk) = secret.unwrap();
        Fixture {
            ring,
            signer,
            ask,
            vsk,
        }
    }

    fn sign_fixture(fx: &Fixture, message: &[u8]) -> (ElrsSignature, Poly, ValueCommitment) {
        let opening = txo_open(params(), &fx.ring[fx.signer].txo, &fx.vsk).unwrap();
        let (cmt_p, opening_p) = commit_fresh(params(), &mut OsRng, opening.value);
        let ma_p = key_image(params(), &fx.ring[fx.signer], &fx.ask);
        let st = ElrsStatement {
            ring: &fx.ring,
            key_image: &ma_p,
            proof_commitment: &cmt_p,
            message,
        };
        let signer = ElrsSigner {
            index: fx.signer,
            address_secret_key: &fx.ask,
            commitment_randomness: &opening.randomness,
            proof_randomness: &opening_p.randomness,
        };
        let sig = sign(params(), &mut OsRng, &st, &signer).unwrap();
        (sig, ma_p, cmt_p)
    }

    fn check(
        fx: &Fixture,
        msg: &[u8],
        ki: &Poly,
        cmt: &ValueCommitment,
        sig: &ElrsSignature,
    ) -> bool {
        let st = ElrsStatement {
            ring: &fx.ring,
            key_image: ki,
            proof_commitment: cmt,
            message: msg,
        };
        verify(params(), &st, sig).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        for (size, signer) in [(1, 0), (3, 1), (3, 2)] {
            let fx = fixture(size, signer);
            let (sig, ki, cmt) = sign_fixture(&fx, b"body");
            assert!(check(&fx, b"body", &ki, &cmt, &sig));
        }
    }

    #[test]
    fn test_wrong_message_or_key_image_rejected() {
        let fx = fixture(3, 1);
        let (sig, ki, cmt) = sign_fixture(&fx, b"body");
        assert!(!check(&fx, b"other", &ki, &cmt, &sig));

        let mut ki2 = ki.clone();
        ki2.coeffs[0] += 1;
        assert!(!check(&fx, b"body", &ki2, &cmt, &sig));

        let (other_cmt, _) = commit_fresh(params(), &mut OsRng, 101);
        assert!(!check(&fx, b"body", &ki, &other_cmt, &sig));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let fx = fixture(3, 0);
        let (sig, ki, cmt) = sign_fixture(&fx, b"body");

        let mut bad = sig.clone();
        bad.seeds[2][0] ^= 1;
        assert!(!check(&fx, b"body", &ki, &cmt, &bad));

        let mut bad = sig.clone();
        bad.z_as[1][0].coeffs[0] += 1;
        assert!(!check(&fx, b"body", &ki, &cmt, &bad));

        let mut bad = sig.clone();
        bad.z_cps.get_mut(0, 3)[0].coeffs[5] = params().commitment_response_bound() as i64 + 1;
        assert!(!check(&fx, b"body", &ki, &cmt, &bad));
    }

    #[test]
    fn test_shape_errors() {
        let fx = fixture(2, 0);
        let (mut sig, ki, cmt) = sign_fixture(&fx, b"body");
        sig.seeds.pop();
        let st = ElrsStatement {
            ring: &fx.ring,
            key_image: &ki,
            proof_commitment: &cmt,
            message: b"body",
        };
        assert!(matches!(
            verify(params(), &st, &sig),
            Err(RingCtError::Structural { .. })
        ));
    }

    #[test]
    fn test_malformed_ring_member_rejected() {
        let fx = fixture(3, 0);
        let (sig, ki, cmt) = sign_fixture(&fx, b"body");

        let mut short_key = fx.ring.clone();
        short_key[1].txo.address_public_key.t.pop();
        let mut short_commitment = fx.ring.clone();
        short_commitment[2].txo.value_commitment.b[0].coeffs.truncate(5);
        let mut short_e = fx.ring.clone();
        short_e[0].txo.address_public_key.e.coeffs.clear();

        for ring in [&short_key, &short_commitment, &short_e] {
            let st = ElrsStatement {
                ring,
                key_image: &ki,
                proof_commitment: &cmt,
                message: b"body",
            };
            assert!(matches!(
                verify(params(), &st, &sig),
                Err(RingCtError::Structural { .. })
            ));
        }

        let opening = txo_open(params(), &fx.ring[0].txo, &fx.vsk).unwrap();
        let (cmt_p, opening_p) = commit_fresh(params(), &mut OsRng, opening.value);
        let st = ElrsStatement {
            ring: &short_key,
            key_image: &ki,
            proof_commitment: &cmt_p,
            message: b"body",
        };
        let signer = ElrsSigner {
            index: 0,
            address_secret_key: &fx.ask,
            commitment_randomness: &opening.randomness,
            proof_randomness: &opening_p.randomness,
        };
        assert!(matches!(
            sign(params(), &mut OsRng, &st, &signer),
            Err(RingCtError::Structural { .. })
        ));
    }

    #[test]
    fn test_signature_encoding() {
        let fx = fixture(2, 1);
        let (sig, ki, cmt) = sign_fixture(&fx, b"body");
        let bytes = sig.to_bytes();
        assert_eq!(bytes.len(), sig.encoded_size());
        let decoded = ElrsSignature::from_bytes(params(), &bytes).unwrap();
        assert_eq!(decoded, sig);
        assert!(check(&fx, b"body", &ki, &cmt, &decoded));

        let json = serde_json::to_string(&sig).unwrap();
        let restored: ElrsSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sig);
    }
}
