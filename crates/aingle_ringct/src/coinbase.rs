//! Coinbase transactions
//!
//! A coinbase mints a public amount `vin` into `J` confidential outputs. The
//! witness shape follows the output count:
//!
//! - **J = 1**: a `K`-round Σ-protocol showing that the only output commits
//!   to `vin` (`b = B·r`, `c - m(vin) = <h_0, r>`).
//! - **J >= 2**: an aggregate commitment to the output amounts and the carry
//!   vector of `Σ out = vin`, the carry proof `u'`, and an [`RpulpProof`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use aingle_ringct::{
//!     address_key_gen, coinbase_tx_gen, coinbase_tx_verify, value_key_gen, OutputDescriptor,
//!     SchemeParameters,
//! };
//! use rand::rngs::OsRng;
//!
//! let params = SchemeParameters::standard().unwrap();
//! let (apk, _ask) = address_key_gen(&params, &[7u8; 32]).unwrap();
//! let (vpk, _vsk) = value_key_gen();
//! let outputs = vec![
//!     OutputDescriptor::new(apk.clone(), vpk.clone(), 256),
//!     OutputDescriptor::new(apk, vpk, 256),
//! ];
//! let tx = coinbase_tx_gen(&params, &mut OsRng, 512, &outputs, b"block reward").unwrap();
//! assert!(coinbase_tx_verify(&params, &tx).unwrap());
//! ```

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::codec::{
    hex_seed, packed_size, poly_c_size, put_packed_vec, put_poly_c_vec, seq_size,
    var_bytes_size, Decode, Encode, Reader, Writer, COMMITMENT_RESPONSE_BITS,
};
use crate::commitment::{value_message, CommitmentNtt, Txo};
use crate::descriptor::{check_count, check_memo, check_value, generate_outputs, OutputDescriptor};
use crate::error::{Result, RingCtError};
use crate::params::SchemeParameters;
use crate::relation::{amount_slots, commit_extended, RelationLayout};
use crate::ring::{vec_infinity_norm, NttPoly, Poly};
use crate::rpulp::{self, RpulpProof};
use crate::sampling::{challenge_from_seed, sample_bounded_vec, Seed};
use crate::transcript::{sha3_512, Transcript};

/// Coinbase transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseTx {
    /// Minted amount
    pub vin: u64,
    pub outputs: Vec<Txo>,
    pub memo: Vec<u8>,
    pub witness: Option<CoinbaseWitness>,
}

/// Proof that the outputs of a coinbase add up to `vin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinbaseWitness {
    Single(SingleOutputWitness),
    Multi(MultiOutputWitness),
}

/// Witness of a one-output coinbase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleOutputWitness {
    #[serde(with = "hex_seed")]
    pub ch_seed: Seed,
    /// One opening response per round
    pub zs: Vec<Vec<Poly>>,
}

/// Witness of a coinbase with two or more outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiOutputWitness {
    /// `B·r̂`
    pub b_hat: Vec<Poly>,
    /// Aggregate commitments to the outputs, the carries and the noise
    pub c_hats: Vec<Poly>,
    /// `B_bin·f + e`
    pub u_p: Vec<i64>,
    pub proof: RpulpProof,
}

impl CoinbaseTx {
    /// Encoding of everything the witness signs
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.body_size());
        self.encode_body(&mut w);
        w.into_bytes()
    }

    /// SHA3-512 of [`CoinbaseTx::body_bytes`]
    pub fn body_hash(&self) -> Seed {
        sha3_512(&self.body_bytes())
    }

    fn body_size(&self) -> usize {
        8 + seq_size(&self.outputs) + var_bytes_size(self.memo.len())
    }

    fn encode_body(&self, w: &mut Writer) {
        w.put_u64(self.vin);
        w.put_seq(&self.outputs);
        w.put_var_bytes(&self.memo);
    }
}

fn single_seed(
    message: &[u8],
    cmt: &CommitmentNtt,
    vin: u64,
    ws: &[Vec<NttPoly>],
    deltas: &[NttPoly],
) -> Seed {
    let mut t = Transcript::new(b"aingle_ringct.coinbase.single");
    t.append_bytes(b"message", message);
    t.append_ntt_vec(b"b", &cmt.b);
    t.append_ntt(b"c", &cmt.c);
    t.append_u64(b"vin", vin);
    for (w, delta) in ws.iter().zip(deltas) {
        t.append_ntt_vec(b"w", w);
        t.append_ntt(b"delta", delta);
    }
    t.finish()
}

fn single_challenges(params: &SchemeParameters, seed: &Seed) -> Vec<NttPoly> {
    let ring = params.ring_c();
    let ch = ring.ntt(&challenge_from_seed(
        seed,
        b"aingle_ringct.coinbase.c",
        ring.degree(),
        params.config().commitment_challenge_weight,
    ));
    (0..params.repetitions())
        .map(|t| params.apply_sigma(&ch, t))
        .collect()
}

fn prove_single<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    message: &[u8],
    vin: u64,
    cmt: &CommitmentNtt,
    r: &[NttPoly],
) -> Result<SingleOutputWitness> {
    let ring = params.ring_c();
    let (d, l_c, k) = (ring.degree(), params.l_c(), params.repetitions());
    let eta = params.config().commitment_mask_bound;
    let bound = params.commitment_response_bound();
    let attempts = params.config().max_rejection_attempts;

    for attempt in 0..attempts {
        let ys: Vec<Vec<NttPoly>> = (0..k)
            .map(|_| ring.ntt_vec(&sample_bounded_vec(&mut *rng, l_c, d, eta)))
            .collect();
        let ws: Vec<Vec<NttPoly>> = ys
            .iter()
            .map(|y| ring.mat_vec(params.matrix_b(), y))
            .collect();
        let deltas: Vec<NttPoly> = ys
            .iter()
            .map(|y| ring.inner_product(params.h(0), y))
            .collect();
        let ch_seed = single_seed(message, cmt, vin, &ws, &deltas);
        let rotated = single_challenges(params, &ch_seed);
        let zs: Vec<Vec<Poly>> = ys
            .iter()
            .zip(&rotated)
            .map(|(y, ch)| ring.intt_vec(&ring.vec_add(y, &ring.scale_vec(ch, r))))
            .collect();
        let norm = zs.iter().map(|z| vec_infinity_norm(z)).max().unwrap_or(0);
        if norm <= bound {
            return Ok(SingleOutputWitness { ch_seed, zs });
        }
        log::debug!("coinbase: response norm {} over bound, restart {}", norm, attempt + 1);
    }
    Err(RingCtError::RestartLimitExceeded {
        stage: "coinbase",
        attempts,
    })
}

fn verify_single(
    params: &SchemeParameters,
    message: &[u8],
    vin: u64,
    cmt: &CommitmentNtt,
    witness: &SingleOutputWitness,
) -> Result<bool> {
    let ring = params.ring_c();
    let k = params.repetitions();
    if witness.zs.len() != k
        || witness
            .zs
            .iter()
            .any(|z| z.len() != params.l_c() || z.iter().any(|p| p.len() != ring.degree()))
    {
        return Err(RingCtError::structural("coinbase.zs", "malformed responses"));
    }
    let norm = witness
        .zs
        .iter()
        .map(|z| vec_infinity_norm(z))
        .max()
        .unwrap_or(0);
    if norm > params.commitment_response_bound() {
        log::debug!("coinbase: response norm {} over bound", norm);
        return Ok(false);
    }

    let rotated = single_challenges(params, &witness.ch_seed);
    let c_shift = ring.sub(&cmt.c, &value_message(params, vin));
    let zs: Vec<Vec<NttPoly>> = witness.zs.iter().map(|z| ring.ntt_vec(z)).collect();
    let ws: Vec<Vec<NttPoly>> = zs
        .iter()
        .zip(&rotated)
        .map(|(z, ch)| {
            ring.vec_sub(
                &ring.mat_vec(params.matrix_b(), z),
                &ring.scale_vec(ch, &cmt.b),
            )
        })
        .collect();
    let deltas: Vec<NttPoly> = zs
        .iter()
        .zip(&rotated)
        .map(|(z, ch)| {
            ring.sub(
                &ring.inner_product(params.h(0), z),
                &ring.mul(ch, &c_shift),
            )
        })
        .collect();
    Ok(single_seed(message, cmt, vin, &ws, &deltas) == witness.ch_seed)
}

/// Mint `vin` into `outputs`
///
/// Fails with [`RingCtError::BalanceError`] before any cryptography when the
/// output amounts do not add up to `vin`.
pub fn coinbase_tx_gen<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    vin: u64,
    outputs: &[OutputDescriptor],
    memo: &[u8],
) -> Result<CoinbaseTx> {
    check_value(params, vin)?;
    check_count("output", outputs.len(), params.config().max_outputs)?;
    check_memo(params, memo)?;
    let mut total = 0u64;
    for o in outputs {
        check_value(params, o.value)?;
        total = total
            .checked_add(o.value)
            .ok_or_else(|| RingCtError::BalanceError("output sum overflows".into()))?;
    }
    if total != vin {
        return Err(RingCtError::BalanceError(format!(
            "outputs add up to {}, coinbase mints {}",
            total, vin
        )));
    }

    let (txos, openings) = generate_outputs(params, outputs)?;
    let mut tx = CoinbaseTx {
        vin,
        outputs: txos,
        memo: memo.to_vec(),
        witness: None,
    };
    let message = tx.body_hash();
    let cmts: Vec<CommitmentNtt> = tx
        .outputs
        .iter()
        .map(|txo| txo.value_commitment.to_ntt(params))
        .collect();
    log::trace!("coinbase: {} outputs committed", cmts.len());

    let witness = if outputs.len() == 1 {
        CoinbaseWitness::Single(prove_single(
            params,
            rng,
            &message,
            vin,
            &cmts[0],
            &openings[0].randomness,
        )?)
    } else {
        let layout = RelationLayout::coinbase(params, outputs.len(), vin)?;
        let mut messages: Vec<Vec<u64>> = outputs
            .iter()
            .map(|o| amount_slots(params, o.value))
            .collect();
        messages.push(amount_slots(params, 0));
        let carries = layout.carries(params, &messages)?;
        for (rel, f) in layout.relations.iter().zip(carries) {
            messages[rel.carry] = f;
        }
        let agg = commit_extended(params, rng, &layout, &message, &messages, "coinbase")?;
        let randomness: Vec<Vec<NttPoly>> =
            openings.iter().map(|o| o.randomness.clone()).collect();
        let proof = rpulp::prove(params, rng, &message, &layout, &cmts, &randomness, &agg)?;
        let ring = params.ring_c();
        CoinbaseWitness::Multi(MultiOutputWitness {
            b_hat: ring.intt_vec(&agg.b_hat),
            c_hats: ring.intt_vec(&agg.c_hats),
            u_p: agg.u_p,
            proof,
        })
    };
    tx.witness = Some(witness);

    match coinbase_tx_verify(params, &tx) {
        Ok(true) => Ok(tx),
        Ok(false) => Err(RingCtError::InternalFault(
            "generated coinbase does not verify".into(),
        )),
        Err(e) => Err(RingCtError::InternalFault(format!(
            "generated coinbase is malformed: {}",
            e
        ))),
    }
}

/// Verify a coinbase transaction
pub fn coinbase_tx_verify(params: &SchemeParameters, tx: &CoinbaseTx) -> Result<bool> {
    let j = tx.outputs.len();
    if j == 0 || j > params.config().max_outputs {
        return Err(RingCtError::structural("outputs", "count outside the allowed range"));
    }
    if tx.memo.len() > params.config().max_memo_size {
        return Err(RingCtError::structural("memo", "too long"));
    }
    for txo in &tx.outputs {
        txo.value_commitment.check_shape(params, "outputs.value_commitment")?;
    }
    if tx.vin > params.max_value() {
        log::debug!("coinbase: minted amount {} out of range", tx.vin);
        return Ok(false);
    }
    let message = tx.body_hash();
    let cmts: Vec<CommitmentNtt> = tx
        .outputs
        .iter()
        .map(|txo| txo.value_commitment.to_ntt(params))
        .collect();

    let ok = match &tx.witness {
        None => return Err(RingCtError::structural("witness", "missing")),
        Some(CoinbaseWitness::Single(w)) if j == 1 => {
            verify_single(params, &message, tx.vin, &cmts[0], w)?
        }
        Some(CoinbaseWitness::Multi(w)) if j >= 2 => {
            let layout = RelationLayout::coinbase(params, j, tx.vin)?;
            rpulp::verify(
                params, &message, &layout, &cmts, &w.b_hat, &w.c_hats, &w.u_p, &w.proof,
            )?
        }
        Some(_) => {
            return Err(RingCtError::structural(
                "witness",
                "shape does not match the output count",
            ))
        }
    };
    if !ok {
        log::debug!("coinbase: witness rejected");
    }
    Ok(ok)
}

impl Encode for SingleOutputWitness {
    fn encoded_size(&self) -> usize {
        64 + self
            .zs
            .iter()
            .flatten()
            .map(|p| packed_size(p.len(), COMMITMENT_RESPONSE_BITS))
            .sum::<usize>()
    }

    fn encode(&self, w: &mut Writer) {
        w.put_seed(&self.ch_seed);
        for z in &self.zs {
            put_packed_vec(w, z, COMMITMENT_RESPONSE_BITS);
        }
    }
}

impl Decode for SingleOutputWitness {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let ch_seed = r.get_seed("coinbase.ch_seed")?;
        let zs = (0..params.repetitions())
            .map(|_| params.read_commitment_response(r, "coinbase.zs"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ch_seed, zs })
    }
}

impl Encode for MultiOutputWitness {
    fn encoded_size(&self) -> usize {
        let d = self.u_p.len();
        (self.b_hat.len() + self.c_hats.len()) * poly_c_size(d) + 4 * d + self.proof.encoded_size()
    }

    fn encode(&self, w: &mut Writer) {
        put_poly_c_vec(w, &self.b_hat);
        put_poly_c_vec(w, &self.c_hats);
        w.put_i32s(&self.u_p);
        self.proof.encode(w);
    }
}

impl MultiOutputWitness {
    /// Parse the witness of a coinbase with `outputs >= 2` outputs
    pub fn decode_with(
        params: &SchemeParameters,
        r: &mut Reader<'_>,
        outputs: usize,
    ) -> Result<Self> {
        let cfg = params.config();
        if outputs < 2 || outputs > cfg.max_outputs {
            return Err(RingCtError::serialization(
                "witness",
                format!("no aggregate witness for {} outputs", outputs),
            ));
        }
        let b_hat = params.read_poly_c_vec(r, cfg.commitment_rows, "b_hat")?;
        let c_hats = params.read_poly_c_vec(r, outputs + 2, "c_hats")?;
        let u_p = r.get_i32s(params.ring_c().degree(), cfg.carry_noise_bound, "u_p")?;
        let proof = RpulpProof::decode(params, r)?;
        Ok(Self {
            b_hat,
            c_hats,
            u_p,
            proof,
        })
    }
}

impl Encode for CoinbaseWitness {
    fn encoded_size(&self) -> usize {
        match self {
            Self::Single(w) => w.encoded_size(),
            Self::Multi(w) => w.encoded_size(),
        }
    }

    fn encode(&self, w: &mut Writer) {
        match self {
            Self::Single(witness) => witness.encode(w),
            Self::Multi(witness) => witness.encode(w),
        }
    }
}

impl CoinbaseWitness {
    /// Parse the witness of a coinbase with `outputs` outputs
    ///
    /// One output selects the Σ-protocol witness, more select the aggregate
    /// one.
    pub fn decode_with(
        params: &SchemeParameters,
        r: &mut Reader<'_>,
        outputs: usize,
    ) -> Result<Self> {
        match outputs {
            0 => Err(RingCtError::serialization("witness", "coinbase without outputs")),
            1 => Ok(Self::Single(SingleOutputWitness::decode(params, r)?)),
            _ => Ok(Self::Multi(MultiOutputWitness::decode_with(params, r, outputs)?)),
        }
    }

    /// Parse a witness that must occupy all of `bytes`
    pub fn from_bytes_with(
        params: &SchemeParameters,
        bytes: &[u8],
        outputs: usize,
    ) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let witness = Self::decode_with(params, &mut r, outputs)?;
        r.finish()?;
        Ok(witness)
    }
}

impl Encode for CoinbaseTx {
    fn encoded_size(&self) -> usize {
        self.body_size() + 1 + self.witness.as_ref().map_or(0, Encode::encoded_size)
    }

    fn encode(&self, w: &mut Writer) {
        self.encode_body(w);
        match &self.witness {
            None => w.put_u8(0),
            Some(witness) => {
                w.put_u8(1);
                witness.encode(w);
            }
        }
    }
}

impl Decode for CoinbaseTx {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let vin = r.get_u64("vin")?;
        let outputs: Vec<Txo> = r.get_seq(params, "outputs", params.config().max_outputs)?;
        let memo = r.get_var_bytes("memo", params.config().max_memo_size)?;
        let witness = match r.get_u8("witness")? {
            0 => None,
            1 => Some(CoinbaseWitness::decode_with(params, r, outputs.len())?),
            _ => return Err(RingCtError::serialization("witness", "bad presence flag")),
        };
        Ok(Self {
            vin,
            outputs,
            memo,
            witness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kem::value_key_gen;
    use crate::keys::address_key_gen;
    use crate::params::ParameterConfig;
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    fn descriptors(values: &[u64]) -> Vec<OutputDescriptor> {
        let (apk, _) = address_key_gen(params(), &[11u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        values
            .iter()
            .map(|&v| OutputDescriptor::new(apk.clone(), vpk.clone(), v))
            .collect()
    }

    #[test]
    fn test_single_output_coinbase() {
        let tx = coinbase_tx_gen(params(), &mut OsRng, 1000, &descriptors(&[1000]), b"").unwrap();
        assert!(matches!(tx.witness, Some(CoinbaseWitness::Single(_))));
        assert!(coinbase_tx_verify(params(), &tx).unwrap());

        let mut wrong = tx.clone();
        wrong.vin = 999;
        assert!(!coinbase_tx_verify(params(), &wrong).unwrap());
    }

    #[test]
    fn test_multi_output_coinbase() {
        let tx = coinbase_tx_gen(params(), &mut OsRng, 512, &descriptors(&[256, 256]), b"memo")
            .unwrap();
        assert!(matches!(tx.witness, Some(CoinbaseWitness::Multi(_))));
        assert!(coinbase_tx_verify(params(), &tx).unwrap());

        let mut wrong = tx.clone();
        wrong.memo = b"other".to_vec();
        assert!(!coinbase_tx_verify(params(), &wrong).unwrap());
    }

    #[test]
    fn test_unbalanced_coinbase_rejected() {
        for values in [&[257u64, 256][..], &[255, 256], &[511]] {
            assert!(matches!(
                coinbase_tx_gen(params(), &mut OsRng, 512, &descriptors(values), b""),
                Err(RingCtError::BalanceError(_))
            ));
        }
        assert!(matches!(
            coinbase_tx_gen(
                params(),
                &mut OsRng,
                params().max_value() + 1,
                &descriptors(&[1]),
                b""
            ),
            Err(RingCtError::RangeError { .. })
        ));
        assert!(coinbase_tx_gen(params(), &mut OsRng, 0, &[], b"").is_err());
    }

    #[test]
    fn test_missing_or_mismatched_witness() {
        let mut tx = coinbase_tx_gen(params(), &mut OsRng, 7, &descriptors(&[7]), b"").unwrap();
        let single = tx.witness.take();
        assert!(coinbase_tx_verify(params(), &tx).is_err());

        let mut multi = coinbase_tx_gen(params(), &mut OsRng, 7, &descriptors(&[3, 4]), b"")
            .unwrap();
        multi.witness = single;
        assert!(matches!(
            coinbase_tx_verify(params(), &multi),
            Err(RingCtError::Structural { .. })
        ));
    }

    #[test]
    fn test_coinbase_encoding() {
        for values in [&[42u64][..], &[40, 2, 0]] {
            let vin = values.iter().sum();
            let tx = coinbase_tx_gen(params(), &mut OsRng, vin, &descriptors(values), b"hi")
                .unwrap();
            let bytes = tx.to_bytes();
            assert_eq!(bytes.len(), tx.encoded_size());
            let decoded = CoinbaseTx::from_bytes(params(), &bytes).unwrap();
            assert_eq!(decoded, tx);

            let mut bare = tx.clone();
            bare.witness = None;
            let bytes = bare.to_bytes();
            assert_eq!(bytes.len(), bare.encoded_size());
            assert_eq!(CoinbaseTx::from_bytes(params(), &bytes).unwrap(), bare);
        }
    }

    #[test]
    fn test_witness_encoding() {
        for values in [&[42u64][..], &[40, 2], &[20, 10, 12]] {
            let vin = values.iter().sum();
            let tx = coinbase_tx_gen(params(), &mut OsRng, vin, &descriptors(values), b"")
                .unwrap();
            let witness = tx.witness.clone().unwrap();
            let bytes = witness.to_bytes();
            assert_eq!(bytes.len(), witness.encoded_size());
            let decoded = CoinbaseWitness::from_bytes_with(params(), &bytes, values.len()).unwrap();
            assert_eq!(decoded, witness);

            let mut bare = tx;
            bare.witness = None;
            let mut joined = bare.to_bytes();
            joined.pop();
            joined.push(1);
            joined.extend_from_slice(&bytes);
            bare.witness = Some(decoded);
            assert_eq!(CoinbaseTx::from_bytes(params(), &joined).unwrap(), bare);

            let other = if values.len() == 1 { 2 } else { 1 };
            assert!(CoinbaseWitness::from_bytes_with(params(), &bytes, other).is_err());
            assert!(CoinbaseWitness::from_bytes_with(params(), &bytes, 0).is_err());
        }
    }

    #[test]
    fn test_restart_limit_reported() {
        let config = ParameterConfig {
            commitment_mask_bound: 2 * 60 + 1,
            carry_noise_bound: (1 << 30) - 1,
            max_rejection_attempts: 1,
            ..ParameterConfig::standard()
        };
        let tight = SchemeParameters::new(config).unwrap();
        let (apk, _) = address_key_gen(&tight, &[12u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let outputs = |values: &[u64]| -> Vec<OutputDescriptor> {
            values
                .iter()
                .map(|&v| OutputDescriptor::new(apk.clone(), vpk.clone(), v))
                .collect()
        };

        assert!(matches!(
            coinbase_tx_gen(&tight, &mut OsRng, 9, &outputs(&[9]), b""),
            Err(RingCtError::RestartLimitExceeded {
                stage: "coinbase",
                attempts: 1
            })
        ));
        assert!(matches!(
            coinbase_tx_gen(&tight, &mut OsRng, 9, &outputs(&[4, 5]), b""),
            Err(RingCtError::RestartLimitExceeded {
                stage: "rpulp",
                attempts: 1
            })
        ));
    }
}
