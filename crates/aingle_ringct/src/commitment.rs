//! Value commitments and transaction outputs
//!
//! A value commitment to amount `v` with ternary randomness `r ∈ R_c^{l_c}` is
//!
//! ```text
//! b = B·r
//! c = <h_0, r> + m(v)
//! ```
//!
//! where `m(v)` places the `N` bits of `v` in the NTT slots of ring C, so the
//! product of two messages is their slot-wise (bit-wise) product.
//!
//! Output commitments take their randomness from a KEM shared secret, which
//! lets the recipient reopen them. The amount travels masked by a pad derived
//! from the same secret.
//!
//! Properties:
//! - **Hiding**: `b` and `c` are indistinguishable from uniform under Module-LWE
//! - **Binding**: opening to two amounts yields a short Module-SIS solution for `B`

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::codec::{poly_c_size, put_poly_c_vec, var_bytes_size, Decode, Encode, Reader, Writer};
use crate::error::{Result, RingCtError};
use crate::kem::{self, ValuePublicKey, ValueSecretKey};
use crate::keys::AddressPublicKey;
use crate::params::SchemeParameters;
use crate::ring::{NttPoly, Poly};
use crate::sampling::{sample_bounded_vec, Expander};

/// Commitment `(b, c)` to an amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCommitment {
    /// `B·r` (`k_c` ring-C elements)
    pub b: Vec<Poly>,
    /// `<h_0, r> + m(v)`
    pub c: Poly,
}

/// NTT form of a commitment
#[derive(Debug, Clone)]
pub(crate) struct CommitmentNtt {
    pub b: Vec<NttPoly>,
    pub c: NttPoly,
}

impl ValueCommitment {
    pub(crate) fn to_ntt(&self, params: &SchemeParameters) -> CommitmentNtt {
        let ring = params.ring_c();
        CommitmentNtt {
            b: ring.ntt_vec(&self.b),
            c: ring.ntt(&self.c),
        }
    }

    pub(crate) fn check_shape(&self, params: &SchemeParameters, field: &'static str) -> Result<()> {
        let d = params.ring_c().degree();
        if self.b.len() != params.config().commitment_rows
            || self.b.iter().any(|p| p.len() != d)
            || self.c.len() != d
        {
            return Err(RingCtError::structural(field, "malformed value commitment"));
        }
        Ok(())
    }
}

impl CommitmentNtt {
    pub(crate) fn to_coefficients(&self, params: &SchemeParameters) -> ValueCommitment {
        let ring = params.ring_c();
        ValueCommitment {
            b: ring.intt_vec(&self.b),
            c: ring.intt(&self.c),
        }
    }
}

/// Opening of a commitment: the amount and its randomness
#[derive(Clone)]
pub struct CommitmentOpening {
    /// Committed amount
    pub value: u64,
    pub(crate) randomness: Vec<NttPoly>,
}

impl std::fmt::Debug for CommitmentOpening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitmentOpening")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Txo {
    /// Recipient address
    pub address_public_key: AddressPublicKey,
    /// Commitment to the amount
    pub value_commitment: ValueCommitment,
    /// Amount XOR a pad derived from the KEM secret
    pub masked_value: Vec<u8>,
    /// KEM ciphertext to the recipient's value key
    pub kem_ciphertext: Vec<u8>,
}

/// Output as recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTxo {
    /// The output itself
    pub txo: Txo,
    /// Opaque ledger identifier
    pub id: Vec<u8>,
}

/// Bits of `value` in the first `N` slots
pub(crate) fn value_bits(params: &SchemeParameters, value: u64) -> Vec<u64> {
    let d = params.ring_c().degree();
    (0..d)
        .map(|t| {
            if t < params.value_bits() {
                (value >> t) & 1
            } else {
                0
            }
        })
        .collect()
}

/// Message polynomial `m(v)` in NTT form
pub(crate) fn value_message(params: &SchemeParameters, value: u64) -> NttPoly {
    params.ring_c().from_slots(value_bits(params, value))
}

/// `(B·r, <h_0, r> + m)`
pub(crate) fn commit_with(params: &SchemeParameters, r: &[NttPoly], m: &NttPoly) -> CommitmentNtt {
    let ring = params.ring_c();
    CommitmentNtt {
        b: ring.mat_vec(params.matrix_b(), r),
        c: ring.add(&ring.inner_product(params.h(0), r), m),
    }
}

/// Commit to `value` with fresh ternary randomness
pub(crate) fn commit_fresh<R: RngCore + CryptoRng>(
    params: &SchemeParameters,
    rng: &mut R,
    value: u64,
) -> (ValueCommitment, CommitmentOpening) {
    let ring = params.ring_c();
    let r = ring.ntt_vec(&sample_bounded_vec(rng, params.l_c(), ring.degree(), 1));
    let cmt = commit_with(params, &r, &value_message(params, value));
    (
        cmt.to_coefficients(params),
        CommitmentOpening {
            value,
            randomness: r,
        },
    )
}

fn randomness_from_secret(params: &SchemeParameters, secret: &[u8]) -> Vec<NttPoly> {
    let ring = params.ring_c();
    let mut exp = Expander::new(b"aingle_ringct.commit.r", &[secret]);
    (0..params.l_c())
        .map(|_| ring.ntt(&exp.bounded_poly(ring.degree(), 1)))
        .collect()
}

fn value_pad(params: &SchemeParameters, secret: &[u8]) -> Vec<u8> {
    let mut pad = vec![0u8; params.masked_value_size()];
    Expander::new(b"aingle_ringct.value.pad", &[secret]).fill(&mut pad);
    if let Some(last) = pad.last_mut() {
        *last &= top_byte_mask(params);
    }
    pad
}

/// Bits of the final masked byte that may be set
fn top_byte_mask(params: &SchemeParameters) -> u8 {
    match params.value_bits() % 8 {
        0 => 0xff,
        r => (1u8 << r) - 1,
    }
}

fn mask_value(params: &SchemeParameters, value: u64, pad: &[u8]) -> Vec<u8> {
    value.to_le_bytes()[..params.masked_value_size()]
        .iter()
        .zip(pad)
        .map(|(v, p)| v ^ p)
        .collect()
}

/// Create an output paying `value` to `(apk, vpk)`
pub fn txo_gen(
    params: &SchemeParameters,
    apk: &AddressPublicKey,
    vpk: &ValuePublicKey,
    value: u64,
) -> Result<(Txo, CommitmentOpening)> {
    if value > params.max_value() {
        return Err(RingCtError::RangeError {
            value,
            max: params.max_value(),
        });
    }
    let (kem_ciphertext, secret) = kem::encapsulate(vpk)?;
    let r = randomness_from_secret(params, &secret);
    let cmt = commit_with(params, &r, &value_message(params, value));
    let masked_value = mask_value(params, value, &value_pad(params, &secret));

    Ok((
        Txo {
            address_public_key: apk.clone(),
            value_commitment: cmt.to_coefficients(params),
            masked_value,
            kem_ciphertext,
        },
        CommitmentOpening {
            value,
            randomness: r,
        },
    ))
}

/// Reopen an output with the recipient's value secret key
///
/// Fails with [`RingCtError::MismatchError`] when the recomputed commitment
/// differs from the one in `txo`, which is what happens for a foreign key.
pub fn txo_open(
    params: &SchemeParameters,
    txo: &Txo,
    vsk: &ValueSecretKey,
) -> Result<CommitmentOpening> {
    let secret = kem::decapsulate(&txo.kem_ciphertext, vsk)?;
    let pad = value_pad(params, &secret);
    if txo.masked_value.len() != pad.len() {
        return Err(RingCtError::structural("masked_value", "wrong length"));
    }
    let mut bytes = [0u8; 8];
    for (i, (m, p)) in txo.masked_value.iter().zip(&pad).enumerate() {
        bytes[i] = m ^ p;
    }
    if bytes[pad.len() - 1] & !top_byte_mask(params) != 0 {
        return Err(RingCtError::MismatchError(
            "masked value has padding bits set".into(),
        ));
    }
    let value = u64::from_le_bytes(bytes);
    if value > params.max_value() {
        return Err(RingCtError::RangeError {
            value,
            max: params.max_value(),
        });
    }

    let r = randomness_from_secret(params, &secret);
    let recomputed = commit_with(params, &r, &value_message(params, value)).to_coefficients(params);
    let same = recomputed
        .to_bytes()
        .as_slice()
        .ct_eq(txo.value_commitment.to_bytes().as_slice());
    if !bool::from(same) {
        return Err(RingCtError::MismatchError(
            "value commitment does not open under this key".into(),
        ));
    }
    Ok(CommitmentOpening {
        value,
        randomness: r,
    })
}

/// Amount of `txo` if it belongs to `(apk, vsk)`
pub fn txo_coin_receive(
    params: &SchemeParameters,
    txo: &Txo,
    apk: &AddressPublicKey,
    vsk: &ValueSecretKey,
) -> Result<Option<u64>> {
    if &txo.address_public_key != apk {
        return Ok(None);
    }
    match txo_open(params, txo, vsk) {
        Ok(opening) => Ok(Some(opening.value)),
        Err(RingCtError::MismatchError(reason)) => {
            log::debug!("output not received: {}", reason);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl Encode for ValueCommitment {
    fn encoded_size(&self) -> usize {
        (self.b.len() + 1) * poly_c_size(self.c.len())
    }

    fn encode(&self, w: &mut Writer) {
        put_poly_c_vec(w, &self.b);
        w.put_poly_c(&self.c);
    }
}

impl Decode for ValueCommitment {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let b = params.read_poly_c_vec(r, params.config().commitment_rows, "value_commitment.b")?;
        let c = params.read_poly_c(r, "value_commitment.c")?;
        Ok(Self { b, c })
    }
}

impl Encode for Txo {
    fn encoded_size(&self) -> usize {
        self.address_public_key.encoded_size()
            + self.value_commitment.encoded_size()
            + self.masked_value.len()
            + var_bytes_size(self.kem_ciphertext.len())
    }

    fn encode(&self, w: &mut Writer) {
        self.address_public_key.encode(w);
        self.value_commitment.encode(w);
        w.put_raw(&self.masked_value);
        w.put_var_bytes(&self.kem_ciphertext);
    }
}

impl Decode for Txo {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let address_public_key = AddressPublicKey::decode(params, r)?;
        let value_commitment = ValueCommitment::decode(params, r)?;
        let masked_value = r
            .take(params.masked_value_size(), "masked_value")?
            .to_vec();
        if let Some(last) = masked_value.last() {
            if last & !top_byte_mask(params) != 0 {
                return Err(RingCtError::serialization(
                    "masked_value",
                    "padding bits set",
                ));
            }
        }
        let kem_ciphertext = r.get_var_bytes("kem_ciphertext", kem::ciphertext_size())?;
        Ok(Self {
            address_public_key,
            value_commitment,
            masked_value,
            kem_ciphertext,
        })
    }
}

impl Encode for LedgerTxo {
    fn encoded_size(&self) -> usize {
        self.txo.encoded_size() + var_bytes_size(self.id.len())
    }

    fn encode(&self, w: &mut Writer) {
        self.txo.encode(w);
        w.put_var_bytes(&self.id);
    }
}

impl Decode for LedgerTxo {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let txo = Txo::decode(params, r)?;
        let id = r.get_var_bytes("ledger_txo.id", params.config().max_ledger_id_size)?;
        Ok(Self { txo, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kem::value_key_gen;
    use crate::keys::address_key_gen;
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    #[test]
    fn test_commit_and_open() {
        let (apk, _) = address_key_gen(params(), &[1u8; 32]).unwrap();
        let (vpk, vsk) = value_key_gen();
        let (txo, opening) = txo_gen(params(), &apk, &vpk, 123_456_789).unwrap();
        assert_eq!(opening.value, 123_456_789);

        let reopened = txo_open(params(), &txo, &vsk).unwrap();
        assert_eq!(reopened.value, 123_456_789);
        assert_eq!(reopened.randomness, opening.randomness);
    }

    #[test]
    fn test_open_with_foreign_key_fails() {
        let (apk, _) = address_key_gen(params(), &[2u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let (_, other_vsk) = value_key_gen();
        let (txo, _) = txo_gen(params(), &apk, &vpk, 42).unwrap();
        assert!(matches!(
            txo_open(params(), &txo, &other_vsk),
            Err(RingCtError::MismatchError(_))
        ));
    }

    #[test]
    fn test_value_range() {
        let (apk, _) = address_key_gen(params(), &[3u8; 32]).unwrap();
        let (vpk, vsk) = value_key_gen();
        let max = params().max_value();
        let (txo, _) = txo_gen(params(), &apk, &vpk, max).unwrap();
        assert_eq!(txo_open(params(), &txo, &vsk).unwrap().value, max);
        assert!(matches!(
            txo_gen(params(), &apk, &vpk, max + 1),
            Err(RingCtError::RangeError { .. })
        ));
    }

    #[test]
    fn test_coin_receive() {
        let (apk, _) = address_key_gen(params(), &[4u8; 32]).unwrap();
        let (other_apk, _) = address_key_gen(params(), &[5u8; 32]).unwrap();
        let (vpk, vsk) = value_key_gen();
        let (_, other_vsk) = value_key_gen();
        let (txo, _) = txo_gen(params(), &apk, &vpk, 77).unwrap();

        assert_eq!(txo_coin_receive(params(), &txo, &apk, &vsk).unwrap(), Some(77));
        assert_eq!(txo_coin_receive(params(), &txo, &other_apk, &vsk).unwrap(), None);
        assert_eq!(txo_coin_receive(params(), &txo, &apk, &other_vsk).unwrap(), None);
    }

    #[test]
    fn test_tampered_commitment_does_not_open() {
        let (apk, _) = address_key_gen(params(), &[6u8; 32]).unwrap();
        let (vpk, vsk) = value_key_gen();
        let (mut txo, _) = txo_gen(params(), &apk, &vpk, 1000).unwrap();
        txo.value_commitment.c.coeffs[3] += 1;
        assert!(matches!(
            txo_open(params(), &txo, &vsk),
            Err(RingCtError::MismatchError(_))
        ));
    }

    #[test]
    fn test_fresh_commitment_matches_message() {
        let (cmt, opening) = commit_fresh(params(), &mut OsRng, 9);
        let again = commit_with(params(), &opening.randomness, &value_message(params(), 9));
        assert_eq!(again.to_coefficients(params()), cmt);
        assert!(cmt.check_shape(params(), "cmt").is_ok());
    }

    #[test]
    fn test_txo_serialization() {
        let (apk, _) = address_key_gen(params(), &[7u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let (txo, _) = txo_gen(params(), &apk, &vpk, 5).unwrap();
        let lgtxo = LedgerTxo {
            txo,
            id: b"ledger-0001".to_vec(),
        };
        let bytes = lgtxo.to_bytes();
        assert_eq!(bytes.len(), lgtxo.encoded_size());
        assert_eq!(LedgerTxo::from_bytes(params(), &bytes).unwrap(), lgtxo);

        let truncated = &bytes[..bytes.len() - 1];
        assert!(LedgerTxo::from_bytes(params(), truncated).is_err());
    }
}
