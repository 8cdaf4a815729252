//! Address keys
//!
//! An address key pair binds a short secret `s ∈ R_a^{l_a}` and a uniform
//! `ma ∈ R_a` to the public pair
//!
//! ```text
//! t = A·s
//! e = <a, s> + ma
//! ```
//!
//! The address secret key also drives the key image (see [`crate::serial`])
//! and is what the ELRS proves knowledge of.
//!
//! Address keys are derived deterministically from a seed; value keys
//! (the KEM pair in [`crate::kem`]) are not.

use serde::{Deserialize, Serialize};

use crate::codec::{
    packed_size, poly_a_size, put_packed_vec, put_poly_a_vec, Decode, Encode, Reader, Writer,
    ADDRESS_SECRET_BITS,
};
use crate::error::{Result, RingCtError};
use crate::kem::{self, ValuePublicKey, ValueSecretKey};
use crate::params::SchemeParameters;
use crate::ring::{vec_infinity_norm, NttPoly, Poly};
use crate::sampling::Expander;

/// Minimum seed length for address key derivation
pub const MIN_SEED_LEN: usize = 32;

/// Public address key `(t, e)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPublicKey {
    /// `t = A·s` (`k_a` ring-A elements)
    pub t: Vec<Poly>,
    /// `e = <a, s> + ma`
    pub e: Poly,
}

/// Secret address key `(s, ma)`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSecretKey {
    /// Short secret, coefficients in `[-γ_a, γ_a]`
    pub s: Vec<Poly>,
    /// Uniform key-image component
    pub ma: Poly,
}

impl std::fmt::Debug for AddressSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AddressSecretKey(..)")
    }
}

impl AddressPublicKey {
    pub(crate) fn check_shape(&self, params: &SchemeParameters, field: &'static str) -> Result<()> {
        let d = params.ring_a().degree();
        if self.t.len() != params.config().address_rows
            || self.t.iter().any(|p| p.len() != d)
            || self.e.len() != d
        {
            return Err(RingCtError::structural(field, "malformed address public key"));
        }
        Ok(())
    }
}

impl AddressSecretKey {
    pub(crate) fn s_ntt(&self, params: &SchemeParameters) -> Vec<NttPoly> {
        params.ring_a().ntt_vec(&self.s)
    }
}

/// Derive an address key pair from `seed`
pub fn address_key_gen(
    params: &SchemeParameters,
    seed: &[u8],
) -> Result<(AddressPublicKey, AddressSecretKey)> {
    if seed.len() < MIN_SEED_LEN {
        return Err(RingCtError::InvalidInput(format!(
            "address key seed must be at least {} bytes, got {}",
            MIN_SEED_LEN,
            seed.len()
        )));
    }
    let ring = params.ring_a();
    let d = ring.degree();
    let gamma = params.config().address_secret_bound;

    let mut exp = Expander::new(b"aingle_ringct.address.s", &[seed]);
    let s: Vec<Poly> = (0..params.l_a()).map(|_| exp.bounded_poly(d, gamma)).collect();
    let ma_ntt = Expander::new(b"aingle_ringct.address.ma", &[seed]).uniform_ntt(ring);

    let s_ntt = ring.ntt_vec(&s);
    let t = ring.intt_vec(&ring.mat_vec(params.matrix_a(), &s_ntt));
    let e = ring.intt(&ring.add(&ring.inner_product(params.vector_a(), &s_ntt), &ma_ntt));

    Ok((
        AddressPublicKey { t, e },
        AddressSecretKey {
            s,
            ma: ring.intt(&ma_ntt),
        },
    ))
}

/// Check that `ask` is the secret key of `apk`
pub fn address_key_verify(
    params: &SchemeParameters,
    apk: &AddressPublicKey,
    ask: &AddressSecretKey,
) -> bool {
    let ring = params.ring_a();
    if apk.t.len() != params.config().address_rows
        || ask.s.len() != params.l_a()
        || ask.s.iter().any(|p| p.len() != ring.degree())
        || vec_infinity_norm(&ask.s) > params.config().address_secret_bound
    {
        return false;
    }
    let s_ntt = ask.s_ntt(params);
    let t = ring.mat_vec(params.matrix_a(), &s_ntt);
    let e = ring.add(
        &ring.inner_product(params.vector_a(), &s_ntt),
        &ring.ntt(&ask.ma),
    );
    t == ring.ntt_vec(&apk.t) && e == ring.ntt(&apk.e)
}

impl Encode for AddressPublicKey {
    fn encoded_size(&self) -> usize {
        (self.t.len() + 1) * poly_a_size(self.e.len())
    }

    fn encode(&self, w: &mut Writer) {
        put_poly_a_vec(w, &self.t);
        w.put_poly_a(&self.e);
    }
}

impl Decode for AddressPublicKey {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let t = params.read_poly_a_vec(r, params.config().address_rows, "address_public_key.t")?;
        let e = params.read_poly_a(r, "address_public_key.e")?;
        Ok(Self { t, e })
    }
}

impl Encode for AddressSecretKey {
    fn encoded_size(&self) -> usize {
        let d = self.ma.len();
        self.s.len() * packed_size(d, ADDRESS_SECRET_BITS) + poly_a_size(d)
    }

    fn encode(&self, w: &mut Writer) {
        put_packed_vec(w, &self.s, ADDRESS_SECRET_BITS);
        w.put_poly_a(&self.ma);
    }
}

impl Decode for AddressSecretKey {
    fn decode(params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        let d = params.ring_a().degree();
        let bound = params.config().address_secret_bound;
        let s = (0..params.l_a())
            .map(|_| r.get_packed(d, ADDRESS_SECRET_BITS, bound, "address_secret_key.s"))
            .collect::<Result<Vec<_>>>()?;
        let ma = params.read_poly_a(r, "address_secret_key.ma")?;
        Ok(Self { s, ma })
    }
}

impl Encode for ValuePublicKey {
    fn encoded_size(&self) -> usize {
        self.bytes.len()
    }

    fn encode(&self, w: &mut Writer) {
        w.put_raw(&self.bytes);
    }
}

impl Decode for ValuePublicKey {
    fn decode(_params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        ValuePublicKey::from_bytes(r.take(kem::public_key_size(), "value_public_key")?)
    }
}

impl Encode for ValueSecretKey {
    fn encoded_size(&self) -> usize {
        self.bytes.len()
    }

    fn encode(&self, w: &mut Writer) {
        w.put_raw(&self.bytes);
    }
}

impl Decode for ValueSecretKey {
    fn decode(_params: &SchemeParameters, r: &mut Reader<'_>) -> Result<Self> {
        ValueSecretKey::from_bytes(r.take(kem::secret_key_size(), "value_secret_key")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    #[test]
    fn test_address_key_roundtrip() {
        let (apk, ask) = address_key_gen(params(), &[7u8; 32]).unwrap();
        assert!(address_key_verify(params(), &apk, &ask));
        assert!(vec_infinity_norm(&ask.s) <= 2);
    }

    #[test]
    fn test_address_key_is_deterministic() {
        let (apk1, ask1) = address_key_gen(params(), &[1u8; 40]).unwrap();
        let (apk2, ask2) = address_key_gen(params(), &[1u8; 40]).unwrap();
        let (apk3, _) = address_key_gen(params(), &[2u8; 40]).unwrap();
        assert_eq!(apk1, apk2);
        assert_eq!(ask1, ask2);
        assert_ne!(apk1, apk3);
    }

    #[test]
    fn test_short_seed_rejected() {
        assert!(matches!(
            address_key_gen(params(), &[0u8; 16]),
            Err(RingCtError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_wrong_secret_key_fails() {
        let (apk, _) = address_key_gen(params(), &[3u8; 32]).unwrap();
        let (_, ask) = address_key_gen(params(), &[4u8; 32]).unwrap();
        assert!(!address_key_verify(params(), &apk, &ask));

        let (apk, mut ask) = address_key_gen(params(), &[5u8; 32]).unwrap();
        ask.ma.coeffs[0] += 1;
        assert!(!address_key_verify(params(), &apk, &ask));
    }

    #[test]
    fn test_key_serialization() {
        let (apk, ask) = address_key_gen(params(), &[9u8; 32]).unwrap();

        let bytes = apk.to_bytes();
        assert_eq!(bytes.len(), apk.encoded_size());
        assert_eq!(bytes.len(), 6 * params().poly_a_size());
        assert_eq!(AddressPublicKey::from_bytes(params(), &bytes).unwrap(), apk);

        let bytes = ask.to_bytes();
        assert_eq!(bytes.len(), ask.encoded_size());
        assert_eq!(AddressSecretKey::from_bytes(params(), &bytes).unwrap(), ask);

        // Trailing data is rejected
        let mut long = apk.to_bytes();
        long.push(0);
        assert!(AddressPublicKey::from_bytes(params(), &long).is_err());
    }

    #[test]
    fn test_value_key_serialization() {
        let (vpk, vsk) = kem::value_key_gen();
        let restored = ValuePublicKey::from_bytes(vpk.to_bytes().as_slice()).unwrap();
        assert_eq!(restored, vpk);
        let decoded = <ValueSecretKey as Decode>::from_bytes(params(), &vsk.to_bytes()).unwrap();
        assert!(kem::value_key_verify(&vpk, &decoded));
    }
}
