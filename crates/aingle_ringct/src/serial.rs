//! Key images and serial numbers
//!
//! Spending a ledger output reveals its serial number. The serial number is
//! a hash of the key image
//!
//! ```text
//! ma' = ma + kidr(lgtxo)
//! ```
//!
//! where `kidr` is a uniform ring-A element expanded from the ledger entry.
//! The same output spent twice produces the same serial number no matter which
//! ring hides it, which is how double spends are linked.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::Encode;
use crate::commitment::LedgerTxo;
use crate::error::{Result, RingCtError};
use crate::keys::AddressSecretKey;
use crate::params::SchemeParameters;
use crate::ring::{NttPoly, Poly};
use crate::sampling::Expander;
use crate::transcript::sha3_512;

/// Length of a serial number in bytes
pub const SERIAL_NUMBER_SIZE: usize = 64;

/// Public tag of a spent output
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber(pub [u8; SERIAL_NUMBER_SIZE]);

impl SerialNumber {
    /// Hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| RingCtError::serialization("serial_number", e.to_string()))?;
        let arr: [u8; SERIAL_NUMBER_SIZE] = bytes.try_into().map_err(|_| {
            RingCtError::serialization("serial_number", "expected 64 bytes")
        })?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerialNumber({})", &self.to_hex()[..16])
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SerialNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `kidr(lgtxo)`: uniform ring-A element bound to the ledger entry
pub(crate) fn expand_kidr(params: &SchemeParameters, lgtxo: &LedgerTxo) -> NttPoly {
    Expander::new(b"aingle_ringct.kidr", &[&lgtxo.to_bytes()]).uniform_ntt(params.ring_a())
}

/// Key image `ma' = ma + kidr(lgtxo)`
pub fn key_image(params: &SchemeParameters, lgtxo: &LedgerTxo, ask: &AddressSecretKey) -> Poly {
    let ring = params.ring_a();
    ring.intt(&ring.add(&ring.ntt(&ask.ma), &expand_kidr(params, lgtxo)))
}

/// Serial number of a key image
pub fn serial_number(key_image: &Poly) -> SerialNumber {
    let mut w = crate::codec::Writer::new();
    w.put_poly_a(key_image);
    SerialNumber(sha3_512(&w.into_bytes()))
}

/// Serial number that spending `lgtxo` with `ask` reveals
pub fn ledger_txo_serial_number_gen(
    params: &SchemeParameters,
    lgtxo: &LedgerTxo,
    ask: &AddressSecretKey,
) -> SerialNumber {
    serial_number(&key_image(params, lgtxo, ask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::txo_gen;
    use crate::kem::value_key_gen;
    use crate::keys::address_key_gen;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    fn ledger_output(seed: u8, id: &[u8]) -> (LedgerTxo, AddressSecretKey) {
        let (apk, ask) = address_key_gen(params(), &[seed; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let (txo, _) = txo_gen(params(), &apk, &vpk, 10).unwrap();
        (
            LedgerTxo {
                txo,
                id: id.to_vec(),
            },
            ask,
        )
    }

    #[test]
    fn test_serial_number_is_deterministic() {
        let (lgtxo, ask) = ledger_output(1, b"a");
        let sn1 = ledger_txo_serial_number_gen(params(), &lgtxo, &ask);
        let sn2 = ledger_txo_serial_number_gen(params(), &lgtxo, &ask);
        assert_eq!(sn1, sn2);
    }

    #[test]
    fn test_serial_numbers_differ_per_output() {
        let (lgtxo, ask) = ledger_output(2, b"a");
        let mut other = lgtxo.clone();
        other.id = b"b".to_vec();
        assert_ne!(
            ledger_txo_serial_number_gen(params(), &lgtxo, &ask),
            ledger_txo_serial_number_gen(params(), &other, &ask)
        );
    }

    #[test]
    fn test_serial_numbers_differ_per_key() {
        let (lgtxo, ask) = ledger_output(4, b"d");
        let (_, other_ask) = ledger_output(5, b"d");
        assert_ne!(
            ledger_txo_serial_number_gen(params(), &lgtxo, &ask),
            ledger_txo_serial_number_gen(params(), &lgtxo, &other_ask)
        );
    }

    #[test]
    fn test_serial_number_hex_roundtrip() {
        let (lgtxo, ask) = ledger_output(3, b"c");
        let sn = ledger_txo_serial_number_gen(params(), &lgtxo, &ask);
        assert_eq!(SerialNumber::from_hex(&sn.to_hex()).unwrap(), sn);

        let json = serde_json::to_string(&sn).unwrap();
        let restored: SerialNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sn);

        assert!(SerialNumber::from_hex("abcd").is_err());
    }
}
