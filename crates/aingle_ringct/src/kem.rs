//! Value-key KEM (Kyber768)
//!
//! Value public keys receive a KEM ciphertext with every output; the shared
//! secret seeds the commitment randomness and the amount mask, so the owner
//! of the value secret key can reopen the commitment.

use pqcrypto_kyber::kyber768;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{Result, RingCtError};

/// Length of a value public key
pub fn public_key_size() -> usize {
    kyber768::public_key_bytes()
}

/// Length of a value secret key
pub fn secret_key_size() -> usize {
    kyber768::secret_key_bytes()
}

/// Length of a KEM ciphertext
pub fn ciphertext_size() -> usize {
    kyber768::ciphertext_bytes()
}

/// Value public key (KEM encapsulation key)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePublicKey {
    /// Raw key bytes
    pub bytes: Vec<u8>,
}

/// Value secret key (KEM decapsulation key)
#[derive(Clone, Serialize, Deserialize)]
pub struct ValueSecretKey {
    /// Raw key bytes
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ValuePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValuePublicKey({}..)", hex::encode(&self.bytes[..8.min(self.bytes.len())]))
    }
}

impl std::fmt::Debug for ValueSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValueSecretKey(..)")
    }
}

impl ValuePublicKey {
    /// Wrap serialized key bytes, checking the length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        kyber768::PublicKey::from_bytes(bytes)
            .map_err(|e| RingCtError::Kem(format!("invalid value public key: {:?}", e)))?;
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Serialized key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ValueSecretKey {
    /// Wrap serialized key bytes, checking the length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        kyber768::SecretKey::from_bytes(bytes)
            .map_err(|e| RingCtError::Kem(format!("invalid value secret key: {:?}", e)))?;
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Serialized key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Fresh value key pair
///
/// Kyber key generation draws from the system RNG; value keys cannot be
/// derived from a seed.
pub fn value_key_gen() -> (ValuePublicKey, ValueSecretKey) {
    let (pk, sk) = kyber768::keypair();
    (
        ValuePublicKey {
            bytes: pk.as_bytes().to_vec(),
        },
        ValueSecretKey {
            bytes: sk.as_bytes().to_vec(),
        },
    )
}

/// Check that `vsk` decapsulates what `vpk` encapsulates
pub fn value_key_verify(vpk: &ValuePublicKey, vsk: &ValueSecretKey) -> bool {
    match encapsulate(vpk) {
        Ok((ct, ss)) => match decapsulate(&ct, vsk) {
            Ok(ss2) => bool::from(ss.as_slice().ct_eq(ss2.as_slice())),
            Err(_) => false,
        },
        Err(_) => false,
    }
}

/// Encapsulate a fresh shared secret to `vpk`: returns `(ciphertext, secret)`
pub(crate) fn encapsulate(vpk: &ValuePublicKey) -> Result<(Vec<u8>, Vec<u8>)> {
    let pk = kyber768::PublicKey::from_bytes(&vpk.bytes)
        .map_err(|e| RingCtError::Kem(format!("invalid value public key: {:?}", e)))?;
    let (ss, ct) = kyber768::encapsulate(&pk);
    Ok((ct.as_bytes().to_vec(), ss.as_bytes().to_vec()))
}

/// Recover the shared secret from a ciphertext
pub(crate) fn decapsulate(ct: &[u8], vsk: &ValueSecretKey) -> Result<Vec<u8>> {
    let sk = kyber768::SecretKey::from_bytes(&vsk.bytes)
        .map_err(|e| RingCtError::Kem(format!("invalid value secret key: {:?}", e)))?;
    let ct = kyber768::Ciphertext::from_bytes(ct)
        .map_err(|e| RingCtError::Kem(format!("invalid KEM ciphertext: {:?}", e)))?;
    Ok(kyber768::decapsulate(&ct, &sk).as_bytes().to_vec())
}
