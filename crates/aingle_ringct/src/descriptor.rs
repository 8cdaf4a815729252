//! Transaction input and output descriptors
//!
//! Descriptors are the wallet-side description of what a transaction should
//! spend and create. They carry secrets (inputs) or recipient keys (outputs)
//! and never appear on the wire.

use rayon::prelude::*;

use crate::codec::Decode;
use crate::commitment::{txo_gen, CommitmentOpening, LedgerTxo, Txo};
use crate::error::{Result, RingCtError};
use crate::kem::{ValuePublicKey, ValueSecretKey};
use crate::keys::{AddressPublicKey, AddressSecretKey};
use crate::params::SchemeParameters;

/// Output to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub address_public_key: AddressPublicKey,
    pub value_public_key: ValuePublicKey,
    pub value: u64,
}

impl OutputDescriptor {
    pub fn new(
        address_public_key: AddressPublicKey,
        value_public_key: ValuePublicKey,
        value: u64,
    ) -> Self {
        Self {
            address_public_key,
            value_public_key,
            value,
        }
    }

    /// Build from serialized recipient keys
    pub fn from_serialized(
        params: &SchemeParameters,
        address_public_key: &[u8],
        value_public_key: &[u8],
        value: u64,
    ) -> Result<Self> {
        Ok(Self {
            address_public_key: AddressPublicKey::from_bytes(params, address_public_key)?,
            value_public_key: ValuePublicKey::from_bytes(value_public_key)?,
            value,
        })
    }
}

/// Ledger output to spend, hidden in a ring
#[derive(Clone)]
pub struct InputDescriptor {
    /// Ring of ledger outputs, including the one being spent
    pub ring: Vec<LedgerTxo>,
    /// Position of the spent output in `ring`
    pub signer_index: usize,
    pub address_public_key: AddressPublicKey,
    pub address_secret_key: AddressSecretKey,
    pub value_secret_key: ValueSecretKey,
    /// Amount of the spent output
    pub value: u64,
}

impl std::fmt::Debug for InputDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDescriptor")
            .field("ring_size", &self.ring.len())
            .field("signer_index", &self.signer_index)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_count(field: &str, n: usize, max: usize) -> Result<()> {
    if n == 0 || n > max {
        return Err(RingCtError::InvalidInput(format!(
            "{} count {} outside 1..={}",
            field, n, max
        )));
    }
    Ok(())
}

pub(crate) fn check_value(params: &SchemeParameters, value: u64) -> Result<()> {
    if value > params.max_value() {
        return Err(RingCtError::RangeError {
            value,
            max: params.max_value(),
        });
    }
    Ok(())
}

pub(crate) fn check_memo(params: &SchemeParameters, memo: &[u8]) -> Result<()> {
    let max = params.config().max_memo_size;
    if memo.len() > max {
        return Err(RingCtError::InvalidInput(format!(
            "memo of {} bytes exceeds {}",
            memo.len(),
            max
        )));
    }
    Ok(())
}

/// Create every output in parallel
pub(crate) fn generate_outputs(
    params: &SchemeParameters,
    outputs: &[OutputDescriptor],
) -> Result<(Vec<Txo>, Vec<CommitmentOpening>)> {
    let generated = outputs
        .par_iter()
        .map(|o| txo_gen(params, &o.address_public_key, &o.value_public_key, o.value))
        .collect::<Result<Vec<_>>>()?;
    Ok(generated.into_iter().unzip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encode;
    use crate::kem::value_key_gen;
    use crate::keys::address_key_gen;
    use std::sync::OnceLock;

    fn params() -> &'static SchemeParameters {
        static PARAMS: OnceLock<SchemeParameters> = OnceLock::new();
        PARAMS.get_or_init(|| SchemeParameters::standard().unwrap())
    }

    #[test]
    fn test_output_descriptor_from_serialized() {
        let (apk, _) = address_key_gen(params(), &[1u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let desc =
            OutputDescriptor::from_serialized(params(), &apk.to_bytes(), &vpk.to_bytes(), 42)
                .unwrap();
        assert_eq!(desc, OutputDescriptor::new(apk.clone(), vpk, 42));

        assert!(OutputDescriptor::from_serialized(params(), &[0u8; 10], &[0u8; 10], 1).is_err());
    }

    #[test]
    fn test_outputs_generated_in_order() {
        let (apk, _) = address_key_gen(params(), &[2u8; 32]).unwrap();
        let (vpk, _) = value_key_gen();
        let descs: Vec<_> = [5u64, 6, 7]
            .iter()
            .map(|&v| OutputDescriptor::new(apk.clone(), vpk.clone(), v))
            .collect();
        let (txos, openings) = generate_outputs(params(), &descs).unwrap();
        assert_eq!(txos.len(), 3);
        assert_eq!(
            openings.iter().map(|o| o.value).collect::<Vec<_>>(),
            vec![5, 6, 7]
        );
    }

    #[test]
    fn test_limits() {
        assert!(check_count("outputs", 0, 5).is_err());
        assert!(check_count("outputs", 6, 5).is_err());
        assert!(check_count("outputs", 5, 5).is_ok());
        assert!(matches!(
            check_value(params(), params().max_value() + 1),
            Err(RingCtError::RangeError { .. })
        ));
        assert!(check_memo(params(), &vec![0u8; 1025]).is_err());
        assert!(check_memo(params(), &vec![0u8; 1024]).is_ok());
    }
}
