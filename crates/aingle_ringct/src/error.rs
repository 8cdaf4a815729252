//! Error types for RingCT operations
//!
//! Generation and verification distinguish three kinds of failure:
//!
//! - **Structural**: malformed or missing fields, length mismatches. These
//!   fail fast, before any cryptography runs.
//! - **Value-domain**: amounts out of range or unbalanced transactions.
//!   Detected during generation before proofs are produced.
//! - **Cryptographic**: a proof or signature does not verify. Verification
//!   reports this as `Ok(false)`, never as an error.

use thiserror::Error;

/// Result type for RingCT operations
pub type Result<T> = std::result::Result<T, RingCtError>;

/// RingCT errors
#[derive(Debug, Error)]
pub enum RingCtError {
    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A field has the wrong shape for the transaction it belongs to
    #[error("Structural error in {field}: {reason}")]
    Structural {
        /// Name of the offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Amount outside `[0, V]`
    #[error("Value {value} exceeds the maximum representable value {max}")]
    RangeError {
        /// The rejected amount
        value: u64,
        /// Largest representable amount
        max: u64,
    },

    /// Inputs do not balance against outputs and fee
    #[error("Balance error: {0}")]
    BalanceError(String),

    /// A commitment did not open to the expected value
    #[error("Commitment mismatch: {0}")]
    MismatchError(String),

    /// Byte-level decoding failed
    #[error("Serialization error in {field}: {reason}")]
    Serialization {
        /// Field being decoded
        field: &'static str,
        /// Failure description
        reason: String,
    },

    /// KEM failure (malformed keys or ciphertext)
    #[error("KEM error: {0}")]
    Kem(String),

    /// Parameter configuration rejected
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A rejection-sampling loop ran out of attempts
    #[error("Rejection sampling exceeded {attempts} attempts in {stage}")]
    RestartLimitExceeded {
        /// Sampling stage that gave up
        stage: &'static str,
        /// Number of attempts made
        attempts: usize,
    },

    /// Generated data failed its own verification
    #[error("Internal fault: {0}")]
    InternalFault(String),
}

impl RingCtError {
    pub(crate) fn structural(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Structural {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn serialization(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Serialization {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RingCtError::RangeError { value: 10, max: 7 };
        assert_eq!(
            err.to_string(),
            "Value 10 exceeds the maximum representable value 7"
        );

        let err = RingCtError::structural("outputs", "expected 2 items, got 3");
        assert_eq!(
            err.to_string(),
            "Structural error in outputs: expected 2 items, got 3"
        );
    }
}
