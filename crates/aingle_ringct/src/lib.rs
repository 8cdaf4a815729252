#![doc = include_str!("../README.md")]
//! # AIngle RingCT - Lattice-Based Confidential Transactions
//!
//! Post-quantum confidential transactions for AIngle.
//!
//! ## Features
//!
//! - **Address Keys**: Module-SIS key pairs `t = A·s` derived from a seed
//! - **Value Keys**: Kyber KEM key pairs that carry output openings to the recipient
//! - **Value Commitments**: Hiding, binding commitments `(B·r, <h_0, r> + m(v))`
//! - **Aggregate Proof**: One proof for the range of every amount and the balance law
//! - **Linkable Ring Signatures**: Spend one output of a ring without revealing which
//! - **Serial Numbers**: Deterministic spend tags that expose double spends
//! - **Batch Verification**: Parallel verification of many transactions
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        AIngle RingCT                            │
//! ├────────────────────────────────────────────────────────────────┤
//! │   Coinbase   │   Transfer   │   Batch   │   Codec (bytes/serde) │
//! └────────────────────────────────────────────────────────────────┘
//!        │              │             │
//!        ├─ Σ-protocol  ├─ ELRS ring signature per input
//!        └─ Rpulp ──────┴─ Rpulp aggregate range/balance proof
//!                       │
//!        Commitments ── Serial numbers ── Keys (A·s, Kyber)
//!                       │
//!        Rings Z_q[X]/(X^d + 1) with NTT ── SHAKE256 expansion ── SHA3-512 transcripts
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aingle_ringct::{
//!     address_key_gen, coinbase_tx_gen, transfer_tx_gen, transfer_tx_verify, value_key_gen,
//!     InputDescriptor, LedgerTxo, OutputDescriptor, SchemeParameters,
//! };
//! use rand::rngs::OsRng;
//!
//! let params = SchemeParameters::standard().unwrap();
//! let (apk, ask) = address_key_gen(&params, &[1u8; 32]).unwrap();
//! let (vpk, vsk) = value_key_gen();
//!
//! // 1. Mint 100 into one output we own
//! let mint = OutputDescriptor::new(apk.clone(), vpk.clone(), 100);
//! let coinbase = coinbase_tx_gen(&params, &mut OsRng, 100, &[mint], b"").unwrap();
//!
//! // 2. The ledger assigns it an identifier
//! let spendable = LedgerTxo {
//!     txo: coinbase.outputs[0].clone(),
//!     id: b"block-1/0".to_vec(),
//! };
//!
//! // 3. Spend it: 90 to a recipient, 10 as fee
//! let input = InputDescriptor {
//!     ring: vec![spendable],
//!     signer_index: 0,
//!     address_public_key: apk.clone(),
//!     address_secret_key: ask,
//!     value_secret_key: vsk,
//!     value: 100,
//! };
//! let pay = OutputDescriptor::new(apk, vpk, 90);
//! let tx = transfer_tx_gen(&params, &mut OsRng, &[input], &[pay], 10, b"").unwrap();
//! assert!(transfer_tx_verify(&params, &tx).unwrap());
//! ```
//!
//! ## Security Considerations
//!
//! - **Randomness**: always pass `OsRng` or another `CryptoRng`
//! - **Secrets**: address secret keys, value secret keys and commitment
//!   openings must never be logged; their `Debug` output is redacted
//! - **Double spends**: verification checks one transaction. Rejecting a
//!   serial number already on the ledger is the caller's job
//! - **Side channels**: polynomial arithmetic is not constant time
//! - **Production use**: audit before using in production systems

pub mod batch;
pub mod codec;
pub mod coinbase;
pub mod commitment;
pub mod descriptor;
pub mod elrs;
pub mod error;
pub mod kem;
pub mod keys;
pub mod params;
pub(crate) mod relation;
pub mod response;
pub mod ring;
pub mod rpulp;
pub(crate) mod sampling;
pub mod serial;
pub(crate) mod transcript;
pub mod transfer;

// Re-export main types
pub use batch::{BatchResult, BatchVerifier};
pub use codec::{Decode, Encode};
pub use coinbase::{coinbase_tx_gen, coinbase_tx_verify, CoinbaseTx, CoinbaseWitness};
pub use commitment::{
    txo_coin_receive, txo_gen, txo_open, CommitmentOpening, LedgerTxo, Txo, ValueCommitment,
};
pub use descriptor::{InputDescriptor, OutputDescriptor};
pub use elrs::ElrsSignature;
pub use error::{Result, RingCtError};
pub use kem::{value_key_gen, value_key_verify, ValuePublicKey, ValueSecretKey};
pub use keys::{address_key_gen, address_key_verify, AddressPublicKey, AddressSecretKey};
pub use params::{ParameterConfig, SchemeParameters};
pub use ring::Poly;
pub use rpulp::RpulpProof;
pub use sampling::Seed;
pub use serial::{ledger_txo_serial_number_gen, SerialNumber};
pub use transfer::{transfer_tx_gen, transfer_tx_verify, TransferTx, TransferWitness, TxInput};
