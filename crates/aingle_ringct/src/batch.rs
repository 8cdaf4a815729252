//! Batch verification for transactions
//!
//! Collects coinbase and transfer transactions and verifies them in
//! parallel. Coinbase and transfer batches run side by side with
//! `rayon::join`; inside each batch every transaction is an independent
//! rayon task. A transfer additionally verifies its ring signatures and its
//! aggregate proof concurrently, so a large batch keeps every core busy.
//!
//! A malformed transaction counts as invalid, the same as one whose proofs
//! fail.
//!
//! ## Example
//!
//! ```rust,no_run
//! use aingle_ringct::batch::BatchVerifier;
//! use aingle_ringct::{
//!     address_key_gen, coinbase_tx_gen, value_key_gen, OutputDescriptor, SchemeParameters,
//! };
//! use rand::rngs::OsRng;
//!
//! let params = SchemeParameters::standard().unwrap();
//! let (apk, _) = address_key_gen(&params, &[7u8; 32]).unwrap();
//! let (vpk, _) = value_key_gen();
//!
//! let mut verifier = BatchVerifier::new(&params);
//! for value in [10u64, 20, 30] {
//!     let out = OutputDescriptor::new(apk.clone(), vpk.clone(), value);
//!     let tx = coinbase_tx_gen(&params, &mut OsRng, value, &[out], b"").unwrap();
//!     verifier.add_coinbase(tx);
//! }
//!
//! let result = verifier.verify_all();
//! assert!(result.all_valid);
//! ```

use rayon::prelude::*;
use std::time::Instant;

use crate::coinbase::{coinbase_tx_verify, CoinbaseTx};
use crate::params::SchemeParameters;
use crate::transfer::{transfer_tx_verify, TransferTx};

/// Batch verifier for transactions
pub struct BatchVerifier<'a> {
    params: &'a SchemeParameters,
    coinbase_txs: Vec<CoinbaseTx>,
    transfer_txs: Vec<TransferTx>,
}

impl<'a> BatchVerifier<'a> {
    /// Create an empty batch for `params`
    pub fn new(params: &'a SchemeParameters) -> Self {
        Self {
            params,
            coinbase_txs: Vec::new(),
            transfer_txs: Vec::new(),
        }
    }

    /// Add a coinbase transaction to the batch
    pub fn add_coinbase(&mut self, tx: CoinbaseTx) {
        self.coinbase_txs.push(tx);
    }

    /// Add a transfer transaction to the batch
    pub fn add_transfer(&mut self, tx: TransferTx) {
        self.transfer_txs.push(tx);
    }

    /// Number of transactions in the batch
    pub fn len(&self) -> usize {
        self.coinbase_txs.len() + self.transfer_txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify every transaction in the batch
    pub fn verify_all(&self) -> BatchResult {
        let start = Instant::now();

        let (coinbase_results, transfer_results) = rayon::join(
            || self.verify_coinbase_batch(),
            || self.verify_transfer_batch(),
        );

        let all_valid =
            coinbase_results.iter().all(|&v| v) && transfer_results.iter().all(|&v| v);
        let verification_time_ms = start.elapsed().as_millis() as u64;
        log::debug!(
            "batch: {} coinbase and {} transfer transactions verified in {} ms",
            coinbase_results.len(),
            transfer_results.len(),
            verification_time_ms
        );

        BatchResult {
            all_valid,
            coinbase_results,
            transfer_results,
            verification_time_ms,
        }
    }

    fn verify_coinbase_batch(&self) -> Vec<bool> {
        self.coinbase_txs
            .par_iter()
            .enumerate()
            .map(|(i, tx)| match coinbase_tx_verify(self.params, tx) {
                Ok(valid) => valid,
                Err(e) => {
                    log::warn!("batch: coinbase {} is malformed: {}", i, e);
                    false
                }
            })
            .collect()
    }

    fn verify_transfer_batch(&self) -> Vec<bool> {
        self.transfer_txs
            .par_iter()
            .enumerate()
            .map(|(i, tx)| match transfer_tx_verify(self.params, tx) {
                Ok(valid) => valid,
                Err(e) => {
                    log::warn!("batch: transfer {} is malformed: {}", i, e);
                    false
                }
            })
            .collect()
    }

    /// Remove every transaction from the batch
    pub fn clear(&mut self) {
        self.coinbase_txs.clear();
        self.transfer_txs.clear();
    }
}

/// Result of batch verification
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// True if every transaction is valid
    pub all_valid: bool,
    /// Per-transaction results, in insertion order
    pub coinbase_results: Vec<bool>,
    pub transfer_results: Vec<bool>,
    /// Wall-clock time of [`BatchVerifier::verify_all`]
    pub verification_time_ms: u64,
}

impl BatchResult {
    pub fn total_transactions(&self) -> usize {
        self.coinbase_results.len() + self.transfer_results.len()
    }

    pub fn valid_count(&self) -> usize {
        self.coinbase_results.iter().filter(|&&v| v).count()
            + self.transfer_results.iter().filter(|&&v| v).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.total_transactions() - self.valid_count()
    }

    /// Result for the coinbase added at `index`
    pub fn coinbase_valid(&self, index: usize) -> Option<bool> {
        self.coinbase_results.get(index).copied()
    }

    /// Result for the transfer added at `index`
    pub fn transfer_valid(&self, index: usize) -> Option<bool> {
        self.transfer_results.get(index).copied()
    }
}

/// Verify a slice of transfers without building a [`BatchVerifier`]
pub fn verify_transfer_batch(params: &SchemeParameters, txs: &[TransferTx]) -> Vec<bool> {
    let mut verifier = BatchVerifier::new(params);
    for tx in txs {
        verifier.add_transfer(tx.clone());
    }
    verifier.verify_all().transfer_results
}

/// Verify a slice of coinbase transactions without building a [`BatchVerifier`]
pub fn verify_coinbase_batch(params: &SchemeParameters, txs: &[CoinbaseTx]) -> Vec<bool> {
    let mut verifier = BatchVerifier::new(params);
    for tx in txs {
        verifier.add_coinbase(tx.clone());
    }
    verifier.verify_all().coinbase_results
}
